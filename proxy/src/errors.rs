// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Error taxonomy for the proxy.
//!
//! - [`TransportError`]: failures raised by the attested transport capability
//! - [`VerificationError`]: startup or reset verification failed
//! - [`ProxyError`]: per-request failures, all mapped to a uniform 500

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::constants::VERIFICATION_FAILED_MESSAGE;
use crate::models::ErrorBody;

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("transport handshake failed: {0}")]
    Handshake(String),
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid upstream url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("upstream body error: {0}")]
    Body(String),
    #[error("{0}")]
    Other(String),
}

#[derive(thiserror::Error, Debug)]
pub enum VerificationError {
    #[error("{}", VERIFICATION_FAILED_MESSAGE)]
    MissingDocument,
    #[error("{}", VERIFICATION_FAILED_MESSAGE)]
    SecurityCheckFailed,
    #[error("verification aborted: {0}")]
    Transport(#[from] TransportError),
}

#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error("{0}")]
    Upstream(#[from] TransportError),
    #[error("{0}")]
    Translation(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        tracing::error!("[proxy] proxy error: {:?}", self);

        let body = Json(ErrorBody::internal(self.to_string()));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

impl From<url::ParseError> for ProxyError {
    fn from(source: url::ParseError) -> Self {
        ProxyError::Translation(format!("invalid target url: {source}"))
    }
}
