// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Catch-all proxy handler.
//!
//! # Request Flow
//!
//! 1. In `request` reset mode, re-verify the session if it is due
//! 2. Take a snapshot of the current session
//! 3. Translate the inbound request against the snapshot's base URL
//! 4. Issue it over the snapshot's attested transport
//! 5. Relay the upstream response
//!
//! Any failure in steps 1 to 4 happens before a byte reaches the client and
//! is answered with a 500 `{"error": "Internal Server Error", "details": ...}`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Response};

use crate::application::AppState;
use crate::configuration::ResetMode;
use crate::errors::ProxyError;
use crate::relay;

#[tracing::instrument(skip_all, fields(method = %request.method(), uri = %request.uri()))]
pub async fn proxy(State(state): State<Arc<AppState>>, request: Request) -> Response {
    match forward(&state, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn forward(state: &AppState, request: Request) -> Result<Response, ProxyError> {
    if state.options.reset_mode == ResetMode::Request {
        state
            .session
            .reset_if_due(state.options.reset_interval())
            .await?;
    }

    let session = state.session.snapshot();

    log_incoming_request(&request);

    let outbound = state.translator.translate(request, &session.base_url())?;

    tracing::info!("[proxy] outgoing request url: {}", outbound.url);

    let upstream = session.issue_request(outbound).await?;

    tracing::info!(
        "[proxy] upstream response status: {} {}",
        upstream.status.as_u16(),
        upstream
            .status_text
            .as_deref()
            .or(upstream.status.canonical_reason())
            .unwrap_or_default()
    );
    tracing::debug!("[proxy] upstream response headers: {:?}", upstream.headers);

    Ok(relay::relay(upstream))
}

fn log_incoming_request(request: &Request) {
    tracing::info!(
        "[proxy] incoming request: {} {}",
        request.method(),
        request.uri()
    );

    if tracing::enabled!(tracing::Level::DEBUG) {
        let headers: Vec<(&str, &str)> = request
            .headers()
            .iter()
            .map(|(name, value)| {
                let value = if *name == AUTHORIZATION {
                    "[REDACTED]"
                } else {
                    value.to_str().unwrap_or("[binary]")
                };
                (name.as_str(), value)
            })
            .collect();
        tracing::debug!("[proxy] incoming request headers: {:?}", headers);
        tracing::debug!("[proxy] request body: [Streamed]");
    }
}
