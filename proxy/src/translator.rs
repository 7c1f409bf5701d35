// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Inbound request to [`OutboundRequest`] translation.
//!
//! - The target URL is the inbound path and query joined onto the upstream
//!   base URL with WHATWG semantics: an absolute inbound path replaces the
//!   base path, so `/v1/chat/completions` against `https://api.example/v1`
//!   targets `https://api.example/v1/chat/completions`. A join that would
//!   leave the base URL's origin is rejected.
//! - `host`, `content-length` and `connection` are dropped.
//! - `authorization: Bearer <key>` is injected only when the caller sent no
//!   `authorization` and an API key is configured.
//! - `content-type` defaults to `application/json`.
//! - `GET` and `HEAD` never carry a body; other methods stream the inbound
//!   body through without buffering it.

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, Uri};
use futures::{StreamExt, TryStreamExt};
use url::Url;

use crate::constants::{DEFAULT_CONTENT_TYPE, STRIPPED_REQUEST_HEADERS};
use crate::errors::{ProxyError, TransportError};
use crate::models::ApiKey;
use crate::transport::{ByteStream, OutboundRequest};

#[derive(Debug, Clone, Default)]
pub struct Translator {
    api_key: Option<ApiKey>,
}

impl Translator {
    pub fn new(api_key: Option<ApiKey>) -> Self {
        Self { api_key }
    }

    pub fn translate(&self, request: Request, base_url: &Url) -> Result<OutboundRequest, ProxyError> {
        let (parts, body) = request.into_parts();

        let url = target_url(base_url, &parts.uri)?;
        let headers = self.prepare_headers(&parts.headers)?;
        let body = outbound_body(&parts.method, body);

        Ok(OutboundRequest {
            method: parts.method,
            url,
            headers,
            body,
        })
    }

    /// Sanitizes inbound headers and fills in `authorization` and `content-type`.
    pub fn prepare_headers(&self, inbound: &HeaderMap) -> Result<HeaderMap, ProxyError> {
        let mut headers = inbound.clone();

        for name in STRIPPED_REQUEST_HEADERS {
            headers.remove(name);
        }

        if !headers.contains_key(AUTHORIZATION)
            && let Some(api_key) = &self.api_key
        {
            let mut value = HeaderValue::from_str(&api_key.bearer()).map_err(|_| {
                ProxyError::Translation("configured API key is not a valid header value".to_string())
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        }

        Ok(headers)
    }
}

/// Joins the inbound path and query onto `base_url`, keeping the base origin.
pub fn target_url(base_url: &Url, uri: &Uri) -> Result<Url, ProxyError> {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let target = base_url.join(path_and_query)?;

    if target.origin() != base_url.origin() {
        return Err(ProxyError::Translation(format!(
            "request path {path_and_query} leaves the upstream origin"
        )));
    }

    Ok(target)
}

fn outbound_body(method: &Method, body: Body) -> Option<ByteStream> {
    if *method == Method::GET || *method == Method::HEAD {
        return None;
    }

    Some(
        body.into_data_stream()
            .map_err(|e| TransportError::Body(e.to_string()))
            .boxed(),
    )
}
