// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! HTTPS transport backed by `reqwest`.
//!
//! Readiness fetches the verification document from the attestation endpoint
//! and caches it for the lifetime of the handle. Upstream responses are exposed
//! as push streams so bodies are relayed without buffering.
//!
//! Content coding is negotiated by the client itself: the caller's
//! `accept-encoding` is replaced by the codings reqwest can decode, and bodies
//! reach the relay already decompressed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::header::ACCEPT_ENCODING;
use futures::{StreamExt, TryStreamExt};
use hyper::ext::ReasonPhrase;
use serde_json::Value;
use tokio::sync::OnceCell;
use url::Url;

use crate::configuration::ProxyOptions;
use crate::errors::TransportError;
use crate::transport::{
    OutboundRequest, SecureTransport, TransportConnector, UpstreamBody, UpstreamResponse,
};

/// Connector producing [`RemoteTransport`] handles.
#[derive(Debug, Clone)]
pub struct RemoteConnector {
    upstream_url: Url,
    attestation_url: Url,
    timeout: Option<Duration>,
}

impl RemoteConnector {
    pub fn new(upstream_url: Url, attestation_url: Url, timeout: Option<Duration>) -> Self {
        Self {
            upstream_url,
            attestation_url,
            timeout,
        }
    }

    pub fn from_options(options: &ProxyOptions) -> Result<Self, TransportError> {
        Ok(Self::new(
            options.upstream_url.clone(),
            options.attestation_url()?,
            options.request_timeout(),
        ))
    }
}

impl TransportConnector for RemoteConnector {
    fn connect(&self) -> Result<Arc<dyn SecureTransport>, TransportError> {
        let transport = RemoteTransport::new(
            self.upstream_url.clone(),
            self.attestation_url.clone(),
            self.timeout,
        )?;
        Ok(Arc::new(transport))
    }
}

pub struct RemoteTransport {
    client: reqwest::Client,
    base_url: Url,
    attestation_url: Url,
    document: OnceCell<Option<Value>>,
}

impl RemoteTransport {
    pub fn new(
        base_url: Url,
        attestation_url: Url,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().https_only(base_url.scheme() == "https");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url,
            attestation_url,
            document: OnceCell::new(),
        })
    }

    #[tracing::instrument(skip(self), fields(url = %self.attestation_url))]
    async fn fetch_document(&self) -> Result<Option<Value>, TransportError> {
        let response = self
            .client
            .get(self.attestation_url.clone())
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;

        tracing::debug!("[proxy] received verification document ({} bytes)", bytes.len());

        if bytes.is_empty() {
            return Ok(None);
        }

        let document = serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::Handshake(format!("malformed verification document: {e}")))?;

        Ok(Some(document))
    }
}

#[async_trait]
impl SecureTransport for RemoteTransport {
    async fn ready(&self) -> Result<(), TransportError> {
        self.document
            .get_or_try_init(|| self.fetch_document())
            .await?;
        Ok(())
    }

    async fn verification_document(&self) -> Result<Option<Value>, TransportError> {
        match self.document.get() {
            Some(document) => Ok(document.clone()),
            None => Err(TransportError::Handshake(
                "transport is not ready".to_string(),
            )),
        }
    }

    fn base_url(&self) -> Url {
        self.base_url.clone()
    }

    async fn fetch(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError> {
        let mut headers = request.headers;
        headers.remove(ACCEPT_ENCODING);

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(reqwest::Body::wrap_stream(body));
        }

        let response = builder.send().await?;

        let status = response.status();
        let status_text = response
            .extensions()
            .get::<ReasonPhrase>()
            .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned());
        let headers = response.headers().clone();
        let body = if response.content_length() == Some(0) {
            UpstreamBody::Empty
        } else {
            UpstreamBody::Push(response.bytes_stream().map_err(TransportError::from).boxed())
        };

        Ok(UpstreamResponse {
            status,
            status_text,
            headers,
            body,
        })
    }
}
