// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Recording mock of the attested transport shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use attested_proxy::application::create_router;
use attested_proxy::configuration::ProxyOptions;
use attested_proxy::errors::TransportError;
use attested_proxy::models::ApiKey;
use attested_proxy::session::{Clock, SecureSession};
use attested_proxy::transport::{
    OutboundRequest, SecureTransport, TransportConnector, UpstreamBody, UpstreamResponse,
};
use axum::http::{HeaderMap, Method, StatusCode};
use axum_test::TestServer;
use bytes::Bytes;
use futures::TryStreamExt;
use serde_json::{Value, json};
use url::Url;

pub const BASE_URL: &str = "https://api.tinfoil.ai/v1";
pub const START_MS: i64 = 1_704_067_200_000; // 2024-01-01T00:00:00Z
pub const MINUTE_MS: i64 = 60 * 1000;

type Reply = Arc<dyn Fn() -> Result<UpstreamResponse, TransportError> + Send + Sync>;

/// What the proxy handed to the transport.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub generation: usize,
}

/// Upstream stand-in: a connector whose transports record every request and
/// answer with a configurable reply.
#[derive(Clone)]
pub struct MockUpstream {
    reply: Arc<Mutex<Reply>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    document: Arc<Mutex<Option<Value>>>,
    connects: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn new() -> Self {
        let reply: Reply = Arc::new(|| Ok(response(UpstreamBody::Empty)));
        Self {
            reply: Arc::new(Mutex::new(reply)),
            requests: Arc::new(Mutex::new(Vec::new())),
            document: Arc::new(Mutex::new(Some(json!({"securityVerified": true})))),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn reply_with<F>(&self, reply: F)
    where
        F: Fn() -> Result<UpstreamResponse, TransportError> + Send + Sync + 'static,
    {
        *self.reply.lock().unwrap() = Arc::new(reply);
    }

    pub fn set_document(&self, document: Option<Value>) {
        *self.document.lock().unwrap() = document;
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests().pop().unwrap()
    }
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportConnector for MockUpstream {
    fn connect(&self) -> Result<Arc<dyn SecureTransport>, TransportError> {
        let generation = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Arc::new(MockTransport {
            upstream: self.clone(),
            generation,
        }))
    }
}

struct MockTransport {
    upstream: MockUpstream,
    generation: usize,
}

#[async_trait]
impl SecureTransport for MockTransport {
    async fn ready(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn verification_document(&self) -> Result<Option<Value>, TransportError> {
        Ok(self.upstream.document.lock().unwrap().clone())
    }

    fn base_url(&self) -> Url {
        Url::parse(BASE_URL).unwrap()
    }

    async fn fetch(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError> {
        let body = match request.body {
            Some(stream) => {
                let chunks: Vec<Bytes> = stream.try_collect().await?;
                Some(chunks.concat())
            }
            None => None,
        };

        self.upstream.requests.lock().unwrap().push(RecordedRequest {
            method: request.method,
            url: request.url.to_string(),
            headers: request.headers,
            body,
            generation: self.generation,
        });

        let reply = self.upstream.reply.lock().unwrap().clone();
        reply()
    }
}

pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(ms: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(ms)))
    }

    pub fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A 200 response carrying `body` and a JSON content type.
pub fn response(body: UpstreamBody) -> UpstreamResponse {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", "application/json".parse().unwrap());
    UpstreamResponse {
        status: StatusCode::OK,
        status_text: Some("OK".to_string()),
        headers,
        body,
    }
}

pub async fn verified_session(upstream: &MockUpstream, clock: Arc<ManualClock>) -> Arc<SecureSession> {
    Arc::new(
        SecureSession::initialize(Arc::new(upstream.clone()), clock)
            .await
            .unwrap(),
    )
}

pub async fn create_test_server_with(
    upstream: &MockUpstream,
    options: ProxyOptions,
    clock: Arc<ManualClock>,
) -> TestServer {
    let session = verified_session(upstream, clock).await;
    TestServer::new(create_router(options, session)).unwrap()
}

/// Test server over `upstream` with the given configured API key.
pub async fn create_test_server(upstream: &MockUpstream, api_key: Option<&str>) -> TestServer {
    let options = ProxyOptions {
        api_key: api_key.map(ApiKey::new),
        ..ProxyOptions::default()
    };
    create_test_server_with(upstream, options, ManualClock::new(START_MS)).await
}
