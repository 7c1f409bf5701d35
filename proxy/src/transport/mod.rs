// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Attested transport capability.
//!
//! The proxy never speaks to the upstream directly. Every request goes through
//! a [`SecureTransport`] handle whose channel has been verified against the
//! remote execution environment. The attestation protocol itself lives behind
//! this trait; the proxy only consumes:
//!
//! - [`ready`](SecureTransport::ready): wait until the attested channel is usable
//! - [`verification_document`](SecureTransport::verification_document): evidence to check
//! - [`base_url`](SecureTransport::base_url): where upstream requests are sent
//! - [`fetch`](SecureTransport::fetch): issue a request over the attested channel
//!
//! Upstream bodies can come in several shapes. They are resolved exactly once,
//! at the transport boundary, into the tagged [`UpstreamBody`] so the relay
//! dispatches on the tag instead of probing capabilities.

pub mod remote;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use futures::stream::BoxStream;
use serde_json::Value;
use url::Url;

use crate::errors::TransportError;

/// Streaming byte source used for request and response bodies.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Sequential read-chunk interface for upstream bodies.
#[async_trait]
pub trait ChunkReader: Send {
    /// Returns the next chunk, or `None` once the stream is exhausted.
    async fn read_chunk(&mut self) -> Result<Option<Bytes>, TransportError>;
}

/// Upstream response body, tagged by the interface it exposes.
pub enum UpstreamBody {
    /// Subscribe/pipe style stream, consumed at the pace of the client.
    Push(ByteStream),
    /// Pull-style reader, drained chunk by chunk.
    Pull(Box<dyn ChunkReader>),
    /// All bytes, already materialized.
    Buffered(Bytes),
    /// No body at all.
    Empty,
}

impl UpstreamBody {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Push(_) => "push",
            Self::Pull(_) => "pull",
            Self::Buffered(_) => "buffered",
            Self::Empty => "empty",
        }
    }
}

impl fmt::Debug for UpstreamBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered(bytes) => write!(f, "Buffered({} bytes)", bytes.len()),
            other => f.write_str(other.kind()),
        }
    }
}

/// Every body interface an upstream adapter happens to expose.
///
/// Adapters that cannot guarantee a single shape fill in what they have and
/// convert into [`UpstreamBody`], which keeps the first applicable shape in
/// priority order: push, pull, buffered.
#[derive(Default)]
pub struct BodyShapes {
    pub push: Option<ByteStream>,
    pub pull: Option<Box<dyn ChunkReader>>,
    pub buffered: Option<Bytes>,
}

impl From<BodyShapes> for UpstreamBody {
    fn from(shapes: BodyShapes) -> Self {
        if let Some(stream) = shapes.push {
            UpstreamBody::Push(stream)
        } else if let Some(reader) = shapes.pull {
            UpstreamBody::Pull(reader)
        } else if let Some(bytes) = shapes.buffered {
            UpstreamBody::Buffered(bytes)
        } else {
            UpstreamBody::Empty
        }
    }
}

/// Request descriptor handed to the transport. Built fresh per inbound request.
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// Absent for `GET` and `HEAD`.
    pub body: Option<ByteStream>,
}

impl fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("body", &self.body.as_ref().map(|_| "[Streamed]"))
            .finish()
    }
}

/// Response as returned by the transport.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// Reason phrase sent by the upstream, when it was not the canonical one.
    pub status_text: Option<String>,
    pub headers: HeaderMap,
    pub body: UpstreamBody,
}

/// Handle to an attested channel.
#[async_trait]
pub trait SecureTransport: Send + Sync {
    /// Suspends until the attested session is usable. Fails on handshake error.
    async fn ready(&self) -> Result<(), TransportError>;

    /// Evidence of the remote environment's integrity, if any was obtained.
    async fn verification_document(&self) -> Result<Option<Value>, TransportError>;

    fn base_url(&self) -> Url;

    async fn fetch(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError>;
}

/// Builds fresh transport handles, once at startup and again on every reset.
pub trait TransportConnector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn SecureTransport>, TransportError>;
}
