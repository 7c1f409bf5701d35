// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Upstream response to client response relay.
//!
//! Status and reason are copied as-is, framing and compression headers are
//! dropped, and the body is transferred according to its [`UpstreamBody`] tag:
//!
//! | Tag | Transfer |
//! |-----|----------|
//! | `Push` | piped into the client body, polled only when the client can take more |
//! | `Pull` | a pump task reads chunk by chunk into a bounded channel feeding the client body |
//! | `Buffered` | written in one piece |
//! | `Empty` | response closed with no payload |
//!
//! Once this returns, status and headers are committed. A later upstream
//! failure surfaces as a body error, which aborts the client connection.

use axum::body::Body;
use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use hyper::ext::ReasonPhrase;
use tokio::sync::mpsc;

use crate::constants::{RELAY_CHANNEL_CAPACITY, STRIPPED_RESPONSE_HEADERS};
use crate::errors::TransportError;
use crate::transport::{ChunkReader, UpstreamBody, UpstreamResponse};

pub fn relay(upstream: UpstreamResponse) -> Response {
    tracing::debug!(
        "[proxy] relaying {} body with status {}",
        upstream.body.kind(),
        upstream.status
    );

    let body = match upstream.body {
        UpstreamBody::Push(stream) => Body::from_stream(stream),
        UpstreamBody::Pull(reader) => pump(reader),
        UpstreamBody::Buffered(bytes) => Body::from(bytes),
        UpstreamBody::Empty => Body::empty(),
    };

    let mut response = Response::new(body);
    *response.status_mut() = upstream.status;
    *response.headers_mut() = filter_headers(&upstream.headers);

    if let Some(reason) = upstream
        .status_text
        .filter(|text| !text.is_empty() && upstream.status.canonical_reason() != Some(text.as_str()))
        .and_then(|text| ReasonPhrase::try_from(text).ok())
    {
        response.extensions_mut().insert(reason);
    }

    response
}

/// Copies every upstream header except the framing and compression ones.
pub fn filter_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if !STRIPPED_RESPONSE_HEADERS.contains(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

/// Drains `reader` into the returned body.
///
/// The pump stops as soon as the client body is dropped, releasing the reader.
fn pump(mut reader: Box<dyn ChunkReader>) -> Body {
    let (tx, rx) = mpsc::channel::<Result<Bytes, TransportError>>(RELAY_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    tracing::debug!("[proxy] client went away, releasing upstream reader");
                    break;
                }
                next = reader.read_chunk() => next,
            };

            let chunk = match next {
                Ok(Some(chunk)) => Ok(chunk),
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("[proxy] upstream body failed mid-stream: {}", e);
                    Err(e)
                }
            };
            let failed = chunk.is_err();

            if tx.send(chunk).await.is_err() {
                tracing::debug!("[proxy] client went away, releasing upstream reader");
                break;
            }
            if failed {
                break;
            }
        }
    });

    Body::from_stream(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    }))
}
