// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

use axum::http::HeaderName;
use axum::http::header::{CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_RESET_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_UPSTREAM_URL: &str = "https://inference.tinfoil.sh/v1/";
/// Path on the upstream origin serving the verification document when no
/// explicit attestation URL is configured.
pub const DEFAULT_ATTESTATION_PATH: &str = "/.well-known/tinfoil-attestation";
/// Wait before retrying a background reset that failed.
pub const RESET_FAILURE_BACKOFF: Duration = Duration::from_secs(60);

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
pub const BEARER_PREFIX: &str = "Bearer ";

/// Connection-specific or recomputed by the outbound transport.
pub const STRIPPED_REQUEST_HEADERS: [HeaderName; 3] = [HOST, CONTENT_LENGTH, CONNECTION];
/// Framing and compression headers invalidated once the body is re-encoded for the client.
pub const STRIPPED_RESPONSE_HEADERS: [HeaderName; 4] =
    [CONTENT_ENCODING, CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION];

/// Chunks buffered between a pull-stream pump and the client body.
pub const RELAY_CHANNEL_CAPACITY: usize = 1;

pub const INTERNAL_SERVER_ERROR_MESSAGE: &str = "Internal Server Error";
pub const VERIFICATION_FAILED_MESSAGE: &str = "Verification failed: No verification document received or security verification failed.";
