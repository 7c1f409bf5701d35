// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # Attested Proxy
//!
//! A single-endpoint HTTP reverse proxy that forwards every request to a remote
//! inference API over an attestation-backed transport.
//!
//! ## Architecture
//!
//! ```text
//! Client -> HTTP (any method, any path) -> Proxy (this crate) -> attested transport -> Upstream
//!                                              |
//!                                              +-> SecureSession (verify at startup, reset on interval)
//! ```
//!
//! The proxy refuses to start unless the remote environment's verification
//! document checks out, and re-verifies the session periodically so a
//! long-running process does not keep trusting a stale attestation.
//!
//! ## Modules
//!
//! - [`application`]: HTTP server setup with Axum and graceful shutdown
//! - [`configuration`]: CLI argument parsing with clap
//! - [`constants`]: Defaults and header lists
//! - [`errors`]: Error types with the uniform 500 response mapping
//! - [`models`]: Error body and the zeroized API key
//! - [`proxy`]: Catch-all handler wiring translator, session and relay
//! - [`relay`]: Upstream response to client response, across body shapes
//! - [`session`]: Verified session lifecycle and background re-verification
//! - [`translator`]: Inbound request to outbound request descriptor
//! - [`transport`]: Attested transport interface and the HTTPS implementation
//!
//! ## Usage
//!
//! ```bash
//! TINFOIL_API_KEY=... attested-proxy --port 3000 --reset-interval 3600
//! ```
//!
//! ## Security Considerations
//!
//! - No traffic is accepted before the initial verification succeeds
//! - A failed re-verification keeps the previous session instead of a half-updated one
//! - The configured API key is zeroized on drop and redacted from logs
//! - Inbound paths can never redirect the proxy to another origin

pub mod application;
pub mod configuration;
pub mod constants;
pub mod errors;
pub mod models;
pub mod proxy;
pub mod relay;
pub mod session;
pub mod translator;
pub mod transport;
