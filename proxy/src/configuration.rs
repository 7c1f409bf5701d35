// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

use clap::{Parser, ValueEnum};
use url::Url;

use crate::constants::{
    DEFAULT_ATTESTATION_PATH, DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT, DEFAULT_RESET_INTERVAL_SECS,
    DEFAULT_UPSTREAM_URL,
};
use crate::models::ApiKey;

/// Where the stale-session check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResetMode {
    /// A timer task re-verifies the session independently of traffic.
    #[default]
    Background,
    /// Each request checks staleness and re-verifies before being proxied.
    Request,
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct ProxyOptions {
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env("PROXY_HTTP_HOST"))]
    pub host: String,
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env("PORT"))]
    pub port: u16,
    #[arg(long, env("TINFOIL_API_KEY"), hide_env_values = true)]
    pub api_key: Option<ApiKey>,
    /// Seconds between re-verifications of the attested session
    #[arg(
        long,
        default_value_t = DEFAULT_RESET_INTERVAL_SECS,
        env("TINFOIL_RESET_INTERVAL"),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub reset_interval: u64,
    #[arg(long, value_enum, default_value_t = ResetMode::Background, env("TINFOIL_RESET_MODE"))]
    pub reset_mode: ResetMode,
    #[arg(long, default_value = DEFAULT_UPSTREAM_URL, env("TINFOIL_UPSTREAM_URL"))]
    pub upstream_url: Url,
    /// Defaults to the well-known attestation path on the upstream origin
    #[arg(long, env("TINFOIL_ATTESTATION_URL"))]
    pub attestation_url: Option<Url>,
    /// Transport-level timeout in seconds; unbounded when unset
    #[arg(long, env("TINFOIL_REQUEST_TIMEOUT"))]
    pub request_timeout: Option<u64>,
}

impl ProxyOptions {
    pub fn reset_interval(&self) -> Duration {
        Duration::from_secs(self.reset_interval)
    }

    /// The API key to inject, treating a blank value as absent.
    pub fn configured_api_key(&self) -> Option<ApiKey> {
        self.api_key.as_ref().filter(|key| !key.is_empty()).cloned()
    }

    pub fn attestation_url(&self) -> Result<Url, url::ParseError> {
        match &self.attestation_url {
            Some(url) => Ok(url.clone()),
            None => self.upstream_url.join(DEFAULT_ATTESTATION_PATH),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout.map(Duration::from_secs)
    }
}

impl Default for ProxyOptions {
    fn default() -> Self {
        ProxyOptions {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            api_key: None,
            reset_interval: DEFAULT_RESET_INTERVAL_SECS,
            reset_mode: ResetMode::Background,
            upstream_url: Url::parse(DEFAULT_UPSTREAM_URL)
                .unwrap_or_else(|_| unreachable!("default upstream url is valid")),
            attestation_url: None,
            request_timeout: None,
        }
    }
}
