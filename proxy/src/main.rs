// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::sync::Arc;

use attested_proxy::application::Application;
use attested_proxy::configuration::{ProxyOptions, ResetMode};
use attested_proxy::session::{self, SecureSession, SystemClock};
use attested_proxy::transport::remote::RemoteConnector;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("[proxy] init");

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        // this needs to be set to remove duplicated information in the log.
        .with_current_span(false)
        // this needs to be set to false, otherwise ANSI color codes will
        // show up in a confusing manner in CloudWatch logs.
        .with_ansi(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        // remove the name of the function from every log entry
        .with_target(false)
        .init();

    // get configuration options from environment variables
    let options = ProxyOptions::parse();

    tracing::info!("[proxy] {:?}", &options);

    if options.configured_api_key().is_none() {
        tracing::warn!("[proxy] no API key configured, requests are forwarded unauthenticated");
    }

    let connector = Arc::new(RemoteConnector::from_options(&options)?);

    // the listener is only bound once the environment is verified
    let session = match SecureSession::initialize(connector, Arc::new(SystemClock)).await {
        Ok(session) => Arc::new(session),
        Err(e) => {
            tracing::error!("[proxy] failed to start proxy server: {}", e);
            return Err(e.into());
        }
    };

    match options.reset_mode {
        ResetMode::Background => {
            session::spawn_refresher(session.clone(), options.reset_interval());
        }
        ResetMode::Request => tracing::info!(
            "[proxy] checking session age on each request, interval {:#?}",
            options.reset_interval()
        ),
    }

    let application = Application::build(options, session).await?;

    application.run_until_stopped().await?;

    Ok(())
}
