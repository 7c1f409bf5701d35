// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use crate::configuration::ProxyOptions;
use crate::proxy;
use crate::session::SecureSession;
use crate::translator::Translator;
use axum::Router;
use axum::serve::Serve;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct AppState {
    pub options: ProxyOptions,
    pub session: Arc<SecureSession>,
    pub translator: Translator,
}

pub struct Application {
    port: u16,
    server: Serve<TcpListener, Router, Router>,
}

impl Application {
    /// Binds the listener. `session` must already be verified.
    pub async fn build(
        options: ProxyOptions,
        session: Arc<SecureSession>,
    ) -> Result<Self, std::io::Error> {
        let address = format!("{}:{}", options.host, options.port);
        let listener = TcpListener::bind(address).await?;
        let server = run(listener, options.clone(), session)?;
        let port = server.local_addr()?.port();

        tracing::info!("[proxy] listening at http://{}:{}", options.host, port);

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.with_graceful_shutdown(shutdown_signal()).await
    }
}

/// Every method and path lands on the proxy handler.
pub fn create_router(options: ProxyOptions, session: Arc<SecureSession>) -> Router {
    let translator = Translator::new(options.configured_api_key());
    let state = Arc::new(AppState {
        options,
        session,
        translator,
    });

    Router::new().fallback(proxy::proxy).with_state(state)
}

#[tracing::instrument(skip(listener, session))]
pub fn run(
    listener: TcpListener,
    options: ProxyOptions,
    session: Arc<SecureSession>,
) -> Result<Serve<TcpListener, Router, Router>, std::io::Error> {
    let app = create_router(options, session);
    Ok(axum::serve(listener, app))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("[proxy] failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("[proxy] failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("[proxy] shutting down");
}
