// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Secure session lifecycle.
//!
//! [`SecureSession`] owns the attested transport handle. It is verified once at
//! startup and re-verified ("reset") when it grows older than the configured
//! interval, so a long-running proxy does not keep using a stale attestation.
//!
//! # Consistency
//!
//! The verified state lives in an immutable [`SessionSnapshot`] behind an
//! `Arc`. Readers clone the `Arc` and work against that snapshot, so a request
//! sees either the pre-reset or the post-reset transport, never a mix.
//! `initialize` and `reset` build a complete new snapshot before swapping it
//! in; a failed verification leaves the current snapshot untouched.
//! Resets are serialized through a single async mutex.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

use crate::constants::RESET_FAILURE_BACKOFF;
use crate::errors::{ProxyError, VerificationError};
use crate::transport::{OutboundRequest, SecureTransport, TransportConnector, UpstreamResponse};

/// Wall-clock source in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A verification document that passed the integrity check.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationDocument(Value);

impl VerificationDocument {
    /// Accepts a document only if it is present, non-empty, and does not carry
    /// `securityVerified: false`.
    pub fn check(document: Option<Value>) -> Result<Self, VerificationError> {
        let document = match document {
            Some(document) if !is_empty_document(&document) => document,
            _ => return Err(VerificationError::MissingDocument),
        };

        let document = Self(document);
        if document.security_verified() == Some(false) {
            return Err(VerificationError::SecurityCheckFailed);
        }

        Ok(document)
    }

    /// The `securityVerified` flag, when the document carries a boolean one.
    pub fn security_verified(&self) -> Option<bool> {
        self.0.get("securityVerified").and_then(Value::as_bool)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }
}

fn is_empty_document(document: &Value) -> bool {
    match document {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Immutable view of one verified session.
pub struct SessionSnapshot {
    transport: Arc<dyn SecureTransport>,
    document: VerificationDocument,
    last_verified_at_ms: i64,
}

impl SessionSnapshot {
    /// Always true: a snapshot only exists once its document passed the check.
    pub fn is_verified(&self) -> bool {
        true
    }

    pub fn base_url(&self) -> Url {
        self.transport.base_url()
    }

    pub fn last_verified_at_ms(&self) -> i64 {
        self.last_verified_at_ms
    }

    pub fn verification_document(&self) -> &VerificationDocument {
        &self.document
    }

    /// Issues `request` over this snapshot's attested transport.
    pub async fn issue_request(
        &self,
        request: OutboundRequest,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.transport
            .fetch(request)
            .await
            .map_err(ProxyError::Upstream)
    }
}

pub struct SecureSession {
    connector: Arc<dyn TransportConnector>,
    clock: Arc<dyn Clock>,
    current: RwLock<Arc<SessionSnapshot>>,
    mutation: Mutex<()>,
}

impl SecureSession {
    /// Connects and verifies the first session. The proxy must not serve
    /// traffic until this succeeds.
    #[tracing::instrument(skip_all)]
    pub async fn initialize(
        connector: Arc<dyn TransportConnector>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, VerificationError> {
        tracing::info!("[proxy] initializing secure transport");

        let snapshot = verify(connector.as_ref(), clock.now_ms()).await?;

        Ok(Self {
            connector,
            clock,
            current: RwLock::new(Arc::new(snapshot)),
            mutation: Mutex::new(()),
        })
    }

    /// The current session. Never waits on a reset in progress.
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Upstream base URL of the current session, stale or not.
    pub fn base_url(&self) -> Url {
        self.snapshot().base_url()
    }

    pub async fn issue_request(
        &self,
        request: OutboundRequest,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.snapshot().issue_request(request).await
    }

    pub fn last_verified_at_ms(&self) -> i64 {
        self.snapshot().last_verified_at_ms()
    }

    pub fn is_verified(&self) -> bool {
        self.snapshot().is_verified()
    }

    /// Whether at least `interval` has elapsed since the last verification.
    pub fn should_reset(&self, interval: Duration) -> bool {
        self.elapsed_ms() >= duration_ms(interval)
    }

    /// Time left before the session becomes due for a reset.
    pub fn time_until_reset(&self, interval: Duration) -> Duration {
        let remaining = duration_ms(interval).saturating_sub(self.elapsed_ms());
        Duration::from_millis(u64::try_from(remaining).unwrap_or(0))
    }

    fn elapsed_ms(&self) -> i64 {
        self.clock
            .now_ms()
            .saturating_sub(self.last_verified_at_ms())
    }

    /// Re-verifies against a fresh transport handle.
    ///
    /// On failure the previous session stays in place and the error is returned.
    #[tracing::instrument(skip(self))]
    pub async fn reset(&self) -> Result<(), VerificationError> {
        let _guard = self.mutation.lock().await;
        self.reset_locked().await
    }

    /// Resets only if the session is due. A fresh session returns without
    /// touching the mutation lock; a stale one is checked again once the lock
    /// is held, so concurrent callers that noticed the same stale session
    /// reset it once.
    ///
    /// Returns whether a reset was performed.
    pub async fn reset_if_due(&self, interval: Duration) -> Result<bool, VerificationError> {
        if !self.should_reset(interval) {
            return Ok(false);
        }

        let _guard = self.mutation.lock().await;
        if !self.should_reset(interval) {
            return Ok(false);
        }
        self.reset_locked().await?;
        Ok(true)
    }

    async fn reset_locked(&self) -> Result<(), VerificationError> {
        tracing::info!("[proxy] re-verifying secure transport");

        let previous = self.last_verified_at_ms();
        let mut snapshot = verify(self.connector.as_ref(), self.clock.now_ms())
            .await
            .inspect_err(|e| tracing::warn!("[proxy] reset failed, keeping current session: {}", e))?;
        snapshot.last_verified_at_ms = snapshot.last_verified_at_ms.max(previous.saturating_add(1));

        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);

        Ok(())
    }
}

/// Connects a new handle, waits for it to be ready and checks its document.
async fn verify(
    connector: &dyn TransportConnector,
    now_ms: i64,
) -> Result<SessionSnapshot, VerificationError> {
    let transport = connector.connect()?;

    transport.ready().await?;
    tracing::info!("[proxy] verifying execution environment");

    let document = VerificationDocument::check(transport.verification_document().await?)?;

    tracing::info!("[proxy] environment verified successfully");
    tracing::debug!("[proxy] verification document: {}", document.as_json());

    Ok(SessionSnapshot {
        transport,
        document,
        last_verified_at_ms: now_ms,
    })
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Spawns the task that re-verifies `session` whenever it becomes due.
///
/// After a failed reset the task backs off for [`RESET_FAILURE_BACKOFF`] and
/// keeps serving the previous session in the meantime.
pub fn spawn_refresher(session: Arc<SecureSession>, interval: Duration) -> JoinHandle<()> {
    tracing::info!("[proxy] re-verifying session every {:#?}", interval);

    tokio::spawn(async move {
        loop {
            let wait = session.time_until_reset(interval);
            tracing::debug!("[proxy] next session reset in {:#?}", wait);
            tokio::time::sleep(wait).await;

            match session.reset_if_due(interval).await {
                Ok(true) => tracing::info!(
                    "[proxy] session reset, last verified at {}",
                    session.last_verified_at_ms()
                ),
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        "[proxy] background reset failed, retrying in {:#?}: {}",
                        RESET_FAILURE_BACKOFF,
                        e
                    );
                    tokio::time::sleep(RESET_FAILURE_BACKOFF).await;
                }
            }
        }
    })
}
