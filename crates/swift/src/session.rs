//! Shared network session per filesystem instance
//!
//! The session is built lazily by a [`SessionFactory`] on first use and
//! reused by every later operation. Closing tries a graceful shutdown
//! bounded by [`SESSION_CLOSE_TIMEOUT`] and falls back to tearing the
//! connection pool down immediately.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use swiftfs_vfs::{Result, VfsError};
use tokio::runtime::Handle;

use crate::transport::{ClientOptions, HttpTransport, ReqwestTransport};

/// Upper bound on a graceful session close
pub const SESSION_CLOSE_TIMEOUT: Duration = Duration::from_millis(100);

/// Builds the transport for a filesystem instance
pub type SessionFactory =
    Arc<dyn Fn(&ClientOptions) -> Result<Arc<dyn HttpTransport>> + Send + Sync>;

/// Factory producing a [`ReqwestTransport`]
pub fn default_factory() -> SessionFactory {
    Arc::new(|options: &ClientOptions| {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(options)?);
        Ok(transport)
    })
}

/// Factory handing out an existing transport
///
/// The same transport is handed out again after the session is closed, so
/// it has to accept requests after `close()`; [`ReqwestTransport`] does.
pub fn fixed_factory(transport: Arc<dyn HttpTransport>) -> SessionFactory {
    Arc::new(move |_: &ClientOptions| Ok(transport.clone()))
}

/// Owner of the lazily created session
pub struct SessionManager {
    factory: SessionFactory,
    options: ClientOptions,
    slot: Mutex<Option<Arc<dyn HttpTransport>>>,
}

impl SessionManager {
    pub fn new(factory: SessionFactory, options: ClientOptions) -> Self {
        Self {
            factory,
            options,
            slot: Mutex::new(None),
        }
    }

    /// The shared session, created on first call
    pub fn get_session(&self) -> Result<Arc<dyn HttpTransport>> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| VfsError::Runtime("session lock poisoned".to_string()))?;
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }
        let session = (self.factory)(&self.options)?;
        tracing::info!("created storage session");
        *slot = Some(session.clone());
        Ok(session)
    }

    /// True once a session exists and has not been closed
    pub fn is_active(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn take(&self) -> Option<Arc<dyn HttpTransport>> {
        match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Release the session. Errors are logged, never returned.
    pub async fn close(&self) {
        if let Some(session) = self.take() {
            close_session(session).await;
        }
    }

    /// Synchronous best-effort release, for use from `Drop`
    ///
    /// With a tokio runtime at hand the bounded graceful close is spawned
    /// onto it; otherwise the connection pool is aborted right away.
    pub fn close_on_drop(&self) {
        let Some(session) = self.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(close_session(session));
            }
            Err(_) => {
                tracing::debug!("no runtime available, aborting storage session");
                session.abort();
            }
        }
    }
}

async fn close_session(session: Arc<dyn HttpTransport>) {
    match tokio::time::timeout(SESSION_CLOSE_TIMEOUT, session.close()).await {
        Ok(Ok(())) => tracing::info!("closed storage session"),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "graceful session close failed, aborting");
            session.abort();
        }
        Err(_) => {
            tracing::warn!(
                timeout = ?SESSION_CLOSE_TIMEOUT,
                "graceful session close timed out, aborting"
            );
            session.abort();
        }
    }
}
