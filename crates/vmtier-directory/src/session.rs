//! Process-wide directory session.
//!
//! `SessionManager` owns at most one connected [`Session`]. The first
//! invocation that needs it connects; everyone else reuses it. The
//! check-then-connect runs under an async mutex, so invocations racing on
//! first use wait for the winner instead of opening a second connection.
//!
//! Once installed, the session is handed out as an `Arc` and used without
//! further locking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use vmtier_core::ConnectionParams;

use crate::error::DirectoryResult;
use crate::service::{Connector, Directory};

/// An authenticated connection shared across invocations.
pub struct Session {
    id: u64,
    directory: Arc<dyn Directory>,
}

impl Session {
    /// Process-unique identity of this session.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn directory(&self) -> &dyn Directory {
        self.directory.as_ref()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish_non_exhaustive()
    }
}

pub struct SessionManager {
    connector: Arc<dyn Connector>,
    current: Mutex<Option<Arc<Session>>>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Return the installed session, connecting first if there is none.
    ///
    /// A failed connection installs nothing; the next call tries again.
    pub async fn ensure_session(&self, params: &ConnectionParams) -> DirectoryResult<Arc<Session>> {
        let mut current = self.current.lock().await;

        if let Some(session) = current.as_ref() {
            debug!(session = session.id, "reusing directory session");
            return Ok(session.clone());
        }

        debug!(server = %params.server, "connecting to directory");
        let directory = self.connector.connect(params).await?;

        let session = Arc::new(Session {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            directory,
        });
        info!(session = session.id, server = %params.server, "directory session established");

        *current = Some(session.clone());
        Ok(session)
    }

    /// The installed session, if any.
    pub async fn current(&self) -> Option<Arc<Session>> {
        self.current.lock().await.clone()
    }

    /// Log out of the installed session, once.
    ///
    /// Returns `false` when shutdown already ran. Logout failures are
    /// logged and otherwise ignored.
    pub async fn shutdown(&self) -> bool {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("directory shutdown already ran");
            return false;
        }

        let Some(session) = self.current.lock().await.take() else {
            debug!("no directory session to log out of");
            return true;
        };

        match session.directory.logout().await {
            Ok(()) => info!(session = session.id, "logged out of directory"),
            Err(e) => warn!(session = session.id, error = %e, "directory logout failed"),
        }
        true
    }
}
