//! Process shutdown: stop the trigger, then log out of the directory once.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::info;

use vmtier_directory::SessionManager;

/// Wait for SIGTERM or Ctrl-C.
pub async fn wait_for_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("failed to install Ctrl-C handler")?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("failed to install Ctrl-C handler")?;

    Ok(())
}

/// Stop accepting invocations and release the directory session.
pub async fn stop(shutdown_tx: &watch::Sender<bool>, sessions: &SessionManager) {
    let _ = shutdown_tx.send(true);
    if sessions.shutdown().await {
        info!("directory session released");
    }
}

/// Spawn the task that runs [`stop`] on the first signal.
pub fn spawn_signal_listener(
    shutdown_tx: watch::Sender<bool>,
    sessions: Arc<SessionManager>,
) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move {
        wait_for_signal().await?;
        info!("shutdown signal received");
        stop(&shutdown_tx, &sessions).await;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmtier_core::ConnectionParams;
    use vmtier_directory::InMemoryDirectory;

    fn params() -> ConnectionParams {
        ConnectionParams {
            server: "vcsa.lab.local".to_string(),
            user: "administrator@vsphere.local".to_string(),
            password: "secret".to_string(),
            insecure: false,
        }
    }

    #[tokio::test]
    async fn stop_signals_trigger_and_logs_out_once() {
        let dir = InMemoryDirectory::new();
        let sessions = SessionManager::new(Arc::new(dir.clone()));
        sessions.ensure_session(&params()).await.unwrap();

        let (tx, mut rx) = watch::channel(false);
        stop(&tx, &sessions).await;
        stop(&tx, &sessions).await;

        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        assert_eq!(dir.logout_count(), 1);
    }

    #[tokio::test]
    async fn stop_without_session_still_signals() {
        let dir = InMemoryDirectory::new();
        let sessions = SessionManager::new(Arc::new(dir.clone()));

        let (tx, rx) = watch::channel(false);
        stop(&tx, &sessions).await;

        assert!(*rx.borrow());
        assert_eq!(dir.logout_count(), 0);
    }
}
