//! vmtierd — the vmtier daemon.
//!
//! Listens for alarm invocations over HTTP and tags the alarmed VM with
//! its next CPU or memory tier.
//!
//! # Usage
//!
//! ```text
//! vmtierd --listen 0.0.0.0:8080 --config /var/openfaas/secrets/vcconfig
//! ```

mod lifecycle;
mod logging;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use vmtier_core::{DEFAULT_CONFIG_PATH, TomlFileSource};
use vmtier_directory::vcenter::DEFAULT_TIMEOUT;
use vmtier_directory::{SessionManager, VCenterConnector};
use vmtier_tagger::TaggingOrchestrator;
use vmtier_trigger::{DEFAULT_BODY_LIMIT, HttpTrigger, InvocationHandler, Reply};

#[derive(Parser)]
#[command(name = "vmtierd", about = "Tag VMs with their next CPU/memory tier on red alarms")]
struct Cli {
    /// Address the HTTP trigger listens on.
    #[arg(long, env = "VMTIER_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// vCenter connection parameters (TOML), re-read on every invocation.
    #[arg(long, env = "VMTIER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Per-request timeout for vCenter API calls, in seconds.
    #[arg(long, env = "VMTIER_VCENTER_TIMEOUT", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    vcenter_timeout: u64,

    /// Largest accepted invocation body, in bytes.
    #[arg(long, env = "VMTIER_BODY_LIMIT", default_value_t = DEFAULT_BODY_LIMIT)]
    body_limit: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let params = TomlFileSource::new(cli.config);
    info!(config = %params.path().display(), "vmtier daemon starting");

    let connector =
        VCenterConnector::new().with_timeout(Duration::from_secs(cli.vcenter_timeout));
    let sessions = Arc::new(SessionManager::new(Arc::new(connector)));
    let orchestrator = Arc::new(TaggingOrchestrator::new(Arc::new(params), sessions.clone()));

    let handler: InvocationHandler = Arc::new(move |body: Bytes| {
        let orchestrator = orchestrator.clone();
        Box::pin(async move {
            let response = orchestrator.handle(&body).await;
            Reply::new(response.status, response.body)
        })
    });

    let trigger = HttpTrigger::bind(cli.listen, handler)
        .await?
        .with_body_limit(cli.body_limit);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signals = lifecycle::spawn_signal_listener(shutdown_tx, sessions);

    trigger.serve(shutdown_rx).await?;

    // The listener only returns after it has released the session.
    signals.await??;

    info!("vmtier daemon stopped");
    Ok(())
}
