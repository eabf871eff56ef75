//! Thin composition root over the `worker` library: bootstrap, spawn the
//! independent supervisors, enter the reconciliation loop, and translate any
//! fatal error into exit code 2 (the supervisor — systemd, the container
//! orchestrator itself — is expected to restart the process).

use tracing::error;

use worker::bootstrap;
use worker::reconcile;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("worker failed: {e:#}");
        error!(error = %e, "worker exiting fatally");
        std::process::exit(2);
    }
}

async fn run() -> anyhow::Result<()> {
    let (ctx, initial_snapshot) = bootstrap::bootstrap().await?;

    let health_handle = bootstrap::spawn_health_watcher(std::sync::Arc::clone(&ctx));

    tokio::select! {
        result = reconcile::run(std::sync::Arc::clone(&ctx), initial_snapshot) => {
            result.map_err(anyhow::Error::from)
        }
        joined = health_handle => {
            match joined {
                Ok(inner) => inner,
                Err(e) => Err(anyhow::anyhow!("health watcher task panicked: {e}")),
            }
        }
    }
}
