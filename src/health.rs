//! Health watcher: an independent supervisor loop that lists every
//! managed container and restarts any that fail their health check, on a
//! fresh full listing each tick rather than an incrementally-maintained
//! inventory.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::context::WorkerContext;
use crate::runtime::RuntimeError;

const HEALTH_CHECK_PERIOD: Duration = Duration::from_secs(10);

/// Runs forever. A listing or inspection failure is fatal: an unhealthy host
/// is preferable to a silently-dead watcher, so this returns `Err` for the
/// caller (bootstrap) to turn into a process exit rather than swallowing it
/// here.
pub async fn run(ctx: Arc<WorkerContext>) -> Result<(), RuntimeError> {
    let mut interval = tokio::time::interval(HEALTH_CHECK_PERIOD);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if let Err(e) = check_once(&ctx).await {
            error!(error = %e, "health watcher failed listing or inspecting containers");
            return Err(e);
        }
    }
}

async fn check_once(ctx: &WorkerContext) -> Result<(), RuntimeError> {
    let containers = ctx.runtime.list_containers("").await?;

    for container in containers {
        let healthy = ctx.runtime.check_container_healthy(&container.id).await?;
        if !healthy {
            warn!(container = %container.name, id = %container.id, "container unhealthy, restarting");
            ctx.runtime.restart_container(&container.id).await?;
            info!(container = %container.name, id = %container.id, "restarted unhealthy container");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::context::HostFacts;
    use crate::manager::fake::FakeManagerClient;
    use crate::runtime::fake::FakeRuntime;
    use crate::runtime::{ContainerRuntime, RunSpec};

    fn ctx_with(runtime: Arc<FakeRuntime>) -> Arc<WorkerContext> {
        WorkerContext::new(
            WorkerConfig::default(),
            HostFacts { cpu_cores: 2, total_mem_mib: 2048 },
            runtime as Arc<dyn ContainerRuntime>,
            Arc::new(FakeManagerClient::new()),
            None,
        )
    }

    #[tokio::test]
    async fn restarts_only_unhealthy_containers() {
        let runtime = Arc::new(FakeRuntime::new());
        let ctx = ctx_with(Arc::clone(&runtime));

        let healthy = runtime
            .run_container(&RunSpec { name: "web-1".to_string(), ..Default::default() })
            .await
            .unwrap();
        let unhealthy = runtime
            .run_container(&RunSpec { name: "web-2".to_string(), ..Default::default() })
            .await
            .unwrap();
        runtime.mark_unhealthy(&unhealthy.id);

        check_once(&ctx).await.unwrap();

        assert!(runtime.check_container_healthy(&healthy.id).await.unwrap());
        assert!(runtime.check_container_healthy(&unhealthy.id).await.unwrap());
    }

    #[tokio::test]
    async fn no_containers_is_a_clean_noop() {
        let runtime = Arc::new(FakeRuntime::new());
        let ctx = ctx_with(runtime);
        assert!(check_once(&ctx).await.is_ok());
    }
}
