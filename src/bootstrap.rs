//! Bootstrapper: the one-shot startup sequence — config load, client
//! construction, shared state assembly, background task spawn — extended
//! with a manager reachability check, a clean-slate stop, and the initial
//! app starts that run before the process enters its forever loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _};
use tracing::{info, warn};

use crate::config::{self, WorkerConfig};
use crate::context::{HostFacts, WorkerContext};
use crate::health;
use crate::lifecycle;
use crate::manager::live::LiveManagerClient;
use crate::manager::{poll, DeviceGroupReply, ManagerClient};
use crate::messaging::live::KafkaProducer;
use crate::messaging::ReportProducer;
use crate::model::DeviceGroupSnapshot;
use crate::reconcile;
use crate::runtime::live::LiveRuntime;
use crate::runtime::ContainerRuntime;

const NEBULA_NETWORK: &str = "nebula";
const NEBULA_NETWORK_DRIVER: &str = "bridge";

/// Builds an `EnvFilter` + `fmt` layer subscriber, with `log_format` /
/// `log_level` selecting the pretty/json layer and the default filter
/// directive.
pub fn init_logging(config: &WorkerConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("worker={}", config.logging.level).into());

    if config.logging.format == "json" {
        tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Runs the full boot sequence and hands back the assembled context plus
/// the initial cached snapshot, ready for `reconcile::run`.
pub async fn bootstrap() -> anyhow::Result<(Arc<WorkerContext>, DeviceGroupSnapshot)> {
    let config = config::load().context("loading configuration")?;
    init_logging(&config);

    info!(device_group = %config.device_group, "starting worker");

    let facts = HostFacts::probe();
    info!(cpu_cores = facts.cpu_cores, total_mem_mib = facts.total_mem_mib, "probed host facts");

    let runtime: Arc<dyn ContainerRuntime> =
        Arc::new(LiveRuntime::connect(&config.docker_socket).context("connecting to container runtime")?);

    runtime
        .create_docker_network(NEBULA_NETWORK, NEBULA_NETWORK_DRIVER)
        .await
        .context("ensuring nebula bridge network exists")?;

    if !config.registry.auth_user.is_empty() {
        runtime
            .registry_login(&config.registry.host, &config.registry.auth_user, &config.registry.auth_password)
            .await
            .context("registry login")?;
    } else {
        info!("no registry credentials configured, skipping registry login");
    }

    let manager = Arc::new(LiveManagerClient::new(
        config.manager_base_url(),
        config.manager.auth_user.clone(),
        config.manager.auth_password.clone(),
        Duration::from_secs(config.manager.request_timeout),
    )?);

    let check = manager.check_api().await.context("checking manager reachability")?;
    if check.status_code != 200 || !check.api_available {
        bail!("manager reachability check failed: status={} available={}", check.status_code, check.api_available);
    }
    info!("manager connection ok");

    let producer: Option<Arc<dyn ReportProducer>> = if config.reporting_enabled() {
        match KafkaProducer::connect(&config.kafka).await {
            Ok(p) => Some(Arc::new(p) as Arc<dyn ReportProducer>),
            Err(e) if config.reporting_fail_hard => {
                return Err(anyhow::anyhow!(e)).context("constructing kafka report producer");
            }
            Err(e) => {
                warn!(error = %e, "failed to construct kafka report producer, continuing without reporting");
                None
            }
        }
    } else {
        None
    };

    let ctx = WorkerContext::new(config, facts, Arc::clone(&runtime), manager as Arc<dyn crate::manager::ManagerClient>, producer);

    info!("stopping all preexisting managed containers for a clean slate");
    lifecycle::stop(&ctx, "").await.context("clean-slate stop")?;

    let initial = fetch_initial_snapshot(&ctx).await?;

    for app in &initial.apps {
        if app.running {
            info!(app = %app.app_name, "initial start");
            lifecycle::start(&ctx, app, true).await.context("initial app start")?;
            info!(app = %app.app_name, "completed initial start");
        }
    }

    Ok((ctx, initial))
}

/// Retries indefinitely while the manager reports the device group does
/// not yet exist — this is not an error, just a wait.
async fn fetch_initial_snapshot(ctx: &WorkerContext) -> anyhow::Result<DeviceGroupSnapshot> {
    loop {
        match poll::fetch_with_retry(ctx.manager.as_ref(), &ctx.config.device_group).await? {
            DeviceGroupReply::Snapshot(snapshot) => {
                snapshot.validate().context("initial snapshot malformed")?;
                return Ok(snapshot);
            }
            DeviceGroupReply::DeviceGroupAbsent => {
                warn!(
                    device_group = %ctx.config.device_group,
                    wait_secs = ctx.config.manager.check_in_time,
                    "device group does not exist yet, waiting"
                );
                tokio::time::sleep(Duration::from_secs(ctx.config.manager.check_in_time)).await;
            }
        }
    }
}

/// Spawns the independent health-watcher supervisor. A failure there is
/// fatal to the whole process.
pub fn spawn_health_watcher(ctx: Arc<WorkerContext>) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move { health::run(ctx).await.map_err(anyhow::Error::from) })
}
