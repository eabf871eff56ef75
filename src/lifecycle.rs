//! Lifecycle operators: `start` / `stop` / `restart` / `roll` /
//! `prune_images`, the core reconciliation component applying lifecycle
//! decisions against the container runtime.
//!
//! Fan-out for `start`/`stop` is a bounded worker pool — `cpu_cores * 4` —
//! instead of one task per container, keeping a large replica count from
//! opening that many sockets to the runtime at once.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::context::WorkerContext;
use crate::image::parse_image_ref;
use crate::model::AppSpec;
use crate::ports::plan;
use crate::runtime::{RunSpec, RuntimeError};
use crate::scale::resolve;

const ROLL_INTER_REPLICA_PAUSE: Duration = Duration::from_secs(5);

/// `jitter(max)` sleeps a uniform random duration in `[0, max]`. `max == 0`
/// is the common no-op case.
async fn jitter(max_seconds: u64) {
    if max_seconds == 0 {
        return;
    }
    let wait = rand::thread_rng().gen_range(0..=max_seconds);
    if wait > 0 {
        tokio::time::sleep(Duration::from_secs(wait)).await;
    }
}

fn worker_pool_size(ctx: &WorkerContext) -> usize {
    (ctx.facts.cpu_cores as usize * 4).max(1)
}

type BoxedOp = Pin<Box<dyn Future<Output = Result<(), RuntimeError>> + Send>>;

async fn run_bounded(ctx: &WorkerContext, items: Vec<BoxedOp>) -> Result<(), RuntimeError> {
    let semaphore = Arc::new(Semaphore::new(worker_pool_size(ctx)));
    let mut tasks = JoinSet::new();

    for item in items {
        let permit = Arc::clone(&semaphore).acquire_owned().await.expect("semaphore not closed");
        tasks.spawn(async move {
            let _permit = permit;
            item.await
        });
    }

    let mut first_err = None;
    while let Some(joined) = tasks.join_next().await {
        let result = joined.expect("lifecycle worker task panicked");
        if let Err(e) = result {
            if first_err.is_none() {
                first_err = Some(e);
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// `start(app, force_pull)`. If the app already has containers
/// running, this degrades to `restart` (idempotent convergence: a duplicate
/// `restart` call from the diff engine and an ordinary `start` collapse to
/// the same code path). If `app.running == false`, no-op.
pub async fn start(ctx: &WorkerContext, app: &AppSpec, force_pull: bool) -> Result<(), RuntimeError> {
    let existing = ctx.runtime.list_containers(&app.app_name).await?;
    if !existing.is_empty() {
        info!(app = %app.app_name, "app already has running containers, restarting instead of starting");
        return restart(ctx, app, force_pull).await;
    }

    if !app.running {
        return Ok(());
    }

    let parsed = parse_image_ref(&app.docker_image);
    let replicas = resolve(app, &ctx.facts).map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?;

    if force_pull {
        ctx.runtime.pull_image(&parsed.image_full, &parsed.tag).await?;
    }

    let mut tasks: Vec<BoxedOp> = Vec::new();
    for replica_index in 1..=replicas {
        let runtime = Arc::clone(&ctx.runtime);
        let spec = build_run_spec(app, &parsed, replica_index, replica_index - 1);
        tasks.push(Box::pin(async move { runtime.run_container(&spec).await.map(|_| ()) }));
    }

    run_bounded(ctx, tasks).await
}

/// `stop(app_name)`. An empty `app_name` matches every managed
/// container; used for the boot-time clean slate.
pub async fn stop(ctx: &WorkerContext, app_name: &str) -> Result<(), RuntimeError> {
    let containers = ctx.runtime.list_containers(app_name).await?;

    let mut tasks: Vec<BoxedOp> = Vec::new();
    for container in containers {
        let runtime = Arc::clone(&ctx.runtime);
        let id = container.id;
        tasks.push(Box::pin(async move { runtime.stop_and_remove_container(&id).await }));
    }

    run_bounded(ctx, tasks).await
}

/// `restart(app, force_pull)` = jitter → optional pull → stop → start.
pub async fn restart(ctx: &WorkerContext, app: &AppSpec, force_pull: bool) -> Result<(), RuntimeError> {
    jitter(ctx.config.max_restart_wait_in_seconds).await;

    let parsed = parse_image_ref(&app.docker_image);
    if force_pull {
        ctx.runtime.pull_image(&parsed.image_full, &parsed.tag).await?;
    }

    stop(ctx, &app.app_name).await?;
    start(ctx, app, false).await
}

/// `roll(app, force_pull)`. Strictly sequential: replacing replicas
/// one at a time with a 5s settle pause so at most one replica is ever
/// absent, unlike `start`/`stop`'s parallel fan-out.
pub async fn roll(ctx: &WorkerContext, app: &AppSpec, force_pull: bool) -> Result<(), RuntimeError> {
    jitter(ctx.config.max_restart_wait_in_seconds).await;

    let parsed = parse_image_ref(&app.docker_image);
    if force_pull {
        ctx.runtime.pull_image(&parsed.image_full, &parsed.tag).await?;
    }

    let mut containers = ctx.runtime.list_containers(&app.app_name).await?;
    containers.sort_by(|a, b| a.name.cmp(&b.name));

    let replicas_needed = resolve(app, &ctx.facts).map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?;

    for (idx, container) in containers.into_iter().enumerate() {
        let idx = idx as u32;
        ctx.runtime.stop_and_remove_container(&container.id).await?;

        if idx < replicas_needed {
            let spec = build_run_spec(app, &parsed, idx + 1, idx);
            ctx.runtime.run_container(&spec).await?;
        }

        tokio::time::sleep(ROLL_INTER_REPLICA_PAUSE).await;
    }

    Ok(())
}

/// `prune_images()`. No jitter, no retry.
pub async fn prune_images(ctx: &WorkerContext) -> Result<(), RuntimeError> {
    ctx.runtime.prune_images().await
}

fn build_run_spec(
    app: &AppSpec,
    parsed: &crate::image::ParsedImage,
    replica_number: u32,
    port_replica_index: u32,
) -> RunSpec {
    let port_plan = plan(app, port_replica_index);
    RunSpec {
        app_name: app.app_name.clone(),
        name: format!("{}-{}", app.app_name, replica_number),
        image: parsed.image_with_tag(),
        port_binds: port_plan.binds,
        env_vars: app.env_vars.clone(),
        volumes: app.volumes.clone(),
        devices: app.devices.clone(),
        privileged: app.privileged,
        networks: app.networks.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::context::HostFacts;
    use crate::manager::fake::FakeManagerClient;
    use crate::runtime::fake::FakeRuntime;
    use crate::runtime::ContainerRuntime;

    fn ctx_with(runtime: Arc<FakeRuntime>) -> Arc<WorkerContext> {
        WorkerContext::new(
            WorkerConfig { max_restart_wait_in_seconds: 0, ..WorkerConfig::default() },
            HostFacts { cpu_cores: 4, total_mem_mib: 8192 },
            runtime as Arc<dyn ContainerRuntime>,
            Arc::new(FakeManagerClient::new()),
            None,
        )
    }

    fn app(containers_per: serde_json::Value, running: bool) -> AppSpec {
        serde_json::from_value(serde_json::json!({
            "app_name": "web",
            "app_id": 1,
            "docker_image": "nginx:1.25",
            "running": running,
            "containers_per": containers_per,
            "starting_ports": [80],
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn start_creates_resolved_replica_count() {
        let runtime = Arc::new(FakeRuntime::new());
        let ctx = ctx_with(Arc::clone(&runtime));
        let a = app(serde_json::json!({"server": 2.0}), true);
        start(&ctx, &a, true).await.unwrap();

        let containers = runtime.containers();
        assert_eq!(containers.len(), 2);
        assert!(containers.iter().any(|c| c.name == "web-1"));
        assert!(containers.iter().any(|c| c.name == "web-2"));
    }

    #[tokio::test]
    async fn start_is_noop_when_not_running() {
        let runtime = Arc::new(FakeRuntime::new());
        let ctx = ctx_with(Arc::clone(&runtime));
        let a = app(serde_json::json!({"server": 2.0}), false);
        start(&ctx, &a, true).await.unwrap();
        assert!(runtime.containers().is_empty());
    }

    #[tokio::test]
    async fn start_when_already_running_delegates_to_restart() {
        let runtime = Arc::new(FakeRuntime::new());
        let ctx = ctx_with(Arc::clone(&runtime));
        let a = app(serde_json::json!({"server": 1.0}), true);
        start(&ctx, &a, true).await.unwrap();
        let first_id = runtime.containers()[0].id.clone();

        start(&ctx, &a, true).await.unwrap();
        let containers = runtime.containers();
        assert_eq!(containers.len(), 1);
        assert_ne!(containers[0].id, first_id);
    }

    #[tokio::test]
    async fn stop_then_stop_is_idempotent() {
        let runtime = Arc::new(FakeRuntime::new());
        let ctx = ctx_with(Arc::clone(&runtime));
        let a = app(serde_json::json!({"server": 2.0}), true);
        start(&ctx, &a, true).await.unwrap();

        stop(&ctx, "web").await.unwrap();
        assert!(runtime.containers().is_empty());
        stop(&ctx, "web").await.unwrap();
        assert!(runtime.containers().is_empty());
    }

    #[tokio::test]
    async fn roll_replaces_replicas_one_at_a_time() {
        let runtime = Arc::new(FakeRuntime::new());
        let ctx = ctx_with(Arc::clone(&runtime));
        let a = app(serde_json::json!({"server": 2.0}), true);
        start(&ctx, &a, true).await.unwrap();

        roll(&ctx, &a, true).await.unwrap();
        let containers = runtime.containers();
        assert_eq!(containers.len(), 2);
    }

    #[tokio::test]
    async fn roll_scale_down_drops_excess_replicas() {
        let runtime = Arc::new(FakeRuntime::new());
        let ctx = ctx_with(Arc::clone(&runtime));
        let up = app(serde_json::json!({"server": 3.0}), true);
        start(&ctx, &up, true).await.unwrap();

        let down = app(serde_json::json!({"server": 1.0}), true);
        roll(&ctx, &down, true).await.unwrap();

        assert_eq!(runtime.containers().len(), 1);
    }

    #[tokio::test]
    async fn zero_scale_start_is_a_noop() {
        let runtime = Arc::new(FakeRuntime::new());
        let ctx = ctx_with(Arc::clone(&runtime));
        let a = app(serde_json::json!({"server": 0.0}), true);
        start(&ctx, &a, true).await.unwrap();
        assert!(runtime.containers().is_empty());
    }

    #[tokio::test]
    async fn prune_images_invokes_runtime_prune_exactly_once() {
        let runtime = Arc::new(FakeRuntime::new());
        let ctx = ctx_with(Arc::clone(&runtime));
        prune_images(&ctx).await.unwrap();
        assert_eq!(runtime.prune_count(), 1);
    }
}
