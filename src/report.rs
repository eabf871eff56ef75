//! Report emitter: builds a state report describing currently managed
//! containers and hands it to the configured `ReportProducer`. Containers
//! are projected per-app (id, name, image, status, ports) rather than flat.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, warn};

use crate::context::WorkerContext;
use crate::image::parse_image_ref;
use crate::messaging::{ReportError, ReportProducer};
use crate::model::DeviceGroupSnapshot;
use crate::ports::plan;
use crate::runtime::RuntimeError;

#[derive(Debug, Clone, Serialize)]
pub struct ContainerReport {
    pub id: String,
    pub name: String,
    pub status: String,
    pub image: String,
    pub ports: Vec<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppReport {
    pub app_name: String,
    pub app_id: i64,
    pub running: bool,
    pub containers: Vec<ContainerReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateReport {
    pub device_group: String,
    pub device_group_id: i64,
    pub prune_id: i64,
    pub apps: Vec<AppReport>,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// Parses the `N` out of a managed container's `"{app_name}-{N}"` name so
/// the reporter can recompute its port plan without the runtime contract
/// needing to carry port bindings in `list_containers`.
fn replica_index_from_name(app_name: &str, container_name: &str) -> Option<u32> {
    let suffix = container_name.strip_prefix(app_name)?.strip_prefix('-')?;
    suffix.parse::<u32>().ok().map(|n| n.saturating_sub(1))
}

pub async fn build_report(ctx: &WorkerContext, local: &DeviceGroupSnapshot) -> Result<StateReport, RuntimeError> {
    let mut apps = Vec::with_capacity(local.apps.len());

    for app in &local.apps {
        let parsed = parse_image_ref(&app.docker_image);
        let handles = ctx.runtime.list_containers(&app.app_name).await?;

        let containers = handles
            .into_iter()
            .map(|handle| {
                let ports = replica_index_from_name(&app.app_name, &handle.name)
                    .map(|idx| plan(app, idx).exposed)
                    .unwrap_or_default();
                ContainerReport {
                    id: handle.id,
                    name: handle.name,
                    status: handle.status,
                    image: parsed.image_with_tag(),
                    ports,
                }
            })
            .collect();

        apps.push(AppReport {
            app_name: app.app_name.clone(),
            app_id: app.app_id,
            running: app.running,
            containers,
        });
    }

    Ok(StateReport {
        device_group: ctx.config.device_group.clone(),
        device_group_id: local.device_group_id,
        prune_id: local.prune_id,
        apps,
        generated_at: chrono::Utc::now(),
    })
}

/// Builds and publishes the report for this pass, honoring
/// `reporting_fail_hard`.
pub async fn emit(
    ctx: &WorkerContext,
    producer: &Arc<dyn ReportProducer>,
    local: &DeviceGroupSnapshot,
) -> Result<(), ReportError> {
    let report = match build_report(ctx, local).await {
        Ok(report) => report,
        Err(e) if ctx.config.reporting_fail_hard => return Err(ReportError::Build(e.to_string())),
        Err(e) => {
            warn!(error = %e, "failed to build state report, continuing (reporting_fail_hard=false)");
            return Ok(());
        }
    };

    match producer.push_report(&report).await {
        Ok(()) => Ok(()),
        Err(e) if ctx.config.reporting_fail_hard => Err(e),
        Err(e) => {
            warn!(error = %e, "failed to publish state report, continuing (reporting_fail_hard=false)");
            Ok(())
        }
    }
}

pub fn log_emit_failure(err: &ReportError) {
    error!(error = %err, "state report failed and reporting_fail_hard is true");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::context::HostFacts;
    use crate::manager::fake::FakeManagerClient;
    use crate::messaging::fake::FakeProducer;
    use crate::runtime::fake::FakeRuntime;
    use crate::runtime::{ContainerRuntime, RunSpec};

    fn app(name: &str) -> crate::model::AppSpec {
        serde_json::from_value(serde_json::json!({
            "app_name": name,
            "app_id": 1,
            "docker_image": "nginx:1.25",
            "running": true,
            "containers_per": {"server": 1.0},
            "starting_ports": [80],
        }))
        .unwrap()
    }

    fn ctx_with(runtime: Arc<FakeRuntime>, fail_hard: bool) -> Arc<WorkerContext> {
        WorkerContext::new(
            WorkerConfig { reporting_fail_hard: fail_hard, ..WorkerConfig::default() },
            HostFacts { cpu_cores: 2, total_mem_mib: 2048 },
            runtime as Arc<dyn ContainerRuntime>,
            Arc::new(FakeManagerClient::new()),
            None,
        )
    }

    #[tokio::test]
    async fn report_includes_each_apps_containers_with_recomputed_ports() {
        let runtime = Arc::new(FakeRuntime::new());
        let ctx = ctx_with(Arc::clone(&runtime), true);
        runtime
            .run_container(&RunSpec { name: "web-1".to_string(), ..Default::default() })
            .await
            .unwrap();

        let snapshot = DeviceGroupSnapshot {
            device_group_id: 1,
            prune_id: 0,
            apps: vec![app("web")],
            apps_list: ["web".to_string()].into_iter().collect(),
        };

        let report = build_report(&ctx, &snapshot).await.unwrap();
        assert_eq!(report.apps.len(), 1);
        assert_eq!(report.apps[0].containers.len(), 1);
        assert_eq!(report.apps[0].containers[0].ports, vec![80]);
    }

    #[tokio::test]
    async fn fail_hard_true_propagates_publish_errors() {
        let runtime = Arc::new(FakeRuntime::new());
        let ctx = ctx_with(runtime, true);
        let producer: Arc<dyn ReportProducer> = Arc::new(FakeProducer::failing());
        let snapshot = DeviceGroupSnapshot::empty();

        assert!(emit(&ctx, &producer, &snapshot).await.is_err());
    }

    #[tokio::test]
    async fn fail_hard_false_swallows_publish_errors() {
        let runtime = Arc::new(FakeRuntime::new());
        let ctx = ctx_with(runtime, false);
        let producer: Arc<dyn ReportProducer> = Arc::new(FakeProducer::failing());
        let snapshot = DeviceGroupSnapshot::empty();

        assert!(emit(&ctx, &producer, &snapshot).await.is_ok());
    }

    #[tokio::test]
    async fn fail_hard_true_propagates_build_errors() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.fail_next_list();
        let ctx = ctx_with(Arc::clone(&runtime), true);
        let producer: Arc<dyn ReportProducer> = Arc::new(FakeProducer::new());
        let snapshot = DeviceGroupSnapshot {
            device_group_id: 1,
            prune_id: 0,
            apps: vec![app("web")],
            apps_list: ["web".to_string()].into_iter().collect(),
        };

        assert!(emit(&ctx, &producer, &snapshot).await.is_err());
    }

    #[tokio::test]
    async fn fail_hard_false_swallows_build_errors() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.fail_next_list();
        let ctx = ctx_with(Arc::clone(&runtime), false);
        let producer: Arc<dyn ReportProducer> = Arc::new(FakeProducer::new());
        let snapshot = DeviceGroupSnapshot {
            device_group_id: 1,
            prune_id: 0,
            apps: vec![app("web")],
            apps_list: ["web".to_string()].into_iter().collect(),
        };

        assert!(emit(&ctx, &producer, &snapshot).await.is_ok());
    }
}
