//! Reconciliation engine: diffs a freshly fetched snapshot against the
//! cached one and dispatches the lifecycle operators in `lifecycle`. This is
//! the core component everything else in the crate exists to support.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::context::WorkerContext;
use crate::lifecycle;
use crate::manager::{poll, DeviceGroupReply, ManagerError};
use crate::messaging::ReportError;
use crate::model::{DeviceGroupSnapshot, SnapshotError};
use crate::report;
use crate::runtime::RuntimeError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("manager fetch failed: {0}")]
    Manager(#[from] ManagerError),
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(#[from] SnapshotError),
    #[error("runtime operation failed: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("state report failed: {0}")]
    Report(#[from] ReportError),
}

/// The per-app action the diff step resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppAction {
    None,
    Stop,
    Roll,
    Restart,
}

fn decide_action(remote_app: &crate::model::AppSpec, local: &DeviceGroupSnapshot) -> AppAction {
    match local.app(&remote_app.app_name) {
        None => AppAction::Restart,
        Some(local_app) => {
            if remote_app.app_id <= local_app.app_id {
                // Equal: no change. Decreased: source silently ignores it
                // Decreasing app_id is treated as a no-op rather than a
                // fatal malformation, just logged.
                if remote_app.app_id < local_app.app_id {
                    warn!(
                        app = %remote_app.app_name,
                        remote_id = remote_app.app_id,
                        local_id = local_app.app_id,
                        "remote app_id decreased, ignoring (not rolling back)"
                    );
                }
                AppAction::None
            } else if !remote_app.running {
                AppAction::Stop
            } else if remote_app.rolling_restart && local_app.running {
                AppAction::Roll
            } else {
                AppAction::Restart
            }
        }
    }
}

/// One reconciliation pass. Takes the current cached
/// snapshot by value and returns the (possibly unchanged) snapshot that
/// should replace it, per the atomic-replace-only-if-dirty rule of step 7.
pub async fn reconcile_once(
    ctx: &WorkerContext,
    local: DeviceGroupSnapshot,
) -> Result<DeviceGroupSnapshot, ReconcileError> {
    let remote = match poll::fetch_with_retry(ctx.manager.as_ref(), &ctx.config.device_group).await? {
        DeviceGroupReply::Snapshot(snapshot) => snapshot,
        DeviceGroupReply::DeviceGroupAbsent => {
            warn!(device_group = %ctx.config.device_group, "device group reported absent mid-run, skipping this pass");
            return Ok(local);
        }
    };

    remote.validate()?;

    let mut dirty = false;

    for remote_app in &remote.apps {
        match decide_action(remote_app, &local) {
            AppAction::None => {}
            AppAction::Stop => {
                dirty = true;
                info!(app = %remote_app.app_name, "stopping app due to configuration change");
                lifecycle::stop(ctx, &remote_app.app_name).await?;
            }
            AppAction::Roll => {
                dirty = true;
                info!(app = %remote_app.app_name, "rolling app due to configuration change");
                lifecycle::roll(ctx, remote_app, true).await?;
            }
            AppAction::Restart => {
                dirty = true;
                info!(app = %remote_app.app_name, "restarting app due to configuration change");
                lifecycle::restart(ctx, remote_app, true).await?;
            }
        }
    }

    if remote.device_group_id > local.device_group_id {
        dirty = true;
        for local_app in &local.apps {
            if !remote.apps_list.contains(&local_app.app_name) {
                info!(app = %local_app.app_name, "removing app dropped from device group");
                lifecycle::stop(ctx, &local_app.app_name).await?;
            }
        }
    }

    if remote.prune_id > local.prune_id {
        dirty = true;
        info!("pruning images due to prune_id advance");
        lifecycle::prune_images(ctx).await?;
    }

    let effective = if dirty { remote } else { local };

    if let Some(producer) = ctx.producer.clone() {
        if let Err(e) = report::emit(ctx, &producer, &effective).await {
            report::log_emit_failure(&e);
            return Err(ReconcileError::from(e));
        }
    }

    Ok(effective)
}

/// The forever loop: sleep, fetch, diff, dispatch, cache-swap, report.
/// Runs until a fatal error surfaces, at which point the caller
/// (bootstrap/main) exits the process.
pub async fn run(ctx: Arc<WorkerContext>, mut local: DeviceGroupSnapshot) -> Result<(), ReconcileError> {
    let period = std::time::Duration::from_secs(ctx.config.manager.check_in_time);
    loop {
        tokio::time::sleep(period).await;
        local = reconcile_once(&ctx, local).await?;
    }
}
