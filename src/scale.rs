//! Scale resolver: turns an app's `ScalingPolicy` plus host facts into
//! a replica count.

use crate::context::HostFacts;
use crate::model::{AppSpec, ScalingPolicy, SnapshotError};

pub fn resolve(app: &AppSpec, facts: &HostFacts) -> Result<u32, SnapshotError> {
    let policy = app.scaling_policy()?;
    let n = match policy {
        ScalingPolicy::PerCpu(per_cpu) => (facts.cpu_cores as f64 * per_cpu).floor(),
        ScalingPolicy::PerMemMiB(per_mem) => {
            if per_mem <= 0.0 {
                0.0
            } else {
                (facts.total_mem_mib as f64 / per_mem).floor()
            }
        }
        ScalingPolicy::PerInstance(count) => count.floor(),
    };
    Ok(n.max(0.0) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> HostFacts {
        HostFacts { cpu_cores: 4, total_mem_mib: 8192 }
    }

    fn app_with(containers_per: serde_json::Value) -> AppSpec {
        serde_json::from_value(serde_json::json!({
            "app_name": "web",
            "app_id": 1,
            "docker_image": "nginx",
            "running": true,
            "containers_per": containers_per,
        }))
        .unwrap()
    }

    #[test]
    fn per_cpu_floors_to_integer() {
        let app = app_with(serde_json::json!({"cpu": 1.5}));
        assert_eq!(resolve(&app, &facts()).unwrap(), 6);
    }

    #[test]
    fn per_mem_divides_total_memory() {
        let app = app_with(serde_json::json!({"mem": 2048.0}));
        assert_eq!(resolve(&app, &facts()).unwrap(), 4);
    }

    #[test]
    fn per_instance_is_literal() {
        let app = app_with(serde_json::json!({"server": 3.0}));
        assert_eq!(resolve(&app, &facts()).unwrap(), 3);
    }

    #[test]
    fn zero_instance_count_is_a_noop_scale() {
        let app = app_with(serde_json::json!({"server": 0.0}));
        assert_eq!(resolve(&app, &facts()).unwrap(), 0);
    }

    #[test]
    fn unrecognized_key_is_an_error() {
        let app = app_with(serde_json::json!({"bogus": 1.0}));
        assert!(resolve(&app, &facts()).is_err());
    }
}
