//! Desired-state data model: `AppSpec`, `DeviceGroupSnapshot`, and the two
//! tagged-variant value types `PortSpec` and `ScalingPolicy` that replace
//! untyped lists/maps at the deserialization boundary.

use std::collections::HashSet;

use serde::de::{Error as DeError, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("duplicate app_name in snapshot: {0}")]
    DuplicateAppName(String),
    #[error("apps_list does not match the app_name set in apps")]
    AppsListMismatch,
    #[error("app {app}: containers_per has no recognized key (expected cpu, memory/mem, or server/instance)")]
    UnrecognizedScalingKey { app: String },
    #[error("app {app}: containers_per has more than one recognized key")]
    AmbiguousScalingKey { app: String },
    #[error("app {app}: malformed starting_ports entry")]
    MalformedPort { app: String },
}

/// One declared container/host port pairing.
///
/// Wire format: either a bare integer `p` (container port `p`, host port
/// `p + replica_index`), or a single-entry object `{ "<host_port>": container_port }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSpec {
    Simple(u16),
    Mapped { host: u16, container: u16 },
}

impl<'de> Deserialize<'de> for PortSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PortSpecVisitor;

        impl<'de> Visitor<'de> for PortSpecVisitor {
            type Value = PortSpec;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a port number or a single-entry {host_port: container_port} object")
            }

            fn visit_u64<E: DeError>(self, v: u64) -> Result<PortSpec, E> {
                u16::try_from(v)
                    .map(PortSpec::Simple)
                    .map_err(|_| E::custom("port out of range"))
            }

            fn visit_i64<E: DeError>(self, v: i64) -> Result<PortSpec, E> {
                u16::try_from(v)
                    .map(PortSpec::Simple)
                    .map_err(|_| E::custom("port out of range"))
            }

            fn visit_map<A>(self, mut map: A) -> Result<PortSpec, A::Error>
            where
                A: MapAccess<'de>,
            {
                let entry: Option<(String, u16)> = map.next_entry()?;
                if map.next_entry::<String, u16>()?.is_some() {
                    return Err(DeError::custom("port mapping must have exactly one entry"));
                }
                let (host_str, container) = entry.ok_or_else(|| DeError::custom("empty port mapping"))?;
                let host: u16 = host_str
                    .parse()
                    .map_err(|_| DeError::custom("host port key must be numeric"))?;
                Ok(PortSpec::Mapped { host, container })
            }
        }

        deserializer.deserialize_any(PortSpecVisitor)
    }
}

/// Scale formula for one app, keyed by whichever `containers_per` entry is
/// present in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalingPolicy {
    PerCpu(f64),
    PerMemMiB(f64),
    PerInstance(f64),
}

impl ScalingPolicy {
    pub fn from_map(app_name: &str, map: &serde_json::Map<String, serde_json::Value>) -> Result<Self, SnapshotError> {
        let mut found: Option<ScalingPolicy> = None;
        let mut assign = |value: ScalingPolicy| -> Result<(), SnapshotError> {
            if found.is_some() {
                return Err(SnapshotError::AmbiguousScalingKey { app: app_name.to_string() });
            }
            found = Some(value);
            Ok(())
        };

        if let Some(v) = map.get("cpu").and_then(|v| v.as_f64()) {
            assign(ScalingPolicy::PerCpu(v))?;
        }
        if let Some(v) = map.get("memory").or_else(|| map.get("mem")).and_then(|v| v.as_f64()) {
            assign(ScalingPolicy::PerMemMiB(v))?;
        }
        if let Some(v) = map.get("server").or_else(|| map.get("instance")).and_then(|v| v.as_f64()) {
            assign(ScalingPolicy::PerInstance(v))?;
        }

        found.ok_or_else(|| SnapshotError::UnrecognizedScalingKey { app: app_name.to_string() })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSpec {
    pub app_name: String,
    pub app_id: i64,
    pub docker_image: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub rolling_restart: bool,
    #[serde(default)]
    pub starting_ports: Vec<PortSpec>,
    pub containers_per: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub env_vars: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub networks: Vec<String>,
}

impl AppSpec {
    pub fn scaling_policy(&self) -> Result<ScalingPolicy, SnapshotError> {
        ScalingPolicy::from_map(&self.app_name, &self.containers_per)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceGroupSnapshot {
    pub device_group_id: i64,
    #[serde(default)]
    pub prune_id: i64,
    pub apps: Vec<AppSpec>,
    pub apps_list: HashSet<String>,
}

impl DeviceGroupSnapshot {
    /// Checked once right after deserialization. Rejects the shapes the
    /// reconciler must never be handed.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut seen = HashSet::with_capacity(self.apps.len());
        for app in &self.apps {
            if !seen.insert(app.app_name.clone()) {
                return Err(SnapshotError::DuplicateAppName(app.app_name.clone()));
            }
            app.scaling_policy()?;
        }
        if seen != self.apps_list {
            return Err(SnapshotError::AppsListMismatch);
        }
        Ok(())
    }

    pub fn empty() -> Self {
        DeviceGroupSnapshot {
            device_group_id: 0,
            prune_id: 0,
            apps: Vec::new(),
            apps_list: HashSet::new(),
        }
    }

    pub fn app(&self, name: &str) -> Option<&AppSpec> {
        self.apps.iter().find(|a| a.app_name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(name: &str, id: i64, containers_per: serde_json::Value) -> AppSpec {
        serde_json::from_value(serde_json::json!({
            "app_name": name,
            "app_id": id,
            "docker_image": "nginx:1.25",
            "running": true,
            "containers_per": containers_per,
        }))
        .unwrap()
    }

    #[test]
    fn port_spec_parses_bare_integer() {
        let p: PortSpec = serde_json::from_value(serde_json::json!(80)).unwrap();
        assert_eq!(p, PortSpec::Simple(80));
    }

    #[test]
    fn port_spec_parses_mapped_object() {
        let p: PortSpec = serde_json::from_value(serde_json::json!({"8080": 80})).unwrap();
        assert_eq!(p, PortSpec::Mapped { host: 8080, container: 80 });
    }

    #[test]
    fn port_spec_rejects_multi_entry_object() {
        let result: Result<PortSpec, _> = serde_json::from_value(serde_json::json!({"8080": 80, "9090": 90}));
        assert!(result.is_err());
    }

    #[test]
    fn scaling_policy_recognizes_each_key() {
        assert_eq!(
            app("a", 1, serde_json::json!({"cpu": 2.0})).scaling_policy().unwrap(),
            ScalingPolicy::PerCpu(2.0)
        );
        assert_eq!(
            app("a", 1, serde_json::json!({"mem": 512.0})).scaling_policy().unwrap(),
            ScalingPolicy::PerMemMiB(512.0)
        );
        assert_eq!(
            app("a", 1, serde_json::json!({"server": 3.0})).scaling_policy().unwrap(),
            ScalingPolicy::PerInstance(3.0)
        );
    }

    #[test]
    fn scaling_policy_rejects_unrecognized_key() {
        let a = app("a", 1, serde_json::json!({"bogus": 1.0}));
        assert!(matches!(a.scaling_policy(), Err(SnapshotError::UnrecognizedScalingKey { .. })));
    }

    #[test]
    fn snapshot_validate_rejects_duplicate_app_name() {
        let snap = DeviceGroupSnapshot {
            device_group_id: 1,
            prune_id: 0,
            apps: vec![
                app("web", 1, serde_json::json!({"server": 1.0})),
                app("web", 2, serde_json::json!({"server": 1.0})),
            ],
            apps_list: ["web".to_string()].into_iter().collect(),
        };
        assert!(matches!(snap.validate(), Err(SnapshotError::DuplicateAppName(_))));
    }

    #[test]
    fn snapshot_validate_rejects_apps_list_mismatch() {
        let snap = DeviceGroupSnapshot {
            device_group_id: 1,
            prune_id: 0,
            apps: vec![app("web", 1, serde_json::json!({"server": 1.0}))],
            apps_list: ["other".to_string()].into_iter().collect(),
        };
        assert!(matches!(snap.validate(), Err(SnapshotError::AppsListMismatch)));
    }

    #[test]
    fn snapshot_validate_accepts_well_formed_snapshot() {
        let snap = DeviceGroupSnapshot {
            device_group_id: 1,
            prune_id: 0,
            apps: vec![app("web", 1, serde_json::json!({"server": 2.0}))],
            apps_list: ["web".to_string()].into_iter().collect(),
        };
        assert!(snap.validate().is_ok());
    }
}
