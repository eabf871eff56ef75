//! Port planner: maps an app's declared ports to a per-replica
//! host/container binding set.

use std::collections::BTreeMap;

use crate::model::{AppSpec, PortSpec};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortPlan {
    /// container_port -> host_port
    pub binds: BTreeMap<u16, u16>,
    pub exposed: Vec<u16>,
}

/// `replica_index` is 0-based; the first replica (index 0) gets exactly the
/// declared host ports.
pub fn plan(app: &AppSpec, replica_index: u32) -> PortPlan {
    let offset = replica_index as u32;
    let mut result = PortPlan::default();

    for port in &app.starting_ports {
        match *port {
            PortSpec::Simple(p) => {
                let host = (p as u32 + offset) as u16;
                result.binds.insert(p, host);
                result.exposed.push(p);
            }
            PortSpec::Mapped { host, container } => {
                let host_bound = (host as u32 + offset) as u16;
                result.binds.insert(container, host_bound);
                result.exposed.push(container);
            }
        }
    }

    result
}
