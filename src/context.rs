//! `WorkerContext` — the explicit, passed-by-`Arc` value that replaces
//! module-level globals with shared, injectable state.

use std::sync::Arc;

use sysinfo::System;

use crate::config::WorkerConfig;
use crate::manager::ManagerClient;
use crate::messaging::ReportProducer;
use crate::runtime::ContainerRuntime;

#[derive(Debug, Clone, Copy)]
pub struct HostFacts {
    pub cpu_cores: u32,
    pub total_mem_mib: u64,
}

impl HostFacts {
    /// Captured once at boot via `sysinfo`, the way the source read
    /// `multiprocessing.cpu_count()` / `psutil.virtual_memory()` once.
    pub fn probe() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        let cpu_cores = sys.cpus().len().max(1) as u32;
        let total_mem_mib = (sys.total_memory() / (1024 * 1024)).max(1);
        HostFacts { cpu_cores, total_mem_mib }
    }
}

pub struct WorkerContext {
    pub config: WorkerConfig,
    pub facts: HostFacts,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub manager: Arc<dyn ManagerClient>,
    pub producer: Option<Arc<dyn ReportProducer>>,
}

impl WorkerContext {
    pub fn new(
        config: WorkerConfig,
        facts: HostFacts,
        runtime: Arc<dyn ContainerRuntime>,
        manager: Arc<dyn ManagerClient>,
        producer: Option<Arc<dyn ReportProducer>>,
    ) -> Arc<Self> {
        Arc::new(WorkerContext { config, facts, runtime, manager, producer })
    }
}
