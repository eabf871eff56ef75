//! `ContainerRuntime` — the abstract runtime contract. Object-safe via
//! `Pin<Box<dyn Future<...> + Send>>` returns, so live (bollard) and fake
//! implementations can be swapped behind an `Arc<dyn ContainerRuntime>`.

pub mod error;
pub mod fake;
pub mod live;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

pub use error::RuntimeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunSpec {
    pub app_name: String,
    pub name: String,
    pub image: String,
    pub port_binds: BTreeMap<u16, u16>,
    pub env_vars: std::collections::HashMap<String, String>,
    pub volumes: Vec<String>,
    pub devices: Vec<String>,
    pub privileged: bool,
    pub networks: Vec<String>,
}

type Fut<'a, T> = Pin<Box<dyn Future<Output = Result<T, RuntimeError>> + Send + 'a>>;

/// Object-safe thanks to `Pin<Box<…>>` returns. Implementations must be
/// `Send + Sync` so they can live inside an `Arc` shared across tasks.
pub trait ContainerRuntime: Send + Sync {
    fn pull_image<'a>(&'a self, image: &'a str, tag: &'a str) -> Fut<'a, ()>;

    /// `name_filter`: empty string matches every managed container.
    fn list_containers<'a>(&'a self, name_filter: &'a str) -> Fut<'a, Vec<ContainerHandle>>;

    fn run_container<'a>(&'a self, spec: &'a RunSpec) -> Fut<'a, ContainerHandle>;

    fn stop_and_remove_container<'a>(&'a self, id: &'a str) -> Fut<'a, ()>;

    fn restart_container<'a>(&'a self, id: &'a str) -> Fut<'a, ()>;

    fn check_container_healthy<'a>(&'a self, id: &'a str) -> Fut<'a, bool>;

    fn prune_images<'a>(&'a self) -> Fut<'a, ()>;

    fn create_docker_network<'a>(&'a self, name: &'a str, driver: &'a str) -> Fut<'a, ()>;

    fn registry_login<'a>(&'a self, host: &'a str, user: &'a str, password: &'a str) -> Fut<'a, ()>;
}
