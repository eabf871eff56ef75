//! In-memory `ContainerRuntime` test double — good enough to drive
//! lifecycle-operator and reconciler unit tests without a real Docker daemon.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{ContainerHandle, ContainerRuntime, RunSpec, RuntimeError};

#[derive(Debug, Default)]
struct Inner {
    containers: BTreeMap<String, ContainerHandle>,
    next_id: u64,
    pulled_images: Vec<String>,
    pruned: u32,
    networks: Vec<String>,
    unhealthy: std::collections::HashSet<String>,
    fail_next_run: bool,
    fail_next_list: bool,
}

#[derive(Debug, Default)]
pub struct FakeRuntime {
    inner: Mutex<Inner>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_unhealthy(&self, id: &str) {
        self.inner.lock().unwrap().unhealthy.insert(id.to_string());
    }

    pub fn fail_next_run(&self) {
        self.inner.lock().unwrap().fail_next_run = true;
    }

    pub fn fail_next_list(&self) {
        self.inner.lock().unwrap().fail_next_list = true;
    }

    pub fn containers(&self) -> Vec<ContainerHandle> {
        self.inner.lock().unwrap().containers.values().cloned().collect()
    }

    pub fn pulled_images(&self) -> Vec<String> {
        self.inner.lock().unwrap().pulled_images.clone()
    }

    pub fn prune_count(&self) -> u32 {
        self.inner.lock().unwrap().pruned
    }
}

impl ContainerRuntime for FakeRuntime {
    fn pull_image<'a>(&'a self, image: &'a str, tag: &'a str) -> super::Fut<'a, ()> {
        Box::pin(async move {
            self.inner.lock().unwrap().pulled_images.push(format!("{image}:{tag}"));
            Ok(())
        })
    }

    fn list_containers<'a>(&'a self, name_filter: &'a str) -> super::Fut<'a, Vec<ContainerHandle>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_next_list {
                inner.fail_next_list = false;
                return Err(RuntimeError::ConnectionFailed("simulated failure".to_string()));
            }
            Ok(inner
                .containers
                .values()
                .filter(|c| name_filter.is_empty() || c.name.starts_with(name_filter))
                .cloned()
                .collect())
        })
    }

    fn run_container<'a>(&'a self, spec: &'a RunSpec) -> super::Fut<'a, ContainerHandle> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_next_run {
                inner.fail_next_run = false;
                return Err(RuntimeError::ConnectionFailed("simulated failure".to_string()));
            }
            inner.next_id += 1;
            let id = format!("fake-{}", inner.next_id);
            let handle = ContainerHandle {
                id: id.clone(),
                name: spec.name.clone(),
                status: "running".to_string(),
            };
            inner.containers.insert(spec.name.clone(), handle.clone());
            Ok(handle)
        })
    }

    fn stop_and_remove_container<'a>(&'a self, id: &'a str) -> super::Fut<'a, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            let before = inner.containers.len();
            inner.containers.retain(|_, c| c.id != id);
            if inner.containers.len() == before {
                return Err(RuntimeError::ContainerNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    fn restart_container<'a>(&'a self, id: &'a str) -> super::Fut<'a, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.unhealthy.remove(id);
            Ok(())
        })
    }

    fn check_container_healthy<'a>(&'a self, id: &'a str) -> super::Fut<'a, bool> {
        Box::pin(async move { Ok(!self.inner.lock().unwrap().unhealthy.contains(id)) })
    }

    fn prune_images<'a>(&'a self) -> super::Fut<'a, ()> {
        Box::pin(async move {
            self.inner.lock().unwrap().pruned += 1;
            Ok(())
        })
    }

    fn create_docker_network<'a>(&'a self, name: &'a str, _driver: &'a str) -> super::Fut<'a, ()> {
        Box::pin(async move {
            self.inner.lock().unwrap().networks.push(name.to_string());
            Ok(())
        })
    }

    fn registry_login<'a>(&'a self, _host: &'a str, _user: &'a str, _password: &'a str) -> super::Fut<'a, ()> {
        Box::pin(async move { Ok(()) })
    }
}
