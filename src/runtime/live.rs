//! bollard-backed `ContainerRuntime`. Method bodies follow a consistent
//! error-mapping idiom (404 → `ContainerNotFound`, everything else wrapped
//! via `RuntimeError::from`/`RuntimeError::Bollard`), including
//! `run_container`, authored fresh against bollard's documented
//! create-container shape.

use std::collections::HashMap;

use bollard::auth::DockerCredentials;
use bollard::models::{ContainerCreateBody, EndpointSettings, HostConfig, NetworkingConfig, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, ListContainersOptions, NetworkCreateRequest,
    PruneImagesOptions, RemoveContainerOptions, StartContainerOptions,
};
use bollard::Docker;
use futures_util::stream::StreamExt;

use super::{ContainerHandle, ContainerRuntime, RunSpec, RuntimeError};

#[derive(Debug, Clone)]
pub struct LiveRuntime {
    client: Docker,
}

impl LiveRuntime {
    pub fn connect(socket_path: &str) -> Result<Self, RuntimeError> {
        let client = if socket_path.is_empty() {
            Docker::connect_with_defaults()
        } else {
            let clean = socket_path.trim_start_matches("unix://");
            Docker::connect_with_socket(clean, 120, &bollard::API_DEFAULT_VERSION)
        }
        .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?;

        Ok(LiveRuntime { client })
    }
}

impl ContainerRuntime for LiveRuntime {
    fn pull_image<'a>(&'a self, image: &'a str, tag: &'a str) -> super::Fut<'a, ()> {
        Box::pin(async move {
            let options = Some(CreateImageOptions {
                from_image: Some(image.to_string()),
                tag: Some(tag.to_string()),
                ..Default::default()
            });
            let credentials: Option<DockerCredentials> = None;
            let mut stream = self.client.create_image(options, None, credentials);
            while let Some(progress) = stream.next().await {
                progress.map_err(|e| RuntimeError::PullFailed {
                    image: format!("{image}:{tag}"),
                    source: e,
                })?;
            }
            Ok(())
        })
    }

    fn list_containers<'a>(&'a self, name_filter: &'a str) -> super::Fut<'a, Vec<ContainerHandle>> {
        Box::pin(async move {
            let mut filters = HashMap::new();
            if !name_filter.is_empty() {
                filters.insert("name".to_string(), vec![name_filter.to_string()]);
            }
            let options = Some(ListContainersOptions {
                all: true,
                filters: if filters.is_empty() { None } else { Some(filters) },
                ..Default::default()
            });
            let containers = self.client.list_containers(options).await?;
            Ok(containers
                .into_iter()
                .map(|c| ContainerHandle {
                    id: c.id.unwrap_or_default(),
                    name: c
                        .names
                        .as_deref()
                        .and_then(|n| n.first())
                        .map(|n| n.trim_start_matches('/').to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                    status: c.state.unwrap_or_default(),
                })
                .collect())
        })
    }

    fn run_container<'a>(&'a self, spec: &'a RunSpec) -> super::Fut<'a, ContainerHandle> {
        Box::pin(async move {
            let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = spec
                .port_binds
                .iter()
                .map(|(container_port, host_port)| {
                    (
                        format!("{container_port}/tcp"),
                        Some(vec![PortBinding {
                            host_ip: None,
                            host_port: Some(host_port.to_string()),
                        }]),
                    )
                })
                .collect();

            let endpoints_config: HashMap<String, EndpointSettings> = spec
                .networks
                .iter()
                .map(|n| (n.clone(), EndpointSettings::default()))
                .collect();

            let body = ContainerCreateBody {
                image: Some(spec.image.clone()),
                env: Some(
                    spec.env_vars
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect(),
                ),
                host_config: Some(HostConfig {
                    port_bindings: Some(port_bindings),
                    binds: Some(spec.volumes.clone()),
                    devices: if spec.devices.is_empty() {
                        None
                    } else {
                        Some(
                            spec.devices
                                .iter()
                                .map(|d| bollard::models::DeviceMapping {
                                    path_on_host: Some(d.clone()),
                                    path_in_container: Some(d.clone()),
                                    cgroup_permissions: Some("rwm".to_string()),
                                })
                                .collect(),
                        )
                    },
                    privileged: Some(spec.privileged),
                    ..Default::default()
                }),
                networking_config: if endpoints_config.is_empty() {
                    None
                } else {
                    Some(NetworkingConfig { endpoints_config })
                },
                ..Default::default()
            };

            let options = Some(CreateContainerOptions {
                name: Some(spec.name.clone()),
                ..Default::default()
            });

            let created = self.client.create_container(options, body).await?;

            self.client
                .start_container(&created.id, None::<StartContainerOptions>)
                .await
                .map_err(|e| match e {
                    bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                        RuntimeError::ContainerNotFound(spec.name.clone())
                    }
                    other => RuntimeError::Bollard(other),
                })?;

            Ok(ContainerHandle {
                id: created.id,
                name: spec.name.clone(),
                status: "running".to_string(),
            })
        })
    }

    fn stop_and_remove_container<'a>(&'a self, id: &'a str) -> super::Fut<'a, ()> {
        Box::pin(async move {
            self.client
                .stop_container(id, None)
                .await
                .map_err(|e| match e {
                    bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                        RuntimeError::ContainerNotFound(id.to_string())
                    }
                    other => RuntimeError::Bollard(other),
                })?;

            let options = Some(RemoveContainerOptions { force: true, v: true, ..Default::default() });
            self.client
                .remove_container(id, options)
                .await
                .map_err(|e| match e {
                    bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                        RuntimeError::ContainerNotFound(id.to_string())
                    }
                    other => RuntimeError::Bollard(other),
                })
        })
    }

    fn restart_container<'a>(&'a self, id: &'a str) -> super::Fut<'a, ()> {
        Box::pin(async move {
            self.client
                .restart_container(id, None)
                .await
                .map_err(|e| match e {
                    bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                        RuntimeError::ContainerNotFound(id.to_string())
                    }
                    other => RuntimeError::Bollard(other),
                })
        })
    }

    fn check_container_healthy<'a>(&'a self, id: &'a str) -> super::Fut<'a, bool> {
        Box::pin(async move {
            let details = self.client.inspect_container(id, None).await.map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                    RuntimeError::ContainerNotFound(id.to_string())
                }
                other => RuntimeError::Bollard(other),
            })?;

            let healthy = details
                .state
                .as_ref()
                .and_then(|s| s.health.as_ref())
                .and_then(|h| h.status)
                .map(|status| status == bollard::models::HealthStatusEnum::HEALTHY)
                // containers without a configured healthcheck are treated as
                // healthy as long as they are running.
                .unwrap_or_else(|| {
                    details
                        .state
                        .as_ref()
                        .and_then(|s| s.running)
                        .unwrap_or(false)
                });

            Ok(healthy)
        })
    }

    fn prune_images<'a>(&'a self) -> super::Fut<'a, ()> {
        Box::pin(async move {
            self.client.prune_images(None::<PruneImagesOptions>).await?;
            Ok(())
        })
    }

    fn create_docker_network<'a>(&'a self, name: &'a str, driver: &'a str) -> super::Fut<'a, ()> {
        Box::pin(async move {
            let existing = self.client.list_networks::<String>(None).await?;
            if existing.iter().any(|n| n.name.as_deref() == Some(name)) {
                return Ok(());
            }

            let request = NetworkCreateRequest {
                name: name.to_string(),
                driver: Some(driver.to_string()),
                ..Default::default()
            };
            self.client.create_network(request).await?;
            Ok(())
        })
    }

    fn registry_login<'a>(&'a self, host: &'a str, user: &'a str, password: &'a str) -> super::Fut<'a, ()> {
        Box::pin(async move {
            let credentials = DockerCredentials {
                username: Some(user.to_string()),
                password: Some(password.to_string()),
                serveraddress: Some(host.to_string()),
                ..Default::default()
            };
            self.client
                .login(&credentials)
                .await
                .map_err(|e| RuntimeError::RegistryLoginFailed(e.to_string()))?;
            Ok(())
        })
    }
}
