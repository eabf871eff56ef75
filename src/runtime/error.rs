use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("runtime connection failed: {0}")]
    ConnectionFailed(String),
    #[error("container not found: {0}")]
    ContainerNotFound(String),
    #[error("image pull failed for {image}: {source}")]
    PullFailed { image: String, source: bollard::errors::Error },
    #[error("registry login failed: {0}")]
    RegistryLoginFailed(String),
    #[error("bollard error: {0}")]
    Bollard(#[from] bollard::errors::Error),
}
