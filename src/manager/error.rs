use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("manager request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("manager returned unexpected status {0}")]
    UnexpectedStatus(u16),
    #[error("manager response body could not be parsed: {0}")]
    MalformedBody(String),
}
