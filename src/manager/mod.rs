//! Manager client. The abstract `ManagerClient` trait is the contract the
//! reconciler depends on; the retry decorator (exponential backoff) wraps
//! calls to it from `poll.rs`.

pub mod error;
pub mod fake;
pub mod live;
pub mod poll;

use std::future::Future;
use std::pin::Pin;

pub use error::ManagerError;

use crate::model::DeviceGroupSnapshot;

#[derive(Debug, Clone)]
pub struct ApiCheck {
    pub status_code: u16,
    pub api_available: bool,
}

#[derive(Debug, Clone)]
pub enum DeviceGroupReply {
    Snapshot(DeviceGroupSnapshot),
    /// `status_code == 403` and `device_group_exists == false`: not a
    /// transient error, not retried by the backoff decorator.
    DeviceGroupAbsent,
}

type Fut<'a, T> = Pin<Box<dyn Future<Output = Result<T, ManagerError>> + Send + 'a>>;

pub trait ManagerClient: Send + Sync {
    fn check_api<'a>(&'a self) -> Fut<'a, ApiCheck>;

    fn fetch_device_group<'a>(&'a self, device_group: &'a str) -> Fut<'a, DeviceGroupReply>;
}
