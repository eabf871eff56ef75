//! In-memory `ManagerClient` test double, mirroring `runtime::fake::FakeRuntime`'s
//! shape: a `Mutex`-guarded queue of canned replies that the reconciler and
//! poller tests drive directly instead of standing up an HTTP server.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::model::DeviceGroupSnapshot;

use super::{ApiCheck, DeviceGroupReply, ManagerClient, ManagerError};

enum Canned {
    Snapshot(DeviceGroupSnapshot),
    Absent,
    Error,
}

#[derive(Default)]
struct Inner {
    queue: VecDeque<Canned>,
    api_available: bool,
    fetch_calls: u32,
}

#[derive(Default)]
pub struct FakeManagerClient {
    inner: Mutex<Inner>,
}

impl FakeManagerClient {
    pub fn new() -> Self {
        FakeManagerClient { inner: Mutex::new(Inner { api_available: true, ..Inner::default() }) }
    }

    pub fn set_api_available(&self, available: bool) {
        self.inner.lock().unwrap().api_available = available;
    }

    pub fn push_snapshot(&self, snapshot: DeviceGroupSnapshot) {
        self.inner.lock().unwrap().queue.push_back(Canned::Snapshot(snapshot));
    }

    pub fn push_absent(&self) {
        self.inner.lock().unwrap().queue.push_back(Canned::Absent);
    }

    pub fn push_error(&self) {
        self.inner.lock().unwrap().queue.push_back(Canned::Error);
    }

    pub fn fetch_calls(&self) -> u32 {
        self.inner.lock().unwrap().fetch_calls
    }
}

impl ManagerClient for FakeManagerClient {
    fn check_api<'a>(&'a self) -> super::Fut<'a, ApiCheck> {
        Box::pin(async move {
            let available = self.inner.lock().unwrap().api_available;
            Ok(ApiCheck { status_code: if available { 200 } else { 500 }, api_available: available })
        })
    }

    fn fetch_device_group<'a>(&'a self, _device_group: &'a str) -> super::Fut<'a, DeviceGroupReply> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.fetch_calls += 1;
            match inner.queue.pop_front() {
                Some(Canned::Snapshot(s)) => Ok(DeviceGroupReply::Snapshot(s)),
                Some(Canned::Absent) => Ok(DeviceGroupReply::DeviceGroupAbsent),
                Some(Canned::Error) => Err(ManagerError::UnexpectedStatus(500)),
                None => Err(ManagerError::UnexpectedStatus(500)),
            }
        })
    }
}
