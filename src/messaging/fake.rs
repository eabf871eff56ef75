//! In-memory `ReportProducer` test double.

use std::sync::Mutex;

use super::{ReportError, ReportProducer};
use crate::report::StateReport;

#[derive(Default)]
struct Inner {
    published: Vec<String>,
    fail: bool,
}

#[derive(Default)]
pub struct FakeProducer {
    inner: Mutex<Inner>,
}

impl FakeProducer {
    pub fn new() -> Self {
        FakeProducer::default()
    }

    pub fn failing() -> Self {
        FakeProducer { inner: Mutex::new(Inner { fail: true, ..Inner::default() }) }
    }

    pub fn published_count(&self) -> usize {
        self.inner.lock().unwrap().published.len()
    }
}

impl ReportProducer for FakeProducer {
    fn push_report<'a>(&'a self, report: &'a StateReport) -> super::Fut<'a, ()> {
        Box::pin(async move {
            if self.inner.lock().unwrap().fail {
                return Err(ReportError::Kafka("simulated publish failure".to_string()));
            }
            let payload = serde_json::to_string(report)?;
            self.inner.lock().unwrap().published.push(payload);
            Ok(())
        })
    }
}
