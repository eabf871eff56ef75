//! Messaging producer: the `ReportProducer` abstract contract plus a
//! `rdkafka`-backed implementation and an in-memory fake, following the same
//! trait-plus-live-plus-fake shape as `runtime` and `manager`.

pub mod fake;
pub mod live;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::report::StateReport;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to build state report: {0}")]
    Build(String),
    #[error("failed to serialize state report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("kafka producer error: {0}")]
    Kafka(String),
    #[error("kafka topic administration error: {0}")]
    TopicAdmin(String),
}

type Fut<'a, T> = Pin<Box<dyn Future<Output = Result<T, ReportError>> + Send + 'a>>;

pub trait ReportProducer: Send + Sync {
    fn push_report<'a>(&'a self, report: &'a StateReport) -> Fut<'a, ()>;
}
