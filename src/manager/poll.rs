//! Manager poller: wraps a `ManagerClient::fetch_device_group` call
//! with an exponential-backoff retry — initial delay 200ms, cap 1s, at most
//! 10 attempts — using the `backoff` crate's declarative `ExponentialBackoff`
//! instead of a hand-rolled `base * 2^n` formula.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::warn;

use super::{DeviceGroupReply, ManagerClient, ManagerError};

const MAX_ATTEMPTS: u32 = 10;

fn backoff_policy() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(200),
        max_interval: Duration::from_secs(1),
        multiplier: 2.0,
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    }
}

/// `DeviceGroupAbsent` is not retried here — callers (the bootstrapper) treat
/// it as a distinct, non-error outcome — callers decide how to wait.
pub async fn fetch_with_retry(
    client: &dyn ManagerClient,
    device_group: &str,
) -> Result<DeviceGroupReply, ManagerError> {
    let mut backoff = backoff_policy();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match client.fetch_device_group(device_group).await {
            Ok(reply) => return Ok(reply),
            Err(err) if attempt >= MAX_ATTEMPTS => {
                warn!(attempts = attempt, error = %err, "manager fetch exhausted retries");
                return Err(err);
            }
            Err(err) => {
                let delay = backoff.next_backoff().unwrap_or(Duration::from_secs(1));
                warn!(attempt, error = %err, delay_ms = delay.as_millis() as u64, "manager fetch failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::fake::FakeManagerClient;
    use crate::model::DeviceGroupSnapshot;

    #[tokio::test]
    async fn succeeds_immediately_without_retrying() {
        let fake = FakeManagerClient::new();
        fake.push_snapshot(DeviceGroupSnapshot::empty());
        let result = fetch_with_retry(&fake, "g1").await;
        assert!(matches!(result, Ok(DeviceGroupReply::Snapshot(_))));
        assert_eq!(fake.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let fake = FakeManagerClient::new();
        fake.push_error();
        fake.push_error();
        fake.push_snapshot(DeviceGroupSnapshot::empty());
        let result = fetch_with_retry(&fake, "g1").await;
        assert!(result.is_ok());
        assert_eq!(fake.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let fake = FakeManagerClient::new();
        for _ in 0..20 {
            fake.push_error();
        }
        let result = fetch_with_retry(&fake, "g1").await;
        assert!(result.is_err());
        assert_eq!(fake.fetch_calls(), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn device_group_absent_is_not_retried() {
        let fake = FakeManagerClient::new();
        fake.push_absent();
        let result = fetch_with_retry(&fake, "g1").await;
        assert!(matches!(result, Ok(DeviceGroupReply::DeviceGroupAbsent)));
        assert_eq!(fake.fetch_calls(), 1);
    }
}
