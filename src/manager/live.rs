//! reqwest-backed `ManagerClient`. Talks to the manager's `/api/check` and
//! `/device_group/{name}/info` endpoints over HTTP basic auth.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::model::DeviceGroupSnapshot;

use super::{ApiCheck, DeviceGroupReply, ManagerClient, ManagerError};

#[derive(Debug, Clone)]
pub struct LiveManagerClient {
    client: Client,
    base_url: String,
    auth_user: String,
    auth_password: String,
}

impl LiveManagerClient {
    pub fn new(
        base_url: String,
        auth_user: String,
        auth_password: String,
        request_timeout: Duration,
    ) -> Result<Self, ManagerError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(LiveManagerClient { client, base_url, auth_user, auth_password })
    }
}

#[derive(Debug, Deserialize)]
struct CheckApiReply {
    #[serde(default)]
    api_available: bool,
}

#[derive(Debug, Deserialize)]
struct CheckApiBody {
    reply: CheckApiReply,
}

#[derive(Debug, Deserialize)]
struct DeviceGroupAbsentReply {
    device_group_exists: bool,
}

#[derive(Debug, Deserialize)]
struct DeviceGroupAbsentBody {
    reply: DeviceGroupAbsentReply,
}

#[derive(Debug, Deserialize)]
struct DeviceGroupSnapshotBody {
    reply: DeviceGroupSnapshot,
}

impl ManagerClient for LiveManagerClient {
    fn check_api<'a>(&'a self) -> super::Fut<'a, ApiCheck> {
        Box::pin(async move {
            let url = format!("{}/api/check", self.base_url);
            let resp = self
                .client
                .get(&url)
                .basic_auth(&self.auth_user, Some(&self.auth_password))
                .send()
                .await?;

            let status = resp.status();
            let api_available = if status == StatusCode::OK {
                resp.json::<CheckApiBody>()
                    .await
                    .map(|b| b.reply.api_available)
                    .unwrap_or(false)
            } else {
                false
            };

            Ok(ApiCheck { status_code: status.as_u16(), api_available })
        })
    }

    fn fetch_device_group<'a>(&'a self, device_group: &'a str) -> super::Fut<'a, DeviceGroupReply> {
        Box::pin(async move {
            let url = format!("{}/device_group/{}/info", self.base_url, device_group);
            let resp = self
                .client
                .get(&url)
                .basic_auth(&self.auth_user, Some(&self.auth_password))
                .send()
                .await?;

            let status = resp.status();

            if status == StatusCode::FORBIDDEN {
                let body: DeviceGroupAbsentBody = resp
                    .json()
                    .await
                    .map_err(|e| ManagerError::MalformedBody(e.to_string()))?;
                return if !body.reply.device_group_exists {
                    Ok(DeviceGroupReply::DeviceGroupAbsent)
                } else {
                    Err(ManagerError::UnexpectedStatus(status.as_u16()))
                };
            }

            if status != StatusCode::OK {
                return Err(ManagerError::UnexpectedStatus(status.as_u16()));
            }

            // Discriminate on status code alone: a 200 body's `reply` deserializes
            // straight into `DeviceGroupSnapshot`, which already ignores any stray
            // `device_group_exists` field rather than routing through a shape that
            // could greedily match it as the absent case.
            let body: DeviceGroupSnapshotBody = resp
                .json()
                .await
                .map_err(|e| ManagerError::MalformedBody(e.to_string()))?;

            body.reply
                .validate()
                .map_err(|e| ManagerError::MalformedBody(e.to_string()))?;

            Ok(DeviceGroupReply::Snapshot(body.reply))
        })
    }
}
