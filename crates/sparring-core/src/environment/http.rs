use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{ConnectionHandle, ConnectionParams, DispatchOutcome, EnvironmentAdapter, EnvironmentError};

#[derive(Serialize)]
struct ConnectRequest<'a> {
    identity: &'a str,
    #[serde(flatten)]
    params: &'a ConnectionParams,
}

#[derive(Deserialize)]
struct ConnectResponse {
    connection_id: String,
}

#[derive(Serialize)]
struct DispatchRequest<'a> {
    action: &'a str,
}

/// Adapter for an external world bridge speaking JSON over HTTP.
pub struct HttpEnvironmentAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEnvironmentAdapter {
    pub fn new(base_url: impl Into<String>) -> Result<Self, EnvironmentError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EnvironmentError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl EnvironmentAdapter for HttpEnvironmentAdapter {
    async fn connect(
        &self,
        identity: &str,
        params: &ConnectionParams,
    ) -> Result<String, EnvironmentError> {
        let response = self
            .client
            .post(self.url("/connections"))
            .json(&ConnectRequest { identity, params })
            .send()
            .await
            .map_err(|e| EnvironmentError::ConnectFailed {
                reason: e.to_string(),
                retryable: true,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnvironmentError::ConnectFailed {
                reason: format!("bridge returned {}: {}", status, body),
                retryable: status.is_server_error(),
            });
        }

        let body: ConnectResponse = response.json().await?;
        Ok(body.connection_id)
    }

    async fn get_connection(&self, connection_id: &str) -> Option<ConnectionHandle> {
        let response = match self
            .client
            .get(self.url(&format!("/connections/{}", connection_id)))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Failed to look up connection {}: {}", connection_id, e);
                return None;
            }
        };

        if !response.status().is_success() {
            return None;
        }

        match response.json::<ConnectionHandle>().await {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Malformed connection payload for {}: {}", connection_id, e);
                None
            }
        }
    }

    async fn disconnect(&self, connection_id: &str) -> Result<(), EnvironmentError> {
        let response = self
            .client
            .delete(self.url(&format!("/connections/{}", connection_id)))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(EnvironmentError::ConnectionNotFound(
                connection_id.to_string(),
            )),
            status => Err(EnvironmentError::DisconnectFailed(format!(
                "bridge returned {} for {}",
                status, connection_id
            ))),
        }
    }

    async fn dispatch(
        &self,
        handle: &ConnectionHandle,
        action: &str,
    ) -> Result<DispatchOutcome, EnvironmentError> {
        let response = self
            .client
            .post(self.url(&format!("/connections/{}/actions", handle.connection_id)))
            .json(&DispatchRequest { action })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnvironmentError::DispatchFailed(format!(
                "bridge returned {} for action {}",
                status, action
            )));
        }

        Ok(response.json::<DispatchOutcome>().await?)
    }
}
