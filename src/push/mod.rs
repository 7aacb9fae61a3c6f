use crate::domain::notification::{Notification, PushSubscription};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("Endpoint is no longer registered")]
    Unregistered,
    #[error("Delivery attempt timed out")]
    Timeout,
    #[error("External service error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Body posted to a push endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub data: &'a crate::domain::notification::NotificationData,
}

impl<'a> PushPayload<'a> {
    #[must_use]
    pub fn from_notification(notification: &'a Notification) -> Self {
        Self { title: &notification.title, body: &notification.body, data: &notification.data }
    }
}

/// Best-effort out-of-band delivery to one registered endpoint.
#[async_trait]
pub trait PushProvider: Send + Sync + std::fmt::Debug {
    /// Attempts delivery to a single subscription.
    ///
    /// # Errors
    /// Returns `PushError::Unregistered` if the endpoint is gone and the
    /// subscription should be pruned.
    async fn send_push(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload<'_>,
    ) -> Result<(), PushError>;
}

/// Posts the payload to the subscription endpoint over HTTPS. Each attempt
/// is bounded by the configured timeout so a stalled endpoint cannot hold
/// up the notification pipeline.
#[derive(Debug, Clone)]
pub struct HttpPushProvider {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPushProvider {
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl PushProvider for HttpPushProvider {
    async fn send_push(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload<'_>,
    ) -> Result<(), PushError> {
        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&subscription.endpoint)
                .header("X-Push-P256dh", &subscription.p256dh)
                .header("X-Push-Auth", &subscription.auth)
                .json(payload)
                .send(),
        )
        .await
        .map_err(|_| PushError::Timeout)?
        .map_err(|e| PushError::Other(e.into()))?;

        match response.status() {
            s if s.is_success() => Ok(()),
            reqwest::StatusCode::GONE | reqwest::StatusCode::NOT_FOUND => {
                Err(PushError::Unregistered)
            }
            s => Err(PushError::Other(anyhow::anyhow!("push endpoint returned {s}"))),
        }
    }
}
