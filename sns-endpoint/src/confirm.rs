//! Outbound subscription confirmation.
//!
//! SNS activates an HTTP subscription once the endpoint visits the
//! `SubscribeURL` it was sent. The request is a plain GET with no
//! authentication; the response body is ignored.

use async_trait::async_trait;
use url::Url;

use crate::error::ConfirmError;

/// Completes the SNS subscription handshake.
#[async_trait]
pub trait SubscriptionConfirmer: Send + Sync {
    /// Visit `subscribe_url`. Only transport failures are errors.
    async fn confirm(&self, subscribe_url: &str) -> Result<(), ConfirmError>;
}

/// Confirms subscriptions with a single GET through a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpConfirmer {
    client: reqwest::Client,
}

impl HttpConfirmer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client, e.g. one with proxy or timeout settings.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SubscriptionConfirmer for HttpConfirmer {
    async fn confirm(&self, subscribe_url: &str) -> Result<(), ConfirmError> {
        let url = Url::parse(subscribe_url).map_err(|source| ConfirmError::InvalidUrl {
            url: subscribe_url.to_string(),
            source,
        })?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            tracing::debug!(
                status = %response.status(),
                "Subscription confirmation returned a non-success status"
            );
        }

        Ok(())
    }
}
