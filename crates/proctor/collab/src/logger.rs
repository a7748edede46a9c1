//! Logging collaborator over HTTP.
//!
//! Each activity is POSTed as its camelCase entry to the channel path (`/quiz/log` or
//! `/camera/log`) under the configured base URL.

use async_trait::async_trait;
use proctor_monitor::{ActivityLogger, LogDeliveryError};
use proctor_types::{ActivityRecord, CollaboratorConfig};
use reqwest::Client;
use tracing::debug;

use crate::error::{CollabError, CollabResult};
use crate::http::{build_client, check_status, normalize_base, with_auth};

/// Delivers activity records to the logging collaborator.
pub struct HttpActivityLogger {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpActivityLogger {
    pub fn new(base_url: &str, config: &CollaboratorConfig) -> CollabResult<Self> {
        Ok(Self {
            client: build_client(config.request_timeout())?,
            base_url: normalize_base(base_url)?,
            auth_token: config.auth_token.clone(),
        })
    }

    /// Build from configuration. Fails when no base URL is configured.
    pub fn from_config(config: &CollaboratorConfig) -> CollabResult<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| CollabError::Config("collaborator.base_url is not set".into()))?;
        Self::new(base_url, config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST one record to its channel.
    pub async fn post(&self, record: &ActivityRecord) -> CollabResult<()> {
        let url = format!("{}{}", self.base_url, record.channel.path());
        let request = with_auth(self.client.post(&url), self.auth_token.as_deref());
        let response = request.json(&record.entry).send().await?;
        check_status(response).await?;
        debug!(%url, activity = %record.entry.activity, "Activity delivered");
        Ok(())
    }
}

#[async_trait]
impl ActivityLogger for HttpActivityLogger {
    async fn deliver(&self, record: &ActivityRecord) -> Result<(), LogDeliveryError> {
        self.post(record).await.map_err(LogDeliveryError::from)
    }

    fn name(&self) -> &str {
        "http"
    }
}

impl std::fmt::Debug for HttpActivityLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpActivityLogger")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.auth_token.is_some())
            .finish()
    }
}
