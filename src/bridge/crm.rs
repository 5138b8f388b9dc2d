use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// Summarized assessment notification posted to the CRM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmNotification {
    pub hashid: String,
    pub record_id: String,
    pub risk_category: String,
    pub risk_score: f64,
    pub acceptable_score: Value,
    pub report_url: String,
}

/// Report link handed to the CRM; embeds the record id and its access
/// credential so the report can be pulled without re-authentication.
pub fn report_url(base: &str, record_id: &str, token: &str) -> String {
    format!("{base}?record_id={record_id}&token={token}")
}

#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("crm unreachable: {0}")]
    Transport(String),
    #[error("crm reply unreadable: {0}")]
    MalformedReply(String),
}

pub trait CrmGateway: Send + Sync {
    fn forward(
        &self,
        notification: &CrmNotification,
        bearer_token: &str,
    ) -> impl Future<Output = Result<Value, CrmError>> + Send;
}

/// Posts notifications with the static API key plus the caller's verified
/// upstream token.
pub struct HttpCrmGateway {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpCrmGateway {
    pub fn new(client: reqwest::Client, url: String, api_key: String) -> Self {
        Self {
            client,
            url,
            api_key,
        }
    }
}

impl CrmGateway for HttpCrmGateway {
    async fn forward(
        &self,
        notification: &CrmNotification,
        bearer_token: &str,
    ) -> Result<Value, CrmError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .bearer_auth(bearer_token)
            .json(notification)
            .send()
            .await
            .map_err(|err| CrmError::Transport(err.to_string()))?;

        response
            .json()
            .await
            .map_err(|err| CrmError::MalformedReply(err.to_string()))
    }
}
