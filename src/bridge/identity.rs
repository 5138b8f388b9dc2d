use serde::Deserialize;
use std::future::Future;

/// Exact success message the identity service sends alongside a token.
/// Upstream occasionally returns a token together with an error message;
/// both conditions must hold before the exchange counts as verified.
pub const VERIFIED_MESSAGE: &str = "Token generated successfully";

#[derive(Debug, Clone, Default, Deserialize)]
struct IdentityReply {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityVerdict {
    /// Exchange succeeded; `token` authenticates downstream CRM calls.
    Verified { token: String },
    Rejected,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity service unreachable: {0}")]
    Transport(String),
}

pub trait IdentityGateway: Send + Sync {
    fn exchange(
        &self,
        hashid: &str,
    ) -> impl Future<Output = Result<IdentityVerdict, IdentityError>> + Send;
}

pub struct HttpIdentityGateway {
    client: reqwest::Client,
    url: String,
}

impl HttpIdentityGateway {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

impl IdentityGateway for HttpIdentityGateway {
    async fn exchange(&self, hashid: &str) -> Result<IdentityVerdict, IdentityError> {
        let response = self
            .client
            .post(&self.url)
            .header("hashid", hashid)
            .send()
            .await
            .map_err(|err| IdentityError::Transport(err.to_string()))?;

        // A reply that doesn't decode counts as a failed validation, the
        // same as a missing token or a wrong message.
        let reply = response
            .json::<IdentityReply>()
            .await
            .unwrap_or_default();
        Ok(verdict(reply.token, reply.message))
    }
}

fn verdict(token: Option<String>, message: Option<String>) -> IdentityVerdict {
    match token {
        Some(token) if !token.is_empty() && message.as_deref() == Some(VERIFIED_MESSAGE) => {
            IdentityVerdict::Verified { token }
        }
        _ => IdentityVerdict::Rejected,
    }
}
