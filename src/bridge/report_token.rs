use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const VALIDITY_DAYS: i64 = 30;

#[derive(Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

/// Claims carried by a report-access credential. `sub` is the record
/// identifier the credential is bound to; expiry is the only invalidation
/// path, there is no revocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportTokenError {
    #[error("credential is not a well-formed token")]
    Malformed,
    #[error("credential signature does not verify")]
    InvalidSignature,
    #[error("credential has expired")]
    Expired,
    #[error("signing key rejected")]
    Key,
}

/// Issues and verifies HS256-signed report-access credentials.
pub struct ReportTokens {
    secret: Vec<u8>,
}

impl ReportTokens {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn issue(&self, record_id: &str) -> Result<String, ReportTokenError> {
        self.issue_at(record_id, Utc::now())
    }

    /// Issue a credential as of `issued_at`; split out so expiry behavior
    /// is testable without waiting thirty days.
    pub fn issue_at(
        &self,
        record_id: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, ReportTokenError> {
        let claims = ReportClaims {
            sub: record_id.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::days(VALIDITY_DAYS)).timestamp(),
        };

        let header = TokenHeader {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        };

        let header_json =
            serde_json::to_string(&header).map_err(|_| ReportTokenError::Malformed)?;
        let claims_json =
            serde_json::to_string(&claims).map_err(|_| ReportTokenError::Malformed)?;

        let message = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json.as_bytes()),
            URL_SAFE_NO_PAD.encode(claims_json.as_bytes())
        );
        let signature = self.sign(&message)?;

        Ok(format!("{message}.{signature}"))
    }

    pub fn verify(&self, token: &str) -> Result<ReportClaims, ReportTokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<ReportClaims, ReportTokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        let (header, claims, signature) = match parts.as_slice() {
            [header, claims, signature] => (*header, *claims, *signature),
            _ => return Err(ReportTokenError::Malformed),
        };

        let message = format!("{header}.{claims}");
        if self.sign(&message)? != signature {
            return Err(ReportTokenError::InvalidSignature);
        }

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims)
            .map_err(|_| ReportTokenError::Malformed)?;
        let claims: ReportClaims =
            serde_json::from_slice(&claims_json).map_err(|_| ReportTokenError::Malformed)?;

        if claims.exp < now.timestamp() {
            return Err(ReportTokenError::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, message: &str) -> Result<String, ReportTokenError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| ReportTokenError::Key)?;
        mac.update(message.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}
