pub mod crm;
pub mod identity;
pub mod intake;
pub mod report_token;
pub mod scoring;
pub mod store;
pub mod summary;

use crate::config::BridgeConfig;
use chrono::Utc;
use crm::{CrmGateway, CrmNotification};
use identity::{IdentityGateway, IdentityVerdict};
use intake::IntakeRecord;
use report_token::ReportTokens;
use scoring::{ScoringGateway, ScoringRequest, ScoringVerdict};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use store::{RecordBundle, RecordStore, StoreError};
use summary::FilteredSummary;
use tracing::{error, warn};
use uuid::Uuid;

/// Behavior knobs and routing targets for one service instance, extracted
/// from [`BridgeConfig`] at startup.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub coupon_code: String,
    pub report_url: String,
    pub records_collection: String,
    pub crm_audit_collection: String,
    pub require_caller_auth: bool,
    pub extended_protocol: bool,
}

impl From<&BridgeConfig> for BridgeSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            coupon_code: config.coupon_code.clone(),
            report_url: config.report_url.clone(),
            records_collection: config.records_collection.clone(),
            crm_audit_collection: config.crm_audit_collection.clone(),
            require_caller_auth: config.require_caller_auth,
            extended_protocol: config.extended_protocol,
        }
    }
}

/// Everything the primary flow produced for one successful assessment.
#[derive(Debug, Clone)]
pub struct CompletedAssessment {
    pub record_id: String,
    pub summary: FilteredSummary,
    pub report_token: String,
}

/// Outcome of the primary assessment flow. Persistence and CRM forwarding
/// never influence which variant comes back; only the scoring path does.
#[derive(Debug)]
pub enum AssessmentOutcome {
    Unauthenticated,
    Completed(CompletedAssessment),
    ScoringUnavailable,
    ScoringRejected { detail: Value },
    Failed,
}

/// Stored assessment re-read for the report endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StoredReport {
    pub patient_info: intake::NormalizedIntake,
    pub patient_risk_data: FilteredSummary,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("report credential is missing, invalid, or expired")]
    Unauthenticated,
    #[error("no record found for the requested record id")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("stored record is unreadable: {0}")]
    Corrupt(String),
}

/// Orchestrates one assessment end to end: caller validation, defaulting,
/// the scoring call, summary filtering, credential issuance, persistence,
/// and the best-effort CRM relay.
pub struct AssessmentService<S, I, G, C> {
    store: Arc<S>,
    identity: Arc<I>,
    scoring: Arc<G>,
    crm: Arc<C>,
    tokens: ReportTokens,
    settings: BridgeSettings,
}

impl<S, I, G, C> AssessmentService<S, I, G, C>
where
    S: RecordStore + 'static,
    I: IdentityGateway + 'static,
    G: ScoringGateway + 'static,
    C: CrmGateway + 'static,
{
    pub fn new(
        store: Arc<S>,
        identity: Arc<I>,
        scoring: Arc<G>,
        crm: Arc<C>,
        tokens: ReportTokens,
        settings: BridgeSettings,
    ) -> Self {
        Self {
            store,
            identity,
            scoring,
            crm,
            tokens,
            settings,
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Run the primary flow for one intake submission.
    pub async fn assess(&self, intake: IntakeRecord) -> AssessmentOutcome {
        let hashid = intake.hashid.clone().unwrap_or_default();

        let bearer_token = if self.settings.require_caller_auth {
            if hashid.is_empty() {
                return AssessmentOutcome::Unauthenticated;
            }
            match self.identity.exchange(&hashid).await {
                Ok(IdentityVerdict::Verified { token }) => token,
                Ok(IdentityVerdict::Rejected) => return AssessmentOutcome::Unauthenticated,
                Err(err) => {
                    error!(error = %err, "identity exchange failed");
                    return AssessmentOutcome::Failed;
                }
            }
        } else {
            String::new()
        };

        let normalized = intake::normalize(&intake);
        let request = ScoringRequest::from_intake(&normalized);

        let scored = match self.scoring.score(&request).await {
            Ok(ScoringVerdict::Scored(scored)) => scored,
            Ok(ScoringVerdict::Unavailable { status }) => {
                warn!(status, "scoring service unavailable");
                return AssessmentOutcome::ScoringUnavailable;
            }
            Ok(ScoringVerdict::Rejected { status, detail }) => {
                warn!(status, "scoring service rejected the payload");
                return AssessmentOutcome::ScoringRejected { detail };
            }
            Err(err) => {
                error!(error = %err, "scoring call failed");
                return AssessmentOutcome::Failed;
            }
        };

        let summary = summary::derive_summary(
            &scored.prediction,
            &self.settings.coupon_code,
            self.settings.extended_protocol,
        );

        let record_id = Uuid::new_v4().to_string();
        let report_token = match self.tokens.issue(&record_id) {
            Ok(token) => token,
            Err(err) => {
                error!(error = %err, "report credential issuance failed");
                return AssessmentOutcome::Failed;
            }
        };

        let bundle = RecordBundle {
            record_id: record_id.clone(),
            patient_data: normalized,
            patient_risk_data: scored.raw,
            report_token: report_token.clone(),
            time_stamp: Utc::now(),
        };

        // Persistence and CRM forwarding are both best-effort: the caller's
        // response is already determined at this point.
        self.persist_bundle(&bundle);
        self.forward_to_crm(&hashid, &bundle, &summary, &bearer_token)
            .await;

        AssessmentOutcome::Completed(CompletedAssessment {
            record_id,
            summary,
            report_token,
        })
    }

    /// Reload a stored assessment and re-derive its summary. The credential
    /// must verify and be bound to the requested record id.
    pub fn report(&self, credential: &str, record_id: &str) -> Result<StoredReport, ReportError> {
        let claims = self
            .tokens
            .verify(credential)
            .map_err(|_| ReportError::Unauthenticated)?;
        if claims.sub != record_id {
            return Err(ReportError::Unauthenticated);
        }

        let document = self
            .store
            .find_by_record_id(record_id, &self.settings.records_collection)?
            .ok_or(ReportError::NotFound)?;
        let bundle: RecordBundle =
            serde_json::from_value(document).map_err(|err| ReportError::Corrupt(err.to_string()))?;

        let prediction = scoring::prediction_from_raw(&bundle.patient_risk_data)
            .map_err(|err| ReportError::Corrupt(err.to_string()))?;
        let summary = summary::derive_summary(
            &prediction,
            &self.settings.coupon_code,
            self.settings.extended_protocol,
        );

        Ok(StoredReport {
            patient_info: bundle.patient_data,
            patient_risk_data: summary,
        })
    }

    fn persist_bundle(&self, bundle: &RecordBundle) {
        let document = match serde_json::to_value(bundle) {
            Ok(document) => document,
            Err(err) => {
                warn!(record_id = %bundle.record_id, error = %err, "record bundle does not serialize");
                return;
            }
        };

        if let Err(err) = self
            .store
            .insert(document, &self.settings.records_collection)
        {
            warn!(record_id = %bundle.record_id, error = %err, "failed to persist assessment record");
        }
    }

    async fn forward_to_crm(
        &self,
        hashid: &str,
        bundle: &RecordBundle,
        summary: &FilteredSummary,
        bearer_token: &str,
    ) {
        let notification = CrmNotification {
            hashid: hashid.to_string(),
            record_id: bundle.record_id.clone(),
            risk_category: summary.risk_status.clone(),
            risk_score: summary.risk_score,
            acceptable_score: summary.acceptable_score.clone(),
            report_url: crm::report_url(
                &self.settings.report_url,
                &bundle.record_id,
                &bundle.report_token,
            ),
        };

        let reply = match self.crm.forward(&notification, bearer_token).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(record_id = %bundle.record_id, error = %err, "crm forwarding failed");
                return;
            }
        };

        // Audit trail only; nothing reads this back in the request path.
        let audit = json!({
            "record_id": bundle.record_id,
            "crm_response": reply,
            "received_at": Utc::now(),
        });
        if let Err(err) = self.store.insert(audit, &self.settings.crm_audit_collection) {
            warn!(record_id = %bundle.record_id, error = %err, "failed to persist crm response");
        }
    }
}
