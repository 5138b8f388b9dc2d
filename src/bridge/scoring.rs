use crate::bridge::intake::NormalizedIntake;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;

/// Payload shape expected by the AICVD scoring endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScoringRequest {
    pub id: String,
    pub age: u32,
    pub gender: String,
    #[serde(rename = "BMI")]
    pub bmi: f64,
    pub blood_pressure_diastolic: f64,
    pub blood_pressure_systolic: f64,
    pub heart_rate_per_minute: f64,
    pub physical_activity: String,
    pub smoke: String,
    pub tobacco: String,
    pub diet: String,
    pub alcohol: String,
    pub diabetes_mellitus: String,
    pub hypertension: String,
    pub dyslipidaemia: String,
}

impl ScoringRequest {
    /// Field-by-field projection of the normalized intake onto the external
    /// schema. Each output field comes from exactly one input field; no
    /// values are derived or combined.
    pub fn from_intake(intake: &NormalizedIntake) -> Self {
        Self {
            id: intake.id.clone(),
            age: intake.age,
            gender: intake.gender.clone(),
            bmi: intake.bmi,
            blood_pressure_diastolic: intake.blood_pressure_diastolic,
            blood_pressure_systolic: intake.blood_pressure_systolic,
            heart_rate_per_minute: intake.heart_rate_per_minute,
            physical_activity: intake.physical_activity.clone(),
            smoke: intake.smoke.clone(),
            tobacco: intake.tobacco.clone(),
            diet: intake.diet.clone(),
            alcohol: intake.alcohol.clone(),
            diabetes_mellitus: intake.diabetes_mellitus.clone(),
            hypertension: intake.hypertension.clone(),
            dyslipidaemia: intake.dyslipidaemia.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ScoringReply {
    #[serde(rename = "Data")]
    data: Vec<ScoringEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScoringEntry {
    #[serde(rename = "Prediction")]
    prediction: Prediction,
}

/// Prediction substructure of a successful scoring reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "HeartRisk")]
    pub heart_risk: HeartRisk,
    #[serde(
        rename = "MedicalProtocol",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub medical_protocol: Option<MedicalProtocol>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRisk {
    #[serde(rename = "Risk")]
    pub risk: String,
    #[serde(rename = "Score")]
    pub score: f64,
    #[serde(rename = "AcceptableScore", default)]
    pub acceptable_score: Value,
    #[serde(rename = "TopRiskFactors", default)]
    pub top_risk_factors: Vec<String>,
}

/// Care-protocol block carried by the richer scoring replies. Only the
/// extended summary variant reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalProtocol {
    #[serde(rename = "Diagnosis", default)]
    pub diagnosis: Map<String, Value>,
    #[serde(rename = "LabTest", default)]
    pub lab_test: Map<String, Value>,
    #[serde(rename = "Medication", default)]
    pub medication: Value,
    #[serde(rename = "Referral", default)]
    pub referral: Value,
    #[serde(rename = "Advice", default)]
    pub advice: Value,
}

/// A usable scoring result: the untouched reply body (persisted verbatim)
/// plus the typed prediction view extracted from it.
#[derive(Debug, Clone)]
pub struct ScoredAssessment {
    pub raw: Value,
    pub prediction: Prediction,
}

/// Classified scoring response.
#[derive(Debug, Clone)]
pub enum ScoringVerdict {
    /// 201: the only status carrying a usable result.
    Scored(ScoredAssessment),
    /// 5xx: transient upstream failure, caller should retry later.
    Unavailable { status: u16 },
    /// Anything else: semantic rejection, upstream body relayed verbatim.
    Rejected { status: u16, detail: Value },
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("scoring service unreachable: {0}")]
    Transport(String),
    #[error("scoring reply unreadable: {0}")]
    MalformedReply(String),
}

pub trait ScoringGateway: Send + Sync {
    fn score(
        &self,
        request: &ScoringRequest,
    ) -> impl Future<Output = Result<ScoringVerdict, ScoringError>> + Send;
}

/// Parse the prediction out of a raw scoring reply body.
pub fn prediction_from_raw(raw: &Value) -> Result<Prediction, ScoringError> {
    let reply: ScoringReply = serde_json::from_value(raw.clone())
        .map_err(|err| ScoringError::MalformedReply(err.to_string()))?;
    reply
        .data
        .into_iter()
        .next()
        .map(|entry| entry.prediction)
        .ok_or_else(|| ScoringError::MalformedReply("reply carries no Data entries".to_string()))
}

/// Build a [`ScoredAssessment`] from a raw reply body, keeping the body.
pub fn scored_from_raw(raw: Value) -> Result<ScoredAssessment, ScoringError> {
    let prediction = prediction_from_raw(&raw)?;
    Ok(ScoredAssessment { raw, prediction })
}

pub(crate) fn classify(status: u16, body: Value) -> Result<ScoringVerdict, ScoringError> {
    match status {
        201 => Ok(ScoringVerdict::Scored(scored_from_raw(body)?)),
        500.. => Ok(ScoringVerdict::Unavailable { status }),
        _ => Ok(ScoringVerdict::Rejected {
            status,
            detail: body,
        }),
    }
}

pub struct HttpScoringGateway {
    client: reqwest::Client,
    url: String,
    oauth_token: String,
}

impl HttpScoringGateway {
    pub fn new(client: reqwest::Client, url: String, oauth_token: String) -> Self {
        Self {
            client,
            url,
            oauth_token,
        }
    }
}

impl ScoringGateway for HttpScoringGateway {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoringVerdict, ScoringError> {
        let response = self
            .client
            .post(&self.url)
            .header("oauth", &self.oauth_token)
            .json(request)
            .send()
            .await
            .map_err(|err| ScoringError::Transport(err.to_string()))?;

        let status = response.status().as_u16();
        // 5xx replies may not carry JSON; classify on status alone.
        if status >= 500 {
            return Ok(ScoringVerdict::Unavailable { status });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| ScoringError::MalformedReply(err.to_string()))?;
        classify(status, body)
    }
}
