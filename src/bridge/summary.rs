use crate::bridge::scoring::{MedicalProtocol, Prediction};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-facing view of a scored assessment. Derived fresh from the
/// prediction on every response; never the canonical stored form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredSummary {
    pub risk_status: String,
    pub risk_score: f64,
    pub acceptable_score: Value,
    pub top_risk_factors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<ProtocolSummary>,
}

/// Relabeled care-protocol extras, only present in the extended variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolSummary {
    pub diagnosis: String,
    pub lab_tests: String,
    pub medication: Value,
    pub referral: Value,
    pub advice: Value,
}

/// Derive the caller-facing summary from a prediction.
///
/// Moderate and High risk tiers get the coupon attached; Low and anything
/// unrecognized do not. The derivation is deterministic: the same stored
/// prediction always produces the identical summary.
pub fn derive_summary(
    prediction: &Prediction,
    coupon_code: &str,
    extended_protocol: bool,
) -> FilteredSummary {
    let heart_risk = &prediction.heart_risk;
    let coupon = if coupon_tier(&heart_risk.risk) {
        Some(coupon_code.to_string())
    } else {
        None
    };

    let protocol = if extended_protocol {
        prediction.medical_protocol.as_ref().map(protocol_summary)
    } else {
        None
    };

    FilteredSummary {
        risk_status: heart_risk.risk.clone(),
        risk_score: heart_risk.score,
        acceptable_score: heart_risk.acceptable_score.clone(),
        top_risk_factors: heart_risk.top_risk_factors.clone(),
        coupon,
        protocol,
    }
}

fn coupon_tier(risk: &str) -> bool {
    matches!(
        risk.to_ascii_lowercase().as_str(),
        "moderate risk" | "high risk"
    )
}

fn protocol_summary(protocol: &MedicalProtocol) -> ProtocolSummary {
    ProtocolSummary {
        diagnosis: flagged_labels(&protocol.diagnosis),
        lab_tests: flagged_labels(&protocol.lab_test),
        medication: protocol.medication.clone(),
        referral: protocol.referral.clone(),
        advice: protocol.advice.clone(),
    }
}

// An item is flagged when its value is the literal "Yes".
fn flagged_labels(items: &Map<String, Value>) -> String {
    items
        .iter()
        .filter(|(_, value)| value.as_str() == Some("Yes"))
        .map(|(label, _)| label.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
