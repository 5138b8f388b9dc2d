use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

const DEFAULT_AGE: u32 = 25;
const DEFAULT_BMI: f64 = 25.0;
const DEFAULT_BP_DIASTOLIC: f64 = 80.0;
const DEFAULT_BP_SYSTOLIC: f64 = 120.0;
const DEFAULT_HEART_RATE: f64 = 90.0;

/// Clinical intake payload as submitted by the caller. Every clinical field
/// is optional; absent and empty values are filled in by [`normalize`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IntakeRecord {
    #[serde(rename = "hashid", default, skip_serializing_if = "Option::is_none")]
    pub hashid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(rename = "BMI", default, deserialize_with = "lenient_f64")]
    pub bmi: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub blood_pressure_diastolic: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub blood_pressure_systolic: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub heart_rate_per_minute: Option<f64>,
    #[serde(default)]
    pub physical_activity: Option<String>,
    #[serde(default)]
    pub smoke: Option<String>,
    #[serde(default)]
    pub tobacco: Option<String>,
    #[serde(default)]
    pub diet: Option<String>,
    #[serde(default)]
    pub alcohol: Option<String>,
    #[serde(default)]
    pub diabetes_mellitus: Option<String>,
    #[serde(default)]
    pub hypertension: Option<String>,
    #[serde(default)]
    pub dyslipidaemia: Option<String>,
}

/// Intake record with every recognized field populated. This is the shape
/// that gets mapped onto the scoring wire schema and persisted with the
/// assessment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NormalizedIntake {
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

/// Fill absent or empty fields with their documented defaults. Present
/// non-empty values pass through untouched.
pub fn normalize(record: &IntakeRecord) -> NormalizedIntake {
    NormalizedIntake {
        id: text_or_else(&record.id, || format!("247-bridge-{}", Uuid::new_v4())),
        age: record.age.unwrap_or(DEFAULT_AGE),
        gender: text_or(&record.gender, "Male"),
        bmi: record.bmi.unwrap_or(DEFAULT_BMI),
        blood_pressure_diastolic: record
            .blood_pressure_diastolic
            .unwrap_or(DEFAULT_BP_DIASTOLIC),
        blood_pressure_systolic: record
            .blood_pressure_systolic
            .unwrap_or(DEFAULT_BP_SYSTOLIC),
        heart_rate_per_minute: record.heart_rate_per_minute.unwrap_or(DEFAULT_HEART_RATE),
        physical_activity: text_or(&record.physical_activity, "Active"),
        smoke: text_or(&record.smoke, "No"),
        tobacco: text_or(&record.tobacco, "No"),
        diet: text_or(&record.diet, "Non-Veg"),
        alcohol: text_or(&record.alcohol, "No"),
        diabetes_mellitus: text_or(&record.diabetes_mellitus, "No"),
        hypertension: text_or(&record.hypertension, "No"),
        dyslipidaemia: text_or(&record.dyslipidaemia, "No"),
    }
}

fn text_or(value: &Option<String>, fallback: &str) -> String {
    match value {
        Some(text) if !text.is_empty() => text.clone(),
        _ => fallback.to_string(),
    }
}

fn text_or_else(value: &Option<String>, fallback: impl FnOnce() -> String) -> String {
    match value {
        Some(text) if !text.is_empty() => text.clone(),
        _ => fallback(),
    }
}

// Callers occasionally submit numeric vitals as strings, or clear a form
// field down to "". Both read as "absent" rather than as a type error.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(number) => number
            .as_f64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("number out of range")),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected a number, got {other}"
        ))),
    }
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(number) => number
            .as_u64()
            .and_then(|value| u32::try_from(value).ok())
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected a non-negative whole number")),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => text
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected a number, got {other}"
        ))),
    }
}
