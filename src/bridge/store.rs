use crate::bridge::intake::NormalizedIntake;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Document field every lookup keys on.
pub const RECORD_ID_FIELD: &str = "record_id";

/// The durable unit: one per successful scoring call, never mutated after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordBundle {
    pub record_id: String,
    pub patient_data: NormalizedIntake,
    pub patient_risk_data: Value,
    pub report_token: String,
    pub time_stamp: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Document-store abstraction consumed by the bridge. Collections hold
/// loose JSON documents; lookups match on the `record_id` field. A real
/// database client implements this outside the core.
pub trait RecordStore: Send + Sync {
    fn insert(&self, document: Value, collection: &str) -> Result<String, StoreError>;
    fn find_by_record_id(
        &self,
        record_id: &str,
        collection: &str,
    ) -> Result<Option<Value>, StoreError>;
}

/// Mutex-held in-process store used for development and tests.
#[derive(Default, Clone)]
pub struct MemoryRecordStore {
    collections: Arc<Mutex<HashMap<String, Vec<Value>>>>,
}

impl RecordStore for MemoryRecordStore {
    fn insert(&self, document: Value, collection: &str) -> Result<String, StoreError> {
        let inserted_id = document
            .get(RECORD_ID_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut guard = self.collections.lock().expect("store mutex poisoned");
        guard.entry(collection.to_string()).or_default().push(document);
        Ok(inserted_id)
    }

    fn find_by_record_id(
        &self,
        record_id: &str,
        collection: &str,
    ) -> Result<Option<Value>, StoreError> {
        let guard = self.collections.lock().expect("store mutex poisoned");
        Ok(guard.get(collection).and_then(|documents| {
            documents
                .iter()
                .find(|document| {
                    document.get(RECORD_ID_FIELD).and_then(Value::as_str) == Some(record_id)
                })
                .cloned()
        }))
    }
}

impl MemoryRecordStore {
    /// Number of documents held in a collection; test/diagnostic helper.
    pub fn count(&self, collection: &str) -> usize {
        let guard = self.collections.lock().expect("store mutex poisoned");
        guard.get(collection).map_or(0, Vec::len)
    }
}
