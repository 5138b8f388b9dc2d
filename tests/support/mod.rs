#![allow(dead_code)]

use aicvd_bridge::bridge::crm::{CrmError, CrmGateway, CrmNotification};
use aicvd_bridge::bridge::identity::{IdentityError, IdentityGateway, IdentityVerdict};
use aicvd_bridge::bridge::intake::IntakeRecord;
use aicvd_bridge::bridge::report_token::ReportTokens;
use aicvd_bridge::bridge::scoring::{
    scored_from_raw, ScoringError, ScoringGateway, ScoringRequest, ScoringVerdict,
};
use aicvd_bridge::bridge::store::{MemoryRecordStore, RecordStore, StoreError};
use aicvd_bridge::bridge::{AssessmentService, BridgeSettings};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub const TEST_SECRET: &[u8] = b"integration-test-secret";
pub const TEST_COUPON: &str = "HEART50";

pub fn tokens() -> ReportTokens {
    ReportTokens::new(TEST_SECRET.to_vec())
}

pub fn test_settings() -> BridgeSettings {
    BridgeSettings {
        coupon_code: TEST_COUPON.to_string(),
        report_url: "http://bridge.test/aicvd-report".to_string(),
        records_collection: "aicvd".to_string(),
        crm_audit_collection: "aicvd_crm".to_string(),
        require_caller_auth: true,
        extended_protocol: false,
    }
}

pub fn scoring_reply(risk: &str, score: f64) -> Value {
    json!({
        "Data": [{
            "Prediction": {
                "HeartRisk": {
                    "Risk": risk,
                    "Score": score,
                    "AcceptableScore": 20,
                    "TopRiskFactors": ["Smoke", "BMI"]
                }
            }
        }]
    })
}

pub fn sample_intake(hashid: Option<&str>) -> IntakeRecord {
    IntakeRecord {
        hashid: hashid.map(str::to_string),
        age: Some(40),
        gender: Some("Female".to_string()),
        ..IntakeRecord::default()
    }
}

pub enum IdentityBehavior {
    Verified(String),
    Rejected,
    Unreachable,
}

pub struct StubIdentity {
    pub behavior: IdentityBehavior,
}

impl IdentityGateway for StubIdentity {
    async fn exchange(&self, _hashid: &str) -> Result<IdentityVerdict, IdentityError> {
        match &self.behavior {
            IdentityBehavior::Verified(token) => Ok(IdentityVerdict::Verified {
                token: token.clone(),
            }),
            IdentityBehavior::Rejected => Ok(IdentityVerdict::Rejected),
            IdentityBehavior::Unreachable => Err(IdentityError::Transport(
                "connection refused".to_string(),
            )),
        }
    }
}

pub enum ScoringBehavior {
    Reply { status: u16, body: Value },
    Broken,
}

pub struct StubScoring {
    pub behavior: ScoringBehavior,
    pub seen: Mutex<Vec<ScoringRequest>>,
}

impl StubScoring {
    pub fn new(behavior: ScoringBehavior) -> Self {
        Self {
            behavior,
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl ScoringGateway for StubScoring {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoringVerdict, ScoringError> {
        self.seen
            .lock()
            .expect("seen mutex poisoned")
            .push(request.clone());

        match &self.behavior {
            ScoringBehavior::Reply { status, body } => match *status {
                201 => Ok(ScoringVerdict::Scored(scored_from_raw(body.clone())?)),
                status if status >= 500 => Ok(ScoringVerdict::Unavailable { status }),
                status => Ok(ScoringVerdict::Rejected {
                    status,
                    detail: body.clone(),
                }),
            },
            ScoringBehavior::Broken => Err(ScoringError::Transport(
                "connection reset by peer".to_string(),
            )),
        }
    }
}

pub struct RecordingCrm {
    pub calls: Mutex<Vec<(CrmNotification, String)>>,
    pub fail: bool,
}

impl RecordingCrm {
    pub fn new(fail: bool) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail,
        }
    }

    pub fn calls(&self) -> Vec<(CrmNotification, String)> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }
}

impl CrmGateway for RecordingCrm {
    async fn forward(
        &self,
        notification: &CrmNotification,
        bearer_token: &str,
    ) -> Result<Value, CrmError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push((notification.clone(), bearer_token.to_string()));

        if self.fail {
            Err(CrmError::Transport("connection reset".to_string()))
        } else {
            Ok(json!({ "status": "received" }))
        }
    }
}

/// Store whose writes always fail; reads find nothing.
#[derive(Default, Clone)]
pub struct FailingStore;

impl RecordStore for FailingStore {
    fn insert(&self, _document: Value, _collection: &str) -> Result<String, StoreError> {
        Err(StoreError::Unavailable("write refused".to_string()))
    }

    fn find_by_record_id(
        &self,
        _record_id: &str,
        _collection: &str,
    ) -> Result<Option<Value>, StoreError> {
        Ok(None)
    }
}

pub type StubService = AssessmentService<MemoryRecordStore, StubIdentity, StubScoring, RecordingCrm>;

pub struct Harness {
    pub store: Arc<MemoryRecordStore>,
    pub scoring: Arc<StubScoring>,
    pub crm: Arc<RecordingCrm>,
    pub service: Arc<StubService>,
}

pub fn harness(
    identity: IdentityBehavior,
    scoring: ScoringBehavior,
    fail_crm: bool,
    settings: BridgeSettings,
) -> Harness {
    let store = Arc::new(MemoryRecordStore::default());
    let scoring = Arc::new(StubScoring::new(scoring));
    let crm = Arc::new(RecordingCrm::new(fail_crm));
    let service = Arc::new(AssessmentService::new(
        store.clone(),
        Arc::new(StubIdentity { behavior: identity }),
        scoring.clone(),
        crm.clone(),
        tokens(),
        settings,
    ));

    Harness {
        store,
        scoring,
        crm,
        service,
    }
}

pub fn verified_harness(scoring: ScoringBehavior) -> Harness {
    harness(
        IdentityBehavior::Verified("t1".to_string()),
        scoring,
        false,
        test_settings(),
    )
}
