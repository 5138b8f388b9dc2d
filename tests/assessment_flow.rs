mod support;

use aicvd_bridge::bridge::store::RecordStore;
use aicvd_bridge::bridge::{AssessmentOutcome, AssessmentService, ReportError};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use support::{
    harness, sample_intake, scoring_reply, test_settings, tokens, verified_harness, FailingStore,
    IdentityBehavior, RecordingCrm, ScoringBehavior, StubIdentity, StubScoring, TEST_COUPON,
};

fn created(body: serde_json::Value) -> ScoringBehavior {
    ScoringBehavior::Reply { status: 201, body }
}

#[tokio::test]
async fn moderate_risk_assessment_completes_with_coupon() {
    let harness = verified_harness(created(scoring_reply("Moderate Risk", 62.0)));

    let outcome = harness.service.assess(sample_intake(Some("abc"))).await;
    let done = match outcome {
        AssessmentOutcome::Completed(done) => done,
        other => panic!("expected Completed, got {other:?}"),
    };

    assert_eq!(done.summary.risk_status, "Moderate Risk");
    assert_eq!(done.summary.risk_score, 62.0);
    assert_eq!(done.summary.coupon.as_deref(), Some(TEST_COUPON));

    // The bundle is durable and carries the issued credential.
    let stored = harness
        .store
        .find_by_record_id(&done.record_id, "aicvd")
        .expect("store readable")
        .expect("bundle persisted");
    assert_eq!(stored["report_token"], json!(done.report_token));
    assert_eq!(stored["patient_data"]["Age"], json!(40));
    assert_eq!(stored["patient_data"]["Gender"], json!("Female"));

    // CRM got the summarized relay with the caller's upstream token.
    let calls = harness.crm.calls();
    assert_eq!(calls.len(), 1);
    let (notification, bearer) = &calls[0];
    assert_eq!(bearer, "t1");
    assert_eq!(notification.hashid, "abc");
    assert_eq!(notification.record_id, done.record_id);
    assert_eq!(notification.risk_category, "Moderate Risk");
    assert!(notification.report_url.contains(&done.record_id));
    assert!(notification.report_url.contains(&done.report_token));

    // The CRM's own reply lands in the audit collection.
    assert_eq!(harness.store.count("aicvd_crm"), 1);
}

#[tokio::test]
async fn stored_record_reproduces_the_original_summary() {
    let harness = verified_harness(created(scoring_reply("High Risk", 81.0)));

    let outcome = harness.service.assess(sample_intake(Some("abc"))).await;
    let done = match outcome {
        AssessmentOutcome::Completed(done) => done,
        other => panic!("expected Completed, got {other:?}"),
    };

    let report = harness
        .service
        .report(&done.report_token, &done.record_id)
        .expect("report retrievable with issued credential");

    assert_eq!(report.patient_risk_data, done.summary);
    assert_eq!(report.patient_info.age, 40);
    assert_eq!(report.patient_info.gender, "Female");
}

#[tokio::test]
async fn expired_credential_is_rejected_even_when_the_record_exists() {
    let harness = verified_harness(created(scoring_reply("Low Risk", 12.0)));

    let outcome = harness.service.assess(sample_intake(Some("abc"))).await;
    let done = match outcome {
        AssessmentOutcome::Completed(done) => done,
        other => panic!("expected Completed, got {other:?}"),
    };

    // Same secret, same record id, issued 31 days ago.
    let expired = tokens()
        .issue_at(&done.record_id, Utc::now() - Duration::days(31))
        .expect("issues");

    let error = harness
        .service
        .report(&expired, &done.record_id)
        .expect_err("expired credential must fail");
    assert!(matches!(error, ReportError::Unauthenticated));

    // The record itself is still there.
    assert!(harness
        .store
        .find_by_record_id(&done.record_id, "aicvd")
        .expect("store readable")
        .is_some());
}

#[tokio::test]
async fn credential_bound_to_another_record_is_rejected() {
    let harness = verified_harness(created(scoring_reply("Low Risk", 12.0)));

    let outcome = harness.service.assess(sample_intake(Some("abc"))).await;
    let done = match outcome {
        AssessmentOutcome::Completed(done) => done,
        other => panic!("expected Completed, got {other:?}"),
    };

    let foreign = tokens().issue("some-other-record").expect("issues");
    let error = harness
        .service
        .report(&foreign, &done.record_id)
        .expect_err("mismatched credential must fail");
    assert!(matches!(error, ReportError::Unauthenticated));
}

#[tokio::test]
async fn unknown_record_id_reports_not_found() {
    let harness = verified_harness(created(scoring_reply("Low Risk", 12.0)));

    let credential = tokens().issue("no-such-record").expect("issues");
    let error = harness
        .service
        .report(&credential, "no-such-record")
        .expect_err("missing record must fail");
    assert!(matches!(error, ReportError::NotFound));
}

#[tokio::test]
async fn crm_failure_never_alters_the_primary_outcome() {
    let healthy = verified_harness(created(scoring_reply("Moderate Risk", 62.0)));
    let broken = harness(
        IdentityBehavior::Verified("t1".to_string()),
        created(scoring_reply("Moderate Risk", 62.0)),
        true,
        test_settings(),
    );

    let healthy_outcome = healthy.service.assess(sample_intake(Some("abc"))).await;
    let broken_outcome = broken.service.assess(sample_intake(Some("abc"))).await;

    let (healthy_done, broken_done) = match (healthy_outcome, broken_outcome) {
        (AssessmentOutcome::Completed(a), AssessmentOutcome::Completed(b)) => (a, b),
        other => panic!("both flows must complete, got {other:?}"),
    };

    assert_eq!(healthy_done.summary, broken_done.summary);
    // No audit document when the forward failed, and the record still exists.
    assert_eq!(broken.store.count("aicvd_crm"), 0);
    assert_eq!(broken.store.count("aicvd"), 1);
}

#[tokio::test]
async fn persistence_failure_never_fails_the_response() {
    let service = AssessmentService::new(
        Arc::new(FailingStore),
        Arc::new(StubIdentity {
            behavior: IdentityBehavior::Verified("t1".to_string()),
        }),
        Arc::new(StubScoring::new(created(scoring_reply(
            "Moderate Risk",
            62.0,
        )))),
        Arc::new(RecordingCrm::new(false)),
        tokens(),
        test_settings(),
    );

    let outcome = service.assess(sample_intake(Some("abc"))).await;
    match outcome {
        AssessmentOutcome::Completed(done) => {
            assert_eq!(done.summary.coupon.as_deref(), Some(TEST_COUPON));
        }
        other => panic!("expected Completed, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_hashid_is_unauthenticated() {
    let harness = verified_harness(created(scoring_reply("Low Risk", 12.0)));

    let outcome = harness.service.assess(sample_intake(None)).await;
    assert!(matches!(outcome, AssessmentOutcome::Unauthenticated));

    let outcome = harness.service.assess(sample_intake(Some(""))).await;
    assert!(matches!(outcome, AssessmentOutcome::Unauthenticated));

    // Nothing was scored, stored, or forwarded.
    assert_eq!(harness.store.count("aicvd"), 0);
    assert!(harness.crm.calls().is_empty());
}

#[tokio::test]
async fn rejected_identity_exchange_is_unauthenticated() {
    let harness = harness(
        IdentityBehavior::Rejected,
        created(scoring_reply("Low Risk", 12.0)),
        false,
        test_settings(),
    );

    let outcome = harness.service.assess(sample_intake(Some("abc"))).await;
    assert!(matches!(outcome, AssessmentOutcome::Unauthenticated));
}

#[tokio::test]
async fn unreachable_identity_service_fails_generically() {
    let harness = harness(
        IdentityBehavior::Unreachable,
        created(scoring_reply("Low Risk", 12.0)),
        false,
        test_settings(),
    );

    let outcome = harness.service.assess(sample_intake(Some("abc"))).await;
    assert!(matches!(outcome, AssessmentOutcome::Failed));
}

#[tokio::test]
async fn scoring_5xx_maps_to_scoring_unavailable() {
    let harness = verified_harness(ScoringBehavior::Reply {
        status: 503,
        body: json!({}),
    });

    let outcome = harness.service.assess(sample_intake(Some("abc"))).await;
    assert!(matches!(outcome, AssessmentOutcome::ScoringUnavailable));
    assert_eq!(harness.store.count("aicvd"), 0);
}

#[tokio::test]
async fn scoring_rejection_relays_the_upstream_body() {
    let detail = json!({"Message": "Gender must be Male or Female"});
    let harness = verified_harness(ScoringBehavior::Reply {
        status: 422,
        body: detail.clone(),
    });

    let outcome = harness.service.assess(sample_intake(Some("abc"))).await;
    match outcome {
        AssessmentOutcome::ScoringRejected { detail: relayed } => assert_eq!(relayed, detail),
        other => panic!("expected ScoringRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn broken_scoring_transport_fails_generically() {
    let harness = verified_harness(ScoringBehavior::Broken);

    let outcome = harness.service.assess(sample_intake(Some("abc"))).await;
    assert!(matches!(outcome, AssessmentOutcome::Failed));
}

#[tokio::test]
async fn defaults_are_applied_before_the_scoring_call() {
    let harness = verified_harness(created(scoring_reply("Low Risk", 12.0)));

    harness.service.assess(sample_intake(Some("abc"))).await;

    let seen = harness.scoring.seen.lock().expect("seen mutex poisoned");
    assert_eq!(seen.len(), 1);
    let request = &seen[0];
    assert_eq!(request.age, 40);
    assert_eq!(request.gender, "Female");
    assert_eq!(request.bmi, 25.0);
    assert_eq!(request.diet, "Non-Veg");
    assert_eq!(request.blood_pressure_systolic, 120.0);
    assert_eq!(request.blood_pressure_diastolic, 80.0);
    assert!(request.id.starts_with("247-bridge-"));
}

#[tokio::test]
async fn auth_free_variant_skips_the_identity_exchange() {
    let mut settings = test_settings();
    settings.require_caller_auth = false;

    let harness = harness(
        IdentityBehavior::Unreachable,
        created(scoring_reply("Low Risk", 12.0)),
        false,
        settings,
    );

    // No hashid, identity service down: the legacy variant still scores.
    let outcome = harness.service.assess(sample_intake(None)).await;
    let done = match outcome {
        AssessmentOutcome::Completed(done) => done,
        other => panic!("expected Completed, got {other:?}"),
    };
    assert_eq!(done.summary.risk_status, "Low Risk");

    // The CRM relay goes out without a bearer token.
    let calls = harness.crm.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, "");
}
