//! QA tests for the full analysis pipeline.
//!
//! These run against scripted model replies and an in-memory store,
//! so they are deterministic and need no API key.

use novel_core::testing::{assert_counts, assert_not_saved, assert_saved, PipelineHarness};

const NOVEL: &str = "지후는 대장간에서 일하는 과묵한 대장장이였다. \
    어느 날 동생 윤아가 찾아와 마을을 떠나자고 말했다. \
    지후는 말없이 망치를 내려놓았다.";

// =============================================================================
// TEST 1: Mixed verdicts persist only the PASS records
// =============================================================================

#[tokio::test]
async fn test_pass_records_saved_fail_records_reported() {
    let harness = PipelineHarness::new();

    harness.expect_extraction(
        r#"```json
{"characters": [
  {"full_name": "지후", "events": ["망치를 내려놓았다"], "characteristics": ["과묵하다"],
   "occupation": "대장장이", "relationships": {"윤아": "동생"}},
  {"full_name": "윤아", "events": ["마을을 떠나자고 말했다"], "relationships": {"지후": "오빠"}},
  {"full_name": "서준", "events": ["몰래 지켜보았다"]}
]}
```"#,
    );
    harness.expect_validation(
        r#"{"verdicts": [
  {"full_name": "지후", "verdict": "PASS", "rationale": "원문에서 확인"},
  {"full_name": "윤아", "verdict": "PASS", "rationale": "원문에서 확인"},
  {"full_name": "서준", "verdict": "FAIL", "rationale": "원문에 등장하지 않음"}
]}"#,
    );

    let summary = harness.analyze(NOVEL, Some("철의 계절")).await.unwrap();

    assert_counts(&summary, 3, 2, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].full_name, "서준");
    assert_eq!(summary.failures[0].reason, "원문에 등장하지 않음");

    assert_saved(&harness, "지후");
    assert_saved(&harness, "윤아");
    assert_not_saved(&harness, "서준");

    // Saved records carry the title they were analyzed under.
    let stored = harness.store.get("지후").unwrap().unwrap();
    assert_eq!(stored.record.novel_title.as_deref(), Some("철의 계절"));
    assert_eq!(stored.record.relationships["윤아"], "동생");
}

// =============================================================================
// TEST 2: Fail-closed validation saves nothing
// =============================================================================

#[tokio::test]
async fn test_all_fail_verdicts_save_nothing() {
    let harness = PipelineHarness::new();

    harness.expect_extraction(r#"{"characters": [{"full_name": "지후"}]}"#);
    harness.expect_validation(r#"{"verdicts": [{"full_name": "지후", "verdict": "FAIL", "rationale": "근거 부족"}]}"#);

    let summary = harness.analyze(NOVEL, None).await.unwrap();

    assert_counts(&summary, 1, 0, 0);
    assert_eq!(harness.saved_count(), 0);
}

#[tokio::test]
async fn test_missing_verdict_fails_closed() {
    let harness = PipelineHarness::new();

    harness.expect_extraction(
        r#"{"characters": [{"full_name": "지후"}, {"full_name": "윤아"}]}"#,
    );
    // The judge only rules on one of the two candidates.
    harness.expect_validation(
        r#"{"verdicts": [{"full_name": "지후", "verdict": "PASS", "rationale": "확인"}]}"#,
    );

    let summary = harness.analyze(NOVEL, None).await.unwrap();

    assert_counts(&summary, 2, 1, 1);
    assert_saved(&harness, "지후");
    assert_not_saved(&harness, "윤아");
    assert!(summary.failures[0].reason.contains("no verdict"));
}

// =============================================================================
// TEST 3: Zero candidates is a completed run
// =============================================================================

#[tokio::test]
async fn test_no_characters_is_normal_completion() {
    let harness = PipelineHarness::new();
    harness.expect_extraction(r#"{"characters": []}"#);
    // No validation reply queued: the validator must skip the model call.

    let summary = harness.analyze("바람이 불었다.", None).await.unwrap();

    assert_counts(&summary, 0, 0, 0);
    assert!(summary.failures.is_empty());
    assert_eq!(harness.saved_count(), 0);
}

// =============================================================================
// TEST 4: Duplicate candidates merge before validation
// =============================================================================

#[tokio::test]
async fn test_duplicate_candidates_merge_into_one() {
    let harness = PipelineHarness::new();

    harness.expect_extraction(
        r#"{"characters": [
  {"full_name": "지후", "events": ["떠났다"]},
  {"full_name": "지후", "events": ["돌아왔다"], "occupation": "대장장이"}
]}"#,
    );
    harness.expect_validation(
        r#"{"verdicts": [{"full_name": "지후", "verdict": "PASS", "rationale": "확인"}]}"#,
    );

    let summary = harness.analyze(NOVEL, None).await.unwrap();

    assert_counts(&summary, 1, 1, 1);
    assert_eq!(harness.saved_count(), 1);

    let stored = harness.store.get("지후").unwrap().unwrap();
    assert_eq!(stored.record.events, vec!["떠났다", "돌아왔다"]);
    assert_eq!(stored.record.occupation.as_deref(), Some("대장장이"));
}

// =============================================================================
// TEST 5: Re-running the same text overwrites, never duplicates
// =============================================================================

#[tokio::test]
async fn test_rerun_overwrites_instead_of_duplicating() {
    let harness = PipelineHarness::new();

    for _ in 0..2 {
        harness.expect_extraction(
            r#"{"characters": [{"full_name": "지후", "occupation": "대장장이"}]}"#,
        );
        harness.expect_validation(
            r#"{"verdicts": [{"full_name": "지후", "verdict": "PASS", "rationale": "확인"}]}"#,
        );
        let summary = harness.analyze(NOVEL, None).await.unwrap();
        assert_counts(&summary, 1, 1, 1);
    }

    assert_eq!(harness.saved_count(), 1);
}

// =============================================================================
// TEST 6: Extraction failure stops the run with an empty partial summary
// =============================================================================

#[tokio::test]
async fn test_unusable_extraction_reply_is_an_error() {
    let harness = PipelineHarness::new();
    harness.expect_extraction("이 텍스트에는 인물이 없는 것 같습니다.");

    let error = harness.analyze(NOVEL, None).await.unwrap_err();

    assert_eq!(error.summary.candidates_extracted, 0);
    assert_eq!(error.summary.saved, 0);
    assert_eq!(harness.saved_count(), 0);
    assert!(error.error.to_string().contains("Extraction failed"));
}

#[tokio::test]
async fn test_validator_transport_failure_writes_nothing() {
    let harness = PipelineHarness::new();
    harness.expect_extraction(
        r#"{"characters": [{"full_name": "지후"}, {"full_name": "윤아"}, {"full_name": "서준"}]}"#,
    );
    // The validation call itself fails, before any verdicts exist.
    harness.model.queue_error(gemini::Error::Api {
        status: 429,
        message: "rate limited".to_string(),
    });

    let error = harness.analyze(NOVEL, None).await.unwrap_err();

    assert_eq!(error.summary.candidates_extracted, 3);
    assert_eq!(error.summary.validated, 0);
    assert_eq!(error.summary.saved, 0);
    assert_eq!(harness.saved_count(), 0);
    assert!(error.error.to_string().contains("Validation failed"));
}

#[tokio::test]
async fn test_validation_error_reports_extraction_progress() {
    let harness = PipelineHarness::new();
    harness.expect_extraction(
        r#"{"characters": [{"full_name": "지후"}, {"full_name": "윤아"}]}"#,
    );
    harness.expect_validation("판정 불가");

    let error = harness.analyze(NOVEL, None).await.unwrap_err();

    assert_eq!(error.summary.candidates_extracted, 2);
    assert_eq!(error.summary.saved, 0);
    assert!(error.error.to_string().contains("Validation failed"));
}
