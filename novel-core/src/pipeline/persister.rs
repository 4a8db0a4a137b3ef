//! Persistence stage.
//!
//! Plain code, no model. Walks the candidate/verdict pairs and upserts
//! every PASS into the store. Each upsert stands alone: a storage error
//! aborts the rest of the batch but never rolls back records already
//! written.

use super::{RecordFailure, RunSummary, ValidationVerdict, Verdict};
use crate::character::CharacterRecord;
use crate::store::{CharacterSink, StorageError};
use std::sync::Arc;

/// A storage error plus the progress made before it.
#[derive(Debug)]
pub struct PersistFailure {
    pub error: StorageError,
    pub partial: RunSummary,
}

/// Third pipeline stage: write validated records to the store.
pub struct Persister {
    store: Arc<dyn CharacterSink>,
}

impl Persister {
    pub fn new(store: Arc<dyn CharacterSink>) -> Self {
        Self { store }
    }

    /// Upsert every PASS candidate and report the run.
    ///
    /// `verdicts` must be aligned to `candidates` by position, which is
    /// what [`super::Validator::validate`] produces. FAIL candidates
    /// land in the summary's failure list with the judge's rationale.
    pub fn persist(
        &self,
        candidates: &[CharacterRecord],
        verdicts: &[ValidationVerdict],
    ) -> Result<RunSummary, PersistFailure> {
        let mut summary = RunSummary {
            candidates_extracted: candidates.len(),
            validated: verdicts
                .iter()
                .filter(|v| v.verdict == Verdict::Pass)
                .count(),
            ..RunSummary::default()
        };

        for (candidate, verdict) in candidates.iter().zip(verdicts) {
            match verdict.verdict {
                Verdict::Pass => {
                    if let Err(error) = self.store.upsert(candidate) {
                        tracing::error!(
                            full_name = %candidate.full_name,
                            %error,
                            "upsert failed, aborting batch"
                        );
                        summary.failures.push(RecordFailure {
                            full_name: candidate.full_name.clone(),
                            reason: format!("storage error: {error}"),
                        });
                        return Err(PersistFailure {
                            error,
                            partial: summary,
                        });
                    }
                    summary.saved += 1;
                }
                Verdict::Fail => {
                    let reason = if verdict.rationale.is_empty() {
                        "failed validation".to_string()
                    } else {
                        verdict.rationale.clone()
                    };
                    summary.failures.push(RecordFailure {
                        full_name: candidate.full_name.clone(),
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            saved = summary.saved,
            failed = summary.failures.len(),
            "persistence complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CharacterStore;

    fn verdict(name: &str, verdict: Verdict, rationale: &str) -> ValidationVerdict {
        ValidationVerdict {
            full_name: name.to_string(),
            verdict,
            rationale: rationale.to_string(),
        }
    }

    #[test]
    fn test_only_pass_candidates_are_saved() {
        let store = Arc::new(CharacterStore::in_memory().unwrap());
        let candidates = vec![CharacterRecord::new("지후"), CharacterRecord::new("윤아")];
        let verdicts = vec![
            verdict("지후", Verdict::Pass, "확인"),
            verdict("윤아", Verdict::Fail, "원문에 없음"),
        ];

        let summary = Persister::new(store.clone())
            .persist(&candidates, &verdicts)
            .unwrap();

        assert_eq!(summary.candidates_extracted, 2);
        assert_eq!(summary.validated, 1);
        assert_eq!(summary.saved, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].full_name, "윤아");
        assert_eq!(summary.failures[0].reason, "원문에 없음");

        assert!(store.get("지후").unwrap().is_some());
        assert!(store.get("윤아").unwrap().is_none());
    }

    #[test]
    fn test_all_fail_saves_nothing() {
        let store = Arc::new(CharacterStore::in_memory().unwrap());
        let candidates = vec![CharacterRecord::new("지후")];
        let verdicts = vec![verdict("지후", Verdict::Fail, "")];

        let summary = Persister::new(store.clone())
            .persist(&candidates, &verdicts)
            .unwrap();

        assert_eq!(summary.saved, 0);
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(summary.failures[0].reason, "failed validation");
    }

    #[test]
    fn test_storage_error_aborts_batch_with_partial_summary() {
        use crate::store::CharacterStore;
        use crate::testing::FailingStore;

        let inner = Arc::new(CharacterStore::in_memory().unwrap());
        // First write succeeds, every later write fails.
        let store = Arc::new(FailingStore::after(inner.clone(), 1));

        let candidates = vec![
            CharacterRecord::new("지후"),
            CharacterRecord::new("윤아"),
            CharacterRecord::new("서준"),
        ];
        let verdicts = vec![
            verdict("지후", Verdict::Pass, "확인"),
            verdict("윤아", Verdict::Pass, "확인"),
            verdict("서준", Verdict::Pass, "확인"),
        ];

        let failure = Persister::new(store)
            .persist(&candidates, &verdicts)
            .unwrap_err();

        assert_eq!(failure.partial.candidates_extracted, 3);
        assert_eq!(failure.partial.validated, 3);
        assert_eq!(failure.partial.saved, 1);
        assert_eq!(failure.partial.failures.len(), 1);
        assert_eq!(failure.partial.failures[0].full_name, "윤아");
        assert!(failure.partial.failures[0].reason.contains("storage error"));

        // The failing write aborted the batch: the third candidate was
        // never attempted and only the first row landed.
        assert_eq!(inner.count().unwrap(), 1);
        assert!(inner.get("지후").unwrap().is_some());
        assert!(inner.get("서준").unwrap().is_none());
    }

    #[test]
    fn test_empty_batch_reports_zeros() {
        let store = Arc::new(CharacterStore::in_memory().unwrap());
        let summary = Persister::new(store).persist(&[], &[]).unwrap();
        assert_eq!(summary, RunSummary::default());
    }
}
