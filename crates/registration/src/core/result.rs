use chrono::NaiveDateTime;
use serde::Serialize;

use coursedrill_core::CourseId;

use super::warning::WarningState;

/// How one submit ended, short of a remote failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AttemptOutcome {
    Warning(WarningState),
    Succeeded { course_id: CourseId },
    /// The run stopped while waiting in the queue.
    Cancelled,
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Succeeded { .. })
    }

    pub fn warning(&self) -> WarningState {
        match self {
            AttemptOutcome::Warning(w) => *w,
            _ => WarningState::None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Warning(w) => w.key(),
            AttemptOutcome::Succeeded { .. } => "succeeded",
            AttemptOutcome::Cancelled => "cancelled",
        }
    }
}

/// What a recorded submit came to, including remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordedOutcome {
    Succeeded,
    Rejected(WarningState),
    Cancelled,
    RemoteError,
}

impl RecordedOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RecordedOutcome::Succeeded => "succeeded",
            RecordedOutcome::Rejected(w) => w.key(),
            RecordedOutcome::Cancelled => "cancelled",
            RecordedOutcome::RemoteError => "remoteError",
        }
    }
}

impl From<&AttemptOutcome> for RecordedOutcome {
    fn from(outcome: &AttemptOutcome) -> Self {
        match outcome {
            AttemptOutcome::Succeeded { .. } => RecordedOutcome::Succeeded,
            AttemptOutcome::Warning(w) => RecordedOutcome::Rejected(*w),
            AttemptOutcome::Cancelled => RecordedOutcome::Cancelled,
        }
    }
}

/// One submit within the current run. Kept in memory only.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub course_id: Option<CourseId>,
    pub virtual_at: Option<NaiveDateTime>,
    /// Milliseconds after the target instant, when it was reached.
    pub diff_ms: Option<i64>,
    pub queue_steps: u32,
    pub outcome: RecordedOutcome,
}

/// Totals for the current run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_attempts: usize,
    pub successful: usize,
    pub quota_over: usize,
    pub rejected_locally: usize,
    pub remote_errors: usize,
    pub fastest_diff_ms: Option<i64>,
}

impl RunSummary {
    pub fn from_records(records: &[AttemptRecord]) -> Self {
        let mut summary = RunSummary {
            total_attempts: records.len(),
            ..RunSummary::default()
        };
        for record in records {
            match record.outcome {
                RecordedOutcome::Succeeded => summary.successful += 1,
                // only a server answer counts as full; the local short-circuit has no diff
                RecordedOutcome::Rejected(WarningState::QuotaOver) if record.diff_ms.is_some() => {
                    summary.quota_over += 1
                }
                RecordedOutcome::Rejected(_) => summary.rejected_locally += 1,
                RecordedOutcome::RemoteError => summary.remote_errors += 1,
                RecordedOutcome::Cancelled => {}
            }
        }
        summary.fastest_diff_ms = records
            .iter()
            .filter(|r| r.outcome == RecordedOutcome::Succeeded)
            .filter_map(|r| r.diff_ms)
            .min();
        summary
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            (self.successful as f64 / self.total_attempts as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(outcome: RecordedOutcome, diff_ms: Option<i64>) -> AttemptRecord {
        AttemptRecord {
            course_id: Some(1),
            virtual_at: None,
            diff_ms,
            queue_steps: 0,
            outcome,
        }
    }

    #[test]
    fn test_summary_counts() {
        let records = vec![
            record(RecordedOutcome::Rejected(WarningState::BeforeTime), None),
            record(RecordedOutcome::Succeeded, Some(1840)),
            record(RecordedOutcome::Succeeded, Some(620)),
            record(RecordedOutcome::Rejected(WarningState::QuotaOver), Some(3100)),
            record(RecordedOutcome::Rejected(WarningState::QuotaOver), None),
            record(RecordedOutcome::RemoteError, Some(200)),
            record(RecordedOutcome::Cancelled, Some(900)),
        ];
        let summary = RunSummary::from_records(&records);
        assert_eq!(summary.total_attempts, 7);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.quota_over, 1);
        assert_eq!(summary.rejected_locally, 2);
        assert_eq!(summary.remote_errors, 1);
        assert_eq!(summary.fastest_diff_ms, Some(620));
        assert!((summary.success_rate() - 28.571).abs() < 0.01);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(AttemptOutcome::Warning(WarningState::QuotaOver).label(), "quotaOver");
        assert!(AttemptOutcome::Succeeded { course_id: 2 }.is_success());
        assert_eq!(AttemptOutcome::Cancelled.warning(), WarningState::None);
    }

    #[test]
    fn test_recorded_outcome_follows_attempt() {
        let cases = [
            (AttemptOutcome::Succeeded { course_id: 4 }, RecordedOutcome::Succeeded),
            (AttemptOutcome::Cancelled, RecordedOutcome::Cancelled),
            (
                AttemptOutcome::Warning(WarningState::CaptchaError),
                RecordedOutcome::Rejected(WarningState::CaptchaError),
            ),
        ];
        for (outcome, expected) in cases {
            let recorded = RecordedOutcome::from(&outcome);
            assert_eq!(recorded, expected);
            assert_eq!(recorded.label(), outcome.label());
        }
        assert_eq!(RecordedOutcome::RemoteError.label(), "remoteError");
    }

    #[test]
    fn test_recorded_outcome_serializes_camel_case() {
        let json = serde_json::to_value(RecordedOutcome::RemoteError).unwrap();
        assert_eq!(json, serde_json::json!("remoteError"));
        let json = serde_json::to_value(RecordedOutcome::Rejected(WarningState::QuotaOver)).unwrap();
        assert_eq!(json, serde_json::json!({ "rejected": "quotaOver" }));
    }
}
