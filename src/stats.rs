//! Run statistics. Consumes action outcomes, produces the final [`RunReport`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{ErrorKind, PlatformError};
use crate::model::{ActionKind, ActionOutcome, ActionStatus};

/// Per-action-kind counters. `attempted == succeeded + failed`; skips are separate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionCounts {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// A failed action, kept for the reporting sink.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub account: String,
    pub kind: ActionKind,
    pub url: String,
    pub error_kind: Option<ErrorKind>,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub counts: BTreeMap<ActionKind, ActionCounts>,
    pub error_tallies: BTreeMap<ErrorKind, u64>,
    pub failures: Vec<FailureRecord>,
    /// Targets found in the input.
    pub targets_found: usize,
    /// Targets skipped because history already had them.
    pub targets_known: usize,
    /// Targets that went through the pipeline.
    pub targets_processed: usize,
    pub history_write_failures: usize,
    /// Accounts left out of the pass because login verification failed.
    pub accounts_excluded: Vec<String>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl RunReport {
    pub fn counts(&self, kind: ActionKind) -> ActionCounts {
        self.counts.get(&kind).copied().unwrap_or_default()
    }

    pub fn total_succeeded(&self) -> u64 {
        self.counts.values().map(|c| c.succeeded).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.counts.values().map(|c| c.failed).sum()
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Accumulates outcomes for one run.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    report: RunReport,
    started: Option<Instant>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &ActionOutcome) {
        let counts = self.report.counts.entry(outcome.kind).or_default();
        match outcome.status {
            ActionStatus::Skipped => {
                counts.skipped += 1;
                return;
            }
            ActionStatus::Success => {
                counts.attempted += 1;
                counts.succeeded += 1;
            }
            ActionStatus::Failure => {
                counts.attempted += 1;
                counts.failed += 1;
                let kind = outcome.error_kind.unwrap_or(ErrorKind::Other);
                *self.report.error_tallies.entry(kind).or_default() += 1;
                self.report.failures.push(FailureRecord {
                    account: outcome.account.clone(),
                    kind: outcome.kind,
                    url: outcome.target.canonical_url.clone(),
                    error_kind: outcome.error_kind,
                    detail: outcome.detail.clone().unwrap_or_default(),
                });
            }
        }
        self.started.get_or_insert_with(Instant::now);
    }

    /// Start the clock just before an action is dispatched. Later calls are no-ops.
    pub fn start(&mut self) {
        self.started.get_or_insert_with(Instant::now);
    }

    pub fn targets_found(&mut self, found: usize, known: usize) {
        self.report.targets_found = found;
        self.report.targets_known = known;
    }

    pub fn target_processed(&mut self) {
        self.report.targets_processed += 1;
    }

    /// An account failed verification. Its error counts toward the tallies.
    pub fn account_excluded(&mut self, account: &str, err: &PlatformError) {
        self.report.accounts_excluded.push(account.to_string());
        *self.report.error_tallies.entry(err.kind()).or_default() += 1;
    }

    pub fn history_write_failed(&mut self) {
        self.report.history_write_failures += 1;
    }

    pub fn finish(mut self) -> RunReport {
        self.report.elapsed = self.started.map(|t| t.elapsed()).unwrap_or_default();
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Target;

    fn outcomes() -> Vec<ActionOutcome> {
        let t = Target::dynamic("1");
        vec![
            ActionOutcome::success(&t, "a", ActionKind::Follow),
            ActionOutcome::failure(&t, "a", ActionKind::Like, &PlatformError::Captcha),
            ActionOutcome::skipped(&t, "a", ActionKind::Comment, "disabled"),
            ActionOutcome::success(&t, "a", ActionKind::Repost),
            ActionOutcome::success(&t, "b", ActionKind::Like),
            ActionOutcome::failure(
                &t,
                "b",
                ActionKind::Like,
                &PlatformError::Api {
                    code: 4128,
                    message: "rejected".to_string(),
                },
            ),
        ]
    }

    #[test]
    fn attempted_is_succeeded_plus_failed() {
        let mut stats = StatsAggregator::new();
        for o in &outcomes() {
            stats.record(o);
        }
        let report = stats.finish();
        for kind in ActionKind::ORDER {
            let c = report.counts(kind);
            assert_eq!(c.attempted, c.succeeded + c.failed, "{kind}");
        }
        assert_eq!(report.counts(ActionKind::Like).attempted, 3);
        assert_eq!(report.counts(ActionKind::Like).failed, 2);
    }

    #[test]
    fn skips_are_not_attempts() {
        let mut stats = StatsAggregator::new();
        for o in &outcomes() {
            stats.record(o);
        }
        let report = stats.finish();
        let comment = report.counts(ActionKind::Comment);
        assert_eq!(comment.attempted, 0);
        assert_eq!(comment.failed, 0);
        assert_eq!(comment.skipped, 1);
    }

    #[test]
    fn failures_are_tallied_by_kind() {
        let mut stats = StatsAggregator::new();
        for o in &outcomes() {
            stats.record(o);
        }
        let report = stats.finish();
        assert_eq!(report.error_tallies.get(&ErrorKind::Captcha), Some(&1));
        assert_eq!(report.error_tallies.get(&ErrorKind::Rejected), Some(&1));
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.total_failed(), 2);
        assert_eq!(report.total_succeeded(), 3);
    }

    #[test]
    fn only_skips_leave_clock_unstarted() {
        let mut stats = StatsAggregator::new();
        stats.record(&ActionOutcome::skipped(
            &Target::dynamic("1"),
            "a",
            ActionKind::Follow,
            "disabled",
        ));
        assert_eq!(stats.finish().elapsed, Duration::ZERO);
    }

    #[test]
    fn excluded_account_is_listed_and_tallied() {
        let mut stats = StatsAggregator::new();
        stats.account_excluded("alt", &PlatformError::NotLoggedIn);
        let report = stats.finish();
        assert_eq!(report.accounts_excluded, vec!["alt"]);
        assert_eq!(report.error_tallies.get(&ErrorKind::Credential), Some(&1));
        assert_eq!(report.total_failed(), 0);
    }

    #[test]
    fn empty_run_still_reports() {
        let report = StatsAggregator::new().finish();
        assert_eq!(report.total_succeeded(), 0);
        assert!(report.failures.is_empty());
    }
}
