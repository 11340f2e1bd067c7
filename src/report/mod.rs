//! Reporting sinks for finished runs and win-checks.

pub mod telegram;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::scan::WinReport;
use crate::stats::RunReport;

pub use telegram::TelegramReporter;

/// Somewhere a finished report is delivered to.
#[async_trait]
pub trait Reporter: Send + Sync {
    fn name(&self) -> &str;

    async fn report_run(&self, report: &RunReport) -> Result<()>;

    async fn report_wins(&self, report: &WinReport) -> Result<()>;
}

/// Writes reports to the tracing log.
pub struct LogReporter;

#[async_trait]
impl Reporter for LogReporter {
    fn name(&self) -> &str {
        "log"
    }

    async fn report_run(&self, report: &RunReport) -> Result<()> {
        tracing::info!(
            targets_found = report.targets_found,
            targets_known = report.targets_known,
            targets_processed = report.targets_processed,
            succeeded = report.total_succeeded(),
            failed = report.total_failed(),
            elapsed_secs = report.elapsed.as_secs(),
            "run finished"
        );
        for (kind, counts) in &report.counts {
            tracing::info!(
                action = %kind,
                attempted = counts.attempted,
                succeeded = counts.succeeded,
                failed = counts.failed,
                skipped = counts.skipped,
                "action totals"
            );
        }
        for (kind, count) in &report.error_tallies {
            tracing::info!(error_kind = %kind, count, "failures by kind");
        }
        if !report.accounts_excluded.is_empty() {
            tracing::warn!(
                accounts = ?report.accounts_excluded,
                "accounts excluded after failed login verification"
            );
        }
        if report.history_write_failures > 0 {
            tracing::error!(
                count = report.history_write_failures,
                "some targets could not be written to history and may be processed again"
            );
        }
        Ok(())
    }

    async fn report_wins(&self, report: &WinReport) -> Result<()> {
        if report.findings.is_empty() {
            tracing::info!(accounts = report.accounts_scanned, "win-check finished, nothing found");
            return Ok(());
        }
        for finding in &report.findings {
            tracing::info!(
                account = %finding.account,
                source = %finding.source,
                indicator = %finding.indicator,
                sender = finding.sender.as_deref().unwrap_or("-"),
                text = %finding.matched_text,
                "win finding"
            );
        }
        tracing::info!(
            accounts = report.accounts_scanned,
            findings = report.findings.len(),
            "win-check finished"
        );
        Ok(())
    }
}

/// Hand `report` to every sink, each bounded by `timeout`.
/// Delivery failures are logged and never returned. Returns whether every
/// sink accepted the report.
pub async fn deliver_run(reporters: &[Arc<dyn Reporter>], report: &RunReport, timeout: Duration) -> bool {
    let mut delivered = true;
    for reporter in reporters {
        let outcome = tokio::time::timeout(timeout, reporter.report_run(report)).await;
        delivered &= log_delivery(reporter.name(), outcome, timeout);
    }
    delivered
}

/// Win-check counterpart of [`deliver_run`].
pub async fn deliver_wins(reporters: &[Arc<dyn Reporter>], report: &WinReport, timeout: Duration) -> bool {
    let mut delivered = true;
    for reporter in reporters {
        let outcome = tokio::time::timeout(timeout, reporter.report_wins(report)).await;
        delivered &= log_delivery(reporter.name(), outcome, timeout);
    }
    delivered
}

fn log_delivery(
    sink: &str,
    outcome: Result<Result<()>, tokio::time::error::Elapsed>,
    timeout: Duration,
) -> bool {
    match outcome {
        Ok(Ok(())) => {
            tracing::debug!(sink, "report delivered");
            true
        }
        Ok(Err(e)) => {
            tracing::warn!(sink, error = %e, "report delivery failed");
            false
        }
        Err(_) => {
            tracing::warn!(sink, timeout_secs = timeout.as_secs(), "report delivery timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::bail;

    use super::*;

    struct Flaky {
        delivered: AtomicUsize,
        fail: bool,
        stall: bool,
    }

    impl Flaky {
        fn new(fail: bool, stall: bool) -> Self {
            Self {
                delivered: AtomicUsize::new(0),
                fail,
                stall,
            }
        }
    }

    #[async_trait]
    impl Reporter for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn report_run(&self, _report: &RunReport) -> Result<()> {
            if self.stall {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.fail {
                bail!("sink down");
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn report_wins(&self, _report: &WinReport) -> Result<()> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_sink_does_not_stop_others() {
        let broken = Arc::new(Flaky::new(true, false));
        let healthy = Arc::new(Flaky::new(false, false));
        let sinks: Vec<Arc<dyn Reporter>> = vec![broken, Arc::clone(&healthy) as Arc<dyn Reporter>];

        let all = deliver_run(&sinks, &RunReport::default(), Duration::from_secs(1)).await;
        assert!(!all);
        assert_eq!(healthy.delivered.load(Ordering::SeqCst), 1);
        assert!(deliver_run(&[healthy as Arc<dyn Reporter>], &RunReport::default(), Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn stalled_sink_is_abandoned() {
        let stalled: Arc<dyn Reporter> = Arc::new(Flaky::new(false, true));
        let start = std::time::Instant::now();
        assert!(!deliver_run(&[stalled], &RunReport::default(), Duration::from_millis(30)).await);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn log_reporter_accepts_empty_reports() {
        LogReporter.report_run(&RunReport::default()).await.unwrap();
        LogReporter.report_wins(&WinReport::default()).await.unwrap();
    }
}
