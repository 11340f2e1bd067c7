//! The two entry operations: a lottery pass over an input feed, and a win-check.

pub mod pipeline;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::StreamExt;

use crate::extract::extract;
use crate::history::{Deduplicator, HistoryStore, MemoryHistory};
use crate::model::{Account, WinFinding};
use crate::pacing::{DelayRange, RateLimiter};
use crate::platform::Platform;
use crate::report::{self, Reporter};
use crate::scan::{SeenMessages, WinMatcher, WinReport, WinScanner};
use crate::stats::{RunReport, StatsAggregator};
use crate::text::{TextGenerator, TextSelector};

pub use pipeline::ActionPipeline;

pub struct Engine {
    accounts: Vec<Account>,
    platform: Arc<dyn Platform>,
    history: Deduplicator,
    pipeline: ActionPipeline,
    scanner: WinScanner,
    reporters: Vec<Arc<dyn Reporter>>,
    report_timeout: Duration,
}

impl Engine {
    pub fn builder(accounts: Vec<Account>, platform: Arc<dyn Platform>) -> EngineBuilder {
        EngineBuilder {
            accounts,
            platform,
            history: None,
            generator: None,
            generation_timeout: Duration::from_secs(30),
            limiter: None,
            scan_pacing: DelayRange::zero(),
            seen: None,
            win_keywords: None,
            reporters: Vec::new(),
            report_timeout: Duration::from_secs(30),
        }
    }

    /// Extract targets from `input`, act on the new ones, and report.
    ///
    /// Individual action failures never fail the pass. Accounts that fail
    /// login verification are listed in the report; when none is left the
    /// new targets stay out of history so the next run picks them up.
    pub async fn run_lottery_pass(&mut self, input: &str) -> Result<RunReport> {
        let mut stats = StatsAggregator::new();

        let extracted: Vec<_> = extract(input).collect();
        let found = extracted.len();
        let (fresh, known) = self.history.filter_new(extracted);
        stats.targets_found(found, known);
        tracing::info!(found, known, new = fresh.len(), "targets extracted");

        if !fresh.is_empty() {
            let accounts = self.usable_accounts(&mut stats).await;
            if accounts.is_empty() {
                tracing::error!(
                    targets = fresh.len(),
                    "no enabled account passed login verification, targets left for next run"
                );
            } else {
                tracing::info!(
                    targets = fresh.len(),
                    accounts = accounts.len(),
                    "starting lottery pass"
                );
                self.pipeline
                    .run(&fresh, &accounts, &mut self.history, &mut stats)
                    .await;
            }
        }

        let report = stats.finish();
        report::deliver_run(&self.reporters, &report, self.report_timeout).await;
        Ok(report)
    }

    /// Scan every enabled account's inbox for prize notifications and report.
    ///
    /// Findings are recorded as seen only once every reporter accepted them.
    pub async fn run_win_check(&self) -> Result<WinReport> {
        let started = Instant::now();
        let findings: Vec<WinFinding> = self.scanner.scan(&self.accounts).collect().await;
        let report = WinReport {
            findings,
            accounts_scanned: self.accounts.iter().filter(|a| a.enabled).count(),
            elapsed: started.elapsed(),
        };
        if report::deliver_wins(&self.reporters, &report, self.report_timeout).await {
            self.scanner.mark_reported(&report.findings);
        } else if !report.findings.is_empty() {
            tracing::warn!(
                findings = report.findings.len(),
                "win report not fully delivered, findings will be reported again next check"
            );
        }
        Ok(report)
    }

    /// Enabled accounts whose credential the platform accepts, in order.
    async fn usable_accounts(&self, stats: &mut StatsAggregator) -> Vec<Account> {
        let mut usable = Vec::new();
        for account in self.accounts.iter().filter(|a| a.enabled) {
            match self.platform.verify(account).await {
                Ok(profile) => {
                    tracing::debug!(account = %account.remark, uid = profile.uid, "account ready");
                    usable.push(account.clone());
                }
                Err(e) => {
                    tracing::error!(account = %account.remark, error = %e, "account excluded from run");
                    stats.account_excluded(&account.remark, &e);
                }
            }
        }
        usable
    }
}

pub struct EngineBuilder {
    accounts: Vec<Account>,
    platform: Arc<dyn Platform>,
    history: Option<Box<dyn HistoryStore>>,
    generator: Option<Arc<dyn TextGenerator>>,
    generation_timeout: Duration,
    limiter: Option<RateLimiter>,
    scan_pacing: DelayRange,
    seen: Option<Arc<SeenMessages>>,
    win_keywords: Option<Vec<String>>,
    reporters: Vec<Arc<dyn Reporter>>,
    report_timeout: Duration,
}

impl EngineBuilder {
    /// Defaults to an in-memory history.
    pub fn history(mut self, store: Box<dyn HistoryStore>) -> Self {
        self.history = Some(store);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        self.generator = Some(generator);
        self.generation_timeout = timeout;
        self
    }

    /// Defaults to no pacing.
    pub fn limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn scan_pacing(mut self, pacing: DelayRange) -> Self {
        self.scan_pacing = pacing;
        self
    }

    pub fn seen(mut self, seen: Arc<SeenMessages>) -> Self {
        self.seen = Some(seen);
        self
    }

    /// Defaults to [`crate::scan::DEFAULT_WIN_KEYWORDS`].
    pub fn win_keywords(mut self, keywords: Vec<String>) -> Self {
        self.win_keywords = Some(keywords);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn report_timeout(mut self, timeout: Duration) -> Self {
        self.report_timeout = timeout;
        self
    }

    pub fn build(self) -> Engine {
        let history = self
            .history
            .unwrap_or_else(|| Box::new(MemoryHistory::new()));
        let selector = TextSelector::new(self.generator, self.generation_timeout);
        let limiter = self.limiter.unwrap_or_else(RateLimiter::disabled);
        let pipeline = ActionPipeline::new(Arc::clone(&self.platform), selector, limiter);

        let matcher = match self.win_keywords {
            Some(keywords) if !keywords.is_empty() => WinMatcher::new(keywords),
            _ => WinMatcher::default(),
        };
        let mut scanner =
            WinScanner::new(Arc::clone(&self.platform), matcher).with_pacing(self.scan_pacing);
        if let Some(seen) = self.seen {
            scanner = scanner.with_seen(seen);
        }

        Engine {
            accounts: self.accounts,
            platform: self.platform,
            history: Deduplicator::new(history),
            pipeline,
            scanner,
            reporters: self.reporters,
            report_timeout: self.report_timeout,
        }
    }
}
