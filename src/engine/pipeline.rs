//! The per-target, per-account action sequence.
//!
//! For each new target, every account walks follow → like → comment → repost.
//! Disabled kinds are recorded as skipped; failures are recorded and the walk
//! continues. A pacing delay follows every step. When all accounts are done the
//! target goes into history, whatever the individual outcomes were.

use std::sync::Arc;

use crate::error::PlatformError;
use crate::history::Deduplicator;
use crate::model::{Account, ActionKind, ActionOutcome, ActionStatus, Target, TargetContext};
use crate::pacing::RateLimiter;
use crate::platform::Platform;
use crate::stats::StatsAggregator;
use crate::text::{TextPurpose, TextRequest, TextSelector};

pub struct ActionPipeline {
    platform: Arc<dyn Platform>,
    selector: TextSelector,
    limiter: RateLimiter,
}

impl ActionPipeline {
    pub fn new(platform: Arc<dyn Platform>, selector: TextSelector, limiter: RateLimiter) -> Self {
        Self {
            platform,
            selector,
            limiter,
        }
    }

    /// Process `targets` in order with `accounts` in order.
    ///
    /// Targets already in history are passed over without any platform call.
    pub async fn run(
        &self,
        targets: &[Target],
        accounts: &[Account],
        history: &mut Deduplicator,
        stats: &mut StatsAggregator,
    ) {
        let total = targets.len();
        let mut first = true;

        for (index, target) in targets.iter().enumerate() {
            if !history.is_new(target) {
                tracing::debug!(target = %target, "already processed, skipped");
                continue;
            }
            if !first {
                self.limiter.delay_between_targets().await;
            }
            first = false;

            tracing::info!(target = %target, "[target {}/{}] processing", index + 1, total);
            self.process_target(target, accounts, stats).await;

            if let Err(e) = history.mark_processed(target) {
                tracing::error!(target = %target, error = %e, "failed to record target in history");
                stats.history_write_failed();
            }
            stats.target_processed();
        }
    }

    async fn process_target(
        &self,
        target: &Target,
        accounts: &[Account],
        stats: &mut StatsAggregator,
    ) {
        let enabled: Vec<&Account> = accounts.iter().filter(|a| a.enabled).collect();
        let context = self.context_for(target, &enabled).await;

        for (index, account) in enabled.iter().enumerate() {
            tracing::info!(
                account = %account.remark,
                "[account {}/{}] running actions",
                index + 1,
                enabled.len()
            );
            let mut prior_comment: Option<String> = None;
            for kind in ActionKind::ORDER {
                if account.is_enabled(kind) {
                    stats.start();
                }
                let outcome = self
                    .step(kind, target, &context, account, &mut prior_comment)
                    .await;
                log_outcome(&outcome);
                stats.record(&outcome);
                self.limiter.delay_between_actions().await;
            }
        }
    }

    /// Fetch the target's text once, only if some account will generate text.
    async fn context_for(&self, target: &Target, accounts: &[&Account]) -> TargetContext {
        let needs_context = accounts.iter().any(|a| {
            (a.comment_enabled && a.ai_comment) || (a.repost_enabled && a.ai_repost)
        });
        let Some(reader) = accounts.first() else {
            return TargetContext::default();
        };
        if !needs_context {
            return TargetContext::default();
        }

        match self.platform.fetch_context(reader, target).await {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(target = %target, error = %e, "could not fetch target content");
                TargetContext::default()
            }
        }
    }

    async fn step(
        &self,
        kind: ActionKind,
        target: &Target,
        context: &TargetContext,
        account: &Account,
        prior_comment: &mut Option<String>,
    ) -> ActionOutcome {
        let remark = account.remark.as_str();
        if !account.is_enabled(kind) {
            return ActionOutcome::skipped(target, remark, kind, "disabled for account");
        }

        let result = match kind {
            ActionKind::Follow => self.platform.follow(account, target).await,
            ActionKind::Like => self.platform.like(account, target).await,
            ActionKind::Comment | ActionKind::Repost => {
                let purpose = if kind == ActionKind::Comment {
                    TextPurpose::Comment
                } else {
                    TextPurpose::Repost
                };
                let request = TextRequest {
                    account,
                    target,
                    context,
                    purpose,
                    prior_comment: prior_comment.as_deref(),
                };
                let Some(selected) = self.selector.select(&request).await else {
                    return ActionOutcome::skipped(target, remark, kind, "no text available");
                };

                let result = if kind == ActionKind::Comment {
                    self.platform.comment(account, target, &selected.text).await
                } else {
                    self.platform.repost(account, target, &selected.text).await
                };
                if result.is_ok() && kind == ActionKind::Comment {
                    *prior_comment = Some(selected.base);
                }
                result
            }
        };

        outcome_of(result, target, remark, kind)
    }
}

fn outcome_of(
    result: Result<(), PlatformError>,
    target: &Target,
    account: &str,
    kind: ActionKind,
) -> ActionOutcome {
    match result {
        Ok(()) => ActionOutcome::success(target, account, kind),
        Err(e) => ActionOutcome::failure(target, account, kind, &e),
    }
}

fn log_outcome(outcome: &ActionOutcome) {
    match outcome.status {
        ActionStatus::Success => tracing::info!(
            account = %outcome.account,
            target = %outcome.target,
            action = %outcome.kind,
            "ok"
        ),
        ActionStatus::Failure => tracing::warn!(
            account = %outcome.account,
            target = %outcome.target,
            action = %outcome.kind,
            error = outcome.detail.as_deref().unwrap_or(""),
            "failed"
        ),
        ActionStatus::Skipped => tracing::debug!(
            account = %outcome.account,
            target = %outcome.target,
            action = %outcome.kind,
            reason = outcome.detail.as_deref().unwrap_or(""),
            "skipped"
        ),
    }
}
