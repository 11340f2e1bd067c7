//! Win-check: read each account's inbox and flag prize notifications.
//!
//! Read-only with respect to the platform. Findings are produced lazily, one
//! account at a time, as a [`Stream`].

pub mod seen;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;

use crate::model::{Account, InboundMessage, MessageCategory, WinFinding};
use crate::pacing::DelayRange;
use crate::platform::Platform;

pub use seen::SeenMessages;

/// Phrases that mark a message as a prize notification.
pub const DEFAULT_WIN_KEYWORDS: &[&str] = &[
    "中奖",
    "获奖",
    "恭喜",
    "抽中",
    "幸运儿",
    "开奖",
    "奖品",
    "领取",
    "收货地址",
    "私信我",
];

/// Case-insensitive substring matcher over a list of indicator phrases.
#[derive(Debug, Clone)]
pub struct WinMatcher {
    indicators: Vec<(String, String)>,
}

impl WinMatcher {
    /// Blank phrases are ignored.
    pub fn new<I, S>(indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let indicators = indicators
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|s| (s.to_lowercase(), s))
            .collect();
        Self { indicators }
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    /// The first configured indicator found in `text`.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.indicators
            .iter()
            .find(|(needle, _)| haystack.contains(needle.as_str()))
            .map(|(_, original)| original.as_str())
    }
}

impl Default for WinMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_WIN_KEYWORDS)
    }
}

/// Output of one win-check.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WinReport {
    pub findings: Vec<WinFinding>,
    pub accounts_scanned: usize,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

pub struct WinScanner {
    platform: Arc<dyn Platform>,
    matcher: WinMatcher,
    seen: Option<Arc<SeenMessages>>,
    pacing: DelayRange,
}

impl WinScanner {
    pub fn new(platform: Arc<dyn Platform>, matcher: WinMatcher) -> Self {
        Self {
            platform,
            matcher,
            seen: None,
            pacing: DelayRange::zero(),
        }
    }

    /// Skip messages reported by earlier scans.
    pub fn with_seen(mut self, seen: Arc<SeenMessages>) -> Self {
        self.seen = Some(seen);
        self
    }

    /// Pause between accounts.
    pub fn with_pacing(mut self, pacing: DelayRange) -> Self {
        self.pacing = pacing;
        self
    }

    /// Findings for every enabled account, in configuration order.
    pub fn scan<'a>(&'a self, accounts: &'a [Account]) -> impl Stream<Item = WinFinding> + 'a {
        stream::iter(accounts.iter().filter(|a| a.enabled).enumerate())
            .then(move |(index, account)| async move {
                if index > 0 {
                    self.pacing.wait("scan").await;
                }
                self.scan_account(account).await
            })
            .flat_map(stream::iter)
    }

    /// One account's findings. Failures are logged and yield nothing.
    pub async fn scan_account(&self, account: &Account) -> Vec<WinFinding> {
        if let Err(e) = self.platform.verify(account).await {
            tracing::warn!(account = %account.remark, error = %e, "login check failed, skipping win-check");
            return Vec::new();
        }

        let mut findings = Vec::new();
        for category in MessageCategory::ALL {
            let messages = match self.platform.list_messages(account, category).await {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::warn!(
                        account = %account.remark,
                        category = %category,
                        error = %e,
                        "could not list messages"
                    );
                    continue;
                }
            };
            tracing::debug!(account = %account.remark, category = %category, count = messages.len(), "messages listed");

            for message in messages {
                if self.already_reported(&account.remark, &message) {
                    continue;
                }
                if let Some(finding) = self.inspect(&account.remark, message) {
                    tracing::info!(
                        account = %finding.account,
                        source = %finding.source,
                        indicator = %finding.indicator,
                        "possible win"
                    );
                    findings.push(finding);
                }
            }
        }
        findings
    }

    fn already_reported(&self, account: &str, message: &InboundMessage) -> bool {
        let Some(seen) = &self.seen else {
            return false;
        };
        match seen.contains(account, message.category, &message.id) {
            Ok(reported) => reported,
            Err(e) => {
                tracing::warn!(account, error = %e, "seen-message store unavailable");
                false
            }
        }
    }

    /// Record delivered findings so later scans pass over them.
    pub fn mark_reported(&self, findings: &[WinFinding]) {
        let Some(seen) = &self.seen else {
            return;
        };
        for finding in findings {
            if let Err(e) = seen.mark(&finding.account, finding.source, &finding.message_id) {
                tracing::warn!(
                    account = %finding.account,
                    message_id = %finding.message_id,
                    error = %e,
                    "could not record reported message, it may be reported again"
                );
            }
        }
    }

    fn inspect(&self, account: &str, message: InboundMessage) -> Option<WinFinding> {
        let indicator = self.matcher.first_match(&message.text)?.to_string();
        Some(WinFinding {
            account: account.to_string(),
            source: message.category,
            message_id: message.id,
            matched_text: message.text,
            indicator,
            sender: message.sender,
            url: message.url,
            timestamp: message.timestamp,
        })
    }
}
