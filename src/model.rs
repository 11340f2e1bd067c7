//! Core records passed between the extractor, pipeline, aggregator and scanner.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, PlatformError};

/// Shape of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Dynamic,
    Video,
}

/// One content item to act upon. Identity is the canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    /// Platform id: numeric dynamic id, or `BV…` / `av…` for videos.
    pub id: String,
    pub kind: TargetKind,
    pub canonical_url: String,
}

impl Target {
    pub fn dynamic(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            canonical_url: format!("https://t.bilibili.com/{id}"),
            id,
            kind: TargetKind::Dynamic,
        }
    }

    pub fn video(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            canonical_url: format!("https://www.bilibili.com/video/{id}"),
            id,
            kind: TargetKind::Video,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_url)
    }
}

/// What the text generator sees about a target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetContext {
    pub text: String,
    pub author: Option<String>,
}

/// A managed account. Read-only for the duration of a run.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Account {
    pub remark: String,
    /// Session cookie string.
    #[serde(alias = "cookie")]
    pub credential: String,
    pub enabled: bool,
    pub follow_enabled: bool,
    pub like_enabled: bool,
    pub comment_enabled: bool,
    pub repost_enabled: bool,
    pub ai_comment: bool,
    pub ai_repost: bool,
    pub use_fixed_comment: bool,
    pub use_fixed_repost: bool,
    pub repost_reuses_comment: bool,
    pub fixed_comments: Vec<String>,
    pub fixed_reposts: Vec<String>,
    pub emoticons: Vec<String>,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            remark: String::new(),
            credential: String::new(),
            enabled: true,
            follow_enabled: false,
            like_enabled: false,
            comment_enabled: false,
            repost_enabled: false,
            ai_comment: false,
            ai_repost: false,
            use_fixed_comment: false,
            use_fixed_repost: false,
            repost_reuses_comment: false,
            fixed_comments: Vec::new(),
            fixed_reposts: Vec::new(),
            emoticons: Vec::new(),
        }
    }
}

impl Account {
    pub fn is_enabled(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Follow => self.follow_enabled,
            ActionKind::Like => self.like_enabled,
            ActionKind::Comment => self.comment_enabled,
            ActionKind::Repost => self.repost_enabled,
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("remark", &self.remark)
            .field("credential", &"[redacted]")
            .field("enabled", &self.enabled)
            .field("follow_enabled", &self.follow_enabled)
            .field("like_enabled", &self.like_enabled)
            .field("comment_enabled", &self.comment_enabled)
            .field("repost_enabled", &self.repost_enabled)
            .field("ai_comment", &self.ai_comment)
            .field("ai_repost", &self.ai_repost)
            .field("use_fixed_comment", &self.use_fixed_comment)
            .field("use_fixed_repost", &self.use_fixed_repost)
            .field("repost_reuses_comment", &self.repost_reuses_comment)
            .field("fixed_comments", &self.fixed_comments.len())
            .field("fixed_reposts", &self.fixed_reposts.len())
            .field("emoticons", &self.emoticons.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Follow,
    Like,
    Comment,
    Repost,
}

impl ActionKind {
    /// Fixed per-account execution order.
    pub const ORDER: [ActionKind; 4] = [
        ActionKind::Follow,
        ActionKind::Like,
        ActionKind::Comment,
        ActionKind::Repost,
    ];
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::Follow => "follow",
            ActionKind::Like => "like",
            ActionKind::Comment => "comment",
            ActionKind::Repost => "repost",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Failure,
    Skipped,
}

/// Result of one (target, account, action) step. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub target: Target,
    pub account: String,
    pub kind: ActionKind,
    pub status: ActionStatus,
    pub error_kind: Option<ErrorKind>,
    pub detail: Option<String>,
}

impl ActionOutcome {
    pub fn success(target: &Target, account: &str, kind: ActionKind) -> Self {
        Self {
            target: target.clone(),
            account: account.to_string(),
            kind,
            status: ActionStatus::Success,
            error_kind: None,
            detail: None,
        }
    }

    pub fn failure(target: &Target, account: &str, kind: ActionKind, err: &PlatformError) -> Self {
        Self {
            target: target.clone(),
            account: account.to_string(),
            kind,
            status: ActionStatus::Failure,
            error_kind: Some(err.kind()),
            detail: Some(err.to_string()),
        }
    }

    pub fn skipped(target: &Target, account: &str, kind: ActionKind, reason: &str) -> Self {
        Self {
            target: target.clone(),
            account: account.to_string(),
            kind,
            status: ActionStatus::Skipped,
            error_kind: None,
            detail: Some(reason.to_string()),
        }
    }
}

/// Inbound message categories enumerated by the win-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    Direct,
    Mention,
    Reply,
}

impl MessageCategory {
    pub const ALL: [MessageCategory; 3] = [
        MessageCategory::Direct,
        MessageCategory::Mention,
        MessageCategory::Reply,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageCategory::Direct => "direct",
            MessageCategory::Mention => "mention",
            MessageCategory::Reply => "reply",
        }
    }
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Platform message id, unique within its category.
    pub id: String,
    pub category: MessageCategory,
    pub text: String,
    pub sender: Option<String>,
    pub url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A message that looks like a prize notification.
#[derive(Debug, Clone, Serialize)]
pub struct WinFinding {
    pub account: String,
    pub source: MessageCategory,
    /// Id of the underlying message within `source`.
    pub message_id: String,
    pub matched_text: String,
    /// The indicator phrase that matched first.
    pub indicator: String,
    pub sender: Option<String>,
    pub url: Option<String>,
    pub timestamp: DateTime<Utc>,
}
