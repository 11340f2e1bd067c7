//! Comment and repost text selection.
//!
//! Text comes from an ordered chain of [`TextProvider`]s; the first one that
//! yields non-empty text wins. When nothing does, the action is skipped.
//! A random emoticon from the account's pool is appended to the winner.

pub mod deepseek;
pub mod mock;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rand::seq::IndexedRandom;

use crate::model::{Account, Target, TargetContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPurpose {
    Comment,
    Repost,
}

impl fmt::Display for TextPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextPurpose::Comment => f.write_str("comment"),
            TextPurpose::Repost => f.write_str("repost"),
        }
    }
}

/// Everything a provider may consult.
pub struct TextRequest<'a> {
    pub account: &'a Account,
    pub target: &'a Target,
    pub context: &'a TargetContext,
    pub purpose: TextPurpose,
    /// Text this account just commented on this target, without emoticon.
    pub prior_comment: Option<&'a str>,
}

/// The external text generator (an LLM).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Write a comment for the target. An empty string means "declined".
    async fn generate_comment(&self, context: &TargetContext, commenter: &str) -> Result<String>;
}

/// One link in the provider chain.
#[async_trait]
pub trait TextProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn provide(&self, request: &TextRequest<'_>) -> Option<String>;
}

/// Final text for an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedText {
    /// What gets posted, emoticon included.
    pub text: String,
    /// Provider output before the emoticon.
    pub base: String,
    pub source: String,
}

/// Asks the generator, when the account opted into generated text for this purpose.
pub struct Generated {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl Generated {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }
}

#[async_trait]
impl TextProvider for Generated {
    fn name(&self) -> &str {
        "generated"
    }

    async fn provide(&self, request: &TextRequest<'_>) -> Option<String> {
        let wanted = match request.purpose {
            TextPurpose::Comment => request.account.ai_comment,
            TextPurpose::Repost => request.account.ai_repost,
        };
        if !wanted {
            return None;
        }

        let call = self
            .generator
            .generate_comment(request.context, &request.account.remark);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(Ok(_)) => {
                tracing::warn!(
                    account = %request.account.remark,
                    target = %request.target,
                    purpose = %request.purpose,
                    "generator returned no text, falling back"
                );
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    account = %request.account.remark,
                    target = %request.target,
                    error = %e,
                    "text generation failed, falling back"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    account = %request.account.remark,
                    target = %request.target,
                    timeout_secs = self.timeout.as_secs(),
                    "text generation timed out, falling back"
                );
                None
            }
        }
    }
}

/// Repost with the same words the account just commented.
pub struct PriorComment;

#[async_trait]
impl TextProvider for PriorComment {
    fn name(&self) -> &str {
        "prior_comment"
    }

    async fn provide(&self, request: &TextRequest<'_>) -> Option<String> {
        if request.purpose != TextPurpose::Repost || !request.account.repost_reuses_comment {
            return None;
        }
        request.prior_comment.map(str::to_string)
    }
}

/// A uniform pick from the account's fixed pool for this purpose.
pub struct FixedPool;

#[async_trait]
impl TextProvider for FixedPool {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn provide(&self, request: &TextRequest<'_>) -> Option<String> {
        let account = request.account;
        let (enabled, pool) = match request.purpose {
            TextPurpose::Comment => (account.use_fixed_comment, &account.fixed_comments),
            TextPurpose::Repost => (account.use_fixed_repost, &account.fixed_reposts),
        };
        if !enabled {
            return None;
        }
        pick(pool)
    }
}

fn pick(pool: &[String]) -> Option<String> {
    pool.choose(&mut rand::rng()).cloned()
}

/// Resolves comment and repost text through per-purpose provider chains.
pub struct TextSelector {
    comment_chain: Vec<Box<dyn TextProvider>>,
    repost_chain: Vec<Box<dyn TextProvider>>,
}

impl TextSelector {
    /// Generated → fixed for comments; generated → prior comment → fixed for reposts.
    /// Without a generator the generated link is left out.
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, timeout: Duration) -> Self {
        let mut comment_chain: Vec<Box<dyn TextProvider>> = Vec::new();
        let mut repost_chain: Vec<Box<dyn TextProvider>> = Vec::new();

        if let Some(generator) = generator {
            comment_chain.push(Box::new(Generated::new(Arc::clone(&generator), timeout)));
            repost_chain.push(Box::new(Generated::new(generator, timeout)));
        }
        comment_chain.push(Box::new(FixedPool));
        repost_chain.push(Box::new(PriorComment));
        repost_chain.push(Box::new(FixedPool));

        Self::with_chains(comment_chain, repost_chain)
    }

    pub fn with_chains(
        comment_chain: Vec<Box<dyn TextProvider>>,
        repost_chain: Vec<Box<dyn TextProvider>>,
    ) -> Self {
        Self {
            comment_chain,
            repost_chain,
        }
    }

    /// Walk the chain for `request.purpose`. `None` means skip the action.
    pub async fn select(&self, request: &TextRequest<'_>) -> Option<SelectedText> {
        let chain = match request.purpose {
            TextPurpose::Comment => &self.comment_chain,
            TextPurpose::Repost => &self.repost_chain,
        };

        for provider in chain {
            let Some(base) = provider.provide(request).await else {
                continue;
            };
            if base.trim().is_empty() {
                continue;
            }
            tracing::debug!(
                account = %request.account.remark,
                purpose = %request.purpose,
                source = provider.name(),
                "text selected"
            );
            let text = match pick(&request.account.emoticons) {
                Some(emoticon) => format!("{base}{emoticon}"),
                None => base.clone(),
            };
            return Some(SelectedText {
                text,
                base,
                source: provider.name().to_string(),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockGenerator;
    use super::*;

    fn account() -> Account {
        Account {
            remark: "main".to_string(),
            credential: "c".to_string(),
            fixed_comments: vec!["好耶".to_string()],
            fixed_reposts: vec!["冲".to_string()],
            ..Account::default()
        }
    }

    fn request<'a>(
        account: &'a Account,
        target: &'a Target,
        context: &'a TargetContext,
        purpose: TextPurpose,
    ) -> TextRequest<'a> {
        TextRequest {
            account,
            target,
            context,
            purpose,
            prior_comment: None,
        }
    }

    fn selector(generator: MockGenerator) -> TextSelector {
        TextSelector::new(Some(Arc::new(generator)), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn generated_text_wins_when_enabled() {
        let account = Account {
            ai_comment: true,
            use_fixed_comment: true,
            ..account()
        };
        let target = Target::dynamic("1");
        let ctx = TargetContext::default();
        let picked = selector(MockGenerator::text("写得真好"))
            .select(&request(&account, &target, &ctx, TextPurpose::Comment))
            .await
            .unwrap();
        assert_eq!(picked.text, "写得真好");
        assert_eq!(picked.source, "generated");
    }

    #[tokio::test]
    async fn empty_generation_falls_back_to_fixed() {
        let account = Account {
            ai_comment: true,
            use_fixed_comment: true,
            ..account()
        };
        let target = Target::dynamic("1");
        let ctx = TargetContext::default();
        let picked = selector(MockGenerator::empty())
            .select(&request(&account, &target, &ctx, TextPurpose::Comment))
            .await
            .unwrap();
        assert_eq!(picked.text, "好耶");
        assert_eq!(picked.source, "fixed");
    }

    #[tokio::test]
    async fn empty_generation_without_fixed_yields_nothing() {
        let account = Account {
            ai_comment: true,
            use_fixed_comment: false,
            ..account()
        };
        let target = Target::dynamic("1");
        let ctx = TargetContext::default();
        let picked = selector(MockGenerator::empty())
            .select(&request(&account, &target, &ctx, TextPurpose::Comment))
            .await;
        assert!(picked.is_none());
    }

    #[tokio::test]
    async fn failing_generator_falls_back() {
        let account = Account {
            ai_comment: true,
            use_fixed_comment: true,
            ..account()
        };
        let target = Target::dynamic("1");
        let ctx = TargetContext::default();
        let picked = selector(MockGenerator::failing())
            .select(&request(&account, &target, &ctx, TextPurpose::Comment))
            .await
            .unwrap();
        assert_eq!(picked.source, "fixed");
    }

    #[tokio::test]
    async fn generator_not_consulted_without_flag() {
        let generator = Arc::new(MockGenerator::text("AI"));
        let selector = TextSelector::new(
            Some(Arc::clone(&generator) as Arc<dyn TextGenerator>),
            Duration::from_secs(5),
        );
        let account = Account {
            use_fixed_comment: true,
            ..account()
        };
        let target = Target::dynamic("1");
        let ctx = TargetContext::default();
        let picked = selector
            .select(&request(&account, &target, &ctx, TextPurpose::Comment))
            .await
            .unwrap();
        assert_eq!(picked.text, "好耶");
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn emoticon_is_appended() {
        let account = Account {
            use_fixed_comment: true,
            emoticons: vec!["[doge]".to_string()],
            ..account()
        };
        let target = Target::dynamic("1");
        let ctx = TargetContext::default();
        let picked = TextSelector::new(None, Duration::from_secs(1))
            .select(&request(&account, &target, &ctx, TextPurpose::Comment))
            .await
            .unwrap();
        assert_eq!(picked.text, "好耶[doge]");
        assert_eq!(picked.base, "好耶");
    }

    #[tokio::test]
    async fn repost_uses_its_own_pool_and_flag() {
        let account = Account {
            use_fixed_comment: true,
            use_fixed_repost: false,
            ..account()
        };
        let target = Target::dynamic("1");
        let ctx = TargetContext::default();
        let selector = TextSelector::new(None, Duration::from_secs(1));
        assert!(
            selector
                .select(&request(&account, &target, &ctx, TextPurpose::Repost))
                .await
                .is_none()
        );

        let account = Account {
            use_fixed_repost: true,
            ..account
        };
        let picked = selector
            .select(&request(&account, &target, &ctx, TextPurpose::Repost))
            .await
            .unwrap();
        assert_eq!(picked.text, "冲");
    }

    #[tokio::test]
    async fn repost_can_reuse_prior_comment() {
        let account = Account {
            use_fixed_repost: true,
            repost_reuses_comment: true,
            ..account()
        };
        let target = Target::dynamic("1");
        let ctx = TargetContext::default();
        let req = TextRequest {
            prior_comment: Some("评论过的话"),
            ..request(&account, &target, &ctx, TextPurpose::Repost)
        };
        let picked = TextSelector::new(None, Duration::from_secs(1))
            .select(&req)
            .await
            .unwrap();
        assert_eq!(picked.text, "评论过的话");
        assert_eq!(picked.source, "prior_comment");
    }

    #[tokio::test]
    async fn slow_generator_times_out_to_fallback() {
        let account = Account {
            ai_comment: true,
            use_fixed_comment: true,
            ..account()
        };
        let target = Target::dynamic("1");
        let ctx = TargetContext::default();
        let selector = TextSelector::new(
            Some(Arc::new(MockGenerator::text("late").with_delay(Duration::from_millis(200)))),
            Duration::from_millis(20),
        );
        let picked = selector
            .select(&request(&account, &target, &ctx, TextPurpose::Comment))
            .await
            .unwrap();
        assert_eq!(picked.source, "fixed");
    }
}
