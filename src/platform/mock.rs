use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Platform, Profile};
use crate::error::PlatformError;
use crate::model::{Account, ActionKind, InboundMessage, MessageCategory, Target, TargetContext};

/// One call observed by [`MockPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Verify { account: String },
    FetchContext { account: String, target: String },
    Action {
        account: String,
        kind: ActionKind,
        target: String,
        text: Option<String>,
    },
    ListMessages { account: String, category: MessageCategory },
}

type FailureFactory = Box<dyn Fn() -> PlatformError + Send + Sync>;

/// A scripted platform for tests. Succeeds unless told otherwise and
/// records every call in order.
#[derive(Default)]
pub struct MockPlatform {
    calls: Mutex<Vec<Call>>,
    action_failures: HashMap<(String, ActionKind, String), FailureFactory>,
    rejected_accounts: Vec<String>,
    contexts: HashMap<String, TargetContext>,
    messages: HashMap<(String, MessageCategory), Vec<InboundMessage>>,
    failing_listings: Vec<(String, MessageCategory)>,
    latency: Option<Duration>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `kind` fail for `account` on `target`.
    pub fn fail_action<F>(mut self, account: &str, kind: ActionKind, target: &Target, err: F) -> Self
    where
        F: Fn() -> PlatformError + Send + Sync + 'static,
    {
        self.action_failures.insert(
            (account.to_string(), kind, target.canonical_url.clone()),
            Box::new(err),
        );
        self
    }

    /// Make `verify` fail for `account`.
    pub fn reject_account(mut self, account: &str) -> Self {
        self.rejected_accounts.push(account.to_string());
        self
    }

    pub fn with_context(mut self, target: &Target, context: TargetContext) -> Self {
        self.contexts.insert(target.canonical_url.clone(), context);
        self
    }

    pub fn with_messages(mut self, account: &str, messages: Vec<InboundMessage>) -> Self {
        for message in messages {
            self.messages
                .entry((account.to_string(), message.category))
                .or_default()
                .push(message);
        }
        self
    }

    /// Delay every action call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn fail_listing(mut self, account: &str, category: MessageCategory) -> Self {
        self.failing_listings.push((account.to_string(), category));
        self
    }

    /// Everything called so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("mock call log poisoned").clone()
    }

    /// Action calls only, as `(account, kind, target)`.
    pub fn actions(&self) -> Vec<(String, ActionKind, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Action {
                    account,
                    kind,
                    target,
                    ..
                } => Some((account, kind, target)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("mock call log poisoned").push(call);
    }

    async fn act(
        &self,
        account: &Account,
        kind: ActionKind,
        target: &Target,
        text: Option<&str>,
    ) -> Result<(), PlatformError> {
        self.record(Call::Action {
            account: account.remark.clone(),
            kind,
            target: target.canonical_url.clone(),
            text: text.map(str::to_string),
        });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let key = (account.remark.clone(), kind, target.canonical_url.clone());
        match self.action_failures.get(&key) {
            Some(make_err) => Err(make_err()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn verify(&self, account: &Account) -> Result<Profile, PlatformError> {
        self.record(Call::Verify {
            account: account.remark.clone(),
        });
        if self.rejected_accounts.contains(&account.remark) {
            return Err(PlatformError::NotLoggedIn);
        }
        Ok(Profile {
            uid: 1,
            name: account.remark.clone(),
        })
    }

    async fn fetch_context(
        &self,
        account: &Account,
        target: &Target,
    ) -> Result<TargetContext, PlatformError> {
        self.record(Call::FetchContext {
            account: account.remark.clone(),
            target: target.canonical_url.clone(),
        });
        self.contexts
            .get(&target.canonical_url)
            .cloned()
            .ok_or_else(|| PlatformError::MissingData {
                context: "mock".to_string(),
                field: "context".to_string(),
            })
    }

    async fn follow(&self, account: &Account, target: &Target) -> Result<(), PlatformError> {
        self.act(account, ActionKind::Follow, target, None).await
    }

    async fn like(&self, account: &Account, target: &Target) -> Result<(), PlatformError> {
        self.act(account, ActionKind::Like, target, None).await
    }

    async fn comment(
        &self,
        account: &Account,
        target: &Target,
        text: &str,
    ) -> Result<(), PlatformError> {
        self.act(account, ActionKind::Comment, target, Some(text)).await
    }

    async fn repost(
        &self,
        account: &Account,
        target: &Target,
        text: &str,
    ) -> Result<(), PlatformError> {
        self.act(account, ActionKind::Repost, target, Some(text)).await
    }

    async fn list_messages(
        &self,
        account: &Account,
        category: MessageCategory,
    ) -> Result<Vec<InboundMessage>, PlatformError> {
        self.record(Call::ListMessages {
            account: account.remark.clone(),
            category,
        });
        let key = (account.remark.clone(), category);
        if self.failing_listings.contains(&key) {
            return Err(PlatformError::Http {
                status: 503,
                url: format!("mock://{category}"),
            });
        }
        Ok(self.messages.get(&key).cloned().unwrap_or_default())
    }
}
