use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::TextGenerator;
use crate::model::TargetContext;

enum Reply {
    Text(String),
    Fail,
}

/// A canned generator for tests. Returns the same reply every call.
pub struct MockGenerator {
    reply: Reply,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn text(text: &str) -> Self {
        Self::with_reply(Reply::Text(text.to_string()))
    }

    /// Declines every request.
    pub fn empty() -> Self {
        Self::with_reply(Reply::Text(String::new()))
    }

    pub fn failing() -> Self {
        Self::with_reply(Reply::Fail)
    }

    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate_comment(&self, _context: &TargetContext, _commenter: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail => bail!("MockGenerator: scripted failure"),
        }
    }
}
