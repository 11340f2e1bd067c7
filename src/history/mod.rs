//! Processed-target history and the dedup boundary in front of the pipeline.

pub mod file;

use std::collections::HashSet;

use anyhow::Result;

use crate::model::Target;

pub use file::FileHistory;

/// A persistent set of canonical target URLs. Append-only.
pub trait HistoryStore: Send {
    fn contains(&self, canonical_url: &str) -> bool;
    fn add(&mut self, canonical_url: &str) -> Result<()>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Non-persistent store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    urls: HashSet<String>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }
}

impl HistoryStore for MemoryHistory {
    fn contains(&self, canonical_url: &str) -> bool {
        self.urls.contains(canonical_url)
    }

    fn add(&mut self, canonical_url: &str) -> Result<()> {
        self.urls.insert(canonical_url.to_string());
        Ok(())
    }

    fn len(&self) -> usize {
        self.urls.len()
    }
}

/// Filters extracted targets against history and records completed ones.
pub struct Deduplicator {
    store: Box<dyn HistoryStore>,
}

impl Deduplicator {
    pub fn new(store: Box<dyn HistoryStore>) -> Self {
        Self { store }
    }

    pub fn is_new(&self, target: &Target) -> bool {
        !self.store.contains(&target.canonical_url)
    }

    /// Record a finished target. A second call for the same target is a no-op.
    pub fn mark_processed(&mut self, target: &Target) -> Result<()> {
        if self.store.contains(&target.canonical_url) {
            return Ok(());
        }
        self.store.add(&target.canonical_url)
    }

    /// Keep only targets not yet in history, preserving order.
    pub fn filter_new<I>(&self, targets: I) -> (Vec<Target>, usize)
    where
        I: IntoIterator<Item = Target>,
    {
        let mut fresh = Vec::new();
        let mut known = 0;
        for target in targets {
            if self.is_new(&target) {
                fresh.push(target);
            } else {
                tracing::debug!(target = %target, "already in history, skipped");
                known += 1;
            }
        }
        (fresh, known)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;

    #[test]
    fn known_target_is_filtered() {
        let dedup = Deduplicator::new(Box::new(MemoryHistory::with_urls([
            "https://t.bilibili.com/1",
        ])));
        let (fresh, known) =
            dedup.filter_new(extract("https://t.bilibili.com/1 https://t.bilibili.com/2"));
        assert_eq!(known, 1);
        assert_eq!(fresh, vec![Target::dynamic("2")]);
    }

    #[test]
    fn second_pass_over_same_input_is_empty() {
        let text = "https://www.bilibili.com/opus/7 https://www.bilibili.com/video/av9";
        let mut dedup = Deduplicator::new(Box::new(MemoryHistory::new()));

        let (first, _) = dedup.filter_new(extract(text));
        assert_eq!(first.len(), 2);
        for target in &first {
            dedup.mark_processed(target).unwrap();
        }

        let (second, known) = dedup.filter_new(extract(text));
        assert!(second.is_empty());
        assert_eq!(known, 2);
    }

    #[test]
    fn mark_processed_twice_adds_once() {
        let mut dedup = Deduplicator::new(Box::new(MemoryHistory::new()));
        let target = Target::dynamic("3");
        dedup.mark_processed(&target).unwrap();
        dedup.mark_processed(&target).unwrap();
        assert_eq!(dedup.len(), 1);
    }
}
