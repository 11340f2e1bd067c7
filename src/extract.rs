//! Pulls target links out of free-form pasted text.
//!
//! Recognised shapes:
//! - `bilibili.com/opus/<id>`, `bilibili.com/dynamic/<id>`, `t.bilibili.com/<id>` (dynamics)
//! - `bilibili.com/video/BV<10 chars>` or `bilibili.com/video/av<digits>` (videos)
//!
//! Anything else, including truncated links, is ignored.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{CaptureMatches, Regex};

use crate::model::Target;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        https?://
        (?:
            (?:www\.|m\.)?bilibili\.com/(?:opus|dynamic)/(?P<dyn>\d+)
          | t\.bilibili\.com/(?P<tdyn>\d+)
          | (?:www\.|m\.)?bilibili\.com/video/(?:(?P<video>BV[0-9A-Za-z]{10})|(?P<av>av\d+))(?:[^0-9A-Za-z]|$)
        )",
    )
    .expect("valid link regex")
});

/// Iterate the targets in `text`, first-seen order, duplicates collapsed.
///
/// The iterator borrows `text`; calling `extract` again on the same input
/// yields the same sequence.
pub fn extract(text: &str) -> Targets<'_> {
    Targets {
        matches: LINK_RE.captures_iter(text),
        seen: HashSet::new(),
    }
}

/// Parse a single URL (e.g. a history line) into its target, if it is one.
pub fn parse_url(url: &str) -> Option<Target> {
    extract(url).next()
}

pub struct Targets<'t> {
    matches: CaptureMatches<'static, 't>,
    seen: HashSet<String>,
}

impl Iterator for Targets<'_> {
    type Item = Target;

    fn next(&mut self) -> Option<Target> {
        for caps in self.matches.by_ref() {
            let target = if let Some(id) = caps.name("dyn").or_else(|| caps.name("tdyn")) {
                Target::dynamic(id.as_str())
            } else if let Some(id) = caps.name("video").or_else(|| caps.name("av")) {
                Target::video(id.as_str())
            } else {
                continue;
            };

            if self.seen.insert(target.canonical_url.clone()) {
                return Some(target);
            }
            tracing::debug!(target = %target, "duplicate link in input, skipped");
        }
        None
    }
}
