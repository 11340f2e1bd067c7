use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Reporter;
use crate::model::ActionKind;
use crate::scan::WinReport;
use crate::stats::RunReport;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const MAX_LISTED: usize = 10;

/// Sends HTML summaries through a Telegram bot.
pub struct TelegramReporter {
    api_base: String,
    bot_token: String,
    chat_id: String,
    http: reqwest::Client,
}

impl TelegramReporter {
    pub fn new(bot_token: &str, chat_id: &str) -> Result<Self> {
        Self::with_api_base(DEFAULT_API_BASE, bot_token, chat_id)
    }

    pub fn with_api_base(api_base: &str, bot_token: &str, chat_id: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            http,
        })
    }

    async fn send(&self, text: String) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: &text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        let reply: ApiReply = resp.json().await.unwrap_or_default();
        if !status.is_success() || !reply.ok {
            bail!(
                "Telegram API error ({}): {}",
                status,
                reply.description.unwrap_or_default()
            );
        }
        tracing::info!(
            message_id = reply.result.map(|r| r.message_id).unwrap_or_default(),
            "telegram report sent"
        );
        Ok(())
    }
}

#[async_trait]
impl Reporter for TelegramReporter {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn report_run(&self, report: &RunReport) -> Result<()> {
        self.send(render_run(report)).await
    }

    async fn report_wins(&self, report: &WinReport) -> Result<()> {
        if report.findings.is_empty() {
            return Ok(());
        }
        self.send(render_wins(report)).await
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&#39;")
        .replace('"', "&quot;")
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn render_run(report: &RunReport) -> String {
    let secs = report.elapsed.as_secs();
    let mut out = String::from("<b>Raffle run report</b>\n\n");
    for kind in [
        ActionKind::Like,
        ActionKind::Repost,
        ActionKind::Follow,
        ActionKind::Comment,
    ] {
        let _ = writeln!(out, "• {kind}: {} ok", report.counts(kind).succeeded);
    }
    let _ = writeln!(out, "• failures: {}", report.total_failed());
    let _ = writeln!(
        out,
        "• targets: {} new of {} found",
        report.targets_processed, report.targets_found
    );
    if !report.accounts_excluded.is_empty() {
        let _ = writeln!(
            out,
            "• login failed: {}",
            escape(&report.accounts_excluded.join(", "))
        );
    }
    let _ = writeln!(out, "• elapsed: {}m{}s\n", secs / 60, secs % 60);

    if report.failures.is_empty() {
        out.push_str("All actions completed.");
        return out;
    }

    out.push_str("<b>Failures:</b>\n");
    for (i, failure) in report.failures.iter().take(MAX_LISTED).enumerate() {
        let _ = write!(
            out,
            "{}. [{}] {}\n   <a href=\"{}\">{}</a>\n   {}\n",
            i + 1,
            failure.kind,
            escape(&failure.account),
            escape(&failure.url),
            escape(&truncate(&failure.url, 80)),
            escape(&truncate(&failure.detail, 150)),
        );
    }
    if report.failures.len() > MAX_LISTED {
        let _ = writeln!(
            out,
            "… and {} more, see the log.",
            report.failures.len() - MAX_LISTED
        );
    }
    out
}

pub fn render_wins(report: &WinReport) -> String {
    let mut out = format!(
        "<b>Possible wins: {}</b> ({} accounts checked)\n\n",
        report.findings.len(),
        report.accounts_scanned
    );
    for finding in &report.findings {
        let _ = writeln!(
            out,
            "• [{}] {} from {}: {}",
            escape(&finding.account),
            finding.source,
            escape(finding.sender.as_deref().unwrap_or("unknown")),
            escape(&truncate(&finding.matched_text, 150)),
        );
        if let Some(url) = &finding.url {
            let _ = writeln!(out, "  <a href=\"{}\">open</a>", escape(url));
        }
    }
    out
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ApiReply {
    #[serde(default)]
    ok: bool,
    description: Option<String>,
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}
