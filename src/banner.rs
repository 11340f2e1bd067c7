//! Startup banner and end-of-run summaries.

use std::path::Path;

use crate::consts::{AUTHOR, VERSION, format_elapsed, format_number};
use crate::model::ActionKind;
use crate::scan::WinReport;
use crate::stats::RunReport;

/// What the run is about to do, for the startup banner.
pub struct BannerInfo<'a> {
    pub mode: &'a str,
    pub accounts: usize,
    pub generator: &'a str,
    pub reporters: &'a str,
    pub config: &'a Path,
    pub history: &'a Path,
}

pub fn print_banner(info: &BannerInfo) {
    println!(
        r#"
   ╔═══════════════════════════════════════╗
   ║             R A F F L E               ║
   ║   follow, like, comment, repost, win  ║
   ╚═══════════════════════════════════════╝

   version   {}
   by        {}
   mode      {}
   accounts  {}
   text      {}
   report    {}
   config    {}
   history   {}
"#,
        VERSION,
        AUTHOR,
        info.mode,
        info.accounts,
        info.generator,
        info.reporters,
        info.config.display(),
        info.history.display(),
    );
}

/// Per-action totals and failure count after a lottery pass.
pub fn print_run_summary(report: &RunReport) {
    println!(
        "\ntargets: {} found, {} already done, {} processed",
        format_number(report.targets_found as u64),
        format_number(report.targets_known as u64),
        format_number(report.targets_processed as u64),
    );
    for kind in ActionKind::ORDER {
        let c = report.counts(kind);
        println!(
            "{:>8}: {:>5} ok {:>5} failed {:>5} skipped",
            kind.to_string(),
            format_number(c.succeeded),
            format_number(c.failed),
            format_number(c.skipped),
        );
    }
    if !report.accounts_excluded.is_empty() {
        println!(
            "warning: login failed for {}",
            report.accounts_excluded.join(", ")
        );
    }
    if report.history_write_failures > 0 {
        println!(
            "warning: {} target(s) could not be saved to history",
            report.history_write_failures
        );
    }
    println!("elapsed: {}", format_elapsed(report.elapsed.as_secs()));
}

pub fn print_win_summary(report: &WinReport) {
    if report.findings.is_empty() {
        println!("\nno new prize notifications across {} account(s).", report.accounts_scanned);
        return;
    }
    println!("\n{} possible win(s):", report.findings.len());
    for finding in &report.findings {
        println!(
            "  [{}] {} from {}: {}",
            finding.account,
            finding.source,
            finding.sender.as_deref().unwrap_or("unknown"),
            finding.matched_text,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn print_banner_does_not_panic() {
        print_banner(&BannerInfo {
            mode: "run",
            accounts: 2,
            generator: "fixed pools only",
            reporters: "log",
            config: &PathBuf::from("/tmp/config.json"),
            history: &PathBuf::from("/tmp/history.txt"),
        });
    }

    #[test]
    fn summaries_handle_empty_reports() {
        print_run_summary(&RunReport::default());
        print_win_summary(&WinReport::default());
    }
}
