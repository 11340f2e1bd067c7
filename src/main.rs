use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use raffle::banner::{BannerInfo, print_banner, print_run_summary, print_win_summary};
use raffle::config::Settings;
use raffle::consts::default_config_path;
use raffle::engine::Engine;
use raffle::history::FileHistory;
use raffle::platform::bilibili::BilibiliClient;
use raffle::report::{LogReporter, Reporter, TelegramReporter};
use raffle::scan::SeenMessages;
use raffle::text::TextGenerator;
use raffle::text::deepseek::DeepSeekGenerator;

#[derive(Parser)]
#[command(name = "raffle", version, about = "Enter Bilibili giveaways across accounts, then check for wins.")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Act on every new giveaway link found in the input
    Run {
        /// Text containing links; `-` reads stdin. Defaults to `paths.input`.
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Scan inboxes for prize notifications
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let settings = Settings::load(&config_path)?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(?settings, "settings loaded");

    let platform = Arc::new(BilibiliClient::new(settings.request_timeout())?);
    let history = FileHistory::open(&settings.paths.history)
        .with_context(|| format!("failed to open history {}", settings.paths.history.display()))?;
    let seen = SeenMessages::open(&settings.paths.seen_db).with_context(|| {
        format!("failed to open seen-message store {}", settings.paths.seen_db.display())
    })?;

    let mut reporters: Vec<Arc<dyn Reporter>> = vec![Arc::new(LogReporter)];
    if settings.telegram.is_usable() {
        reporters.push(Arc::new(TelegramReporter::new(
            &settings.telegram.bot_token,
            &settings.telegram.chat_id,
        )?));
    } else if settings.telegram.enabled {
        tracing::warn!("telegram enabled but bot_token or chat_id missing, not sending");
    }
    let reporter_label = reporters
        .iter()
        .map(|r| r.name().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let mut builder = Engine::builder(settings.accounts.clone(), platform)
        .history(Box::new(history))
        .limiter(settings.rate_limiter()?)
        .scan_pacing(settings.scan_pacing()?)
        .seen(Arc::new(seen))
        .win_keywords(settings.win_keywords.clone())
        .report_timeout(settings.report_timeout());
    let generator_label = if settings.generation.is_configured() {
        let generator: Arc<dyn TextGenerator> =
            Arc::new(DeepSeekGenerator::new(settings.generation.deepseek_config())?);
        builder = builder.generator(generator, settings.generation.timeout());
        settings.generation.model.as_str()
    } else {
        "fixed pools only"
    };
    for reporter in &reporters {
        builder = builder.reporter(Arc::clone(reporter));
    }
    let mut engine = builder.build();

    let mode = match &cli.command {
        Command::Run { .. } => "run",
        Command::Check => "check",
    };
    print_banner(&BannerInfo {
        mode,
        accounts: settings.enabled_accounts(),
        generator: generator_label,
        reporters: &reporter_label,
        config: &config_path,
        history: &settings.paths.history,
    });

    match cli.command {
        Command::Run { input } => {
            let input_path = input.unwrap_or_else(|| settings.paths.input.clone());
            let text = read_input(&input_path)?;

            // Ctrl+C abandons the pass between suspension points.
            tokio::select! {
                result = engine.run_lottery_pass(&text) => print_run_summary(&result?),
                _ = tokio::signal::ctrl_c() => {
                    println!("\n\ninterrupted");
                    tracing::warn!("run interrupted, in-flight target will be retried next time");
                }
            }
        }
        Command::Check => {
            tokio::select! {
                result = engine.run_win_check() => print_win_summary(&result?),
                _ = tokio::signal::ctrl_c() => println!("\n\ninterrupted"),
            }
        }
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read input from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read input {}", path.display()))
}
