//! Run settings, loaded once from a JSON file and validated before anything runs.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::consts;
use crate::error::ConfigError;
use crate::model::Account;
use crate::pacing::{DelayRange, RateLimiter};
use crate::text::deepseek;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub delays: Delays,
    #[serde(default)]
    pub win_keywords: Vec<String>,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub generation: Generation,
    #[serde(default)]
    pub telegram: Telegram,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_report_timeout_secs")]
    pub report_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Pacing bounds in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Delays {
    pub action_min_secs: f64,
    pub action_max_secs: f64,
    pub target_min_secs: f64,
    pub target_max_secs: f64,
    /// Between accounts during a win-check.
    pub scan_min_secs: f64,
    pub scan_max_secs: f64,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            action_min_secs: 8.0,
            action_max_secs: 15.0,
            target_min_secs: 15.0,
            target_max_secs: 30.0,
            scan_min_secs: 2.0,
            scan_max_secs: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Default input feed.
    pub input: PathBuf,
    pub history: PathBuf,
    pub seen_db: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        let base = consts::default_data_dir();
        Self {
            input: base.join("input.txt"),
            history: base.join("history.txt"),
            seen_db: base.join("seen.db"),
        }
    }
}

/// The comment generator. Empty `api_key` means no generator.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Generation {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub add_name: bool,
}

impl Default for Generation {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: deepseek::DEFAULT_BASE_URL.to_string(),
            model: deepseek::DEFAULT_MODEL.to_string(),
            temperature: 1.3,
            timeout_secs: 30,
            add_name: false,
        }
    }
}

impl Generation {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn deepseek_config(&self) -> deepseek::DeepSeekConfig {
        deepseek::DeepSeekConfig {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            add_name: self.add_name,
            request_timeout: self.timeout(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generation")
            .field("api_key", &(!self.api_key.is_empty()).then_some("[redacted]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("add_name", &self.add_name)
            .finish()
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Telegram {
    #[serde(alias = "enable")]
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
}

impl Telegram {
    /// Enabled and complete.
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

impl fmt::Debug for Telegram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telegram")
            .field("enabled", &self.enabled)
            .field("bot_token", &(!self.bot_token.is_empty()).then_some("[redacted]"))
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_report_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Read, parse, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()
    }

    /// Reject unusable settings and normalise the text pools.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.rate_limiter()?;
        self.scan_pacing()?;

        if self.accounts.is_empty() {
            return Err(ConfigError::NoAccounts);
        }
        if !self.accounts.iter().any(|a| a.enabled) {
            return Err(ConfigError::NoEnabledAccounts);
        }
        // Per-account state is keyed by remark.
        let mut remarks = HashSet::new();
        for (index, account) in self.accounts.iter_mut().enumerate() {
            account.remark = account.remark.trim().to_string();
            if account.remark.is_empty() {
                return Err(ConfigError::EmptyRemark { index: index + 1 });
            }
            if !remarks.insert(account.remark.clone()) {
                return Err(ConfigError::DuplicateRemark {
                    remark: account.remark.clone(),
                });
            }
        }
        for account in &mut self.accounts {
            if account.enabled && account.credential.trim().is_empty() {
                return Err(ConfigError::EmptyCredential {
                    remark: account.remark.clone(),
                });
            }
            dedup_pool(&mut account.fixed_comments);
            dedup_pool(&mut account.fixed_reposts);
            dedup_pool(&mut account.emoticons);
        }
        dedup_pool(&mut self.win_keywords);
        Ok(self)
    }

    pub fn rate_limiter(&self) -> Result<RateLimiter, ConfigError> {
        let d = &self.delays;
        let actions = DelayRange::new("action delay", d.action_min_secs, d.action_max_secs)?;
        let targets = DelayRange::new("target delay", d.target_min_secs, d.target_max_secs)?;
        Ok(RateLimiter::new(actions, targets))
    }

    pub fn scan_pacing(&self) -> Result<DelayRange, ConfigError> {
        DelayRange::new("scan delay", self.delays.scan_min_secs, self.delays.scan_max_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(self.report_timeout_secs)
    }

    pub fn enabled_accounts(&self) -> usize {
        self.accounts.iter().filter(|a| a.enabled).count()
    }
}

/// Trim, drop blanks, and drop repeats, keeping first occurrences in order.
fn dedup_pool(pool: &mut Vec<String>) {
    let mut seen = HashSet::new();
    let cleaned: Vec<String> = pool
        .drain(..)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect();
    *pool = cleaned;
}
