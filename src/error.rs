//! Error taxonomy shared by the platform client and the configuration loader.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// A single platform call went wrong. Recorded as a failed action, never fatal.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Http { status: u16, url: String },

    #[error("platform rejected request (code {code}): {message}")]
    Api { code: i64, message: String },

    #[error("account is not logged in (credential invalid or expired)")]
    NotLoggedIn,

    #[error("platform demanded a captcha")]
    Captcha,

    #[error("author {author} is blacklisted by this account")]
    Blocked { author: u64 },

    #[error("could not decode response from {context}: {reason}")]
    Decode { context: String, reason: String },

    #[error("response from {context} is missing {field}")]
    MissingData { context: String, field: String },

    #[error("{0}")]
    Other(String),
}

impl PlatformError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlatformError::Network(_) => ErrorKind::Network,
            PlatformError::Http { .. } => ErrorKind::Http,
            PlatformError::Api { .. } => ErrorKind::Rejected,
            PlatformError::NotLoggedIn => ErrorKind::Credential,
            PlatformError::Captcha => ErrorKind::Captcha,
            PlatformError::Blocked { .. } => ErrorKind::Blocked,
            PlatformError::Decode { .. } | PlatformError::MissingData { .. } => {
                ErrorKind::Protocol
            }
            PlatformError::Other(_) => ErrorKind::Other,
        }
    }
}

/// Coarse failure category, tallied per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Http,
    Rejected,
    Credential,
    Captcha,
    Blocked,
    Protocol,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Network => "network",
            ErrorKind::Http => "http",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Credential => "credential",
            ErrorKind::Captcha => "captcha",
            ErrorKind::Blocked => "blocked",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// Startup configuration is unusable. The run does not begin.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid delay bounds for {name}: min={min}, max={max}")]
    InvalidDelay { name: &'static str, min: f64, max: f64 },

    #[error("account registry is empty")]
    NoAccounts,

    #[error("every account is disabled")]
    NoEnabledAccounts,

    #[error("account [{remark}] is enabled but has no credential")]
    EmptyCredential { remark: String },

    #[error("account #{index} has no remark")]
    EmptyRemark { index: usize },

    #[error("remark [{remark}] is used by more than one account")]
    DuplicateRemark { remark: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_is_rejected_kind() {
        let err = PlatformError::Api {
            code: -400,
            message: "bad request".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert!(err.to_string().contains("-400"));
    }

    #[test]
    fn decode_and_missing_data_are_protocol_errors() {
        let decode = PlatformError::Decode {
            context: "nav".to_string(),
            reason: "eof".to_string(),
        };
        let missing = PlatformError::MissingData {
            context: "detail".to_string(),
            field: "aid".to_string(),
        };
        assert_eq!(decode.kind(), ErrorKind::Protocol);
        assert_eq!(missing.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn error_kind_display_is_snake_case() {
        assert_eq!(ErrorKind::Credential.to_string(), "credential");
        assert_eq!(
            serde_json::to_string(&ErrorKind::Captcha).unwrap(),
            "\"captcha\""
        );
    }
}
