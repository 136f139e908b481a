use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub api_url: String,
    pub user_id: String,
    pub token_command: String,
    pub include_spam_trash: bool,
}

#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub batch_size: usize,
    pub rate_limit: u32,
    pub max_emails: usize,
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct Config {
    pub gmail: GmailConfig,
    pub cleanup: CleanupConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    gmail: Option<RawGmailConfig>,
    #[serde(default)]
    cleanup: RawCleanupConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGmailConfig {
    #[serde(default = "default_api_url")]
    api_url: String,
    #[serde(default = "default_user_id")]
    user_id: String,
    token_command: Option<String>,
    #[serde(default)]
    include_spam_trash: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCleanupConfig {
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default = "default_rate_limit")]
    rate_limit: u32,
    #[serde(default = "default_max_emails")]
    max_emails: usize,
    #[serde(default = "default_dry_run")]
    dry_run: bool,
}

impl Default for RawCleanupConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            rate_limit: default_rate_limit(),
            max_emails: default_max_emails(),
            dry_run: default_dry_run(),
        }
    }
}

fn default_api_url() -> String {
    "https://gmail.googleapis.com/gmail/v1".to_string()
}

fn default_user_id() -> String {
    "me".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_rate_limit() -> u32 {
    10
}

fn default_max_emails() -> usize {
    500
}

fn default_dry_run() -> bool {
    true
}

pub fn default_config_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("mailsweep").join("config.toml")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home)
            .join(".config")
            .join("mailsweep")
            .join("config.toml")
    } else {
        PathBuf::from("config.toml")
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let gmail = raw
            .gmail
            .ok_or_else(|| ConfigError::Parse("missing [gmail] section".to_string()))?;
        let token_command = gmail
            .token_command
            .filter(|cmd| !cmd.trim().is_empty())
            .ok_or_else(|| ConfigError::Parse("missing token_command in [gmail]".to_string()))?;

        if raw.cleanup.batch_size == 0 {
            return Err(ConfigError::Parse(
                "batch_size must be greater than 0 in [cleanup]".to_string(),
            ));
        }
        if raw.cleanup.rate_limit == 0 {
            return Err(ConfigError::Parse(
                "rate_limit must be greater than 0 in [cleanup]".to_string(),
            ));
        }
        if raw.cleanup.max_emails == 0 {
            return Err(ConfigError::Parse(
                "max_emails must be greater than 0 in [cleanup]".to_string(),
            ));
        }

        Ok(Config {
            gmail: GmailConfig {
                api_url: gmail.api_url.trim_end_matches('/').to_string(),
                user_id: gmail.user_id,
                token_command,
                include_spam_trash: gmail.include_spam_trash,
            },
            cleanup: CleanupConfig {
                batch_size: raw.cleanup.batch_size,
                rate_limit: raw.cleanup.rate_limit,
                max_emails: raw.cleanup.max_emails,
                dry_run: raw.cleanup.dry_run,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gmail_config(extra: &str) -> String {
        format!(
            r#"
{extra}
[gmail]
token_command = "gcloud auth print-access-token"
"#
        )
    }

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = Config::parse(&gmail_config("")).unwrap();
        assert_eq!(config.gmail.api_url, "https://gmail.googleapis.com/gmail/v1");
        assert_eq!(config.gmail.user_id, "me");
        assert_eq!(config.gmail.token_command, "gcloud auth print-access-token");
        assert!(!config.gmail.include_spam_trash);
        assert_eq!(config.cleanup.batch_size, 100);
        assert_eq!(config.cleanup.rate_limit, 10);
        assert_eq!(config.cleanup.max_emails, 500);
        assert!(config.cleanup.dry_run);
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
[gmail]
api_url = "http://127.0.0.1:8080/gmail/v1/"
user_id = "someone@example.com"
token_command = "cat ~/.token"
include_spam_trash = true

[cleanup]
batch_size = 25
rate_limit = 5
max_emails = 2000
dry_run = false
"#,
        )
        .unwrap();

        assert_eq!(config.gmail.api_url, "http://127.0.0.1:8080/gmail/v1");
        assert_eq!(config.gmail.user_id, "someone@example.com");
        assert!(config.gmail.include_spam_trash);
        assert_eq!(config.cleanup.batch_size, 25);
        assert_eq!(config.cleanup.rate_limit, 5);
        assert_eq!(config.cleanup.max_emails, 2000);
        assert!(!config.cleanup.dry_run);
    }

    #[test]
    fn test_missing_gmail_section() {
        let err = Config::parse("[cleanup]\nbatch_size = 10\n").unwrap_err();
        match err {
            ConfigError::Parse(msg) => assert!(msg.contains("[gmail]"), "got: {}", msg),
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn test_missing_token_command() {
        let err = Config::parse("[gmail]\nuser_id = \"me\"\n").unwrap_err();
        match err {
            ConfigError::Parse(msg) => assert!(msg.contains("token_command"), "got: {}", msg),
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn test_unknown_key_errors() {
        let err = Config::parse(&gmail_config("[cleanup]\nbogus = 1")).unwrap_err();
        match err {
            ConfigError::Parse(msg) => assert!(msg.contains("unknown field"), "got: {}", msg),
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn test_zero_values_rejected() {
        for extra in [
            "[cleanup]\nbatch_size = 0",
            "[cleanup]\nrate_limit = 0",
            "[cleanup]\nmax_emails = 0",
        ] {
            let err = Config::parse(&gmail_config(extra)).unwrap_err();
            match err {
                ConfigError::Parse(msg) => {
                    assert!(msg.contains("greater than 0"), "got: {}", msg)
                }
                _ => panic!("expected parse error"),
            }
        }
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
