use std::{path::PathBuf, time::Duration};
use thiserror::Error;

const DEFAULT_STATE_FILE: &str = "posted_links.json";
const DEFAULT_SESSION_FILE: &str = "my_telegram_user_session.session";
const DEFAULT_BOT_API_URL: &str = "https://api.telegram.org";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Credentials and tunables for one relay run.
///
/// Built once at startup and handed to each component by reference.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub telegram: TelegramConfig,
    /// One or two affiliate tags. Posts rotate through them in order.
    pub affiliate_tags: Vec<String>,
    pub state_file: PathBuf,
    pub scan: ScanSettings,
    pub http: HttpSettings,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_id: i32,
    pub api_hash: String,
    pub bot_token: String,
    pub chat_id: String,
    pub session_file: PathBuf,
    pub bot_api_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    pub window: chrono::Duration,
    pub messages_per_dialog: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            window: chrono::Duration::hours(24),
            messages_per_dialog: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub resolve_timeout: Duration,
    pub fetch_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            resolve_timeout: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(20),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let required = [
            "TELEGRAM_API_ID",
            "TELEGRAM_API_HASH",
            "TELEGRAM_BOT_TOKEN",
            "TELEGRAM_CHAT_ID",
            "AMAZON_TRACKING_ID",
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let raw_api_id = get("TELEGRAM_API_ID").unwrap_or_default();
        let api_id = raw_api_id
            .parse::<i32>()
            .map_err(|err| ConfigError::Invalid {
                var: "TELEGRAM_API_ID",
                reason: err.to_string(),
            })?;

        let mut affiliate_tags = vec![get("AMAZON_TRACKING_ID").unwrap_or_default()];
        if let Some(second) = get("AMAZON_TRACKING_ID_2") {
            affiliate_tags.push(second);
        }

        let defaults = HttpSettings::default();
        let scan_defaults = ScanSettings::default();

        Ok(Self {
            telegram: TelegramConfig {
                api_id,
                api_hash: get("TELEGRAM_API_HASH").unwrap_or_default(),
                bot_token: get("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
                chat_id: get("TELEGRAM_CHAT_ID").unwrap_or_default(),
                session_file: get("TELEGRAM_SESSION_FILE")
                    .unwrap_or_else(|| DEFAULT_SESSION_FILE.to_string())
                    .into(),
                bot_api_url: get("TELEGRAM_BOT_API_URL")
                    .unwrap_or_else(|| DEFAULT_BOT_API_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
            },
            affiliate_tags,
            state_file: get("RELAY_STATE_FILE")
                .unwrap_or_else(|| DEFAULT_STATE_FILE.to_string())
                .into(),
            scan: ScanSettings {
                window: parse_positive(get("RELAY_SCAN_WINDOW_HOURS"))
                    .and_then(|hours| i64::try_from(hours).ok())
                    .and_then(chrono::Duration::try_hours)
                    .unwrap_or(scan_defaults.window),
                messages_per_dialog: parse_positive(get("RELAY_MESSAGES_PER_DIALOG"))
                    .map(|value| value as usize)
                    .unwrap_or(scan_defaults.messages_per_dialog),
            },
            http: HttpSettings {
                resolve_timeout: parse_positive(get("RELAY_RESOLVE_TIMEOUT_SECS"))
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.resolve_timeout),
                fetch_timeout: parse_positive(get("RELAY_FETCH_TIMEOUT_SECS"))
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.fetch_timeout),
                user_agent: get("RELAY_USER_AGENT").unwrap_or(defaults.user_agent),
            },
            dry_run: get("RELAY_DRY_RUN").is_some_and(|value| parse_bool(&value)),
        })
    }
}

fn parse_positive(value: Option<String>) -> Option<u64> {
    value
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("TELEGRAM_API_ID", "12345"),
            ("TELEGRAM_API_HASH", "hash"),
            ("TELEGRAM_BOT_TOKEN", "bot:token"),
            ("TELEGRAM_CHAT_ID", "@deals"),
            ("AMAZON_TRACKING_ID", "first-21"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<RelayConfig, ConfigError> {
        RelayConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn single_tag_with_defaults() {
        let cfg = load(&base_env()).expect("config");
        assert_eq!(cfg.telegram.api_id, 12345);
        assert_eq!(cfg.affiliate_tags, vec!["first-21".to_string()]);
        assert_eq!(cfg.state_file, PathBuf::from("posted_links.json"));
        assert_eq!(cfg.scan, ScanSettings::default());
        assert_eq!(cfg.http.resolve_timeout, Duration::from_secs(10));
        assert_eq!(cfg.http.fetch_timeout, Duration::from_secs(20));
        assert!(!cfg.dry_run);
    }

    #[test]
    fn second_tag_enables_rotation() {
        let mut env = base_env();
        env.insert("AMAZON_TRACKING_ID_2", "second-21");
        let cfg = load(&env).expect("config");
        assert_eq!(cfg.affiliate_tags, vec!["first-21", "second-21"]);
    }

    #[test]
    fn reports_every_missing_variable() {
        let mut env = base_env();
        env.remove("TELEGRAM_BOT_TOKEN");
        env.insert("AMAZON_TRACKING_ID", "   ");
        let err = load(&env).expect_err("should fail");
        assert_eq!(
            err,
            ConfigError::Missing(vec!["TELEGRAM_BOT_TOKEN", "AMAZON_TRACKING_ID"])
        );
    }

    #[test]
    fn rejects_non_numeric_api_id() {
        let mut env = base_env();
        env.insert("TELEGRAM_API_ID", "abc");
        let err = load(&env).expect_err("should fail");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "TELEGRAM_API_ID",
                ..
            }
        ));
    }

    #[test]
    fn tunables_fall_back_on_garbage() {
        let mut env = base_env();
        env.insert("RELAY_SCAN_WINDOW_HOURS", "6");
        env.insert("RELAY_MESSAGES_PER_DIALOG", "zero");
        env.insert("RELAY_FETCH_TIMEOUT_SECS", "0");
        env.insert("RELAY_DRY_RUN", "yes");
        env.insert("TELEGRAM_BOT_API_URL", "http://localhost:8081/");
        let cfg = load(&env).expect("config");
        assert_eq!(cfg.scan.window, chrono::Duration::hours(6));
        assert_eq!(cfg.scan.messages_per_dialog, 200);
        assert_eq!(cfg.http.fetch_timeout, Duration::from_secs(20));
        assert!(cfg.dry_run);
        assert_eq!(cfg.telegram.bot_api_url, "http://localhost:8081");
    }

    #[test]
    fn oversized_window_falls_back_to_default() {
        let mut env = base_env();
        env.insert("RELAY_SCAN_WINDOW_HOURS", "99999999999999999");
        let cfg = load(&env).expect("config");
        assert_eq!(cfg.scan.window, ScanSettings::default().window);

        env.insert("RELAY_SCAN_WINDOW_HOURS", "18446744073709551615");
        let cfg = load(&env).expect("config");
        assert_eq!(cfg.scan.window, ScanSettings::default().window);
    }
}
