//! Hub configuration at ~/.config/teamhub/config.toml, overridable by
//! `TEAMHUB_*` environment variables.

use std::path::{Path, PathBuf};

use chrono::Duration;
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CHANNEL, DEFAULT_LAST_MINUTE_THRESHOLD_HOURS, DEFAULT_LISTEN_ADDR,
    DEFAULT_MEMBER_CACHE_TTL_SECS, DEFAULT_RSVP_CHANGE_CHANNEL, DEFAULT_SERVICE_TIMEZONE,
    DEFAULT_STALE_CUSTODY_DAYS,
};
use crate::error::{HubError, HubResult};
use crate::messages::MessageContext;
use crate::rsvp::RsvpChangePolicy;

const DEFAULT_APP_BASE_URL: &str = "https://hub.example.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// IANA zone that "today" and wall-clock reminder windows refer to.
    pub service_timezone: String,
    pub last_minute_threshold_hours: i64,
    pub stale_custody_days: i64,
    pub default_channel: String,
    pub rsvp_change_channel: String,
    pub app_base_url: String,
    pub help_page_url: String,
    /// JSON snapshot backing the store. In-memory only when unset.
    pub data_file: Option<PathBuf>,
    /// Without a token, notifications are only logged.
    pub slack_bot_token: Option<String>,
    pub listen_addr: String,
    pub member_cache_ttl_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            service_timezone: DEFAULT_SERVICE_TIMEZONE.into(),
            last_minute_threshold_hours: DEFAULT_LAST_MINUTE_THRESHOLD_HOURS,
            stale_custody_days: DEFAULT_STALE_CUSTODY_DAYS,
            default_channel: DEFAULT_CHANNEL.into(),
            rsvp_change_channel: DEFAULT_RSVP_CHANGE_CHANNEL.into(),
            app_base_url: DEFAULT_APP_BASE_URL.into(),
            help_page_url: format!("{DEFAULT_APP_BASE_URL}/help"),
            data_file: None,
            slack_bot_token: None,
            listen_addr: DEFAULT_LISTEN_ADDR.into(),
            member_cache_ttl_secs: DEFAULT_MEMBER_CACHE_TTL_SECS,
        }
    }
}

impl HubConfig {
    pub fn config_path() -> HubResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| HubError::Config("Could not determine config directory".into()))?
            .join("teamhub");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location, writing a commented template there
    /// on first run.
    pub fn load() -> HubResult<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            Self::create_default_config(&path)?;
        }
        Self::load_from(&path)
    }

    /// Load from `path` (optional) layered under the environment.
    pub fn load_from(path: &Path) -> HubResult<Self> {
        let config: HubConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("TEAMHUB"))
            .build()
            .map_err(|e| HubError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| HubError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> HubResult<()> {
        self.timezone()?;
        if self.last_minute_threshold_hours < 0 {
            return Err(HubError::Config(
                "last_minute_threshold_hours must not be negative".into(),
            ));
        }
        if self.stale_custody_days < 0 {
            return Err(HubError::Config("stale_custody_days must not be negative".into()));
        }
        Ok(())
    }

    pub fn timezone(&self) -> HubResult<Tz> {
        self.service_timezone.parse().map_err(|_| {
            HubError::Config(format!("Unknown time zone '{}'", self.service_timezone))
        })
    }

    pub fn rsvp_policy(&self) -> RsvpChangePolicy {
        RsvpChangePolicy::new(Duration::hours(self.last_minute_threshold_hours))
    }

    pub fn stale_custody_window(&self) -> Duration {
        Duration::days(self.stale_custody_days)
    }

    pub fn member_cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.member_cache_ttl_secs)
    }

    /// Snapshot file with `~` expanded.
    pub fn data_path(&self) -> Option<PathBuf> {
        self.data_file.as_ref().map(|p| {
            PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).into_owned())
        })
    }

    pub fn message_context(&self) -> HubResult<MessageContext> {
        Ok(MessageContext {
            app_base_url: self.app_base_url.trim_end_matches('/').to_string(),
            help_page_url: self.help_page_url.clone(),
            timezone: self.timezone()?,
        })
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> HubResult<()> {
        let defaults = HubConfig::default();
        let contents = format!(
            "\
# teamhub configuration

# Zone used for \"today\" and for reminder windows:
# service_timezone = \"{}\"

# Answer changes this close to a practice are announced:
# last_minute_threshold_hours = {}

# Custody reports older than this are flagged in the summary:
# stale_custody_days = {}

# Chat channels:
# default_channel = \"{}\"
# rsvp_change_channel = \"{}\"

# Links used in messages:
# app_base_url = \"{}\"
# help_page_url = \"{}\"

# Persist data to a JSON file instead of keeping it in memory:
# data_file = \"~/.local/share/teamhub/data.json\"

# Slack bot token. Messages are only logged when unset:
# slack_bot_token = \"xoxb-...\"

# listen_addr = \"{}\"
# member_cache_ttl_secs = {}
",
            defaults.service_timezone,
            defaults.last_minute_threshold_hours,
            defaults.stale_custody_days,
            defaults.default_channel,
            defaults.rsvp_change_channel,
            defaults.app_base_url,
            defaults.help_page_url,
            defaults.listen_addr,
            defaults.member_cache_ttl_secs,
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HubError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| HubError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_parses_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        HubConfig::create_default_config(&path).unwrap();

        let config = HubConfig::load_from(&path).unwrap();
        assert_eq!(config.service_timezone, "Asia/Tokyo");
        assert_eq!(config.last_minute_threshold_hours, 48);
        assert_eq!(config.rsvp_policy(), RsvpChangePolicy::default());
        assert_eq!(config.default_channel, "random");
        assert!(config.slack_bot_token.is_none());
    }

    #[test]
    fn test_file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "service_timezone = \"UTC\"\nlast_minute_threshold_hours = 67\ndata_file = \"~/hub.json\"\napp_base_url = \"https://x.test/\"\n",
        )
        .unwrap();

        let config = HubConfig::load_from(&path).unwrap();
        assert_eq!(config.timezone().unwrap(), chrono_tz::UTC);
        assert_eq!(config.rsvp_policy().threshold, Duration::hours(67));
        assert!(!config.data_path().unwrap().starts_with("~"));
        assert_eq!(config.message_context().unwrap().app_base_url, "https://x.test");
        assert_eq!(config.stale_custody_days, 7);
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "service_timezone = \"Mars/Olympus\"\n").unwrap();

        let err = HubConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, HubError::Config(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HubConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:4096");
    }
}
