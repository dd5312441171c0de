use clap::Parser;
use lib_feedpulse::{SessionSettings, StreamSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "feed_watch.conf";

#[derive(Parser, Deserialize, Serialize, Clone, Default)]
#[clap(about = "Headless feed reader client: session validation and live feed updates", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "FEEDPULSE_BASE_URL", help = "Absolute base URL of the reader server.")]
    pub base_url: Option<String>,

    #[clap(long, env = "FEEDPULSE_TOKEN", help = "Bearer token used for the session API and the push channel.")]
    pub token: Option<String>,

    #[clap(long, env = "FEEDPULSE_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "FEEDPULSE_USER_FILE", help = "File holding the cached user record.")]
    pub user_file: Option<PathBuf>,

    #[clap(long, env = "FEEDPULSE_START_PATH", help = "Application path to open on start, e.g. /feed/all.")]
    pub start_path: Option<String>,

    #[clap(long, env = "FEEDPULSE_LOCALE", help = "Locale the client is running under.")]
    pub locale: Option<String>,

    #[clap(long, env = "FEEDPULSE_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "FEEDPULSE_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "FEEDPULSE_USER_TTL_DAYS", help = "Days after which a cached user is discarded unvalidated.")]
    pub user_ttl_days: Option<u32>,

    #[clap(long, env = "FEEDPULSE_LOGOUT_DEBOUNCE_MS", help = "Window in milliseconds in which repeated logouts collapse.")]
    pub logout_debounce_ms: Option<u64>,

    #[clap(long, env = "FEEDPULSE_REQUEST_TIMEOUT_SECS", help = "Timeout in seconds for session API requests.")]
    pub request_timeout_secs: Option<u64>,

    #[clap(long, env = "FEEDPULSE_CHANNEL_CAPACITY", help = "Per-connection event buffer; slower consumers lose events.")]
    pub channel_capacity: Option<usize>,

    #[clap(long, env = "FEEDPULSE_STORAGE_POLL_SECS", help = "Interval in seconds for detecting user file changes by other processes.")]
    pub storage_poll_secs: Option<u64>,
}

// Hand-written so the token never reaches a log line.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("config_path", &self.config_path)
            .field("user_file", &self.user_file)
            .field("start_path", &self.start_path)
            .field("locale", &self.locale)
            .field("log_dir", &self.log_dir)
            .field("log_level", &self.log_level)
            .field("user_ttl_days", &self.user_ttl_days)
            .field("logout_debounce_ms", &self.logout_debounce_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("channel_capacity", &self.channel_capacity)
            .field("storage_poll_secs", &self.storage_poll_secs)
            .finish()
    }
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            base_url: other.base_url.or(self.base_url),
            token: other.token.or(self.token),
            config_path: other.config_path.or(self.config_path),
            user_file: other.user_file.or(self.user_file),
            start_path: other.start_path.or(self.start_path),
            locale: other.locale.or(self.locale),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            user_ttl_days: other.user_ttl_days.or(self.user_ttl_days),
            logout_debounce_ms: other.logout_debounce_ms.or(self.logout_debounce_ms),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
            channel_capacity: other.channel_capacity.or(self.channel_capacity),
            storage_poll_secs: other.storage_poll_secs.or(self.storage_poll_secs),
        }
    }

    fn defaults() -> Config {
        let stream = StreamSettings::default();
        let session = SessionSettings::default();
        Config {
            base_url: Some(stream.base_url),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            user_ttl_days: Some(session.user_ttl_days),
            logout_debounce_ms: Some(session.logout_debounce_ms),
            request_timeout_secs: Some(stream.request_timeout_secs),
            channel_capacity: Some(stream.channel_capacity),
            storage_poll_secs: Some(5),
            user_file: dirs::data_dir().map(|dir| dir.join("feedpulse").join("user.json")),
            ..Default::default()
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> String {
        self.log_level.clone().unwrap_or_else(|| "info".to_string())
    }

    pub fn user_file(&self) -> PathBuf {
        self.user_file.clone().unwrap_or_else(|| PathBuf::from("./user.json"))
    }

    pub fn start_path(&self) -> String {
        self.start_path.clone().unwrap_or_default()
    }

    pub fn storage_poll(&self) -> Duration {
        Duration::from_secs(self.storage_poll_secs.unwrap_or(5).max(1))
    }

    pub fn session_settings(&self) -> SessionSettings {
        let defaults = SessionSettings::default();
        SessionSettings {
            user_ttl_days: self.user_ttl_days.unwrap_or(defaults.user_ttl_days),
            logout_debounce_ms: self.logout_debounce_ms.unwrap_or(defaults.logout_debounce_ms),
            ui_locale: self.locale.clone(),
            routes: defaults.routes,
        }
    }

    pub fn stream_settings(&self) -> StreamSettings {
        let defaults = StreamSettings::default();
        StreamSettings {
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            events_path: defaults.events_path,
            channel_capacity: self.channel_capacity.unwrap_or(defaults.channel_capacity),
            request_timeout_secs: self.request_timeout_secs.unwrap_or(defaults.request_timeout_secs),
        }
    }
}

/// Defaults, then the JSON file, then env vars and CLI flags.
pub fn load_config() -> Config {
    resolve(Config::parse())
}

fn resolve(cli: Config) -> Config {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();
    if let Some(file_config) = read_config_file(&config_file_path) {
        current_config = current_config.merge(file_config);
    }
    current_config.merge(cli)
}

fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        log::info!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display());
        return None;
    }
    let config_str = match fs::read_to_string(path) {
        Ok(config_str) => config_str,
        Err(e) => {
            log::warn!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str::<Config>(&config_str) {
        Ok(file_config) => Some(file_config),
        Err(e) => {
            log::warn!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed_watch.conf");
        fs::write(
            &path,
            r#"{"baseUrl": "https://file.example/", "userTtlDays": 3, "logLevel": "debug"}"#,
        )
        .unwrap();

        let cli = Config::try_parse_from([
            "feed_watch",
            "--config-path",
            path.to_str().unwrap(),
            "--log-level",
            "trace",
        ])
        .unwrap();
        let config = resolve(cli);

        assert_eq!(config.base_url.as_deref(), Some("https://file.example/"));
        assert_eq!(config.log_level(), "trace");
        assert_eq!(config.session_settings().user_ttl_days, 3);
        assert_eq!(config.stream_settings().channel_capacity, 256);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.conf");
        fs::write(&path, "{ nope").unwrap();

        let cli = Config {
            config_path: Some(path),
            ..Default::default()
        };
        let config = resolve(cli);
        assert_eq!(config.session_settings().user_ttl_days, 15);
        assert_eq!(config.storage_poll(), Duration::from_secs(5));
    }

    #[test]
    fn debug_output_hides_token() {
        let config = Config {
            token: Some("secret".into()),
            ..Default::default()
        };
        assert!(!format!("{config:?}").contains("secret"));
    }
}
