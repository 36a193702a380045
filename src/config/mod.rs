//! Typed configuration.
//!
//! Settings come from an optional TOML file whose tables are the setting
//! sections (`[RedisServer]`, `[QueueInfo]`, ...), overlaid by environment
//! variables. Every recognized option has a default; a missing or empty
//! value falls back to it. The Redis password is held as a
//! `secrecy::SecretString` so it never shows up in logs.

use crate::error::{Error, Result};
use crate::priority::{PriorityLevels, TierTemplate};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_QUEUE_HASH_MAP: &str = "AutoCITIQueue";
pub const DEFAULT_JOB_TRACKER_HASH_MAP: &str = "AutoCITIJobTracker";
pub const DEFAULT_PRIORITY_LEVELS: &str = "High;Low";
pub const DEFAULT_QUEUE_NAME_TEMPLATE: &str = "%s_%s";

/// Environment variable -> (section, key) overrides.
const ENV_OVERRIDES: &[(&str, &str, &str)] = &[
    ("QIT_REDIS_HOST", "RedisServer", "Host"),
    ("QIT_REDIS_PORT", "RedisServer", "Port"),
    ("QIT_REDIS_DB", "RedisServer", "DB"),
    ("QIT_REDIS_PASSWORD", "RedisServer", "Password"),
    ("QIT_PRIORITY_LEVELS", "QueueInfo", "PriorityLevels"),
    ("QIT_QUEUE_NAME_TEMPLATE", "QueueInfo", "QueueNameTemplate"),
    ("QIT_WORKING_DIR", "General", "WorkingFolderPath"),
    ("OTEL_ENDPOINT", "Telemetry", "Endpoint"),
    ("LOG_LEVEL", "Logging", "Level"),
];

// ---------------------------------------------------------------------------
// Raw settings
// ---------------------------------------------------------------------------

/// Section/key lookup over the raw configuration table.
#[derive(Clone, Default)]
pub struct Settings {
    table: toml::Table,
}

impl std::fmt::Debug for Settings {
    // Values may hold secrets; only show which sections are present.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("sections", &self.table.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Settings {
    pub fn parse(text: &str) -> Result<Self> {
        let table: toml::Table = text
            .parse()
            .map_err(|e| Error::Config(format!("bad config file: {e}")))?;
        Ok(Self { table })
    }

    /// Look up `section.key`. Scalars are returned as text; empty strings
    /// count as absent.
    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        let value = self.table.get(section)?.as_table()?.get(key)?;
        let text = match value {
            toml::Value::String(s) => s.clone(),
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            _ => return None,
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        let entry = self
            .table
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if !entry.is_table() {
            *entry = toml::Value::Table(toml::Table::new());
        }
        if let toml::Value::Table(t) = entry {
            t.insert(key.to_string(), toml::Value::String(value.into()));
        }
    }

    /// Overlay known environment-style variables onto the table.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in vars {
            if let Some((_, section, key)) =
                ENV_OVERRIDES.iter().find(|(env, _, _)| *env == name.as_ref())
            {
                self.set(section, key, value);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Typed config
// ---------------------------------------------------------------------------

/// Connection parameters for the store.
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<SecretString>,
    /// Per-command and connect timeout.
    pub timeout: Duration,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub redis: RedisSettings,
    /// Hash map holding entity -> queue base name.
    pub queue_hash_map: String,
    /// Hash map holding urn -> status record.
    pub job_tracker_hash_map: String,
    pub priority_levels: PriorityLevels,
    pub queue_name_template: TierTemplate,
    pub working_folder: Option<PathBuf>,
    pub logs_folder_name: String,
    pub log_file_name: String,
    pub log_level: String,
    pub otel_endpoint: Option<String>,
    settings: Settings,
}

impl Config {
    /// Load from an optional TOML file, then apply environment overrides.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read config {}: {e}", path.display()))
                })?;
                Settings::parse(&text)?
            }
            None => Settings::default(),
        };
        settings.apply_overrides(std::env::vars());
        Self::from_settings(settings)
    }

    /// Parse config text without consulting the environment.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Self::from_settings(Settings::parse(text)?)
    }

    pub fn from_settings(settings: Settings) -> Result<Self> {
        let get = |section: &str, key: &str| settings.get(section, key);

        let defaults = RedisSettings::default();
        let redis = RedisSettings {
            host: get("RedisServer", "Host").unwrap_or(defaults.host),
            port: parse_or("RedisServer", "Port", get("RedisServer", "Port"), defaults.port)?,
            db: parse_or("RedisServer", "DB", get("RedisServer", "DB"), defaults.db)?,
            password: get("RedisServer", "Password").map(SecretString::from),
            timeout: Duration::from_secs(parse_or(
                "RedisServer",
                "TimeoutSecs",
                get("RedisServer", "TimeoutSecs"),
                defaults.timeout.as_secs(),
            )?),
        };

        let priority_levels = PriorityLevels::parse(
            &get("QueueInfo", "PriorityLevels").unwrap_or_else(|| DEFAULT_PRIORITY_LEVELS.into()),
        )?;
        let queue_name_template = TierTemplate::new(
            get("QueueInfo", "QueueNameTemplate")
                .unwrap_or_else(|| DEFAULT_QUEUE_NAME_TEMPLATE.into()),
        )?;

        Ok(Self {
            redis,
            queue_hash_map: get("RedisHashMaps", "AutoCITIQueueHashMap")
                .unwrap_or_else(|| DEFAULT_QUEUE_HASH_MAP.into()),
            job_tracker_hash_map: get("RedisHashMaps", "AutoCITIJobTrackerHashMap")
                .unwrap_or_else(|| DEFAULT_JOB_TRACKER_HASH_MAP.into()),
            priority_levels,
            queue_name_template,
            working_folder: get("General", "WorkingFolderPath").map(PathBuf::from),
            logs_folder_name: get("Logging", "LogsFolderName").unwrap_or_else(|| "logs".into()),
            log_file_name: get("Logging", "LogFileName").unwrap_or_else(|| "qit.log".into()),
            log_level: get("Logging", "Level").unwrap_or_else(|| "info".into()),
            otel_endpoint: get("Telemetry", "Endpoint"),
            settings,
        })
    }

    /// Raw `section.key` lookup, for options this crate does not type.
    pub fn setting(&self, section: &str, key: &str) -> Option<String> {
        self.settings.get(section, key)
    }

    /// Configured working folder if it exists, else the current directory.
    pub fn working_dir(&self) -> Result<PathBuf> {
        match &self.working_folder {
            Some(dir) if dir.is_dir() => Ok(dir.clone()),
            _ => Ok(std::env::current_dir()?),
        }
    }

    /// `<working dir>/<logs folder>`, created if missing.
    pub fn log_dir(&self) -> Result<PathBuf> {
        let dir = self.working_dir()?.join(&self.logs_folder_name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

fn parse_or<T>(section: &str, key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(text) => text
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{section}.{key} = {text:?}: {e}"))),
        None => Ok(default),
    }
}
