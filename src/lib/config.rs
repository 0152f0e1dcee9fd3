//! Settings snapshot consumed once per check.
//!
//! Settings are stored as camelCase JSON in `.envsyncrc.json`. The raw file is
//! deserialized leniently ([`RawConfig`]) and then resolved into a
//! [`SyncConfig`], which applies defaults, validates the enumerated values and
//! clamps the numeric thresholds to their minimums.

use std::{
  fs,
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = ".envsyncrc.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
  All,
  #[default]
  Important,
  Silent,
}

impl NotificationLevel {
  fn parse(value: &str) -> Option<Self> {
    match value {
      "all" => Some(Self::All),
      "important" => Some(Self::Important),
      "silent" => Some(Self::Silent),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonMode {
  #[default]
  Auto,
  Manual,
  Template,
}

impl ComparisonMode {
  fn parse(value: &str) -> Option<Self> {
    match value {
      "auto" => Some(Self::Auto),
      "manual" => Some(Self::Manual),
      "template" => Some(Self::Template),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Auto => "auto",
      Self::Manual => "manual",
      Self::Template => "template",
    }
  }
}

/// Resolved settings for one check.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
  pub enabled: bool,
  pub watch_patterns: Vec<String>,
  pub exclude_patterns: Vec<String>,
  pub notification_level: NotificationLevel,
  pub status_bar_enabled: bool,
  pub debounce_ms: u64,
  pub ignore_comments: bool,
  pub case_sensitive: bool,
  pub telemetry_enabled: bool,
  pub comparison_mode: ComparisonMode,
  pub compare_only_files: Vec<String>,
  pub template_file: Option<String>,
  pub temporary_ignore: Vec<String>,
  pub safety: SafetyConfig,
  pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SafetyConfig {
  pub enabled: bool,
  pub file_size_warn_bytes: u64,
  pub max_files_warn: u64,
  pub max_total_size_warn: u64,
  pub max_processing_time_warn: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceConfig {
  pub enabled: bool,
  pub max_duration: u64,
  pub max_memory_usage: u64,
  pub max_cpu_usage: u64,
  pub min_throughput: u64,
  pub max_cache_size: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    RawConfig::default().resolve()
  }
}

/// Settings as written in the JSON file; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
  pub enabled: Option<bool>,
  pub watch_patterns: Option<Vec<String>>,
  pub exclude_patterns: Option<Vec<String>>,
  pub notification_level: Option<String>,
  /// Legacy spelling, read only when `notificationLevel` is absent.
  pub notifications_level: Option<String>,
  #[serde(default)]
  pub status_bar: RawStatusBar,
  pub debounce_ms: Option<f64>,
  pub ignore_comments: Option<bool>,
  pub case_sensitive: Option<bool>,
  pub telemetry_enabled: Option<bool>,
  pub comparison_mode: Option<String>,
  pub compare_only_files: Option<Vec<String>>,
  pub template_file: Option<String>,
  pub temporary_ignore: Option<Vec<String>>,
  #[serde(default)]
  pub safety: RawSafety,
  #[serde(default)]
  pub performance: RawPerformance,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatusBar {
  pub enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSafety {
  pub enabled: Option<bool>,
  pub file_size_warn_bytes: Option<f64>,
  pub max_files_warn: Option<f64>,
  pub max_total_size_warn: Option<f64>,
  pub max_processing_time_warn: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPerformance {
  pub enabled: Option<bool>,
  pub max_duration: Option<f64>,
  pub max_memory_usage: Option<f64>,
  pub max_cpu_usage: Option<f64>,
  pub min_throughput: Option<f64>,
  pub max_cache_size: Option<f64>,
}

/// `max(minimum, value.unwrap_or(default))`, with non-finite values treated
/// as absent.
fn at_least(value: Option<f64>, default: u64, minimum: u64) -> u64 {
  let value = value
    .filter(|v| v.is_finite())
    .map(|v| if v <= 0.0 { 0 } else { v as u64 })
    .unwrap_or(default);
  value.max(minimum)
}

impl RawConfig {
  pub fn resolve(self) -> SyncConfig {
    let notification_level = self
      .notification_level
      .or(self.notifications_level)
      .and_then(|level| NotificationLevel::parse(&level))
      .unwrap_or_default();
    let comparison_mode = self
      .comparison_mode
      .and_then(|mode| ComparisonMode::parse(&mode))
      .unwrap_or_default();

    SyncConfig {
      enabled: self.enabled.unwrap_or(true),
      watch_patterns: self
        .watch_patterns
        .unwrap_or_else(|| vec![".env*".to_string()]),
      exclude_patterns: self
        .exclude_patterns
        .unwrap_or_else(|| vec![".env.*.local".to_string()]),
      notification_level,
      status_bar_enabled: self.status_bar.enabled.unwrap_or(true),
      debounce_ms: at_least(self.debounce_ms, 1000, 100),
      ignore_comments: self.ignore_comments.unwrap_or(true),
      case_sensitive: self.case_sensitive.unwrap_or(true),
      telemetry_enabled: self.telemetry_enabled.unwrap_or(false),
      comparison_mode,
      compare_only_files: self.compare_only_files.unwrap_or_default(),
      template_file: self.template_file,
      temporary_ignore: self.temporary_ignore.unwrap_or_default(),
      safety: SafetyConfig {
        enabled: self.safety.enabled.unwrap_or(false),
        file_size_warn_bytes: at_least(self.safety.file_size_warn_bytes, 1024 * 1024, 1024),
        max_files_warn: at_least(self.safety.max_files_warn, 50, 1),
        max_total_size_warn: at_least(
          self.safety.max_total_size_warn,
          5 * 1024 * 1024,
          1024 * 1024,
        ),
        max_processing_time_warn: at_least(self.safety.max_processing_time_warn, 5000, 1000),
      },
      performance: PerformanceConfig {
        enabled: self.performance.enabled.unwrap_or(true),
        max_duration: at_least(self.performance.max_duration, 5000, 1000),
        max_memory_usage: at_least(self.performance.max_memory_usage, 104_857_600, 1_048_576),
        max_cpu_usage: at_least(self.performance.max_cpu_usage, 1_000_000, 100_000),
        min_throughput: at_least(self.performance.min_throughput, 1000, 100),
        max_cache_size: at_least(self.performance.max_cache_size, 1000, 100),
      },
    }
  }
}

/// Where the detector gets its settings from; asked once per check.
pub trait ConfigSource: Send + Sync {
  fn snapshot(&self) -> Result<SyncConfig, ConfigError>;
}

impl ConfigSource for SyncConfig {
  fn snapshot(&self) -> Result<SyncConfig, ConfigError> {
    Ok(self.clone())
  }
}

impl<T: ConfigSource + ?Sized> ConfigSource for std::sync::Arc<T> {
  fn snapshot(&self) -> Result<SyncConfig, ConfigError> {
    (**self).snapshot()
  }
}

/// Settings backed by a JSON file, re-read on every snapshot.
#[derive(Debug, Clone)]
pub struct ConfigFile {
  path: PathBuf,
}

impl ConfigFile {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// The settings file governing `start_dir`: the nearest existing one, or a
  /// not-yet-created one in `start_dir`.
  pub fn discover(start_dir: &Path) -> Self {
    let path = find_config_file(start_dir).unwrap_or_else(|| start_dir.join(CONFIG_FILE_NAME));
    Self::new(path)
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn load(&self) -> Result<SyncConfig, ConfigError> {
    if !self.path.exists() {
      #[cfg(feature = "tracing")]
      debug!("No settings at {}, using defaults", self.path.display());
      return Ok(SyncConfig::default());
    }

    let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
      path: self.path.clone(),
      source,
    })?;
    let raw: RawConfig = serde_json::from_str(&content).map_err(|source| ConfigError::Json {
      path: self.path.clone(),
      source,
    })?;

    Ok(raw.resolve())
  }

  /// Sets (or with `None`, removes) one top-level setting and rewrites the file.
  pub fn update(&self, key: &str, value: Option<Value>) -> Result<(), ConfigError> {
    let mut settings = self.read_object()?;
    match value {
      Some(value) => {
        settings.insert(key.to_string(), value);
      }
      None => {
        settings.remove(key);
      }
    }

    #[cfg(feature = "tracing")]
    debug!("Updating {} in {}", key, self.path.display());

    let content = serde_json::to_string_pretty(&Value::Object(settings)).map_err(|source| {
      ConfigError::Json {
        path: self.path.clone(),
        source,
      }
    })?;
    fs::write(&self.path, content + "\n").map_err(|source| ConfigError::Io {
      path: self.path.clone(),
      source,
    })
  }

  fn read_object(&self) -> Result<Map<String, Value>, ConfigError> {
    if !self.path.exists() {
      return Ok(Map::new());
    }

    let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
      path: self.path.clone(),
      source,
    })?;
    match serde_json::from_str(&content) {
      Ok(Value::Object(map)) => Ok(map),
      Ok(_) => Err(ConfigError::NotAnObject(self.path.clone())),
      Err(source) => Err(ConfigError::Json {
        path: self.path.clone(),
        source,
      }),
    }
  }
}

impl ConfigSource for ConfigFile {
  fn snapshot(&self) -> Result<SyncConfig, ConfigError> {
    self.load().inspect_err(|_err| {
      #[cfg(feature = "tracing")]
      warn!("Failed to load settings: {}", _err);
    })
  }
}

/// Whether a workspace-relative path names a settings file. Such files match
/// the default `.env*` pattern but are never dotenv files.
pub fn is_settings_file(relative_path: &str) -> bool {
  relative_path.rsplit('/').next() == Some(CONFIG_FILE_NAME)
}

/// Nearest settings file at or above `start_dir`, stopping at a `.git` root.
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
  let mut current = start_dir.to_path_buf();

  loop {
    let config_path = current.join(CONFIG_FILE_NAME);
    if config_path.exists() {
      return Some(config_path);
    }
    if current.join(".git").exists() {
      return None;
    }
    if !current.pop() {
      return None;
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Failed to read settings {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Invalid settings {}: {source}", .path.display())]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
  #[error("Settings file {} must contain a JSON object", .0.display())]
  NotAnObject(PathBuf),
}
