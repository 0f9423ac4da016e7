//! TOML-backed engine configuration.

use crate::error::ConfigError;
use crate::index::IndexConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Per-extension settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
  /// Overrides the default trigger.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub trigger: Option<String>,
  /// Whether the global handler takes part in untriggered queries.
  pub enabled: bool,
  /// Error tolerant matching for handlers that support it.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub fuzzy: Option<bool>,
}

impl Default for HandlerConfig {
  fn default() -> Self {
    Self {
      trigger: None,
      enabled: true,
      fuzzy: None,
    }
  }
}

impl HandlerConfig {
  fn is_default(&self) -> bool {
    *self == Self::default()
  }
}

/// Identifies a fallback item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FallbackKey {
  pub extension: String,
  pub item: String,
}

impl FallbackKey {
  pub fn new(extension: impl Into<String>, item: impl Into<String>) -> Self {
    Self {
      extension: extension.into(),
      item: item.into(),
    }
  }
}

/// Configuration of a [`QueryEngine`](crate::engine::QueryEngine).
///
/// Every field has a default, so partial files are accepted.
///
/// # Examples
///
/// ```rust
/// use quarry::config::EngineConfig;
///
/// let config: EngineConfig = toml::from_str(r#"
///   memory_decay = 0.7
///
///   [handlers.apps]
///   trigger = "a "
/// "#).unwrap();
///
/// assert_eq!(config.memory_decay, 0.7);
/// assert_eq!(config.flush_interval_ms, 50);
/// assert!(config.handler("apps").enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub memory_decay: f64,
  pub prioritize_perfect_match: bool,
  /// Cadence of result flushes during the long-running phase.
  pub flush_interval_ms: u64,
  /// Capacity of the channel from long-running handlers to the coordinator.
  pub channel_capacity: usize,
  /// Worker pool size, `0` for one thread per CPU.
  pub worker_threads: usize,
  pub history_retention_days: u32,
  pub index: IndexConfig,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub handlers: BTreeMap<String, HandlerConfig>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub fallback_order: Vec<FallbackKey>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      memory_decay: 0.5,
      prioritize_perfect_match: true,
      flush_interval_ms: 50,
      channel_capacity: 256,
      worker_threads: 0,
      history_retention_days: 30,
      index: IndexConfig::default(),
      handlers: BTreeMap::new(),
      fallback_order: Vec::new(),
    }
  }
}

impl EngineConfig {
  /// Loads the configuration at `path`. A missing file yields the defaults.
  ///
  /// # Errors
  ///
  /// Returns an error if the file is unreadable, not valid TOML, or holds
  /// out-of-range values.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let text = match fs::read_to_string(path) {
      Ok(text) => text,
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "No config file, using defaults");
        return Ok(Self::default());
      }
      Err(source) => {
        return Err(ConfigError::Io {
          path: path.display().to_string(),
          source,
        })
      }
    };
    let config: Self = toml::from_str(&text)?;
    config.validate()?;
    Ok(config)
  }

  /// Writes the configuration to `path`, creating parent directories.
  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    self.validate()?;
    let text = toml::to_string_pretty(self)?;
    let io = |source| ConfigError::Io {
      path: path.display().to_string(),
      source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).map_err(io)?;
    }
    fs::write(path, text).map_err(io)
  }

  /// Rejects values the engine cannot work with.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(self.memory_decay > 0.0 && self.memory_decay < 1.0) {
      return Err(invalid("memory_decay", format!("must be in (0, 1), got {}", self.memory_decay)));
    }
    if self.flush_interval_ms == 0 {
      return Err(invalid("flush_interval_ms", "must be positive".into()));
    }
    if self.channel_capacity == 0 {
      return Err(invalid("channel_capacity", "must be positive".into()));
    }
    if self.index.gram_size == 0 {
      return Err(invalid("index.gram_size", "must be positive".into()));
    }
    if !self.index.error_tolerance.is_finite() || self.index.error_tolerance < 0.0 {
      return Err(invalid(
        "index.error_tolerance",
        format!("must be a non-negative number, got {}", self.index.error_tolerance),
      ));
    }
    Ok(())
  }

  pub fn flush_interval(&self) -> Duration {
    Duration::from_millis(self.flush_interval_ms)
  }

  pub fn retention(&self) -> chrono::Duration {
    chrono::Duration::days(i64::from(self.history_retention_days))
  }

  /// The settings of an extension, defaulted if none were configured.
  pub fn handler(&self, extension_id: &str) -> HandlerConfig {
    self.handlers.get(extension_id).cloned().unwrap_or_default()
  }

  /// Edits the settings of an extension, dropping entries that end up
  /// default.
  pub(crate) fn update_handler(&mut self, extension_id: &str, edit: impl FnOnce(&mut HandlerConfig)) {
    let mut handler = self.handler(extension_id);
    edit(&mut handler);
    if handler.is_default() {
      self.handlers.remove(extension_id);
    } else {
      self.handlers.insert(extension_id.to_string(), handler);
    }
  }

  /// The rank of a fallback, see [`fallback_rank`].
  pub fn fallback_rank(&self, extension_id: &str, item_id: &str) -> usize {
    fallback_rank(&self.fallback_order, extension_id, item_id)
  }
}

/// The rank of a fallback in `order`: earlier entries rank higher, unlisted
/// ones rank 0.
pub fn fallback_rank(order: &[FallbackKey], extension_id: &str, item_id: &str) -> usize {
  order
    .iter()
    .position(|key| key.extension == extension_id && key.item == item_id)
    .map_or(0, |position| order.len() - position)
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
  ConfigError::Invalid { field, reason }
}
