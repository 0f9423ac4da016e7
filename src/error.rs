//! Error types shared across the crate.

use thiserror::Error;

/// Errors raised while building an [`Index`](crate::index::Index).
#[derive(Error, Debug)]
pub enum IndexError {
  /// An item violated the item contract (empty id or empty text).
  #[error("malformed item '{id}': {reason}")]
  MalformedItem { id: String, reason: &'static str },

  /// The provider failed while enumerating its index items.
  #[error("index item provider failed: {0}")]
  Provider(String),
}

/// Errors raised by the usage history and its activation stores.
#[derive(Error, Debug)]
pub enum UsageError {
  #[error("activation store I/O failed for '{path}': {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to encode activation record: {0}")]
  Encode(#[from] serde_json::Error),

  /// Memory decay must lie in the open interval (0, 1).
  #[error("memory decay must be in (0, 1), got {0}")]
  InvalidDecay(f64),
}

/// Errors raised while loading or saving an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("failed to access config file '{path}': {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config: {0}")]
  Parse(#[from] toml::de::Error),

  #[error("failed to serialize config: {0}")]
  Serialize(#[from] toml::ser::Error),

  #[error("invalid config value for '{field}': {reason}")]
  Invalid { field: &'static str, reason: String },
}

/// Errors a query handler may report from its query entry points.
///
/// Both variants are recovered by the engine: the handler simply contributes
/// no results for the query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
  #[error("handler failed: {0}")]
  Failed(String),

  /// The handler observed an invalidated query and stopped early.
  #[error("query cancelled")]
  Cancelled,
}

impl HandlerError {
  /// Convenience constructor for [`HandlerError::Failed`].
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed(message.into())
  }
}

/// Errors raised by the [`QueryEngine`](crate::engine::QueryEngine) public API.
#[derive(Error, Debug)]
pub enum EngineError {
  #[error("no result at index {0}")]
  NoSuchResult(usize),

  #[error("item '{item}' has no action at index {action}")]
  NoSuchAction { item: String, action: usize },

  #[error("failed to start worker pool: {0}")]
  WorkerPool(String),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Usage(#[from] UsageError),
}

/// Umbrella error for callers that do not care which subsystem failed.
#[derive(Error, Debug)]
pub enum QuarryError {
  #[error(transparent)]
  Index(#[from] IndexError),

  #[error(transparent)]
  Usage(#[from] UsageError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, QuarryError>;
