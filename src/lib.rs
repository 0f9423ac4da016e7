//! Quarry - query orchestration and ranking for application launchers.
//!
//! Quarry fans user input out to registered extensions, matches offline
//! indexes with exact prefix or error tolerant q-gram search, and ranks the
//! merged results with a recency-decayed usage history.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod extension;
pub mod handlers;
pub mod index;
pub mod logging;
pub mod query;
pub mod registry;
pub mod types;
pub mod usage;

pub use error::{QuarryError, Result};

pub mod prelude {
  //! Convenient re-exports for common types and traits.

  pub use crate::config::*;
  pub use crate::context::QueryContext;
  pub use crate::engine::*;
  pub use crate::error::{ConfigError, EngineError, HandlerError, IndexError, QuarryError, UsageError};
  pub use crate::extension::*;
  pub use crate::handlers::*;
  pub use crate::index::{Index, IndexConfig, IndexMatch, IndexStats};
  pub use crate::query::*;
  pub use crate::registry::*;
  pub use crate::types::*;
  pub use crate::usage::{Activation, UsageHistory, UsageScoring, UsageSettings};
}
