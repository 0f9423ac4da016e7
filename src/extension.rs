//! Defines the extension system: capability bundles and the handler traits.
//!
//! An [`Extension`] is a stable identifier plus any combination of the three
//! handler capabilities. The capability set is declared when the extension is
//! built and never changes afterwards, so the registry can index extensions by
//! capability without inspecting them at runtime.

use crate::context::QueryContext;
use crate::error::HandlerError;
use crate::types::{RankItem, SharedItem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// What a handler returns from its query entry points.
pub type HandlerResult = Result<Vec<RankItem>, HandlerError>;

/// The handler kinds an extension can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
  /// Handles queries starting with its trigger.
  Trigger,
  /// Consulted for every untriggered query.
  Global,
  /// Supplies items shown when nothing else matched.
  Fallback,
}

/// The phase a global handler runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
  /// Runs in the synchronous first phase; its results make up the first
  /// published batch.
  #[default]
  Fast,
  /// Runs in the second phase; its results are flushed incrementally.
  LongRunning,
}

/// A handler reached through an explicit input prefix.
///
/// The `Send` and `Sync` bounds are required to allow handlers to be invoked
/// from the engine's worker pool.
///
/// # Examples
///
/// ```rust
/// use quarry::prelude::*;
///
/// struct Calculator;
///
/// impl TriggerQueryHandler for Calculator {
///   fn default_trigger(&self) -> Option<String> {
///     Some("=".into())
///   }
///
///   fn handle_trigger_query(&self, context: &QueryContext) -> HandlerResult {
///     let text = format!("{} = ?", context.string());
///     Ok(vec![RankItem::new(Item::builder("result", text).shared(), 1.0)])
///   }
/// }
/// ```
pub trait TriggerQueryHandler: Send + Sync {
  /// The trigger used unless the user configured another one.
  ///
  /// `None` means the extension id followed by a space.
  fn default_trigger(&self) -> Option<String> {
    None
  }

  /// Whether users may replace the default trigger.
  fn allow_trigger_remap(&self) -> bool {
    true
  }

  /// A short usage hint shown by frontends while the handler is triggered.
  fn synopsis(&self, _query: &str) -> String {
    String::new()
  }

  /// Whether the handler can switch to error tolerant matching.
  fn supports_fuzzy_matching(&self) -> bool {
    false
  }

  /// Switches error tolerant matching on or off.
  fn set_fuzzy_matching(&self, _enabled: bool) {}

  /// Handles a triggered query. `context.string()` excludes the trigger.
  fn handle_trigger_query(&self, context: &QueryContext) -> HandlerResult;
}

/// A handler consulted for every untriggered query.
pub trait GlobalQueryHandler: Send + Sync {
  /// The phase this handler runs in. Fixed for the lifetime of a query.
  fn execution(&self) -> Execution {
    Execution::Fast
  }

  /// Returns scored items matching `context.string()`.
  ///
  /// Scores are raw match scores in `[0, 1]`; usage scoring is applied by the
  /// engine afterwards.
  fn handle_global_query(&self, context: &QueryContext) -> HandlerResult;

  /// Returns the items listed for an empty input.
  ///
  /// The engine ranks them with a raw score of `0`, so recently used items
  /// come first.
  fn handle_empty_query(&self, _context: &QueryContext) -> HandlerResult {
    Ok(Vec::new())
  }
}

/// Supplies items offered when a query produced no matches.
pub trait FallbackProvider: Send + Sync {
  /// Returns the fallback items for the complete input, trigger included.
  fn fallbacks(&self, query: &str) -> Vec<SharedItem>;
}

/// A capability bundle identified by a stable id.
///
/// Cloning is cheap; handlers are shared.
#[derive(Clone)]
pub struct Extension {
  id: String,
  name: String,
  description: String,
  trigger: Option<Arc<dyn TriggerQueryHandler>>,
  global: Option<Arc<dyn GlobalQueryHandler>>,
  fallback: Option<Arc<dyn FallbackProvider>>,
}

impl Extension {
  /// Creates a new `ExtensionBuilder`.
  pub fn builder(id: impl Into<String>) -> ExtensionBuilder {
    let id = id.into();
    ExtensionBuilder {
      extension: Extension {
        name: id.clone(),
        id,
        description: String::new(),
        trigger: None,
        global: None,
        fallback: None,
      },
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn description(&self) -> &str {
    &self.description
  }

  pub fn trigger_handler(&self) -> Option<&Arc<dyn TriggerQueryHandler>> {
    self.trigger.as_ref()
  }

  pub fn global_handler(&self) -> Option<&Arc<dyn GlobalQueryHandler>> {
    self.global.as_ref()
  }

  pub fn fallback_provider(&self) -> Option<&Arc<dyn FallbackProvider>> {
    self.fallback.as_ref()
  }

  /// The declared capability set.
  pub fn capabilities(&self) -> BTreeSet<Capability> {
    let mut capabilities = BTreeSet::new();
    if self.trigger.is_some() {
      capabilities.insert(Capability::Trigger);
    }
    if self.global.is_some() {
      capabilities.insert(Capability::Global);
    }
    if self.fallback.is_some() {
      capabilities.insert(Capability::Fallback);
    }
    capabilities
  }

  pub fn has(&self, capability: Capability) -> bool {
    match capability {
      Capability::Trigger => self.trigger.is_some(),
      Capability::Global => self.global.is_some(),
      Capability::Fallback => self.fallback.is_some(),
    }
  }

  /// The trigger used when the user configured none.
  pub fn default_trigger(&self) -> Option<String> {
    self
      .trigger
      .as_ref()
      .map(|handler| handler.default_trigger().unwrap_or_else(|| format!("{} ", self.id)))
  }
}

impl fmt::Debug for Extension {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Extension")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("capabilities", &self.capabilities())
      .finish()
  }
}

/// A builder for [`Extension`]s.
pub struct ExtensionBuilder {
  extension: Extension,
}

impl ExtensionBuilder {
  /// Sets the human readable name. Defaults to the id.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.extension.name = name.into();
    self
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.extension.description = description.into();
    self
  }

  /// Declares the trigger capability.
  pub fn trigger(mut self, handler: Arc<dyn TriggerQueryHandler>) -> Self {
    self.extension.trigger = Some(handler);
    self
  }

  /// Declares the global capability.
  pub fn global(mut self, handler: Arc<dyn GlobalQueryHandler>) -> Self {
    self.extension.global = Some(handler);
    self
  }

  /// Declares the fallback capability.
  pub fn fallback(mut self, provider: Arc<dyn FallbackProvider>) -> Self {
    self.extension.fallback = Some(provider);
    self
  }

  pub fn build(self) -> Extension {
    self.extension
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Echo;

  impl TriggerQueryHandler for Echo {
    fn handle_trigger_query(&self, _context: &QueryContext) -> HandlerResult {
      Ok(Vec::new())
    }
  }

  struct Pinned;

  impl TriggerQueryHandler for Pinned {
    fn default_trigger(&self) -> Option<String> {
      Some("!".into())
    }

    fn handle_trigger_query(&self, _context: &QueryContext) -> HandlerResult {
      Ok(Vec::new())
    }
  }

  struct Web;

  impl FallbackProvider for Web {
    fn fallbacks(&self, _query: &str) -> Vec<SharedItem> {
      Vec::new()
    }
  }

  #[test]
  fn test_capabilities_follow_builder() {
    let extension = Extension::builder("echo")
      .trigger(Arc::new(Echo))
      .fallback(Arc::new(Web))
      .build();

    assert!(extension.has(Capability::Trigger));
    assert!(!extension.has(Capability::Global));
    assert_eq!(
      extension.capabilities().into_iter().collect::<Vec<_>>(),
      vec![Capability::Trigger, Capability::Fallback]
    );
    assert_eq!(extension.name(), "echo");
  }

  #[test]
  fn test_default_trigger() {
    let echo = Extension::builder("echo").trigger(Arc::new(Echo)).build();
    assert_eq!(echo.default_trigger().as_deref(), Some("echo "));

    let pinned = Extension::builder("pin").trigger(Arc::new(Pinned)).build();
    assert_eq!(pinned.default_trigger().as_deref(), Some("!"));

    let plain = Extension::builder("plain").build();
    assert_eq!(plain.default_trigger(), None);
  }
}
