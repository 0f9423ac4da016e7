//! Offline search index with interchangeable matching strategies.
//!
//! An [`Index`] is owned by a single writer (usually an
//! [`IndexQueryHandler`](crate::handlers::IndexQueryHandler)) and searched
//! concurrently by query threads. Rebuilding constructs a complete new
//! [`IndexAdapter`] and installs it atomically; a failed rebuild keeps the
//! previous one.

pub mod adapter;
pub mod fuzzy;
pub mod levenshtein;
pub mod prefix;
pub mod tokenizer;

pub use adapter::IndexAdapter;
pub use fuzzy::FuzzyIndex;
pub use prefix::PrefixIndex;

use crate::error::IndexError;
use crate::types::{IndexItem, SharedItem};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Position of an item inside a built index.
pub(crate) type Slot = usize;

/// An item found by an index together with its accumulated match strength.
///
/// The prefix strategy reports one unit per matched query word, the fuzzy
/// strategy the number of q-grams shared with the matched words.
#[derive(Debug, Clone)]
pub struct IndexMatch {
  pub item: SharedItem,
  pub strength: u32,
}

/// Matching configuration of an [`Index`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
  /// Use the error tolerant q-gram strategy instead of exact prefix matching.
  pub fuzzy: bool,
  /// The q-gram size.
  pub gram_size: usize,
  /// Fraction of the word length (below 1) or absolute number of errors.
  pub error_tolerance: f64,
}

impl Default for IndexConfig {
  fn default() -> Self {
    Self {
      fuzzy: false,
      gram_size: 3,
      error_tolerance: 1.0 / 3.0,
    }
  }
}

impl IndexConfig {
  /// Returns a copy with fuzzy matching switched on or off.
  pub fn fuzzy(mut self, fuzzy: bool) -> Self {
    self.fuzzy = fuzzy;
    self
  }

  /// Returns a copy with a different error tolerance.
  pub fn error_tolerance(mut self, error_tolerance: f64) -> Self {
    self.error_tolerance = error_tolerance;
    self
  }

  fn build(&self, items: &[IndexItem]) -> Result<Box<dyn IndexAdapter>, IndexError> {
    Ok(if self.fuzzy {
      Box::new(FuzzyIndex::build(items, self.gram_size, self.error_tolerance)?)
    } else {
      Box::new(PrefixIndex::build(items)?)
    })
  }
}

/// Statistics of a successful rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
  pub items: usize,
  pub words: usize,
}

#[derive(Debug)]
struct Snapshot {
  config: IndexConfig,
  index_items: Arc<[IndexItem]>,
  adapter: Box<dyn IndexAdapter>,
}

/// A rebuild-then-swap search index.
#[derive(Debug)]
pub struct Index {
  current: RwLock<Arc<Snapshot>>,
}

impl Index {
  /// Creates an empty index using `config`.
  pub fn new(config: IndexConfig) -> Self {
    let adapter: Box<dyn IndexAdapter> = Box::new(PrefixIndex::default());
    Self {
      current: RwLock::new(Arc::new(Snapshot {
        config,
        index_items: Arc::from(Vec::new()),
        adapter,
      })),
    }
  }

  /// Replaces the indexed items.
  ///
  /// The new index is built without holding any lock and installed only if
  /// building succeeded.
  ///
  /// # Errors
  ///
  /// Returns [`IndexError::MalformedItem`] if an item violates the item
  /// contract. The previous index stays in place.
  #[instrument(name = "index_rebuild", skip_all, fields(count = index_items.len()))]
  pub fn rebuild(&self, index_items: Vec<IndexItem>) -> Result<IndexStats, IndexError> {
    let config = self.config();
    self.install(config, Arc::from(index_items))
  }

  /// Changes the matching configuration and rebuilds from the retained items.
  pub fn set_config(&self, config: IndexConfig) -> Result<IndexStats, IndexError> {
    let index_items = Arc::clone(&self.current.read().index_items);
    self.install(config, index_items)
  }

  /// The active matching configuration.
  pub fn config(&self) -> IndexConfig {
    self.current.read().config.clone()
  }

  /// Searches the currently installed index.
  pub fn search(&self, query: &str) -> Vec<IndexMatch> {
    let snapshot = Arc::clone(&self.current.read());
    snapshot.adapter.search(query)
  }

  /// Searches and drops the match strengths.
  pub fn search_items(&self, query: &str) -> Vec<SharedItem> {
    self.search(query).into_iter().map(|m| m.item).collect()
  }

  /// The index items the current index was built from.
  pub fn index_items(&self) -> Arc<[IndexItem]> {
    Arc::clone(&self.current.read().index_items)
  }

  /// Statistics of the installed index.
  pub fn stats(&self) -> IndexStats {
    let snapshot = self.current.read();
    IndexStats {
      items: snapshot.adapter.item_count(),
      words: snapshot.adapter.word_count(),
    }
  }

  fn install(&self, config: IndexConfig, index_items: Arc<[IndexItem]>) -> Result<IndexStats, IndexError> {
    let started = Instant::now();
    let adapter = config.build(&index_items).map_err(|err| {
      warn!(error = %err, "Index rebuild failed, keeping previous index");
      err
    })?;

    let stats = IndexStats {
      items: adapter.item_count(),
      words: adapter.word_count(),
    };

    *self.current.write() = Arc::new(Snapshot {
      config,
      index_items,
      adapter,
    });

    debug!(
      items = stats.items,
      words = stats.words,
      elapsed_us = started.elapsed().as_micros() as u64,
      "Index rebuilt"
    );
    Ok(stats)
  }
}

impl Default for Index {
  fn default() -> Self {
    Self::new(IndexConfig::default())
  }
}

/// Intersects per-word match sets, summing strengths of common slots.
///
/// The smallest set drives the intersection. A single set is returned as is.
/// The result is ordered by slot for deterministic output.
pub(crate) fn intersect(mut per_word: Vec<HashMap<Slot, u32>>) -> Vec<(Slot, u32)> {
  if per_word.is_empty() {
    return Vec::new();
  }

  let smallest = per_word
    .iter()
    .enumerate()
    .min_by_key(|(_, slots)| slots.len())
    .map(|(i, _)| i)
    .unwrap_or(0);
  let driver = per_word.swap_remove(smallest);

  let mut result: Vec<(Slot, u32)> = driver
    .into_iter()
    .filter_map(|(slot, strength)| {
      per_word.iter().try_fold(strength, |acc, other| other.get(&slot).map(|s| acc + s)).map(|total| (slot, total))
    })
    .collect();
  result.sort_unstable_by_key(|(slot, _)| *slot);
  result
}
