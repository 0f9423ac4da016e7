//! A handler answering queries from an [`Index`].

use crate::context::QueryContext;
use crate::error::{HandlerError, IndexError};
use crate::extension::{Execution, GlobalQueryHandler, HandlerResult, TriggerQueryHandler};
use crate::index::tokenizer::split_words;
use crate::index::{Index, IndexConfig, IndexStats};
use crate::types::{IndexItem, RankItem, Score, PERFECT_MATCH};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use unicode_segmentation::UnicodeSegmentation;

/// Supplies the items an [`IndexQueryHandler`] indexes.
pub trait IndexItemProvider: Send + Sync {
  fn provide_index_items(&self) -> Result<Vec<IndexItem>, IndexError>;
}

impl<F> IndexItemProvider for F
where
  F: Fn() -> Result<Vec<IndexItem>, IndexError> + Send + Sync,
{
  fn provide_index_items(&self) -> Result<Vec<IndexItem>, IndexError> {
    self()
  }
}

/// item id -> lowercased lookup strings
type Lookups = HashMap<String, Vec<String>>;

/// Composes an [`Index`] with the trigger and global handler traits.
///
/// Raw scores are `1.0` when the query equals one of the item's lookup
/// strings ignoring case, otherwise the query length divided by the length of
/// the best matching lookup string, kept below `1.0`. A lookup string matches
/// if one of its words starts with a query word; typo matches fall back to all
/// lookup strings of the item.
///
/// # Examples
///
/// ```rust
/// use quarry::prelude::*;
///
/// let handler = IndexQueryHandler::new(
///   || {
///     let item = Item::builder("term", "Terminal").shared();
///     Ok(vec![IndexItem::new(item, "Terminal")])
///   },
///   IndexConfig::default(),
/// );
/// handler.update_index_items().unwrap();
///
/// let items = handler.handle_global_query(&QueryContext::new("term")).unwrap();
/// assert_eq!(items[0].item.id, "term");
/// ```
pub struct IndexQueryHandler {
  index: Index,
  provider: Box<dyn IndexItemProvider>,
  lookups: RwLock<Arc<Lookups>>,
  default_trigger: Option<String>,
  synopsis: String,
  execution: Execution,
}

impl IndexQueryHandler {
  pub fn new(provider: impl IndexItemProvider + 'static, config: IndexConfig) -> Self {
    Self {
      index: Index::new(config),
      provider: Box::new(provider),
      lookups: RwLock::new(Arc::new(Lookups::new())),
      default_trigger: None,
      synopsis: String::new(),
      execution: Execution::Fast,
    }
  }

  /// Sets the trigger used when the user configured none.
  pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
    self.default_trigger = Some(trigger.into());
    self
  }

  pub fn with_synopsis(mut self, synopsis: impl Into<String>) -> Self {
    self.synopsis = synopsis.into();
    self
  }

  /// Moves the handler to the long-running phase.
  pub fn long_running(mut self) -> Self {
    self.execution = Execution::LongRunning;
    self
  }

  pub fn index(&self) -> &Index {
    &self.index
  }

  /// Asks the provider for items and rebuilds the index.
  ///
  /// # Errors
  ///
  /// Returns the provider's error or [`IndexError::MalformedItem`]; the
  /// previous index stays in place.
  pub fn update_index_items(&self) -> Result<IndexStats, IndexError> {
    let items = self.provider.provide_index_items().map_err(|err| {
      warn!(error = %err, "Index item provider failed, keeping previous index");
      err
    })?;
    let lookups = lookups_of(&items);
    let stats = self.index.rebuild(items)?;
    *self.lookups.write() = Arc::new(lookups);
    info!(items = stats.items, words = stats.words, "Index items updated");
    Ok(stats)
  }

  fn rank(&self, context: &QueryContext) -> HandlerResult {
    let query = context.string().trim();
    if query.is_empty() {
      return Ok(Vec::new());
    }

    let matches = self.index.search(query);
    if !context.is_valid() {
      return Err(HandlerError::Cancelled);
    }

    let lookups = Arc::clone(&self.lookups.read());
    let scorer = Scorer::new(query);

    Ok(
      matches
        .into_iter()
        .map(|m| {
          let score = match lookups.get(&m.item.id) {
            Some(strings) => scorer.score(strings),
            None => scorer.score(&[m.item.text.to_lowercase()]),
          };
          RankItem::new(m.item, score)
        })
        .collect(),
    )
  }

  /// Every indexed item once, with a zero score.
  fn list_all(&self) -> Vec<RankItem> {
    let mut seen = HashSet::new();
    self
      .index
      .index_items()
      .iter()
      .filter(|index_item| seen.insert(index_item.item.id.clone()))
      .map(|index_item| RankItem::new(index_item.item.clone(), 0.0))
      .collect()
  }
}

fn lookups_of(items: &[IndexItem]) -> Lookups {
  let mut lookups = Lookups::new();
  for index_item in items {
    lookups
      .entry(index_item.item.id.clone())
      .or_default()
      .push(index_item.string.to_lowercase());
  }
  lookups
}

/// A lowercased query prepared for scoring.
struct Scorer {
  text: String,
  words: Vec<String>,
  length: usize,
}

impl Scorer {
  fn new(query: &str) -> Self {
    let text = query.to_lowercase();
    Self {
      words: split_words(&text),
      length: text.graphemes(true).count(),
      text,
    }
  }

  fn matches(&self, string: &str) -> bool {
    let words = split_words(string);
    self
      .words
      .iter()
      .any(|query_word| words.iter().any(|word| word.starts_with(query_word.as_str())))
  }

  fn score(&self, strings: &[String]) -> Score {
    let below_perfect = PERFECT_MATCH - Score::EPSILON;
    let matching: Vec<&String> = strings.iter().filter(|s| self.matches(s)).collect();
    let candidates = if matching.is_empty() {
      strings.iter().collect()
    } else {
      matching
    };

    candidates
      .into_iter()
      .map(|string| {
        if *string == self.text {
          PERFECT_MATCH
        } else {
          let length = string.graphemes(true).count().max(1);
          (self.length as Score / length as Score).min(below_perfect)
        }
      })
      .fold(0.0, Score::max)
  }
}

impl TriggerQueryHandler for IndexQueryHandler {
  fn default_trigger(&self) -> Option<String> {
    self.default_trigger.clone()
  }

  fn synopsis(&self, _query: &str) -> String {
    self.synopsis.clone()
  }

  fn supports_fuzzy_matching(&self) -> bool {
    true
  }

  fn set_fuzzy_matching(&self, enabled: bool) {
    let config = self.index.config();
    if config.fuzzy == enabled {
      return;
    }
    if let Err(err) = self.index.set_config(config.fuzzy(enabled)) {
      warn!(error = %err, "Failed to rebuild index for new matching mode");
    }
  }

  /// Lists every item for an empty string, otherwise searches.
  fn handle_trigger_query(&self, context: &QueryContext) -> HandlerResult {
    if context.string().trim().is_empty() {
      return Ok(self.list_all());
    }
    self.rank(context)
  }
}

impl GlobalQueryHandler for IndexQueryHandler {
  fn execution(&self) -> Execution {
    self.execution
  }

  fn handle_global_query(&self, context: &QueryContext) -> HandlerResult {
    self.rank(context)
  }
}
