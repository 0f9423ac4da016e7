//! Usage history: the activation log and the usage scores derived from it.
//!
//! Recording an activation appends to the log and recomputes the scores. The
//! log and the score snapshot sit behind independent locks, so recording never
//! blocks queries that are reading scores.

pub mod scoring;
pub mod store;

pub use scoring::UsageScoring;
pub use store::{ActivationStore, JsonlStore, MemoryStore};

use crate::error::UsageError;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// One activation of an item's action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
  pub timestamp: DateTime<Utc>,
  /// The complete input, trigger included.
  pub query: String,
  pub extension_id: String,
  pub item_id: String,
  pub action_id: String,
}

impl Activation {
  /// Creates an activation stamped with the current time.
  pub fn now(
    query: impl Into<String>,
    extension_id: impl Into<String>,
    item_id: impl Into<String>,
    action_id: impl Into<String>,
  ) -> Self {
    Self {
      timestamp: Utc::now(),
      query: query.into(),
      extension_id: extension_id.into(),
      item_id: item_id.into(),
      action_id: action_id.into(),
    }
  }
}

/// Settings of a [`UsageHistory`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageSettings {
  /// Weight factor per step of recency, in `(0, 1)`.
  pub memory_decay: f64,
  pub prioritize_perfect_match: bool,
  /// Activations older than this are pruned.
  pub retention: Duration,
}

impl Default for UsageSettings {
  fn default() -> Self {
    Self {
      memory_decay: 0.5,
      prioritize_perfect_match: true,
      retention: Duration::days(30),
    }
  }
}

pub(crate) fn check_decay(decay: f64) -> Result<f64, UsageError> {
  if decay > 0.0 && decay < 1.0 {
    Ok(decay)
  } else {
    Err(UsageError::InvalidDecay(decay))
  }
}

/// The activation log plus the usage scores derived from it.
pub struct UsageHistory {
  store: Mutex<Box<dyn ActivationStore>>,
  scoring: RwLock<UsageScoring>,
  recompute: Mutex<()>,
  retention: RwLock<Duration>,
}

impl UsageHistory {
  /// Opens a history on top of `store`, pruning expired activations and
  /// computing the initial scores.
  ///
  /// # Errors
  ///
  /// Fails if the decay is out of range or the store cannot be read. Callers
  /// may fall back to [`UsageHistory::in_memory`].
  pub fn new(store: Box<dyn ActivationStore>, settings: UsageSettings) -> Result<Self, UsageError> {
    let memory_decay = check_decay(settings.memory_decay)?;
    let history = Self {
      store: Mutex::new(store),
      scoring: RwLock::new(UsageScoring::new(
        settings.prioritize_perfect_match,
        memory_decay,
        Default::default(),
      )),
      recompute: Mutex::new(()),
      retention: RwLock::new(settings.retention),
    };
    history.prune(Utc::now())?;
    history.try_update_scores()?;
    Ok(history)
  }

  /// Opens a history persisted as a JSON lines file at `path`.
  pub fn open(path: impl Into<PathBuf>, settings: UsageSettings) -> Result<Self, UsageError> {
    let store = JsonlStore::open(path)?;
    info!(path = %store.path().display(), "Opened activation log");
    Self::new(Box::new(store), settings)
  }

  /// A volatile history with default settings.
  pub fn in_memory() -> Self {
    Self {
      store: Mutex::new(Box::new(MemoryStore::new())),
      scoring: RwLock::new(UsageScoring::default()),
      recompute: Mutex::new(()),
      retention: RwLock::new(UsageSettings::default().retention),
    }
  }

  /// Appends an activation and recomputes the usage scores.
  ///
  /// The new scores are installed before this returns, so the next query
  /// ranks with them.
  ///
  /// # Errors
  ///
  /// Returns an error if the activation could not be persisted. Scores are
  /// left untouched in that case.
  pub fn record_activation(
    &self,
    query: &str,
    extension_id: &str,
    item_id: &str,
    action_id: &str,
  ) -> Result<(), UsageError> {
    let activation = Activation::now(query, extension_id, item_id, action_id);
    self.store.lock().append(&activation)?;
    debug!(query, extension = extension_id, item = item_id, action = action_id, "Recorded activation");
    self.update_scores();
    Ok(())
  }

  /// The usage score of an item, if it was ever activated.
  pub fn score_of(&self, extension_id: &str, item_id: &str) -> Option<f64> {
    self.scoring.read().score_of(extension_id, item_id)
  }

  /// A snapshot of the current scores and ranking settings.
  pub fn scoring(&self) -> UsageScoring {
    self.scoring.read().clone()
  }

  pub fn memory_decay(&self) -> f64 {
    self.scoring.read().memory_decay
  }

  /// Changes the memory decay and recomputes the scores.
  pub fn set_memory_decay(&self, decay: f64) -> Result<(), UsageError> {
    let decay = check_decay(decay)?;
    self.scoring.write().memory_decay = decay;
    self.try_update_scores()
  }

  pub fn prioritize_perfect_match(&self) -> bool {
    self.scoring.read().prioritize_perfect_match
  }

  pub fn set_prioritize_perfect_match(&self, prioritize: bool) {
    self.scoring.write().prioritize_perfect_match = prioritize;
  }

  /// Counts activations per extension since `since`.
  pub fn activations_since(&self, since: DateTime<Utc>) -> Result<BTreeMap<String, usize>, UsageError> {
    let activations = self.store.lock().load()?;
    let mut counts = BTreeMap::new();
    for activation in activations.into_iter().filter(|a| a.timestamp > since) {
      *counts.entry(activation.extension_id).or_insert(0) += 1;
    }
    Ok(counts)
  }

  /// Distinct non-empty past inputs, most recent first.
  pub fn input_history(&self) -> Result<Vec<String>, UsageError> {
    let activations = self.store.lock().load()?;
    let mut seen = HashSet::new();
    Ok(
      activations
        .into_iter()
        .rev()
        .filter(|activation| !activation.query.is_empty())
        .filter_map(|activation| seen.insert(activation.query.clone()).then_some(activation.query))
        .collect(),
    )
  }

  /// Drops every activation and all usage scores.
  pub fn clear(&self) -> Result<(), UsageError> {
    self.store.lock().clear()?;
    self.update_scores();
    info!("Cleared activation history");
    Ok(())
  }

  pub fn retention(&self) -> Duration {
    *self.retention.read()
  }

  /// Changes the retention horizon and prunes with it right away.
  ///
  /// Returns the number of activations removed.
  pub fn set_retention(&self, retention: Duration) -> Result<usize, UsageError> {
    *self.retention.write() = retention;
    self.prune(Utc::now())
  }

  /// Removes activations older than the retention horizon relative to `now`.
  pub fn prune(&self, now: DateTime<Utc>) -> Result<usize, UsageError> {
    let horizon = now - self.retention();
    let removed = self.store.lock().retain_since(horizon)?;
    if removed > 0 {
      self.update_scores();
    }
    Ok(removed)
  }

  /// Recomputes the scores, keeping the previous ones if the log is
  /// unreadable.
  fn update_scores(&self) {
    if let Err(err) = self.try_update_scores() {
      warn!(error = %err, "Failed to recompute usage scores, keeping previous scores");
    }
  }

  #[instrument(name = "usage_update_scores", skip_all)]
  fn try_update_scores(&self) -> Result<(), UsageError> {
    let _serialized = self.recompute.lock();
    let activations = self.store.lock().load()?;
    let decay = self.scoring.read().memory_decay;
    let scores = Arc::new(scoring::compute_scores(&activations, decay));

    let mut scoring = self.scoring.write();
    *scoring = UsageScoring::new(scoring.prioritize_perfect_match, scoring.memory_decay, scores);
    debug!(activations = activations.len(), items = scoring.len(), "Usage scores updated");
    Ok(())
  }
}

impl std::fmt::Debug for UsageHistory {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let scoring = self.scoring.read();
    f.debug_struct("UsageHistory")
      .field("memory_decay", &scoring.memory_decay)
      .field("prioritize_perfect_match", &scoring.prioritize_perfect_match)
      .field("scored_items", &scoring.len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_record_activation_updates_scores() {
    let history = UsageHistory::in_memory();
    assert_eq!(history.score_of("apps", "term"), None);

    history.record_activation("term", "apps", "term", "open").unwrap();
    history.record_activation("edit", "apps", "editor", "open").unwrap();

    let term = history.score_of("apps", "term").unwrap();
    let editor = history.score_of("apps", "editor").unwrap();
    assert!(editor > term);
  }

  #[test]
  fn test_snapshot_is_stable() {
    let history = UsageHistory::in_memory();
    let before = history.scoring();
    history.record_activation("term", "apps", "term", "open").unwrap();
    assert!(before.is_empty());
    assert_eq!(history.scoring().len(), 1);
  }

  #[test]
  fn test_memory_decay_validation() {
    let history = UsageHistory::in_memory();
    assert!(matches!(history.set_memory_decay(1.0), Err(UsageError::InvalidDecay(_))));
    assert!(matches!(history.set_memory_decay(0.0), Err(UsageError::InvalidDecay(_))));
    history.set_memory_decay(0.8).unwrap();
    assert_eq!(history.memory_decay(), 0.8);

    let settings = UsageSettings {
      memory_decay: 2.0,
      ..Default::default()
    };
    assert!(UsageHistory::new(Box::new(MemoryStore::new()), settings).is_err());
  }

  #[test]
  fn test_input_history_and_statistics() {
    let history = UsageHistory::in_memory();
    history.record_activation("term", "apps", "term", "open").unwrap();
    history.record_activation("fire", "apps", "firefox", "open").unwrap();
    history.record_activation("term", "apps", "term", "open").unwrap();
    history.record_activation("", "files", "home", "open").unwrap();
    history.record_activation("calc 1+1", "calc", "result", "copy").unwrap();

    assert_eq!(history.input_history().unwrap(), vec!["calc 1+1", "term", "fire"]);

    let counts = history.activations_since(Utc::now() - Duration::hours(1)).unwrap();
    assert_eq!(counts.get("apps"), Some(&3));
    assert_eq!(counts.get("files"), Some(&1));
    assert_eq!(counts.get("calc"), Some(&1));
    assert!(history.activations_since(Utc::now() + Duration::hours(1)).unwrap().is_empty());
  }

  #[test]
  fn test_clear() {
    let history = UsageHistory::in_memory();
    history.record_activation("term", "apps", "term", "open").unwrap();
    history.clear().unwrap();
    assert_eq!(history.score_of("apps", "term"), None);
    assert!(history.input_history().unwrap().is_empty());
  }

  #[test]
  fn test_prune_uses_retention() {
    let history = UsageHistory::in_memory();
    history.record_activation("term", "apps", "term", "open").unwrap();
    assert_eq!(history.prune(Utc::now()).unwrap(), 0);
    assert_eq!(history.prune(Utc::now() + Duration::days(31)).unwrap(), 1);
    assert_eq!(history.score_of("apps", "term"), None);
  }

  #[test]
  fn test_set_retention_changes_horizon() {
    let history = UsageHistory::in_memory();
    history.record_activation("term", "apps", "term", "open").unwrap();
    assert_eq!(history.set_retention(Duration::days(2)).unwrap(), 0);
    assert_eq!(history.retention(), Duration::days(2));
    assert_eq!(history.prune(Utc::now() + Duration::days(3)).unwrap(), 1);
  }

  #[test]
  fn test_persisted_history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activations.jsonl");
    {
      let history = UsageHistory::open(&path, UsageSettings::default()).unwrap();
      history.record_activation("term", "apps", "term", "open").unwrap();
    }
    let history = UsageHistory::open(&path, UsageSettings::default()).unwrap();
    assert!(history.score_of("apps", "term").is_some());
  }
}
