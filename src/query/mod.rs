//! Per-keystroke query state and the handle frontends observe it through.

use crate::extension::Execution;
use crate::types::{Score, SharedItem};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  Idle,
  Running,
  Finished,
}

/// A published, ranked result.
#[derive(Debug, Clone)]
pub struct QueryResult {
  pub extension_id: String,
  pub item: SharedItem,
  /// The final score after usage scoring. For fallbacks the fallback rank.
  pub score: Score,
}

/// How a handler invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
  Completed,
  Failed(String),
  Panicked(String),
  Cancelled,
}

/// Runtime diagnostics of one handler invocation.
#[derive(Debug, Clone)]
pub struct HandlerRuntime {
  pub extension_id: String,
  pub execution: Execution,
  /// Time spent inside the handler.
  pub handling: Duration,
  /// Time spent applying usage scores to its items.
  pub scoring: Duration,
  /// Number of items that survived validation.
  pub count: usize,
  pub outcome: HandlerOutcome,
}

pub(crate) struct QueryState {
  id: u64,
  trigger: Arc<str>,
  string: Arc<str>,
  synopsis: String,
  valid: Arc<AtomicBool>,
  status: Mutex<QueryStatus>,
  finished: Condvar,
  results: Mutex<Vec<QueryResult>>,
  fallbacks: Mutex<Vec<QueryResult>>,
  diagnostics: DashMap<String, HandlerRuntime>,
}

impl QueryState {
  pub(crate) fn new(id: u64, trigger: &str, string: &str, synopsis: String) -> Self {
    Self {
      id,
      trigger: Arc::from(trigger),
      string: Arc::from(string),
      synopsis,
      valid: Arc::new(AtomicBool::new(true)),
      status: Mutex::new(QueryStatus::Idle),
      finished: Condvar::new(),
      results: Mutex::new(Vec::new()),
      fallbacks: Mutex::new(Vec::new()),
      diagnostics: DashMap::new(),
    }
  }

  pub(crate) fn id(&self) -> u64 {
    self.id
  }

  pub(crate) fn trigger_arc(&self) -> Arc<str> {
    Arc::clone(&self.trigger)
  }

  pub(crate) fn string_arc(&self) -> Arc<str> {
    Arc::clone(&self.string)
  }

  pub(crate) fn valid_flag(&self) -> Arc<AtomicBool> {
    Arc::clone(&self.valid)
  }

  pub(crate) fn is_valid(&self) -> bool {
    self.valid.load(Ordering::Acquire)
  }

  pub(crate) fn set_running(&self) {
    *self.status.lock() = QueryStatus::Running;
  }

  /// Appends a sorted batch unless the query was invalidated.
  pub(crate) fn publish(&self, batch: Vec<QueryResult>) -> bool {
    let mut results = self.results.lock();
    if !self.is_valid() {
      return false;
    }
    results.extend(batch);
    true
  }

  pub(crate) fn set_fallbacks(&self, fallbacks: Vec<QueryResult>) {
    *self.fallbacks.lock() = fallbacks;
  }

  pub(crate) fn record(&self, runtime: HandlerRuntime) {
    self.diagnostics.insert(runtime.extension_id.clone(), runtime);
  }

  pub(crate) fn add_scoring_time(&self, extension_id: &str, elapsed: Duration) {
    if let Some(mut runtime) = self.diagnostics.get_mut(extension_id) {
      runtime.scoring += elapsed;
    }
  }

  /// Transitions to `Finished`, substituting the fallbacks for an empty
  /// result list of a valid query.
  pub(crate) fn finish(&self) {
    {
      let mut results = self.results.lock();
      if self.is_valid() && results.is_empty() {
        results.extend(self.fallbacks.lock().iter().cloned());
      }
    }
    *self.status.lock() = QueryStatus::Finished;
    self.finished.notify_all();
  }

  fn cancel(&self) {
    let _results = self.results.lock();
    self.valid.store(false, Ordering::Release);
  }
}

/// A cheap, cloneable handle to a running or finished query.
#[derive(Clone)]
pub struct QueryHandle {
  state: Arc<QueryState>,
}

impl QueryHandle {
  pub(crate) fn new(state: Arc<QueryState>) -> Self {
    Self { state }
  }

  pub(crate) fn state_arc(&self) -> &Arc<QueryState> {
    &self.state
  }

  /// Sequence number, increasing with every query of an engine.
  pub fn id(&self) -> u64 {
    self.state.id
  }

  /// The input without the trigger.
  pub fn string(&self) -> &str {
    &self.state.string
  }

  /// The trigger that selected a handler, empty for global queries.
  pub fn trigger(&self) -> &str {
    &self.state.trigger
  }

  /// The complete input, trigger included.
  pub fn input(&self) -> String {
    format!("{}{}", self.state.trigger, self.state.string)
  }

  pub fn is_triggered(&self) -> bool {
    !self.state.trigger.is_empty()
  }

  /// The triggered handler's usage hint, empty for global queries.
  pub fn synopsis(&self) -> &str {
    &self.state.synopsis
  }

  /// Returns `false` once the query was cancelled or superseded.
  pub fn is_valid(&self) -> bool {
    self.state.is_valid()
  }

  /// Invalidates the query. No result is published after this returns.
  pub fn cancel(&self) {
    self.state.cancel();
  }

  pub fn state(&self) -> QueryStatus {
    *self.state.status.lock()
  }

  pub fn is_finished(&self) -> bool {
    self.state() == QueryStatus::Finished
  }

  /// Blocks until the query finished or `timeout` elapsed.
  ///
  /// Returns whether the query finished.
  pub fn wait_finished(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut status = self.state.status.lock();
    while *status != QueryStatus::Finished {
      if self.state.finished.wait_until(&mut status, deadline).timed_out() {
        return *status == QueryStatus::Finished;
      }
    }
    true
  }

  /// A snapshot of the published results.
  pub fn results(&self) -> Vec<QueryResult> {
    self.state.results.lock().clone()
  }

  pub fn result(&self, index: usize) -> Option<QueryResult> {
    self.state.results.lock().get(index).cloned()
  }

  pub fn result_count(&self) -> usize {
    self.state.results.lock().len()
  }

  /// The fallbacks collected at query start, best ranked first.
  pub fn fallbacks(&self) -> Vec<QueryResult> {
    self.state.fallbacks.lock().clone()
  }

  pub fn fallback(&self, index: usize) -> Option<QueryResult> {
    self.state.fallbacks.lock().get(index).cloned()
  }

  /// Per-handler runtimes, ordered by extension id.
  pub fn diagnostics(&self) -> Vec<HandlerRuntime> {
    let mut runtimes: Vec<HandlerRuntime> = self
      .state
      .diagnostics
      .iter()
      .map(|entry| entry.value().clone())
      .collect();
    runtimes.sort_by(|a, b| a.extension_id.cmp(&b.extension_id));
    runtimes
  }
}

impl fmt::Debug for QueryHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueryHandle")
      .field("id", &self.id())
      .field("trigger", &self.trigger())
      .field("string", &self.string())
      .field("valid", &self.is_valid())
      .field("state", &self.state())
      .finish()
  }
}
