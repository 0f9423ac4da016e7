//! The query engine that coordinates all registered handlers.

use crate::config::{fallback_rank, EngineConfig, FallbackKey};
use crate::context::{retain_well_formed, Batch, QueryContext};
use crate::error::{EngineError, HandlerError};
use crate::extension::{Execution, Extension, FallbackProvider, GlobalQueryHandler, TriggerQueryHandler};
use crate::query::{HandlerOutcome, HandlerRuntime, QueryHandle, QueryResult, QueryState};
use crate::registry::{ExtensionRegistry, RegistryEvent, SubscriptionId};
use crate::types::{RankItem, SharedItem};
use crate::usage::{UsageHistory, UsageScoring};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// The main query engine.
///
/// `QueryEngine` keeps a live view of the extensions in an
/// [`ExtensionRegistry`] and answers every input with a [`QueryHandle`]. A
/// query runs in two phases on the engine's worker pool:
///
/// 1. **Fast phase.** All fast global handlers run in parallel. Their items
///    are usage scored, sorted and published as the first batch.
/// 2. **Long-running phase.** Long-running handlers stream their items to the
///    query coordinator, which publishes them every flush interval. Each
///    flushed batch is sorted on its own and appended, so published results
///    never move.
///
/// An input starting with an active trigger skips both phases and runs only
/// the triggered handler, streamed like a long-running one. A query that
/// finishes without results shows its fallbacks instead.
///
/// Create a `QueryEngine` using the [`QueryEngineBuilder`].
///
/// # Examples
///
/// ```rust
/// use quarry::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let apps = Arc::new(IndexQueryHandler::new(
///   || Ok(vec![IndexItem::new(Item::builder("term", "Terminal").shared(), "Terminal")]),
///   IndexConfig::default(),
/// ));
/// apps.update_index_items().unwrap();
///
/// let registry = Arc::new(ExtensionRegistry::new());
/// registry.register(Extension::builder("apps").global(apps.clone()).trigger(apps).build());
///
/// let engine = QueryEngine::builder(registry).build().unwrap();
/// let query = engine.run_query("term");
/// assert!(query.wait_finished(Duration::from_secs(5)));
/// assert_eq!(query.results()[0].item.id, "term");
/// ```
pub struct QueryEngine {
  inner: Arc<EngineInner>,
  registry: Arc<ExtensionRegistry>,
  subscription: SubscriptionId,
}

struct EngineInner {
  pool: rayon::ThreadPool,
  usage: Arc<UsageHistory>,
  config: RwLock<EngineConfig>,
  handlers: RwLock<HandlerTable>,
  current: Mutex<Option<QueryHandle>>,
  next_query_id: AtomicU64,
}

/// The registered extensions and the active trigger table derived from them.
#[derive(Default)]
struct HandlerTable {
  extensions: BTreeMap<String, Extension>,
  /// trigger -> extension id
  triggers: BTreeMap<String, String>,
}

impl HandlerTable {
  fn rebuild_triggers(&mut self, config: &EngineConfig) {
    self.triggers.clear();
    for (id, extension) in &self.extensions {
      let Some(handler) = extension.trigger_handler() else {
        continue;
      };
      let trigger = match config.handler(id).trigger {
        Some(trigger) if handler.allow_trigger_remap() => trigger,
        _ => extension.default_trigger().unwrap_or_default(),
      };
      if trigger.is_empty() {
        continue;
      }
      if let Some(owner) = self.triggers.get(&trigger) {
        warn!(extension = %id, %trigger, owner = %owner, "Trigger conflict, keeping the first handler");
        continue;
      }
      self.triggers.insert(trigger, id.clone());
    }
  }

  /// The longest active trigger `input` starts with.
  fn dispatch(&self, input: &str) -> Option<(&str, &Extension)> {
    self
      .triggers
      .iter()
      .filter(|(trigger, _)| input.starts_with(trigger.as_str()))
      .max_by_key(|(trigger, _)| trigger.len())
      .and_then(|(trigger, id)| self.extensions.get(id).map(|e| (trigger.as_str(), e)))
  }
}

type TriggerEntry = (Arc<str>, Arc<dyn TriggerQueryHandler>);
type GlobalEntry = (Arc<str>, Arc<dyn GlobalQueryHandler>);

/// Everything a query needs, fixed when the query starts.
struct QueryPlan {
  work: Work,
  fallbacks: Vec<(Arc<str>, Arc<dyn FallbackProvider>)>,
  fallback_order: Vec<FallbackKey>,
  flush_interval: Duration,
  channel_capacity: usize,
}

enum Work {
  Triggered(TriggerEntry),
  Global {
    fast: Vec<GlobalEntry>,
    long_running: Vec<GlobalEntry>,
    empty: bool,
  },
}

/// A handler invocation scheduled on the worker pool.
#[derive(Clone)]
enum Invocation {
  Trigger(Arc<dyn TriggerQueryHandler>),
  Global(Arc<dyn GlobalQueryHandler>),
  Empty(Arc<dyn GlobalQueryHandler>),
}

impl Invocation {
  fn call(&self, context: &QueryContext) -> Result<Vec<RankItem>, HandlerError> {
    match self {
      Invocation::Trigger(handler) => handler.handle_trigger_query(context),
      Invocation::Global(handler) => handler.handle_global_query(context),
      Invocation::Empty(handler) => handler.handle_empty_query(context).map(|mut items| {
        for item in &mut items {
          item.score = 0.0;
        }
        items
      }),
    }
  }
}

impl QueryEngine {
  /// Creates a new `QueryEngineBuilder` observing `registry`.
  pub fn builder(registry: Arc<ExtensionRegistry>) -> QueryEngineBuilder {
    QueryEngineBuilder::new(registry)
  }

  /// Starts a query for `input`, invalidating the previous one.
  ///
  /// Returns immediately; the query runs on a coordinator thread. Observe the
  /// returned handle for results.
  pub fn run_query(&self, input: &str) -> QueryHandle {
    let id = self.inner.next_query_id.fetch_add(1, Ordering::Relaxed);
    let (plan, trigger, synopsis) = self.inner.plan(input);
    let string = &input[trigger.len()..];

    let state = Arc::new(QueryState::new(id, &trigger, string, synopsis));
    let handle = QueryHandle::new(Arc::clone(&state));

    if let Some(previous) = self.inner.current.lock().replace(handle.clone()) {
      previous.cancel();
    }

    let inner = Arc::clone(&self.inner);
    let spawned = std::thread::Builder::new()
      .name(format!("quarry-query-{id}"))
      .spawn(move || inner.execute(plan, &state));
    if let Err(err) = spawned {
      error!(query_id = id, error = %err, "Failed to spawn query coordinator");
      handle.state_arc().finish();
    }
    handle
  }

  /// The most recently started query.
  pub fn current_query(&self) -> Option<QueryHandle> {
    self.inner.current.lock().clone()
  }

  /// Runs an action of a published result and records the activation.
  ///
  /// # Errors
  ///
  /// Fails if there is no such result or action. A failure to record the
  /// activation is returned after the action already ran.
  pub fn activate(&self, query: &QueryHandle, result: usize, action: usize) -> Result<(), EngineError> {
    let result = query.result(result).ok_or(EngineError::NoSuchResult(result))?;
    self.run_action(query, &result, action)
  }

  /// Runs an action of a fallback and records the activation.
  pub fn activate_fallback(&self, query: &QueryHandle, fallback: usize, action: usize) -> Result<(), EngineError> {
    let result = query.fallback(fallback).ok_or(EngineError::NoSuchResult(fallback))?;
    self.run_action(query, &result, action)
  }

  fn run_action(&self, query: &QueryHandle, result: &QueryResult, action: usize) -> Result<(), EngineError> {
    let item = &result.item;
    let action = item.actions.get(action).ok_or_else(|| EngineError::NoSuchAction {
      item: item.id.clone(),
      action,
    })?;

    action.activate();
    info!(extension = %result.extension_id, item = %item.id, action = %action.id, "Activated item");

    self
      .inner
      .usage
      .record_activation(&query.input(), &result.extension_id, &item.id, &action.id)
      .map_err(|err| {
        warn!(error = %err, "Failed to record activation");
        EngineError::from(err)
      })
  }

  pub fn usage(&self) -> &Arc<UsageHistory> {
    &self.inner.usage
  }

  pub fn registry(&self) -> &Arc<ExtensionRegistry> {
    &self.registry
  }

  /// A snapshot of the configuration including runtime changes.
  pub fn config(&self) -> EngineConfig {
    self.inner.config.read().clone()
  }

  /// Active triggers mapped to their extension ids.
  pub fn active_triggers(&self) -> BTreeMap<String, String> {
    self.inner.handlers.read().triggers.clone()
  }

  /// Sets the trigger of an extension.
  ///
  /// `None`, an empty trigger or the default trigger resets to the default.
  /// Returns `false` if the extension has no trigger handler or its handler
  /// does not allow remapping.
  pub fn set_trigger(&self, extension_id: &str, trigger: Option<&str>) -> bool {
    let mut config = self.inner.config.write();
    let mut handlers = self.inner.handlers.write();
    let Some(extension) = handlers.extensions.get(extension_id) else {
      return false;
    };
    let Some(handler) = extension.trigger_handler() else {
      return false;
    };
    if !handler.allow_trigger_remap() {
      return false;
    }

    let default = extension.default_trigger();
    let trigger = trigger
      .filter(|t| !t.is_empty() && Some(*t) != default.as_deref())
      .map(str::to_string);
    config.update_handler(extension_id, |h| h.trigger = trigger);
    handlers.rebuild_triggers(&config);
    true
  }

  /// Includes or excludes a global handler from untriggered queries.
  pub fn set_enabled(&self, extension_id: &str, enabled: bool) -> bool {
    let mut config = self.inner.config.write();
    let handlers = self.inner.handlers.read();
    if !handlers
      .extensions
      .get(extension_id)
      .is_some_and(|e| e.global_handler().is_some())
    {
      return false;
    }
    config.update_handler(extension_id, |h| h.enabled = enabled);
    true
  }

  /// Switches error tolerant matching for a handler supporting it.
  pub fn set_fuzzy(&self, extension_id: &str, fuzzy: bool) -> bool {
    let handler = {
      let handlers = self.inner.handlers.read();
      match handlers.extensions.get(extension_id).and_then(Extension::trigger_handler) {
        Some(handler) if handler.supports_fuzzy_matching() => Arc::clone(handler),
        _ => return false,
      }
    };
    handler.set_fuzzy_matching(fuzzy);
    self
      .inner
      .config
      .write()
      .update_handler(extension_id, |h| h.fuzzy = Some(fuzzy));
    true
  }

  pub fn set_memory_decay(&self, decay: f64) -> Result<(), EngineError> {
    self.inner.usage.set_memory_decay(decay)?;
    self.inner.config.write().memory_decay = decay;
    Ok(())
  }

  pub fn set_prioritize_perfect_match(&self, prioritize: bool) {
    self.inner.usage.set_prioritize_perfect_match(prioritize);
    self.inner.config.write().prioritize_perfect_match = prioritize;
  }

  /// Sets the fallback ranking, highest ranked first.
  pub fn set_fallback_order(&self, order: Vec<FallbackKey>) {
    self.inner.config.write().fallback_order = order;
  }
}

impl Drop for QueryEngine {
  fn drop(&mut self) {
    self.registry.unsubscribe(self.subscription);
    if let Some(query) = self.inner.current.lock().take() {
      query.cancel();
    }
  }
}

impl EngineInner {
  fn on_registry_event(&self, event: &RegistryEvent) {
    let config = self.config.read();
    let mut handlers = self.handlers.write();
    match event {
      RegistryEvent::Added(extension) => {
        if let (Some(handler), Some(fuzzy)) = (extension.trigger_handler(), config.handler(extension.id()).fuzzy) {
          if handler.supports_fuzzy_matching() {
            handler.set_fuzzy_matching(fuzzy);
          }
        }
        handlers
          .extensions
          .insert(extension.id().to_string(), extension.clone());
      }
      RegistryEvent::Removed(extension) => {
        handlers.extensions.remove(extension.id());
      }
    }
    handlers.rebuild_triggers(&config);
    debug!(handlers = handlers.extensions.len(), triggers = handlers.triggers.len(), "Handler set updated");
  }

  /// Selects the handlers for `input`. Returns the plan, the matched trigger
  /// and the synopsis.
  fn plan(&self, input: &str) -> (QueryPlan, String, String) {
    let config = self.config.read();
    let handlers = self.handlers.read();

    let fallbacks = if input.is_empty() {
      Vec::new()
    } else {
      handlers
        .extensions
        .values()
        .filter_map(|e| e.fallback_provider().map(|p| (Arc::from(e.id()), Arc::clone(p))))
        .collect()
    };

    let triggered = handlers
      .dispatch(input)
      .and_then(|(trigger, e)| e.trigger_handler().map(|h| (trigger.to_string(), e.id(), Arc::clone(h))));

    let (work, trigger, synopsis) = match triggered {
      Some((trigger, id, handler)) => {
        let synopsis = handler.synopsis(&input[trigger.len()..]);
        (Work::Triggered((Arc::from(id), handler)), trigger, synopsis)
      }
      None => {
        let (fast, long_running): (Vec<GlobalEntry>, Vec<GlobalEntry>) = handlers
          .extensions
          .values()
          .filter(|e| config.handler(e.id()).enabled)
          .filter_map(|e| e.global_handler().map(|h| (Arc::from(e.id()), Arc::clone(h))))
          .partition(|(_, h): &GlobalEntry| h.execution() == Execution::Fast);
        let work = Work::Global {
          fast,
          long_running,
          empty: input.is_empty(),
        };
        (work, String::new(), String::new())
      }
    };

    let plan = QueryPlan {
      work,
      fallbacks,
      fallback_order: config.fallback_order.clone(),
      flush_interval: config.flush_interval(),
      channel_capacity: config.channel_capacity,
    };
    (plan, trigger, synopsis)
  }

  #[instrument(name = "query", skip_all, fields(query_id = query.id(), trigger = %query.trigger_arc()))]
  fn execute(&self, plan: QueryPlan, query: &Arc<QueryState>) {
    let started = Instant::now();
    query.set_running();
    query.set_fallbacks(self.collect_fallbacks(&plan, query));

    match plan.work {
      Work::Triggered((id, handler)) => {
        self.long_running_phase(
          vec![(id, Invocation::Trigger(handler))],
          plan.flush_interval,
          plan.channel_capacity,
          query,
        );
      }
      Work::Global {
        fast,
        long_running,
        empty,
      } => {
        let invoke = |handler: Arc<dyn GlobalQueryHandler>| {
          if empty {
            Invocation::Empty(handler)
          } else {
            Invocation::Global(handler)
          }
        };

        let fast: Vec<(Arc<str>, Invocation)> = fast.into_iter().map(|(id, h)| (id, invoke(h))).collect();
        self.fast_phase(fast, query);

        let long_running: Vec<(Arc<str>, Invocation)> =
          long_running.into_iter().map(|(id, h)| (id, invoke(h))).collect();
        if !long_running.is_empty() && query.is_valid() {
          self.long_running_phase(long_running, plan.flush_interval, plan.channel_capacity, query);
        }
      }
    }

    query.finish();
    debug!(elapsed_ms = started.elapsed().as_millis() as u64, valid = query.is_valid(), "Query finished");
  }

  fn fast_phase(&self, handlers: Vec<(Arc<str>, Invocation)>, query: &Arc<QueryState>) {
    if handlers.is_empty() {
      return;
    }

    let scoring = self.usage.scoring();
    let mut results: Vec<QueryResult> = self.pool.install(|| {
      handlers
        .par_iter()
        .flat_map_iter(|(id, invocation)| {
          let context = QueryContext::buffered(
            Arc::clone(id),
            query.trigger_arc(),
            query.string_arc(),
            query.valid_flag(),
          );
          let (items, runtime) = run_handler(id, invocation, &context, Execution::Fast);
          let (results, scoring_time) = score(id, items, &scoring);
          query.record(HandlerRuntime {
            scoring: scoring_time,
            ..runtime
          });
          results
        })
        .collect()
    });

    sort_results(&mut results);
    query.publish(results);
  }

  fn long_running_phase(
    &self,
    handlers: Vec<(Arc<str>, Invocation)>,
    flush_interval: Duration,
    channel_capacity: usize,
    query: &Arc<QueryState>,
  ) {
    let (sender, receiver) = mpsc::sync_channel::<Batch>(channel_capacity);

    for (id, invocation) in handlers {
      let sender = sender.clone();
      let query = Arc::clone(query);
      self.pool.spawn(move || {
        let context = QueryContext::streaming(
          Arc::clone(&id),
          query.trigger_arc(),
          query.string_arc(),
          query.valid_flag(),
          sender,
        );
        let (items, runtime) = run_handler(&id, &invocation, &context, Execution::LongRunning);
        query.record(runtime);
        context.add(items);
      });
    }
    drop(sender);

    let mut pending: Vec<QueryResult> = Vec::new();
    let mut next_flush = Instant::now() + flush_interval;
    loop {
      if !query.is_valid() {
        break;
      }
      match receiver.recv_timeout(next_flush.saturating_duration_since(Instant::now())) {
        Ok(batch) => {
          let scoring = self.usage.scoring();
          let mut items = batch.items;
          retain_well_formed(&batch.extension_id, &mut items);
          let (results, elapsed) = score(&batch.extension_id, items, &scoring);
          query.add_scoring_time(&batch.extension_id, elapsed);
          pending.extend(results);
          if Instant::now() >= next_flush {
            flush(&mut pending, query);
            next_flush = Instant::now() + flush_interval;
          }
        }
        Err(RecvTimeoutError::Timeout) => {
          flush(&mut pending, query);
          next_flush = Instant::now() + flush_interval;
        }
        Err(RecvTimeoutError::Disconnected) => {
          flush(&mut pending, query);
          break;
        }
      }
    }
  }

  fn collect_fallbacks(&self, plan: &QueryPlan, query: &QueryState) -> Vec<QueryResult> {
    let input = format!("{}{}", query.trigger_arc(), query.string_arc());
    let mut fallbacks: Vec<(usize, QueryResult)> = Vec::new();
    for (id, provider) in &plan.fallbacks {
      let items: Vec<SharedItem> = match panic::catch_unwind(AssertUnwindSafe(|| provider.fallbacks(&input))) {
        Ok(items) => items,
        Err(payload) => {
          warn!(extension = %id, panic = %panic_message(&*payload), "Fallback provider panicked");
          continue;
        }
      };
      for item in items {
        if let Err(err) = item.validate() {
          warn!(extension = %id, error = %err, "Dropping malformed fallback");
          continue;
        }
        let rank = fallback_rank(&plan.fallback_order, id, &item.id);
        fallbacks.push((
          rank,
          QueryResult {
            extension_id: id.to_string(),
            item,
            score: rank as f32,
          },
        ));
      }
    }
    fallbacks.sort_by(|a, b| b.0.cmp(&a.0));
    fallbacks.into_iter().map(|(_, result)| result).collect()
  }
}

/// Invokes a handler, containing failures and panics.
fn run_handler(
  id: &str,
  invocation: &Invocation,
  context: &QueryContext,
  execution: Execution,
) -> (Vec<RankItem>, HandlerRuntime) {
  let started = Instant::now();
  let returned = panic::catch_unwind(AssertUnwindSafe(|| invocation.call(context)));
  let handling = started.elapsed();

  let (mut items, outcome) = match returned {
    Ok(Ok(mut items)) => {
      let mut added = context.take_items();
      added.append(&mut items);
      (added, HandlerOutcome::Completed)
    }
    Ok(Err(HandlerError::Cancelled)) => (Vec::new(), HandlerOutcome::Cancelled),
    Ok(Err(HandlerError::Failed(message))) => {
      warn!(extension = %id, error = %message, "Handler failed");
      (Vec::new(), HandlerOutcome::Failed(message))
    }
    Err(payload) => {
      let message = panic_message(&*payload);
      error!(extension = %id, panic = %message, "Handler panicked");
      (Vec::new(), HandlerOutcome::Panicked(message))
    }
  };

  if !context.is_valid() {
    items.clear();
  }
  retain_well_formed(id, &mut items);

  let runtime = HandlerRuntime {
    extension_id: id.to_string(),
    execution,
    handling,
    scoring: Duration::ZERO,
    count: items.len(),
    outcome,
  };
  debug!(
    target: "quarry::query",
    extension = %id,
    handling_us = handling.as_micros() as u64,
    count = runtime.count,
    outcome = ?runtime.outcome,
    "Handler finished"
  );
  (items, runtime)
}

fn score(extension_id: &str, mut items: Vec<RankItem>, scoring: &UsageScoring) -> (Vec<QueryResult>, Duration) {
  let started = Instant::now();
  scoring.apply_all(extension_id, &mut items);
  let results = items
    .into_iter()
    .map(|rank_item| QueryResult {
      extension_id: extension_id.to_string(),
      item: rank_item.item,
      score: rank_item.score,
    })
    .collect();
  (results, started.elapsed())
}

/// Sorts by score descending, ties by text, item id and extension id.
pub(crate) fn sort_results(results: &mut [QueryResult]) {
  results.sort_by(|a, b| {
    b.score
      .partial_cmp(&a.score)
      .unwrap_or(CmpOrdering::Equal)
      .then_with(|| a.item.text.cmp(&b.item.text))
      .then_with(|| a.item.id.cmp(&b.item.id))
      .then_with(|| a.extension_id.cmp(&b.extension_id))
  });
}

fn flush(pending: &mut Vec<QueryResult>, query: &QueryState) {
  if pending.is_empty() {
    return;
  }
  let mut batch = std::mem::take(pending);
  sort_results(&mut batch);
  let count = batch.len();
  if query.publish(batch) {
    debug!(target: "quarry::query", count, "Flushed results");
  }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}

/// A builder for creating a [`QueryEngine`].
pub struct QueryEngineBuilder {
  registry: Arc<ExtensionRegistry>,
  usage: Option<Arc<UsageHistory>>,
  config: EngineConfig,
}

impl QueryEngineBuilder {
  pub fn new(registry: Arc<ExtensionRegistry>) -> Self {
    Self {
      registry,
      usage: None,
      config: EngineConfig::default(),
    }
  }

  /// Sets the usage history. Defaults to a volatile one.
  pub fn usage(mut self, usage: Arc<UsageHistory>) -> Self {
    self.usage = Some(usage);
    self
  }

  pub fn config(mut self, config: EngineConfig) -> Self {
    self.config = config;
    self
  }

  /// Builds the engine and subscribes it to the registry.
  ///
  /// The configured memory decay, perfect match setting and history
  /// retention are applied to the usage history.
  ///
  /// # Errors
  ///
  /// Fails on an invalid configuration or if the worker pool cannot start.
  pub fn build(self) -> Result<QueryEngine, EngineError> {
    self.config.validate()?;

    let usage = self.usage.unwrap_or_else(|| Arc::new(UsageHistory::in_memory()));
    if usage.memory_decay() != self.config.memory_decay {
      usage.set_memory_decay(self.config.memory_decay)?;
    }
    usage.set_prioritize_perfect_match(self.config.prioritize_perfect_match);
    if usage.retention() != self.config.retention() {
      usage.set_retention(self.config.retention())?;
    }

    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(self.config.worker_threads)
      .thread_name(|i| format!("quarry-worker-{i}"))
      .build()
      .map_err(|err| EngineError::WorkerPool(err.to_string()))?;

    let inner = Arc::new(EngineInner {
      pool,
      usage,
      config: RwLock::new(self.config),
      handlers: RwLock::new(HandlerTable::default()),
      current: Mutex::new(None),
      next_query_id: AtomicU64::new(1),
    });

    let weak: Weak<EngineInner> = Arc::downgrade(&inner);
    let subscription = self.registry.subscribe(move |event| {
      if let Some(inner) = weak.upgrade() {
        inner.on_registry_event(event);
      }
    });
    for extension in self.registry.all() {
      inner.on_registry_event(&RegistryEvent::Added(extension));
    }

    info!(
      extensions = inner.handlers.read().extensions.len(),
      threads = inner.pool.current_num_threads(),
      "Query engine started"
    );

    Ok(QueryEngine {
      inner,
      registry: self.registry,
      subscription,
    })
  }
}
