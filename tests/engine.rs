use quarry::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(10);

fn item(id: &str, text: &str) -> SharedItem {
  Item::builder(id, text)
    .action(Action::new("open", "Open", || {}))
    .shared()
}

fn apps(config: IndexConfig) -> Arc<IndexQueryHandler> {
  let handler = IndexQueryHandler::new(
    || {
      Ok(vec![
        IndexItem::new(item("a1", "open terminal"), "open terminal"),
        IndexItem::new(item("a2", "open text editor"), "open text editor"),
      ])
    },
    config,
  )
  .with_trigger("a ");
  handler.update_index_items().unwrap();
  Arc::new(handler)
}

fn apps_extension(config: IndexConfig) -> Extension {
  let handler = apps(config);
  Extension::builder("apps")
    .name("Applications")
    .trigger(handler.clone())
    .global(handler)
    .build()
}

fn engine_with(extensions: Vec<Extension>) -> QueryEngine {
  let registry = Arc::new(ExtensionRegistry::new());
  for extension in extensions {
    assert!(registry.register(extension));
  }
  let config = EngineConfig {
    flush_interval_ms: 10,
    worker_threads: 2,
    ..Default::default()
  };
  QueryEngine::builder(registry).config(config).build().unwrap()
}

fn run(engine: &QueryEngine, input: &str) -> QueryHandle {
  let query = engine.run_query(input);
  assert!(query.wait_finished(WAIT), "query '{input}' did not finish");
  query
}

fn ids(query: &QueryHandle) -> Vec<String> {
  query.results().iter().map(|r| r.item.id.clone()).collect()
}

/// Scores every match with the same raw score.
struct Flat {
  index: Index,
}

impl GlobalQueryHandler for Flat {
  fn handle_global_query(&self, context: &QueryContext) -> HandlerResult {
    Ok(
      self
        .index
        .search_items(context.string())
        .into_iter()
        .map(|item| RankItem::new(item, 0.5))
        .collect(),
    )
  }
}

struct Panicking;

impl GlobalQueryHandler for Panicking {
  fn handle_global_query(&self, _context: &QueryContext) -> HandlerResult {
    panic!("handler exploded")
  }
}

struct Failing;

impl GlobalQueryHandler for Failing {
  fn handle_global_query(&self, _context: &QueryContext) -> HandlerResult {
    Err(HandlerError::failed("backend unavailable"))
  }
}

#[test]
fn test_prefix_and_fuzzy_scenario() {
  let engine = engine_with(vec![apps_extension(IndexConfig::default())]);
  assert_eq!(ids(&run(&engine, "term")), vec!["a1"]);
  assert!(ids(&run(&engine, "opn")).is_empty());

  let fuzzy = engine_with(vec![apps_extension(
    IndexConfig::default().fuzzy(true).error_tolerance(1.0),
  )]);
  let mut found = ids(&run(&fuzzy, "opn"));
  found.sort();
  assert_eq!(found, vec!["a1", "a2"]);
}

#[test]
fn test_activation_promotes_item() {
  let index = Index::default();
  index
    .rebuild(vec![
      IndexItem::new(item("a1", "open terminal"), "open terminal"),
      IndexItem::new(item("a2", "open text editor"), "open text editor"),
    ])
    .unwrap();
  let engine = engine_with(vec![Extension::builder("apps")
    .global(Arc::new(Flat { index }))
    .build()]);

  // equal raw scores, ties broken by text
  let query = run(&engine, "open");
  assert_eq!(ids(&query), vec!["a1", "a2"]);

  engine.activate(&query, 1, 0).unwrap();
  assert!(engine.usage().score_of("apps", "a2").is_some());
  assert_eq!(ids(&run(&engine, "open")), vec!["a2", "a1"]);

  let query = run(&engine, "open");
  engine.activate(&query, 1, 0).unwrap();
  assert_eq!(ids(&run(&engine, "open")), vec!["a1", "a2"]);
}

#[test]
fn test_failing_handlers_are_isolated() {
  let engine = engine_with(vec![
    apps_extension(IndexConfig::default()),
    Extension::builder("boom").global(Arc::new(Panicking)).build(),
    Extension::builder("broken").global(Arc::new(Failing)).build(),
  ]);

  let query = run(&engine, "term");
  assert_eq!(query.state(), QueryStatus::Finished);
  assert_eq!(ids(&query), vec!["a1"]);

  let outcomes: Vec<(String, HandlerOutcome)> = query
    .diagnostics()
    .into_iter()
    .map(|runtime| (runtime.extension_id, runtime.outcome))
    .collect();
  assert_eq!(outcomes[0], ("apps".to_string(), HandlerOutcome::Completed));
  assert!(matches!(&outcomes[1], (id, HandlerOutcome::Panicked(message)) if id == "boom" && message.contains("exploded")));
  assert_eq!(
    outcomes[2],
    ("broken".to_string(), HandlerOutcome::Failed("backend unavailable".into()))
  );
}

struct Calculator;

impl TriggerQueryHandler for Calculator {
  fn default_trigger(&self) -> Option<String> {
    Some("=".into())
  }

  fn synopsis(&self, _query: &str) -> String {
    "<expression>".into()
  }

  fn handle_trigger_query(&self, context: &QueryContext) -> HandlerResult {
    let text = format!("{} = 2", context.string());
    Ok(vec![RankItem::new(item("result", &text), 1.0)])
  }
}

#[test]
fn test_trigger_dispatch() {
  let engine = engine_with(vec![
    apps_extension(IndexConfig::default()),
    Extension::builder("calc").trigger(Arc::new(Calculator)).build(),
  ]);

  let query = run(&engine, "=1+1");
  assert!(query.is_triggered());
  assert_eq!(query.trigger(), "=");
  assert_eq!(query.string(), "1+1");
  assert_eq!(query.synopsis(), "<expression>");
  assert_eq!(ids(&query), vec!["result"]);
  assert_eq!(query.results()[0].item.text, "1+1 = 2");

  // triggered index handler, empty remainder lists everything
  let query = run(&engine, "a ");
  assert_eq!(query.trigger(), "a ");
  assert_eq!(query.result_count(), 2);

  let query = run(&engine, "a term");
  assert_eq!(ids(&query), vec!["a1"]);
  assert_eq!(query.diagnostics().len(), 1);
}

#[test]
fn test_trigger_remapping() {
  let engine = engine_with(vec![apps_extension(IndexConfig::default())]);
  assert_eq!(engine.active_triggers().get("a ").map(String::as_str), Some("apps"));

  assert!(engine.set_trigger("apps", Some("app:")));
  assert!(engine.active_triggers().contains_key("app:"));
  assert!(!run(&engine, "a term").is_triggered());
  assert_eq!(ids(&run(&engine, "app:term")), vec!["a1"]);
  assert_eq!(engine.config().handler("apps").trigger.as_deref(), Some("app:"));

  assert!(engine.set_trigger("apps", Some("")));
  assert!(engine.active_triggers().contains_key("a "));
  assert!(engine.config().handlers.is_empty());

  assert!(!engine.set_trigger("missing", Some("m ")));
}

#[test]
fn test_disabled_handler_is_skipped() {
  let engine = engine_with(vec![apps_extension(IndexConfig::default())]);
  assert!(engine.set_enabled("apps", false));
  assert!(run(&engine, "term").results().is_empty());
  // triggers keep working
  assert_eq!(ids(&run(&engine, "a term")), vec!["a1"]);

  assert!(engine.set_enabled("apps", true));
  assert_eq!(ids(&run(&engine, "term")), vec!["a1"]);
  assert!(!engine.set_enabled("missing", false));
}

#[test]
fn test_fuzzy_switch() {
  let engine = engine_with(vec![apps_extension(IndexConfig::default().error_tolerance(1.0))]);
  assert!(run(&engine, "termnal").results().is_empty());
  assert!(engine.set_fuzzy("apps", true));
  assert_eq!(ids(&run(&engine, "termnal")), vec!["a1"]);
  assert_eq!(engine.config().handler("apps").fuzzy, Some(true));
  assert!(!engine.set_fuzzy("missing", true));
}

struct Web;

impl FallbackProvider for Web {
  fn fallbacks(&self, query: &str) -> Vec<SharedItem> {
    vec![
      item("google", &format!("Search Google for '{query}'")),
      item("ddg", &format!("Search DuckDuckGo for '{query}'")),
    ]
  }
}

#[test]
fn test_fallbacks_replace_empty_results() {
  let engine = engine_with(vec![
    apps_extension(IndexConfig::default()),
    Extension::builder("web").fallback(Arc::new(Web)).build(),
  ]);
  engine.set_fallback_order(vec![FallbackKey::new("web", "ddg"), FallbackKey::new("web", "google")]);

  let query = run(&engine, "term");
  assert_eq!(ids(&query), vec!["a1"]);
  assert_eq!(query.fallbacks().len(), 2);

  let query = run(&engine, "zzz");
  assert_eq!(ids(&query), vec!["ddg", "google"]);
  assert_eq!(query.results()[1].item.text, "Search Google for 'zzz'");

  engine.activate_fallback(&query, 0, 0).unwrap();
  assert!(engine.usage().score_of("web", "ddg").is_some());
  assert_eq!(engine.usage().input_history().unwrap(), vec!["zzz"]);

  assert!(run(&engine, "").fallbacks().is_empty());
}

#[test]
fn test_activation_errors() {
  let hits = Arc::new(AtomicUsize::new(0));
  let counter = Arc::clone(&hits);
  let index = Index::default();
  index
    .rebuild(vec![IndexItem::new(
      Item::builder("t", "Terminal")
        .action(Action::new("run", "Run", move || {
          counter.fetch_add(1, Ordering::SeqCst);
        }))
        .shared(),
      "Terminal",
    )])
    .unwrap();
  let engine = engine_with(vec![Extension::builder("apps").global(Arc::new(Flat { index })).build()]);

  let query = run(&engine, "term");
  assert!(matches!(engine.activate(&query, 5, 0), Err(EngineError::NoSuchResult(5))));
  assert!(matches!(
    engine.activate(&query, 0, 3),
    Err(EngineError::NoSuchAction { action: 3, .. })
  ));
  assert_eq!(hits.load(Ordering::SeqCst), 0);

  engine.activate(&query, 0, 0).unwrap();
  assert_eq!(hits.load(Ordering::SeqCst), 1);
}

struct Recent;

impl GlobalQueryHandler for Recent {
  fn handle_global_query(&self, _context: &QueryContext) -> HandlerResult {
    Ok(Vec::new())
  }

  fn handle_empty_query(&self, _context: &QueryContext) -> HandlerResult {
    Ok(vec![
      RankItem::new(item("alpha", "Alpha"), 0.7),
      RankItem::new(item("bravo", "Bravo"), 0.7),
    ])
  }
}

#[test]
fn test_empty_query_surfaces_used_items() {
  let engine = engine_with(vec![Extension::builder("recent").global(Arc::new(Recent)).build()]);

  let query = run(&engine, "");
  assert_eq!(ids(&query), vec!["alpha", "bravo"]);
  assert!(query.results().iter().all(|r| r.score < 0.0));

  engine.usage().record_activation("", "recent", "bravo", "open").unwrap();
  let query = run(&engine, "");
  assert_eq!(ids(&query), vec!["bravo", "alpha"]);
  assert_eq!(query.results()[0].score, 1.0);
}

struct Streaming;

impl GlobalQueryHandler for Streaming {
  fn execution(&self) -> Execution {
    Execution::LongRunning
  }

  fn handle_global_query(&self, context: &QueryContext) -> HandlerResult {
    context.add_item(item("first", "First"), 0.9);
    thread::sleep(Duration::from_millis(200));
    Ok(vec![RankItem::new(item("second", "Second"), 0.95)])
  }
}

struct Quick;

impl GlobalQueryHandler for Quick {
  fn handle_global_query(&self, _context: &QueryContext) -> HandlerResult {
    Ok(vec![RankItem::new(item("quick", "Quick"), 0.2)])
  }
}

#[test]
fn test_long_running_results_are_appended() {
  let engine = engine_with(vec![
    Extension::builder("quick").global(Arc::new(Quick)).build(),
    Extension::builder("stream").global(Arc::new(Streaming)).build(),
  ]);

  let query = run(&engine, "anything");
  assert_eq!(ids(&query), vec!["quick", "first", "second"]);

  let diagnostics = query.diagnostics();
  assert_eq!(diagnostics[1].extension_id, "stream");
  assert_eq!(diagnostics[1].execution, Execution::LongRunning);
}

/// Streams one item per released gate and blocks in between.
struct Gated {
  gates: Mutex<mpsc::Receiver<()>>,
}

impl GlobalQueryHandler for Gated {
  fn execution(&self) -> Execution {
    Execution::LongRunning
  }

  fn handle_global_query(&self, context: &QueryContext) -> HandlerResult {
    let gates = self.gates.lock().unwrap();
    gates.recv_timeout(WAIT).map_err(|_| HandlerError::failed("gate timed out"))?;
    context.add_item(item("first", "First"), 0.9);
    gates.recv_timeout(WAIT).map_err(|_| HandlerError::failed("gate timed out"))?;
    Ok(vec![RankItem::new(item("second", "Second"), 0.95)])
  }
}

fn wait_for_count(query: &QueryHandle, count: usize) -> bool {
  let deadline = Instant::now() + WAIT;
  while Instant::now() < deadline {
    if query.result_count() >= count {
      return true;
    }
    thread::sleep(Duration::from_millis(5));
  }
  false
}

#[test]
fn test_streamed_items_are_flushed_while_running() {
  let (release, gates) = mpsc::channel();
  let engine = engine_with(vec![
    Extension::builder("quick").global(Arc::new(Quick)).build(),
    Extension::builder("stream")
      .global(Arc::new(Gated {
        gates: Mutex::new(gates),
      }))
      .build(),
  ]);

  let query = engine.run_query("anything");
  assert!(wait_for_count(&query, 1));
  assert_eq!(ids(&query), vec!["quick"]);
  assert!(!query.is_finished());

  release.send(()).unwrap();
  assert!(wait_for_count(&query, 2));
  assert_eq!(ids(&query), vec!["quick", "first"]);
  assert!(!query.is_finished());

  release.send(()).unwrap();
  assert!(query.wait_finished(WAIT));
  assert_eq!(ids(&query), vec!["quick", "first", "second"]);
}

struct Slow;

impl GlobalQueryHandler for Slow {
  fn handle_global_query(&self, context: &QueryContext) -> HandlerResult {
    thread::sleep(Duration::from_millis(150));
    if !context.is_valid() {
      return Err(HandlerError::Cancelled);
    }
    Ok(vec![RankItem::new(item(context.string(), context.string()), 0.5)])
  }
}

#[test]
fn test_newer_query_supersedes_older() {
  let engine = engine_with(vec![
    Extension::builder("slow").global(Arc::new(Slow)).build(),
    Extension::builder("web").fallback(Arc::new(Web)).build(),
  ]);

  let first = engine.run_query("first");
  let second = engine.run_query("second");
  assert!(!first.is_valid());
  assert!(second.is_valid());
  assert_eq!(engine.current_query().map(|q| q.id()), Some(second.id()));

  assert!(first.wait_finished(WAIT));
  assert!(second.wait_finished(WAIT));
  assert!(first.results().is_empty());
  assert_eq!(ids(&second), vec!["second"]);
  assert_eq!(first.diagnostics()[0].outcome, HandlerOutcome::Cancelled);
}

#[test]
fn test_cancel_finishes_query() {
  let engine = engine_with(vec![Extension::builder("slow").global(Arc::new(Slow)).build()]);
  let query = engine.run_query("late");
  query.cancel();
  assert!(query.wait_finished(WAIT));
  assert!(query.results().is_empty());
}

#[test]
fn test_registry_changes_are_followed() {
  let engine = engine_with(Vec::new());
  assert!(run(&engine, "term").results().is_empty());

  engine.registry().register(apps_extension(IndexConfig::default()));
  assert_eq!(ids(&run(&engine, "term")), vec!["a1"]);

  engine.registry().deregister("apps");
  assert!(run(&engine, "term").results().is_empty());
  assert!(engine.active_triggers().is_empty());
}

#[test]
fn test_malformed_items_are_dropped() {
  struct Sloppy;

  impl GlobalQueryHandler for Sloppy {
    fn handle_global_query(&self, _context: &QueryContext) -> HandlerResult {
      Ok(vec![
        RankItem::new(Item::builder("", "No id").shared(), 0.5),
        RankItem::new(Item::builder("ok", "Fine").shared(), 0.5),
      ])
    }
  }

  let engine = engine_with(vec![Extension::builder("sloppy").global(Arc::new(Sloppy)).build()]);
  let query = run(&engine, "x");
  assert_eq!(ids(&query), vec!["ok"]);
  assert_eq!(query.diagnostics()[0].count, 1);
}
