use quarry::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn apps() -> Extension {
  let handler = IndexQueryHandler::new(
    || {
      let item = |id: &str, text: &str| {
        Item::builder(id, text)
          .action(Action::new("open", "Open", || {}))
          .shared()
      };
      Ok(vec![
        IndexItem::new(item("firefox", "Firefox"), "Firefox"),
        IndexItem::new(item("files", "Files"), "Files"),
      ])
    },
    IndexConfig::default(),
  )
  .with_trigger("a ");
  handler.update_index_items().unwrap();
  let handler = Arc::new(handler);
  Extension::builder("apps")
    .trigger(handler.clone())
    .global(handler)
    .build()
}

fn engine(usage: Arc<UsageHistory>, config: EngineConfig) -> QueryEngine {
  let registry = Arc::new(ExtensionRegistry::new());
  registry.register(apps());
  QueryEngine::builder(registry)
    .usage(usage)
    .config(config)
    .build()
    .unwrap()
}

fn first_id(engine: &QueryEngine, input: &str) -> String {
  let query = engine.run_query(input);
  assert!(query.wait_finished(Duration::from_secs(10)));
  query.results()[0].item.id.clone()
}

#[test]
fn test_usage_survives_restart() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("activations.jsonl");

  {
    let usage = Arc::new(UsageHistory::open(&path, UsageSettings::default()).unwrap());
    let engine = engine(usage, EngineConfig::default());
    // "Files" is shorter and wins before any activation
    assert_eq!(first_id(&engine, "fi"), "files");

    let query = engine.run_query("fi");
    assert!(query.wait_finished(Duration::from_secs(10)));
    engine.activate(&query, 1, 0).unwrap();
    assert_eq!(first_id(&engine, "fi"), "firefox");
  }

  let usage = Arc::new(UsageHistory::open(&path, UsageSettings::default()).unwrap());
  assert_eq!(usage.input_history().unwrap(), vec!["fi"]);
  let engine = engine(usage, EngineConfig::default());
  assert_eq!(first_id(&engine, "fi"), "firefox");
}

#[test]
fn test_runtime_settings_round_trip() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("quarry.toml");

  let engine = engine(Arc::new(UsageHistory::in_memory()), EngineConfig::load(&path).unwrap());
  assert!(engine.set_trigger("apps", Some("app ")));
  assert!(engine.set_enabled("apps", false));
  engine.set_memory_decay(0.8).unwrap();
  engine.set_prioritize_perfect_match(false);
  engine.set_fallback_order(vec![FallbackKey::new("web", "google")]);
  assert!(matches!(engine.set_memory_decay(1.5), Err(EngineError::Usage(_))));
  engine.config().save(&path).unwrap();

  let loaded = EngineConfig::load(&path).unwrap();
  assert_eq!(loaded, engine.config());
  assert_eq!(loaded.memory_decay, 0.8);
  assert!(!loaded.prioritize_perfect_match);

  let restored = engine_with_config(loaded);
  assert_eq!(restored.active_triggers().get("app ").map(String::as_str), Some("apps"));
  assert_eq!(restored.usage().memory_decay(), 0.8);
  assert!(!restored.usage().prioritize_perfect_match());
}

fn engine_with_config(config: EngineConfig) -> QueryEngine {
  engine(Arc::new(UsageHistory::in_memory()), config)
}

#[test]
fn test_invalid_config_is_rejected_by_builder() {
  let registry = Arc::new(ExtensionRegistry::new());
  let config = EngineConfig {
    channel_capacity: 0,
    ..Default::default()
  };
  assert!(matches!(
    QueryEngine::builder(registry).config(config).build(),
    Err(EngineError::Config(_))
  ));
}

#[test]
fn test_engine_applies_history_settings() {
  let usage = Arc::new(UsageHistory::in_memory());
  let config = EngineConfig {
    memory_decay: 0.25,
    prioritize_perfect_match: false,
    history_retention_days: 7,
    ..Default::default()
  };
  let retention = config.retention();
  let _engine = engine(Arc::clone(&usage), config);

  assert_eq!(usage.memory_decay(), 0.25);
  assert!(!usage.prioritize_perfect_match());
  assert_eq!(usage.retention(), retention);
}
