//! A line based launcher: every input line is a query, `:N` activates the
//! N-th result of the previous query.
//!
//! ```sh
//! RUST_LOG=quarry=debug cargo run --example launcher
//! ```

use quarry::prelude::*;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

const APPS: &[(&str, &str, &[&str])] = &[
  ("firefox", "Firefox", &["web browser", "internet"]),
  ("terminal", "Terminal", &["console", "shell"]),
  ("editor", "Text Editor", &["notes", "gedit"]),
  ("files", "Files", &["file manager", "nautilus"]),
  ("settings", "Settings", &["preferences", "control center"]),
];

fn app_items() -> Result<Vec<IndexItem>, IndexError> {
  let mut items = Vec::new();
  for (id, name, keywords) in APPS {
    let app = Item::builder(*id, *name)
      .subtext(format!("Launch {name}"))
      .icon(format!("xdg:{id}"))
      .action(Action::new("launch", "Launch", move || println!("  -> launching {id}")))
      .shared();
    items.push(IndexItem::new(app.clone(), *name));
    for keyword in keywords.iter() {
      items.push(IndexItem::new(app.clone(), *keyword));
    }
  }
  Ok(items)
}

struct Calculator;

impl TriggerQueryHandler for Calculator {
  fn default_trigger(&self) -> Option<String> {
    Some("=".into())
  }

  fn allow_trigger_remap(&self) -> bool {
    false
  }

  fn synopsis(&self, _query: &str) -> String {
    "<a> <+|-|*|/> <b>".into()
  }

  fn handle_trigger_query(&self, context: &QueryContext) -> HandlerResult {
    let parts: Vec<&str> = context.string().split_whitespace().collect();
    let [a, op, b] = parts.as_slice() else {
      return Ok(Vec::new());
    };
    let (Ok(a), Ok(b)) = (a.parse::<f64>(), b.parse::<f64>()) else {
      return Err(HandlerError::failed("operands must be numbers"));
    };
    let value = match *op {
      "+" => a + b,
      "-" => a - b,
      "*" => a * b,
      "/" => a / b,
      _ => return Ok(Vec::new()),
    };
    let item = Item::builder("result", value.to_string())
      .subtext(context.string())
      .action(Action::new("print", "Print", move || println!("  -> {value}")))
      .shared();
    Ok(vec![RankItem::new(item, 1.0)])
  }
}

struct WebSearch;

impl FallbackProvider for WebSearch {
  fn fallbacks(&self, query: &str) -> Vec<SharedItem> {
    let query = query.to_string();
    vec![Item::builder("search", format!("Search the web for '{query}'"))
      .action(Action::new("open", "Open", move || println!("  -> searching for {query}")))
      .shared()]
  }
}

fn start_engine(config: EngineConfig, usage: UsageHistory) -> quarry::Result<QueryEngine> {
  let apps = IndexQueryHandler::new(app_items, config.index.clone())
    .with_trigger("a ")
    .with_synopsis("<application>");
  apps.update_index_items()?;
  let apps = Arc::new(apps);

  let registry = Arc::new(ExtensionRegistry::new());
  registry.register(
    Extension::builder("apps")
      .name("Applications")
      .trigger(apps.clone())
      .global(apps)
      .build(),
  );
  registry.register(Extension::builder("calc").trigger(Arc::new(Calculator)).build());
  registry.register(Extension::builder("websearch").fallback(Arc::new(WebSearch)).build());

  Ok(QueryEngine::builder(registry).usage(Arc::new(usage)).config(config).build()?)
}

fn main() {
  quarry::logging::init("quarry=info");

  let config = match std::env::var("QUARRY_CONFIG") {
    Ok(path) => EngineConfig::load(path).unwrap_or_else(|err| {
      eprintln!("ignoring config: {err}");
      EngineConfig::default()
    }),
    Err(_) => EngineConfig::default(),
  };

  let settings = UsageSettings {
    memory_decay: config.memory_decay,
    prioritize_perfect_match: config.prioritize_perfect_match,
    retention: config.retention(),
  };
  let history_path = std::env::temp_dir().join("quarry-demo").join("activations.jsonl");
  let usage = UsageHistory::open(&history_path, settings).unwrap_or_else(|err| {
    eprintln!("usage history unavailable, ranking without it: {err}");
    UsageHistory::in_memory()
  });

  let engine = match start_engine(config, usage) {
    Ok(engine) => engine,
    Err(err) => {
      eprintln!("failed to start engine: {err}");
      return;
    }
  };

  let stdin = io::stdin();
  let mut last: Option<QueryHandle> = None;
  print!("> ");
  let _ = io::stdout().flush();
  for line in stdin.lock().lines() {
    let Ok(line) = line else { break };

    if let Some(index) = line.strip_prefix(':').and_then(|n| n.trim().parse::<usize>().ok()) {
      match &last {
        Some(query) => {
          if let Err(err) = engine.activate(query, index, 0) {
            eprintln!("{err}");
          }
        }
        None => eprintln!("no query yet"),
      }
    } else {
      let query = engine.run_query(&line);
      query.wait_finished(Duration::from_secs(2));
      if !query.synopsis().is_empty() {
        println!("  {}{}", query.trigger(), query.synopsis());
      }
      for (i, result) in query.results().iter().enumerate() {
        println!("  {i:>2}. [{:>6.3}] {} ({})", result.score, result.item.text, result.extension_id);
      }
      last = Some(query);
    }

    print!("> ");
    let _ = io::stdout().flush();
  }
}
