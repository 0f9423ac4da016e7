//! Context provided to handlers while they answer a query.

use crate::types::{RankItem, Score, SharedItem};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use tracing::warn;

/// Results sent from a long-running handler to the query coordinator.
#[derive(Debug)]
pub(crate) struct Batch {
  pub extension_id: Arc<str>,
  pub items: Vec<RankItem>,
}

#[derive(Debug)]
enum Sink {
  Buffer(Mutex<Vec<RankItem>>),
  Channel(SyncSender<Batch>),
}

/// The view of a running query handed to a handler.
///
/// Handlers read the input through [`string`](Self::string) and should poll
/// [`is_valid`](Self::is_valid) before expensive work. Besides returning
/// items, a handler may stream them with [`add`](Self::add); in the
/// long-running phase streamed items are published on the next flush.
#[derive(Debug)]
pub struct QueryContext {
  extension_id: Arc<str>,
  trigger: Arc<str>,
  string: Arc<str>,
  valid: Arc<AtomicBool>,
  sink: Sink,
}

impl QueryContext {
  /// Creates a standalone context that is always valid and buffers added
  /// items. Useful to drive handlers outside an engine.
  pub fn new(string: impl Into<String>) -> Self {
    Self {
      extension_id: Arc::from(""),
      trigger: Arc::from(""),
      string: Arc::from(string.into()),
      valid: Arc::new(AtomicBool::new(true)),
      sink: Sink::Buffer(Mutex::new(Vec::new())),
    }
  }

  pub(crate) fn buffered(
    extension_id: Arc<str>,
    trigger: Arc<str>,
    string: Arc<str>,
    valid: Arc<AtomicBool>,
  ) -> Self {
    Self {
      extension_id,
      trigger,
      string,
      valid,
      sink: Sink::Buffer(Mutex::new(Vec::new())),
    }
  }

  pub(crate) fn streaming(
    extension_id: Arc<str>,
    trigger: Arc<str>,
    string: Arc<str>,
    valid: Arc<AtomicBool>,
    sender: SyncSender<Batch>,
  ) -> Self {
    Self {
      extension_id,
      trigger,
      string,
      valid,
      sink: Sink::Channel(sender),
    }
  }

  /// The input, without the trigger for triggered queries.
  pub fn string(&self) -> &str {
    &self.string
  }

  /// The trigger that selected the handler, empty for global queries.
  pub fn trigger(&self) -> &str {
    &self.trigger
  }

  /// Returns `false` once the query was cancelled or superseded.
  pub fn is_valid(&self) -> bool {
    self.valid.load(Ordering::Acquire)
  }

  /// Adds scored items to the query.
  ///
  /// Returns `false` if the query is no longer valid and the items were
  /// dropped. May block while the coordinator is behind.
  pub fn add(&self, items: Vec<RankItem>) -> bool {
    if !self.is_valid() {
      return false;
    }
    if items.is_empty() {
      return true;
    }
    match &self.sink {
      Sink::Buffer(buffer) => {
        buffer.lock().extend(items);
        true
      }
      Sink::Channel(sender) => sender
        .send(Batch {
          extension_id: Arc::clone(&self.extension_id),
          items,
        })
        .is_ok(),
    }
  }

  /// Adds a single item.
  pub fn add_item(&self, item: SharedItem, score: Score) -> bool {
    self.add(vec![RankItem::new(item, score)])
  }

  /// Takes everything [`add`](Self::add)ed so far.
  ///
  /// Only buffering contexts retain items; for a streaming context this is
  /// always empty.
  pub fn take_items(&self) -> Vec<RankItem> {
    match &self.sink {
      Sink::Buffer(buffer) => std::mem::take(&mut *buffer.lock()),
      Sink::Channel(_) => Vec::new(),
    }
  }
}

/// Drops items violating the item contract, logging each one.
pub(crate) fn retain_well_formed(extension_id: &str, items: &mut Vec<RankItem>) {
  items.retain(|rank_item| match rank_item.item.validate() {
    Ok(()) => true,
    Err(err) => {
      warn!(extension = %extension_id, error = %err, "Dropping malformed item");
      false
    }
  });
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Item;
  use std::sync::mpsc::sync_channel;

  #[test]
  fn test_buffered_add() {
    let context = QueryContext::new("term");
    assert_eq!(context.string(), "term");
    assert!(context.add_item(Item::builder("a", "Alpha").shared(), 0.5));
    assert_eq!(context.take_items().len(), 1);
    assert!(context.take_items().is_empty());
  }

  #[test]
  fn test_invalid_context_drops_items() {
    let valid = Arc::new(AtomicBool::new(true));
    let context = QueryContext::buffered(Arc::from("x"), Arc::from(""), Arc::from("q"), Arc::clone(&valid));
    valid.store(false, Ordering::Release);
    assert!(!context.add_item(Item::builder("a", "Alpha").shared(), 0.5));
    assert!(context.take_items().is_empty());
  }

  #[test]
  fn test_streaming_add_reports_closed_channel() {
    let (sender, receiver) = sync_channel(4);
    let valid = Arc::new(AtomicBool::new(true));
    let context = QueryContext::streaming(Arc::from("x"), Arc::from(""), Arc::from("q"), valid, sender);

    assert!(context.add_item(Item::builder("a", "Alpha").shared(), 0.5));
    let batch = receiver.recv().unwrap();
    assert_eq!(&*batch.extension_id, "x");
    assert_eq!(batch.items.len(), 1);

    drop(receiver);
    assert!(!context.add_item(Item::builder("b", "Beta").shared(), 0.5));
  }

  #[test]
  fn test_retain_well_formed() {
    let mut items = vec![
      RankItem::new(Item::builder("a", "Alpha").shared(), 1.0),
      RankItem::new(Item::builder("", "Nameless").shared(), 1.0),
    ];
    retain_well_formed("x", &mut items);
    assert_eq!(items.len(), 1);
  }
}
