//! Exact prefix matching over an inverted word index.

use crate::error::IndexError;
use crate::index::adapter::IndexAdapter;
use crate::index::tokenizer::{prefix_query_words, split_words};
use crate::index::{intersect, IndexMatch, Slot};
use crate::types::{IndexItem, SharedItem};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// An inverted index mapping every indexed word to the items containing it.
///
/// Keys are kept in a sorted map so all words starting with a query word form
/// one contiguous range.
#[derive(Debug, Default)]
pub struct PrefixIndex {
  pub(crate) items: Vec<SharedItem>,
  pub(crate) inverted: BTreeMap<String, BTreeSet<Slot>>,
}

impl PrefixIndex {
  /// Builds the inverted index.
  ///
  /// Index items referring to the same item id share one slot, so aliases of
  /// an item never produce duplicate results.
  ///
  /// # Errors
  ///
  /// Returns [`IndexError::MalformedItem`] if any item has an empty id or text.
  pub fn build(index_items: &[IndexItem]) -> Result<Self, IndexError> {
    let mut items = Vec::new();
    let mut slots: HashMap<&str, Slot> = HashMap::new();
    let mut inverted: BTreeMap<String, BTreeSet<Slot>> = BTreeMap::new();

    for index_item in index_items {
      index_item.item.validate()?;

      let slot = *slots.entry(index_item.item.id.as_str()).or_insert_with(|| {
        items.push(index_item.item.clone());
        items.len() - 1
      });

      for word in split_words(&index_item.string) {
        inverted.entry(word).or_default().insert(slot);
      }
    }

    Ok(Self { items, inverted })
  }

  /// Unites the slots of all words starting with `word`.
  pub(crate) fn prefix_slots(&self, word: &str) -> HashMap<Slot, u32> {
    let mut slots = HashMap::new();
    for (_, word_slots) in self
      .inverted
      .range::<str, _>((std::ops::Bound::Included(word), std::ops::Bound::Unbounded))
      .take_while(|(key, _)| key.starts_with(word))
    {
      for slot in word_slots {
        slots.insert(*slot, 1);
      }
    }
    slots
  }

  pub(crate) fn resolve(&self, matches: Vec<(Slot, u32)>) -> Vec<IndexMatch> {
    matches
      .into_iter()
      .map(|(slot, strength)| IndexMatch {
        item: self.items[slot].clone(),
        strength,
      })
      .collect()
  }
}

impl IndexAdapter for PrefixIndex {
  fn search(&self, query: &str) -> Vec<IndexMatch> {
    let words = prefix_query_words(query);
    if words.is_empty() {
      return Vec::new();
    }

    let per_word: Vec<HashMap<Slot, u32>> =
      words.iter().map(|word| self.prefix_slots(word)).collect();

    self.resolve(intersect(per_word))
  }

  fn item_count(&self) -> usize {
    self.items.len()
  }

  fn word_count(&self) -> usize {
    self.inverted.len()
  }
}
