//! Error tolerant matching backed by a q-gram index.

use crate::error::IndexError;
use crate::index::adapter::IndexAdapter;
use crate::index::levenshtein::prefix_edit_distance;
use crate::index::prefix::PrefixIndex;
use crate::index::tokenizer::{graphemes, qgrams, split_words};
use crate::index::{intersect, IndexMatch, Slot};
use crate::types::IndexItem;
use std::collections::HashMap;

/// A fuzzy index tolerating a bounded number of typing errors per word.
///
/// Each indexed word is decomposed into padded q-grams. A query word collects
/// candidate words through its own q-grams and every candidate is confirmed
/// with a bounded prefix edit distance check.
#[derive(Debug)]
pub struct FuzzyIndex {
  words: PrefixIndex,
  /// q-gram -> (word -> occurrences of the gram in the word)
  qgram_index: HashMap<String, HashMap<String, u32>>,
  gram_size: usize,
  error_tolerance: f64,
}

impl FuzzyIndex {
  /// Builds the word index and the q-gram index on top of it.
  ///
  /// # Arguments
  ///
  /// * `index_items` - The items and lookup strings to index.
  /// * `gram_size` - The q-gram size `q`, at least 1.
  /// * `error_tolerance` - Values below 1 are a fraction of the query word
  ///   length, values of 1 and above an absolute edit distance bound.
  pub fn build(
    index_items: &[IndexItem],
    gram_size: usize,
    error_tolerance: f64,
  ) -> Result<Self, IndexError> {
    let words = PrefixIndex::build(index_items)?;
    let gram_size = gram_size.max(1);

    let mut qgram_index: HashMap<String, HashMap<String, u32>> = HashMap::new();
    for word in words.inverted.keys() {
      for (gram, count) in qgrams(word, gram_size) {
        *qgram_index
          .entry(gram)
          .or_default()
          .entry(word.clone())
          .or_insert(0) += count;
      }
    }

    Ok(Self {
      words,
      qgram_index,
      gram_size,
      error_tolerance: error_tolerance.max(0.0),
    })
  }

  /// The number of edits allowed for a query word of `length` graphemes.
  pub fn allowed_errors(&self, length: usize) -> usize {
    if self.error_tolerance < 1.0 {
      (length as f64 * self.error_tolerance).floor() as usize
    } else {
      self.error_tolerance.floor() as usize
    }
  }

  /// Collects the slots matched by a single query word with their strength.
  fn word_slots(&self, word: &str) -> HashMap<Slot, u32> {
    let query = graphemes(word);
    let delta = self.allowed_errors(query.len());

    // Common q-gram count per candidate word. A candidate can share at most
    // as many occurrences of a gram as the query word has.
    let mut candidates: HashMap<&str, u32> = HashMap::new();
    for (gram, query_count) in qgrams(word, self.gram_size) {
      let Some(indexed) = self.qgram_index.get(&gram) else {
        continue;
      };
      for (indexed_word, indexed_count) in indexed {
        *candidates.entry(indexed_word.as_str()).or_insert(0) += query_count.min(*indexed_count);
      }
    }

    // Every edit destroys at most q grams of the query word.
    let minimum_common = query.len().saturating_sub(delta * self.gram_size);

    let mut slots: HashMap<Slot, u32> = HashMap::new();
    for (candidate, common) in candidates {
      if (common as usize) < minimum_common {
        continue;
      }
      if prefix_edit_distance(&query, &graphemes(candidate), delta).is_none() {
        continue;
      }
      if let Some(word_slots) = self.words.inverted.get(candidate) {
        for slot in word_slots {
          *slots.entry(*slot).or_insert(0) += common;
        }
      }
    }
    slots
  }
}

impl IndexAdapter for FuzzyIndex {
  fn search(&self, query: &str) -> Vec<IndexMatch> {
    let words = split_words(query);
    if words.is_empty() {
      return Vec::new();
    }

    let per_word: Vec<HashMap<Slot, u32>> = words.iter().map(|word| self.word_slots(word)).collect();
    self.words.resolve(intersect(per_word))
  }

  fn item_count(&self) -> usize {
    self.words.item_count()
  }

  fn word_count(&self) -> usize {
    self.words.word_count()
  }
}
