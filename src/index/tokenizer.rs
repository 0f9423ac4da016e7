//! Word splitting shared by both matching strategies.

use std::collections::{BTreeSet, HashMap};
use unicode_segmentation::UnicodeSegmentation;

/// Punctuation that separates words in addition to whitespace.
pub const SEPARATORS: &[char] = &[
  '!', '?', '<', '>', '"', '\'', '=', '+', '*', '.', ':', ',', ';', '\\', '/', '_', '-',
];

/// Returns `true` if `c` separates words.
pub fn is_separator(c: char) -> bool {
  c.is_whitespace() || SEPARATORS.contains(&c)
}

/// Splits text into lower-cased words, dropping empty tokens.
pub fn split_words(text: &str) -> Vec<String> {
  text
    .split(is_separator)
    .filter(|word| !word.is_empty())
    .map(str::to_lowercase)
    .collect()
}

/// Splits a query for prefix matching.
///
/// The words are sorted and deduplicated, then every word that is a prefix of
/// its lexicographic successor is dropped since the longer word is the
/// stricter constraint.
pub fn prefix_query_words(text: &str) -> Vec<String> {
  let words: Vec<String> = split_words(text)
    .into_iter()
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect();

  words
    .iter()
    .enumerate()
    .filter(|(i, word)| match words.get(i + 1) {
      Some(next) => !next.starts_with(word.as_str()),
      None => true,
    })
    .map(|(_, word)| word.clone())
    .collect()
}

/// Splits a word into grapheme clusters.
pub fn graphemes(word: &str) -> Vec<&str> {
  word.graphemes(true).collect()
}

/// Counts the q-grams of a word.
///
/// The word is padded with `q - 1` leading spaces and a window of `q`
/// graphemes slides across it, yielding one gram per grapheme of the word.
pub fn qgrams(word: &str, q: usize) -> HashMap<String, u32> {
  let padding = q.saturating_sub(1);
  let mut padded: Vec<&str> = Vec::with_capacity(padding + word.len());
  padded.extend(std::iter::repeat(" ").take(padding));
  padded.extend(word.graphemes(true));

  let mut grams = HashMap::new();
  for window in padded.windows(q.max(1)) {
    *grams.entry(window.concat()).or_insert(0) += 1;
  }
  grams
}
