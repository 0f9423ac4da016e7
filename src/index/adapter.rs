//! Defines the `IndexAdapter` trait implemented by the matching strategies.

use crate::index::IndexMatch;

/// A trait that defines the common interface of a built search index.
///
/// An adapter is immutable once built. The [`Index`](crate::index::Index)
/// holder swaps whole adapters on rebuild, so readers never observe a
/// partially built index.
///
/// The `Send` and `Sync` bounds are required to allow the index to be searched
/// concurrently from query worker threads.
pub trait IndexAdapter: Send + Sync + std::fmt::Debug {
  /// Returns the items matching every word of `query`.
  ///
  /// The order of the returned matches is unspecified; callers attach scores.
  /// An empty query yields no matches.
  fn search(&self, query: &str) -> Vec<IndexMatch>;

  /// The number of distinct items in the index.
  fn item_count(&self) -> usize;

  /// The number of distinct indexed words.
  fn word_count(&self) -> usize;
}
