//! Decay-weighted usage scores and their application to match scores.

use crate::types::{RankItem, Score, PERFECT_MATCH};
use crate::usage::Activation;
use std::collections::HashMap;
use std::sync::Arc;

/// extension id -> item id -> usage score in `[0, 1)`
pub(crate) type ScoreMap = HashMap<String, HashMap<String, f64>>;

/// Computes usage scores from an activation log ordered oldest first.
///
/// The newest activation weighs `decay`, the one before it `decay^2` and so
/// on; weights are summed per `(extension, item)` pair. Pairs are then ranked
/// by their summed weight and every distinct weight receives
/// `rank / distinct_weights`, so equal weights share a score.
pub(crate) fn compute_scores(activations: &[Activation], decay: f64) -> ScoreMap {
  let total = activations.len();
  let mut weights: HashMap<(&str, &str), f64> = HashMap::new();
  for (position, activation) in activations.iter().enumerate() {
    if activation.item_id.is_empty() {
      continue;
    }
    let recency = (total - position) as f64;
    *weights
      .entry((activation.extension_id.as_str(), activation.item_id.as_str()))
      .or_insert(0.0) += decay.powf(recency);
  }

  let mut distinct: Vec<f64> = weights.values().copied().collect();
  distinct.sort_by(f64::total_cmp);
  distinct.dedup();

  let buckets = distinct.len() as f64;
  let mut scores = ScoreMap::new();
  for ((extension_id, item_id), weight) in weights {
    let rank = distinct.partition_point(|w| w.total_cmp(&weight).is_lt()) as f64;
    scores
      .entry(extension_id.to_string())
      .or_default()
      .insert(item_id.to_string(), rank / buckets);
  }
  scores
}

/// A point-in-time snapshot of the usage scores plus the ranking settings.
///
/// Cloning is cheap. A query keeps using the snapshot it took even if the
/// history is updated meanwhile.
#[derive(Debug, Clone)]
pub struct UsageScoring {
  pub prioritize_perfect_match: bool,
  pub memory_decay: f64,
  scores: Arc<ScoreMap>,
}

impl Default for UsageScoring {
  fn default() -> Self {
    Self::new(true, 0.5, Arc::new(ScoreMap::new()))
  }
}

impl UsageScoring {
  pub(crate) fn new(prioritize_perfect_match: bool, memory_decay: f64, scores: Arc<ScoreMap>) -> Self {
    Self {
      prioritize_perfect_match,
      memory_decay,
      scores,
    }
  }

  pub(crate) fn scores(&self) -> &Arc<ScoreMap> {
    &self.scores
  }

  /// The usage score of an item, if it was ever activated.
  pub fn score_of(&self, extension_id: &str, item_id: &str) -> Option<f64> {
    self.scores.get(extension_id)?.get(item_id).copied()
  }

  /// Number of items with a usage score.
  pub fn len(&self) -> usize {
    self.scores.values().map(HashMap::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Rewrites a raw match score into its ranking band.
  ///
  /// | band      | condition                         | score              |
  /// |-----------|-----------------------------------|--------------------|
  /// | `[3, 4)`  | perfect match, used before        | `3 + usage`        |
  /// | `(2, 3]`  | perfect match, never used         | `2 + 1 / text_len` |
  /// | `[1, 2)`  | used before                       | `1 + usage`        |
  /// | `(0, 1]`  | matched, never used               | unchanged          |
  /// | `(-1, 0]` | no textual match, never used      | `-1 + 1 / text_len`|
  ///
  /// The perfect match bands only exist while perfect matches are
  /// prioritized.
  pub fn apply(&self, extension_id: &str, rank_item: &mut RankItem) {
    let usage = self.score_of(extension_id, &rank_item.item.id);
    let inverse_length = 1.0 / rank_item.item.text_length().max(1) as Score;

    rank_item.score = if self.prioritize_perfect_match && rank_item.score >= PERFECT_MATCH {
      match usage {
        Some(usage) => 3.0 + usage as Score,
        None => 2.0 + inverse_length,
      }
    } else {
      match usage {
        Some(usage) => 1.0 + usage as Score,
        None if rank_item.score <= 0.0 => -1.0 + inverse_length,
        None => rank_item.score,
      }
    };
  }

  /// Applies [`apply`](Self::apply) to every item.
  pub fn apply_all(&self, extension_id: &str, rank_items: &mut [RankItem]) {
    for rank_item in rank_items {
      self.apply(extension_id, rank_item);
    }
  }
}
