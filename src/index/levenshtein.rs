//! Bounded prefix edit distance.

/// Computes the prefix edit distance between `prefix` and `candidate`.
///
/// This is the smallest Levenshtein distance between `prefix` and any prefix of
/// `candidate`, so a candidate continuing beyond the typed text is not
/// penalised. Only the first `|prefix| + limit` units of the candidate are
/// considered. Returns `None` if the distance exceeds `limit`.
pub fn prefix_edit_distance(prefix: &[&str], candidate: &[&str], limit: usize) -> Option<usize> {
  let n = prefix.len();
  let m = candidate.len().min(n + limit);

  // Rolling rows of the (n + 1) x (m + 1) matrix.
  let mut previous: Vec<usize> = (0..=m).collect();
  let mut current = vec![0; m + 1];

  for i in 1..=n {
    current[0] = i;
    for j in 1..=m {
      let substitution = previous[j - 1] + usize::from(prefix[i - 1] != candidate[j - 1]);
      current[j] = substitution.min(current[j - 1] + 1).min(previous[j] + 1);
    }
    std::mem::swap(&mut previous, &mut current);
  }

  previous.into_iter().min().filter(|distance| *distance <= limit)
}
