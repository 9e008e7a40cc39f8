//! Brute-force descriptor matching and the ratio test.

use crate::Descriptors;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// One query row paired with one train row.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
    /// Distance to the runner-up train row, when the matcher looked for one.
    pub second_distance: Option<f32>,
}

/// Matcher trained on one descriptor set (the pattern) and queried per frame.
pub trait DescriptorMatcher: Send + Sync {
    /// Replace the train set. Rows from any earlier `train` are forgotten.
    fn train(&mut self, descriptors: &Descriptors);

    fn clear(&mut self);

    /// Number of train rows currently held.
    fn train_len(&self) -> usize;

    /// Best train row for each query row.
    fn match_nearest(&self, query: &Descriptors) -> Vec<Correspondence>;

    /// Up to `k` nearest train rows for each query row, nearest first.
    /// Query rows without any candidate are left out.
    fn knn_match(&self, query: &Descriptors, k: usize) -> Vec<Vec<Correspondence>>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherParams {
    /// Keep a nearest match only when it is mutual.
    pub cross_check: bool,
}

impl Default for MatcherParams {
    fn default() -> Self {
        Self { cross_check: true }
    }
}

/// Exhaustive matcher: Hamming distance for binary rows, Euclidean for float.
///
/// Equal distances resolve to the lower row index.
#[derive(Clone, Debug, Default)]
pub struct BruteForceMatcher {
    params: MatcherParams,
    train: Option<Descriptors>,
}

impl BruteForceMatcher {
    pub fn new(params: MatcherParams) -> Self {
        Self {
            params,
            train: None,
        }
    }

    pub fn params(&self) -> &MatcherParams {
        &self.params
    }

    /// Train set, if it is comparable with `query`.
    fn compatible_train(&self, query: &Descriptors) -> Option<&Descriptors> {
        let train = self.train.as_ref().filter(|t| !t.is_empty())?;
        if query.is_empty() {
            return None;
        }
        match train.check_compatible(query) {
            Ok(()) => Some(train),
            Err(e) => {
                warn!("matcher: query incompatible with train set: {e}");
                None
            }
        }
    }
}

// Nearest `rows` row to row `i` of `from`, ties to the lower index.
fn nearest(from: &Descriptors, i: usize, rows: &Descriptors) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for j in 0..rows.rows() {
        let Some(d) = from.distance(i, rows, j) else {
            continue;
        };
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((j, d));
        }
    }
    best
}

impl DescriptorMatcher for BruteForceMatcher {
    fn train(&mut self, descriptors: &Descriptors) {
        self.train = Some(descriptors.clone());
        debug!("matcher: trained on {} rows", descriptors.rows());
    }

    fn clear(&mut self) {
        self.train = None;
    }

    fn train_len(&self) -> usize {
        self.train.as_ref().map_or(0, Descriptors::rows)
    }

    fn match_nearest(&self, query: &Descriptors) -> Vec<Correspondence> {
        let Some(train) = self.compatible_train(query) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for q in 0..query.rows() {
            let Some((t, distance)) = nearest(query, q, train) else {
                continue;
            };
            if self.params.cross_check {
                match nearest(train, t, query) {
                    Some((back, _)) if back == q => {}
                    _ => continue,
                }
            }
            out.push(Correspondence {
                query_idx: q,
                train_idx: t,
                distance,
                second_distance: None,
            });
        }
        out
    }

    fn knn_match(&self, query: &Descriptors, k: usize) -> Vec<Vec<Correspondence>> {
        let Some(train) = self.compatible_train(query) else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(query.rows());
        let mut candidates: Vec<(usize, f32)> = Vec::with_capacity(train.rows());
        for q in 0..query.rows() {
            candidates.clear();
            candidates.extend(
                (0..train.rows()).filter_map(|t| query.distance(q, train, t).map(|d| (t, d))),
            );
            // Stable sort keeps ascending train index among equal distances.
            candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
            candidates.truncate(k);
            if candidates.is_empty() {
                continue;
            }

            let second = candidates.get(1).map(|&(_, d)| d);
            out.push(
                candidates
                    .iter()
                    .map(|&(t, d)| Correspondence {
                        query_idx: q,
                        train_idx: t,
                        distance: d,
                        second_distance: second,
                    })
                    .collect(),
            );
        }
        out
    }
}

/// Keep the nearest candidate of each k-NN list when it is clearly better
/// than the runner-up: `best / second < max_ratio`.
///
/// Lists without a runner-up, or whose runner-up distance is zero, are
/// dropped as ambiguous.
pub fn ratio_test(knn: &[Vec<Correspondence>], max_ratio: f32) -> Vec<Correspondence> {
    knn.iter()
        .filter_map(|cands| {
            let best = cands.first()?;
            let second = cands.get(1)?;
            if second.distance <= 0.0 {
                return None;
            }
            (best.distance / second.distance < max_ratio).then_some(Correspondence {
                second_distance: Some(second.distance),
                ..*best
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(rows: &[[u8; 2]]) -> Descriptors {
        Descriptors::from_binary(2, rows.iter().flatten().copied().collect()).unwrap()
    }

    #[test]
    fn nearest_prefers_lower_index_on_ties() {
        let mut m = BruteForceMatcher::new(MatcherParams { cross_check: false });
        m.train(&bin(&[[0b11, 0], [0b11, 0], [0xff, 0xff]]));
        let out = m.match_nearest(&bin(&[[0b01, 0]]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].train_idx, 0);
        assert_eq!(out[0].distance, 1.0);
    }

    #[test]
    fn cross_check_drops_non_mutual_pairs() {
        // Both queries prefer train 0, which in turn prefers query 1.
        let train = bin(&[[0x0f, 0]]);
        let query = bin(&[[0x00, 0], [0x0f, 0]]);

        let mut plain = BruteForceMatcher::new(MatcherParams { cross_check: false });
        plain.train(&train);
        assert_eq!(plain.match_nearest(&query).len(), 2);

        let mut mutual = BruteForceMatcher::new(MatcherParams { cross_check: true });
        mutual.train(&train);
        let out = mutual.match_nearest(&query);
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].query_idx, out[0].train_idx), (1, 0));
    }

    #[test]
    fn knn_is_sorted_and_bounded() {
        let mut m = BruteForceMatcher::default();
        m.train(&bin(&[[0xff, 0xff], [0x01, 0], [0x03, 0]]));
        let knn = m.knn_match(&bin(&[[0, 0]]), 2);
        assert_eq!(knn.len(), 1);
        let ids: Vec<usize> = knn[0].iter().map(|c| c.train_idx).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(knn[0][0].second_distance, Some(2.0));
    }

    #[test]
    fn ratio_test_thresholds() {
        let mut m = BruteForceMatcher::default();
        // Distances from query 0: 2 and 5 (ratio 0.4).
        // Distances from query 1: 3 and 4 (ratio 0.75).
        // Distances from query 2: 3 and 6 (ratio 0.5).
        m.train(&bin(&[[0b0000_0011, 0], [0b1111_0000, 0b0000_0001]]));
        let query = bin(&[[0, 0], [0b0001_0000, 0], [0b0011_0000, 0b0000_0011]]);
        let knn = m.knn_match(&query, 2);
        assert_eq!(knn[0][0].distance, 2.0);
        assert_eq!(knn[0][1].distance, 5.0);
        assert_eq!(knn[1][0].distance, 3.0);
        assert_eq!(knn[1][1].distance, 4.0);
        assert_eq!((knn[2][0].train_idx, knn[2][0].distance), (1, 3.0));
        assert_eq!(knn[2][1].distance, 6.0);

        let kept = ratio_test(&knn, 0.75);
        assert_eq!(kept.len(), 2);
        assert_eq!((kept[0].query_idx, kept[0].train_idx), (0, 0));
        assert_eq!(kept[0].second_distance, Some(5.0));
        assert_eq!((kept[1].query_idx, kept[1].train_idx), (2, 1));
    }

    #[test]
    fn ratio_test_drops_lone_and_zero_runner_up() {
        let lone = vec![vec![Correspondence {
            query_idx: 0,
            train_idx: 0,
            distance: 1.0,
            second_distance: None,
        }]];
        assert!(ratio_test(&lone, 0.75).is_empty());

        let zero = vec![vec![
            Correspondence {
                query_idx: 0,
                train_idx: 0,
                distance: 0.0,
                second_distance: Some(0.0),
            },
            Correspondence {
                query_idx: 0,
                train_idx: 1,
                distance: 0.0,
                second_distance: Some(0.0),
            },
        ]];
        assert!(ratio_test(&zero, 0.75).is_empty());
    }

    #[test]
    fn retraining_forgets_previous_rows() {
        let mut m = BruteForceMatcher::new(MatcherParams { cross_check: false });
        m.train(&bin(&[[1, 1], [2, 2], [3, 3]]));
        m.train(&bin(&[[9, 9]]));
        assert_eq!(m.train_len(), 1);
        let out = m.match_nearest(&bin(&[[1, 1], [2, 2]]));
        assert!(out.iter().all(|c| c.train_idx == 0));
        m.clear();
        assert_eq!(m.train_len(), 0);
        assert!(m.match_nearest(&bin(&[[1, 1]])).is_empty());
    }

    #[test]
    fn incompatible_query_matches_nothing() {
        let mut m = BruteForceMatcher::default();
        m.train(&bin(&[[1, 1]]));
        let float = Descriptors::from_float(2, vec![1.0, 1.0]).unwrap();
        assert!(m.match_nearest(&float).is_empty());
        assert!(m.knn_match(&float, 2).is_empty());
    }
}
