//! A small random-forest classifier over the three refinement features.
//!
//! The refinement contract only needs a trainable binary classifier with
//! per-class probabilities; any comparable ensemble would do. Trees are
//! grown on bootstrap samples with a random feature subset per split and
//! a fixed RNG seed, so a given training set always yields the same model.

use crate::utils::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub const NUM_FEATURES: usize = 3;

const MAX_DEPTH: usize = 12;
const MIN_SPLIT_SIZE: usize = 4;
const FEATURES_PER_SPLIT: usize = 2;
const MAX_THRESHOLDS_PER_FEATURE: usize = 16;
const FOREST_SEED: u64 = 42;

/// Per-class probabilities for one test row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassProbs {
    pub free: f64,
    pub nucleosome: f64,
}

/// The classifier seam of the refinement stage. `labels[i]` is true for
/// nucleosome training rows and false for nucleosome-free rows.
pub trait BinaryClassifier: Sized {
    fn train(rows: &[[f64; NUM_FEATURES]], labels: &[bool], num_trees: usize) -> Result<Self>;
    fn predict(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<ClassProbs>;
}

/// Tree count heuristic: enough trees to smooth bootstrap noise without
/// making training cost quadratic in the training-set size.
pub fn num_trees_for(num_rows: usize) -> usize {
    2 * (num_rows as f64).sqrt().ceil() as usize
}

#[derive(Debug)]
enum Node {
    Leaf {
        p_nucleosome: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn probability(&self, row: &[f64; NUM_FEATURES]) -> f64 {
        match self {
            Node::Leaf { p_nucleosome } => *p_nucleosome,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] < *threshold {
                    left.probability(row)
                } else {
                    right.probability(row)
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct RandomForest {
    trees: Vec<Node>,
}

impl BinaryClassifier for RandomForest {
    fn train(rows: &[[f64; NUM_FEATURES]], labels: &[bool], num_trees: usize) -> Result<RandomForest> {
        if rows.len() != labels.len() {
            return Err(Error::DataConsistency(format!(
                "Training matrix has {} rows for {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if rows.is_empty() {
            return Err(Error::InsufficientData(
                "The training set is empty".to_string(),
            ));
        }
        if num_trees == 0 {
            return Err(Error::Config("Tree count must be at least 1".to_string()));
        }

        let mut rng = StdRng::seed_from_u64(FOREST_SEED);
        let trees = (0..num_trees)
            .map(|_| {
                let sample: Vec<usize> = (0..rows.len())
                    .map(|_| rng.random_range(0..rows.len()))
                    .collect();
                grow_tree(rows, labels, &sample, 0, &mut rng)
            })
            .collect();
        Ok(RandomForest { trees })
    }

    fn predict(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<ClassProbs> {
        rows.iter()
            .map(|row| {
                let total: f64 = self.trees.iter().map(|tree| tree.probability(row)).sum();
                let nucleosome = total / self.trees.len() as f64;
                ClassProbs {
                    free: 1.0 - nucleosome,
                    nucleosome,
                }
            })
            .collect()
    }
}

fn positive_fraction(labels: &[bool], sample: &[usize]) -> f64 {
    let positives = sample.iter().filter(|&&i| labels[i]).count();
    positives as f64 / sample.len() as f64
}

fn gini(p: f64) -> f64 {
    2.0 * p * (1.0 - p)
}

fn grow_tree(
    rows: &[[f64; NUM_FEATURES]],
    labels: &[bool],
    sample: &[usize],
    depth: usize,
    rng: &mut StdRng,
) -> Node {
    let p = positive_fraction(labels, sample);
    if depth >= MAX_DEPTH || sample.len() < MIN_SPLIT_SIZE || p == 0.0 || p == 1.0 {
        return Node::Leaf { p_nucleosome: p };
    }

    let mut features = [0, 1, 2];
    features.shuffle(rng);

    let parent_impurity = gini(p);
    let mut best: Option<(usize, f64, f64)> = None;
    for &feature in features.iter().take(FEATURES_PER_SPLIT) {
        for threshold in candidate_thresholds(rows, sample, feature) {
            let left: Vec<usize> = sample
                .iter()
                .copied()
                .filter(|&i| rows[i][feature] < threshold)
                .collect();
            if left.is_empty() || left.len() == sample.len() {
                continue;
            }
            let right_len = sample.len() - left.len();
            let p_left = positive_fraction(labels, &left);
            let positives = p * sample.len() as f64;
            let p_right = (positives - p_left * left.len() as f64) / right_len as f64;

            let weighted = (left.len() as f64 * gini(p_left)
                + right_len as f64 * gini(p_right))
                / sample.len() as f64;
            let gain = parent_impurity - weighted;
            if gain > 1e-12 && best.map_or(true, |(_, _, best_gain)| gain > best_gain) {
                best = Some((feature, threshold, gain));
            }
        }
    }

    match best {
        None => Node::Leaf { p_nucleosome: p },
        Some((feature, threshold, _)) => {
            let (left, right): (Vec<usize>, Vec<usize>) = sample
                .iter()
                .copied()
                .partition(|&i| rows[i][feature] < threshold);
            Node::Split {
                feature,
                threshold,
                left: Box::new(grow_tree(rows, labels, &left, depth + 1, rng)),
                right: Box::new(grow_tree(rows, labels, &right, depth + 1, rng)),
            }
        }
    }
}

fn candidate_thresholds(
    rows: &[[f64; NUM_FEATURES]],
    sample: &[usize],
    feature: usize,
) -> Vec<f64> {
    let mut values: Vec<f64> = sample.iter().map(|&i| rows[i][feature]).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    values.dedup();

    let mut midpoints: Vec<f64> = values
        .windows(2)
        .map(|pair| (pair[0] + pair[1]) / 2.0)
        .collect();
    if midpoints.len() > MAX_THRESHOLDS_PER_FEATURE {
        let step = midpoints.len() as f64 / MAX_THRESHOLDS_PER_FEATURE as f64;
        midpoints = (0..MAX_THRESHOLDS_PER_FEATURE)
            .map(|i| midpoints[(i as f64 * step) as usize])
            .collect();
    }
    midpoints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_training() -> (Vec<[f64; NUM_FEATURES]>, Vec<bool>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let jitter = (i % 5) as f64;
            rows.push([60.0 + jitter, 0.2, 0.4]);
            labels.push(false);
            rows.push([200.0 + jitter, 0.8, 0.5]);
            labels.push(true);
        }
        (rows, labels)
    }

    #[test]
    fn tree_count_heuristic() {
        assert_eq!(num_trees_for(25), 10);
        assert_eq!(num_trees_for(26), 12);
        assert_eq!(num_trees_for(1), 2);
    }

    #[test]
    fn forest_separates_separable_classes() {
        let (rows, labels) = separable_training();
        let forest = RandomForest::train(&rows, &labels, 20).unwrap();
        let probs = forest.predict(&[[62.0, 0.25, 0.4], [198.0, 0.75, 0.5]]);
        assert!(probs[0].free > 0.9, "free prob was {}", probs[0].free);
        assert!(
            probs[1].nucleosome > 0.9,
            "nucleosome prob was {}",
            probs[1].nucleosome
        );
        for p in probs {
            assert!((p.free + p.nucleosome - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn training_is_deterministic() {
        let (rows, labels) = separable_training();
        let test_rows = vec![[100.0, 0.5, 0.45], [150.0, 0.6, 0.48]];
        let first = RandomForest::train(&rows, &labels, 10).unwrap().predict(&test_rows);
        let second = RandomForest::train(&rows, &labels, 10).unwrap().predict(&test_rows);
        assert_eq!(first, second);
    }

    #[test]
    fn single_class_training_yields_constant_probability() {
        let rows = vec![[200.0, 0.8, 0.5]; 10];
        let labels = vec![true; 10];
        let forest = RandomForest::train(&rows, &labels, 4).unwrap();
        let probs = forest.predict(&[[100.0, 0.1, 0.2]]);
        assert_eq!(probs[0].nucleosome, 1.0);
    }

    #[test]
    fn train_rejects_ragged_input() {
        let result = RandomForest::train(&[[1.0, 2.0, 3.0]], &[true, false], 4);
        assert!(matches!(result, Err(Error::DataConsistency(_))));
        let result = RandomForest::train(&[], &[], 4);
        assert!(matches!(result, Err(Error::InsufficientData(_))));
    }
}
