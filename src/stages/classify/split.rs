//! Stratified sampling
//!
//! Both strategies shuffle each class separately with a seeded RNG, so a
//! given seed always produces the same partition.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{GenreError, Result};

/// Absorbs float noise in `n * fraction` before rounding up.
const ROUNDING_SLACK: f64 = 1e-9;

/// Sample indices grouped by class, each group shuffled.
fn shuffled_groups(classes: &[usize], seed: u64) -> Vec<Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, &class) in classes.iter().enumerate() {
        groups.entry(class).or_default().push(index);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    groups
        .into_values()
        .map(|mut group| {
            group.shuffle(&mut rng);
            group
        })
        .collect()
}

/// Fold number for every sample.
///
/// Each class is dealt round-robin across the folds, continuing where the
/// previous class stopped, so fold sizes differ by at most one.
pub fn stratified_folds(classes: &[usize], folds: usize, seed: u64) -> Result<Vec<usize>> {
    if folds < 2 {
        return Err(GenreError::InvalidConfig {
            reason: format!("cross-validation needs at least 2 folds, got {}", folds),
        });
    }
    if folds > classes.len() {
        return Err(GenreError::InvalidConfig {
            reason: format!(
                "{} folds requested but only {} instances available",
                folds,
                classes.len()
            ),
        });
    }

    let mut assignment = vec![0; classes.len()];
    let mut next = 0;
    for group in shuffled_groups(classes, seed) {
        for index in group {
            assignment[index] = next % folds;
            next += 1;
        }
    }
    Ok(assignment)
}

/// Train and test indices for a hold-out evaluation.
///
/// Per class, `ceil(n * (1 - test_split))` samples train and the rest test.
pub fn stratified_holdout(
    classes: &[usize],
    test_split: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let mut train = Vec::new();
    let mut test = Vec::new();

    for group in shuffled_groups(classes, seed) {
        let wanted = (group.len() as f64 * (1.0 - test_split) - ROUNDING_SLACK).ceil();
        let n_train = (wanted.max(1.0) as usize).min(group.len());
        train.extend_from_slice(&group[..n_train]);
        test.extend_from_slice(&group[n_train..]);
    }

    if test.is_empty() {
        return Err(GenreError::InvalidConfig {
            reason: format!(
                "a test split of {} leaves no instances to test on",
                test_split
            ),
        });
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ten_balanced() -> Vec<usize> {
        vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1]
    }

    #[test]
    fn test_every_fold_has_every_class() {
        let classes = ten_balanced();
        let folds = stratified_folds(&classes, 5, 440).unwrap();

        for fold in 0..5 {
            let members: HashSet<usize> = folds
                .iter()
                .enumerate()
                .filter(|&(_, &f)| f == fold)
                .map(|(i, _)| classes[i])
                .collect();
            assert_eq!(members.len(), 2, "fold {} is missing a class", fold);
        }
    }

    #[test]
    fn test_folds_are_deterministic() {
        let classes = vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0, 1];
        assert_eq!(
            stratified_folds(&classes, 3, 7).unwrap(),
            stratified_folds(&classes, 3, 7).unwrap()
        );
    }

    #[test]
    fn test_fold_sizes_balanced() {
        let classes = vec![0, 0, 0, 1, 1, 1, 1];
        let folds = stratified_folds(&classes, 3, 1).unwrap();
        let mut sizes = [0usize; 3];
        for f in folds {
            sizes[f] += 1;
        }
        assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
    }

    #[test]
    fn test_too_many_folds() {
        assert!(stratified_folds(&[0, 1, 0], 4, 0).is_err());
        assert!(stratified_folds(&[0, 1, 0], 1, 0).is_err());
    }

    #[test]
    fn test_holdout_rounds_training_up() {
        // 5 per class at 25% test: ceil(3.75) = 4 train, 1 test per class
        let (train, test) = stratified_holdout(&ten_balanced(), 0.25, 440).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        let all: HashSet<usize> = train.iter().chain(test.iter()).copied().collect();
        assert_eq!(all.len(), 10);
    }

    #[test]
    fn test_holdout_exact_fraction() {
        let classes = vec![0; 4].into_iter().chain(vec![1; 4]).collect::<Vec<_>>();
        let (train, test) = stratified_holdout(&classes, 0.25, 0).unwrap();
        assert_eq!((train.len(), test.len()), (6, 2));
    }

    #[test]
    fn test_holdout_without_test_data() {
        assert!(stratified_holdout(&[0, 1], 0.25, 0).is_err());
    }
}
