//! Target weight normalization.

use crate::config::unit::Target;

/// Normalize weights so they sum to 1.
///
/// A total of exactly 1 is left untouched. A zero total (every weight 0)
/// falls back to uniform weights.
pub fn normalize_weights(targets: &mut [Target]) {
    if targets.is_empty() {
        return;
    }

    let total: f64 = targets.iter().map(|t| t.weight.max(0.0)).sum();
    if total == 0.0 {
        let uniform = 1.0 / targets.len() as f64;
        for target in targets.iter_mut() {
            target.weight = uniform;
        }
    } else if total != 1.0 {
        for target in targets.iter_mut() {
            target.weight = target.weight.max(0.0) / total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(weights: &[f64]) -> Vec<Target> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| Target {
                id: format!("t{i}"),
                url: format!("http://t{i}.internal"),
                weight: *w,
                active: true,
            })
            .collect()
    }

    fn sum(targets: &[Target]) -> f64 {
        targets.iter().map(|t| t.weight).sum()
    }

    #[test]
    fn test_normalized_sum_is_one() {
        for weights in [&[7.0, 3.0][..], &[1.0, 1.0, 1.0], &[0.2, 0.0, 5.5, 13.0], &[1e-9, 2e-9]] {
            let mut t = targets(weights);
            normalize_weights(&mut t);
            assert!((sum(&t) - 1.0).abs() < 1e-9, "weights {weights:?}");
        }
    }

    #[test]
    fn test_proportions_are_kept() {
        let mut t = targets(&[70.0, 30.0]);
        normalize_weights(&mut t);
        assert!((t[0].weight - 0.7).abs() < 1e-12);
        assert!((t[1].weight - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_zero_total_is_uniform() {
        let mut t = targets(&[0.0, 0.0, 0.0, 0.0]);
        normalize_weights(&mut t);
        assert!(t.iter().all(|t| t.weight == 0.25));
    }

    #[test]
    fn test_unit_total_untouched() {
        let mut t = targets(&[0.25, 0.75]);
        normalize_weights(&mut t);
        assert_eq!(t[0].weight, 0.25);
        assert_eq!(t[1].weight, 0.75);
    }
}
