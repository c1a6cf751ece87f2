//! Sequential ground truth for the engines.

use rayon::prelude::*;

/// Inclusive scan computed in strict index order.
pub fn inclusive_scan(xs: &[u32]) -> Vec<u32> {
    let mut ys = Vec::with_capacity(xs.len());
    let mut accumulator = 0u32;
    for &x in xs {
        accumulator = accumulator.wrapping_add(x);
        ys.push(accumulator);
    }
    ys
}

pub fn sum(xs: &[u32]) -> u32 {
    xs.iter().fold(0u32, |acc, &x| acc.wrapping_add(x))
}

/// Multi-threaded sum on the CPU. Wrapping addition is associative, so the
/// result matches [`sum`] exactly.
pub fn par_sum(xs: &[u32]) -> u32 {
    xs.par_iter()
        .copied()
        .reduce(|| 0, |a, b| a.wrapping_add(b))
}

#[cfg(test)]
mod tests {
    use super::{inclusive_scan, par_sum, sum};

    #[test]
    fn inclusive_scan_test() {
        assert_eq!(inclusive_scan(&[1, 2, 3, 4]), vec![1, 3, 6, 10]);
        assert_eq!(inclusive_scan(&[5]), vec![5]);
        assert!(inclusive_scan(&[]).is_empty());
    }

    #[test]
    fn sums_wrap() {
        let xs = [u32::MAX, 2, 3];
        assert_eq!(sum(&xs), 4);
        assert_eq!(par_sum(&xs), 4);
    }

    #[test]
    fn par_sum_matches_sum() {
        let xs: Vec<u32> = (0..100_000u32).map(|x| x.wrapping_mul(2_654_435_761)).collect();
        assert_eq!(par_sum(&xs), sum(&xs));
    }

    #[test]
    fn leaves_input_untouched() {
        let xs = vec![3, 1, 4, 1, 5];
        let _ = inclusive_scan(&xs);
        let _ = sum(&xs);
        assert_eq!(xs, vec![3, 1, 4, 1, 5]);
    }
}
