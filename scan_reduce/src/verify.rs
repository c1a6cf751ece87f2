//! Exact comparison of engine output against the reference.

use crate::{Error, Result};

/// Fails on the first index where `actual` differs from `expected`.
pub fn expect_same_scan(expected: &[u32], actual: &[u32]) -> Result<()> {
    if expected.len() != actual.len() {
        return Err(Error::LengthMismatch {
            host: expected.len(),
            device: actual.len(),
        });
    }

    match expected.iter().zip(actual).position(|(e, a)| e != a) {
        Some(index) => Err(Error::Consistency {
            index,
            expected: expected[index],
            actual: actual[index],
        }),
        None => Ok(()),
    }
}

pub fn expect_same_sum(expected: u32, actual: u32) -> Result<()> {
    if expected != actual {
        return Err(Error::Consistency {
            index: 0,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{expect_same_scan, expect_same_sum};
    use crate::Error;

    #[test]
    fn reports_first_mismatch() {
        let err = expect_same_scan(&[1, 3, 6, 10], &[1, 3, 7, 11]).unwrap_err();
        assert!(matches!(
            err,
            Error::Consistency {
                index: 2,
                expected: 6,
                actual: 7
            }
        ));
    }

    #[test]
    fn equal_inputs_pass() {
        assert!(expect_same_scan(&[1, 3, 6], &[1, 3, 6]).is_ok());
        assert!(expect_same_sum(42, 42).is_ok());
        assert!(expect_same_sum(42, 41).is_err());
    }

    #[test]
    fn length_mismatch() {
        assert!(matches!(
            expect_same_scan(&[1, 2], &[1]),
            Err(Error::LengthMismatch { host: 2, device: 1 })
        ));
    }
}
