pub struct MultStep {
    factor: usize,
    next: Option<usize>,
}

impl Iterator for MultStep {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.next?;
        self.next = next.checked_mul(self.factor);
        Some(next)
    }
}

/// Returns an iterator that starts at `init` and multiplies by `factor` on
/// each step. It ends after the last value that fits in a `usize`; callers
/// otherwise bound it with `take_while`.
pub fn mult_step(init: usize, factor: usize) -> MultStep {
    MultStep {
        factor,
        next: Some(init),
    }
}

pub struct DivStep {
    denom: usize,
    next: usize,
}

impl Iterator for DivStep {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.next;
        self.next /= self.denom;
        Some(next)
    }
}

/// Returns an endless iterator that starts at `init` and divides by `denom` on
/// each step. Once it reaches zero it stays there.
pub fn div_step(init: usize, denom: usize) -> DivStep {
    DivStep { denom, next: init }
}
