//! Mean/standard-deviation outlier filter.
//!
//! Bounds are `mean ± k·σ` with σ the population standard deviation. Samples
//! on a bound are kept. When every sample would fall outside the bounds the
//! filter gives up and keeps them all, flagging the result as degenerate.

use rust_decimal::prelude::*;
use rust_decimal::MathematicalOps;

/// Result of filtering one currency's prices.
#[derive(Debug, Clone, PartialEq)]
pub struct InlierRange {
    pub lower: Decimal,
    pub upper: Decimal,
    /// Samples within the bounds, in input order.
    pub kept: Vec<Decimal>,
    /// Set when the bounds excluded every sample and all were kept instead.
    pub degenerate: bool,
}

impl InlierRange {
    /// Check if a value lies within the bounds (inclusive).
    pub fn contains(&self, value: Decimal) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Number of samples dropped from an input of `total` samples.
    pub fn removed(&self, total: usize) -> usize {
        total.saturating_sub(self.kept.len())
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(samples: &[Decimal]) -> Option<Decimal> {
    if samples.is_empty() {
        return None;
    }
    let sum = samples
        .iter()
        .try_fold(Decimal::ZERO, |acc, x| acc.checked_add(*x));
    match sum {
        Some(sum) => sum.checked_div(Decimal::from(samples.len())),
        // Sum overflowed; average the scaled values instead.
        None => {
            let n = Decimal::from(samples.len());
            samples
                .iter()
                .try_fold(Decimal::ZERO, |acc, x| acc.checked_add(*x / n))
        }
    }
}

/// Population standard deviation around `mu`.
///
/// Samples are scaled by their largest magnitude first so squaring cannot
/// overflow `Decimal`.
fn population_std_dev(samples: &[Decimal], mu: Decimal) -> Decimal {
    let scale = samples
        .iter()
        .map(|x| x.abs())
        .max()
        .unwrap_or(Decimal::ZERO);
    if scale.is_zero() {
        return Decimal::ZERO;
    }

    let mu_scaled = mu / scale;
    let n = Decimal::from(samples.len());
    let variance = samples
        .iter()
        .map(|x| {
            let d = *x / scale - mu_scaled;
            d * d
        })
        .sum::<Decimal>()
        / n;

    variance
        .sqrt()
        .and_then(|sigma| sigma.checked_mul(scale))
        .unwrap_or(Decimal::MAX)
}

/// Filter `samples` to those within `k` standard deviations of the mean.
pub fn filter_inliers(samples: &[Decimal], k: Decimal) -> InlierRange {
    if samples.len() < 2 {
        let lower = samples.iter().copied().min().unwrap_or(Decimal::ZERO);
        let upper = samples.iter().copied().max().unwrap_or(Decimal::ZERO);
        return InlierRange {
            lower,
            upper,
            kept: samples.to_vec(),
            degenerate: false,
        };
    }

    let mu = mean(samples).unwrap_or(Decimal::ZERO);
    let sigma = population_std_dev(samples, mu);
    let spread = k.abs().checked_mul(sigma).unwrap_or(Decimal::MAX);
    let lower = mu.checked_sub(spread).unwrap_or(Decimal::MIN);
    let upper = mu.checked_add(spread).unwrap_or(Decimal::MAX);

    let kept: Vec<Decimal> = samples
        .iter()
        .copied()
        .filter(|x| *x >= lower && *x <= upper)
        .collect();

    if kept.is_empty() {
        return InlierRange {
            lower,
            upper,
            kept: samples.to_vec(),
            degenerate: true,
        };
    }

    InlierRange {
        lower,
        upper,
        kept,
        degenerate: false,
    }
}
