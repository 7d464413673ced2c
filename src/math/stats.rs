//! Summary and binned statistics.

use crate::domain::Binning;
use crate::error::{LensError, Result};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mu = mean(values)?;
    let var = values.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Resolve a binning request into explicit edges for the sample `x`.
///
/// A bin count spans `[min x, max x]`; a zero-width range is widened by 0.5
/// on either side so every sample still lands in a bin.
pub fn bin_edges(x: &[f64], binning: &Binning) -> Result<Vec<f64>> {
    binning.validate()?;
    match binning {
        Binning::Edges(edges) => Ok(edges.clone()),
        Binning::Count(n) => {
            let (mut lo, mut hi) = x
                .iter()
                .filter(|v| v.is_finite())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            if !(lo.is_finite() && hi.is_finite()) {
                return Err(LensError::config("cannot bin an empty sample"));
            }
            if lo == hi {
                lo -= 0.5;
                hi += 0.5;
            }
            let width = (hi - lo) / *n as f64;
            let mut edges: Vec<f64> = (0..=*n).map(|i| lo + width * i as f64).collect();
            edges[*n] = hi;
            Ok(edges)
        }
    }
}

/// Index of the bin holding `v`: bins are half-open `[e_i, e_{i+1})` except the
/// last, which also includes its right edge.
fn bin_index(edges: &[f64], v: f64) -> Option<usize> {
    let last = edges.len() - 1;
    if !(v >= edges[0] && v <= edges[last]) {
        return None;
    }
    if v == edges[last] {
        return Some(last - 1);
    }
    // First edge strictly greater than v, minus one.
    let upper = edges.partition_point(|&e| e <= v);
    Some(upper - 1)
}

/// Per-bin mean of `values`, with bins defined on `x`.
///
/// Empty bins yield `NaN`, matching the usual binned-statistic convention;
/// callers decide whether to drop them.
pub fn binned_mean(x: &[f64], values: &[f64], edges: &[f64]) -> Result<Vec<f64>> {
    if x.len() != values.len() {
        return Err(LensError::config(format!(
            "binned statistic length mismatch: {} positions vs {} values",
            x.len(),
            values.len()
        )));
    }
    if edges.len() < 2 {
        return Err(LensError::config("binning requested without bin edges"));
    }

    let nbins = edges.len() - 1;
    let mut sums = vec![0.0; nbins];
    let mut counts = vec![0usize; nbins];
    for (&xi, &vi) in x.iter().zip(values.iter()) {
        if let Some(b) = bin_index(edges, xi) {
            sums[b] += vi;
            counts[b] += 1;
        }
    }

    Ok(sums
        .into_iter()
        .zip(counts)
        .map(|(s, n)| if n == 0 { f64::NAN } else { s / n as f64 })
        .collect())
}
