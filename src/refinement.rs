//! Marking and p-refinement driven by cell-wise error indicators.
use crate::transfer::DegreeDistribution;
use hpdwr_traits::Real;
use serde::{Deserialize, Serialize};

/// How cells are selected for refinement after each cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefinementStrategy {
    /// Refine the given fraction of cells with the largest `|eta_K|`.
    FixedFraction { fraction: f64 },
    /// Refine every cell.
    Uniform,
}

impl RefinementStrategy {
    /// Cells to refine given the indicator.
    pub fn mark<T: Real>(&self, indicator: &[T]) -> Vec<usize> {
        match *self {
            RefinementStrategy::FixedFraction { fraction } => mark_cells(indicator, fraction),
            RefinementStrategy::Uniform => (0..indicator.len()).collect(),
        }
    }
}

/// Indices of the `ceil(fraction * n)` cells with the largest `|eta_K|`, in ascending order.
///
/// Ties are broken by cell index. NaN indicators sort last.
pub fn mark_cells<T: Real>(indicator: &[T], fraction: f64) -> Vec<usize> {
    let n = indicator.len();
    let num_marked = ((fraction.clamp(0.0, 1.0) * n as f64).ceil() as usize).min(n);

    let magnitudes: Vec<f64> = indicator
        .iter()
        .map(|eta| {
            let m = eta.abs().to_subset().unwrap_or(f64::NAN);
            if m.is_nan() {
                -1.0
            } else {
                m
            }
        })
        .collect();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| magnitudes[j].total_cmp(&magnitudes[i]).then(i.cmp(&j)));

    let mut marked: Vec<usize> = order.into_iter().take(num_marked).collect();
    marked.sort_unstable();
    marked
}

/// Raises the degree of every marked cell by one, saturating at `max_degree`.
///
/// # Panics
///
/// Panics if a marked index is out of bounds.
pub fn p_refine(degrees: &DegreeDistribution, marked: &[usize], max_degree: usize) -> DegreeDistribution {
    let mut new_degrees = degrees.as_slice().to_vec();
    for &cell in marked {
        if new_degrees[cell] < max_degree {
            new_degrees[cell] += 1;
        }
    }
    DegreeDistribution::new(new_degrees)
}

/// Like [`p_refine`], but keeps every cell at most `max_degree - 1`, so that the result
/// can still be p-enriched for the next adjoint computation.
pub fn p_refine_enrichable(degrees: &DegreeDistribution, marked: &[usize], max_degree: usize) -> DegreeDistribution {
    p_refine(degrees, marked, max_degree.saturating_sub(1))
}
