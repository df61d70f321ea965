//! Per-package coverage deltas between the current run and its baselines.

use std::collections::HashMap;

use crate::model::PackageCoverage;

/// Default regression threshold in percentage points.
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Which way a package's coverage moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Regression,
    Improvement,
    Neutral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffRow {
    pub package_name: String,
    pub current_pct: f64,
    /// `None` when no baseline exists for the package.
    pub base_pct: Option<f64>,
    pub delta_pct: Option<f64>,
    pub breaches_threshold: bool,
    /// Current snapshot is structurally identical to its baseline.
    pub unchanged: bool,
}

impl DiffRow {
    #[must_use]
    pub fn direction(&self) -> Direction {
        match self.delta_pct {
            Some(d) if d < 0.0 => Direction::Regression,
            Some(d) if d > 0.0 => Direction::Improvement,
            _ => Direction::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverageDiff {
    pub rows: Vec<DiffRow>,
    pub breach_count: usize,
    pub threshold: f64,
}

/// Pair every current package with its baseline by name.
///
/// Rows follow the order of `current`. A package breaches when it has a
/// baseline and dropped by more than `threshold` percentage points.
pub fn compute_diff(
    current: &[PackageCoverage],
    base: &[PackageCoverage],
    threshold: f64,
) -> CoverageDiff {
    let base_by_name: HashMap<&str, &PackageCoverage> =
        base.iter().map(|b| (b.package_name(), b)).collect();

    let rows: Vec<DiffRow> = current
        .iter()
        .map(|pkg| {
            let current_pct = pkg.percentage();
            let baseline = base_by_name.get(pkg.package_name());
            let base_pct = baseline.map(|b| b.percentage());
            let delta_pct = base_pct.map(|b| current_pct - b);
            DiffRow {
                package_name: pkg.package_name().to_string(),
                current_pct,
                base_pct,
                delta_pct,
                breaches_threshold: delta_pct.is_some_and(|d| d < -threshold),
                unchanged: baseline.is_some_and(|b| pkg.same_coverage(b)),
            }
        })
        .collect();

    let breach_count = rows.iter().filter(|r| r.breaches_threshold).count();
    CoverageDiff {
        rows,
        breach_count,
        threshold,
    }
}
