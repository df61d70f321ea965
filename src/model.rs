//! In-memory representation of per-package line coverage. The LCOV parser
//! produces [`LineCoverageRecord`]s, discovery and retrieval wrap them into
//! [`PackageCoverage`] values keyed by package name.

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// Line totals for a single source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCoverageRecord {
    pub source_file: String,
    pub lines_found: u64,
    pub lines_hit: u64,
}

/// All coverage records for one package of the monorepo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCoverage {
    package_name: String,
    pub records: Vec<LineCoverageRecord>,
}

impl PackageCoverage {
    pub fn new(package_name: impl Into<String>, records: Vec<LineCoverageRecord>) -> Self {
        Self {
            package_name: package_name.into(),
            records,
        }
    }

    /// The package name is fixed when the value is created.
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Saturates instead of overflowing; parsed snapshots never get there.
    #[must_use]
    pub fn lines_found(&self) -> u64 {
        self.records
            .iter()
            .fold(0, |total, r| total.saturating_add(r.lines_found))
    }

    #[must_use]
    pub fn lines_hit(&self) -> u64 {
        self.records
            .iter()
            .fold(0, |total, r| total.saturating_add(r.lines_hit))
    }

    /// Aggregate line coverage in percent (0–100). A package with no
    /// instrumentable lines reports 0.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        rate(self.lines_hit(), self.lines_found()) * 100.0
    }

    /// Same files with the same totals, in the same order.
    #[must_use]
    pub fn same_coverage(&self, other: &PackageCoverage) -> bool {
        self.package_name == other.package_name && self.records == other.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, found: u64, hit: u64) -> LineCoverageRecord {
        LineCoverageRecord {
            source_file: path.to_string(),
            lines_found: found,
            lines_hit: hit,
        }
    }

    #[test]
    fn test_percentage_sums_all_files() {
        let pkg = PackageCoverage::new(
            "api",
            vec![record("a.ts", 60, 50), record("b.ts", 40, 30)],
        );
        assert_eq!(pkg.lines_found(), 100);
        assert_eq!(pkg.lines_hit(), 80);
        assert!((pkg.percentage() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentage_ignores_file_order() {
        let a = PackageCoverage::new("api", vec![record("a", 3, 1), record("b", 7, 7)]);
        let b = PackageCoverage::new("api", vec![record("b", 7, 7), record("a", 3, 1)]);
        assert_eq!(a.percentage(), b.percentage());
    }

    #[test]
    fn test_percentage_zero_found_is_zero() {
        let pkg = PackageCoverage::new("empty", vec![record("a", 0, 0)]);
        assert_eq!(pkg.percentage(), 0.0);
        assert!(!pkg.percentage().is_nan());

        let none = PackageCoverage::new("none", vec![]);
        assert_eq!(none.percentage(), 0.0);
    }

    #[test]
    fn test_same_coverage() {
        let a = PackageCoverage::new("api", vec![record("a", 3, 1)]);
        let b = PackageCoverage::new("api", vec![record("a", 3, 1)]);
        let c = PackageCoverage::new("api", vec![record("a", 3, 2)]);
        let d = PackageCoverage::new("web", vec![record("a", 3, 1)]);
        assert!(a.same_coverage(&b));
        assert!(!a.same_coverage(&c));
        assert!(!a.same_coverage(&d));
    }
}
