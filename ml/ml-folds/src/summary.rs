//! Per-class fold counts and the summary table.

use serde::{Deserialize, Serialize};

use crate::error::{FoldError, Result};
use crate::splits::FoldAssignment;

/// Fold sizes for one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    /// Class name.
    pub class: String,
    /// Samples assigned to the class.
    pub total: usize,
    /// Train fold size.
    pub train: usize,
    /// Validation fold size.
    pub val: usize,
    /// Test fold size.
    pub test: usize,
    /// Whether the class was ignored.
    #[serde(default)]
    pub ignored: bool,
}

impl ClassCounts {
    /// Samples kept across all folds.
    #[must_use]
    pub const fn retained(&self) -> usize {
        self.train + self.val + self.test
    }
}

/// Summary of a fold assignment.
///
/// # Example
///
/// ```
/// use ml_folds::{FoldAssignment, FoldReport};
///
/// let report = FoldReport::from_assignment(&FoldAssignment::default());
/// assert!(report.rows.is_empty());
/// assert_eq!(report.to_table().lines().count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FoldReport {
    /// One row per class, in configuration order.
    pub rows: Vec<ClassCounts>,
}

impl FoldReport {
    /// Builds the report. Ignored classes show empty folds.
    #[must_use]
    pub fn from_assignment(assignment: &FoldAssignment) -> Self {
        let rows = assignment
            .classes
            .iter()
            .map(|c| {
                let (train, val, test) = c.folds.as_ref().map_or((0, 0, 0), |f| {
                    (f.train.len(), f.val.len(), f.test.len())
                });
                ClassCounts {
                    class: c.name.clone(),
                    total: c.total,
                    train,
                    val,
                    test,
                    ignored: c.is_ignored(),
                }
            })
            .collect();

        Self { rows }
    }

    /// Samples kept across all classes.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.rows.iter().map(ClassCounts::retained).sum()
    }

    /// Samples assigned to non-ignored classes but left out by caps.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| !r.ignored)
            .map(|r| r.total - r.retained())
            .sum()
    }

    /// Renders the fixed-width table.
    #[must_use]
    #[allow(clippy::let_underscore_must_use)] // String::write_fmt is infallible
    pub fn to_table(&self) -> String {
        use std::fmt::Write;

        let mut table = String::new();
        let _ = writeln!(
            table,
            "{:>20}  {:>8}  {:>8}  {:>8}  {:>8}",
            "class", "total", "train", "val", "test"
        );
        let _ = writeln!(
            table,
            "{:>20}  {:>8}  {:>8}  {:>8}  {:>8}",
            "-----", "-----", "-----", "---", "----"
        );
        for row in &self.rows {
            let _ = writeln!(
                table,
                "{:>20}  {:>8}  {:>8}  {:>8}  {:>8}",
                row.class, row.total, row.train, row.val, row.test
            );
        }
        table
    }

    /// Serializes the report to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(FoldError::from)
    }

    /// Deserializes a report from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(FoldError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Sample;
    use crate::splits::{ClassFolds, Folds};

    fn folds(train: usize, val: usize, test: usize) -> Folds {
        let make = |prefix: &str, n: usize| -> Vec<Sample> {
            (0..n).map(|i| Sample::new(format!("{prefix}{i}"), "x")).collect()
        };
        Folds {
            train: make("a", train),
            val: make("b", val),
            test: make("c", test),
        }
    }

    fn assignment() -> FoldAssignment {
        FoldAssignment {
            classes: vec![
                ClassFolds {
                    name: "tumor".to_string(),
                    total: 10,
                    folds: Some(folds(5, 2, 3)),
                },
                ClassFolds {
                    name: "stroma".to_string(),
                    total: 4000,
                    folds: Some(folds(2000, 1000, 500)),
                },
                ClassFolds {
                    name: "background".to_string(),
                    total: 12,
                    folds: None,
                },
            ],
        }
    }

    #[test]
    fn report_counts() {
        let report = FoldReport::from_assignment(&assignment());
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[0].retained(), 10);
        assert_eq!(report.retained(), 3510);
        assert_eq!(report.dropped(), 500);
    }

    #[test]
    fn ignored_class_reports_zero_folds() {
        let report = FoldReport::from_assignment(&assignment());
        let bg = &report.rows[2];
        assert!(bg.ignored);
        assert_eq!(bg.total, 12);
        assert_eq!((bg.train, bg.val, bg.test), (0, 0, 0));
    }

    #[test]
    fn table_layout() {
        let table = FoldReport::from_assignment(&assignment()).to_table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            "               class     total     train       val      test"
        );
        assert_eq!(
            lines[1],
            "               -----     -----     -----       ---      ----"
        );
        assert_eq!(
            lines[2],
            "               tumor        10         5         2         3"
        );
        assert_eq!(
            lines[4],
            "          background        12         0         0         0"
        );
        assert!(lines.iter().all(|l| l.len() == 60));
    }

    #[test]
    fn report_json() {
        let report = FoldReport::from_assignment(&assignment());
        let json = report.to_json();
        assert!(json.is_ok());

        let parsed = FoldReport::from_json(&json.unwrap_or_default());
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap_or_default(), report);
    }
}
