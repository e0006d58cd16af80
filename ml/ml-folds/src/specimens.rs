//! Held-out specimens.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{FoldError, Result};
use crate::sample::{Sample, split_record};

/// Specimens whose samples are reserved for the test fold.
///
/// # Example
///
/// ```
/// use ml_folds::{HeldOutSpecimens, Sample};
///
/// let held: HeldOutSpecimens = ["S1", "S4"].into_iter().collect();
/// assert!(held.contains("S4"));
/// assert!(held.holds(&Sample::new("p1", "tumor").with_specimen("S1")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeldOutSpecimens {
    ids: HashSet<String>,
}

impl HeldOutSpecimens {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads one specimen identifier per row.
    ///
    /// Only the first comma-separated column is used; blank rows are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(FoldError::at(path))?;
        let mut ids = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(FoldError::at(path))?;
            let Some(first) = split_record(line.trim_end_matches('\r')).into_iter().next() else {
                continue;
            };
            let id = first.trim();
            if !id.is_empty() {
                ids.insert(id.to_string());
            }
        }
        Ok(Self { ids })
    }

    /// Returns `true` if `specimen` is held out.
    #[must_use]
    pub fn contains(&self, specimen: &str) -> bool {
        self.ids.contains(specimen)
    }

    /// Returns `true` if `sample` comes from a held-out specimen.
    #[must_use]
    pub fn holds(&self, sample: &Sample) -> bool {
        self.contains(&sample.specimen)
    }

    /// Number of held-out specimens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if no specimen is held out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for HeldOutSpecimens {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Splits samples into `(held, available)`, preserving order.
#[must_use]
pub fn partition(samples: Vec<Sample>, held: &HeldOutSpecimens) -> (Vec<Sample>, Vec<Sample>) {
    samples.into_iter().partition(|s| held.holds(s))
}
