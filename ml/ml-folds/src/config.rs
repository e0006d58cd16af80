//! Run configuration.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FoldError, Result};
use crate::splits::FoldCaps;

/// Name of the manifest inside the working directory.
pub const MANIFEST_FILE: &str = "manifest.csv";

/// Configuration for one organize run.
///
/// # Example
///
/// ```
/// use ml_folds::OrganizeConfig;
///
/// let config = OrganizeConfig::new("/data/work", "exp1", "/data/labels.json")
///     .with_seed(3)
///     .with_max_test(250);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.caps().max_train, 2000);
/// assert_eq!(config.caps().max_test, 250);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizeConfig {
    /// Working directory holding `manifest.csv` and `all_patches/`.
    pub workdir: PathBuf,

    /// Experiment identifier; the link tree goes under `<workdir>/<expid>`.
    pub expid: String,

    /// Label configuration JSON.
    pub label_info: PathBuf,

    /// Per-fold override applied on top of the fold caps (0 = none).
    pub max_samples: usize,

    /// Train cap per class (0 = unbounded).
    pub max_train: usize,

    /// Validation cap per class (0 = unbounded).
    pub max_val: usize,

    /// Test cap per class (0 = unbounded).
    pub max_test: usize,

    /// Shuffle seed.
    pub seed: u64,

    /// Optional held-out specimen list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_specimens: Option<PathBuf>,

    /// Optional path for a JSON copy of the summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_json: Option<PathBuf>,

    /// Allocate and report without touching the link tree.
    #[serde(default)]
    pub dry_run: bool,
}

impl OrganizeConfig {
    /// Creates a config with default caps and seed.
    #[must_use]
    pub fn new(
        workdir: impl Into<PathBuf>,
        expid: impl Into<String>,
        label_info: impl Into<PathBuf>,
    ) -> Self {
        let caps = FoldCaps::default();
        Self {
            workdir: workdir.into(),
            expid: expid.into(),
            label_info: label_info.into(),
            max_samples: 0,
            max_train: caps.max_train,
            max_val: caps.max_val,
            max_test: caps.max_test,
            seed: 0,
            test_specimens: None,
            summary_json: None,
            dry_run: false,
        }
    }

    /// Sets the per-fold override.
    #[must_use]
    pub const fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Sets the train cap.
    #[must_use]
    pub const fn with_max_train(mut self, max_train: usize) -> Self {
        self.max_train = max_train;
        self
    }

    /// Sets the validation cap.
    #[must_use]
    pub const fn with_max_val(mut self, max_val: usize) -> Self {
        self.max_val = max_val;
        self
    }

    /// Sets the test cap.
    #[must_use]
    pub const fn with_max_test(mut self, max_test: usize) -> Self {
        self.max_test = max_test;
        self
    }

    /// Sets the shuffle seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the held-out specimen list.
    #[must_use]
    pub fn with_test_specimens(mut self, path: impl Into<PathBuf>) -> Self {
        self.test_specimens = Some(path.into());
        self
    }

    /// Sets the JSON summary path.
    #[must_use]
    pub fn with_summary_json(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_json = Some(path.into());
        self
    }

    /// Skips link materialization.
    #[must_use]
    pub const fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Effective per-class fold caps.
    #[must_use]
    pub const fn caps(&self) -> FoldCaps {
        FoldCaps::new(self.max_train, self.max_val, self.max_test).with_fold_limit(self.max_samples)
    }

    /// Path of the manifest file.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.workdir.join(MANIFEST_FILE)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a required path is empty or `expid` is not a
    /// single plain path component.
    pub fn validate(&self) -> Result<()> {
        if self.workdir.as_os_str().is_empty() {
            return Err(FoldError::config("workdir cannot be empty"));
        }

        if self.label_info.as_os_str().is_empty() {
            return Err(FoldError::config("label info path cannot be empty"));
        }

        let mut components = Path::new(&self.expid).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                return Err(FoldError::config(format!(
                    "expid must be a plain directory name, got {:?}",
                    self.expid
                )));
            }
        }

        Ok(())
    }
}
