//! Class-balanced train/val/test folds for labeled image patches.
//!
//! This crate turns a sample manifest into a fold tree for a patch
//! classifier:
//!
//! # Pipeline
//!
//! - [`read_manifest`] - Parse `manifest.csv` rows into [`Sample`]s
//! - [`ClassMatcher`] - Map raw labels to classes, first match wins
//! - [`HeldOutSpecimens`] - Specimens reserved for the test fold
//! - [`allocate`] - Shuffle and cut one class into [`Folds`]
//! - [`FoldReport`] - Per-class counts as a fixed-width table
//! - [`materialize`] - Write `<expid>/patches/<fold>/<class>/` symlinks
//! - [`organize`] - All of the above for one [`OrganizeConfig`]
//!
//! # Example
//!
//! ```
//! use ml_folds::{ClassDefinition, ClassMatcher, FoldCaps, HeldOutSpecimens, Sample};
//!
//! let matcher = ClassMatcher::new(vec![
//!     ClassDefinition::new("tumor", ["tumor"]),
//!     ClassDefinition::new("other", [".*"]).ignored(),
//! ])
//! .unwrap();
//!
//! let rows = (0..10)
//!     .map(|i| (i + 1, Sample::new(format!("p{i}"), "tumor core")))
//!     .collect();
//! let classes = matcher.assign(rows).unwrap();
//!
//! let folds = ml_folds::allocate_classes(
//!     classes,
//!     &FoldCaps::new(6, 3, 0),
//!     &HeldOutSpecimens::new(),
//!     0,
//! );
//! let tumor = folds.get("tumor").unwrap();
//! assert_eq!(tumor.retained(), 10);
//! assert!(folds.get("other").is_none());
//! ```
//!
//! # Quality Standards
//!
//! - Zero clippy/doc warnings
//! - Zero `unwrap`/`expect` in library code

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod classes;
mod config;
mod error;
mod links;
mod organize;
mod sample;
mod specimens;
mod splits;
mod summary;

// Re-export sample types
pub use sample::{
    BoundingBox, MANIFEST_FIELDS, Sample, is_patch_id, parse_manifest, read_manifest,
    split_record,
};

// Re-export class matching
pub use classes::{
    ClassAssignment, ClassDefinition, ClassMatcher, ClassSamples, load_label_config,
};

// Re-export specimen filtering
pub use specimens::{HeldOutSpecimens, partition};

// Re-export fold allocation
pub use splits::{
    ClassFolds, Fold, FoldAssignment, FoldCaps, FoldPolicy, Folds, ProportionalPolicy,
    SPECIMEN_TRAIN_SHARE, SpecimenAwarePolicy, allocate, allocate_classes, nsam,
};

// Re-export summary types
pub use summary::{ClassCounts, FoldReport};

// Re-export link tree
pub use links::{
    LinkLayout, LinkStats, PATCH_EXTENSION, PATCH_STORE_DIR, PATCHES_DIR, REFRESH_MARKER,
    link_target, materialize, refresh_dir,
};

// Re-export configuration and pipeline
pub use config::{MANIFEST_FILE, OrganizeConfig};
pub use organize::{OrganizeOutcome, organize};

// Re-export error types
pub use error::{FoldError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        ClassDefinition, ClassMatcher, Fold, FoldAssignment, FoldCaps, FoldError, FoldReport,
        Folds, HeldOutSpecimens, LinkLayout, OrganizeConfig, Sample, allocate, allocate_classes,
        materialize, organize,
    };
}
