//! End-to-end organize run.

use tracing::info;

use crate::classes::{ClassMatcher, load_label_config};
use crate::config::OrganizeConfig;
use crate::error::{FoldError, Result};
use crate::links::{LinkLayout, LinkStats, materialize};
use crate::sample::read_manifest;
use crate::specimens::HeldOutSpecimens;
use crate::splits::{FoldAssignment, allocate_classes};
use crate::summary::FoldReport;

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganizeOutcome {
    /// Folds per class.
    pub assignment: FoldAssignment,
    /// Per-class counts.
    pub report: FoldReport,
    /// `None` for dry runs.
    pub links: Option<LinkStats>,
}

/// Reads the inputs named by `config`, allocates folds and writes the link
/// tree.
///
/// All configuration inputs are loaded and checked before the manifest is
/// classified, and the manifest is fully classified before anything on
/// disk changes.
///
/// # Errors
///
/// Returns the first configuration, manifest, classification or
/// file-system error. No retries are attempted.
pub fn organize(config: &OrganizeConfig) -> Result<OrganizeOutcome> {
    config.validate()?;

    let matcher = ClassMatcher::new(load_label_config(&config.label_info)?)?;
    let held = match &config.test_specimens {
        Some(path) => HeldOutSpecimens::load(path)?,
        None => HeldOutSpecimens::new(),
    };
    let caps = config.caps();
    info!(
        classes = ?matcher.class_names().collect::<Vec<_>>(),
        held_out_specimens = held.len(),
        max_train = caps.max_train,
        max_val = caps.max_val,
        max_test = caps.max_test,
        seed = config.seed,
        "configuration loaded"
    );

    let rows = read_manifest(&config.manifest_path())?;
    info!(samples = rows.len(), "manifest read");

    let classes = matcher.assign(rows)?;
    info!(classified = classes.total(), "labels matched");
    let assignment = allocate_classes(classes, &caps, &held, config.seed);
    let report = FoldReport::from_assignment(&assignment);
    info!(
        retained = report.retained(),
        dropped = report.dropped(),
        "folds allocated"
    );

    let links = if config.dry_run {
        info!("dry run, link tree left untouched");
        None
    } else {
        let layout = LinkLayout::new(&config.workdir, &config.expid);
        Some(materialize(&layout, &assignment)?)
    };

    if let Some(path) = &config.summary_json {
        std::fs::write(path, report.to_json()?).map_err(FoldError::at(path))?;
    }

    Ok(OrganizeOutcome {
        assignment,
        report,
        links,
    })
}
