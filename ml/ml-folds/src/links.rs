//! Symbolic link tree for a fold assignment.
//!
//! Layout, relative to the working directory:
//!
//! ```text
//! all_patches/<id>.png                          shared patch store
//! <expid>/patches/<fold>/<class>/<id>.png  ->  ../../../../all_patches/<id>.png
//! ```
//!
//! Each `(fold, class)` directory is refreshed as a unit: existing `.png`
//! links are removed before the new ones are created. A marker file is held
//! in the directory for the duration of the refresh, so a run that died
//! half way leaves evidence behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{FoldError, Result};
use crate::sample::{Sample, is_patch_id};
use crate::splits::{Fold, FoldAssignment};

/// Shared patch store directory name, under the working directory.
pub const PATCH_STORE_DIR: &str = "all_patches";

/// Directory under the experiment that holds the fold tree.
pub const PATCHES_DIR: &str = "patches";

/// Extension of patch files and links.
pub const PATCH_EXTENSION: &str = "png";

/// Present in a class directory while it is being refreshed.
pub const REFRESH_MARKER: &str = ".refresh-in-progress";

/// Where links and their targets live.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use ml_folds::{Fold, LinkLayout};
///
/// let layout = LinkLayout::new("/data/work", "exp1");
/// assert_eq!(
///     layout.fold_dir(Fold::Val, "tumor"),
///     Path::new("/data/work/exp1/patches/val/tumor")
/// );
/// assert_eq!(layout.patch_store(), Path::new("/data/work/all_patches"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkLayout {
    workdir: PathBuf,
    expid: String,
}

impl LinkLayout {
    /// Creates a layout for `expid` under `workdir`.
    #[must_use]
    pub fn new(workdir: impl Into<PathBuf>, expid: impl Into<String>) -> Self {
        Self {
            workdir: workdir.into(),
            expid: expid.into(),
        }
    }

    /// Directory holding the real patch files.
    #[must_use]
    pub fn patch_store(&self) -> PathBuf {
        self.workdir.join(PATCH_STORE_DIR)
    }

    /// Root of the fold tree.
    #[must_use]
    pub fn patches_root(&self) -> PathBuf {
        self.workdir.join(&self.expid).join(PATCHES_DIR)
    }

    /// Leaf directory for `fold` and `class`.
    #[must_use]
    pub fn fold_dir(&self, fold: Fold, class: &str) -> PathBuf {
        self.patches_root().join(fold.name()).join(class)
    }
}

/// Relative target of the link for sample `id`.
#[must_use]
pub fn link_target(id: &str) -> PathBuf {
    Path::new("../../../..")
        .join(PATCH_STORE_DIR)
        .join(format!("{id}.{PATCH_EXTENSION}"))
}

/// Counts from a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStats {
    /// Directories refreshed.
    pub dirs: usize,
    /// Stale links removed.
    pub removed: usize,
    /// Links created.
    pub created: usize,
    /// Directories found with a leftover refresh marker.
    pub interrupted: usize,
}

impl LinkStats {
    fn absorb(&mut self, other: Self) {
        self.dirs += other.dirs;
        self.removed += other.removed;
        self.created += other.created;
        self.interrupted += other.interrupted;
    }
}

fn is_patch_name(name: &std::ffi::OsStr) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext == PATCH_EXTENSION)
}

#[cfg(unix)]
fn create_link(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn create_link(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are only supported on Unix",
    ))
}

/// Removes every `.png` symlink in `dir`. Other entries are left alone.
fn clear_links(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir).map_err(FoldError::at(dir))? {
        let entry = entry.map_err(FoldError::at(dir))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(FoldError::at(&path))?;
        if file_type.is_symlink() && is_patch_name(&entry.file_name()) {
            fs::remove_file(&path).map_err(FoldError::at(&path))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Replaces the links in `dir` with one link per sample.
///
/// Creates `dir` and its parents if needed.
///
/// # Errors
///
/// Returns an error if a sample id cannot name a link in `dir`, the
/// directory cannot be prepared, a stale link cannot be removed, a regular
/// file sits at a link path, or a link cannot be created. Ids are checked
/// before anything on disk changes.
pub fn refresh_dir(dir: &Path, samples: &[Sample]) -> Result<LinkStats> {
    if let Some(bad) = samples.iter().find(|s| !is_patch_id(&s.id)) {
        return Err(FoldError::InvalidSampleId(bad.id.clone()));
    }
    fs::create_dir_all(dir).map_err(FoldError::at(dir))?;

    let mut stats = LinkStats {
        dirs: 1,
        ..LinkStats::default()
    };

    let marker = dir.join(REFRESH_MARKER);
    if marker.symlink_metadata().is_ok() {
        warn!(dir = %dir.display(), "previous link refresh did not complete; redoing it");
        stats.interrupted = 1;
    }
    fs::write(&marker, b"").map_err(FoldError::at(&marker))?;

    stats.removed = clear_links(dir)?;

    for sample in samples {
        let link = dir.join(sample.patch_file_name());
        if let Ok(meta) = link.symlink_metadata() {
            if !meta.file_type().is_symlink() {
                return Err(FoldError::LinkConflict(link));
            }
        }
        create_link(&link_target(&sample.id), &link).map_err(FoldError::at(&link))?;
        stats.created += 1;
    }

    fs::remove_file(&marker).map_err(FoldError::at(&marker))?;

    debug!(
        dir = %dir.display(),
        removed = stats.removed,
        created = stats.created,
        "refreshed links"
    );
    Ok(stats)
}

/// Writes the link tree for every allocated class.
///
/// Ignored classes are not touched.
///
/// # Errors
///
/// Returns [`FoldError::PatchStoreMissing`] if the shared patch store does
/// not exist, or the first error from [`refresh_dir`].
pub fn materialize(layout: &LinkLayout, assignment: &FoldAssignment) -> Result<LinkStats> {
    let store = layout.patch_store();
    if !store.is_dir() {
        return Err(FoldError::PatchStoreMissing(store));
    }

    let mut stats = LinkStats::default();
    for (class, folds) in assignment.allocated() {
        for (fold, samples) in folds.iter() {
            stats.absorb(refresh_dir(&layout.fold_dir(fold, class), samples)?);
        }
    }

    info!(
        root = %layout.patches_root().display(),
        dirs = stats.dirs,
        removed = stats.removed,
        created = stats.created,
        "link tree written"
    );
    Ok(stats)
}

#[cfg(all(test, unix))]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::splits::{ClassFolds, Folds};

    fn links_in(dir: &Path) -> BTreeSet<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn samples(ids: &[&str]) -> Vec<Sample> {
        ids.iter().map(|id| Sample::new(*id, "tumor")).collect()
    }

    #[test]
    fn link_target_is_relative_to_store() {
        assert_eq!(
            link_target("p7"),
            Path::new("../../../../all_patches/p7.png")
        );
    }

    #[test]
    fn refresh_creates_links() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("exp/patches/train/tumor");

        let stats = refresh_dir(&dir, &samples(&["a", "b"])).unwrap();
        assert_eq!(stats.created, 2);
        assert_eq!(stats.removed, 0);
        assert_eq!(links_in(&dir), BTreeSet::from(["a.png".to_string(), "b.png".to_string()]));
        assert_eq!(
            fs::read_link(dir.join("a.png")).unwrap(),
            Path::new("../../../../all_patches/a.png")
        );
    }

    #[test]
    fn refresh_replaces_stale_links_only() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("leaf");
        refresh_dir(&dir, &samples(&["old1", "old2"])).unwrap();
        fs::write(dir.join("notes.txt"), b"keep").unwrap();

        let stats = refresh_dir(&dir, &samples(&["new"])).unwrap();
        assert_eq!(stats.removed, 2);
        assert_eq!(
            links_in(&dir),
            BTreeSet::from(["new.png".to_string(), "notes.txt".to_string()])
        );
    }

    #[test]
    fn refresh_rejects_regular_file_at_link_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("leaf");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.png"), b"not a link").unwrap();

        let err = refresh_dir(&dir, &samples(&["a"])).unwrap_err();
        assert!(matches!(err, FoldError::LinkConflict(_)));
        // the marker stays behind so the failure is visible
        assert!(dir.join(REFRESH_MARKER).exists());
    }

    #[test]
    fn refresh_rejects_ids_outside_the_leaf() {
        let tmp = tempfile::tempdir().unwrap();
        let fold = tmp.path().join("train");
        let dir = fold.join("tumor");

        for id in ["", "../escaped"] {
            let err = refresh_dir(&dir, &samples(&["a", id])).unwrap_err();
            assert!(matches!(err, FoldError::InvalidSampleId(_)));
        }
        assert!(!dir.exists());
        assert!(!fold.join("escaped.png").exists());

        refresh_dir(&dir, &samples(&["a"])).unwrap();
        refresh_dir(&dir, &[]).unwrap();
        assert!(links_in(&dir).is_empty());
    }

    #[test]
    fn refresh_detects_interrupted_run() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("leaf");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(REFRESH_MARKER), b"").unwrap();

        let stats = refresh_dir(&dir, &samples(&["a"])).unwrap();
        assert_eq!(stats.interrupted, 1);
        assert!(!dir.join(REFRESH_MARKER).exists());
    }

    #[test]
    fn materialize_requires_patch_store() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = LinkLayout::new(tmp.path(), "exp");
        let err = materialize(&layout, &FoldAssignment::default()).unwrap_err();
        assert!(matches!(err, FoldError::PatchStoreMissing(_)));
    }

    #[test]
    fn materialize_skips_ignored_classes() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join(PATCH_STORE_DIR)).unwrap();
        let layout = LinkLayout::new(tmp.path(), "exp");
        let assignment = FoldAssignment {
            classes: vec![
                ClassFolds {
                    name: "tumor".into(),
                    total: 3,
                    folds: Some(Folds {
                        train: samples(&["t1"]),
                        val: samples(&["t2"]),
                        test: samples(&["t3"]),
                    }),
                },
                ClassFolds {
                    name: "bg".into(),
                    total: 5,
                    folds: None,
                },
            ],
        };

        let stats = materialize(&layout, &assignment).unwrap();
        assert_eq!(stats.dirs, 3);
        assert_eq!(stats.created, 3);
        assert!(layout.fold_dir(Fold::Test, "tumor").join("t3.png").is_symlink());
        assert!(!layout.fold_dir(Fold::Train, "bg").exists());
    }
}
