//! Fold allocation.
//!
//! Each class's samples are shuffled with a seeded generator and then cut
//! into train/val/test by one of two policies:
//!
//! - [`ProportionalPolicy`] halves the list for train, halves the remainder
//!   for val and gives the rest to test.
//! - [`SpecimenAwarePolicy`] reserves samples from held-out specimens for
//!   test and splits the others roughly 2:1 between train and val.
//!
//! Every fold is additionally bounded by [`FoldCaps`].

use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classes::ClassAssignment;
use crate::sample::Sample;
use crate::specimens::{HeldOutSpecimens, partition};

/// Share of the non-held-out pool given to train by [`SpecimenAwarePolicy`].
pub const SPECIMEN_TRAIN_SHARE: f64 = 0.67;

/// One of the three output folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fold {
    /// Training fold.
    Train,
    /// Validation fold.
    Val,
    /// Test fold.
    Test,
}

impl Fold {
    /// All folds in output order.
    pub const ALL: [Self; 3] = [Self::Train, Self::Val, Self::Test];

    /// Returns the fold's directory name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for Fold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-class, per-fold sample limits. A cap of 0 means unbounded.
///
/// # Example
///
/// ```
/// use ml_folds::FoldCaps;
///
/// let caps = FoldCaps::default();
/// assert_eq!((caps.max_train, caps.max_val, caps.max_test), (2000, 1000, 0));
///
/// let tight = caps.with_fold_limit(500);
/// assert_eq!((tight.max_train, tight.max_val, tight.max_test), (500, 500, 500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldCaps {
    /// Train cap.
    pub max_train: usize,
    /// Validation cap.
    pub max_val: usize,
    /// Test cap.
    pub max_test: usize,
}

impl FoldCaps {
    /// Creates caps.
    #[must_use]
    pub const fn new(max_train: usize, max_val: usize, max_test: usize) -> Self {
        Self {
            max_train,
            max_val,
            max_test,
        }
    }

    /// Caps that never truncate.
    pub const UNBOUNDED: Self = Self::new(0, 0, 0);

    /// Tightens every fold to at most `limit` samples. `0` leaves the caps
    /// unchanged.
    #[must_use]
    pub const fn with_fold_limit(self, limit: usize) -> Self {
        if limit == 0 {
            return self;
        }
        Self {
            max_train: tighten(self.max_train, limit),
            max_val: tighten(self.max_val, limit),
            max_test: tighten(self.max_test, limit),
        }
    }
}

const fn tighten(cap: usize, limit: usize) -> usize {
    if cap == 0 || cap > limit { limit } else { cap }
}

impl Default for FoldCaps {
    fn default() -> Self {
        Self::new(2000, 1000, 0)
    }
}

/// Number of samples to take from `available` under `cap`.
///
/// ```
/// use ml_folds::nsam;
///
/// assert_eq!(nsam(7, 0), 7);
/// assert_eq!(nsam(7, 3), 3);
/// assert_eq!(nsam(2, 3), 2);
/// ```
#[must_use]
pub fn nsam(available: usize, cap: usize) -> usize {
    if cap == 0 { available } else { available.min(cap) }
}

/// Train/val/test lists for one class.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Folds {
    /// Training samples.
    pub train: Vec<Sample>,
    /// Validation samples.
    pub val: Vec<Sample>,
    /// Test samples.
    pub test: Vec<Sample>,
}

impl Folds {
    /// Returns the samples of `fold`.
    #[must_use]
    pub fn get(&self, fold: Fold) -> &[Sample] {
        match fold {
            Fold::Train => &self.train,
            Fold::Val => &self.val,
            Fold::Test => &self.test,
        }
    }

    /// Iterates `(fold, samples)` in output order.
    pub fn iter(&self) -> impl Iterator<Item = (Fold, &[Sample])> {
        Fold::ALL.into_iter().map(|fold| (fold, self.get(fold)))
    }

    /// Number of samples kept across all folds.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }
}

/// Moves a cursor over a shuffled list, handing out consecutive runs.
struct Cursor {
    items: Vec<Sample>,
    pos: usize,
}

impl Cursor {
    fn new(items: Vec<Sample>) -> Self {
        Self { items, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.items.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Vec<Sample> {
        let end = (self.pos + n).min(self.items.len());
        let run = self.items[self.pos..end].to_vec();
        self.pos = end;
        run
    }
}

/// Strategy for cutting a shuffled class list into folds.
pub trait FoldPolicy {
    /// Splits `shuffled` into folds under `caps`.
    fn split(&self, shuffled: Vec<Sample>, caps: &FoldCaps) -> Folds;
}

/// Sequential halving: train, then val, then test.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProportionalPolicy;

impl FoldPolicy for ProportionalPolicy {
    fn split(&self, shuffled: Vec<Sample>, caps: &FoldCaps) -> Folds {
        let mut cursor = Cursor::new(shuffled);

        let n_train = nsam(cursor.remaining() / 2, caps.max_train);
        let train = cursor.take(n_train);

        let n_val = nsam(cursor.remaining() / 2, caps.max_val);
        let val = cursor.take(n_val);

        let n_test = nsam(cursor.remaining(), caps.max_test);
        let test = cursor.take(n_test);

        Folds { train, val, test }
    }
}

/// Test comes only from held-out specimens; train/val only from the rest.
#[derive(Debug, Clone, Copy)]
pub struct SpecimenAwarePolicy<'a> {
    held: &'a HeldOutSpecimens,
}

impl<'a> SpecimenAwarePolicy<'a> {
    /// Creates the policy for `held`.
    #[must_use]
    pub const fn new(held: &'a HeldOutSpecimens) -> Self {
        Self { held }
    }
}

impl FoldPolicy for SpecimenAwarePolicy<'_> {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn split(&self, shuffled: Vec<Sample>, caps: &FoldCaps) -> Folds {
        let (held, pool) = partition(shuffled, self.held);

        let mut test_pool = Cursor::new(held);
        let n_test = nsam(test_pool.remaining(), caps.max_test);
        let test = test_pool.take(n_test);

        let mut pool = Cursor::new(pool);
        let share = (pool.remaining() as f64 * SPECIMEN_TRAIN_SHARE).floor() as usize;
        let train = pool.take(nsam(share, caps.max_train));

        let n_val = nsam(pool.remaining(), caps.max_val);
        let val = pool.take(n_val);

        Folds { train, val, test }
    }
}

/// Shuffles one class's samples and splits them into folds.
///
/// Uses [`SpecimenAwarePolicy`] when `held` is non-empty and
/// [`ProportionalPolicy`] otherwise. `rng` is the only source of
/// randomness; the same generator state and input order always give the
/// same folds.
///
/// # Example
///
/// ```
/// use ml_folds::{FoldCaps, HeldOutSpecimens, Sample, allocate};
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
///
/// let samples: Vec<Sample> = (0..10).map(|i| Sample::new(format!("p{i}"), "tumor")).collect();
/// let mut rng = ChaCha8Rng::seed_from_u64(0);
/// let folds = allocate(samples, &FoldCaps::new(6, 3, 0), &HeldOutSpecimens::new(), &mut rng);
///
/// assert_eq!(folds.train.len(), 5);
/// assert_eq!(folds.val.len(), 2);
/// assert_eq!(folds.test.len(), 3);
/// ```
pub fn allocate<R: RngCore>(
    mut samples: Vec<Sample>,
    caps: &FoldCaps,
    held: &HeldOutSpecimens,
    rng: &mut R,
) -> Folds {
    samples.shuffle(rng);

    if held.is_empty() {
        ProportionalPolicy.split(samples, caps)
    } else {
        SpecimenAwarePolicy::new(held).split(samples, caps)
    }
}

/// Allocation result for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassFolds {
    /// Class name.
    pub name: String,
    /// Samples available before allocation.
    pub total: usize,
    /// `None` for ignored classes.
    pub folds: Option<Folds>,
}

impl ClassFolds {
    /// Returns `true` if the class was skipped.
    #[must_use]
    pub const fn is_ignored(&self) -> bool {
        self.folds.is_none()
    }
}

/// Folds for every class, in configuration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FoldAssignment {
    /// Per-class folds.
    pub classes: Vec<ClassFolds>,
}

impl FoldAssignment {
    /// Returns the folds of `class`, if it was allocated.
    #[must_use]
    pub fn get(&self, class: &str) -> Option<&Folds> {
        self.classes
            .iter()
            .find(|c| c.name == class)
            .and_then(|c| c.folds.as_ref())
    }

    /// Iterates `(class, folds)` over allocated classes.
    pub fn allocated(&self) -> impl Iterator<Item = (&str, &Folds)> {
        self.classes
            .iter()
            .filter_map(|c| c.folds.as_ref().map(|f| (c.name.as_str(), f)))
    }
}

/// Allocates every class with one generator seeded from `seed`.
///
/// Classes are visited in configuration order. Ignored classes are
/// recorded with their total but do not draw from the generator.
#[must_use]
pub fn allocate_classes(
    assignment: ClassAssignment,
    caps: &FoldCaps,
    held: &HeldOutSpecimens,
    seed: u64,
) -> FoldAssignment {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let classes = assignment
        .classes
        .into_iter()
        .map(|class| {
            let total = class.samples.len();
            let folds = if class.ignore {
                debug!(class = %class.name, total, "class ignored");
                None
            } else {
                let folds = allocate(class.samples, caps, held, &mut rng);
                debug!(
                    class = %class.name,
                    total,
                    train = folds.train.len(),
                    val = folds.val.len(),
                    test = folds.test.len(),
                    "class allocated"
                );
                Some(folds)
            };
            ClassFolds {
                name: class.name,
                total,
                folds,
            }
        })
        .collect();

    FoldAssignment { classes }
}
