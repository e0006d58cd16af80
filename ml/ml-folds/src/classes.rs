//! Class definitions and ordered label matching.
//!
//! A label is assigned to the first class, in configuration order, that
//! has a pattern matching it. Patterns are anchored at the start of the
//! label, so `tumor` matches `tumor core` but not `peritumoral`.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::{FoldError, Result};
use crate::sample::Sample;

/// One entry of the label configuration document.
///
/// # Example
///
/// ```
/// use ml_folds::ClassDefinition;
///
/// let json = r#"{"classname": "tumor", "labels": ["tumou?r"], "ignore": 0}"#;
/// let def: ClassDefinition = serde_json::from_str(json).unwrap();
/// assert_eq!(def.classname, "tumor");
/// assert!(!def.ignore);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDefinition {
    /// Class name; also the leaf directory name of the link tree.
    pub classname: String,

    /// Label patterns, tried in order.
    pub labels: Vec<String>,

    /// Whether the class is counted but never allocated.
    #[serde(default, deserialize_with = "truthy")]
    pub ignore: bool,
}

impl ClassDefinition {
    /// Creates a class definition.
    #[must_use]
    pub fn new<I, S>(classname: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classname: classname.into(),
            labels: labels.into_iter().map(Into::into).collect(),
            ignore: false,
        }
    }

    /// Marks the class as ignored.
    #[must_use]
    pub const fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }
}

/// Accepts `true`/`false`, numbers (`> 0` is true) and `null`.
fn truthy<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Float(f64),
        Null(()),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n > 0,
        Flag::Float(f) => f > 0.0,
        Flag::Null(()) => false,
    })
}

/// Loads the label configuration JSON array from `path`.
///
/// # Errors
///
/// Returns a label configuration error if the file cannot be read or is
/// not an array of class definitions.
pub fn load_label_config(path: &Path) -> Result<Vec<ClassDefinition>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        FoldError::label_config(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&text)
        .map_err(|e| FoldError::label_config(format!("malformed {}: {e}", path.display())))
}

/// Class names become directory names in the link tree.
fn is_dir_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[derive(Debug)]
struct CompiledClass {
    name: String,
    patterns: Vec<Regex>,
    ignore: bool,
}

impl CompiledClass {
    fn matches(&self, label: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(label))
    }
}

/// Precompiled, ordered label rules.
///
/// # Example
///
/// ```
/// use ml_folds::{ClassDefinition, ClassMatcher};
///
/// let matcher = ClassMatcher::new(vec![
///     ClassDefinition::new("tumor_edge", ["tumor edge"]),
///     ClassDefinition::new("tumor", ["tumor"]),
/// ])
/// .unwrap();
///
/// assert_eq!(matcher.classify("tumor edge 2"), Some("tumor_edge"));
/// assert_eq!(matcher.classify("tumor core"), Some("tumor"));
/// assert_eq!(matcher.classify("stroma"), None);
/// ```
#[derive(Debug)]
pub struct ClassMatcher {
    classes: Vec<CompiledClass>,
}

impl ClassMatcher {
    /// Validates the definitions and compiles their patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, a class name is repeated or
    /// cannot be a directory name, or a pattern does not compile.
    pub fn new(definitions: Vec<ClassDefinition>) -> Result<Self> {
        if definitions.is_empty() {
            return Err(FoldError::label_config("no classes defined"));
        }

        let mut seen = HashSet::new();
        let mut classes = Vec::with_capacity(definitions.len());
        for def in definitions {
            if !is_dir_name(&def.classname) {
                return Err(FoldError::label_config(format!(
                    "classname {:?} is not usable as a directory name",
                    def.classname
                )));
            }
            if !seen.insert(def.classname.clone()) {
                return Err(FoldError::label_config(format!(
                    "duplicate classname {:?}",
                    def.classname
                )));
            }

            let patterns = def
                .labels
                .iter()
                .map(|pattern| {
                    Regex::new(&format!("^(?:{pattern})")).map_err(|e| FoldError::InvalidPattern {
                        class: def.classname.clone(),
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            classes.push(CompiledClass {
                name: def.classname,
                patterns,
                ignore: def.ignore,
            });
        }

        Ok(Self { classes })
    }

    /// Returns the first class whose patterns match `label`.
    #[must_use]
    pub fn classify(&self, label: &str) -> Option<&str> {
        self.classes
            .iter()
            .find(|class| class.matches(label))
            .map(|class| class.name.as_str())
    }

    /// Returns `true` if `class` is configured as ignored.
    #[must_use]
    pub fn is_ignored(&self, class: &str) -> bool {
        self.classes
            .iter()
            .any(|c| c.name == class && c.ignore)
    }

    /// Class names in configuration order.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|c| c.name.as_str())
    }

    /// Number of configured classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns `true` if no classes are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Groups manifest rows by class.
    ///
    /// Rows are `(line, sample)` pairs as returned by
    /// [`crate::read_manifest`].
    ///
    /// # Errors
    ///
    /// Returns [`FoldError::UnmatchedLabel`] for the first row whose label
    /// matches no class.
    pub fn assign(&self, rows: Vec<(usize, Sample)>) -> Result<ClassAssignment> {
        let mut buckets: Vec<Vec<Sample>> = vec![Vec::new(); self.classes.len()];
        for (line, sample) in rows {
            let Some(idx) = self.classes.iter().position(|c| c.matches(&sample.label)) else {
                return Err(FoldError::unmatched_label(line, sample.id, sample.label));
            };
            buckets[idx].push(sample);
        }

        let classes = self
            .classes
            .iter()
            .zip(buckets)
            .map(|(class, samples)| {
                debug!(class = %class.name, count = samples.len(), "assigned samples");
                ClassSamples {
                    name: class.name.clone(),
                    ignore: class.ignore,
                    samples,
                }
            })
            .collect();

        Ok(ClassAssignment { classes })
    }
}

/// Samples assigned to one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSamples {
    /// Class name.
    pub name: String,
    /// Whether the class is ignored.
    pub ignore: bool,
    /// Samples in manifest order.
    pub samples: Vec<Sample>,
}

/// Every configured class with its samples, in configuration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassAssignment {
    /// Per-class sample lists.
    pub classes: Vec<ClassSamples>,
}

impl ClassAssignment {
    /// Returns the samples of `class`, if configured.
    #[must_use]
    pub fn get(&self, class: &str) -> Option<&[Sample]> {
        self.classes
            .iter()
            .find(|c| c.name == class)
            .map(|c| c.samples.as_slice())
    }

    /// Total number of assigned samples.
    #[must_use]
    pub fn total(&self) -> usize {
        self.classes.iter().map(|c| c.samples.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> ClassMatcher {
        ClassMatcher::new(vec![
            ClassDefinition::new("necrosis", ["necro", "dead tissue"]),
            ClassDefinition::new("tumor", ["tumou?r"]),
            ClassDefinition::new("background", ["bg", "background"]).ignored(),
        ])
        .unwrap()
    }

    #[test]
    fn classify_first_match_wins() {
        let m = ClassMatcher::new(vec![
            ClassDefinition::new("specific", ["tumor edge"]),
            ClassDefinition::new("general", ["tumor"]),
        ])
        .unwrap();
        assert_eq!(m.classify("tumor edge"), Some("specific"));
        assert_eq!(m.classify("tumor"), Some("general"));

        let reversed = ClassMatcher::new(vec![
            ClassDefinition::new("general", ["tumor"]),
            ClassDefinition::new("specific", ["tumor edge"]),
        ])
        .unwrap();
        assert_eq!(reversed.classify("tumor edge"), Some("general"));
    }

    #[test]
    fn classify_is_prefix_anchored() {
        let m = matcher();
        assert_eq!(m.classify("tumour nest"), Some("tumor"));
        assert_eq!(m.classify("peritumoral"), None);
        assert_eq!(m.classify("dead tissue"), Some("necrosis"));
    }

    #[test]
    fn anchoring_covers_alternation() {
        let m = ClassMatcher::new(vec![ClassDefinition::new("x", ["a|b"])]).unwrap();
        assert_eq!(m.classify("b1"), Some("x"));
        assert_eq!(m.classify("cb"), None);
    }

    #[test]
    fn ignore_flag_truthy_forms() {
        let json = r#"[
            {"classname": "a", "labels": ["a"], "ignore": 1},
            {"classname": "b", "labels": ["b"], "ignore": 0},
            {"classname": "c", "labels": ["c"], "ignore": true},
            {"classname": "d", "labels": ["d"]},
            {"classname": "e", "labels": ["e"], "ignore": null}
        ]"#;
        let defs: Vec<ClassDefinition> = serde_json::from_str(json).unwrap();
        let flags: Vec<bool> = defs.iter().map(|d| d.ignore).collect();
        assert_eq!(flags, vec![true, false, true, false, false]);
    }

    #[test]
    fn is_ignored() {
        let m = matcher();
        assert!(m.is_ignored("background"));
        assert!(!m.is_ignored("tumor"));
        assert!(!m.is_ignored("unknown"));
    }

    #[test]
    fn rejects_duplicate_classname() {
        let err = ClassMatcher::new(vec![
            ClassDefinition::new("tumor", ["a"]),
            ClassDefinition::new("tumor", ["b"]),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_invalid_pattern() {
        let err = ClassMatcher::new(vec![ClassDefinition::new("bad", ["(unclosed"])]).unwrap_err();
        assert!(matches!(err, FoldError::InvalidPattern { .. }));
    }

    #[test]
    fn rejects_path_like_classname() {
        for name in ["", "..", "a/b"] {
            assert!(ClassMatcher::new(vec![ClassDefinition::new(name, ["x"])]).is_err());
        }
    }

    #[test]
    fn rejects_empty_config() {
        assert!(ClassMatcher::new(Vec::new()).is_err());
    }

    #[test]
    fn assign_groups_in_config_order() {
        let m = matcher();
        let rows = vec![
            (1, Sample::new("p1", "tumor")),
            (2, Sample::new("p2", "bg")),
            (3, Sample::new("p3", "necrotic")),
            (4, Sample::new("p4", "tumour")),
        ];
        let assignment = m.assign(rows).unwrap();

        let names: Vec<&str> = assignment.classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["necrosis", "tumor", "background"]);

        let tumor: Vec<&str> = assignment
            .get("tumor")
            .unwrap()
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(tumor, vec!["p1", "p4"]);
        assert!(assignment.classes[2].ignore);
        assert_eq!(assignment.total(), 4);
    }

    #[test]
    fn assign_keeps_empty_classes() {
        let assignment = matcher().assign(vec![(1, Sample::new("p1", "tumor"))]).unwrap();
        assert_eq!(assignment.classes.len(), 3);
        assert_eq!(assignment.get("necrosis").map(<[Sample]>::len), Some(0));
    }

    #[test]
    fn assign_unmatched_label_is_fatal() {
        let rows = vec![
            (1, Sample::new("p1", "tumor")),
            (2, Sample::new("p2", "fat")),
        ];
        let err = matcher().assign(rows).unwrap_err();
        match err {
            FoldError::UnmatchedLabel { line, id, label } => {
                assert_eq!(line, 2);
                assert_eq!(id, "p2");
                assert_eq!(label, "fat");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
