//! Manifest sample records and manifest parsing.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FoldError, Result};

/// Manifest column names, in file order.
pub const MANIFEST_FIELDS: [&str; 14] = [
    "id", "slide", "label", "x", "y", "w", "h", "t_create", "u_create", "t_modify", "u_modify",
    "specimen", "block", "stain",
];

/// Patch bounding box on the source slide.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub w: f64,
    /// Height.
    pub h: f64,
}

/// A single manifest row: one extracted image patch.
///
/// # Example
///
/// ```
/// use ml_folds::Sample;
///
/// let sample = Sample::new("p001", "tumor core").with_specimen("S12");
/// assert_eq!(sample.id, "p001");
/// assert_eq!(sample.specimen, "S12");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sample {
    /// Unique sample identifier; also the patch file stem.
    pub id: String,

    /// Slide identifier.
    pub slide: String,

    /// Raw annotation label.
    pub label: String,

    /// Patch geometry, `None` when a coordinate is blank or not a number.
    pub bbox: Option<BoundingBox>,

    /// Creation timestamp.
    pub t_create: String,

    /// Creating user.
    pub u_create: String,

    /// Modification timestamp.
    pub t_modify: String,

    /// Modifying user.
    pub u_modify: String,

    /// Specimen the slide was cut from.
    pub specimen: String,

    /// Tissue block identifier.
    pub block: String,

    /// Stain identifier.
    pub stain: String,
}

impl Sample {
    /// Creates a sample with just an ID and label.
    ///
    /// Useful for testing or as a placeholder.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            ..Self::default()
        }
    }

    /// Sets the specimen identifier.
    #[must_use]
    pub fn with_specimen(mut self, specimen: impl Into<String>) -> Self {
        self.specimen = specimen.into();
        self
    }

    /// Builds a sample from the 14 manifest fields.
    ///
    /// Coordinates are informational: a row with a blank or non-numeric
    /// coordinate is kept, with `bbox` set to `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the field count is wrong or the id cannot name a
    /// patch file (see [`is_patch_id`]). `line` is used for reporting only.
    pub fn from_fields(line: usize, fields: Vec<String>) -> Result<Self> {
        if fields.len() != MANIFEST_FIELDS.len() {
            return Err(FoldError::manifest(
                line,
                format!(
                    "expected {} fields, found {}",
                    MANIFEST_FIELDS.len(),
                    fields.len()
                ),
            ));
        }

        if !is_patch_id(&fields[0]) {
            return Err(FoldError::manifest(
                line,
                format!("sample id {:?} cannot name a patch file", fields[0]),
            ));
        }

        let coord = |idx: usize| fields[idx].trim().parse::<f64>().ok();
        let bbox = match (coord(3), coord(4), coord(5), coord(6)) {
            (Some(x), Some(y), Some(w), Some(h)) => Some(BoundingBox { x, y, w, h }),
            _ => None,
        };

        let mut it = fields.into_iter();
        let mut next = || it.next().unwrap_or_default();
        let id = next();
        let slide = next();
        let label = next();
        for _ in 0..4 {
            next();
        }

        Ok(Self {
            id,
            slide,
            label,
            bbox,
            t_create: next(),
            u_create: next(),
            t_modify: next(),
            u_modify: next(),
            specimen: next(),
            block: next(),
            stain: next(),
        })
    }

    /// Returns the patch file name, `<id>.png`.
    #[must_use]
    pub fn patch_file_name(&self) -> String {
        format!("{}.png", self.id)
    }
}

/// Returns `true` if `id` can be used as a patch file stem.
///
/// The id must be non-empty, must not start with `.` and must not contain a
/// path separator, so `<id>.png` always names a plain file inside one
/// directory.
#[must_use]
pub fn is_patch_id(id: &str) -> bool {
    !id.is_empty() && !id.starts_with('.') && !id.contains(['/', '\\'])
}

/// Splits one comma-separated line into fields.
///
/// Double-quoted fields may contain commas; `""` inside quotes is a literal
/// quote.
#[must_use]
pub fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Parses manifest rows from a reader.
///
/// Blank lines are skipped. Returns samples paired with their 1-based line
/// numbers so later stages can point at the offending row.
///
/// # Errors
///
/// Returns an error on read failure or a malformed row.
pub fn parse_manifest<R: BufRead>(reader: R) -> Result<Vec<(usize, Sample)>> {
    let mut samples = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|err| FoldError::manifest(line_no, err.to_string()))?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        samples.push((line_no, Sample::from_fields(line_no, split_record(line))?));
    }
    Ok(samples)
}

/// Reads the manifest file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a row is malformed.
pub fn read_manifest(path: &Path) -> Result<Vec<(usize, Sample)>> {
    let file = File::open(path).map_err(FoldError::at(path))?;
    parse_manifest(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW: &str = "p001,slide_07,tumor core,10,20,64,64,2021-03-01,ann,2021-03-02,rev,S12,B3,HE";

    #[test]
    fn sample_new() {
        let sample = Sample::new("p9", "stroma").with_specimen("S1");
        assert_eq!(sample.id, "p9");
        assert_eq!(sample.label, "stroma");
        assert_eq!(sample.specimen, "S1");
        assert_eq!(sample.patch_file_name(), "p9.png");
    }

    #[test]
    fn split_record_plain() {
        let fields = split_record("a,b,,d");
        assert_eq!(fields, vec!["a", "b", "", "d"]);
    }

    #[test]
    fn split_record_quoted() {
        let fields = split_record(r#"p1,"tumor, necrotic","say ""hi""",x"#);
        assert_eq!(fields, vec!["p1", "tumor, necrotic", r#"say "hi""#, "x"]);
    }

    #[test]
    fn from_fields_maps_columns() {
        let sample = Sample::from_fields(1, split_record(ROW)).unwrap();
        assert_eq!(sample.id, "p001");
        assert_eq!(sample.slide, "slide_07");
        assert_eq!(sample.label, "tumor core");
        assert_eq!(
            sample.bbox,
            Some(BoundingBox {
                x: 10.0,
                y: 20.0,
                w: 64.0,
                h: 64.0
            })
        );
        assert_eq!(sample.t_create, "2021-03-01");
        assert_eq!(sample.u_create, "ann");
        assert_eq!(sample.t_modify, "2021-03-02");
        assert_eq!(sample.u_modify, "rev");
        assert_eq!(sample.specimen, "S12");
        assert_eq!(sample.block, "B3");
        assert_eq!(sample.stain, "HE");
    }

    #[test]
    fn from_fields_wrong_count() {
        let err = Sample::from_fields(4, split_record("p1,s,l")).unwrap_err();
        assert!(matches!(err, FoldError::Manifest { line: 4, .. }));
    }

    #[test]
    fn from_fields_keeps_row_without_coordinates() {
        let row = ROW.replace(",10,20,", ",NA,,");
        let sample = Sample::from_fields(2, split_record(&row)).unwrap();
        assert_eq!(sample.id, "p001");
        assert_eq!(sample.bbox, None);
        assert_eq!(sample.specimen, "S12");
    }

    #[test]
    fn from_fields_rejects_unusable_ids() {
        for id in ["", ".hidden", "../escaped", "a/b", r"a\b"] {
            let row = ROW.replacen("p001", id, 1);
            let err = Sample::from_fields(5, split_record(&row)).unwrap_err();
            assert!(
                matches!(err, FoldError::Manifest { line: 5, .. }),
                "id {id:?} accepted"
            );
        }
        assert!(is_patch_id("p.001"));
    }

    #[test]
    fn parse_manifest_reports_invalid_utf8_line() {
        let mut bytes = format!("{ROW}\n").into_bytes();
        bytes.extend_from_slice(b"p002,\xff\xfe,tumor\n");
        let err = parse_manifest(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, FoldError::Manifest { line: 2, .. }));
    }

    #[test]
    fn parse_manifest_skips_blank_lines() {
        let text = format!("{ROW}\n\n{}\r\n", ROW.replace("p001", "p002"));
        let rows = parse_manifest(text.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 1);
        assert_eq!(rows[1].0, 3);
        assert_eq!(rows[1].1.id, "p002");
        assert_eq!(rows[1].1.stain, "HE");
    }

    #[test]
    fn parse_manifest_reports_line() {
        let text = format!("{ROW}\nbroken,row\n");
        let err = parse_manifest(text.as_bytes()).unwrap_err();
        assert!(matches!(err, FoldError::Manifest { line: 2, .. }));
    }
}
