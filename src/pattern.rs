//! Field extraction from read-file paths.
//!
//! Three user-supplied regular expressions pull the file identifier, the
//! parent directory and the sample grouping key out of every discovered path.
//! Each pattern is searched (not anchored) against the full path string and
//! the first capture group of the first match is the extracted value.
//!
//! # Examples
//!
//! ```
//! use multisheet::pattern::{FieldPattern, PathField};
//!
//! let grouping = FieldPattern::new(PathField::Grouping, r"(sample[A-Z])").unwrap();
//! let key = grouping.extract("/data/run1/sampleA_S1_L001_R1_001.fastq.gz").unwrap();
//! assert_eq!(key, "sampleA");
//! ```

use regex::Regex;

/// Default pattern for the `fastq_id` column: the file name with the sample
/// index, lane and read markers stripped.
pub const DEFAULT_FILE_ID_PATTERN: &str =
    r"(?:.+\/)?([^\/]+?)(?:_S\d+)?(?:_L\d+_)?R\d(?:_\d+)?.fastq(?:.+)?";

/// Default pattern for the `fastqs` column: everything up to the last `/`.
pub const DEFAULT_PARENT_PATH_PATTERN: &str = r"(.+\/)[^\/]+.fastq(?:.+)?";

/// The path field a pattern is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathField {
    /// Per-file identifier, written to the `fastq_id` column.
    FileId,
    /// Directory holding the file, written to the `fastqs` column.
    ParentPath,
    /// Sample key that decides which config sheet the file lands in.
    Grouping,
}

impl PathField {
    /// Returns the command-line option that configures this field.
    pub fn option_name(&self) -> &'static str {
        match self {
            PathField::FileId => "fileID_pattern",
            PathField::ParentPath => "parentPath_pattern",
            PathField::Grouping => "grouping_pattern",
        }
    }
}

/// Errors raised while compiling or applying a field pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// The pattern is not a valid regular expression.
    Invalid {
        field: PathField,
        pattern: String,
        reason: String,
    },
    /// The pattern has no capturing group to extract from.
    NoCaptureGroup { field: PathField, pattern: String },
    /// The pattern did not match the path, or group 1 captured nothing.
    NoMatch { field: PathField, path: String },
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::Invalid {
                field,
                pattern,
                reason,
            } => write!(
                f,
                "Invalid {} '{}': {}",
                field.option_name(),
                pattern,
                reason
            ),
            PatternError::NoCaptureGroup { field, pattern } => write!(
                f,
                "{} '{}' must contain a capturing group around the value to extract",
                field.option_name(),
                pattern
            ),
            PatternError::NoMatch { field, path } => write!(
                f,
                "Error with {}, not able to extract group from file:\n{}",
                field.option_name(),
                path
            ),
        }
    }
}

impl std::error::Error for PatternError {}

/// A compiled regular expression bound to the field it extracts.
#[derive(Debug, Clone)]
pub struct FieldPattern {
    field: PathField,
    regex: Regex,
}

impl FieldPattern {
    /// Compiles `pattern` for `field`.
    ///
    /// # Errors
    ///
    /// Returns `PatternError::Invalid` if the regex does not compile and
    /// `PatternError::NoCaptureGroup` if it has no capturing group.
    /// Non-capturing groups `(?:...)` do not count.
    pub fn new(field: PathField, pattern: &str) -> Result<Self, PatternError> {
        let regex = Regex::new(pattern).map_err(|e| PatternError::Invalid {
            field,
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        // Group 0 is the whole match
        if regex.captures_len() < 2 {
            return Err(PatternError::NoCaptureGroup {
                field,
                pattern: pattern.to_string(),
            });
        }

        Ok(Self { field, regex })
    }

    pub fn field(&self) -> PathField {
        self.field
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Returns the text captured by group 1 of the first match in `path`.
    ///
    /// # Errors
    ///
    /// Returns `PatternError::NoMatch` when the pattern does not match, or
    /// when it matches but group 1 is empty or did not participate.
    pub fn extract<'p>(&self, path: &'p str) -> Result<&'p str, PatternError> {
        self.regex
            .captures(path)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| PatternError::NoMatch {
                field: self.field,
                path: path.to_string(),
            })
    }
}

/// The three field patterns applied to every discovered path.
#[derive(Debug, Clone)]
pub struct PathPatterns {
    pub file_id: FieldPattern,
    pub parent_path: FieldPattern,
    pub grouping: FieldPattern,
}

/// Values extracted from a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFields {
    pub identifier: String,
    pub location: String,
    pub group_key: String,
}

impl PathPatterns {
    /// Compiles the three patterns, falling back to the defaults for the
    /// identifier and parent path.
    pub fn new(
        file_id: Option<&str>,
        parent_path: Option<&str>,
        grouping: &str,
    ) -> Result<Self, PatternError> {
        Ok(Self {
            file_id: FieldPattern::new(
                PathField::FileId,
                file_id.unwrap_or(DEFAULT_FILE_ID_PATTERN),
            )?,
            parent_path: FieldPattern::new(
                PathField::ParentPath,
                parent_path.unwrap_or(DEFAULT_PARENT_PATH_PATTERN),
            )?,
            grouping: FieldPattern::new(PathField::Grouping, grouping)?,
        })
    }

    /// Extracts identifier, location and group key, failing on the first
    /// pattern that does not match.
    pub fn extract_all(&self, path: &str) -> Result<PathFields, PatternError> {
        Ok(PathFields {
            identifier: self.file_id.extract(path)?.to_string(),
            location: self.parent_path.extract(path)?.to_string(),
            group_key: self.grouping.extract(path)?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANE1: &str = "/data/run1/sampleA_S1_L001_R1_001.fastq.gz";

    #[test]
    fn test_default_file_id_strips_lane_and_read() {
        let pattern = FieldPattern::new(PathField::FileId, DEFAULT_FILE_ID_PATTERN).unwrap();
        assert_eq!(pattern.extract(LANE1).unwrap(), "sampleA");
        assert_eq!(
            pattern
                .extract("/data/run1/pbmc_GEX_S3_L002_R1_001.fastq.gz")
                .unwrap(),
            "pbmc_GEX"
        );
    }

    #[test]
    fn test_default_file_id_without_sample_index() {
        let pattern = FieldPattern::new(PathField::FileId, DEFAULT_FILE_ID_PATTERN).unwrap();
        // Only the `_L###_` marker carries its own underscore
        assert_eq!(pattern.extract("lib1_R1.fastq.gz").unwrap(), "lib1_");
    }

    #[test]
    fn test_defaults_accept_uncompressed_fastq() {
        let path = "/d/sampleB_S2_L001_R1_001.fastq";
        let id = FieldPattern::new(PathField::FileId, DEFAULT_FILE_ID_PATTERN).unwrap();
        let parent =
            FieldPattern::new(PathField::ParentPath, DEFAULT_PARENT_PATH_PATTERN).unwrap();
        assert_eq!(id.extract(path).unwrap(), "sampleB");
        assert_eq!(parent.extract(path).unwrap(), "/d/");
    }

    #[test]
    fn test_default_parent_path_keeps_trailing_slash() {
        let pattern =
            FieldPattern::new(PathField::ParentPath, DEFAULT_PARENT_PATH_PATTERN).unwrap();
        assert_eq!(pattern.extract(LANE1).unwrap(), "/data/run1/");
    }

    #[test]
    fn test_extract_uses_first_capture_group() {
        let pattern =
            FieldPattern::new(PathField::Grouping, r"(?:run\d)/(sample[A-Z])_(S\d)").unwrap();
        assert_eq!(pattern.extract(LANE1).unwrap(), "sampleA");
    }

    #[test]
    fn test_extract_search_is_not_anchored() {
        let pattern = FieldPattern::new(PathField::Grouping, r"(S\d+)").unwrap();
        assert_eq!(pattern.extract(LANE1).unwrap(), "S1");
    }

    #[test]
    fn test_no_match_names_field_and_path() {
        let pattern = FieldPattern::new(PathField::Grouping, r"(donor\d+)").unwrap();
        let err = pattern.extract(LANE1).unwrap_err();
        assert_eq!(
            err,
            PatternError::NoMatch {
                field: PathField::Grouping,
                path: LANE1.to_string(),
            }
        );
        let message = err.to_string();
        assert!(message.contains("grouping_pattern"));
        assert!(message.contains(LANE1));
    }

    #[test]
    fn test_empty_capture_is_a_failure() {
        let pattern = FieldPattern::new(PathField::Grouping, r"(x*)sample").unwrap();
        assert!(pattern.extract(LANE1).is_err());
    }

    #[test]
    fn test_non_participating_group_is_a_failure() {
        let pattern = FieldPattern::new(PathField::Grouping, r"(donor)?sampleA").unwrap();
        assert!(pattern.extract(LANE1).is_err());
    }

    #[test]
    fn test_pattern_without_capture_group_rejected() {
        let err = FieldPattern::new(PathField::FileId, r"(?:sample)[A-Z]").unwrap_err();
        assert!(matches!(err, PatternError::NoCaptureGroup { .. }));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = FieldPattern::new(PathField::Grouping, "(unclosed").unwrap_err();
        assert!(matches!(
            err,
            PatternError::Invalid {
                field: PathField::Grouping,
                ..
            }
        ));
    }

    #[test]
    fn test_extract_all_defaults() {
        let patterns = PathPatterns::new(None, None, r"(sample[A-Z])").unwrap();
        let fields = patterns.extract_all(LANE1).unwrap();
        assert_eq!(
            fields,
            PathFields {
                identifier: "sampleA".to_string(),
                location: "/data/run1/".to_string(),
                group_key: "sampleA".to_string(),
            }
        );
    }

    #[test]
    fn test_extract_all_reports_failing_field() {
        let patterns = PathPatterns::new(Some(r"(nomatch)"), None, r"(sample[A-Z])").unwrap();
        let err = patterns.extract_all(LANE1).unwrap_err();
        assert!(matches!(
            err,
            PatternError::NoMatch {
                field: PathField::FileId,
                ..
            }
        ));
    }
}
