//! Library type classification for read files.
//!
//! A file identifier is assigned one of the assay categories understood by
//! `cellranger multi`. Two policies exist behind the [`LibraryClassifier`]
//! trait: substring lookup in an ordered dictionary, and exclusive matching
//! against one optional regex per library.
//!
//! # Examples
//!
//! ```
//! use multisheet::library::{DictionaryClassifier, LibraryClassifier, LibraryType};
//!
//! let classifier = DictionaryClassifier::new(&[
//!     ("GEX".to_string(), "Gene Expression".to_string()),
//!     ("ADT".to_string(), "Antibody Capture".to_string()),
//! ])
//! .unwrap();
//! assert_eq!(classifier.classify("pbmc_ADT").unwrap(), LibraryType::AntibodyCapture);
//! assert_eq!(classifier.classify("pbmc_HTO").unwrap(), LibraryType::Unclassified);
//! ```

use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;

/// The assay category of a read file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LibraryType {
    GeneExpression,
    AntibodyCapture,
    /// T-cell receptor repertoire.
    VdjT,
    /// B-cell receptor repertoire.
    VdjB,
    /// Repertoire library whose chain type is left for the pipeline to detect.
    Vdj,
    /// No library rule matched the identifier.
    Unclassified,
}

impl LibraryType {
    /// Labels accepted in a library dictionary.
    pub const RECOGNIZED_LABELS: [&'static str; 5] = [
        "Gene Expression",
        "Antibody Capture",
        "VDJ-B",
        "VDJ-T",
        "VDJ",
    ];

    /// Returns the `feature_types` value written to the libraries table.
    ///
    /// ```
    /// use multisheet::library::LibraryType;
    ///
    /// assert_eq!(LibraryType::GeneExpression.label(), "Gene Expression");
    /// assert_eq!(LibraryType::Unclassified.label(), "");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            LibraryType::GeneExpression => "Gene Expression",
            LibraryType::AntibodyCapture => "Antibody Capture",
            LibraryType::VdjT => "VDJ-T",
            LibraryType::VdjB => "VDJ-B",
            LibraryType::Vdj => "VDJ",
            LibraryType::Unclassified => "",
        }
    }

    /// Parses a dictionary label. `Unclassified` has no label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Gene Expression" => Some(LibraryType::GeneExpression),
            "Antibody Capture" => Some(LibraryType::AntibodyCapture),
            "VDJ-T" => Some(LibraryType::VdjT),
            "VDJ-B" => Some(LibraryType::VdjB),
            "VDJ" => Some(LibraryType::Vdj),
            _ => None,
        }
    }

    /// True for every immune-repertoire variant.
    pub fn is_vdj(&self) -> bool {
        matches!(
            self,
            LibraryType::VdjT | LibraryType::VdjB | LibraryType::Vdj
        )
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryType::Unclassified => write!(f, "Unclassified"),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Errors raised while building or applying a classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    /// A dictionary value is not one of [`LibraryType::RECOGNIZED_LABELS`].
    UnrecognizedLabel { label: String },
    /// More than one library pattern matched the same identifier.
    Ambiguous {
        identifier: String,
        matches: Vec<LibraryType>,
    },
}

impl fmt::Display for LibraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryError::UnrecognizedLabel { label } => write!(
                f,
                "This program can only handle the following libraries: {}. Library '{}' not recognized",
                LibraryType::RECOGNIZED_LABELS.join(", "),
                label
            ),
            LibraryError::Ambiguous {
                identifier,
                matches,
            } => {
                let names: Vec<String> = matches.iter().map(|m| m.to_string()).collect();
                write!(
                    f,
                    "Identifier '{}' matched more than one library pattern ({}); make the patterns mutually exclusive",
                    identifier,
                    names.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for LibraryError {}

/// Assigns a library type to a file identifier.
pub trait LibraryClassifier: fmt::Debug {
    /// Classifies `identifier`.
    ///
    /// Returns `LibraryType::Unclassified` when no rule applies; callers
    /// decide how to report that.
    fn classify(&self, identifier: &str) -> Result<LibraryType, LibraryError>;

    /// Library types this classifier can produce, excluding `Unclassified`.
    fn library_types(&self) -> BTreeSet<LibraryType>;

    /// Short name used in run output.
    fn policy_name(&self) -> &'static str;
}

/// Legacy policy: the first dictionary key found inside the identifier wins.
#[derive(Debug, Clone)]
pub struct DictionaryClassifier {
    entries: Vec<(String, LibraryType)>,
}

impl DictionaryClassifier {
    /// Builds a classifier from `(substring, label)` pairs, kept in order.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::UnrecognizedLabel` for the first label that is
    /// not a recognized library type.
    pub fn new(entries: &[(String, String)]) -> Result<Self, LibraryError> {
        let entries = entries
            .iter()
            .map(|(key, label)| {
                LibraryType::from_label(label)
                    .map(|library| (key.clone(), library))
                    .ok_or_else(|| LibraryError::UnrecognizedLabel {
                        label: label.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }
}

impl LibraryClassifier for DictionaryClassifier {
    fn classify(&self, identifier: &str) -> Result<LibraryType, LibraryError> {
        Ok(self
            .entries
            .iter()
            .find(|(key, _)| identifier.contains(key.as_str()))
            .map(|(_, library)| *library)
            .unwrap_or(LibraryType::Unclassified))
    }

    fn library_types(&self) -> BTreeSet<LibraryType> {
        self.entries.iter().map(|(_, library)| *library).collect()
    }

    fn policy_name(&self) -> &'static str {
        "dictionary"
    }
}

/// Current policy: at most one of the configured library regexes may match.
///
/// Repertoire matches are reported as the unqualified `LibraryType::Vdj`.
#[derive(Debug, Clone, Default)]
pub struct PatternClassifier {
    rules: Vec<(LibraryType, Regex)>,
}

impl PatternClassifier {
    pub fn new(
        gene_expression: Option<Regex>,
        antibody_capture: Option<Regex>,
        vdj: Option<Regex>,
    ) -> Self {
        let rules = [
            (LibraryType::GeneExpression, gene_expression),
            (LibraryType::AntibodyCapture, antibody_capture),
            (LibraryType::Vdj, vdj),
        ]
        .into_iter()
        .filter_map(|(library, regex)| regex.map(|r| (library, r)))
        .collect();
        Self { rules }
    }
}

impl LibraryClassifier for PatternClassifier {
    fn classify(&self, identifier: &str) -> Result<LibraryType, LibraryError> {
        let matches: Vec<LibraryType> = self
            .rules
            .iter()
            .filter(|(_, regex)| regex.is_match(identifier))
            .map(|(library, _)| *library)
            .collect();

        match matches.as_slice() {
            [] => Ok(LibraryType::Unclassified),
            [single] => Ok(*single),
            _ => Err(LibraryError::Ambiguous {
                identifier: identifier.to_string(),
                matches,
            }),
        }
    }

    fn library_types(&self) -> BTreeSet<LibraryType> {
        self.rules.iter().map(|(library, _)| *library).collect()
    }

    fn policy_name(&self) -> &'static str {
        "pattern"
    }
}
