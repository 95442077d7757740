//! Run configuration: loading, merging and validation.
//!
//! Options come from an optional TOML file and from the command line, with
//! command-line values taking precedence field by field. The merged
//! [`SheetConfig`] is then compiled into [`RunSettings`], which carries the
//! compiled patterns, the selected library classifier and absolute paths.
//! All validation happens in [`SheetConfig::compile`], before any file is
//! scanned.
//!
//! # Configuration File Format
//!
//! ```toml
//! fastq_dir = "/data/run1"
//! outdir = "configs"
//! cellranger = "/opt/cellranger-8.0.1/cellranger"
//!
//! [patterns]
//! grouping = '(sample[A-Z])'
//! # file_id and parent_path fall back to the built-in defaults
//!
//! [libraries]
//! gex_pattern = 'GEX'
//! gex_reference = "/refs/refdata-gex-GRCh38-2020-A"
//! adt_pattern = 'ADT'
//! adt_reference = "/refs/feature_ref.csv"
//!
//! # Legacy policy, used instead of the *_pattern keys:
//! # [dictionary]
//! # GEX = "Gene Expression"
//! # TCR = "VDJ-T"
//! ```

use crate::library::{
    DictionaryClassifier, LibraryClassifier, LibraryError, LibraryType, PatternClassifier,
};
use crate::pattern::{PathPatterns, PatternError};
use crate::sheet::References;
use regex::Regex;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the current directory.
pub const LOCAL_CONFIG_NAME: &str = ".multisheetrc.toml";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    ConfigInvalid(String),
    /// IO error while reading configuration.
    IoError(String),
    /// The `--dictionary` argument is not a JSON object of strings.
    InvalidDictionary(String),
    /// A required option was given neither on the command line nor in a file.
    MissingOption(&'static str),
    /// A path could not be made absolute.
    InvalidPath { path: PathBuf, reason: String },
    /// A field pattern is invalid.
    Pattern(PatternError),
    /// A library pattern is not a valid regular expression.
    InvalidLibraryPattern {
        option: &'static str,
        pattern: String,
        reason: String,
    },
    /// A dictionary label is not a recognized library type.
    Library(LibraryError),
    /// Both the dictionary and library patterns were configured.
    ConflictingPolicies,
    /// No library could ever be detected with this configuration.
    NoLibraries,
    /// A library that can be detected has no reference.
    MissingReference {
        library: LibraryType,
        option: &'static str,
    },
    /// A library reference was given without the pattern that detects it.
    MissingPattern {
        library: LibraryType,
        option: &'static str,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
            ConfigError::InvalidDictionary(msg) => write!(
                f,
                "Invalid dictionary (expected a JSON object with double-quoted strings): {}",
                msg
            ),
            ConfigError::MissingOption(option) => {
                write!(f, "Missing required option '{}'", option)
            }
            ConfigError::InvalidPath { path, reason } => {
                write!(f, "Invalid path {}: {}", path.display(), reason)
            }
            ConfigError::Pattern(e) => write!(f, "{}", e),
            ConfigError::InvalidLibraryPattern {
                option,
                pattern,
                reason,
            } => write!(f, "Invalid {} '{}': {}", option, pattern, reason),
            ConfigError::Library(e) => write!(f, "{}", e),
            ConfigError::ConflictingPolicies => write!(
                f,
                "Use either a library dictionary or library patterns, not both"
            ),
            ConfigError::NoLibraries => write!(
                f,
                "No library types configured: pass at least one library pattern with its reference, or a dictionary"
            ),
            ConfigError::MissingReference { library, option } => write!(
                f,
                "You must pass an argument to '--{}' to write files for {} libraries",
                option, library
            ),
            ConfigError::MissingPattern { library, option } => write!(
                f,
                "A reference for {} libraries was given without '--{}' to detect them",
                library, option
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<PatternError> for ConfigError {
    fn from(e: PatternError) -> Self {
        ConfigError::Pattern(e)
    }
}

/// Substring keys mapped to library labels, in the order they were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryDictionary(Vec<(String, String)>);

impl LibraryDictionary {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self(entries)
    }

    /// Parses a JSON object such as `{"GEX": "Gene Expression"}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidDictionary(e.to_string()))
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.0
    }
}

impl<'de> Deserialize<'de> for LibraryDictionary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DictionaryVisitor;

        impl<'de> Visitor<'de> for DictionaryVisitor {
            type Value = LibraryDictionary;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of identifier substrings to library type labels")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, label)) = map.next_entry::<String, String>()? {
                    entries.push((key, label));
                }
                Ok(LibraryDictionary(entries))
            }
        }

        deserializer.deserialize_map(DictionaryVisitor)
    }
}

/// Path field patterns.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternConfig {
    pub file_id: Option<String>,
    pub parent_path: Option<String>,
    pub grouping: Option<String>,
}

/// Library patterns and references for the pattern policy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    pub gex_pattern: Option<String>,
    pub adt_pattern: Option<String>,
    pub vdj_pattern: Option<String>,
    pub gex_reference: Option<PathBuf>,
    pub adt_reference: Option<PathBuf>,
    pub vdj_reference: Option<PathBuf>,
}

/// All run options before validation. Every field is optional so that file
/// and command-line sources can be merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetConfig {
    pub fastq_dir: Option<PathBuf>,
    pub outdir: Option<PathBuf>,
    pub cellranger: Option<PathBuf>,
    #[serde(default)]
    pub patterns: PatternConfig,
    #[serde(default)]
    pub libraries: LibraryConfig,
    pub dictionary: Option<LibraryDictionary>,
}

/// Validated settings for one run.
#[derive(Debug)]
pub struct RunSettings {
    pub fastq_dir: PathBuf,
    pub outdir: PathBuf,
    pub cellranger: PathBuf,
    pub patterns: PathPatterns,
    pub classifier: Box<dyn LibraryClassifier>,
    pub references: References,
}

impl SheetConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.multisheetrc.toml` in the current directory
    /// 3. Look for `~/.config/multisheet/config.toml` in home directory
    /// 4. Fall back to an empty configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_NAME);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("multisheet")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Overlays `overrides` on `self`; any value set in `overrides` wins.
    pub fn merge(self, overrides: SheetConfig) -> SheetConfig {
        SheetConfig {
            fastq_dir: overrides.fastq_dir.or(self.fastq_dir),
            outdir: overrides.outdir.or(self.outdir),
            cellranger: overrides.cellranger.or(self.cellranger),
            patterns: PatternConfig {
                file_id: overrides.patterns.file_id.or(self.patterns.file_id),
                parent_path: overrides.patterns.parent_path.or(self.patterns.parent_path),
                grouping: overrides.patterns.grouping.or(self.patterns.grouping),
            },
            libraries: LibraryConfig {
                gex_pattern: overrides.libraries.gex_pattern.or(self.libraries.gex_pattern),
                adt_pattern: overrides.libraries.adt_pattern.or(self.libraries.adt_pattern),
                vdj_pattern: overrides.libraries.vdj_pattern.or(self.libraries.vdj_pattern),
                gex_reference: overrides
                    .libraries
                    .gex_reference
                    .or(self.libraries.gex_reference),
                adt_reference: overrides
                    .libraries
                    .adt_reference
                    .or(self.libraries.adt_reference),
                vdj_reference: overrides
                    .libraries
                    .vdj_reference
                    .or(self.libraries.vdj_reference),
            },
            dictionary: overrides.dictionary.or(self.dictionary),
        }
    }

    /// Validates the configuration and compiles it into run settings.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: missing required options, invalid or
    /// capture-less patterns, both or neither classification policy,
    /// unrecognized dictionary labels, or a library without its reference
    /// (and, for the pattern policy, a reference without its pattern).
    pub fn compile(self) -> Result<RunSettings, ConfigError> {
        let fastq_dir = make_absolute(require(self.fastq_dir, "fastq_dir")?)?;
        let outdir = make_absolute(require(self.outdir, "outdir")?)?;
        let cellranger = make_absolute(require(self.cellranger, "cellranger")?)?;

        let grouping = require(self.patterns.grouping, "grouping_pattern")?;
        let patterns = PathPatterns::new(
            self.patterns.file_id.as_deref(),
            self.patterns.parent_path.as_deref(),
            &grouping,
        )?;

        let libraries = self.libraries;
        let has_library_patterns = libraries.gex_pattern.is_some()
            || libraries.adt_pattern.is_some()
            || libraries.vdj_pattern.is_some();

        let classifier: Box<dyn LibraryClassifier> = match self.dictionary {
            Some(_) if has_library_patterns => return Err(ConfigError::ConflictingPolicies),
            Some(dictionary) => Box::new(
                DictionaryClassifier::new(dictionary.entries()).map_err(ConfigError::Library)?,
            ),
            None => Box::new(compile_pattern_classifier(&libraries)?),
        };

        let library_types = classifier.library_types();
        if library_types.is_empty() {
            return Err(ConfigError::NoLibraries);
        }

        let references = References {
            gene_expression: libraries.gex_reference.map(make_absolute).transpose()?,
            antibody_capture: libraries.adt_reference.map(make_absolute).transpose()?,
            vdj: libraries.vdj_reference.map(make_absolute).transpose()?,
        };

        for library in library_types {
            let reference = match library {
                LibraryType::GeneExpression => &references.gene_expression,
                LibraryType::AntibodyCapture => &references.antibody_capture,
                _ if library.is_vdj() => &references.vdj,
                _ => continue,
            };
            if reference.is_none() {
                return Err(ConfigError::MissingReference {
                    library,
                    option: reference_option(library),
                });
            }
        }

        Ok(RunSettings {
            fastq_dir,
            outdir,
            cellranger,
            patterns,
            classifier,
            references,
        })
    }
}

fn require<T>(value: Option<T>, option: &'static str) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::MissingOption(option))
}

fn make_absolute(path: PathBuf) -> Result<PathBuf, ConfigError> {
    std::path::absolute(&path).map_err(|e| ConfigError::InvalidPath {
        path,
        reason: e.to_string(),
    })
}

fn reference_option(library: LibraryType) -> &'static str {
    match library {
        LibraryType::GeneExpression => "gex_reference",
        LibraryType::AntibodyCapture => "adt_reference",
        _ => "vdj_reference",
    }
}

/// Builds the pattern classifier, requiring every pattern to come with its
/// reference and every reference with its pattern.
fn compile_pattern_classifier(libraries: &LibraryConfig) -> Result<PatternClassifier, ConfigError> {
    let rules = [
        (
            LibraryType::GeneExpression,
            &libraries.gex_pattern,
            &libraries.gex_reference,
            "gex_pattern",
        ),
        (
            LibraryType::AntibodyCapture,
            &libraries.adt_pattern,
            &libraries.adt_reference,
            "adt_pattern",
        ),
        (
            LibraryType::Vdj,
            &libraries.vdj_pattern,
            &libraries.vdj_reference,
            "vdj_pattern",
        ),
    ];

    let mut compiled: [Option<Regex>; 3] = [None, None, None];
    for (slot, (library, pattern, reference, option)) in compiled.iter_mut().zip(rules) {
        match (pattern, reference) {
            (Some(pattern), Some(_)) => {
                let regex =
                    Regex::new(pattern).map_err(|e| ConfigError::InvalidLibraryPattern {
                        option,
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })?;
                *slot = Some(regex);
            }
            (Some(_), None) => {
                return Err(ConfigError::MissingReference {
                    library,
                    option: reference_option(library),
                });
            }
            (None, Some(_)) => return Err(ConfigError::MissingPattern { library, option }),
            (None, None) => {}
        }
    }

    let [gene_expression, antibody_capture, vdj] = compiled;
    Ok(PatternClassifier::new(gene_expression, antibody_capture, vdj))
}
