//! multisheet - cellranger multi config sheets from a directory of FASTQs
//!
//! This library discovers first-read FASTQ files, extracts their identifier,
//! parent directory and sample key with user-supplied regular expressions,
//! classifies each file into a library type, groups files into samples, and
//! writes one `cellranger multi` config sheet per sample plus a driver script.

pub mod cli;
pub mod config;
pub mod discover;
pub mod library;
pub mod output;
pub mod pattern;
pub mod sample_group;
pub mod sheet;

pub use config::{ConfigError, LibraryDictionary, RunSettings, SheetConfig};
pub use library::{DictionaryClassifier, LibraryClassifier, LibraryType, PatternClassifier};
pub use pattern::{FieldPattern, PathField, PathPatterns};
pub use sample_group::{ClassifiedFile, SampleGroup, SampleGroups, group_files};

pub use cli::{Args, RunReport, run};
