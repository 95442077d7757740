//! Command-line interface module for multisheet.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Configuration loading and validation
//! - FASTQ discovery and classification
//! - Sheet and driver script emission
//!
//! Patterns should have the string of interest as their first capture group.
//! Use `(?:...)` to group parts of a pattern without capturing them.

use crate::config::{
    ConfigError, LibraryConfig, LibraryDictionary, PatternConfig, RunSettings, SheetConfig,
};
use crate::discover::discover_fastqs;
use crate::library::LibraryType;
use crate::output::OutputFormatter;
use crate::pattern::{DEFAULT_FILE_ID_PATTERN, DEFAULT_PARENT_PATH_PATTERN};
use crate::sample_group::{ClassifiedFile, SampleGroups, ScanError, group_files};
use crate::sheet::{self, WrittenSheet};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

/// Generates cellranger multi config sheets for samples, using regex patterns
/// to extract information from FASTQ paths and to detect library types.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "multisheet", version, about)]
pub struct Args {
    /// Top level directory containing all folders with FASTQs of interest
    #[arg(short = 'f', long = "fastq_dir", value_name = "DIR")]
    pub fastq_dir: Option<PathBuf>,

    /// Directory to write config sheets and the driver script to
    #[arg(short = 'o', long = "outdir", value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    /// Path to the cellranger executable of the desired version
    #[arg(short = 'c', long = "cellranger", value_name = "PATH")]
    pub cellranger: Option<PathBuf>,

    /// Regex pattern extracting the term to group files on
    #[arg(long = "grouping_pattern", value_name = "REGEX")]
    pub grouping_pattern: Option<String>,

    #[arg(
        long = "fileID_pattern",
        value_name = "REGEX",
        help = format!("Regex pattern extracting the fastq_id from file paths [default: {}]", DEFAULT_FILE_ID_PATTERN)
    )]
    pub file_id_pattern: Option<String>,

    #[arg(
        long = "parentPath_pattern",
        value_name = "REGEX",
        help = format!("Regex pattern extracting the parent directory of a file (the fastqs column) [default: {}]", DEFAULT_PARENT_PATH_PATTERN)
    )]
    pub parent_path_pattern: Option<String>,

    /// JSON dictionary of identifier substrings to library types, e.g.
    /// '{"GEX": "Gene Expression", "ADT": "Antibody Capture", "TCR": "VDJ-T"}'
    #[arg(short = 'd', long = "dictionary", value_name = "JSON")]
    pub dictionary: Option<String>,

    /// Regex matching file IDs of gene expression libraries
    #[arg(long = "gex_pattern", value_name = "REGEX")]
    pub gex_pattern: Option<String>,

    /// Regex matching file IDs of antibody capture libraries
    #[arg(long = "adt_pattern", value_name = "REGEX")]
    pub adt_pattern: Option<String>,

    /// Regex matching file IDs of VDJ libraries
    #[arg(long = "vdj_pattern", value_name = "REGEX")]
    pub vdj_pattern: Option<String>,

    /// Cellranger reference for gene expression libraries
    #[arg(short = 'g', long = "gex_reference", value_name = "PATH")]
    pub gex_reference: Option<PathBuf>,

    /// Feature reference CSV for antibody capture libraries
    #[arg(short = 'a', long = "adt_reference", value_name = "PATH")]
    pub adt_reference: Option<PathBuf>,

    /// Cellranger reference for VDJ libraries
    #[arg(short = 'v', long = "vdj_reference", value_name = "PATH")]
    pub vdj_reference: Option<PathBuf>,

    /// TOML configuration file; command-line options override its values
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show what would be written without writing anything
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

impl Args {
    /// Converts the command-line options into a configuration layer.
    pub fn to_config(&self) -> Result<SheetConfig, ConfigError> {
        let dictionary = self
            .dictionary
            .as_deref()
            .map(LibraryDictionary::from_json)
            .transpose()?;

        Ok(SheetConfig {
            fastq_dir: self.fastq_dir.clone(),
            outdir: self.outdir.clone(),
            cellranger: self.cellranger.clone(),
            patterns: PatternConfig {
                file_id: self.file_id_pattern.clone(),
                parent_path: self.parent_path_pattern.clone(),
                grouping: self.grouping_pattern.clone(),
            },
            libraries: LibraryConfig {
                gex_pattern: self.gex_pattern.clone(),
                adt_pattern: self.adt_pattern.clone(),
                vdj_pattern: self.vdj_pattern.clone(),
                gex_reference: self.gex_reference.clone(),
                adt_reference: self.adt_reference.clone(),
                vdj_reference: self.vdj_reference.clone(),
            },
            dictionary,
        })
    }
}

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Number of first-read files discovered.
    pub discovered: usize,
    /// Identifiers for which no library type was detected.
    pub unclassified: Vec<String>,
    /// Sheets written, in group order. Empty for dry runs.
    pub sheets: Vec<WrittenSheet>,
    /// Path of the driver script, if written.
    pub script: Option<PathBuf>,
}

/// Runs the whole pipeline for the parsed arguments.
///
/// 1. Loads, merges and validates configuration
/// 2. Discovers first-read FASTQ files below the FASTQ directory
/// 3. Extracts fields and classifies every file
/// 4. Groups files into samples
/// 5. Writes one config sheet per sample and the driver script
///
/// Every configuration and classification error is reported before anything
/// is written. A write failure during step 5 leaves the sheets already
/// written in place.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use multisheet::cli::{run, Args};
///
/// let args = Args::parse_from([
///     "multisheet",
///     "-f", "/data/run1",
///     "-o", "configs",
///     "-c", "/opt/cellranger-8.0.1/cellranger",
///     "--grouping_pattern", "(sample[A-Z])",
///     "--gex_pattern", "GEX",
///     "-g", "/refs/refdata-gex-GRCh38-2020-A",
/// ]);
/// match run(&args) {
///     Ok(report) => println!("Wrote {} sheets", report.sheets.len()),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run(args: &Args) -> Result<RunReport, String> {
    let file_config = SheetConfig::load(args.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    let cli_config = args.to_config().map_err(|e| e.to_string())?;
    let settings = file_config
        .merge(cli_config)
        .compile()
        .map_err(|e| e.to_string())?;

    OutputFormatter::info(&format!(
        "Scanning {} ({} policy)",
        settings.fastq_dir.display(),
        settings.classifier.policy_name()
    ));

    for pattern in [
        &settings.patterns.file_id,
        &settings.patterns.parent_path,
        &settings.patterns.grouping,
    ] {
        OutputFormatter::plain(&format!(
            "  {}: {}",
            pattern.field().option_name(),
            pattern.as_str()
        ));
    }

    let paths = discover_fastqs(&settings.fastq_dir).map_err(|e| e.to_string())?;
    let mut report = RunReport {
        discovered: paths.len(),
        ..Default::default()
    };

    if paths.is_empty() {
        OutputFormatter::warning(&format!(
            "No FASTQ files found under {}",
            settings.fastq_dir.display()
        ));
        return Ok(report);
    }

    let files = classify_paths(&paths, &settings).map_err(|e| e.to_string())?;

    for file in &files {
        if file.library_type == LibraryType::Unclassified {
            OutputFormatter::warning(&format!(
                "Library type not detected for sample:\n{}\nYou may have to manually edit the config or check your library arguments",
                file.identifier
            ));
            report.unclassified.push(file.identifier.clone());
        }
    }

    let groups = group_files(files);

    if args.dry_run {
        print_dry_run(&groups, &settings);
        OutputFormatter::summary_table(&groups);
        return Ok(report);
    }

    if !settings.outdir.exists() {
        OutputFormatter::info("Outdir not found, creating..");
        fs::create_dir_all(&settings.outdir).map_err(|e| {
            format!(
                "Error creating output directory {}: {}",
                settings.outdir.display(),
                e
            )
        })?;
    }

    report.sheets = sheet::write_sheets(&groups, &settings.references, &settings.outdir)
        .map_err(|e| e.to_string())?;
    for written in &report.sheets {
        OutputFormatter::plain(&format!(" - {}", written.path.display()));
    }

    let script = sheet::write_driver_script(&settings.outdir, &settings.cellranger, &report.sheets)
        .map_err(|e| e.to_string())?;
    OutputFormatter::plain(&format!("Driver script: {}", script.display()));
    report.script = Some(script);

    OutputFormatter::summary_table(&groups);
    Ok(report)
}

/// Classifies every discovered path in order, stopping at the first failure.
fn classify_paths(paths: &[String], settings: &RunSettings) -> Result<Vec<ClassifiedFile>, ScanError> {
    let pb = OutputFormatter::create_progress_bar(paths.len() as u64);
    let files = paths
        .iter()
        .map(|path| {
            let file =
                ClassifiedFile::from_path(path, &settings.patterns, settings.classifier.as_ref());
            pb.inc(1);
            file
        })
        .collect::<Result<Vec<_>, _>>();
    pb.finish_and_clear();
    files
}

fn print_dry_run(groups: &SampleGroups, settings: &RunSettings) {
    OutputFormatter::dry_run_notice("Config sheets would be written as follows:");
    for group in groups {
        let path = settings.outdir.join(sheet::sheet_file_name(&group.name));
        OutputFormatter::plain(&format!(" - {}", path.display()));
        match sheet::render_sheet(group, &settings.references) {
            Ok(contents) => {
                for line in contents.lines() {
                    OutputFormatter::plain(&format!("   {}", line));
                }
            }
            Err(e) => OutputFormatter::error(&e.to_string()),
        }
    }
    OutputFormatter::dry_run_notice(&format!(
        "Driver script would be written to {}",
        settings.outdir.join(sheet::DRIVER_SCRIPT_NAME).display()
    ));
    OutputFormatter::success("Dry run complete. No files were written.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_long_names() {
        let args = Args::try_parse_from([
            "multisheet",
            "-f",
            "/data",
            "-o",
            "/out",
            "-c",
            "/opt/cellranger",
            "--grouping_pattern",
            "(sample[A-Z])",
            "--fileID_pattern",
            "(.+)_R1",
            "--parentPath_pattern",
            "(.+/)",
            "--adt_pattern",
            "ADT",
            "-a",
            "/refs/features.csv",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(args.fastq_dir, Some(PathBuf::from("/data")));
        assert_eq!(args.file_id_pattern.as_deref(), Some("(.+)_R1"));
        assert_eq!(args.parent_path_pattern.as_deref(), Some("(.+/)"));
        assert_eq!(args.adt_reference, Some(PathBuf::from("/refs/features.csv")));
        assert!(args.dry_run);
    }

    #[test]
    fn test_to_config_parses_dictionary() {
        let args = Args {
            dictionary: Some(r#"{"GEX": "Gene Expression", "ADT": "Antibody Capture"}"#.to_string()),
            ..Default::default()
        };
        let config = args.to_config().unwrap();
        let dictionary = config.dictionary.unwrap();
        assert_eq!(dictionary.entries().len(), 2);
        assert_eq!(dictionary.entries()[0].0, "GEX");
    }

    #[test]
    fn test_to_config_invalid_dictionary() {
        let args = Args {
            dictionary: Some("GEX=Gene Expression".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            args.to_config(),
            Err(ConfigError::InvalidDictionary(_))
        ));
    }
}
