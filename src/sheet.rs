/// Rendering and writing of `cellranger multi` config sheets and the driver
/// script that runs them.
///
/// Rendering is pure: [`render_sheet`] and [`render_driver_script`] return
/// text, and the `write_*` functions put that text on disk. Sheets are written
/// one at a time with no rollback, so a write failure part way through leaves
/// the sheets already written in place.
use crate::library::LibraryType;
use crate::sample_group::{SampleGroup, SampleGroups};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix appended to the group name to form a sheet file name.
pub const SHEET_SUFFIX: &str = "_multi_config_auto.csv";

/// File name of the generated driver script.
pub const DRIVER_SCRIPT_NAME: &str = "run_cellranger_auto.sh";

/// Header row of the `[libraries]` section.
pub const LIBRARIES_HEADER: &str = "fastq_id,fastqs,feature_types";

/// Reference paths written into the library sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    pub gene_expression: Option<PathBuf>,
    pub antibody_capture: Option<PathBuf>,
    pub vdj: Option<PathBuf>,
}

/// Errors that can occur while emitting sheets and the driver script.
#[derive(Debug)]
pub enum EmitError {
    /// A section needs a reference that was not configured.
    MissingReference {
        group: String,
        library: LibraryType,
    },
    /// Failed to write an output file.
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for EmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmitError::MissingReference { group, library } => write!(
                f,
                "Sample '{}' has {} libraries but no {} reference was given",
                group, library, library
            ),
            EmitError::WriteFailed { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for EmitError {}

pub type EmitResult<T> = Result<T, EmitError>;

/// A written sheet and the group it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenSheet {
    pub group: String,
    pub path: PathBuf,
}

/// Returns the sheet file name for a group.
///
/// ```
/// use multisheet::sheet::sheet_file_name;
///
/// assert_eq!(sheet_file_name("sampleA"), "sampleA_multi_config_auto.csv");
/// ```
pub fn sheet_file_name(group: &str) -> String {
    format!("{}{}", group, SHEET_SUFFIX)
}

fn require_reference<'r>(
    reference: Option<&'r PathBuf>,
    group: &SampleGroup,
    library: LibraryType,
) -> EmitResult<&'r PathBuf> {
    reference.ok_or_else(|| EmitError::MissingReference {
        group: group.name.clone(),
        library,
    })
}

/// Renders the config sheet for one group.
///
/// Sections appear in a fixed order: gene expression, feature barcode,
/// repertoire, then the libraries table. Only sections for library types
/// present in the group are written. Table rows are unique by identifier.
///
/// # Errors
///
/// Returns `EmitError::MissingReference` if a section would be written
/// without its reference.
pub fn render_sheet(group: &SampleGroup, references: &References) -> EmitResult<String> {
    let mut sheet = String::new();

    // Writing to a String cannot fail
    if group.has_library(LibraryType::GeneExpression) {
        let reference = require_reference(
            references.gene_expression.as_ref(),
            group,
            LibraryType::GeneExpression,
        )?;
        let _ = writeln!(sheet, "[gene-expression]");
        let _ = writeln!(sheet, "reference,{}", reference.display());
        let _ = writeln!(sheet, "no-bam,true");
        let _ = writeln!(sheet);
    }

    if group.has_library(LibraryType::AntibodyCapture) {
        let reference = require_reference(
            references.antibody_capture.as_ref(),
            group,
            LibraryType::AntibodyCapture,
        )?;
        let _ = writeln!(sheet, "[feature] # For Feature Barcode libraries only");
        let _ = writeln!(sheet, "reference,{}", reference.display());
        let _ = writeln!(sheet);
    }

    if group.has_vdj() {
        let reference = require_reference(references.vdj.as_ref(), group, LibraryType::Vdj)?;
        let _ = writeln!(sheet, "[vdj]");
        let _ = writeln!(sheet, "reference,{}", reference.display());
        let _ = writeln!(sheet);
    }

    let _ = writeln!(sheet, "[libraries]");
    let _ = writeln!(sheet, "{}", LIBRARIES_HEADER);
    for file in group.unique_files() {
        let _ = writeln!(
            sheet,
            "{},{},{}",
            file.identifier,
            file.location,
            file.library_type.label()
        );
    }

    Ok(sheet)
}

fn write_file(path: &Path, contents: &str) -> EmitResult<()> {
    fs::write(path, contents).map_err(|e| EmitError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Renders and writes one sheet per group into `outdir`, in group order.
///
/// All sheets are rendered before the first one is written.
pub fn write_sheets(
    groups: &SampleGroups,
    references: &References,
    outdir: &Path,
) -> EmitResult<Vec<WrittenSheet>> {
    let rendered = groups
        .iter()
        .map(|group| render_sheet(group, references).map(|contents| (group, contents)))
        .collect::<EmitResult<Vec<_>>>()?;

    let mut written = Vec::with_capacity(rendered.len());
    for (group, contents) in rendered {
        let path = outdir.join(sheet_file_name(&group.name));
        write_file(&path, &contents)?;
        written.push(WrittenSheet {
            group: group.name.clone(),
            path,
        });
    }
    Ok(written)
}

/// Renders the driver script: a shebang, a blank line, then one
/// `cellranger multi` invocation per sheet.
pub fn render_driver_script(cellranger: &Path, sheets: &[WrittenSheet]) -> String {
    let mut script = String::from("#!/usr/bin/bash\n\n");
    for sheet in sheets {
        let _ = writeln!(
            script,
            "{} multi --id {} --csv {}",
            cellranger.display(),
            sheet.group,
            sheet.path.display()
        );
    }
    script
}

/// Writes the driver script into `outdir` and marks it executable.
pub fn write_driver_script(
    outdir: &Path,
    cellranger: &Path,
    sheets: &[WrittenSheet],
) -> EmitResult<PathBuf> {
    let path = outdir.join(DRIVER_SCRIPT_NAME);
    write_file(&path, &render_driver_script(cellranger, sheets))?;
    set_executable(&path)?;
    Ok(path)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> EmitResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| {
        EmitError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> EmitResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_group::{ClassifiedFile, group_files};
    use tempfile::TempDir;

    fn file(identifier: &str, location: &str, group: &str, library: LibraryType) -> ClassifiedFile {
        ClassifiedFile {
            identifier: identifier.to_string(),
            location: location.to_string(),
            group_key: group.to_string(),
            library_type: library,
        }
    }

    fn all_references() -> References {
        References {
            gene_expression: Some(PathBuf::from("/refs/GRCh38")),
            antibody_capture: Some(PathBuf::from("/refs/feature_ref.csv")),
            vdj: Some(PathBuf::from("/refs/vdj_GRCh38")),
        }
    }

    #[test]
    fn test_render_gene_expression_only() {
        let mut group = SampleGroup::new("sampleA");
        group.add_file(file(
            "sampleA",
            "/data/run1/",
            "sampleA",
            LibraryType::GeneExpression,
        ));
        group.add_file(file(
            "sampleA",
            "/data/run1/",
            "sampleA",
            LibraryType::GeneExpression,
        ));

        let sheet = render_sheet(&group, &all_references()).unwrap();
        assert_eq!(
            sheet,
            "[gene-expression]\n\
             reference,/refs/GRCh38\n\
             no-bam,true\n\
             \n\
             [libraries]\n\
             fastq_id,fastqs,feature_types\n\
             sampleA,/data/run1/,Gene Expression\n"
        );
    }

    #[test]
    fn test_render_all_sections_in_order() {
        let mut group = SampleGroup::new("d1");
        group.add_file(file("d1_TCR", "/r/", "d1", LibraryType::VdjT));
        group.add_file(file("d1_ADT", "/r/", "d1", LibraryType::AntibodyCapture));
        group.add_file(file("d1_GEX", "/r/", "d1", LibraryType::GeneExpression));

        let sheet = render_sheet(&group, &all_references()).unwrap();
        let gex = sheet.find("[gene-expression]").unwrap();
        let feature = sheet.find("[feature]").unwrap();
        let vdj = sheet.find("[vdj]").unwrap();
        let libraries = sheet.find("[libraries]").unwrap();
        assert!(gex < feature && feature < vdj && vdj < libraries);

        // Rows keep discovery order
        let rows: Vec<&str> = sheet.lines().skip_while(|l| *l != LIBRARIES_HEADER).collect();
        assert_eq!(
            rows,
            vec![
                LIBRARIES_HEADER,
                "d1_TCR,/r/,VDJ-T",
                "d1_ADT,/r/,Antibody Capture",
                "d1_GEX,/r/,Gene Expression",
            ]
        );
    }

    #[test]
    fn test_render_unqualified_vdj_emits_vdj_section() {
        let mut group = SampleGroup::new("d2");
        group.add_file(file("d2_BCR", "/r/", "d2", LibraryType::Vdj));
        let sheet = render_sheet(&group, &all_references()).unwrap();
        assert!(sheet.starts_with("[vdj]\nreference,/refs/vdj_GRCh38\n\n"));
        assert!(sheet.ends_with("d2_BCR,/r/,VDJ\n"));
    }

    #[test]
    fn test_render_unclassified_has_empty_feature_type() {
        let mut group = SampleGroup::new("g");
        group.add_file(file("g_HTO", "/r/", "g", LibraryType::Unclassified));
        let sheet = render_sheet(&group, &References::default()).unwrap();
        assert_eq!(
            sheet,
            "[libraries]\nfastq_id,fastqs,feature_types\ng_HTO,/r/,\n"
        );
    }

    #[test]
    fn test_render_missing_reference_fails() {
        let mut group = SampleGroup::new("g");
        group.add_file(file("g_ADT", "/r/", "g", LibraryType::AntibodyCapture));
        let references = References {
            antibody_capture: None,
            ..all_references()
        };
        let err = render_sheet(&group, &references).unwrap_err();
        assert!(matches!(
            err,
            EmitError::MissingReference {
                library: LibraryType::AntibodyCapture,
                ..
            }
        ));
    }

    #[test]
    fn test_render_driver_script() {
        let sheets = vec![
            WrittenSheet {
                group: "a".to_string(),
                path: PathBuf::from("/out/a_multi_config_auto.csv"),
            },
            WrittenSheet {
                group: "b".to_string(),
                path: PathBuf::from("/out/b_multi_config_auto.csv"),
            },
        ];
        let script = render_driver_script(Path::new("/opt/cellranger-8.0.1/cellranger"), &sheets);
        assert_eq!(
            script,
            "#!/usr/bin/bash\n\n\
             /opt/cellranger-8.0.1/cellranger multi --id a --csv /out/a_multi_config_auto.csv\n\
             /opt/cellranger-8.0.1/cellranger multi --id b --csv /out/b_multi_config_auto.csv\n"
        );
    }

    #[test]
    fn test_write_sheets_and_script() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let outdir = temp_dir.path();
        let groups = group_files(vec![
            file("a_GEX", "/r/", "a", LibraryType::GeneExpression),
            file("b_GEX", "/r/", "b", LibraryType::GeneExpression),
        ]);

        let written = write_sheets(&groups, &all_references(), outdir).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].path, outdir.join("a_multi_config_auto.csv"));
        assert!(written[1].path.exists());

        let script_path =
            write_driver_script(outdir, Path::new("/opt/cellranger"), &written).unwrap();
        let script = fs::read_to_string(&script_path).unwrap();
        assert_eq!(script.lines().count(), 4);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&script_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }
}
