/// Recursive discovery of first-read FASTQ files.
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};

/// Files matched under the root: first read of a pair, any FASTQ extension.
pub const FASTQ_GLOB: &str = "**/*R1*fastq*";

/// Errors that can occur while enumerating read files.
#[derive(Debug)]
pub enum DiscoverError {
    /// The root directory does not exist or is not a directory.
    InvalidRoot(PathBuf),
    /// The root path is not valid UTF-8 and cannot be used in a pattern.
    NonUtf8Path(PathBuf),
    /// The glob pattern could not be built.
    InvalidPattern(String),
    /// A directory below the root could not be read.
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for DiscoverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoverError::InvalidRoot(path) => {
                write!(f, "FASTQ directory not found: {}", path.display())
            }
            DiscoverError::NonUtf8Path(path) => {
                write!(f, "Path is not valid UTF-8: {}", path.display())
            }
            DiscoverError::InvalidPattern(reason) => write!(f, "Invalid glob pattern: {}", reason),
            DiscoverError::Unreadable { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for DiscoverError {}

/// Finds every first-read FASTQ file below `root`.
///
/// The search is built from a plain string pattern so that symlinked
/// directories are followed. Hidden files are skipped. Paths are returned
/// sorted, which fixes discovery order for identical input trees.
pub fn discover_fastqs(root: &Path) -> Result<Vec<String>, DiscoverError> {
    if !root.is_dir() {
        return Err(DiscoverError::InvalidRoot(root.to_path_buf()));
    }

    let root_str = root
        .to_str()
        .ok_or_else(|| DiscoverError::NonUtf8Path(root.to_path_buf()))?;
    let pattern = format!(
        "{}/{}",
        Pattern::escape(root_str.trim_end_matches('/')),
        FASTQ_GLOB
    );

    let mut options = MatchOptions::new();
    options.require_literal_leading_dot = true;

    let entries = glob::glob_with(&pattern, options)
        .map_err(|e| DiscoverError::InvalidPattern(e.to_string()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| DiscoverError::Unreadable {
            path: e.path().to_path_buf(),
            source: std::io::Error::new(e.error().kind(), e.error().to_string()),
        })?;
        if !path.is_file() {
            continue;
        }
        let path = path
            .into_os_string()
            .into_string()
            .map_err(|p| DiscoverError::NonUtf8Path(PathBuf::from(p)))?;
        paths.push(path);
    }

    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directories");
        }
        fs::write(&path, "").expect("Failed to write test file");
    }

    fn relative(root: &Path, paths: &[String]) -> Vec<String> {
        let prefix = format!("{}/", root.display());
        paths
            .iter()
            .map(|p| p.strip_prefix(&prefix).unwrap_or(p).to_string())
            .collect()
    }

    #[test]
    fn test_finds_first_reads_recursively() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        touch(root, "run1/sampleA_S1_L001_R1_001.fastq.gz");
        touch(root, "run1/sampleA_S1_L001_R2_001.fastq.gz");
        touch(root, "run1/sampleA_S1_L001_I1_001.fastq.gz");
        touch(root, "run2/nested/sampleB_S2_L001_R1_001.fastq");
        touch(root, "top_R1.fastq.gz");
        touch(root, "notes_R1.txt");

        let found = discover_fastqs(root).unwrap();
        assert_eq!(
            relative(root, &found),
            vec![
                "run1/sampleA_S1_L001_R1_001.fastq.gz",
                "run2/nested/sampleB_S2_L001_R1_001.fastq",
                "top_R1.fastq.gz",
            ]
        );
    }

    #[test]
    fn test_skips_directories_and_hidden_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("odd_R1_fastq_dir")).unwrap();
        touch(root, ".sampleA_R1.fastq.gz");
        touch(root, "sampleA_R1.fastq.gz");

        let found = discover_fastqs(root).unwrap();
        assert_eq!(relative(root, &found), vec!["sampleA_R1.fastq.gz"]);
    }

    #[test]
    fn test_sorted_output() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        touch(root, "s_L002_R1_001.fastq.gz");
        touch(root, "s_L001_R1_001.fastq.gz");

        let found = discover_fastqs(root).unwrap();
        assert_eq!(
            relative(root, &found),
            vec!["s_L001_R1_001.fastq.gz", "s_L002_R1_001.fastq.gz"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_follows_symlinked_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let data = TempDir::new().expect("Failed to create temp directory");
        touch(data.path(), "sampleC_S1_L001_R1_001.fastq.gz");
        std::os::unix::fs::symlink(data.path(), temp_dir.path().join("linked")).unwrap();

        let found = discover_fastqs(temp_dir.path()).unwrap();
        assert_eq!(
            relative(temp_dir.path(), &found),
            vec!["linked/sampleC_S1_L001_R1_001.fastq.gz"]
        );
    }

    #[test]
    fn test_missing_root() {
        let result = discover_fastqs(Path::new("/non/existent/fastqs"));
        assert!(matches!(result, Err(DiscoverError::InvalidRoot(_))));
    }
}
