/// Classification of discovered paths and aggregation into sample groups.
///
/// Every path goes through the three field patterns and the library
/// classifier to become a [`ClassifiedFile`]. Files are then bucketed by
/// group key into [`SampleGroup`]s, in discovery order.
use crate::library::{LibraryClassifier, LibraryError, LibraryType};
use crate::pattern::{PathPatterns, PatternError};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Errors that abort classification of a discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// A field pattern failed on the path.
    Pattern(PatternError),
    /// The classifier rejected the identifier.
    Library(LibraryError),
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::Pattern(e) => write!(f, "{}", e),
            ScanError::Library(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ScanError {}

impl From<PatternError> for ScanError {
    fn from(e: PatternError) -> Self {
        ScanError::Pattern(e)
    }
}

impl From<LibraryError> for ScanError {
    fn from(e: LibraryError) -> Self {
        ScanError::Library(e)
    }
}

/// A discovered read file with its extracted fields and library type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFile {
    /// Value of the `fastq_id` column; shared by lanes of the same library.
    pub identifier: String,
    /// Value of the `fastqs` column.
    pub location: String,
    /// Key of the sample group this file belongs to.
    pub group_key: String,
    pub library_type: LibraryType,
}

impl ClassifiedFile {
    /// Extracts the fields of `path` and classifies its identifier.
    ///
    /// # Errors
    ///
    /// Fails if any of the three patterns does not match or if the
    /// classifier reports an ambiguous identifier.
    pub fn from_path(
        path: &str,
        patterns: &PathPatterns,
        classifier: &dyn LibraryClassifier,
    ) -> Result<Self, ScanError> {
        let fields = patterns.extract_all(path)?;
        let library_type = classifier.classify(&fields.identifier)?;
        Ok(Self {
            identifier: fields.identifier,
            location: fields.location,
            group_key: fields.group_key,
            library_type,
        })
    }
}

/// All files sharing one group key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleGroup {
    pub name: String,
    /// Files in discovery order.
    pub files: Vec<ClassifiedFile>,
    /// Distinct library types among `files`.
    pub library_types: BTreeSet<LibraryType>,
}

impl SampleGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
            library_types: BTreeSet::new(),
        }
    }

    pub fn add_file(&mut self, file: ClassifiedFile) {
        self.library_types.insert(file.library_type);
        self.files.push(file);
    }

    pub fn has_library(&self, library: LibraryType) -> bool {
        self.library_types.contains(&library)
    }

    /// True if any repertoire variant is present.
    pub fn has_vdj(&self) -> bool {
        self.library_types.iter().any(LibraryType::is_vdj)
    }

    /// Files with a previously unseen identifier, in first-seen order.
    ///
    /// Lanes of one library share an identifier and collapse to the first
    /// lane's entry.
    pub fn unique_files(&self) -> Vec<&ClassifiedFile> {
        let mut seen = HashSet::new();
        self.files
            .iter()
            .filter(|file| seen.insert(file.identifier.as_str()))
            .collect()
    }
}

/// Sample groups keyed by name, iterated in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct SampleGroups {
    groups: Vec<SampleGroup>,
    index: HashMap<String, usize>,
}

impl SampleGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `file` to its group, creating the group on first sight.
    pub fn add_file(&mut self, file: ClassifiedFile) {
        let position = match self.index.get(&file.group_key) {
            Some(&position) => position,
            None => {
                self.groups.push(SampleGroup::new(file.group_key.clone()));
                self.index
                    .insert(file.group_key.clone(), self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        self.groups[position].add_file(file);
    }

    pub fn get(&self, name: &str) -> Option<&SampleGroup> {
        self.index.get(name).map(|&position| &self.groups[position])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SampleGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl<'a> IntoIterator for &'a SampleGroups {
    type Item = &'a SampleGroup;
    type IntoIter = std::slice::Iter<'a, SampleGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

impl FromIterator<ClassifiedFile> for SampleGroups {
    fn from_iter<I: IntoIterator<Item = ClassifiedFile>>(files: I) -> Self {
        let mut groups = Self::new();
        for file in files {
            groups.add_file(file);
        }
        groups
    }
}

/// Buckets `files` by group key, preserving discovery order.
pub fn group_files(files: impl IntoIterator<Item = ClassifiedFile>) -> SampleGroups {
    files.into_iter().collect()
}
