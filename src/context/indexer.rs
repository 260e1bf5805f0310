use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use walkdir::WalkDir;

use super::{collector::IgnoreSet, files::is_binary};
use crate::{
    config::ContextConfig,
    errors::{Result, UserFacingError},
};

/// Line counts are only computed for files up to this size
const MAX_LINE_COUNT_BYTES: u64 = 100_000;

/// Metadata for a single indexed file
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Path relative to the indexed root
    pub relative_path: PathBuf,
    /// Lowercased extension, empty when the file has none
    pub extension: String,
    /// Size in bytes
    pub size: u64,
    /// Line count, skipped for large files
    pub lines: Option<usize>,
}

/// Walks a project directory and produces per-file metadata without reading
/// whole contents into a bundle. Backs the `context show` statistics.
pub struct FileIndexer<'a> {
    root: PathBuf,
    config: &'a ContextConfig,
}

impl<'a> FileIndexer<'a> {
    pub fn new(root: impl Into<PathBuf>, config: &'a ContextConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Indexes every non-ignored, non-binary file under the root, in
    /// deterministic lexicographic order
    pub fn index(&self) -> Result<Vec<FileInfo>> {
        if !self.root.is_dir() {
            return Err(UserFacingError::InvalidPath(self.root.clone()).into());
        }
        let ignore = IgnoreSet::for_root(&self.config.ignore, &self.root)?;

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root).sort_by(|a, b| a.file_name().cmp(b.file_name()));
        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            if ignore.matches(relative, false) || is_binary(relative) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let size = metadata.len();
            let lines = (size <= MAX_LINE_COUNT_BYTES)
                .then(|| fs::read_to_string(entry.path()).ok().map(|c| c.lines().count()))
                .flatten();
            files.push(FileInfo {
                path: entry.path().to_path_buf(),
                relative_path: relative.to_path_buf(),
                extension: extension_of(relative),
                size,
                lines,
            });
        }
        Ok(files)
    }

    /// Groups indexed files by extension, largest groups first
    pub fn summary(files: &[FileInfo]) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for file in files {
            *counts.entry(file.extension.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(ext, count)| (ext.to_string(), count))
            .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
            .collect()
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_index_skips_ignored_and_binary() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();
        fs::write(dir.path().join("logo.png"), [1u8, 2, 3]).unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("target").join("out.rs"), "x").unwrap();

        let config = ContextConfig::default();
        let files = FileIndexer::new(dir.path(), &config).index().unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, PathBuf::from("main.rs"));
        assert_eq!(files[0].extension, "rs");
        assert_eq!(files[0].lines, Some(1));
    }

    #[test]
    fn test_index_missing_root() {
        let dir = TempDir::new().unwrap();
        let config = ContextConfig::default();
        let err = FileIndexer::new(dir.path().join("nope"), &config).index().unwrap_err();
        assert!(matches!(
            err,
            crate::errors::AppError::UserFacing(UserFacingError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_summary_groups_by_extension() {
        let dir = TempDir::new().unwrap();
        for name in ["a.rs", "b.rs", "c.toml"] {
            fs::write(dir.path().join(name), "line\n").unwrap();
        }
        let config = ContextConfig::default();
        let files = FileIndexer::new(dir.path(), &config).index().unwrap();
        let summary = FileIndexer::summary(&files);
        assert_eq!(
            summary,
            vec![(String::from("rs"), 2), (String::from("toml"), 1)]
        );
    }
}
