use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::eyre::Context;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use itertools::Itertools;
use walkdir::WalkDir;

use super::files::{is_binary, language_for};
use crate::{
    config::ContextConfig,
    errors::{Result, UserFacingError},
};

/// Manifest files that identify a recognizable project root
const PROJECT_MANIFESTS: &[&str] = &["Cargo.toml", "pyproject.toml", "package.json", "go.mod", "pom.xml", "build.gradle"];

/// Maximum entries rendered per directory in the project tree
const MAX_TREE_ENTRIES: usize = 20;

/// A compiled set of gitignore-style patterns excluding paths from collection
pub struct IgnoreSet {
    patterns: Vec<String>,
    matcher: Gitignore,
}

impl IgnoreSet {
    /// Compiles the given patterns, deduplicated and with empty entries dropped
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut kept: Vec<String> = Vec::new();
        let mut builder = GitignoreBuilder::new("");
        for pattern in patterns {
            let pattern = pattern.trim();
            if pattern.is_empty() || kept.iter().any(|p| p == pattern) {
                continue;
            }
            builder
                .add_line(None, pattern)
                .wrap_err_with(|| format!("Invalid ignore pattern '{pattern}'"))?;
            kept.push(pattern.to_string());
        }
        let matcher = builder.build().wrap_err("Couldn't compile ignore patterns")?;
        Ok(Self { patterns: kept, matcher })
    }

    /// Compiles the configured patterns merged with the project's `.gitignore`, when present
    pub fn for_root(patterns: &[String], root: &Path) -> Result<Self> {
        let gitignore = root.join(".gitignore");
        let mut lines: Vec<String> = patterns.to_vec();
        if gitignore.is_file() {
            let content = fs::read_to_string(&gitignore)
                .wrap_err_with(|| format!("Couldn't read {}", gitignore.display()))?;
            lines.extend(content.lines().map(String::from));
        }
        Self::new(lines.iter().map(String::as_str))
    }

    /// Whether a path, relative to the collection root, matches any pattern
    pub fn matches(&self, relative: &Path, is_dir: bool) -> bool {
        self.matcher.matched_path_or_any_parents(relative, is_dir).is_ignore()
    }

    /// The deduplicated source patterns
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// A single file included in a [`ContextBundle`]
#[derive(Debug, Clone, PartialEq)]
pub struct ContextFile {
    /// Path relative to the collection root
    pub path: PathBuf,
    /// File content, possibly cut at the per-file byte cap
    pub content: String,
    /// Whether the content was cut at the cap
    pub truncated: bool,
}

/// The ordered set of source files assembled to accompany a prompt, plus
/// collection statistics.
///
/// Owned exclusively by the command that built it and discarded after the
/// provider call.
#[derive(Debug, Default)]
pub struct ContextBundle {
    /// Files included, in deterministic walk order
    pub files: Vec<ContextFile>,
    /// Total files seen during the walk
    pub considered: usize,
    /// Files rejected by the ignore set
    pub ignored: usize,
    /// Files skipped for having a binary extension
    pub binary_skipped: usize,
    /// Non-ignored, non-binary files left out once the file budget was reached
    pub excluded: usize,
    /// Human-readable notes about files that couldn't be read
    pub warnings: Vec<String>,
}

impl ContextBundle {
    /// Number of files included
    pub fn included(&self) -> usize {
        self.files.len()
    }

    /// Total content bytes across included files
    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|f| f.content.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Serializes the bundle into the textual blob sent alongside a prompt
    pub fn render(&self) -> String {
        self.files
            .iter()
            .map(|file| {
                let lang = language_for(&file.path);
                let marker = if file.truncated { " (truncated)" } else { "" };
                format!("# {}{marker}\n```{lang}\n{}\n```", file.path.display(), file.content)
            })
            .join("\n\n")
    }
}

/// Collects files from a project directory into a [`ContextBundle`].
///
/// Read-only: never mutates the filesystem and performs no network calls.
pub struct ContextCollector<'a> {
    config: &'a ContextConfig,
}

impl<'a> ContextCollector<'a> {
    pub fn new(config: &'a ContextConfig) -> Self {
        Self { config }
    }

    /// Walks `root` and gathers up to `max_files` non-ignored text files.
    ///
    /// The walk is lexicographic by path, so results are reproducible across
    /// runs on an unchanged tree. Individual unreadable files are recorded as
    /// warnings and never abort the collection; a missing root is a hard
    /// failure.
    pub fn collect(&self, root: &Path) -> Result<ContextBundle> {
        if !root.is_dir() {
            return Err(UserFacingError::InvalidPath(root.to_path_buf()).into());
        }
        let ignore = IgnoreSet::for_root(&self.config.ignore, root)?;

        let mut bundle = ContextBundle::default();
        let walker = WalkDir::new(root).sort_by(|a, b| a.file_name().cmp(b.file_name()));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    bundle.warnings.push(format!("skipping unreadable entry: {err}"));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            bundle.considered += 1;
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if ignore.matches(relative, false) {
                bundle.ignored += 1;
                continue;
            }
            if is_binary(relative) {
                bundle.binary_skipped += 1;
                continue;
            }
            if bundle.files.len() >= self.config.max_files {
                bundle.excluded += 1;
                continue;
            }
            match self.read_capped(entry.path()) {
                Ok((content, truncated)) => bundle.files.push(ContextFile {
                    path: relative.to_path_buf(),
                    content,
                    truncated,
                }),
                Err(err) => {
                    tracing::warn!("Couldn't read {}: {err}", relative.display());
                    bundle.warnings.push(format!("couldn't read {}: {err}", relative.display()));
                }
            }
        }
        Ok(bundle)
    }

    /// Gathers an explicit list of files, bypassing the walk and the ignore
    /// set but keeping the per-file truncation rule.
    pub fn collect_files(&self, paths: &[PathBuf]) -> Result<ContextBundle> {
        let mut bundle = ContextBundle::default();
        for path in paths {
            if !path.is_file() {
                return Err(UserFacingError::InvalidPath(path.clone()).into());
            }
            bundle.considered += 1;
            let (content, truncated) = self.read_capped(path).map_err(crate::errors::AppError::Unexpected)?;
            bundle.files.push(ContextFile {
                path: path.clone(),
                content,
                truncated,
            });
        }
        Ok(bundle)
    }

    /// Builds a lightweight project summary: the project manifest plus a
    /// bounded directory tree. `None` when `root` holds no recognizable
    /// manifest.
    pub fn collect_summary(&self, root: &Path) -> Result<Option<String>> {
        let Some(manifest) = PROJECT_MANIFESTS.iter().map(|m| root.join(m)).find(|p| p.is_file()) else {
            return Ok(None);
        };
        let mut parts = Vec::new();
        if let Ok((content, _)) = self.read_capped(&manifest) {
            let name = manifest.file_name().unwrap_or_default().to_string_lossy().into_owned();
            let lang = language_for(&manifest);
            parts.push(format!("# {name}\n```{lang}\n{content}\n```"));
        }
        let tree = build_tree(root, 2, "", &self.config.ignore);
        if !tree.is_empty() {
            parts.push(format!("# Project Structure\n```\n{tree}\n```"));
        }
        if parts.is_empty() {
            Ok(None)
        } else {
            Ok(Some(parts.join("\n\n")))
        }
    }

    /// Reads a file as (lossy) text, cutting it at the per-file byte cap
    fn read_capped(&self, path: &Path) -> color_eyre::Result<(String, bool)> {
        let bytes = fs::read(path).wrap_err_with(|| format!("Couldn't read {}", path.display()))?;
        let mut content = String::from_utf8_lossy(&bytes).into_owned();
        let truncated = truncate_at_boundary(&mut content, self.config.max_file_bytes);
        Ok((content, truncated))
    }
}

/// Truncates a string to at most `cap` bytes, backing off to the nearest char
/// boundary. Returns whether anything was cut.
fn truncate_at_boundary(content: &mut String, cap: usize) -> bool {
    if content.len() <= cap {
        return false;
    }
    let mut index = cap;
    while !content.is_char_boundary(index) {
        index -= 1;
    }
    content.truncate(index);
    true
}

/// Renders a bounded directory tree, skipping ignored names
fn build_tree(path: &Path, depth: usize, prefix: &str, ignore_names: &[String]) -> String {
    if depth == 0 {
        return String::new();
    }
    let Ok(read_dir) = fs::read_dir(path) else {
        return String::new();
    };
    let mut entries: Vec<_> = read_dir
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            !ignore_names.iter().any(|p| *p == name)
        })
        .collect();
    entries.sort_by_key(|e| {
        let is_file = e.file_type().map(|t| t.is_file()).unwrap_or(true);
        (is_file, e.file_name().to_ascii_lowercase())
    });

    let total = entries.len().min(MAX_TREE_ENTRIES);
    let mut lines = Vec::new();
    for (i, entry) in entries.into_iter().take(MAX_TREE_ENTRIES).enumerate() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_last = i + 1 == total;
        let connector = if is_last { "└── " } else { "├── " };
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            lines.push(format!("{prefix}{connector}{name}/"));
            let extension = if is_last { "    " } else { "│   " };
            let subtree = build_tree(&entry.path(), depth - 1, &format!("{prefix}{extension}"), ignore_names);
            if !subtree.is_empty() {
                lines.push(subtree);
            }
        } else {
            lines.push(format!("{prefix}{connector}{name}"));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::errors::AppError;

    fn config(max_files: usize, max_file_bytes: usize) -> ContextConfig {
        ContextConfig {
            max_files,
            max_file_bytes,
            ..ContextConfig::default()
        }
    }

    #[test]
    fn test_missing_root_is_hard_failure() {
        let dir = TempDir::new().unwrap();
        let cfg = config(10, 1000);
        let err = ContextCollector::new(&cfg).collect(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, AppError::UserFacing(UserFacingError::InvalidPath(_))));
    }

    #[test]
    fn test_budget_ignored_and_excluded_counts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "a".repeat(50)).unwrap();
        fs::write(dir.path().join("b.py"), "b".repeat(50)).unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git").join("config"), "[core]").unwrap();

        let cfg = config(1, 1000);
        let bundle = ContextCollector::new(&cfg).collect(dir.path()).unwrap();

        assert_eq!(bundle.included(), 1);
        assert_eq!(bundle.files[0].path, PathBuf::from("a.py"));
        assert_eq!(bundle.excluded, 1);
        assert_eq!(bundle.ignored, 1);
        assert_eq!(bundle.considered, 3);
    }

    #[test]
    fn test_ignored_paths_never_included() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("keep.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("drop.log"), "noise").unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules").join("pkg.js"), "x").unwrap();

        let mut cfg = config(10, 1000);
        cfg.ignore.push("*.log".to_string());
        let bundle = ContextCollector::new(&cfg).collect(dir.path()).unwrap();

        let paths: Vec<_> = bundle.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("keep.rs")]);
        assert_eq!(bundle.ignored, 2);
    }

    #[test]
    fn test_gitignore_is_merged() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".gitignore"), "secret.txt\n").unwrap();
        fs::write(dir.path().join("secret.txt"), "hunter2").unwrap();
        fs::write(dir.path().join("open.txt"), "hello").unwrap();

        let cfg = config(10, 1000);
        let bundle = ContextCollector::new(&cfg).collect(dir.path()).unwrap();

        let paths: Vec<_> = bundle.files.iter().map(|f| f.path.clone()).collect();
        // The .gitignore file itself is collected, its entries are not
        assert_eq!(paths, vec![PathBuf::from(".gitignore"), PathBuf::from("open.txt")]);
        assert_eq!(bundle.ignored, 1);
    }

    #[test]
    fn test_oversized_files_truncated_and_flagged() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("big.txt"), "x".repeat(500)).unwrap();
        fs::write(dir.path().join("small.txt"), "y".repeat(10)).unwrap();

        let cfg = config(10, 100);
        let bundle = ContextCollector::new(&cfg).collect(dir.path()).unwrap();

        let big = bundle.files.iter().find(|f| f.path == PathBuf::from("big.txt")).unwrap();
        assert!(big.truncated);
        assert_eq!(big.content.len(), 100);
        let small = bundle.files.iter().find(|f| f.path == PathBuf::from("small.txt")).unwrap();
        assert!(!small.truncated);
        assert_eq!(small.content.len(), 10);
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        let mut content = String::from("héllo");
        // Cap falls inside the two-byte 'é'
        let truncated = truncate_at_boundary(&mut content, 2);
        assert!(truncated);
        assert_eq!(content, "h");

        let mut ascii = String::from("abcdef");
        assert!(truncate_at_boundary(&mut ascii, 3));
        assert_eq!(ascii.len(), 3);
    }

    #[test]
    fn test_binary_files_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("logo.png"), [0u8, 159, 146, 150]).unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let cfg = config(10, 1000);
        let bundle = ContextCollector::new(&cfg).collect(dir.path()).unwrap();

        assert_eq!(bundle.included(), 1);
        assert_eq!(bundle.binary_skipped, 1);
    }

    #[test]
    fn test_walk_order_is_lexicographic() {
        let dir = TempDir::new().unwrap();
        for name in ["c.txt", "a.txt", "b.txt"] {
            fs::write(dir.path().join(name), name).unwrap();
        }
        let cfg = config(10, 1000);
        let bundle = ContextCollector::new(&cfg).collect(dir.path()).unwrap();
        let paths: Vec<_> = bundle.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("a.txt"), PathBuf::from("b.txt"), PathBuf::from("c.txt")]
        );
    }

    #[test]
    fn test_non_utf8_content_read_lossily() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("latin1.txt"), [b'h', 0xE9, b'!']).unwrap();

        let cfg = config(10, 1000);
        let bundle = ContextCollector::new(&cfg).collect(dir.path()).unwrap();

        assert_eq!(bundle.included(), 1);
        assert_eq!(bundle.files[0].content, "h\u{FFFD}!");
        assert!(bundle.warnings.is_empty());
    }

    #[test]
    fn test_collect_files_bypasses_ignore_but_truncates() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("app.log");
        fs::write(&target, "z".repeat(200)).unwrap();

        let mut cfg = config(10, 50);
        cfg.ignore.push("*.log".to_string());
        let bundle = ContextCollector::new(&cfg).collect_files(&[target]).unwrap();

        assert_eq!(bundle.included(), 1);
        assert!(bundle.files[0].truncated);
        assert_eq!(bundle.files[0].content.len(), 50);
    }

    #[test]
    fn test_collect_files_missing_path_fails() {
        let dir = TempDir::new().unwrap();
        let cfg = config(10, 50);
        let err = ContextCollector::new(&cfg)
            .collect_files(&[dir.path().join("nope.rs")])
            .unwrap_err();
        assert!(matches!(err, AppError::UserFacing(UserFacingError::InvalidPath(_))));
    }

    #[test]
    fn test_summary_requires_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("loose.txt"), "no project here").unwrap();
        let cfg = config(10, 1000);
        assert_eq!(ContextCollector::new(&cfg).collect_summary(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_summary_includes_manifest_and_tree() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"demo\"").unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src").join("main.rs"), "fn main() {}").unwrap();

        let cfg = config(10, 1000);
        let summary = ContextCollector::new(&cfg).collect_summary(dir.path()).unwrap().unwrap();
        assert!(summary.contains("# Cargo.toml"));
        assert!(summary.contains("name = \"demo\""));
        assert!(summary.contains("src/"));
        assert!(summary.contains("main.rs"));
    }

    #[test]
    fn test_render_marks_truncated_files() {
        let bundle = ContextBundle {
            files: vec![
                ContextFile {
                    path: PathBuf::from("full.rs"),
                    content: String::from("fn a() {}"),
                    truncated: false,
                },
                ContextFile {
                    path: PathBuf::from("cut.rs"),
                    content: String::from("fn b("),
                    truncated: true,
                },
            ],
            ..ContextBundle::default()
        };
        let rendered = bundle.render();
        assert!(rendered.contains("# full.rs\n```rust"));
        assert!(rendered.contains("# cut.rs (truncated)"));
    }

    #[test]
    fn test_ignore_set_dedups_patterns() {
        let set = IgnoreSet::new(["*.log", "*.log", "", "target"]).unwrap();
        assert_eq!(set.patterns(), &["*.log".to_string(), "target".to_string()]);
    }
}
