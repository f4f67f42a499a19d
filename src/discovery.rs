//! File discovery for a repository root.
//!
//! Walks the tree with `walkdir`, pruning excluded directories, and keeps
//! regular files whose extension is in the include list. Lock files and
//! minified bundles are always skipped. Symlinks are never followed.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use crate::config::DiscoveryConfig;

const ALWAYS_EXCLUDED: &[&str] = &[
    "**/package-lock.json",
    "**/yarn.lock",
    "**/pnpm-lock.yaml",
    "**/poetry.lock",
    "**/Cargo.lock",
    "**/*.min.*",
];

/// Return sorted, repo-relative paths (forward slashes) of files to ingest.
pub fn discover_files(root: &Path, config: &DiscoveryConfig) -> Result<Vec<String>> {
    if !root.is_dir() {
        bail!("Repository root is not a directory: {}", root.display());
    }

    let exclude_set = build_globset(ALWAYS_EXCLUDED)?;
    let include_exts: Vec<String> = config
        .include_exts
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();

    let mut paths = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e, &config.exclude_dirs));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !include_exts.iter().any(|inc| *inc == ext) {
            continue;
        }

        paths.push(rel_str);
    }

    // Sort for deterministic ordering
    paths.sort();
    paths.dedup();

    tracing::info!(root = %root.display(), files = paths.len(), "discovered files");
    Ok(paths)
}

fn is_excluded_dir(entry: &DirEntry, exclude_dirs: &[String]) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && exclude_dirs
            .iter()
            .any(|d| entry.file_name().to_string_lossy() == d.as_str())
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x\n").unwrap();
    }

    #[test]
    fn test_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "src/b.py");
        touch(root, "src/a.ts");
        touch(root, "README.md");
        touch(root, "notes.txt");
        touch(root, "node_modules/lib/index.js");
        touch(root, ".git/hooks/pre-commit.sh");
        touch(root, "web/app.min.js");
        touch(root, "Cargo.lock");
        touch(root, "web/package-lock.json");
        touch(root, "src/deep/Main.JAVA");

        let files = discover_files(root, &DiscoveryConfig::default()).unwrap();
        assert_eq!(
            files,
            vec!["README.md", "src/a.ts", "src/b.py", "src/deep/Main.JAVA"]
        );
    }

    #[test]
    fn test_custom_include_exts() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.py");
        touch(tmp.path(), "b.rs");
        let cfg = DiscoveryConfig {
            include_exts: vec!["rs".to_string()],
            ..DiscoveryConfig::default()
        };
        assert_eq!(discover_files(tmp.path(), &cfg).unwrap(), vec!["b.rs"]);
    }

    #[test]
    fn test_missing_root_fails() {
        let tmp = TempDir::new().unwrap();
        let err = discover_files(&tmp.path().join("missing"), &DiscoveryConfig::default());
        assert!(err.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_skips_symlinks() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "real.py");
        std::os::unix::fs::symlink(tmp.path().join("real.py"), tmp.path().join("link.py"))
            .unwrap();
        assert_eq!(
            discover_files(tmp.path(), &DiscoveryConfig::default()).unwrap(),
            vec!["real.py"]
        );
    }
}
