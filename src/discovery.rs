//! Source discovery: turn the command-line paths into the list of Python
//! files to check.
//!
//! A path naming a file is taken as is. A directory is walked with
//! `.gitignore` rules applied and hidden entries skipped, keeping `.py`
//! sources and `.pyi` stubs. Environment and cache directories in
//! [`SKIPPED_DIRS`] are never entered, gitignored or not.

use anyhow::{Result, bail};
use ignore::{DirEntry, WalkBuilder};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// Directory names whose contents are never checked.
pub const SKIPPED_DIRS: &[&str] = &[
    "venv",
    "env",
    "virtualenv",
    "__pycache__",
    "site-packages",
    "build",
    "dist",
    "node_modules",
];

const EXTENSIONS: &[&str] = &["py", "pyi"];

/// Collect Python files under `paths`, sorted and without duplicates.
///
/// `exclude` holds directory or file names; any file with a path component
/// equal to one of them is dropped. Explicitly named files are dropped only
/// by `exclude`.
pub fn collect_sources(paths: &[PathBuf], exclude: &[String]) -> Result<Vec<PathBuf>> {
    let mut found = BTreeSet::new();
    for path in paths {
        if path.is_file() {
            if !is_excluded(path, exclude) {
                found.insert(path.clone());
            }
        } else if path.is_dir() {
            walk(path, exclude, &mut found)?;
        } else {
            bail!("no such file or directory: {}", path.display());
        }
    }
    Ok(found.into_iter().collect())
}

fn walk(root: &Path, exclude: &[String], found: &mut BTreeSet<PathBuf>) -> Result<()> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .filter_entry(|entry| !is_skipped_dir(entry))
        .build();

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        let python = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| EXTENSIONS.contains(&e));
        if python && !is_excluded(path, exclude) {
            found.insert(path.to_path_buf());
        }
    }
    Ok(())
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_some_and(|t| t.is_dir())
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn is_excluded(path: &Path, exclude: &[String]) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => exclude.iter().any(|ex| name.to_string_lossy() == ex.as_str()),
        _ => false,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
