//! File-level checking: read each file, parse it under the target grammar and
//! keep its diagnostics. Files share nothing but the grammar, so they are
//! checked in parallel.

use crate::grammar::Grammar;
use crate::types::Diagnostic;
use anyhow::{Context, Result};
use colored::Colorize;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// The diagnostics of one file, in source order.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub file: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

// ── public entry point ───────────────────────────────────────────────────────

/// Check every file in `files`. A file that cannot be read or parsed is
/// reported on stderr and left out. Reports come back sorted by path.
pub fn check_files(files: &[PathBuf], grammar: &Grammar) -> Vec<FileReport> {
    let mut reports: Vec<FileReport> = files
        .par_iter()
        .filter_map(|path| match check_file(path, grammar) {
            Ok(report) => Some(report),
            Err(e) => {
                eprintln!("{}: {e:#}", "error".red().bold());
                None
            }
        })
        .collect();
    reports.sort_by(|a, b| a.file.cmp(&b.file));
    reports
}

pub fn check_file(path: &Path, grammar: &Grammar) -> Result<FileReport> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let diagnostics = check_source(&source, grammar)
        .with_context(|| format!("cannot check {}", path.display()))?;
    Ok(FileReport {
        file: path.to_string_lossy().into_owned(),
        diagnostics,
    })
}

/// Diagnostics for one source text. A leading byte-order mark is ignored.
pub fn check_source(source: &str, grammar: &Grammar) -> Result<Vec<Diagnostic>> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    Ok(grammar.parse(source)?.into_diagnostics())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::load_grammar;
    use tempfile::TempDir;

    #[test]
    fn test_reports_sorted_by_path() {
        let dir = TempDir::new().unwrap();
        let b = dir.path().join("b.py");
        let a = dir.path().join("a.py");
        fs::write(&b, "x = (\n").unwrap();
        fs::write(&a, "x = 1\n").unwrap();

        let reports = check_files(&[b, a], load_grammar("3.8").unwrap());
        assert_eq!(reports.len(), 2);
        assert!(reports[0].file.ends_with("a.py"));
        assert!(reports[0].is_clean());
        assert_eq!(reports[1].diagnostics.len(), 1);
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.py");
        let reports = check_files(&[missing], load_grammar("3.8").unwrap());
        assert!(reports.is_empty());
    }

    #[test]
    fn test_byte_order_mark() {
        let grammar = load_grammar("3.8").unwrap();
        assert!(check_source("\u{feff}import os\n", grammar).unwrap().is_empty());
    }

    #[test]
    fn test_target_version_matters() {
        let src = "async = 1\n";
        assert!(check_source(src, load_grammar("3.6").unwrap()).unwrap().is_empty());
        assert_eq!(check_source(src, load_grammar("3.7").unwrap()).unwrap().len(), 1);
    }
}
