use clap::Parser;
use colored::Colorize;
use parsnip::analyze::{self, FileReport};
use parsnip::{discovery, load_grammar};
use serde_json::json;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "parsnip",
    about = "Report Python syntax errors the way CPython does",
    version,
    long_about = "Parsnip parses Python source with the grammar of a chosen interpreter \
                  version (3.3 to 3.8) and reports every SyntaxError (E901) and \
                  IndentationError (E903) that version would raise, with CPython's \
                  messages and positions. Parsing continues past each error."
)]
struct Cli {
    /// Files or directories to check.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Python version whose grammar applies (e.g. --target 3.6).
    #[arg(long, default_value = "3.8")]
    target: String,

    /// Skip files with a path component equal to any of the given
    /// comma-separated names (e.g. --exclude tests,vendor).
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,

    /// Emit results as JSON instead of the default text format.
    #[arg(long)]
    json: bool,

    /// Exit with code 0 even when errors are found.
    #[arg(long)]
    no_exit_code: bool,
}

fn main() {
    let cli = Cli::parse();

    let grammar = match load_grammar(&cli.target) {
        Ok(g) => g,
        Err(e) => fail(e),
    };

    // ── discovery ─────────────────────────────────────────────────────────────
    let exclude = cli.exclude.unwrap_or_default();
    let files = match discovery::collect_sources(&cli.paths, &exclude) {
        Ok(files) => files,
        Err(e) => fail(e),
    };

    // ── parsing ───────────────────────────────────────────────────────────────
    let reports = analyze::check_files(&files, grammar);
    let count: usize = reports.iter().map(|r| r.diagnostics.len()).sum();

    // ── output ────────────────────────────────────────────────────────────────
    if cli.json {
        print_json(&reports, &cli.target, count);
    } else {
        for report in &reports {
            for d in &report.diagnostics {
                println!("{}:{d}", report.file);
            }
        }
        let checked = reports.len();
        if count == 0 {
            println!("{}", format!("No syntax errors in {checked} file(s)").green());
        } else {
            let broken = reports.iter().filter(|r| !r.is_clean()).count();
            println!(
                "{}",
                format!("Found {count} error(s) in {broken} of {checked} file(s)")
                    .yellow()
                    .bold()
            );
        }
    }

    if !cli.no_exit_code && count > 0 {
        process::exit(1);
    }
}

fn fail(e: impl std::fmt::Display) -> ! {
    eprintln!("{}: {e}", "error".red().bold());
    process::exit(2);
}

fn print_json(reports: &[FileReport], target: &str, count: usize) {
    let items: Vec<serde_json::Value> = reports
        .iter()
        .flat_map(|r| {
            r.diagnostics.iter().map(move |d| {
                json!({
                    "file":    r.file,
                    "line":    d.start().line,
                    "col":     d.start().column,
                    "end":     d.end_pos(),
                    "code":    d.code(),
                    "message": d.message(),
                })
            })
        })
        .collect();

    let output = json!({
        "target":      target,
        "diagnostics": items,
        "count":       count,
    });

    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{text}"),
        Err(e) => fail(e),
    }
}
