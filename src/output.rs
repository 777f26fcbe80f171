//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Import
//!
//! ```text
//! [+] Post saved: /site/posts/2025-06-05_14-00-12-223.rst
//! [+] Media saved:
//!    - /site/images/a.jpg
//!    - /site/images/b.jpg
//! ```
//!
//! or, for a text-only message:
//!
//! ```text
//! [+] Post saved: /site/posts/2025-06-05_14-00-12-223.rst
//! [i] No media saved for this post.
//! ```
//!
//! ## Copy scans
//!
//! ```text
//! [copy_scans] connected to 'initialized'
//! [copy_scans] copied scans/a.pdf -> output/scans/a.pdf
//! [copy_scans] failed to copy scans/sub/b.pdf: Not a directory (os error 20)
//! [copy_scans] copied 1 file(s), skipped 3 (up-to-date)
//! ```
//!
//! ## Render
//!
//! Document-level errors go to stderr, one per line:
//!
//! ```text
//! posts/library.rst:12: scan directive: gallery not found: 'scans/Nowhere'
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout (stderr for errors). Format
//! functions are pure — no I/O, no side effects.

use crate::copier::{CopyReport, ScanCopier};
use crate::importer::ImportOutcome;
use crate::markup::DocumentError;
use crate::signals::Signal;
use std::path::Path;

/// Display a path relative to `root` when it lives under it.
fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn copier_line(message: &str) -> String {
    format!("[{}] {}", ScanCopier::NAME, message)
}

// ============================================================================
// Import
// ============================================================================

/// Format the result of a message import.
pub fn format_import_output(outcome: &ImportOutcome) -> Vec<String> {
    let mut lines = vec![format!("[+] Post saved: {}", outcome.post_path.display())];
    if outcome.media.is_empty() {
        lines.push("[i] No media saved for this post.".to_string());
    } else {
        lines.push("[+] Media saved:".to_string());
        for path in &outcome.media {
            lines.push(format!("   - {}", path.display()));
        }
    }
    lines
}

pub fn print_import_output(outcome: &ImportOutcome) {
    for line in format_import_output(outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Copy scans
// ============================================================================

/// Format a scan sync report. Paths are shown relative to the site root.
pub fn format_copy_report(report: &CopyReport, site_root: &Path) -> Vec<String> {
    if report.discovered() == 0 {
        return vec![copier_line("no pdf/djvu found")];
    }

    let mut lines = Vec::new();
    for (source, dest) in &report.copied {
        lines.push(copier_line(&format!(
            "copied {} -> {}",
            display_relative(source, site_root),
            display_relative(dest, site_root)
        )));
    }
    for failure in &report.failed {
        lines.push(copier_line(&format!(
            "failed to copy {}: {}",
            display_relative(&failure.source, site_root),
            failure.error
        )));
    }
    lines.push(copier_line(&format!(
        "copied {} file(s), skipped {} (up-to-date)",
        report.copied.len(),
        report.skipped
    )));
    lines
}

pub fn print_copy_report(report: &CopyReport, site_root: &Path) {
    for line in format_copy_report(report, site_root) {
        println!("{}", line);
    }
}

/// Format the line printed when the copier subscribes to a signal.
pub fn format_copier_connected(signal: Signal) -> String {
    copier_line(&format!("connected to '{}'", signal.name()))
}

pub fn print_copier_connected(signal: Signal) {
    println!("{}", format_copier_connected(signal));
}

// ============================================================================
// Render
// ============================================================================

/// Format document errors as `<file>:<line>: <message>`.
pub fn format_document_errors(file: &Path, errors: &[DocumentError]) -> Vec<String> {
    errors
        .iter()
        .map(|e| format!("{}:{}: {}", file.display(), e.line, e.message))
        .collect()
}

pub fn print_document_errors(file: &Path, errors: &[DocumentError]) {
    for line in format_document_errors(file, errors) {
        eprintln!("{}", line);
    }
}
