//! Scanned document copier.
//!
//! Scanned books live outside the generator's content tree:
//!
//! ```text
//! scans/
//! ├── Quorum_64/           # page gallery (images only, handled elsewhere)
//! ├── Quorum_64.pdf
//! ├── Quorum_64.djvu
//! └── magazines/
//!     └── Tekhnika_1971.pdf
//! ```
//!
//! On the `initialized` signal every PDF/DJVU under the scans root is mirrored
//! into the output folder at the same relative path (`output/scans/...`).
//! A file is copied when its destination is missing or strictly older than
//! the source; copies carry the source mtime over so an untouched file is
//! skipped on the next build. Nothing is ever deleted from the output.

use crate::output;
use crate::signals::{Signal, Signals, SiteContext};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// One file that could not be copied.
#[derive(Debug)]
pub struct CopyFailure {
    pub source: PathBuf,
    pub error: io::Error,
}

/// Outcome of one sync run.
#[derive(Debug, Default)]
pub struct CopyReport {
    /// `(source, destination)` pairs that were copied.
    pub copied: Vec<(PathBuf, PathBuf)>,
    /// Files whose destination was already up to date.
    pub skipped: usize,
    pub failed: Vec<CopyFailure>,
}

impl CopyReport {
    pub fn discovered(&self) -> usize {
        self.copied.len() + self.skipped + self.failed.len()
    }
}

/// Files found under a scans root, plus entries that could not be read.
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<PathBuf>,
    pub unreadable: Vec<CopyFailure>,
}

/// Find every file under `scans_root` whose extension is in `extensions`
/// (ASCII case-insensitive), sorted by path. A missing root yields nothing.
///
/// An entry that cannot be read is skipped along with anything below it;
/// the rest of the tree is still walked.
pub fn discover(scans_root: &Path, extensions: &[String]) -> Discovery {
    let mut found = Discovery::default();
    if !scans_root.is_dir() {
        return found;
    }
    for entry in WalkDir::new(scans_root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let source = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| scans_root.to_path_buf());
                tracing::warn!(path = %source.display(), error = %e, "skipping unreadable entry");
                found.unreadable.push(CopyFailure {
                    source,
                    error: io::Error::from(e),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
            })
            .unwrap_or(false);
        if matches {
            found.files.push(entry.into_path());
        }
    }
    found
}

/// Destination of `source` inside `output_dir`, mirroring its path
/// relative to `site_root` with `/` separators.
pub fn mirror_path(source: &Path, site_root: &Path, output_dir: &Path) -> PathBuf {
    let rel = source.strip_prefix(site_root).unwrap_or(source);
    let normalized: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    output_dir.join(normalized.join("/"))
}

/// Whether `source` should overwrite `dest`: missing, or strictly older.
pub fn needs_copy(source: &Path, dest: &Path) -> io::Result<bool> {
    let dest_meta = match fs::metadata(dest) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };
    let source_mtime = fs::metadata(source)?.modified()?;
    Ok(source_mtime > dest_meta.modified()?)
}

/// Copy a file and carry its modification time over.
fn copy_preserving_mtime(source: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, dest)?;
    let mtime = fs::metadata(source)?.modified()?;
    fs::File::options().write(true).open(dest)?.set_modified(mtime)?;
    Ok(())
}

/// Mirror every scan document under the site into `output_dir`.
///
/// Per-file failures, unreadable directories included, are recorded in the
/// report and never stop the batch.
pub fn sync_scans(context: &SiteContext) -> CopyReport {
    let scans_root = context.root.join(&context.config.scans.root);
    let output_dir = context.output_dir();
    let found = discover(&scans_root, &context.config.scans.extensions);

    let mut report = CopyReport {
        failed: found.unreadable,
        ..CopyReport::default()
    };
    for source in found.files {
        let dest = mirror_path(&source, &context.root, &output_dir);
        let result = needs_copy(&source, &dest).and_then(|copy| {
            if copy {
                copy_preserving_mtime(&source, &dest)?;
            }
            Ok(copy)
        });
        match result {
            Ok(true) => {
                tracing::info!(from = %source.display(), to = %dest.display(), "copied");
                report.copied.push((source, dest));
            }
            Ok(false) => report.skipped += 1,
            Err(error) => {
                tracing::warn!(file = %source.display(), %error, "copy failed");
                report.failed.push(CopyFailure { source, error });
            }
        }
    }
    report
}

/// The `initialized` handler: syncs scans and prints the summary.
pub struct ScanCopier;

impl ScanCopier {
    pub const NAME: &'static str = "copy_scans";

    /// Subscribe the copier to `initialized`.
    pub fn connect(signals: &mut Signals) {
        signals.connect(Signal::Initialized, Self::on_initialized);
        output::print_copier_connected(Signal::Initialized);
    }

    fn on_initialized(context: &SiteContext) {
        let report = sync_scans(context);
        output::print_copy_report(&report, &context.root);
    }
}
