//! Shared test utilities for the site-tools test suite.
//!
//! Builders for channel messages and on-disk site trees, plus small
//! filesystem helpers for mtime-sensitive tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let site = SiteFixture::new();
//! site.file("scans/Quorum_64/p001.jpg", "jpeg");
//! site.file_sized("scans/Quorum_64.pdf", 3 * 1024 * 1024);
//!
//! let album = message(102, Some(9), &["b.jpg"]);
//! ```

use chrono::{DateTime, FixedOffset, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use crate::channel::{MediaRef, Message};

// =========================================================================
// Messages
// =========================================================================

/// Fixed timestamp used by every test message: 2025-06-05 14:00:12 UTC+03:00.
pub fn message_date() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(3 * 3600)
        .unwrap()
        .with_ymd_and_hms(2025, 6, 5, 14, 0, 12)
        .unwrap()
}

/// A message with text `"message <id>"` and one media entry per file name.
pub fn message(id: i64, grouped_id: Option<i64>, files: &[&str]) -> Message {
    Message {
        id,
        date: message_date(),
        text: format!("message {id}"),
        grouped_id,
        media: files
            .iter()
            .map(|f| MediaRef {
                file_name: f.to_string(),
                url: format!("/media/{id}/{f}"),
            })
            .collect(),
    }
}

// =========================================================================
// Site trees
// =========================================================================

/// A throwaway site root. Removed when dropped.
pub struct SiteFixture {
    tmp: TempDir,
}

impl SiteFixture {
    pub fn new() -> Self {
        Self {
            tmp: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.tmp.path().join(rel)
    }

    /// Write a file (creating parents) and return its path.
    pub fn file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    /// Write a zero-filled file of exactly `len` bytes.
    pub fn file_sized(&self, rel: &str, len: u64) -> PathBuf {
        let path = self.file(rel, "");
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(len)
            .unwrap();
        path
    }

    pub fn dir(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(&path).unwrap();
        path
    }
}

// =========================================================================
// Modification times
// =========================================================================

/// Set a file's modification time to `secs` seconds after the epoch.
pub fn set_mtime(path: &Path, secs: u64) {
    let time = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

pub fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}
