//! Imported post composition.
//!
//! A post is written as a reStructuredText file with the generator's
//! comment-style metadata header:
//!
//! ```text
//! .. title: First line of the message
//! .. slug: 2025-06-05
//! .. date: 2025-06-05 14:00:12 UTC+03:00
//! .. tags:
//! .. category:
//! .. description:
//! .. type: text
//!
//! Message body
//!
//! .. thumbnail:: /images/photo_1.jpg
//! .. thumbnail:: /images/photo_2.jpg
//! ```
//!
//! The file is named after the message timestamp down to the millisecond
//! (`2025-06-05_14-00-12-223.rst`), so lexicographic order of post files is
//! chronological order of messages.

use crate::config::ImportConfig;
use chrono::{DateTime, FixedOffset};
use std::fs;
use std::path::{Path, PathBuf};

/// A post ready to be written. Built once per import, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedPost {
    pub title: String,
    pub slug: String,
    pub date: DateTime<FixedOffset>,
    pub body: String,
    /// Absolute paths of the post's media, in attachment order.
    pub media: Vec<PathBuf>,
}

impl ImportedPost {
    pub fn new(
        text: &str,
        media: Vec<PathBuf>,
        date: DateTime<FixedOffset>,
        config: &ImportConfig,
    ) -> Self {
        let title = derive_title(text, config.title_max_chars)
            .unwrap_or_else(|| config.default_title.clone());
        Self {
            title,
            slug: date.format("%Y-%m-%d").to_string(),
            date,
            body: text.trim().to_string(),
            media,
        }
    }

    /// File name of the post, e.g. `2025-06-05_14-00-12-223.rst`.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", filename_from_dt(&self.date), extension)
    }

    /// Render the full post document.
    ///
    /// Media are referenced by basename under `/<images_subdir>/`.
    pub fn render(&self, images_subdir: &str) -> String {
        let mut lines = vec![
            format!(".. title: {}", self.title),
            format!(".. slug: {}", self.slug),
            format!(".. date: {}", format_date_for_header(&self.date)),
            ".. tags:".to_string(),
            ".. category:".to_string(),
            ".. description:".to_string(),
            ".. type: text".to_string(),
            String::new(),
            self.body.clone(),
            String::new(),
        ];
        for path in &self.media {
            if let Some(name) = path.file_name() {
                lines.push(format!(
                    ".. thumbnail:: /{}/{}",
                    images_subdir,
                    name.to_string_lossy()
                ));
            }
        }
        lines.join("\n")
    }
}

/// Use the message's first line as a title when it is non-empty and
/// shorter than `max_chars` characters.
pub fn derive_title(text: &str, max_chars: usize) -> Option<String> {
    let first = text.trim().lines().next()?.trim();
    (!first.is_empty() && first.chars().count() < max_chars).then(|| first.to_string())
}

/// Header date: `YYYY-MM-DD HH:MM:SS UTC±hh:mm`, using the timestamp's own offset.
pub fn format_date_for_header(dt: &DateTime<FixedOffset>) -> String {
    let total = dt.offset().local_minus_utc();
    let sign = if total >= 0 { '+' } else { '-' };
    let abs = total.unsigned_abs();
    let (hh, mm) = (abs / 3600, (abs % 3600) / 60);
    format!("{} UTC{sign}{hh:02}:{mm:02}", dt.format("%Y-%m-%d %H:%M:%S"))
}

/// Post file stem: `YYYY-MM-DD_HH-MM-SS-mmm`.
pub fn filename_from_dt(dt: &DateTime<FixedOffset>) -> String {
    let ms = dt.timestamp_subsec_millis().min(999);
    format!("{}-{ms:03}", dt.format("%Y-%m-%d_%H-%M-%S"))
}

/// Write `post` into `posts_dir`, creating the directory if needed.
pub fn write_post(
    post: &ImportedPost,
    posts_dir: &Path,
    config: &ImportConfig,
) -> std::io::Result<PathBuf> {
    fs::create_dir_all(posts_dir)?;
    let path = posts_dir.join(post.file_name(&config.post_extension));
    fs::write(&path, post.render(&config.images_dir))?;
    tracing::info!(path = %path.display(), media = post.media.len(), "post written");
    Ok(path)
}
