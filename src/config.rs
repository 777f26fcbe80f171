//! Site configuration module.
//!
//! Handles loading, validating, and migrating `site.toml`. The file is
//! optional and sparse: stock defaults are the base layer and whatever the
//! user writes is merged on top, key by key.
//!
//! ## Config File Location
//!
//! ```text
//! site/
//! ├── site.toml        # optional, overrides stock defaults
//! ├── posts/           # imported posts land here
//! ├── images/          # imported media land here
//! └── scans/           # scanned documents and their page galleries
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! [site]
//! output_folder = "output"   # generator output directory (legacy key: output_dir)
//!
//! [import]
//! posts_dir = "posts"
//! images_dir = "images"
//! post_extension = "rst"
//! default_title = "Telegram import"
//! title_max_chars = 80
//! album_radius = 50
//! session_name = "telegram_session"
//! api_base = "http://127.0.0.1:8081"
//!
//! [scans]
//! root = "scans"
//! extensions = ["pdf", "djvu"]
//!
//! [gallery]
//! thumbnail_suffix = "thumbnail"
//! view_label = "Просмотреть"
//! download_label = "Скачать"
//! size_unit = "МБ"
//! ```
//!
//! ## Legacy Keys
//!
//! Older site configs spell the output directory `output_dir`. The loader
//! rewrites it to `output_folder` once, before deserialization, so the rest
//! of the crate only ever sees the one field. When both keys are present
//! `output_folder` wins.
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the site root.
pub const CONFIG_FILENAME: &str = "site.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `site.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Generator-level settings shared with the site build.
    pub site: SiteSection,
    /// Channel post importer settings.
    pub import: ImportConfig,
    /// Scanned document tree settings (copier source, gallery root).
    pub scans: ScansConfig,
    /// Gallery fragment labels and thumbnail naming.
    pub gallery: GalleryConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.output_folder.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site.output_folder must not be empty".into(),
            ));
        }
        if self.import.post_extension.is_empty() || self.import.post_extension.contains('.') {
            return Err(ConfigError::Validation(
                "import.post_extension must be a bare extension like \"rst\"".into(),
            ));
        }
        if self.import.title_max_chars == 0 {
            return Err(ConfigError::Validation(
                "import.title_max_chars must be non-zero".into(),
            ));
        }
        if self.import.album_radius < 0 {
            return Err(ConfigError::Validation(
                "import.album_radius must not be negative".into(),
            ));
        }
        if self.import.api_base.trim().is_empty() {
            return Err(ConfigError::Validation(
                "import.api_base must not be empty".into(),
            ));
        }
        if self.scans.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "scans.extensions must not be empty".into(),
            ));
        }
        if self.gallery.thumbnail_suffix.is_empty() {
            return Err(ConfigError::Validation(
                "gallery.thumbnail_suffix must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Output directory resolved against the site root.
    pub fn output_dir(&self, site_root: &Path) -> PathBuf {
        site_root.join(&self.site.output_folder)
    }
}

/// Generator-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSection {
    /// Directory the generator renders into, relative to the site root.
    pub output_folder: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            output_folder: "output".to_string(),
        }
    }
}

/// Channel post importer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    /// Posts directory, relative to the site root.
    pub posts_dir: String,
    /// Images directory, relative to the site root. Also the URL prefix
    /// used in thumbnail references.
    pub images_dir: String,
    /// Extension of written post files, without the dot.
    pub post_extension: String,
    /// Title used when the message's first line is unusable.
    pub default_title: String,
    /// A first line is a title only if it is strictly shorter than this.
    pub title_max_chars: usize,
    /// Number of message ids scanned on each side of a grouped message.
    pub album_radius: i64,
    /// Session name sent to the gateway when opening a session.
    pub session_name: String,
    /// Base URL of the message gateway.
    pub api_base: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            posts_dir: "posts".to_string(),
            images_dir: "images".to_string(),
            post_extension: "rst".to_string(),
            default_title: "Telegram import".to_string(),
            title_max_chars: 80,
            album_radius: 50,
            session_name: "telegram_session".to_string(),
            api_base: "http://127.0.0.1:8081".to_string(),
        }
    }
}

/// Scanned document tree settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScansConfig {
    /// Root of the scans tree, relative to the site root.
    pub root: String,
    /// Document extensions copied into the output tree.
    pub extensions: Vec<String>,
}

impl Default for ScansConfig {
    fn default() -> Self {
        Self {
            root: "scans".to_string(),
            extensions: vec!["pdf".to_string(), "djvu".to_string()],
        }
    }
}

/// Gallery fragment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Infix of the generated thumbnail variant: `p001.jpg` → `p001.thumbnail.jpg`.
    pub thumbnail_suffix: String,
    /// Text of the view-gallery link.
    pub view_label: String,
    /// Prefix of each download link, followed by the format name.
    pub download_label: String,
    /// Unit shown after download sizes.
    pub size_unit: String,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            thumbnail_suffix: "thumbnail".to_string(),
            view_label: "Просмотреть".to_string(),
            download_label: "Скачать".to_string(),
            size_unit: "МБ".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and migration
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Rewrite legacy key spellings in a raw user config.
///
/// `[site] output_dir` becomes `output_folder`. If both are present the
/// legacy key is dropped.
pub fn migrate_legacy_keys(mut value: toml::Value) -> toml::Value {
    if let Some(site) = value.get_mut("site").and_then(|s| s.as_table_mut())
        && let Some(legacy) = site.remove("output_dir")
    {
        if site.contains_key("output_folder") {
            tracing::warn!("site.output_dir ignored: site.output_folder is also set");
        } else {
            tracing::debug!("migrating site.output_dir to site.output_folder");
            site.insert("output_folder".to_string(), legacy);
        }
    }
    value
}

/// Load `site.toml` from a directory as a raw, migrated TOML value.
///
/// Returns `Ok(None)` if no config file exists in the directory.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(migrate_legacy_keys(value)))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `site.toml` in the given site root.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `site.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Site Tools Configuration
# ========================
# Place this file as site.toml in the site root. All keys are optional;
# anything left out keeps the value shown here.
# Unknown keys will cause an error.

[site]
# Directory the static-site generator renders into, relative to the site root.
# Older configs may spell this key output_dir; it is still accepted.
output_folder = "output"

[import]
# Where imported posts and their media are written, relative to the site root.
posts_dir = "posts"
images_dir = "images"

# Extension of post files (posts are named YYYY-MM-DD_HH-MM-SS-mmm.<ext>).
post_extension = "rst"

# Title used when the message's first line is empty or too long.
default_title = "Telegram import"

# The first line becomes the title only when shorter than this many characters.
title_max_chars = 80

# Message ids scanned on each side of a grouped (album) message.
album_radius = 50

# Session name and base URL of the message gateway.
session_name = "telegram_session"
api_base = "http://127.0.0.1:8081"

[scans]
# Root of the scanned documents tree, relative to the site root.
# The copier mirrors it into the output folder; the scan directive reads
# galleries from it.
root = "scans"

# Document extensions copied into the output folder.
extensions = ["pdf", "djvu"]

[gallery]
# Thumbnail variant naming: page-001.jpg -> page-001.thumbnail.jpg
thumbnail_suffix = "thumbnail"

# Link labels used in the rendered gallery entry.
view_label = "Просмотреть"
download_label = "Скачать"
size_unit = "МБ"
"##
}
