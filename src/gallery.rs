//! Scanned book gallery entries.
//!
//! The `scan` directive turns
//!
//! ```rst
//! .. scan:: Quorum, issue 64
//!    :path: Quorum_64
//!    :desc: Club magazine, <b>1964</b>.
//! ```
//!
//! into a two-column HTML block: a thumbnail of the gallery's first page on
//! the left linking to the gallery, and on the right the title, the
//! description (as raw HTML), a view link and download links for the
//! scanned documents sitting next to the gallery:
//!
//! ```text
//! scans/
//! ├── Quorum_64/          # gallery: p001.jpg, p002.jpg, ...
//! ├── Quorum_64.pdf       # → "Download PDF (12.3 MB)"
//! └── Quorum_64.djvu      # → "Download DJVU (4.1 MB)"
//! ```
//!
//! The thumbnail is the generator's thumbnail variant of the first image in
//! lexicographic order: `p001.jpg` → `p001.thumbnail.jpg`. A gallery with no
//! images gets an empty placeholder box instead.
//!
//! Everything is recomputed from the filesystem on each occurrence; nothing
//! is cached and nothing is written.

use crate::config::{GalleryConfig, SiteConfig};
use crate::markup::{Directive, DirectiveSpec, Invocation, Node, Registry, Role};
use maud::{Markup, PreEscaped, html};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name under which the directive and the role are registered.
pub const NAME: &str = "scan";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("scan directive: missing ':path:' option (e.g. :path: Quorum_64).")]
    MissingPath,
    #[error("scan directive: gallery not found: '{0}'")]
    NotFound(String),
    #[error("scan directive: cannot read gallery directory '{0}'")]
    Unreadable(String, #[source] std::io::Error),
}

/// The directive's input.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub title: String,
    pub dirname: String,
    pub description: String,
}

impl GalleryEntry {
    pub fn from_invocation(invocation: &Invocation) -> Result<Self, GalleryError> {
        let dirname = invocation.option_str("path");
        if dirname.is_empty() {
            return Err(GalleryError::MissingPath);
        }
        Ok(Self {
            title: invocation
                .arguments
                .first()
                .map(|a| a.trim().to_string())
                .unwrap_or_default(),
            dirname: dirname.to_string(),
            description: invocation.option_str("desc").to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Djvu,
}

impl DocumentKind {
    const ALL: [DocumentKind; 2] = [DocumentKind::Pdf, DocumentKind::Djvu];

    fn extension(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Djvu => "djvu",
        }
    }

    fn label(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "PDF",
            DocumentKind::Djvu => "DJVU",
        }
    }

    fn icon(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "bi bi-file-earmark-pdf",
            DocumentKind::Djvu => "bi bi-file-earmark",
        }
    }
}

/// A downloadable document next to the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub kind: DocumentKind,
    pub href: String,
    pub size: String,
}

/// What the filesystem says about an entry at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntry {
    pub gallery_href: String,
    pub thumbnail: Option<String>,
    pub downloads: Vec<Download>,
}

/// Site-absolute URL for a path relative to the site root.
fn site_href(rel: &Path) -> String {
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("/{}", parts.join("/"))
}

fn is_image_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|e| {
            let e = e.to_string_lossy();
            IMAGE_EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Thumbnail variant of an image file name: `p001.jpg` → `p001.thumbnail.jpg`.
pub fn thumbnail_variant(file_name: &str, suffix: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}.{suffix}.{ext}"),
        _ => format!("{file_name}.{suffix}"),
    }
}

/// File size in megabytes with one decimal, or `—` if it cannot be read.
pub fn format_size(path: &Path, unit: &str) -> String {
    match fs::metadata(path) {
        Ok(meta) => format!("{:.1} {unit}", meta.len() as f64 / (1024.0 * 1024.0)),
        Err(_) => "—".to_string(),
    }
}

/// First image in the gallery directory, by file name.
fn first_image(dir: &Path) -> std::io::Result<Option<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names.into_iter().find(|n| is_image_name(n)))
}

/// Look up the gallery directory, its thumbnail, and sibling documents.
pub fn resolve(
    entry: &GalleryEntry,
    site_root: &Path,
    scans_root: &str,
    config: &GalleryConfig,
) -> Result<ResolvedEntry, GalleryError> {
    let gallery_rel = Path::new(scans_root).join(&entry.dirname);
    let gallery_display = gallery_rel.to_string_lossy().replace('\\', "/");
    let gallery_dir = site_root.join(&gallery_rel);
    if !gallery_dir.is_dir() {
        return Err(GalleryError::NotFound(gallery_display));
    }

    let thumbnail = first_image(&gallery_dir)
        .map_err(|e| GalleryError::Unreadable(gallery_display.clone(), e))?
        .map(|name| site_href(&gallery_rel.join(thumbnail_variant(&name, &config.thumbnail_suffix))));

    let downloads = DocumentKind::ALL
        .iter()
        .filter_map(|&kind| {
            let rel = Path::new(scans_root).join(format!("{}.{}", entry.dirname, kind.extension()));
            let fs_path = site_root.join(&rel);
            fs_path.is_file().then(|| Download {
                kind,
                href: site_href(&rel),
                size: format_size(&fs_path, &config.size_unit),
            })
        })
        .collect();

    Ok(ResolvedEntry {
        gallery_href: format!("{}/", site_href(&gallery_rel)),
        thumbnail,
        downloads,
    })
}

/// Render the HTML block for a resolved entry.
pub fn render_fragment(entry: &GalleryEntry, resolved: &ResolvedEntry, config: &GalleryConfig) -> Markup {
    html! {
        div.scan-entry style="display:flex;gap:1rem;align-items:flex-start;margin:1rem 0;" {
            div.scan-left style="flex:0 0 180px;text-align:center;" {
                a href=(resolved.gallery_href) {
                    @if let Some(src) = &resolved.thumbnail {
                        img.scan-thumb src=(src) alt=(entry.title);
                    } @else {
                        div.scan-thumb.empty-thumb {}
                    }
                }
            }
            div.scan-right style="flex:1;" {
                h3 { (entry.title) }
                div.scan-desc { (PreEscaped(&entry.description)) }
                div.scan-links style="margin-top:0.5em;" {
                    a.view-gallery href=(resolved.gallery_href) {
                        i.bi.bi-search style="color:#00c;" {}
                        " " (config.view_label)
                    }
                    br;
                    @for (idx, download) in resolved.downloads.iter().enumerate() {
                        @if idx > 0 { " " }
                        a class={ "download " (download.kind.extension()) } href=(download.href) {
                            i class=(download.kind.icon()) style="color:#c00;" {}
                            " " (config.download_label) " " (download.kind.label()) " (" (download.size) ")"
                        }
                    }
                }
            }
        }
    }
}

/// The `scan` block directive.
pub struct ScanDirective {
    site_root: PathBuf,
    scans_root: String,
    config: GalleryConfig,
}

impl ScanDirective {
    pub fn new(site_root: &Path, config: &SiteConfig) -> Self {
        Self {
            site_root: site_root.to_path_buf(),
            scans_root: config.scans.root.clone(),
            config: config.gallery.clone(),
        }
    }

    pub fn render(&self, invocation: &Invocation) -> Result<Markup, GalleryError> {
        let entry = GalleryEntry::from_invocation(invocation)?;
        let resolved = resolve(&entry, &self.site_root, &self.scans_root, &self.config)?;
        Ok(render_fragment(&entry, &resolved, &self.config))
    }
}

impl Directive for ScanDirective {
    fn spec(&self) -> DirectiveSpec {
        DirectiveSpec {
            required_arguments: 1,
            optional_arguments: 0,
            final_argument_whitespace: true,
            options: &["path", "desc"],
            has_content: true,
        }
    }

    fn run(&self, invocation: &Invocation) -> Vec<Node> {
        match self.render(invocation) {
            Ok(markup) => vec![Node::raw_html(markup.into_string())],
            Err(e) => {
                tracing::debug!(line = invocation.line, error = %e, "scan directive failed");
                vec![Node::error(e.to_string(), invocation.line)]
            }
        }
    }
}

/// The `scan` inline role: `:scan:`text`` → `<i>text</i>`.
pub struct ScanRole;

impl Role for ScanRole {
    fn run(&self, text: &str, _line: usize) -> Vec<Node> {
        vec![Node::raw_html(html! { i { (text) } }.into_string())]
    }
}

/// Register the `scan` directive and role.
pub fn register(registry: &mut Registry, site_root: &Path, config: &SiteConfig) {
    registry.register_role(NAME, ScanRole);
    registry.register_directive(NAME, ScanDirective::new(site_root, config));
}
