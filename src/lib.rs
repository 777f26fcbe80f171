//! # Site Tools
//!
//! Automation for a personal static site built by an external generator.
//! Three independent utilities share one binary and one `site.toml`:
//!
//! ```text
//! 1. Import   t.me/<channel>/<id>  →  posts/<timestamp>.rst + images/*
//! 2. Copy     scans/**/*.{pdf,djvu} →  output/scans/**       (on `initialized`)
//! 3. Gallery  .. scan:: directive   →  raw HTML gallery entry (during rendering)
//! ```
//!
//! Nothing flows between them: each is triggered by its own event (a CLI
//! invocation, a generator lifecycle signal, a markup occurrence) and leaves
//! only filesystem artifacts behind.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `site.toml` loading: stock defaults, sparse overlay, legacy keys, validation |
//! | [`reference`] | Message URL parsing (`https://t.me/<channel>/<id>`) |
//! | [`channel`] | Messaging-platform client trait, message model, credentials, HTTP gateway client |
//! | [`importer`] | Album resolution, media download and deduplication, scoped session run |
//! | [`post`] | Post title, header timestamp, file name, and document composition |
//! | [`signals`] | Generator lifecycle signals with explicit connect/emit |
//! | [`copier`] | Scan document discovery and mtime-based mirroring into the output tree |
//! | [`markup`] | Directive/role registry and reST document expansion |
//! | [`gallery`] | The `scan` directive and role |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit Site Layout
//!
//! The site root comes from the command line once and is turned into a
//! [`importer::SiteLayout`] (or a [`signals::SiteContext`]) that every
//! downstream call receives. Nothing reads a global root.
//!
//! ## Scoped Network Session
//!
//! The importer talks to the platform through [`channel::ChannelClient`].
//! [`importer::import_message`] connects, runs the whole fetch sequence and
//! disconnects on every exit path, so a failed lookup never leaks a session.
//! Tests swap in a `mockall` mock of the same trait.
//!
//! ## Explicit Registration
//!
//! Plugins hook the host through calls made once at setup:
//! [`copier::ScanCopier::connect`] subscribes to [`signals::Signal::Initialized`],
//! and [`gallery::register`] adds the `scan` directive and role to a
//! [`markup::Registry`]. Loading a module never registers anything.
//!
//! ## Maud For Fragments
//!
//! Gallery HTML is built with [Maud](https://maud.lambda.xyz/): titles and
//! labels are escaped by default, and the description is the one deliberate
//! raw insertion.

pub mod channel;
pub mod config;
pub mod copier;
pub mod gallery;
pub mod importer;
pub mod markup;
pub mod output;
pub mod post;
pub mod reference;
pub mod signals;

#[cfg(test)]
pub(crate) mod test_helpers;
