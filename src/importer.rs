//! Channel message import.
//!
//! Turns one channel message into one post plus its media files:
//!
//! ```text
//! 1. connect         open the platform session
//! 2. fetch           the referenced message (absent → NotFound)
//! 3. album           grouped message → scan ids [id-r, id+r], keep siblings, sort by id
//! 4. download        each message's media into a staging dir, one at a time
//! 5. finalize        move (or copy) into images/<basename>, dedupe, keep first-seen order
//! 6. disconnect      always, even when 2-5 failed
//! 7. write post      posts/<timestamp>.<ext>
//! ```
//!
//! Only steps 1-3 are fatal. A media file that can be neither moved nor
//! copied into place is dropped from the post with a warning.

use crate::channel::{ChannelClient, ChannelError, Message};
use crate::config::ImportConfig;
use crate::post::{self, ImportedPost};
use crate::reference::{MessageRef, ReferenceError};
use chrono::{DateTime, FixedOffset};
use std::collections::HashSet;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error("message not found: {0}")]
    NotFound(String),
    #[error("could not connect to the messaging platform: {0}")]
    Connection(String),
    #[error("channel request failed: {0}")]
    Channel(ChannelError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ChannelError> for ImportError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::InvalidChannel(_) | ChannelError::InvalidMessageId(_) => {
                ImportError::NotFound(err.to_string())
            }
            ChannelError::Connection(msg) => ImportError::Connection(msg),
            other => ImportError::Channel(other),
        }
    }
}

/// Where an import writes: resolved once from the site root and config.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteLayout {
    pub root: PathBuf,
    pub posts_dir: PathBuf,
    pub images_dir: PathBuf,
}

impl SiteLayout {
    pub fn new(root: &Path, config: &ImportConfig) -> std::io::Result<Self> {
        let root = std::path::absolute(root)?;
        Ok(Self {
            posts_dir: root.join(&config.posts_dir),
            images_dir: root.join(&config.images_dir),
            root,
        })
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.posts_dir)?;
        fs::create_dir_all(&self.images_dir)?;
        Ok(())
    }
}

/// Text, finalized media, and timestamp of a fetched message.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedMessage {
    pub text: String,
    pub media: Vec<PathBuf>,
    pub date: DateTime<FixedOffset>,
}

/// Result of a complete import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub post_path: PathBuf,
    pub media: Vec<PathBuf>,
}

/// Ids scanned around a grouped message: `radius` on each side, never below 1.
pub fn album_window(id: i64, radius: i64) -> RangeInclusive<i64> {
    id.saturating_sub(radius).max(1)..=id.saturating_add(radius)
}

/// Messages whose media make up the post, in id order.
///
/// A message outside any group stands alone. A grouped message pulls in
/// every message in its window that shares its group id.
pub async fn resolve_album<C: ChannelClient + ?Sized>(
    client: &C,
    channel: &str,
    message: Message,
    radius: i64,
) -> Result<Vec<Message>, ImportError> {
    let Some(group) = message.grouped_id else {
        return Ok(vec![message]);
    };
    let window = album_window(message.id, radius);
    tracing::debug!(group, ?window, "resolving album");
    let mut members: Vec<Message> = client
        .fetch_messages(channel, window)
        .await?
        .into_iter()
        .filter(|m| m.grouped_id == Some(group))
        .collect();
    members.sort_by_key(|m| m.id);
    members.dedup_by_key(|m| m.id);
    tracing::info!(group, members = members.len(), "album resolved");
    Ok(members)
}

/// Move each downloaded file to `images_dir/<basename>`.
///
/// Files already at their canonical path stay put. A failed move falls back
/// to a copy; a failed copy drops the file. The result holds one absolute
/// path per basename, in first-seen order.
pub fn finalize_media(saved: Vec<PathBuf>, images_dir: &Path) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut finals = Vec::new();
    for path in saved {
        let Some(name) = path.file_name() else {
            continue;
        };
        let target = images_dir.join(name);
        let (Ok(source_abs), Ok(target_abs)) =
            (std::path::absolute(&path), std::path::absolute(&target))
        else {
            continue;
        };
        if source_abs != target_abs {
            if let Err(e) = fs::create_dir_all(images_dir) {
                tracing::warn!(error = %e, dir = %images_dir.display(), "cannot create images directory");
                continue;
            }
            if let Err(move_err) = fs::rename(&source_abs, &target_abs) {
                tracing::debug!(error = %move_err, from = %source_abs.display(), "move failed, copying");
                if let Err(copy_err) = fs::copy(&source_abs, &target_abs) {
                    tracing::warn!(error = %copy_err, from = %source_abs.display(), "dropping media file");
                    continue;
                }
            }
        }
        if seen.insert(target_abs.clone()) {
            finals.push(target_abs);
        }
    }
    finals
}

/// Fetch the referenced message and save its media (or its album's media).
///
/// Expects a connected client.
pub async fn fetch_and_save_media<C: ChannelClient + ?Sized>(
    client: &C,
    reference: &MessageRef,
    images_dir: &Path,
    config: &ImportConfig,
) -> Result<FetchedMessage, ImportError> {
    let message = client
        .fetch_message(&reference.channel, reference.id)
        .await?
        .ok_or_else(|| ImportError::NotFound(reference.to_string()))?;

    let text = message.text.clone();
    let date = message.date;
    let members = resolve_album(client, &reference.channel, message, config.album_radius).await?;

    fs::create_dir_all(images_dir)?;
    let staging = tempfile::Builder::new()
        .prefix(".import-")
        .tempdir_in(images_dir)?;

    let mut saved = Vec::new();
    for member in members.iter().filter(|m| m.has_media()) {
        let files = client.download_media(member, staging.path()).await?;
        tracing::debug!(message = member.id, files = files.len(), "downloaded");
        saved.extend(files);
    }

    let media = finalize_media(saved, images_dir);
    Ok(FetchedMessage { text, media, date })
}

/// Run `fetch_and_save_media` inside a session.
///
/// The session is released on every path out of the fetch sequence. A
/// failed release is logged and does not mask the sequence's own result.
pub async fn fetch_in_session<C: ChannelClient + ?Sized>(
    client: &mut C,
    reference: &MessageRef,
    images_dir: &Path,
    config: &ImportConfig,
) -> Result<FetchedMessage, ImportError> {
    client.connect().await?;
    let result = fetch_and_save_media(&*client, reference, images_dir, config).await;
    if let Err(e) = client.disconnect().await {
        tracing::warn!(error = %e, "failed to release session");
    }
    result
}

/// Import one message as a post under `layout`.
pub async fn import_message<C: ChannelClient + ?Sized>(
    client: &mut C,
    reference: &MessageRef,
    layout: &SiteLayout,
    config: &ImportConfig,
) -> Result<ImportOutcome, ImportError> {
    layout.ensure_dirs()?;
    let fetched = fetch_in_session(client, reference, &layout.images_dir, config).await?;
    let post = ImportedPost::new(&fetched.text, fetched.media, fetched.date, config);
    let post_path = post::write_post(&post, &layout.posts_dir, config)?;
    Ok(ImportOutcome {
        post_path,
        media: post.media,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{MediaRef, MockChannelClient};
    use crate::test_helpers::message;
    use mockall::Sequence;
    use mockall::predicate::eq;
    use tempfile::TempDir;

    /// Mock download that writes one file per media entry into the staging dir.
    fn write_media(m: &Message, dir: &Path) -> Result<Vec<PathBuf>, ChannelError> {
        m.media
            .iter()
            .map(|media| {
                let path = dir.join(&media.file_name);
                fs::write(&path, format!("bytes of {}", media.file_name))?;
                Ok(path)
            })
            .collect()
    }

    fn reference(id: i64) -> MessageRef {
        MessageRef {
            channel: "chan".into(),
            id,
        }
    }

    #[test]
    fn window_is_fifty_each_side() {
        assert_eq!(album_window(102, 50), 52..=152);
    }

    #[test]
    fn window_saturates_at_the_id_range_end() {
        assert_eq!(album_window(i64::MAX - 3, 50), i64::MAX - 53..=i64::MAX);
        assert_eq!(album_window(7, i64::MAX), 1..=i64::MAX);
    }

    #[test]
    fn window_never_starts_below_one() {
        assert_eq!(album_window(10, 50), 1..=60);
        assert_eq!(album_window(1, 50), 1..=51);
    }

    #[tokio::test]
    async fn ungrouped_message_stands_alone() {
        let client = MockChannelClient::new();
        let msg = message(7, None, &["a.jpg"]);
        let members = resolve_album(&client, "chan", msg.clone(), 50).await.unwrap();
        assert_eq!(members, vec![msg]);
    }

    #[tokio::test]
    async fn album_members_sorted_by_id() {
        let mut client = MockChannelClient::new();
        client
            .expect_fetch_messages()
            .with(eq("chan"), eq(52..=152))
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    message(105, Some(9), &["c.jpg"]),
                    message(101, None, &["other.jpg"]),
                    message(100, Some(9), &["a.jpg"]),
                    message(103, Some(8), &["foreign.jpg"]),
                    message(102, Some(9), &["b.jpg"]),
                ])
            });

        let target = message(102, Some(9), &["b.jpg"]);
        let members = resolve_album(&client, "chan", target, 50).await.unwrap();
        let ids: Vec<i64> = members.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![100, 102, 105]);
    }

    #[test]
    fn finalize_moves_into_images_dir() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        let staging = tmp.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        let src = staging.join("photo.jpg");
        fs::write(&src, "x").unwrap();

        let finals = finalize_media(vec![src.clone()], &images);

        assert_eq!(finals, vec![images.join("photo.jpg")]);
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(images.join("photo.jpg")).unwrap(), "x");
    }

    #[test]
    fn finalize_keeps_files_already_in_place() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        fs::create_dir_all(&images).unwrap();
        let in_place = images.join("photo.jpg");
        fs::write(&in_place, "x").unwrap();

        let finals = finalize_media(vec![in_place.clone()], &images);

        assert_eq!(finals, vec![in_place.clone()]);
        assert!(in_place.exists());
    }

    #[test]
    fn finalize_dedupes_colliding_basenames() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(a.join("photo.jpg"), "first").unwrap();
        fs::write(b.join("photo.jpg"), "second").unwrap();
        fs::write(b.join("other.jpg"), "other").unwrap();

        let finals = finalize_media(
            vec![a.join("photo.jpg"), b.join("other.jpg"), b.join("photo.jpg")],
            &images,
        );

        assert_eq!(finals, vec![images.join("photo.jpg"), images.join("other.jpg")]);
        // Later file with the same basename overwrites the earlier one.
        assert_eq!(fs::read_to_string(images.join("photo.jpg")).unwrap(), "second");
    }

    #[test]
    fn finalize_drops_files_that_cannot_be_placed() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        let missing = tmp.path().join("gone.jpg");
        let present = tmp.path().join("kept.jpg");
        fs::write(&present, "x").unwrap();

        let finals = finalize_media(vec![missing, present], &images);

        assert_eq!(finals, vec![images.join("kept.jpg")]);
    }

    #[tokio::test]
    async fn fetch_single_message_with_media() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        let mut client = MockChannelClient::new();
        client
            .expect_fetch_message()
            .with(eq("chan"), eq(7))
            .returning(|_, id| Ok(Some(message(id, None, &["one.jpg", "two.jpg"]))));
        client.expect_fetch_messages().never();
        client
            .expect_download_media()
            .times(1)
            .returning(|m, dir| write_media(m, dir));

        let fetched = fetch_and_save_media(&client, &reference(7), &images, &ImportConfig::default())
            .await
            .unwrap();

        assert_eq!(fetched.text, "message 7");
        assert_eq!(fetched.media, vec![images.join("one.jpg"), images.join("two.jpg")]);
        assert!(images.join("one.jpg").exists());
        // Staging directory is removed once the import is done.
        let leftovers: Vec<_> = fs::read_dir(&images)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".import-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn fetch_album_downloads_in_id_order() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        let mut client = MockChannelClient::new();
        client
            .expect_fetch_message()
            .returning(|_, id| Ok(Some(message(id, Some(5), &["b.jpg"]))));
        client.expect_fetch_messages().returning(|_, _| {
            Ok(vec![
                message(105, Some(5), &["c.jpg"]),
                message(104, Some(5), &[]),
                message(100, Some(5), &["a.jpg"]),
                message(102, Some(5), &["b.jpg"]),
            ])
        });
        let mut seq = Sequence::new();
        for id in [100, 102, 105] {
            client
                .expect_download_media()
                .withf(move |m, _| m.id == id)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|m, dir| write_media(m, dir));
        }

        let fetched = fetch_and_save_media(&client, &reference(102), &images, &ImportConfig::default())
            .await
            .unwrap();

        assert_eq!(
            fetched.media,
            vec![images.join("a.jpg"), images.join("b.jpg"), images.join("c.jpg")]
        );
    }

    #[tokio::test]
    async fn missing_message_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let mut client = MockChannelClient::new();
        client.expect_fetch_message().returning(|_, _| Ok(None));

        let err = fetch_and_save_media(&client, &reference(1), tmp.path(), &ImportConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::NotFound(_)));
    }

    #[tokio::test]
    async fn invalid_channel_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let mut client = MockChannelClient::new();
        client
            .expect_fetch_message()
            .returning(|c, _| Err(ChannelError::InvalidChannel(c.to_string())));

        let err = fetch_and_save_media(&client, &reference(1), tmp.path(), &ImportConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::NotFound(_)));
        assert!(err.to_string().contains("chan"));
    }

    #[tokio::test]
    async fn session_released_after_failure() {
        let tmp = TempDir::new().unwrap();
        let mut client = MockChannelClient::new();
        let mut seq = Sequence::new();
        client
            .expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        client
            .expect_fetch_message()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, id| Err(ChannelError::InvalidMessageId(id)));
        client
            .expect_disconnect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let result =
            fetch_in_session(&mut client, &reference(3), tmp.path(), &ImportConfig::default()).await;
        assert!(matches!(result, Err(ImportError::NotFound(_))));
    }

    #[tokio::test]
    async fn session_released_after_download_failure() {
        let tmp = TempDir::new().unwrap();
        let mut client = MockChannelClient::new();
        client.expect_connect().returning(|| Ok(()));
        client
            .expect_fetch_message()
            .returning(|_, id| Ok(Some(message(id, None, &["a.jpg"]))));
        client
            .expect_download_media()
            .returning(|_, _| Err(ChannelError::Unexpected { status: 500, body: "boom".into() }));
        client.expect_disconnect().times(1).returning(|| Ok(()));

        let result =
            fetch_in_session(&mut client, &reference(3), tmp.path(), &ImportConfig::default()).await;
        assert!(matches!(result, Err(ImportError::Channel(_))));
    }

    #[tokio::test]
    async fn disconnect_failure_does_not_mask_result() {
        let tmp = TempDir::new().unwrap();
        let mut client = MockChannelClient::new();
        client.expect_connect().returning(|| Ok(()));
        client
            .expect_fetch_message()
            .returning(|_, id| Ok(Some(message(id, None, &[]))));
        client
            .expect_disconnect()
            .returning(|| Err(ChannelError::NotConnected));

        let fetched =
            fetch_in_session(&mut client, &reference(3), tmp.path(), &ImportConfig::default())
                .await
                .unwrap();
        assert!(fetched.media.is_empty());
    }

    #[tokio::test]
    async fn connection_failure_aborts_before_fetch() {
        let tmp = TempDir::new().unwrap();
        let mut client = MockChannelClient::new();
        client
            .expect_connect()
            .returning(|| Err(ChannelError::Connection("refused".into())));
        client.expect_fetch_message().never();
        client.expect_disconnect().never();

        let result =
            fetch_in_session(&mut client, &reference(3), tmp.path(), &ImportConfig::default()).await;
        assert!(matches!(result, Err(ImportError::Connection(_))));
    }

    #[tokio::test]
    async fn import_writes_post_and_media() {
        let tmp = TempDir::new().unwrap();
        let config = ImportConfig::default();
        let layout = SiteLayout::new(tmp.path(), &config).unwrap();
        let mut client = MockChannelClient::new();
        client.expect_connect().returning(|| Ok(()));
        client.expect_fetch_message().returning(|_, id| {
            let mut m = message(id, None, &["pic.jpg"]);
            m.text = "Sunday walk\nLovely weather.".into();
            m.media.push(MediaRef {
                file_name: "pic2.jpg".into(),
                url: "/media/pic2".into(),
            });
            Ok(Some(m))
        });
        client
            .expect_download_media()
            .returning(|m, dir| write_media(m, dir));
        client.expect_disconnect().returning(|| Ok(()));

        let outcome = import_message(&mut client, &reference(236), &layout, &config)
            .await
            .unwrap();

        assert_eq!(outcome.post_path.parent().unwrap(), layout.posts_dir);
        assert_eq!(
            outcome.media,
            vec![layout.images_dir.join("pic.jpg"), layout.images_dir.join("pic2.jpg")]
        );
        let content = fs::read_to_string(&outcome.post_path).unwrap();
        assert!(content.starts_with(".. title: Sunday walk\n"));
        assert!(content.ends_with(".. thumbnail:: /images/pic.jpg\n.. thumbnail:: /images/pic2.jpg"));
    }

    #[test]
    fn layout_is_absolute() {
        let layout = SiteLayout::new(Path::new("site"), &ImportConfig::default()).unwrap();
        assert!(layout.root.is_absolute());
        assert!(layout.posts_dir.ends_with("site/posts"));
        assert!(layout.images_dir.ends_with("site/images"));
    }
}
