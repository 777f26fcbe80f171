//! Messaging-platform collaborator.
//!
//! The importer never talks to the network directly; it goes through the
//! [`ChannelClient`] trait. One client is one logical session: it is
//! connected once, used for a handful of sequential calls, and disconnected.
//! [`http::HttpChannelClient`] is the real implementation; tests use the
//! generated `MockChannelClient`.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer};
use std::io::{BufRead, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

pub use http::HttpChannelClient;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("invalid channel: {0}")]
    InvalidChannel(String),
    #[error("invalid message id: {0}")]
    InvalidMessageId(i64),
    #[error("session is not connected")]
    NotConnected,
    #[error("unexpected gateway response ({status}): {body}")]
    Unexpected { status: u16, body: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One attached media file of a message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaRef {
    pub file_name: String,
    pub url: String,
}

/// A channel message as returned by the platform.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date: DateTime<FixedOffset>,
    #[serde(default, rename = "message")]
    pub text: String,
    #[serde(default)]
    pub grouped_id: Option<i64>,
    #[serde(default)]
    pub media: Vec<MediaRef>,
}

impl Message {
    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }
}

/// Parse a message timestamp.
///
/// Offset-carrying timestamps keep their own offset. A naive timestamp is
/// interpreted in the local timezone.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| format!("unrecognised timestamp: {raw}"))?;
    localize(naive).ok_or_else(|| format!("timestamp does not exist in local time: {raw}"))
}

/// Attach the local UTC offset to a naive timestamp.
///
/// Ambiguous local times (DST fold) resolve to the earlier instant;
/// nonexistent ones (DST gap) yield `None`.
pub fn localize(naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Access to one channel session on the messaging platform.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Open the session. Must succeed before any other call.
    async fn connect(&mut self) -> Result<(), ChannelError>;

    /// Release the session.
    async fn disconnect(&mut self) -> Result<(), ChannelError>;

    /// Fetch a single message; `Ok(None)` when the id holds no message.
    async fn fetch_message(&self, channel: &str, id: i64) -> Result<Option<Message>, ChannelError>;

    /// Fetch every existing message whose id falls in `ids`, in any order.
    async fn fetch_messages(
        &self,
        channel: &str,
        ids: RangeInclusive<i64>,
    ) -> Result<Vec<Message>, ChannelError>;

    /// Download all media of `message` into `dir`, returning the written paths.
    async fn download_media(
        &self,
        message: &Message,
        dir: &Path,
    ) -> Result<Vec<PathBuf>, ChannelError>;
}

// =============================================================================
// Credentials
// =============================================================================

pub const API_ID_VAR: &str = "TG_API_ID";
pub const API_HASH_VAR: &str = "TG_API_HASH";

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("api id must be an integer, got {0:?}")]
    InvalidApiId(String),
    #[error("api credentials must not be empty")]
    Empty,
    #[error("IO error while prompting: {0}")]
    Io(#[from] std::io::Error),
}

/// Platform API credentials.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub api_id: i64,
    pub api_hash: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(api_id: &str, api_hash: &str) -> Result<Self, CredentialsError> {
        let api_id = api_id.trim();
        let api_hash = api_hash.trim();
        if api_id.is_empty() || api_hash.is_empty() {
            return Err(CredentialsError::Empty);
        }
        let parsed = api_id
            .parse::<i64>()
            .map_err(|_| CredentialsError::InvalidApiId(api_id.to_string()))?;
        Ok(Self {
            api_id: parsed,
            api_hash: api_hash.to_string(),
        })
    }

    /// Resolve credentials: explicit values first, then the environment,
    /// then an interactive prompt on `input`/`output`.
    ///
    /// A pair is only taken from a source if both halves are present there.
    pub fn resolve<R: BufRead, W: Write>(
        explicit: (Option<String>, Option<String>),
        env: impl Fn(&str) -> Option<String>,
        input: &mut R,
        output: &mut W,
    ) -> Result<Self, CredentialsError> {
        if let (Some(id), Some(hash)) = explicit {
            return Self::new(&id, &hash);
        }
        let non_empty = |name: &str| env(name).filter(|v| !v.trim().is_empty());
        if let (Some(id), Some(hash)) = (non_empty(API_ID_VAR), non_empty(API_HASH_VAR)) {
            tracing::debug!("using api credentials from environment");
            return Self::new(&id, &hash);
        }
        writeln!(
            output,
            "Enter API credentials (they can be stored in {API_ID_VAR} and {API_HASH_VAR}):"
        )?;
        let id = prompt(input, output, "api_id: ")?;
        let hash = prompt(input, output, "api_hash: ")?;
        Self::new(&id, &hash)
    }
}

fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
) -> Result<String, CredentialsError> {
    write!(output, "{label}")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}
