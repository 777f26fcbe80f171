//! Message reference parsing.
//!
//! A message is addressed by its public link, `https://t.me/<channel>/<id>`.
//! Parsing is a prefix match: anything after the numeric id (a `?single`
//! query, a trailing slash) is ignored, the same way the link is resolved
//! by the platform itself.
//!
//! - `https://t.me/BORDER_NOT_PI/236` → channel `BORDER_NOT_PI`, id `236`
//! - `http://t.me/somechannel/7?single` → channel `somechannel`, id `7`
//! - `https://t.me/somechannel` → error (no id)
//! - `https://t.me/chan#x/5` → error (a channel never holds `?` or `#`)

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://t\.me/([^/?#]+)/(\d+)").expect("reference pattern must compile")
});

#[derive(Error, Debug, PartialEq)]
pub enum ReferenceError {
    #[error("invalid message reference: {0}")]
    Invalid(String),
}

/// A parsed `(channel, message id)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub channel: String,
    pub id: i64,
}

impl MessageRef {
    pub fn parse(url: &str) -> Result<Self, ReferenceError> {
        let invalid = || ReferenceError::Invalid(url.to_string());
        let caps = REFERENCE_RE.captures(url).ok_or_else(invalid)?;
        let channel = caps[1].to_string();
        // Digits only, but may still overflow.
        let id = caps[2].parse::<i64>().map_err(|_| invalid())?;
        Ok(Self { channel, id })
    }
}

impl std::str::FromStr for MessageRef {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://t.me/{}/{}", self.channel, self.id)
    }
}
