//! JSON-over-HTTP message gateway client.
//!
//! The gateway fronts the platform's user API and exposes sessions,
//! messages, and media as plain HTTP resources:
//!
//! ```text
//! POST   {base}/sessions                              open a session → {"token"}
//! DELETE {base}/sessions/{token}                      release it
//! GET    {base}/channels/{channel}/messages/{id}      one message, 404 if absent
//! GET    {base}/channels/{channel}/messages?from&to   existing messages in range
//! GET    {media.url}                                  raw media bytes
//! ```
//!
//! Lookup failures come back as `{"error": "CHANNEL_INVALID"}` or
//! `{"error": "MESSAGE_ID_INVALID"}` and are mapped to the matching
//! [`ChannelError`] variants.

use super::{ChannelClient, ChannelError, Credentials, Message};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct SessionRequest<'a> {
    api_id: i64,
    api_hash: &'a str,
    session: &'a str,
}

#[derive(Deserialize)]
struct SessionResponse {
    token: String,
}

#[derive(Deserialize)]
struct GatewayError {
    error: String,
}

pub struct HttpChannelClient {
    http: Client,
    base: String,
    credentials: Credentials,
    session_name: String,
    token: Option<String>,
}

impl HttpChannelClient {
    pub fn new(base: &str, credentials: Credentials, session_name: &str) -> Self {
        Self {
            http: Client::new(),
            base: base.trim_end_matches('/').to_string(),
            credentials,
            session_name: session_name.to_string(),
            token: None,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// Media URLs may be absolute or relative to the gateway base.
    fn media_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.url(url)
        }
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ChannelError> {
        let token = self.token.as_deref().ok_or(ChannelError::NotConnected)?;
        Ok(request.bearer_auth(token))
    }

    /// Turn an error response into a lookup error where the gateway names one.
    async fn lookup_error(channel: &str, id: i64, response: Response) -> ChannelError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<GatewayError>(&body) {
            Ok(e) if e.error == "CHANNEL_INVALID" => ChannelError::InvalidChannel(channel.to_string()),
            Ok(e) if e.error == "MESSAGE_ID_INVALID" => ChannelError::InvalidMessageId(id),
            _ => ChannelError::Unexpected { status, body },
        }
    }
}

/// Keep only the final path component of a gateway-supplied file name.
fn safe_file_name(name: &str) -> Option<&str> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
}

#[async_trait]
impl ChannelClient for HttpChannelClient {
    async fn connect(&mut self) -> Result<(), ChannelError> {
        let body = SessionRequest {
            api_id: self.credentials.api_id,
            api_hash: &self.credentials.api_hash,
            session: &self.session_name,
        };
        let response = self
            .http
            .post(self.url("sessions"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ChannelError::Connection(format!("{status}: {text}")));
        }
        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;
        tracing::debug!(base = %self.base, session = %self.session_name, "session opened");
        self.token = Some(session.token);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        let Some(token) = self.token.take() else {
            return Ok(());
        };
        let response = self
            .http
            .delete(self.url(&format!("sessions/{token}")))
            .bearer_auth(&token)
            .send()
            .await?;
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(ChannelError::Unexpected {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        tracing::debug!("session released");
        Ok(())
    }

    async fn fetch_message(&self, channel: &str, id: i64) -> Result<Option<Message>, ChannelError> {
        let url = self.url(&format!("channels/{channel}/messages/{id}"));
        let response = self.authorized(self.http.get(url))?.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(response.json().await?)),
            _ => Err(Self::lookup_error(channel, id, response).await),
        }
    }

    async fn fetch_messages(
        &self,
        channel: &str,
        ids: RangeInclusive<i64>,
    ) -> Result<Vec<Message>, ChannelError> {
        let url = self.url(&format!("channels/{channel}/messages"));
        let (from, to) = (*ids.start(), *ids.end());
        let response = self
            .authorized(self.http.get(url))?
            .query(&[("from", from), ("to", to)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::lookup_error(channel, from, response).await);
        }
        Ok(response.json().await?)
    }

    async fn download_media(
        &self,
        message: &Message,
        dir: &Path,
    ) -> Result<Vec<PathBuf>, ChannelError> {
        let mut saved = Vec::new();
        for media in &message.media {
            let Some(name) = safe_file_name(&media.file_name) else {
                tracing::warn!(message = message.id, file = %media.file_name, "skipping media with unusable file name");
                continue;
            };
            let response = self
                .authorized(self.http.get(self.media_url(&media.url)))?
                .send()
                .await?
                .error_for_status()?;
            let bytes = response.bytes().await?;
            let path = dir.join(name);
            tokio::fs::write(&path, &bytes).await?;
            tracing::debug!(message = message.id, path = %path.display(), bytes = bytes.len(), "media downloaded");
            saved.push(path);
        }
        Ok(saved)
    }
}
