//! Read model
//!
//! The server side of unread tracking as seen by the client:
//! - [`ReadModel`] trait, the seam the store and navigator talk through
//! - [`HttpReadModel`], the reqwest implementation of the HTTP contract

use crate::error::UnreadError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use wave_model::{
    BlipId, ClientConfig, MarkManyRequest, UnreadCountsResponse, UnreadResponse, WaveId,
    WaveUnreadCount,
};

/// Most waves one `unread_counts` call may ask about
pub const MAX_COUNT_WAVES: usize = 200;

const USER_AGENT_VALUE: &str = concat!("greenwave/", env!("CARGO_PKG_VERSION"));

/// Per-user read state held by the server
#[async_trait]
pub trait ReadModel: Send + Sync {
    /// Unread ids in traversal order with totals
    async fn fetch_unread(&self, wave_id: &WaveId) -> Result<UnreadResponse, UnreadError>;

    /// Mark one blip read
    async fn mark_read(&self, wave_id: &WaveId, blip_id: &BlipId) -> Result<(), UnreadError>;

    /// Mark several blips read in one request
    async fn mark_many_read(&self, wave_id: &WaveId, blip_ids: &[BlipId]) -> Result<(), UnreadError>;

    /// Counts for several waves, in request order
    ///
    /// Implementations answer for at most [`MAX_COUNT_WAVES`] distinct waves.
    async fn unread_counts(&self, wave_ids: &[WaveId]) -> Result<Vec<WaveUnreadCount>, UnreadError>;
}

/// Distinct ids in first-seen order, capped at [`MAX_COUNT_WAVES`]
#[must_use]
pub fn count_request_ids(wave_ids: &[WaveId]) -> Vec<WaveId> {
    let mut seen = HashSet::new();
    wave_ids
        .iter()
        .filter(|id| !id.as_str().trim().is_empty() && seen.insert(id.as_str()))
        .take(MAX_COUNT_WAVES)
        .cloned()
        .collect()
}

/// [`ReadModel`] over the wave HTTP API
#[derive(Debug, Clone)]
pub struct HttpReadModel {
    client: reqwest::Client,
    base: Url,
}

impl HttpReadModel {
    /// Create a client for `base_url` with default settings
    ///
    /// # Errors
    /// - `UnreadError::InvalidUrl` if the URL cannot carry API paths
    /// - `UnreadError::Transport` if the HTTP client cannot be built
    pub fn new(base_url: &str) -> Result<Self, UnreadError> {
        Self::from_config(&ClientConfig::new().with_base_url(base_url))
    }

    /// Create a client from configuration
    ///
    /// # Errors
    /// Same as [`HttpReadModel::new`].
    pub fn from_config(config: &ClientConfig) -> Result<Self, UnreadError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| UnreadError::Transport(format!("failed to create HTTP client: {e}")))?;
        Self::with_client(client, &config.base_url)
    }

    /// Use a preconfigured reqwest client
    ///
    /// # Errors
    /// `UnreadError::InvalidUrl` if the URL does not parse or cannot be a base.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, UnreadError> {
        let base = Url::parse(base_url).map_err(|e| UnreadError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(UnreadError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { client, base })
    }

    /// Base URL requests are resolved against
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, UnreadError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| UnreadError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, UnreadError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(UnreadError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, UnreadError> {
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| UnreadError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ReadModel for HttpReadModel {
    async fn fetch_unread(&self, wave_id: &WaveId) -> Result<UnreadResponse, UnreadError> {
        let url = self.endpoint(&["api", "waves", wave_id.as_str(), "unread"])?;
        tracing::debug!("Fetching unread state from {}", url);
        let response = self.client.get(url).send().await?;
        Self::json(response).await
    }

    async fn mark_read(&self, wave_id: &WaveId, blip_id: &BlipId) -> Result<(), UnreadError> {
        let url = self.endpoint(&["api", "waves", wave_id.as_str(), "blips", blip_id.as_str(), "read"])?;
        tracing::debug!("Marking {} read", blip_id);
        let response = self.client.post(url).send().await?;
        Self::check(response).await.map(drop)
    }

    async fn mark_many_read(&self, wave_id: &WaveId, blip_ids: &[BlipId]) -> Result<(), UnreadError> {
        let url = self.endpoint(&["api", "waves", wave_id.as_str(), "read"])?;
        tracing::debug!("Marking {} blips read in {}", blip_ids.len(), wave_id);
        let body = MarkManyRequest {
            blip_ids: blip_ids.to_vec(),
        };
        let response = self.client.post(url).json(&body).send().await?;
        Self::check(response).await.map(drop)
    }

    async fn unread_counts(&self, wave_ids: &[WaveId]) -> Result<Vec<WaveUnreadCount>, UnreadError> {
        let ids = count_request_ids(wave_ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids.iter().map(WaveId::as_str).collect::<Vec<_>>().join(",");
        let mut url = self.endpoint(&["api", "waves", "unread_counts"])?;
        url.query_pairs_mut().append_pair("ids", &joined);

        tracing::debug!("Fetching unread counts for {} waves", ids.len());
        let response = self.client.get(url).send().await?;
        let body: UnreadCountsResponse = Self::json(response).await?;
        Ok(body.counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_escape_ids() {
        let model = HttpReadModel::new("http://localhost:8000/").unwrap();
        let url = model.endpoint(&["api", "waves", "w 1/x", "unread"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/waves/w%201%2Fx/unread");
    }

    #[test]
    fn endpoints_keep_base_path() {
        let model = HttpReadModel::new("http://host/prefix").unwrap();
        let url = model.endpoint(&["api", "waves", "w1", "read"]).unwrap();
        assert_eq!(url.as_str(), "http://host/prefix/api/waves/w1/read");
    }

    #[test]
    fn rejects_unusable_base() {
        assert!(matches!(HttpReadModel::new("not a url"), Err(UnreadError::InvalidUrl(_))));
        assert!(matches!(HttpReadModel::new("mailto:a@b"), Err(UnreadError::InvalidUrl(_))));
    }

    #[test]
    fn count_ids_are_deduplicated_and_capped() {
        let mut ids: Vec<WaveId> = (0..250).map(|i| WaveId::from(format!("w{i}"))).collect();
        ids.insert(1, "w0".into());
        ids.insert(2, " ".into());
        let picked = count_request_ids(&ids);
        assert_eq!(picked.len(), MAX_COUNT_WAVES);
        assert_eq!(picked[0].as_str(), "w0");
        assert_eq!(picked[1].as_str(), "w1");
    }
}
