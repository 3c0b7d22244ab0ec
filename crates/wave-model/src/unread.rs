//! Per-user unread snapshot and HTTP wire types
//!
//! The snapshot keeps unread ids in server order inside an [`IndexSet`], so
//! the "no duplicates" invariant holds by construction and removal keeps the
//! traversal order of the remaining ids.

use crate::ids::{BlipId, WaveId};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Unread state of one wave for one user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadSnapshot {
    /// Unread ids in traversal order
    pub unread_ids: IndexSet<BlipId>,
    /// Total live blips in the wave
    pub total: u64,
    /// Blips the user has read
    pub read_count: u64,
}

impl UnreadSnapshot {
    /// Create snapshot from ids, dropping duplicates after the first
    #[must_use]
    pub fn new<I>(ids: I, total: u64, read_count: u64) -> Self
    where
        I: IntoIterator,
        I::Item: Into<BlipId>,
    {
        Self {
            unread_ids: ids.into_iter().map(Into::into).collect(),
            total,
            read_count,
        }
    }

    /// Number of unread blips
    #[inline]
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.unread_ids.len()
    }

    /// Whether a blip is unread
    #[inline]
    #[must_use]
    pub fn is_unread(&self, id: &BlipId) -> bool {
        self.unread_ids.contains(id)
    }

    /// First unread blip in traversal order
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&BlipId> {
        self.unread_ids.first()
    }

    /// Whether `read_count + unread == total`
    #[inline]
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.read_count + self.unread_ids.len() as u64 == self.total
    }

    /// Remove one id, keeping the order of the rest
    pub fn remove(&mut self, id: &BlipId) -> bool {
        self.unread_ids.shift_remove(id)
    }
}

impl From<UnreadResponse> for UnreadSnapshot {
    fn from(resp: UnreadResponse) -> Self {
        Self::new(resp.unread, resp.total, resp.read)
    }
}

/// Body of `GET /api/waves/:waveId/unread`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnreadResponse {
    /// Unread blip ids in traversal order
    #[serde(default)]
    pub unread: Vec<BlipId>,
    /// Total live blips
    #[serde(default)]
    pub total: u64,
    /// Read blips
    #[serde(default)]
    pub read: u64,
}

/// Body of `POST /api/waves/:waveId/read`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkManyRequest {
    /// Blips to mark read
    pub blip_ids: Vec<BlipId>,
}

/// One entry of `GET /api/waves/unread_counts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveUnreadCount {
    /// Wave the counts belong to
    pub wave_id: WaveId,
    /// Total live blips
    pub total: u64,
    /// Unread blips
    pub unread: u64,
    /// Read blips
    pub read: u64,
}

/// Body of `GET /api/waves/unread_counts`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnreadCountsResponse {
    /// Counts in request order
    #[serde(default)]
    pub counts: Vec<WaveUnreadCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_from_response_drops_duplicates() {
        let resp: UnreadResponse =
            serde_json::from_str(r#"{"unread":["b1","b2","b1"],"total":2,"read":0}"#).unwrap();
        let snap = UnreadSnapshot::from(resp);
        let ids: Vec<&str> = snap.unread_ids.iter().map(BlipId::as_str).collect();
        assert_eq!(ids, vec!["b1", "b2"]);
        assert!(snap.is_balanced());
    }

    #[test]
    fn remove_keeps_order() {
        let mut snap = UnreadSnapshot::new(["a", "b", "c"], 3, 0);
        assert!(snap.remove(&"b".into()));
        assert!(!snap.remove(&"b".into()));
        let ids: Vec<&str> = snap.unread_ids.iter().map(BlipId::as_str).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(snap.first().map(BlipId::as_str), Some("a"));
    }

    #[test]
    fn missing_fields_default() {
        let resp: UnreadResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.unread.is_empty());
        assert_eq!(resp.total, 0);
    }

    #[test]
    fn mark_many_request_uses_camel_case() {
        let body = MarkManyRequest {
            blip_ids: vec!["b1".into()],
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"blipIds":["b1"]}"#);
    }

    #[test]
    fn counts_response_decodes() {
        let resp: UnreadCountsResponse = serde_json::from_str(
            r#"{"counts":[{"waveId":"w1","total":3,"unread":1,"read":2}]}"#,
        )
        .unwrap();
        assert_eq!(resp.counts[0].wave_id.as_str(), "w1");
        assert_eq!(resp.counts[0].unread, 1);
    }
}
