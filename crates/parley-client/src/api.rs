//! Typed client for the daemon's REST API.
//!
//! Thin, stateless wrappers: each method is one request and one typed
//! response. History payloads are normalized into [`Message`] at this
//! boundary so nothing above it deals in wire shapes. The daemon
//! marshals empty lists as JSON null; that is absorbed here too.

use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_shared::history::{
    normalize_direct_history, normalize_group_history, DirectHistoryResponse,
    GroupHistoryResponse,
};
use parley_shared::{Friend, GroupChat, GroupId, Message, PeerId};

use crate::error::{ClientError, Result};

/// Daemon status document returned by `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Lifecycle state string, e.g. `"ready"`.
    #[serde(default)]
    pub state: String,
    /// The daemon's own peer id, once its node is up.
    #[serde(default)]
    pub peer_id: Option<String>,
    #[serde(default)]
    pub listen_addrs: Vec<String>,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// REST client for the daemon.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client for the given API base URL. A trailing slash on
    /// the base is tolerated.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
        }
    }

    /// Daemon lifecycle status, including the local peer id.
    pub async fn status(&self) -> Result<DaemonStatus> {
        let response = self.http.get(self.url("/status")).send().await?;
        Ok(Self::checked(response).await?.json().await?)
    }

    /// Confirmed friends with their live online status.
    pub async fn friends(&self) -> Result<Vec<Friend>> {
        let response = self.http.get(self.url("/profile/friends")).send().await?;
        let friends: Option<Vec<Friend>> = Self::checked(response).await?.json().await?;
        Ok(friends.unwrap_or_default())
    }

    /// Group chats the local identity belongs to.
    pub async fn group_chats(&self) -> Result<Vec<GroupChat>> {
        let response = self.http.get(self.url("/group-chats")).send().await?;
        let groups: Option<Vec<GroupChat>> = Self::checked(response).await?.json().await?;
        Ok(groups.unwrap_or_default())
    }

    /// Full message history of the 1:1 conversation with `peer_id`,
    /// normalized into domain messages.
    pub async fn direct_history(&self, local_id: &PeerId, peer_id: &PeerId) -> Result<Vec<Message>> {
        let response = self
            .http
            .post(self.url("/chat/messages"))
            .json(&serde_json::json!({ "peer_id": peer_id.as_str() }))
            .send()
            .await?;
        let payload: DirectHistoryResponse = Self::checked(response).await?.json().await?;
        let messages = normalize_direct_history(local_id, peer_id, payload);
        debug!(peer = %peer_id, count = messages.len(), "Fetched direct history");
        Ok(messages)
    }

    /// Full message history of the group `group_id`.
    pub async fn group_history(&self, local_id: &PeerId, group_id: &GroupId) -> Result<Vec<Message>> {
        let response = self
            .http
            .post(self.url("/group-chat/messages"))
            .json(&serde_json::json!({ "group_id": group_id.as_str() }))
            .send()
            .await?;
        let payload: GroupHistoryResponse = Self::checked(response).await?.json().await?;
        let messages = normalize_group_history(local_id, group_id, payload);
        debug!(group = %group_id, count = messages.len(), "Fetched group history");
        Ok(messages)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ClientError::Daemon {
                status: response.status().as_u16(),
            })
        }
    }
}
