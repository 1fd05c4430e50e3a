use anyhow::{Context, Result, bail};

use nosh_core::state::NutritionState;
use nosh_core::sync::{Envelope, NutritionApi, SyncPush};

use nosh_core::models::FeedPost;

/// Client for the remote nutrition server (`nosh serve`).
///
/// Non-2xx statuses and transport errors surface as `Err`, which the sync
/// engine records as a recoverable failure; nothing here panics.
pub struct RemoteClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    rt: tokio::runtime::Handle,
}

impl RemoteClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!("nosh-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            rt: tokio::runtime::Handle::current(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let mut req = self.client.request(method, url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn unwrap_envelope<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T> {
        let status = resp.status();
        let envelope: Envelope<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse server response (status {status})"))?;
        if !envelope.success {
            bail!(
                "Server error: {}",
                envelope.error.unwrap_or_else(|| status.to_string())
            );
        }
        envelope.data.context("Server response missing data")
    }

    pub async fn fetch_async(&self) -> Result<Option<NutritionState>> {
        let resp = self
            .request(reqwest::Method::GET, "/api/nutrition")
            .send()
            .await
            .context("Failed to reach nutrition server")?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::unwrap_envelope(resp).await?))
    }

    pub async fn push_async(&self, push: &SyncPush) -> Result<()> {
        let resp = self
            .request(reqwest::Method::PUT, "/api/nutrition")
            .json(push)
            .send()
            .await
            .context("Failed to reach nutrition server")?;
        let _: serde_json::Value = Self::unwrap_envelope(resp).await?;
        Ok(())
    }

    // --- Feed ---

    pub async fn feed_list(&self) -> Result<Vec<FeedPost>> {
        let resp = self
            .request(reqwest::Method::GET, "/api/feed")
            .send()
            .await
            .context("Failed to reach nutrition server")?;
        Self::unwrap_envelope(resp).await
    }

    pub async fn feed_post(&self, author: &str, body: &str) -> Result<FeedPost> {
        let resp = self
            .request(reqwest::Method::POST, "/api/feed")
            .json(&serde_json::json!({ "author": author, "body": body }))
            .send()
            .await
            .context("Failed to reach nutrition server")?;
        Self::unwrap_envelope(resp).await
    }

    pub async fn feed_like(&self, post_id: &str, author: &str) -> Result<bool> {
        let resp = self
            .request(reqwest::Method::POST, &format!("/api/feed/{post_id}/like"))
            .json(&serde_json::json!({ "author": author }))
            .send()
            .await
            .context("Failed to reach nutrition server")?;
        let value: serde_json::Value = Self::unwrap_envelope(resp).await?;
        Ok(value["liked"].as_bool().unwrap_or(false))
    }

    pub async fn feed_comment(&self, post_id: &str, author: &str, body: &str) -> Result<()> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/api/feed/{post_id}/comments"),
            )
            .json(&serde_json::json!({ "author": author, "body": body }))
            .send()
            .await
            .context("Failed to reach nutrition server")?;
        let _: serde_json::Value = Self::unwrap_envelope(resp).await?;
        Ok(())
    }
}

impl NutritionApi for RemoteClient {
    fn fetch(&self) -> Result<Option<NutritionState>> {
        self.rt.block_on(self.fetch_async())
    }

    fn push(&self, push: &SyncPush) -> Result<()> {
        self.rt.block_on(self.push_async(push))
    }
}
