use std::time::Duration;

use reqwest::Client;

use super::error::NotifyError;

const API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "trainwatch";

/// Thin client for the two GitHub endpoints the sink delivers through:
/// issue comments on the review PR and repository dispatch events.
pub struct GitHubClient {
    token: String,
    repo: String,
    client: Client,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: String, repo: String) -> Self {
        Self::with_base_url(token, repo, API_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(token: String, repo: String, base_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self {
            token,
            repo,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Post a comment on the review thread. GitHub answers 201 on
    /// success.
    pub async fn comment(&self, pr_number: u64, body: &str) -> Result<(), NotifyError> {
        let url = format!(
            "{}/repos/{}/issues/{pr_number}/comments",
            self.base_url, self.repo
        );
        let response = self
            .request(self.client.post(&url))
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;
        Self::expect_status(response, 201).await
    }

    /// Fire a `repository_dispatch` event. GitHub answers 204 on success.
    pub async fn dispatch(
        &self,
        event_type: &str,
        client_payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        let url = format!("{}/repos/{}/dispatches", self.base_url, self.repo);
        let response = self
            .request(self.client.post(&url))
            .json(&serde_json::json!({
                "event_type": event_type,
                "client_payload": client_payload,
            }))
            .send()
            .await?;
        Self::expect_status(response, 204).await
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
    }

    async fn expect_status(response: reqwest::Response, expected: u16) -> Result<(), NotifyError> {
        let status = response.status().as_u16();
        if status == expected {
            return Ok(());
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(NotifyError::Api { status, message })
    }
}
