use thiserror::Error;

/// Errors from the Kubernetes API client.
#[derive(Debug, Error)]
pub enum KubeError {
    /// The API returned a non-success status other than 404.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure (DNS, connection refused, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A response body or watch line did not parse as the expected type.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Cluster access could not be configured at all (missing service
    /// account files, no server address). Fatal at startup.
    #[error("cluster configuration error: {0}")]
    Config(String),
}

impl KubeError {
    /// Whether the watch loop should retry after this error. Network
    /// failures and server-side errors are retryable; configuration and
    /// client-side API errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            KubeError::Network(_) => true,
            KubeError::Api { status, .. } => *status >= 500 || *status == 429,
            KubeError::Decode(_) => false,
            KubeError::Config(_) => false,
        }
    }
}
