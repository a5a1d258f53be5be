use thiserror::Error;

/// Errors from notification delivery (GitHub or MLflow endpoints).
///
/// A failed delivery is never retried here; the watcher leaves the
/// delivery marker unset and the transition is re-attempted on the next
/// observation of the job.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The endpoint answered with an unexpected status code.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure (DNS, connection refused, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}
