//! Notification delivery: PR comments, repository dispatch events and
//! MLflow run resolution.
//!
//! [`NotificationSink`] is the seam the watcher is generic over;
//! production uses [`GitHubSink`].

pub mod error;
pub mod github;
pub mod message;
pub mod mlflow;
pub mod sink;

pub use error::NotifyError;
pub use github::GitHubClient;
pub use mlflow::MlflowClient;
pub use sink::GitHubSink;

use crate::lifecycle::{JobDescriptor, TransitionKind};

/// Delivers one notification per invocation. No internal retries and no
/// internal state; at-least-once semantics come from the watcher
/// re-attempting transitions whose marker is still unset.
#[allow(async_fn_in_trait)]
pub trait NotificationSink {
    async fn notify(&self, kind: TransitionKind, job: &JobDescriptor) -> Result<(), NotifyError>;
}
