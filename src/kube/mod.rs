//! Job store access: the watcher's view of the Kubernetes API.
//!
//! [`JobStore`] and [`EventFeed`] are the seams the watcher is generic
//! over; production uses [`JobsApi`], tests substitute in-memory mocks.

pub mod client;
pub mod error;
pub mod types;

pub use client::JobsApi;
pub use error::KubeError;

use crate::lifecycle::TransitionKind;
use types::{JobObject, WatchEvent};

/// Read/list/patch access to the Job objects of one namespace.
#[allow(async_fn_in_trait)]
pub trait JobStore {
    type Feed: EventFeed;

    /// Fetch the current authoritative state of a job. `Ok(None)` when the
    /// object does not exist.
    async fn fetch(&self, name: &str) -> Result<Option<JobObject>, KubeError>;

    /// List every job in the namespace.
    async fn list(&self) -> Result<Vec<JobObject>, KubeError>;

    /// Persist a delivery marker as an annotation on the job, touching
    /// nothing else (merge-patch semantics).
    async fn set_marker(&self, name: &str, kind: TransitionKind) -> Result<(), KubeError>;

    /// Open a watch subscription over the namespace, optionally narrowed
    /// to a single job and resumed from a known resource version.
    async fn subscribe(
        &self,
        job: Option<&str>,
        resume: Option<&str>,
    ) -> Result<Self::Feed, KubeError>;
}

/// An open watch subscription: a lazy, ordered sequence of change events.
#[allow(async_fn_in_trait)]
pub trait EventFeed {
    /// The next event, `Ok(None)` when the server closed the stream.
    async fn next_event(&mut self) -> Result<Option<WatchEvent>, KubeError>;
}
