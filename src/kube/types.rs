//! Wire types for the Kubernetes `batch/v1` and `core/v1` endpoints the
//! watcher talks to.
//!
//! Only the fields the watcher reads are modeled; everything else in the
//! API objects is ignored during deserialization. All structs derive
//! `Deserialize` with `#[serde(default)]` because the API server omits
//! empty fields rather than sending nulls.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `batch/v1` Job object as returned by the API server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobObject {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Option<JobSpec>,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// Standard object metadata. Labels carry the review reference
/// (`pr-number`) and annotations carry the delivery markers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resource_version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(default)]
    pub template: PodTemplateSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodTemplateSpec {
    #[serde(default)]
    pub spec: PodSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// The `status` block of a Job. Counters are absent (not zero) until the
/// controller first touches them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default)]
    pub active: Option<u32>,
    #[serde(default)]
    pub succeeded: Option<u32>,
    #[serde(default)]
    pub failed: Option<u32>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conditions: Vec<JobCondition>,
}

/// One entry of `status.conditions`. `type` is `Complete` or `Failed`,
/// `status` is the string `"True"`, `"False"` or `"Unknown"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobCondition {
    #[serde(rename = "type", default)]
    pub condition_type: String,
    #[serde(default)]
    pub status: String,
}

/// Response body of a Job list request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub items: Vec<JobObject>,
}

/// One line of a `watch=true` response stream.
///
/// The payload is kept as a raw value because its shape depends on the
/// event kind: a Job object for ADDED/MODIFIED/DELETED, a partial object
/// carrying only `metadata.resourceVersion` for BOOKMARK, and a `Status`
/// object for ERROR.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub kind: WatchEventKind,
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchEventKind {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
}

impl WatchEvent {
    /// Deserialize the payload as a Job object (ADDED/MODIFIED/DELETED).
    pub fn job(&self) -> Option<JobObject> {
        serde_json::from_value(self.object.clone()).ok()
    }

    /// Pull `metadata.resourceVersion` out of the payload without a full
    /// deserialization (works for BOOKMARK events too).
    pub fn resource_version(&self) -> Option<String> {
        self.object
            .pointer("/metadata/resourceVersion")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

/// A `core/v1` Pod list, used to find the pods a Job spawned.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodList {
    #[serde(default)]
    pub items: Vec<Pod>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
}
