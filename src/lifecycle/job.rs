use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::kube::types::JobObject;

/// Label carrying the pull-request number a job reports to.
pub const PR_NUMBER_LABEL: &str = "pr-number";

/// Label naming the MLflow experiment a job logs under. Optional; the
/// sink falls back to the configured default experiment.
pub const EXPERIMENT_LABEL: &str = "experiment-name";

/// Domain view of a training job, extracted from the raw Job object.
///
/// This is what the notification sink renders from: identity, the review
/// reference, the training configuration, and the mirrored lifecycle
/// counters. Hyperparameters stay free-form strings; nothing downstream
/// of the dispatcher interprets them here.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    pub name: String,
    pub namespace: String,
    pub pr_number: Option<u64>,
    pub experiment: Option<String>,
    pub image: Option<String>,
    pub command: Vec<String>,
    pub hyperparameters: IndexMap<String, String>,
    pub active: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobDescriptor {
    /// Build a descriptor from a Job object fetched from the store.
    pub fn from_object(job: &JobObject) -> Self {
        let meta = &job.metadata;
        let pr_number = meta
            .labels
            .get(PR_NUMBER_LABEL)
            .and_then(|v| v.parse::<u64>().ok());
        let experiment = meta.labels.get(EXPERIMENT_LABEL).cloned();

        let container = job
            .spec
            .as_ref()
            .and_then(|spec| spec.template.spec.containers.first());
        let image = container.and_then(|c| c.image.clone());
        let command = container.map(|c| c.command.clone()).unwrap_or_default();
        let hyperparameters = container
            .map(|c| parse_hyperparameters(&c.args))
            .unwrap_or_default();

        let status = job.status.as_ref();
        Self {
            name: meta.name.clone(),
            namespace: meta.namespace.clone(),
            pr_number,
            experiment,
            image,
            command,
            hyperparameters,
            active: status.and_then(|s| s.active).unwrap_or(0),
            succeeded: status.and_then(|s| s.succeeded).unwrap_or(0),
            failed: status.and_then(|s| s.failed).unwrap_or(0),
            created_at: meta.creation_timestamp,
            started_at: status.and_then(|s| s.start_time),
            completed_at: status.and_then(|s| s.completion_time),
        }
    }
}

/// Parse `--key=value` container args into an ordered map, preserving the
/// order the dispatcher wrote them in. Args in any other shape (positional
/// values, bare flags) are skipped.
fn parse_hyperparameters(args: &[String]) -> IndexMap<String, String> {
    let mut params = IndexMap::new();
    for arg in args {
        let Some(rest) = arg.strip_prefix("--") else {
            continue;
        };
        if let Some((key, value)) = rest.split_once('=') {
            params.insert(key.to_string(), value.to_string());
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_json(value: serde_json::Value) -> JobObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn descriptor_from_full_object() {
        let job = job_json(serde_json::json!({
            "metadata": {
                "name": "train-job-pr-42",
                "namespace": "default",
                "labels": {"pr-number": "42", "experiment-name": "unet-v2"},
                "creationTimestamp": "2024-05-01T12:00:00Z"
            },
            "spec": {"template": {"spec": {"containers": [{
                "name": "trainer",
                "image": "trainer:latest",
                "command": ["python", "train_unet_with_mlflow.py"],
                "args": ["--num_epochs=10", "--batch_size=8", "--lr=0.001"]
            }]}}},
            "status": {"active": 1, "startTime": "2024-05-01T12:01:00Z"}
        }));

        let desc = JobDescriptor::from_object(&job);
        assert_eq!(desc.name, "train-job-pr-42");
        assert_eq!(desc.pr_number, Some(42));
        assert_eq!(desc.experiment.as_deref(), Some("unet-v2"));
        assert_eq!(desc.image.as_deref(), Some("trainer:latest"));
        assert_eq!(desc.active, 1);
        assert_eq!(desc.succeeded, 0);
        assert!(desc.started_at.is_some());
        assert!(desc.completed_at.is_none());
    }

    #[test]
    fn hyperparameters_preserve_arg_order() {
        let args: Vec<String> = vec![
            "--num_epochs=10".into(),
            "--batch_size=8".into(),
            "--lr=0.001".into(),
        ];
        let params = parse_hyperparameters(&args);
        let keys: Vec<&str> = params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["num_epochs", "batch_size", "lr"]);
        assert_eq!(params.get("lr").unwrap(), "0.001");
    }

    #[test]
    fn non_key_value_args_are_skipped() {
        let args: Vec<String> = vec![
            "train.py".into(),
            "--verbose".into(),
            "--lr=0.01".into(),
        ];
        let params = parse_hyperparameters(&args);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("lr").unwrap(), "0.01");
    }

    #[test]
    fn missing_or_malformed_pr_label_means_no_review_reference() {
        let no_label = job_json(serde_json::json!({"metadata": {"name": "j"}}));
        assert_eq!(JobDescriptor::from_object(&no_label).pr_number, None);

        let bad_label = job_json(serde_json::json!({
            "metadata": {"name": "j", "labels": {"pr-number": "not-a-number"}}
        }));
        assert_eq!(JobDescriptor::from_object(&bad_label).pr_number, None);
    }

    #[test]
    fn bare_object_yields_empty_descriptor() {
        let job = job_json(serde_json::json!({"metadata": {"name": "j"}}));
        let desc = JobDescriptor::from_object(&job);
        assert!(desc.image.is_none());
        assert!(desc.command.is_empty());
        assert!(desc.hyperparameters.is_empty());
        assert_eq!(desc.active, 0);
    }
}
