use tracing::{debug, warn};

use super::error::NotifyError;
use super::github::GitHubClient;
use super::message;
use super::mlflow::MlflowClient;
use super::NotificationSink;
use crate::lifecycle::{JobDescriptor, TransitionKind};

const DISPATCH_EVENT_TYPE: &str = "training_completed";

/// Production sink: comments on the job's PR and, for terminal kinds,
/// fires a repository dispatch event so downstream automation can react.
pub struct GitHubSink {
    github: GitHubClient,
    mlflow: Option<MlflowClient>,
    default_experiment: String,
    dispatch_enabled: bool,
}

impl GitHubSink {
    pub fn new(
        github: GitHubClient,
        mlflow: Option<MlflowClient>,
        default_experiment: String,
        dispatch_enabled: bool,
    ) -> Self {
        Self {
            github,
            mlflow,
            default_experiment,
            dispatch_enabled,
        }
    }

    /// Resolve the MLflow run link for a terminal comment. Any lookup
    /// failure degrades to a comment without the link; losing the link
    /// beats losing the notification.
    async fn resolve_run_link(&self, job: &JobDescriptor) -> Option<String> {
        let mlflow = self.mlflow.as_ref()?;
        let experiment = job
            .experiment
            .as_deref()
            .unwrap_or(&self.default_experiment);

        let experiment_id = match mlflow.experiment_id(experiment).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                warn!(experiment, job = %job.name, "MLflow experiment not found");
                return None;
            }
            Err(e) => {
                warn!(experiment, error = %e, "MLflow experiment lookup failed");
                return None;
            }
        };

        match mlflow.find_run(&experiment_id, &job.name).await {
            Ok(Some(run_id)) => Some(mlflow.run_url(&experiment_id, &run_id)),
            Ok(None) => {
                warn!(job = %job.name, experiment, "no MLflow run tagged with this job name");
                None
            }
            Err(e) => {
                warn!(job = %job.name, error = %e, "MLflow run search failed");
                None
            }
        }
    }
}

impl NotificationSink for GitHubSink {
    async fn notify(&self, kind: TransitionKind, job: &JobDescriptor) -> Result<(), NotifyError> {
        let Some(pr_number) = job.pr_number else {
            debug!(job = %job.name, "job has no pr-number label, skipping notification");
            return Ok(());
        };

        let terminal = matches!(kind, TransitionKind::Succeeded | TransitionKind::Failed);
        let run_link = if terminal {
            self.resolve_run_link(job).await
        } else {
            None
        };

        let body = message::comment_body(kind, job, run_link.as_deref());
        self.github.comment(pr_number, &body).await?;

        if terminal && self.dispatch_enabled {
            self.github
                .dispatch(DISPATCH_EVENT_TYPE, message::dispatch_payload(job, kind))
                .await?;
        }
        Ok(())
    }
}
