use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::error::NotifyError;

/// Client for the two MLflow REST calls the sink needs to turn a job
/// name into a run link: experiment lookup by name and run search by
/// correlation tag.
pub struct MlflowClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GetExperimentResponse {
    experiment: Experiment,
}

#[derive(Debug, Deserialize)]
struct Experiment {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct SearchRunsResponse {
    #[serde(default)]
    runs: Vec<Run>,
}

#[derive(Debug, Deserialize)]
struct Run {
    info: RunInfo,
}

#[derive(Debug, Deserialize)]
struct RunInfo {
    run_id: String,
}

impl MlflowClient {
    pub fn new(tracking_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: tracking_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve an experiment name to its id. `Ok(None)` when the
    /// experiment does not exist.
    pub async fn experiment_id(&self, name: &str) -> Result<Option<String>, NotifyError> {
        let url = format!("{}/api/2.0/mlflow/experiments/get-by-name", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("experiment_name", name)])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = Self::check(response).await?.json::<GetExperimentResponse>().await?;
        Ok(Some(body.experiment.experiment_id))
    }

    /// Find the run whose `job_name` tag equals the given job name.
    /// Training runs set this tag themselves at startup.
    pub async fn find_run(
        &self,
        experiment_id: &str,
        job_name: &str,
    ) -> Result<Option<String>, NotifyError> {
        let url = format!("{}/api/2.0/mlflow/runs/search", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "experiment_ids": [experiment_id],
                "filter": format!("tags.job_name = '{job_name}'"),
                "max_results": 1,
            }))
            .send()
            .await?;
        let body = Self::check(response).await?.json::<SearchRunsResponse>().await?;
        Ok(body.runs.into_iter().next().map(|run| run.info.run_id))
    }

    /// The UI link for a run, embedded in terminal-state comments.
    pub fn run_url(&self, experiment_id: &str, run_id: &str) -> String {
        format!(
            "{}/#/experiments/{experiment_id}/runs/{run_id}",
            self.base_url
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, NotifyError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(NotifyError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
