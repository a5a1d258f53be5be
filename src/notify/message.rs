//! Comment and dispatch payload rendering.
//!
//! The comment format mirrors what reviewers already expect on their
//! PRs: a headline with the transition in bold caps and a short bullet
//! list of facts about the job.

use chrono::Utc;

use crate::lifecycle::{JobDescriptor, TransitionKind};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render the PR comment body for a transition. `run_link` is the
/// resolved MLflow run URL, present only for terminal kinds and only
/// when resolution succeeded.
pub fn comment_body(kind: TransitionKind, job: &JobDescriptor, run_link: Option<&str>) -> String {
    let mut body = format!(
        "### 🔔 Training **{}**\n- **Job name:** `{}`\n",
        kind.to_string().to_uppercase(),
        job.name
    );
    match kind {
        TransitionKind::Started => {
            let started = job.started_at.or(job.created_at).unwrap_or_else(Utc::now);
            body.push_str(&format!(
                "- **Started at:** {}\n",
                started.format(TIME_FORMAT)
            ));
            if let Some(image) = &job.image {
                body.push_str(&format!("- **Image:** `{image}`\n"));
            }
            if !job.hyperparameters.is_empty() {
                let params: Vec<String> = job
                    .hyperparameters
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                body.push_str(&format!("- **Hyperparameters:** {}\n", params.join(", ")));
            }
        }
        TransitionKind::Succeeded | TransitionKind::Failed => {
            let finished = job.completed_at.unwrap_or_else(Utc::now);
            body.push_str(&format!(
                "- **Finished at:** {}\n",
                finished.format(TIME_FORMAT)
            ));
            if let Some(link) = run_link {
                body.push_str(&format!("- **MLflow run:** {link}\n"));
            }
        }
    }
    body
}

/// The `client_payload` of the terminal repository-dispatch event.
pub fn dispatch_payload(job: &JobDescriptor, kind: TransitionKind) -> serde_json::Value {
    serde_json::json!({
        "job_name": job.name,
        "status": kind.to_string(),
    })
}
