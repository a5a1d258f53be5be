use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kube::types::JobObject;

/// Lifecycle phase of a training job, derived from a Job snapshot.
///
/// `Timeout` is synthetic: it is produced by a wait operation hitting its
/// deadline, never by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    NotFound,
    Timeout,
}

impl JobPhase {
    /// Terminal phases never transition further and never produce another
    /// notification once delivered.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Succeeded | JobPhase::Failed)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobPhase::Pending => write!(f, "PENDING"),
            JobPhase::Running => write!(f, "RUNNING"),
            JobPhase::Succeeded => write!(f, "SUCCEEDED"),
            JobPhase::Failed => write!(f, "FAILED"),
            JobPhase::NotFound => write!(f, "NOT_FOUND"),
            JobPhase::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// Classify a Job snapshot into a lifecycle phase.
///
/// Pure and total. Priority order, first match wins:
/// 1. object absent → `NotFound`
/// 2. `succeeded > 0` → `Succeeded`
/// 3. `failed > 0` → `Failed`
/// 4. `active > 0` → `Running`
/// 5. a `Complete`/`Failed` condition with status `"True"` → accordingly
/// 6. otherwise `Pending`
///
/// Success wins over failure when the controller reports both counters
/// nonzero at once.
pub fn classify(job: Option<&JobObject>) -> JobPhase {
    let Some(job) = job else {
        return JobPhase::NotFound;
    };
    let Some(status) = job.status.as_ref() else {
        return JobPhase::Pending;
    };

    if status.succeeded.unwrap_or(0) > 0 {
        return JobPhase::Succeeded;
    }
    if status.failed.unwrap_or(0) > 0 {
        return JobPhase::Failed;
    }
    if status.active.unwrap_or(0) > 0 {
        return JobPhase::Running;
    }

    for condition in &status.conditions {
        if condition.status != "True" {
            continue;
        }
        match condition.condition_type.as_str() {
            "Complete" => return JobPhase::Succeeded,
            "Failed" => return JobPhase::Failed,
            _ => {}
        }
    }

    JobPhase::Pending
}
