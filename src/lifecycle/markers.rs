//! Delivery markers: the persisted record of which notifications a job
//! has already received.
//!
//! Markers live as annotations on the Job object itself (value `"true"`),
//! so delivery state survives watcher restarts and is shared between
//! overlapping watcher instances. The watcher re-reads them from the
//! fetched object on every event and never caches them across events.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::phase::JobPhase;

/// A notifiable transition in a job's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Started,
    Succeeded,
    Failed,
}

impl TransitionKind {
    /// The annotation key persisting delivery of this transition.
    pub fn annotation(&self) -> &'static str {
        match self {
            TransitionKind::Started => "trainwatch/notified-started",
            TransitionKind::Succeeded => "trainwatch/notified-succeeded",
            TransitionKind::Failed => "trainwatch/notified-failed",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionKind::Started => write!(f, "started"),
            TransitionKind::Succeeded => write!(f, "succeeded"),
            TransitionKind::Failed => write!(f, "failed"),
        }
    }
}

/// Per-job delivery state, read from the object's annotations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryMarkers {
    pub started: bool,
    pub succeeded: bool,
    pub failed: bool,
}

impl DeliveryMarkers {
    pub fn from_annotations(annotations: &BTreeMap<String, String>) -> Self {
        let is_set = |kind: TransitionKind| {
            annotations
                .get(kind.annotation())
                .is_some_and(|v| v == "true")
        };
        Self {
            started: is_set(TransitionKind::Started),
            succeeded: is_set(TransitionKind::Succeeded),
            failed: is_set(TransitionKind::Failed),
        }
    }

    pub fn is_delivered(&self, kind: TransitionKind) -> bool {
        match kind {
            TransitionKind::Started => self.started,
            TransitionKind::Succeeded => self.succeeded,
            TransitionKind::Failed => self.failed,
        }
    }

    pub fn set(&mut self, kind: TransitionKind) {
        match kind {
            TransitionKind::Started => self.started = true,
            TransitionKind::Succeeded => self.succeeded = true,
            TransitionKind::Failed => self.failed = true,
        }
    }

    /// The next transition due for delivery given the observed phase, or
    /// `None` when nothing is owed.
    ///
    /// Rule order: `started` first whenever the job is observed at all,
    /// then the matching terminal kind. Evaluated in a loop by the
    /// watcher, so a first observation of an already-terminal job yields
    /// `started` followed by the terminal kind, in that order.
    pub fn next_due(&self, phase: JobPhase) -> Option<TransitionKind> {
        if phase == JobPhase::NotFound {
            return None;
        }
        if !self.started {
            return Some(TransitionKind::Started);
        }
        match phase {
            JobPhase::Succeeded if !self.succeeded => Some(TransitionKind::Succeeded),
            JobPhase::Failed if !self.failed => Some(TransitionKind::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn markers_read_from_annotations() {
        let markers = DeliveryMarkers::from_annotations(&annotations(&[
            ("trainwatch/notified-started", "true"),
            ("trainwatch/notified-succeeded", "true"),
            ("some-other/annotation", "x"),
        ]));
        assert!(markers.started);
        assert!(markers.succeeded);
        assert!(!markers.failed);
    }

    #[test]
    fn non_true_values_do_not_count() {
        let markers = DeliveryMarkers::from_annotations(&annotations(&[(
            "trainwatch/notified-started",
            "false",
        )]));
        assert!(!markers.started);
    }

    #[test]
    fn started_is_due_first_in_any_observed_phase() {
        let markers = DeliveryMarkers::default();
        assert_eq!(markers.next_due(JobPhase::Pending), Some(TransitionKind::Started));
        assert_eq!(markers.next_due(JobPhase::Running), Some(TransitionKind::Started));
        assert_eq!(markers.next_due(JobPhase::Succeeded), Some(TransitionKind::Started));
        assert_eq!(markers.next_due(JobPhase::Failed), Some(TransitionKind::Started));
    }

    #[test]
    fn not_found_never_owes_anything() {
        let markers = DeliveryMarkers::default();
        assert_eq!(markers.next_due(JobPhase::NotFound), None);
    }

    #[test]
    fn terminal_kind_follows_started() {
        let mut markers = DeliveryMarkers::default();
        markers.set(TransitionKind::Started);
        assert_eq!(markers.next_due(JobPhase::Succeeded), Some(TransitionKind::Succeeded));
        assert_eq!(markers.next_due(JobPhase::Failed), Some(TransitionKind::Failed));
        assert_eq!(markers.next_due(JobPhase::Running), None);
        assert_eq!(markers.next_due(JobPhase::Pending), None);
    }

    #[test]
    fn delivered_transitions_are_not_due_again() {
        let mut markers = DeliveryMarkers::default();
        markers.set(TransitionKind::Started);
        markers.set(TransitionKind::Succeeded);
        assert_eq!(markers.next_due(JobPhase::Succeeded), None);
    }

    #[test]
    fn restart_with_terminal_marked_but_started_unset_owes_only_started() {
        // A previous watcher generation delivered `succeeded` but never
        // `started`; the late `started` still fires, the terminal does not.
        let mut markers = DeliveryMarkers::from_annotations(&annotations(&[(
            "trainwatch/notified-succeeded",
            "true",
        )]));
        assert_eq!(markers.next_due(JobPhase::Succeeded), Some(TransitionKind::Started));
        markers.set(TransitionKind::Started);
        assert_eq!(markers.next_due(JobPhase::Succeeded), None);
    }

    #[test]
    fn annotation_keys_are_distinct() {
        assert_ne!(
            TransitionKind::Started.annotation(),
            TransitionKind::Succeeded.annotation()
        );
        assert_ne!(
            TransitionKind::Succeeded.annotation(),
            TransitionKind::Failed.annotation()
        );
    }

    #[test]
    fn transition_kind_display() {
        assert_eq!(TransitionKind::Started.to_string(), "started");
        assert_eq!(TransitionKind::Succeeded.to_string(), "succeeded");
        assert_eq!(TransitionKind::Failed.to_string(), "failed");
    }
}
