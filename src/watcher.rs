//! The job-lifecycle watcher: subscribes to Job change events, classifies
//! each observed job and drives the notification state machine.
//!
//! All progress state lives on the Job objects themselves (delivery
//! marker annotations), so the loop holds nothing that matters across
//! restarts: callers restart [`Watcher::run`] to resume.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::kube::types::WatchEventKind;
use crate::kube::{EventFeed, JobStore, KubeError};
use crate::lifecycle::{classify, DeliveryMarkers, JobDescriptor, JobPhase};
use crate::notify::NotificationSink;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Consecutive failed subscription cycles tolerated before `run` gives
/// up with `Disconnected`. Clean server-side watch expiries do not
/// count; any received event resets the budget.
const MAX_RECONNECT_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Narrow the watch to one job. `run` then returns `Completed` as
    /// soon as that job is terminal and fully notified.
    pub job: Option<String>,
    /// Overall deadline for the whole operation.
    pub timeout: Duration,
    /// List interval for [`Watcher::run_poll`].
    pub poll_interval: Duration,
}

/// How a watch run ended. None of these are errors: transient failures
/// are retried inside the loop, and the caller decides the restart
/// policy for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Single-job mode only: the job reached a terminal phase and every
    /// due notification was delivered.
    Completed(JobPhase),
    /// The overall deadline elapsed.
    TimedOut,
    /// External cancellation (shutdown signal).
    Cancelled,
    /// The event stream could not be re-established within the
    /// reconnect budget.
    Disconnected,
}

/// Result of one evaluation pass over a job. `settled` means every
/// notification due at the observed phase was delivered.
struct Observation {
    phase: JobPhase,
    settled: bool,
}

/// Drives notifications for all jobs in one namespace scope.
pub struct Watcher<S, N> {
    store: S,
    sink: N,
    shutdown_rx: watch::Receiver<bool>,
}

impl<S: JobStore, N: NotificationSink> Watcher<S, N> {
    pub fn new(store: S, sink: N, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            store,
            sink,
            shutdown_rx,
        }
    }

    /// Watch mode: subscribe to change events and evaluate every
    /// observed job, reconnecting with capped exponential backoff when
    /// the stream drops.
    pub async fn run(&self, opts: &WatchOptions) -> WatchOutcome {
        let deadline = Instant::now() + opts.timeout;
        let mut shutdown = self.shutdown_rx.clone();
        let mut resume: Option<String> = None;
        let mut backoff = INITIAL_BACKOFF;
        let mut attempts: u32 = 0;

        loop {
            if *shutdown.borrow() {
                return WatchOutcome::Cancelled;
            }
            if attempts > MAX_RECONNECT_ATTEMPTS {
                warn!("watch reconnect budget exhausted");
                return WatchOutcome::Disconnected;
            }
            if attempts > 0 {
                tokio::select! {
                    _ = sleep(backoff) => {}
                    _ = sleep_until(deadline) => return WatchOutcome::TimedOut,
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return WatchOutcome::Cancelled;
                        }
                    }
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }

            let mut feed = tokio::select! {
                result = self.store.subscribe(opts.job.as_deref(), resume.as_deref()) => {
                    match result {
                        Ok(feed) => feed,
                        Err(e) => {
                            warn!(error = %e, "watch subscription failed");
                            attempts += 1;
                            continue;
                        }
                    }
                }
                _ = sleep_until(deadline) => return WatchOutcome::TimedOut,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return WatchOutcome::Cancelled;
                    }
                    continue;
                }
            };

            // Consume the subscription until it closes or errors.
            loop {
                let event = tokio::select! {
                    event = feed.next_event() => event,
                    _ = sleep_until(deadline) => return WatchOutcome::TimedOut,
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return WatchOutcome::Cancelled;
                        }
                        continue;
                    }
                };
                match event {
                    Ok(Some(event)) => {
                        attempts = 0;
                        backoff = INITIAL_BACKOFF;
                        match event.kind {
                            WatchEventKind::Bookmark => {
                                if let Some(rv) = event.resource_version() {
                                    resume = Some(rv);
                                }
                            }
                            WatchEventKind::Error => {
                                // Usually 410 Gone: the resume point
                                // expired. Start over from a fresh watch.
                                warn!("watch-level error event, dropping resume point");
                                resume = None;
                                break;
                            }
                            WatchEventKind::Added
                            | WatchEventKind::Modified
                            | WatchEventKind::Deleted => {
                                let Some(job) = event.job() else {
                                    debug!("skipping event with unparseable payload");
                                    continue;
                                };
                                if let Some(rv) = &job.metadata.resource_version {
                                    resume = Some(rv.clone());
                                }
                                let name = job.metadata.name;
                                if name.is_empty() {
                                    continue;
                                }
                                match self.process_job(&name).await {
                                    Ok(observation) => {
                                        if opts.job.as_deref() == Some(name.as_str())
                                            && observation.phase.is_terminal()
                                            && observation.settled
                                        {
                                            return WatchOutcome::Completed(observation.phase);
                                        }
                                    }
                                    Err(e) => {
                                        warn!(job = %name, error = %e, transient = e.is_transient(),
                                              "store access failed, job re-evaluated on next event");
                                    }
                                }
                            }
                        }
                    }
                    Ok(None) => {
                        // Normal server-side watch window expiry.
                        debug!("watch stream closed, resubscribing");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "watch stream error");
                        attempts += 1;
                        break;
                    }
                }
            }
        }
    }

    /// Poll mode: re-list the scope every interval and run the same
    /// evaluation over every job. Listing doubles as a reconciliation
    /// pass, picking up transitions whose events were missed.
    pub async fn run_poll(&self, opts: &WatchOptions) -> WatchOutcome {
        let deadline = Instant::now() + opts.timeout;
        let mut shutdown = self.shutdown_rx.clone();

        loop {
            if *shutdown.borrow() {
                return WatchOutcome::Cancelled;
            }

            let names: Vec<String> = match &opts.job {
                Some(job) => vec![job.clone()],
                None => match self.store.list().await {
                    Ok(jobs) => jobs
                        .into_iter()
                        .map(|job| job.metadata.name)
                        .filter(|name| !name.is_empty())
                        .collect(),
                    Err(e) => {
                        warn!(error = %e, "job list failed, retrying next interval");
                        Vec::new()
                    }
                },
            };

            for name in names {
                match self.process_job(&name).await {
                    Ok(observation) => {
                        if opts.job.as_deref() == Some(name.as_str())
                            && observation.phase.is_terminal()
                            && observation.settled
                        {
                            return WatchOutcome::Completed(observation.phase);
                        }
                    }
                    Err(e) => {
                        warn!(job = %name, error = %e, "store access failed, job re-evaluated next interval");
                    }
                }
                if *shutdown.borrow() {
                    return WatchOutcome::Cancelled;
                }
            }

            tokio::select! {
                _ = sleep(opts.poll_interval) => {}
                _ = sleep_until(deadline) => return WatchOutcome::TimedOut,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return WatchOutcome::Cancelled;
                    }
                }
            }
        }
    }

    /// One evaluation pass: re-fetch the authoritative state (events may
    /// be partial or stale), classify it, and deliver whatever the
    /// delivery markers say is still owed, persisting each marker after
    /// its notification.
    async fn process_job(&self, name: &str) -> Result<Observation, KubeError> {
        let object = self.store.fetch(name).await?;
        let phase = classify(object.as_ref());
        debug!(job = %name, %phase, "observed");

        let Some(object) = object else {
            warn!(job = %name, "job not found in store");
            return Ok(Observation {
                phase,
                settled: true,
            });
        };

        let descriptor = JobDescriptor::from_object(&object);
        if descriptor.pr_number.is_none() {
            debug!(job = %name, "no pr-number label, tracked without notification");
            return Ok(Observation {
                phase,
                settled: true,
            });
        }

        // Markers come from the freshly fetched object, never from a
        // local cache: an unset marker is the retry mechanism for every
        // earlier failed delivery or patch.
        let mut markers = DeliveryMarkers::from_annotations(&object.metadata.annotations);
        while let Some(kind) = markers.next_due(phase) {
            match self.sink.notify(kind, &descriptor).await {
                Ok(()) => {
                    info!(job = %name, transition = %kind, "notification delivered");
                    markers.set(kind);
                    if let Err(e) = self.store.set_marker(name, kind).await {
                        warn!(job = %name, transition = %kind, error = %e,
                              "failed to persist delivery marker, duplicate possible on next observation");
                    }
                }
                Err(e) => {
                    warn!(job = %name, transition = %kind, error = %e,
                          "notification delivery failed, retried on next observation");
                    return Ok(Observation {
                        phase,
                        settled: false,
                    });
                }
            }
        }

        Ok(Observation {
            phase,
            settled: true,
        })
    }
}
