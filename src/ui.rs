//! Terminal output for the one-shot `status` command and the final
//! watch summary, with `console` styling.

use console::Style;

use crate::lifecycle::{DeliveryMarkers, JobDescriptor, JobPhase, TransitionKind};
use crate::watcher::WatchOutcome;

/// Styled renderer for job status and watch outcomes.
pub struct StatusView {
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl StatusView {
    pub fn new() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    fn phase_style(&self, phase: JobPhase) -> &Style {
        match phase {
            JobPhase::Succeeded => &self.green,
            JobPhase::Failed | JobPhase::NotFound => &self.red,
            _ => &self.yellow,
        }
    }

    /// Dump one job's lifecycle view: phase, counters, configuration and
    /// which notifications were already delivered.
    pub fn print_job(&self, desc: &JobDescriptor, phase: JobPhase, markers: &DeliveryMarkers) {
        println!(
            "{} {}",
            self.phase_style(phase).apply_to(format!("[{phase}]")),
            desc.name
        );
        println!("  namespace:  {}", desc.namespace);
        match desc.pr_number {
            Some(pr) => println!("  pr:         #{pr}"),
            None => println!("  pr:         {}", self.dim.apply_to("(none, not notified)")),
        }
        if let Some(image) = &desc.image {
            println!("  image:      {image}");
        }
        if !desc.command.is_empty() {
            println!("  command:    {}", desc.command.join(" "));
        }
        if !desc.hyperparameters.is_empty() {
            let params: Vec<String> = desc
                .hyperparameters
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            println!("  params:     {}", params.join(", "));
        }
        println!(
            "  counters:   active={} succeeded={} failed={}",
            desc.active, desc.succeeded, desc.failed
        );
        if let Some(started) = desc.started_at {
            println!("  started:    {started}");
        }
        if let Some(completed) = desc.completed_at {
            println!("  completed:  {completed}");
        }
        let delivered: Vec<String> = [
            TransitionKind::Started,
            TransitionKind::Succeeded,
            TransitionKind::Failed,
        ]
        .into_iter()
        .filter(|kind| markers.is_delivered(*kind))
        .map(|kind| kind.to_string())
        .collect();
        if delivered.is_empty() {
            println!("  notified:   {}", self.dim.apply_to("(none)"));
        } else {
            println!("  notified:   {}", delivered.join(", "));
        }
    }

    /// One-line summary printed when a watch run returns.
    pub fn print_outcome(&self, outcome: &WatchOutcome) {
        match outcome {
            WatchOutcome::Completed(JobPhase::Succeeded) => {
                println!("{} job succeeded", self.green.apply_to("✓"));
            }
            WatchOutcome::Completed(phase) => {
                println!("{} job finished: {phase}", self.red.apply_to("✗"));
            }
            WatchOutcome::TimedOut => {
                println!("{} watch deadline elapsed", self.yellow.apply_to("⏱"));
            }
            WatchOutcome::Cancelled => {
                println!("{} watch cancelled", self.yellow.apply_to("■"));
            }
            WatchOutcome::Disconnected => {
                println!(
                    "{} event stream lost, restart to resume",
                    self.red.apply_to("✗")
                );
            }
        }
    }
}

impl Default for StatusView {
    fn default() -> Self {
        Self::new()
    }
}
