use crate::generation::effects::{Notifier, Toast, ToastKind};
use crate::generation::models::{GenerationJob, GenerationState, GenerationStatus, GenerationStep};
use crate::ui::icons::{CHECK, CROSS, INFO, STEP_ACTIVE, STEP_DONE, STEP_PENDING};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;
use tracing::info;

/// Where a pipeline step stands for the job being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMark {
    Done,
    Active,
    Pending,
}

/// Mark every step, in pipeline order.
///
/// A step counts as done once the job has moved past it or reached its
/// completion threshold.
pub fn step_marks(job: &GenerationJob) -> [(GenerationStep, StepMark); 4] {
    GenerationStep::ALL.map(|step| {
        let mark = if job.status() == GenerationStatus::Completed {
            StepMark::Done
        } else {
            match job.current_step() {
                Some(current) if step < current => StepMark::Done,
                Some(current) if step == current => {
                    if job.percent() >= step.completion_threshold() {
                        StepMark::Done
                    } else {
                        StepMark::Active
                    }
                }
                _ => StepMark::Pending,
            }
        };
        (step, mark)
    })
}

fn step_line(job: &GenerationJob) -> String {
    step_marks(job)
        .iter()
        .map(|(step, mark)| match mark {
            StepMark::Done => format!("{} {}", style(STEP_DONE).green(), style(step.label()).dim()),
            StepMark::Active => format!("{} {}", style(STEP_ACTIVE).cyan(), style(step.label()).bold()),
            StepMark::Pending => format!("{} {}", style(STEP_PENDING).dim(), style(step.label()).dim()),
        })
        .collect::<Vec<_>>()
        .join("  ")
}

/// Terminal rendering of a tracked generation job.
///
/// Two lines: an overall percent bar with the latest status message, and
/// a step line showing the four pipeline stages.
pub struct GenerationUI {
    multi: MultiProgress,
    bar: ProgressBar,
    steps: ProgressBar,
    verbose: bool,
    last_step: Mutex<Option<GenerationStep>>,
}

impl GenerationUI {
    pub fn new(verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let bar_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");
        let bar = multi.add(ProgressBar::new(100));
        bar.set_style(bar_style);
        bar.set_prefix("Course");

        let steps_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} {msg}")
            .expect("progress bar template is a valid static string");
        let steps = multi.add(ProgressBar::new(0));
        steps.set_style(steps_style);
        steps.set_prefix(" Steps");

        Self {
            multi,
            bar,
            steps,
            verbose,
            last_step: Mutex::new(None),
        }
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Notifier that prints above the bars instead of through them.
    pub fn notifier(&self) -> ConsoleNotifier {
        ConsoleNotifier {
            multi: Some(self.multi.clone()),
        }
    }

    pub fn render(&self, state: &GenerationState) {
        let job = &state.job;
        self.bar.set_position(u64::from(job.percent()));

        let mut msg = job.message().to_string();
        if let Some(eta) = job.estimated_time_remaining() {
            msg = format!("{} {}", msg, style(format!("({} left)", eta)).dim());
        }
        if state.visibility.is_minimized {
            // Minimized: the bar alone carries the progress.
            self.bar.set_message("");
        } else {
            self.bar.set_message(msg);
        }
        self.steps.set_message(step_line(job));

        if self.verbose
            && let Ok(mut last) = self.last_step.lock()
            && *last != job.current_step()
        {
            if let Some(step) = job.current_step() {
                self.print_line(format!(
                    "    {} {}",
                    style("→").dim(),
                    style(step.label()).dim()
                ));
            }
            *last = job.current_step();
        }
    }

    /// Stop the bars on a terminal state, leaving the last frame visible.
    pub fn finish(&self, state: &GenerationState) {
        self.render(state);
        match state.job.status() {
            GenerationStatus::Completed => {
                self.bar.finish_with_message(format!("{}", style("done").green()));
                self.steps.finish();
            }
            GenerationStatus::Failed => {
                let reason = state
                    .job
                    .error()
                    .map(|e| e.message.clone())
                    .unwrap_or_default();
                self.bar.abandon_with_message(format!("{}", style(reason).red()));
                self.steps.abandon();
            }
            _ => self.clear(),
        }
    }

    pub fn clear(&self) {
        self.bar.finish_and_clear();
        self.steps.finish_and_clear();
    }
}

/// Prints toasts as styled terminal lines and records them in the log file.
#[derive(Default)]
pub struct ConsoleNotifier {
    multi: Option<MultiProgress>,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn format(toast: &Toast) -> String {
        let (icon, title) = match toast.kind {
            ToastKind::Success => (CHECK, style(toast.title.as_str()).green().bold()),
            ToastKind::Error => (CROSS, style(toast.title.as_str()).red().bold()),
            ToastKind::Info => (INFO, style(toast.title.as_str()).cyan().bold()),
        };
        format!("{}{} {}", icon, title, style(toast.description.as_str()).dim())
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, toast: &Toast) {
        info!(kind = ?toast.kind, description = %toast.description, "{}", toast.title);

        let line = Self::format(toast);
        match &self.multi {
            Some(multi) if !multi.is_hidden() && multi.println(&line).is_ok() => {}
            _ => println!("{}", line),
        }
    }
}
