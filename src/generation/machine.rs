//! Pure job/visibility state machine.
//!
//! No I/O happens here: the orchestrator owns persistence, timers and
//! effects, and drives this type with the events it observes.

use chrono::{DateTime, Utc};

use super::models::{
    FailureReason, GenerationJob, GenerationProgress, GenerationResult, GenerationState,
    GenerationStatus, JobError, JobId, ProgressStatus, UiVisibility,
};

pub const DEFAULT_FAILURE_MESSAGE: &str = "Generation failed";
pub const TIMEOUT_MESSAGE: &str = "Generation timed out";

/// A transition into a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Completed(GenerationResult),
    Failed(JobError),
}

/// What applying a progress event did.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressOutcome {
    /// No job was in progress; the event was dropped.
    Ignored,
    /// Display fields updated, job still in progress.
    Updated,
    Terminal(Transition),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobStateMachine {
    job: GenerationJob,
    visibility: UiVisibility,
}

impl JobStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a persisted in-progress snapshot. The widget is always shown.
    pub fn restore(state: GenerationState) -> Self {
        let mut job = state.job;
        job.assign_id_if_missing();
        Self {
            job,
            visibility: UiVisibility {
                is_widget_visible: true,
                is_minimized: state.visibility.is_minimized,
            },
        }
    }

    pub fn job(&self) -> &GenerationJob {
        &self.job
    }

    pub fn visibility(&self) -> UiVisibility {
        self.visibility
    }

    pub fn state(&self) -> GenerationState {
        GenerationState {
            job: self.job.clone(),
            visibility: self.visibility,
        }
    }

    pub fn status(&self) -> GenerationStatus {
        self.job.status()
    }

    /// Whether `job_id` is the job currently tracked, in any status.
    pub fn tracks(&self, job_id: JobId) -> bool {
        self.job.job_id() == Some(job_id)
    }

    /// Whether `job_id` is tracked and still in progress.
    pub fn is_running(&self, job_id: JobId) -> bool {
        self.tracks(job_id) && self.job.is_in_progress()
    }

    /// Start tracking a new job, replacing whatever was tracked before.
    pub fn begin(&mut self, job_id: JobId, now: DateTime<Utc>) {
        self.job = GenerationJob::begin(job_id, now);
        self.visibility = UiVisibility {
            is_widget_visible: true,
            is_minimized: false,
        };
    }

    /// The submission call for `job_id` failed before any progress was seen.
    ///
    /// The widget is hidden so the job reads as never started.
    pub fn reject_start(&mut self, job_id: JobId, message: &str) -> Option<Transition> {
        if !self.is_running(job_id) {
            return None;
        }
        let error = JobError::new(FailureReason::StartRejected, message);
        self.job.fail(error.clone());
        self.visibility.is_widget_visible = false;
        Some(Transition::Failed(error))
    }

    pub fn apply_progress(&mut self, event: &GenerationProgress) -> ProgressOutcome {
        if !self.job.is_in_progress() {
            return ProgressOutcome::Ignored;
        }
        self.job.record_progress(event);

        match event.status {
            ProgressStatus::Completed => {
                let result = event.data.clone().unwrap_or_default();
                self.job.complete(result.clone());
                ProgressOutcome::Terminal(Transition::Completed(result))
            }
            ProgressStatus::Failed => {
                let message = event
                    .error
                    .as_deref()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or(DEFAULT_FAILURE_MESSAGE);
                let error = JobError::new(FailureReason::ServerReported, message);
                self.job.fail(error.clone());
                ProgressOutcome::Terminal(Transition::Failed(error))
            }
            ProgressStatus::InProgress | ProgressStatus::Other => ProgressOutcome::Updated,
        }
    }

    /// The local deadline for `job_id` passed. The widget stays visible.
    pub fn time_out(&mut self, job_id: JobId) -> Option<Transition> {
        if !self.is_running(job_id) {
            return None;
        }
        let error = JobError::new(FailureReason::Timeout, TIMEOUT_MESSAGE);
        self.job.fail(error.clone());
        Some(Transition::Failed(error))
    }

    pub fn reset(&mut self) {
        self.job = GenerationJob::default();
        self.visibility = UiVisibility::default();
    }

    pub fn toggle_minimize(&mut self) {
        self.visibility.is_minimized = !self.visibility.is_minimized;
    }

    pub fn set_minimized(&mut self, minimized: bool) {
        self.visibility.is_minimized = minimized;
    }

    pub fn show_widget(&mut self) {
        self.visibility.is_widget_visible = true;
    }

    pub fn hide_widget(&mut self) {
        self.visibility.is_widget_visible = false;
    }

    /// Course id of a completed job, if any.
    pub fn completed_course_id(&self) -> Option<&str> {
        match self.job.status() {
            GenerationStatus::Completed => self.job.result()?.course_id.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::models::GenerationStep;
    use uuid::Uuid;

    fn started() -> (JobStateMachine, JobId) {
        let mut machine = JobStateMachine::new();
        let id = Uuid::new_v4();
        machine.begin(id, Utc::now());
        (machine, id)
    }

    fn assert_terminal_exclusive(machine: &JobStateMachine) {
        let job = machine.job();
        assert_eq!(job.result().is_some(), job.status() == GenerationStatus::Completed);
        assert_eq!(job.error().is_some(), job.status() == GenerationStatus::Failed);
    }

    #[test]
    fn test_begin_resets_job_and_shows_expanded_widget() {
        let (machine, id) = started();
        assert!(machine.is_running(id));
        assert_eq!(machine.job().percent(), 0);
        assert!(machine.job().current_step().is_none());
        assert!(machine.visibility().is_widget_visible);
        assert!(!machine.visibility().is_minimized);
        assert_terminal_exclusive(&machine);
    }

    #[test]
    fn test_progress_is_last_write_wins() {
        let (mut machine, _) = started();
        machine.apply_progress(&GenerationProgress::in_progress(
            GenerationStep::Chapters,
            70,
            "chapters",
        ));
        let outcome = machine.apply_progress(&GenerationProgress::in_progress(
            GenerationStep::Modules,
            40,
            "back to modules",
        ));
        assert_eq!(outcome, ProgressOutcome::Updated);
        assert_eq!(machine.job().percent(), 40);
        assert_eq!(machine.job().current_step(), Some(GenerationStep::Modules));
        assert_eq!(machine.job().message(), "back to modules");
    }

    #[test]
    fn test_completed_event_sets_result() {
        let (mut machine, _) = started();
        let result = GenerationResult {
            course_id: Some("c1".to_string()),
            modules_count: 5,
            ..Default::default()
        };
        let outcome = machine.apply_progress(&GenerationProgress::completed(result.clone()));
        assert_eq!(outcome, ProgressOutcome::Terminal(Transition::Completed(result)));
        assert_eq!(machine.completed_course_id(), Some("c1"));
        assert_terminal_exclusive(&machine);
    }

    #[test]
    fn test_failed_event_without_message_uses_default() {
        let (mut machine, _) = started();
        let outcome = machine.apply_progress(&GenerationProgress::failed(None));
        match outcome {
            ProgressOutcome::Terminal(Transition::Failed(error)) => {
                assert_eq!(error.message, DEFAULT_FAILURE_MESSAGE);
                assert_eq!(error.reason, FailureReason::ServerReported);
            }
            other => panic!("Expected failure, got {:?}", other),
        }
        assert!(machine.visibility().is_widget_visible);
        assert_terminal_exclusive(&machine);
    }

    #[test]
    fn test_unknown_status_keeps_job_in_progress() {
        let (mut machine, id) = started();
        let mut event = GenerationProgress::in_progress(GenerationStep::Course, 5, "queued");
        event.status = ProgressStatus::Other;
        assert_eq!(machine.apply_progress(&event), ProgressOutcome::Updated);
        assert!(machine.is_running(id));
    }

    #[test]
    fn test_events_ignored_without_running_job() {
        let mut machine = JobStateMachine::new();
        let outcome = machine.apply_progress(&GenerationProgress::completed(Default::default()));
        assert_eq!(outcome, ProgressOutcome::Ignored);
        assert_eq!(machine.status(), GenerationStatus::NotStarted);

        let (mut machine, _) = started();
        machine.apply_progress(&GenerationProgress::failed(Some("boom")));
        let outcome = machine.apply_progress(&GenerationProgress::completed(Default::default()));
        assert_eq!(outcome, ProgressOutcome::Ignored);
        assert_eq!(machine.status(), GenerationStatus::Failed);
    }

    #[test]
    fn test_reject_start_hides_widget() {
        let (mut machine, id) = started();
        let transition = machine.reject_start(id, "network down");
        assert!(matches!(transition, Some(Transition::Failed(ref e)) if e.reason == FailureReason::StartRejected));
        assert!(!machine.visibility().is_widget_visible);
        assert_terminal_exclusive(&machine);
    }

    #[test]
    fn test_stale_job_id_is_ignored() {
        let (mut machine, first) = started();
        machine.begin(Uuid::new_v4(), Utc::now());
        assert!(machine.reject_start(first, "late").is_none());
        assert!(machine.time_out(first).is_none());
        assert_eq!(machine.status(), GenerationStatus::InProgress);
    }

    #[test]
    fn test_timeout_keeps_widget_visible() {
        let (mut machine, id) = started();
        machine.set_minimized(true);
        let transition = machine.time_out(id).unwrap();
        assert_eq!(
            transition,
            Transition::Failed(JobError::new(FailureReason::Timeout, TIMEOUT_MESSAGE))
        );
        assert!(machine.visibility().is_widget_visible);
        assert!(machine.time_out(id).is_none());
    }

    #[test]
    fn test_visibility_mutators_never_touch_status() {
        let (mut machine, id) = started();
        machine.hide_widget();
        machine.toggle_minimize();
        assert!(machine.is_running(id));
        assert!(machine.visibility().is_minimized);
        machine.toggle_minimize();
        machine.show_widget();
        assert_eq!(
            machine.visibility(),
            UiVisibility {
                is_widget_visible: true,
                is_minimized: false
            }
        );
    }

    #[test]
    fn test_reset_clears_everything() {
        let (mut machine, _) = started();
        machine.set_minimized(true);
        machine.reset();
        assert_eq!(machine, JobStateMachine::new());
    }

    #[test]
    fn test_restore_forces_widget_visible() {
        let (mut machine, id) = started();
        machine.hide_widget();
        machine.set_minimized(true);
        let restored = JobStateMachine::restore(machine.state());
        assert!(restored.is_running(id));
        assert!(restored.visibility().is_widget_visible);
        assert!(restored.visibility().is_minimized);
    }
}
