//! The job orchestrator: one tracked generation job per process.
//!
//! `JobOrchestrator` owns the state machine and drives it from three
//! sources: caller operations, progress events from the channel, and the
//! timeout guard. After every change the state is persisted and published
//! on a watch channel for UI layers; effects are dispatched once the
//! internal lock is released.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::channel::ProgressChannel;
use super::effects::EffectDispatcher;
use super::machine::{JobStateMachine, ProgressOutcome};
use super::models::{FullGenerationRequest, GenerationProgress, GenerationState, JobId};
use super::rehydrate::{Rehydration, RehydrationGuard};
use super::store::{SnapshotStore, persist_or_warn};
use super::submit::JobSubmitter;
use super::timeout::{DEFAULT_TIMEOUT, TimeoutGuard};
use crate::errors::{GenerationError, SubmitError};

/// Delay before the widget collapses after a job is accepted.
pub const DEFAULT_AUTO_MINIMIZE_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub timeout: Duration,
    pub auto_minimize_delay: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            auto_minimize_delay: DEFAULT_AUTO_MINIMIZE_DELAY,
        }
    }
}

impl OrchestratorSettings {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_auto_minimize_delay(mut self, delay: Duration) -> Self {
        self.auto_minimize_delay = delay;
        self
    }
}

/// External collaborators injected into the orchestrator.
pub struct Collaborators {
    pub store: Arc<dyn SnapshotStore>,
    pub channel: Arc<dyn ProgressChannel>,
    pub submitter: Arc<dyn JobSubmitter>,
    pub effects: EffectDispatcher,
}

struct Core {
    machine: JobStateMachine,
    timeout: TimeoutGuard,
    auto_minimize: Option<JoinHandle<()>>,
}

impl Core {
    fn cancel_auto_minimize(&mut self) {
        if let Some(handle) = self.auto_minimize.take() {
            handle.abort();
        }
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        self.cancel_auto_minimize();
    }
}

struct Shared {
    core: Mutex<Core>,
    store: Arc<dyn SnapshotStore>,
    channel: Arc<dyn ProgressChannel>,
    submitter: Arc<dyn JobSubmitter>,
    effects: EffectDispatcher,
    settings: OrchestratorSettings,
    state_tx: watch::Sender<GenerationState>,
    wiring: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Ok(wiring) = self.wiring.get_mut()
            && let Some(handle) = wiring.take()
        {
            handle.abort();
        }
    }
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, Core>, GenerationError> {
        self.core.lock().map_err(|_| GenerationError::LockPoisoned)
    }

    /// Persist and publish the current state. Called with the lock held so
    /// snapshots are written in the order the changes happened.
    fn commit(&self, core: &Core) {
        let state = core.machine.state();
        persist_or_warn(self.store.as_ref(), &state);
        self.state_tx.send_replace(state);
    }

    fn apply_progress(&self, event: &GenerationProgress) -> Result<ProgressOutcome, GenerationError> {
        let outcome = {
            let mut core = self.lock()?;
            let outcome = core.machine.apply_progress(event);
            match &outcome {
                ProgressOutcome::Ignored => {
                    debug!(status = ?event.status, "Ignoring progress event: no job in progress");
                }
                ProgressOutcome::Updated => {
                    debug!(
                        step = ?event.current_step,
                        progress = event.progress,
                        "Generation progress"
                    );
                    self.commit(&core);
                }
                ProgressOutcome::Terminal(_) => {
                    core.timeout.disarm();
                    info!(status = %core.machine.status(), "Generation finished");
                    self.commit(&core);
                }
            }
            outcome
        };

        if let ProgressOutcome::Terminal(transition) = &outcome {
            self.effects.transition(transition);
        }
        Ok(outcome)
    }

    fn on_timeout(&self, job_id: JobId) {
        let transition = match self.lock() {
            Ok(mut core) => {
                let transition = core.machine.time_out(job_id);
                if transition.is_some() {
                    warn!(%job_id, "Generation timed out with no terminal event");
                    self.commit(&core);
                }
                transition
            }
            Err(e) => {
                warn!(error = %e, "Dropping generation timeout");
                None
            }
        };
        if let Some(transition) = transition {
            self.effects.transition(&transition);
        }
    }

    fn on_auto_minimize(&self, job_id: JobId) {
        if let Ok(mut core) = self.lock()
            && core.machine.tracks(job_id)
        {
            core.auto_minimize = None;
            core.machine.set_minimized(true);
            self.commit(&core);
        }
    }
}

fn arm_timeout(shared: &Arc<Shared>, core: &mut Core, job_id: JobId, duration: Duration) {
    let weak = Arc::downgrade(shared);
    core.timeout.arm(duration, move || {
        if let Some(shared) = weak.upgrade() {
            shared.on_timeout(job_id);
        }
    });
    debug!(%job_id, secs = duration.as_secs(), "Armed generation timeout");
}

fn schedule_auto_minimize(shared: &Arc<Shared>, core: &mut Core, job_id: JobId) {
    core.cancel_auto_minimize();
    let weak = Arc::downgrade(shared);
    let delay = shared.settings.auto_minimize_delay;
    core.auto_minimize = Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(shared) = weak.upgrade() {
            shared.on_auto_minimize(job_id);
        }
    }));
}

/// Time left on a resumed job's budget.
fn remaining_budget(
    timeout: Duration,
    started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Duration {
    let elapsed = started_at
        .and_then(|started| (now - started).to_std().ok())
        .unwrap_or(Duration::ZERO);
    timeout.saturating_sub(elapsed)
}

/// Subscribe to progress while the channel is connected and feed every
/// event into the orchestrator in delivery order.
async fn run_subscription(
    shared: Weak<Shared>,
    channel: Arc<dyn ProgressChannel>,
    mut connection: watch::Receiver<bool>,
) {
    loop {
        if connection.wait_for(|connected| *connected).await.is_err() {
            return;
        }
        let mut events = channel.subscribe();
        debug!("Subscribed to generation progress");

        loop {
            tokio::select! {
                changed = connection.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !*connection.borrow_and_update() {
                        debug!("Progress channel disconnected; unsubscribed");
                        break;
                    }
                }
                received = events.recv() => match received {
                    Ok(event) => {
                        let Some(shared) = shared.upgrade() else {
                            return;
                        };
                        if let Err(e) = shared.apply_progress(&event) {
                            warn!(error = %e, "Failed to apply progress event");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Progress subscriber lagged; events dropped");
                    }
                    Err(RecvError::Closed) => return,
                },
            }
        }
    }
}

/// Coordinates the lifecycle of a single course-generation job.
///
/// Construct with [`JobOrchestrator::new`], call [`init`](Self::init) once
/// inside a tokio runtime, and [`dispose`](Self::dispose) on teardown.
#[derive(Clone)]
pub struct JobOrchestrator {
    shared: Arc<Shared>,
}

impl JobOrchestrator {
    pub fn new(collaborators: Collaborators, settings: OrchestratorSettings) -> Self {
        let (state_tx, _) = watch::channel(GenerationState::default());
        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(Core {
                    machine: JobStateMachine::new(),
                    timeout: TimeoutGuard::new(),
                    auto_minimize: None,
                }),
                store: collaborators.store,
                channel: collaborators.channel,
                submitter: collaborators.submitter,
                effects: collaborators.effects,
                settings,
                state_tx,
                wiring: Mutex::new(None),
            }),
        }
    }

    /// Rehydrate from the store and start listening for progress.
    ///
    /// A resumed job gets its timeout re-armed with whatever is left of its
    /// budget. Calling `init` again does not subscribe twice.
    pub fn init(&self) -> Result<Rehydration, GenerationError> {
        let outcome = RehydrationGuard::new(self.shared.store.as_ref()).rehydrate();

        if let Rehydration::Resumed(state) = &outcome {
            let mut core = self.shared.lock()?;
            core.machine = JobStateMachine::restore(state.clone());
            if let Some(job_id) = core.machine.job().job_id() {
                let remaining = remaining_budget(
                    self.shared.settings.timeout,
                    core.machine.job().started_at(),
                    Utc::now(),
                );
                arm_timeout(&self.shared, &mut core, job_id, remaining);
            }
            self.shared.commit(&core);
        }

        let mut wiring = self
            .shared
            .wiring
            .lock()
            .map_err(|_| GenerationError::LockPoisoned)?;
        if wiring.is_none() {
            *wiring = Some(tokio::spawn(run_subscription(
                Arc::downgrade(&self.shared),
                self.shared.channel.clone(),
                self.shared.channel.connection(),
            )));
        }
        Ok(outcome)
    }

    /// Stop listening and cancel pending timers.
    ///
    /// The persisted snapshot is left alone so a later process can resume.
    pub fn dispose(&self) {
        if let Ok(mut wiring) = self.shared.wiring.lock()
            && let Some(handle) = wiring.take()
        {
            handle.abort();
        }
        if let Ok(mut core) = self.shared.lock() {
            core.timeout.disarm();
            core.cancel_auto_minimize();
        }
        debug!("Generation orchestrator disposed");
    }

    /// Submit a new job and start tracking it.
    ///
    /// Any job already tracked is replaced; the producer is not told to
    /// stop it. Resolves once the submission call settles.
    pub async fn start(&self, request: &FullGenerationRequest) -> Result<JobId, GenerationError> {
        let shared = &self.shared;
        if !shared.channel.is_connected() {
            warn!("Refusing to start generation: progress channel not connected");
            shared.effects.channel_unavailable();
            return Err(GenerationError::ChannelUnavailable);
        }

        let job_id = Uuid::new_v4();
        {
            let mut core = shared.lock()?;
            if core.machine.job().is_in_progress() {
                info!(
                    previous = ?core.machine.job().job_id(),
                    "Replacing tracked generation job"
                );
            }
            core.timeout.disarm();
            core.cancel_auto_minimize();
            core.machine.begin(job_id, Utc::now());
            shared.commit(&core);
        }
        info!(%job_id, topic = %request.topic, "Starting course generation");

        match shared.submitter.submit(request).await {
            Ok(response) => {
                let running = {
                    let mut core = shared.lock()?;
                    let running = core.machine.is_running(job_id);
                    if running {
                        arm_timeout(shared, &mut core, job_id, shared.settings.timeout);
                        schedule_auto_minimize(shared, &mut core, job_id);
                    }
                    running
                };
                if running {
                    shared.effects.started(response.note.as_deref());
                } else {
                    debug!(%job_id, "Submission settled after the job stopped running");
                }
                Ok(job_id)
            }
            Err(source) => {
                warn!(%job_id, error = %source, "Generation request rejected");
                let transition = {
                    let mut core = shared.lock()?;
                    let message = match &source {
                        SubmitError::Rejected { message, .. } => message.clone(),
                        other => other.to_string(),
                    };
                    let transition = core.machine.reject_start(job_id, &message);
                    if transition.is_some() {
                        shared.commit(&core);
                    }
                    transition
                };
                if let Some(transition) = transition {
                    shared.effects.transition(&transition);
                }
                Err(GenerationError::StartRejected { source })
            }
        }
    }

    /// Apply one progress event, as the channel subscription does.
    pub fn apply_progress(
        &self,
        event: &GenerationProgress,
    ) -> Result<ProgressOutcome, GenerationError> {
        self.shared.apply_progress(event)
    }

    /// Stop tracking and forget the job. Nothing is sent to the producer.
    pub fn reset(&self) -> Result<(), GenerationError> {
        let mut core = self.shared.lock()?;
        core.timeout.disarm();
        core.cancel_auto_minimize();
        core.machine.reset();
        self.shared.commit(&core);
        info!("Generation state reset");
        Ok(())
    }

    pub fn toggle_minimize(&self) -> Result<(), GenerationError> {
        self.update_visibility(JobStateMachine::toggle_minimize)
    }

    pub fn set_minimized(&self, minimized: bool) -> Result<(), GenerationError> {
        self.update_visibility(|machine| machine.set_minimized(minimized))
    }

    pub fn show_widget(&self) -> Result<(), GenerationError> {
        self.update_visibility(JobStateMachine::show_widget)
    }

    /// Hide the indicator. Tracking and persistence carry on.
    pub fn hide_widget(&self) -> Result<(), GenerationError> {
        self.update_visibility(JobStateMachine::hide_widget)
    }

    /// Open the completed job's course, then hide the widget.
    ///
    /// Returns `Ok(false)` and leaves visibility alone unless the tracked
    /// job is `COMPLETED` with a course id.
    pub fn navigate_to_course(&self) -> Result<bool, GenerationError> {
        let course_id = {
            let core = self.shared.lock()?;
            core.machine.completed_course_id().map(str::to_string)
        };
        let Some(course_id) = course_id else {
            debug!("No completed course to navigate to");
            return Ok(false);
        };
        let navigated = self.shared.effects.navigate_to_course(&course_id);
        self.hide_widget()?;
        Ok(navigated)
    }

    pub fn state(&self) -> GenerationState {
        self.shared.state_tx.borrow().clone()
    }

    /// Observe every committed state change.
    pub fn watch(&self) -> watch::Receiver<GenerationState> {
        self.shared.state_tx.subscribe()
    }

    pub fn is_timeout_armed(&self) -> bool {
        self.shared
            .lock()
            .map(|core| core.timeout.is_armed())
            .unwrap_or(false)
    }

    pub fn timeout_remaining(&self) -> Option<Duration> {
        self.shared
            .lock()
            .ok()
            .and_then(|core| core.timeout.remaining())
    }

    pub fn settings(&self) -> OrchestratorSettings {
        self.shared.settings
    }

    fn update_visibility<F>(&self, mutate: F) -> Result<(), GenerationError>
    where
        F: FnOnce(&mut JobStateMachine),
    {
        let mut core = self.shared.lock()?;
        mutate(&mut core.machine);
        self.shared.commit(&core);
        Ok(())
    }
}
