//! Course-generation job tracking.
//!
//! | Module         | Role                                                    |
//! |----------------|---------------------------------------------------------|
//! | `models`       | Job snapshot, progress payload, request/response types  |
//! | `machine`      | Pure job and visibility state machine                   |
//! | `timeout`      | Single-shot countdown per job                           |
//! | `store`        | Snapshot persistence under a fixed key                  |
//! | `rehydrate`    | Boot-time resume or discard of the snapshot             |
//! | `channel`      | Progress channel trait and in-process implementation    |
//! | `callback`     | HTTP callback server feeding a channel                  |
//! | `submit`       | Job submission to the course API                        |
//! | `effects`      | Toasts and navigation on transitions                    |
//! | `orchestrator` | Wires all of the above together                         |

pub mod callback;
pub mod channel;
pub mod effects;
pub mod machine;
pub mod models;
pub mod orchestrator;
pub mod rehydrate;
pub mod store;
pub mod submit;
pub mod timeout;

pub use callback::CallbackChannel;
pub use channel::{LocalChannel, ProgressChannel};
pub use effects::{BrowserNavigator, EffectDispatcher, Navigator, Notifier, Toast, ToastKind};
pub use machine::{JobStateMachine, ProgressOutcome, Transition};
pub use models::{
    CourseLevel, FailureReason, FullGenerationRequest, GenerationJob, GenerationProgress,
    GenerationResult, GenerationState, GenerationStatus, GenerationStep, JobError, JobId,
};
pub use orchestrator::{Collaborators, JobOrchestrator, OrchestratorSettings};
pub use rehydrate::{DiscardReason, Rehydration, RehydrationGuard};
pub use store::{FileSnapshotStore, MemoryStore, SNAPSHOT_KEY, SnapshotStore};
pub use submit::{HttpSubmitter, JobSubmitter};
pub use timeout::TimeoutGuard;
