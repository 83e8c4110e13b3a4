use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the channel event carrying [`GenerationProgress`] payloads.
pub const PROGRESS_EVENT: &str = "generation:progress";

/// Client-side identifier of a tracked generation job.
pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    #[default]
    #[serde(alias = "not_started")]
    NotStarted,
    #[serde(alias = "in_progress")]
    InProgress,
    #[serde(alias = "completed")]
    Completed,
    #[serde(alias = "failed")]
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage of a generation job, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStep {
    #[serde(alias = "course")]
    Course,
    #[serde(alias = "modules")]
    Modules,
    #[serde(alias = "chapters")]
    Chapters,
    #[serde(alias = "lessons")]
    Lessons,
}

impl GenerationStep {
    pub const ALL: [GenerationStep; 4] = [
        GenerationStep::Course,
        GenerationStep::Modules,
        GenerationStep::Chapters,
        GenerationStep::Lessons,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Course => "COURSE",
            Self::Modules => "MODULES",
            Self::Chapters => "CHAPTERS",
            Self::Lessons => "LESSONS",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Course => "Course Structure",
            Self::Modules => "Course Modules",
            Self::Chapters => "Module Chapters",
            Self::Lessons => "Lesson Content",
        }
    }

    /// Percent at which the producer considers this stage done.
    pub fn completion_threshold(&self) -> u8 {
        match self {
            Self::Course => 10,
            Self::Modules => 40,
            Self::Chapters => 70,
            Self::Lessons => 95,
        }
    }
}

impl fmt::Display for GenerationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status carried by a progress event.
///
/// Producers may emit values this client does not know about; those
/// decode as [`ProgressStatus::Other`] and leave the job in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    #[serde(alias = "in_progress")]
    InProgress,
    #[serde(alias = "completed")]
    Completed,
    #[serde(alias = "failed")]
    Failed,
    #[serde(other)]
    Other,
}

/// Identifiers and counts of a finished course.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default)]
    pub modules_count: u32,
    #[serde(default)]
    pub chapters_count: u32,
    #[serde(default)]
    pub lessons_count: u32,
}

/// Payload of the `generation:progress` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationProgress {
    pub status: ProgressStatus,
    #[serde(default)]
    pub current_step: Option<GenerationStep>,
    #[serde(default)]
    pub progress: u32,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<GenerationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationProgress {
    pub fn in_progress(step: GenerationStep, progress: u32, message: &str) -> Self {
        Self {
            status: ProgressStatus::InProgress,
            current_step: Some(step),
            progress,
            message: message.to_string(),
            estimated_time_remaining: None,
            data: None,
            error: None,
        }
    }

    pub fn completed(data: GenerationResult) -> Self {
        Self {
            status: ProgressStatus::Completed,
            current_step: Some(GenerationStep::Lessons),
            progress: 100,
            message: "Course generation complete".to_string(),
            estimated_time_remaining: None,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: Option<&str>) -> Self {
        Self {
            status: ProgressStatus::Failed,
            current_step: None,
            progress: 0,
            message: "Course generation failed".to_string(),
            estimated_time_remaining: None,
            data: None,
            error: error.map(str::to_string),
        }
    }

    pub fn with_estimate(mut self, estimate: &str) -> Self {
        self.estimated_time_remaining = Some(estimate.to_string());
        self
    }
}

/// Why a job ended in `FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// The producer's own progress event reported a failure.
    ServerReported,
    /// No terminal event arrived before the local deadline.
    Timeout,
    /// The submission call failed before any progress was observed.
    StartRejected,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerReported => "server-reported",
            Self::Timeout => "timeout",
            Self::StartRejected => "start-rejected",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub message: String,
    pub reason: FailureReason,
}

impl JobError {
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reason,
        }
    }
}

/// The tracked job snapshot.
///
/// `result` is only ever set while `COMPLETED` and `error` only while
/// `FAILED`; every mutation goes through the transition methods below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    job_id: Option<JobId>,
    status: GenerationStatus,
    #[serde(default)]
    current_step: Option<GenerationStep>,
    #[serde(default)]
    percent: u8,
    #[serde(default)]
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    estimated_time_remaining: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<GenerationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<JobError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
}

impl GenerationJob {
    pub fn job_id(&self) -> Option<JobId> {
        self.job_id
    }

    pub fn status(&self) -> GenerationStatus {
        self.status
    }

    pub fn current_step(&self) -> Option<GenerationStep> {
        self.current_step
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn estimated_time_remaining(&self) -> Option<&str> {
        self.estimated_time_remaining.as_deref()
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == GenerationStatus::InProgress
    }

    pub(crate) fn begin(job_id: JobId, started_at: DateTime<Utc>) -> Self {
        Self {
            job_id: Some(job_id),
            status: GenerationStatus::InProgress,
            started_at: Some(started_at),
            ..Self::default()
        }
    }

    /// Overwrite the display fields with the latest event (last write wins).
    pub(crate) fn record_progress(&mut self, event: &GenerationProgress) {
        self.current_step = event.current_step;
        self.percent = event.progress.min(100) as u8;
        self.message = event.message.clone();
        self.estimated_time_remaining = event.estimated_time_remaining.clone();
    }

    pub(crate) fn complete(&mut self, result: GenerationResult) {
        self.status = GenerationStatus::Completed;
        self.result = Some(result);
        self.error = None;
    }

    pub(crate) fn fail(&mut self, error: JobError) {
        self.status = GenerationStatus::Failed;
        self.error = Some(error);
        self.result = None;
    }

    pub(crate) fn assign_id_if_missing(&mut self) {
        if self.job_id.is_none() {
            self.job_id = Some(Uuid::new_v4());
        }
    }
}

/// Which progress indicator, if any, the UI should show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiVisibility {
    #[serde(default)]
    pub is_widget_visible: bool,
    #[serde(default)]
    pub is_minimized: bool,
}

/// Job plus visibility: what observers see and what gets persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationState {
    pub job: GenerationJob,
    #[serde(default)]
    pub visibility: UiVisibility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl CourseLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl FromStr for CourseLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(format!(
                "Invalid level '{}'. Valid values: beginner, intermediate, advanced",
                s
            )),
        }
    }
}

impl fmt::Display for CourseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const MIN_TOPIC_LEN: usize = 3;
pub const MAX_CHAPTERS: u8 = 10;

/// Body of the full-course generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullGenerationRequest {
    pub topic: String,
    pub category: String,
    pub level: CourseLevel,
    pub language: String,
    pub duration: String,
    pub no_of_chapters: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_instructions: Option<String>,
    /// Where the producer should deliver `generation:progress` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl FullGenerationRequest {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            category: "Programming".to_string(),
            level: CourseLevel::default(),
            language: "English".to_string(),
            duration: "5 hours".to_string(),
            no_of_chapters: 5,
            user_instructions: None,
            callback_url: None,
        }
    }

    /// Returns one message per invalid field; empty when the request is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.topic.trim().chars().count() < MIN_TOPIC_LEN {
            problems.push(format!(
                "Topic must be at least {} characters",
                MIN_TOPIC_LEN
            ));
        }
        if self.category.trim().is_empty() {
            problems.push("Category is required".to_string());
        }
        if self.language.trim().is_empty() {
            problems.push("Language is required".to_string());
        }
        if self.duration.trim().is_empty() {
            problems.push("Duration is required".to_string());
        }
        if !(1..=MAX_CHAPTERS).contains(&self.no_of_chapters) {
            problems.push(format!(
                "Number of chapters must be between 1 and {}",
                MAX_CHAPTERS
            ));
        }
        problems
    }
}

/// Acknowledgement returned by the job-submission endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub note: Option<String>,
}
