//! User-facing side effects: notifications and navigation.
//!
//! The orchestrator never talks to a terminal or browser directly. It hands
//! each transition to an [`EffectDispatcher`], which turns it into toasts
//! and, when enabled, a navigation to the generated course.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::machine::Transition;
use super::models::{FailureReason, GenerationResult};

/// Route of the course editor, relative to the app base URL.
pub fn course_path(course_id: &str) -> String {
    format!("/create/{}", course_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub title: String,
    pub description: String,
}

impl Toast {
    fn new(kind: ToastKind, title: &str, description: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.to_string(),
            description: description.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, toast: &Toast);
}

pub trait Navigator: Send + Sync {
    /// Navigate to an app-relative path such as `/create/abc`.
    fn navigate(&self, path: &str) -> Result<()>;
}

/// Keeps every toast in memory. Useful for embedding and tests.
#[derive(Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.toasts().into_iter().map(|t| t.title).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, toast: &Toast) {
        if let Ok(mut toasts) = self.toasts.lock() {
            toasts.push(toast.clone());
        }
    }
}

/// Resolves app paths against a base URL and optionally opens them.
pub struct BrowserNavigator {
    base_url: String,
    open_browser: bool,
}

impl BrowserNavigator {
    pub fn new(base_url: &str, open_browser: bool) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            open_browser,
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Navigator for BrowserNavigator {
    fn navigate(&self, path: &str) -> Result<()> {
        let url = self.url_for(path);
        info!(url = %url, "Course ready");
        if self.open_browser {
            open::that(&url).with_context(|| format!("Failed to open {} in a browser", url))?;
        }
        Ok(())
    }
}

/// Remembers navigations instead of performing them.
#[derive(Default)]
pub struct RecordingNavigator {
    paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) -> Result<()> {
        if let Ok(mut paths) = self.paths.lock() {
            paths.push(path.to_string());
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct EffectDispatcher {
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    auto_navigate: bool,
}

impl EffectDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            notifier,
            navigator,
            auto_navigate: false,
        }
    }

    /// Navigate to the course as soon as a job completes.
    pub fn with_auto_navigate(mut self, auto_navigate: bool) -> Self {
        self.auto_navigate = auto_navigate;
        self
    }

    pub fn channel_unavailable(&self) {
        self.notifier.notify(&Toast::new(
            ToastKind::Error,
            "Socket connection required",
            "Please wait for connection to establish",
        ));
    }

    pub fn started(&self, note: Option<&str>) {
        let description = note
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Generating your course... You can continue browsing.");
        self.notifier
            .notify(&Toast::new(ToastKind::Info, "Generation started", description));
    }

    pub fn transition(&self, transition: &Transition) {
        match transition {
            Transition::Completed(result) => {
                self.notifier.notify(&Toast::new(
                    ToastKind::Success,
                    "Course generated successfully!",
                    summary(result),
                ));
                if self.auto_navigate
                    && let Some(course_id) = result.course_id.as_deref()
                {
                    self.navigate_to_course(course_id);
                }
            }
            Transition::Failed(err) => {
                let toast = match err.reason {
                    FailureReason::ServerReported => {
                        Toast::new(ToastKind::Error, "Course generation failed", &err.message)
                    }
                    FailureReason::Timeout => Toast::new(
                        ToastKind::Error,
                        "Generation timed out",
                        "Please try again or contact support",
                    ),
                    FailureReason::StartRejected => {
                        Toast::new(ToastKind::Error, "Failed to start generation", &err.message)
                    }
                };
                self.notifier.notify(&toast);
            }
        }
    }

    /// Returns whether the navigation succeeded. Failures are logged.
    pub fn navigate_to_course(&self, course_id: &str) -> bool {
        match self.navigator.navigate(&course_path(course_id)) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, course_id, "Failed to navigate to course");
                false
            }
        }
    }
}

fn summary(result: &GenerationResult) -> String {
    format!(
        "Created {} modules, {} chapters, and {} lessons",
        result.modules_count, result.chapters_count, result.lessons_count
    )
}
