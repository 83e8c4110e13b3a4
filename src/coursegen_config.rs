//! Configuration file for coursegen.
//!
//! Settings are read from `.coursegen/coursegen.toml` and layered
//! file → environment → CLI. Every field has a default, so a missing file
//! or a partial file is fine.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:8000/api"
//! token_env = "COURSEGEN_API_TOKEN"
//!
//! [generation]
//! timeout_secs = 900
//! auto_minimize_ms = 3000
//!
//! [defaults]
//! category = "Programming"
//! level = "beginner"
//! language = "English"
//! duration = "5 hours"
//! chapters = 5
//!
//! [channel]
//! bind = "127.0.0.1:3142"
//!
//! [app]
//! base_url = "http://localhost:3000"
//! open_browser = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::generation::models::{CourseLevel, FullGenerationRequest, MAX_CHAPTERS};
use crate::generation::timeout::MAX_COUNTDOWN;

pub const CONFIG_FILE_NAME: &str = "coursegen.toml";
pub const API_URL_ENV: &str = "COURSEGEN_API_URL";
pub const APP_URL_ENV: &str = "COURSEGEN_APP_URL";
pub const DEFAULT_TOKEN_ENV: &str = "COURSEGEN_API_TOKEN";

const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Longest timeout accepted without a warning.
const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Producer API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    /// Base URL of the course API (falls back to `COURSEGEN_API_URL`)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: None,
            token_env: default_token_env(),
        }
    }
}

/// Job tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSection {
    /// Seconds without a terminal event before a job is failed locally
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Delay before the progress widget collapses after a job is accepted
    #[serde(default = "default_auto_minimize_ms")]
    pub auto_minimize_ms: u64,
}

fn default_timeout_secs() -> u64 {
    900
}

fn default_auto_minimize_ms() -> u64 {
    3000
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            auto_minimize_ms: default_auto_minimize_ms(),
        }
    }
}

/// Defaults for fields not given on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsSection {
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub level: CourseLevel,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_duration")]
    pub duration: String,
    #[serde(default = "default_chapters")]
    pub chapters: u8,
}

fn default_category() -> String {
    "Programming".to_string()
}

fn default_language() -> String {
    "English".to_string()
}

fn default_duration() -> String {
    "5 hours".to_string()
}

fn default_chapters() -> u8 {
    5
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            category: default_category(),
            level: CourseLevel::default(),
            language: default_language(),
            duration: default_duration(),
            chapters: default_chapters(),
        }
    }
}

/// Progress callback listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSection {
    /// Address the callback server binds to. A fixed port lets `watch`
    /// pick up events for a job started by an earlier process.
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:3142".to_string()
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Web app settings, used to build course links.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSection {
    #[serde(default)]
    pub base_url: Option<String>,
    /// Open finished courses in the browser
    #[serde(default)]
    pub open_browser: bool,
}

/// Parsed `coursegen.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoursegenToml {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub defaults: DefaultsSection,
    #[serde(default)]
    pub channel: ChannelSection,
    #[serde(default)]
    pub app: AppSection,
}

impl CoursegenToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse coursegen.toml")
    }

    /// Load `<dir>/coursegen.toml`, or defaults if it doesn't exist.
    pub fn load_or_default(coursegen_dir: &Path) -> Result<Self> {
        let config_path = coursegen_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize coursegen.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// API base URL (file → env → default).
    pub fn api_base_url(&self) -> String {
        self.api
            .base_url
            .clone()
            .or_else(|| std::env::var(API_URL_ENV).ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Bearer token read from the configured environment variable.
    pub fn api_token(&self) -> Option<String> {
        std::env::var(&self.api.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }

    /// App base URL (file → env → default).
    pub fn app_base_url(&self) -> String {
        self.app
            .base_url
            .clone()
            .or_else(|| std::env::var(APP_URL_ENV).ok())
            .unwrap_or_else(|| "http://localhost:3000".to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.generation.timeout_secs)
    }

    pub fn auto_minimize_delay(&self) -> Duration {
        Duration::from_millis(self.generation.auto_minimize_ms)
    }

    /// A request for `topic` filled in from `[defaults]`.
    pub fn request_for(&self, topic: &str) -> FullGenerationRequest {
        let mut request = FullGenerationRequest::new(topic);
        request.category = self.defaults.category.clone();
        request.level = self.defaults.level;
        request.language = self.defaults.language.clone();
        request.duration = self.defaults.duration.clone();
        request.no_of_chapters = self.defaults.chapters;
        request
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.generation.timeout_secs == 0 {
            warnings.push("generation.timeout_secs is 0: every job would time out immediately".to_string());
        } else if self.generation.timeout_secs > MAX_TIMEOUT_SECS {
            warnings.push(format!(
                "generation.timeout_secs = {} exceeds one day; it will be capped at {}",
                self.generation.timeout_secs,
                MAX_COUNTDOWN.as_secs()
            ));
        } else if self.generation.timeout_secs < 60 {
            warnings.push(format!(
                "generation.timeout_secs = {} is very short for a multi-stage generation",
                self.generation.timeout_secs
            ));
        }

        if self.generation.auto_minimize_ms / 1000 >= self.generation.timeout_secs
            && self.generation.timeout_secs > 0
        {
            warnings.push(
                "generation.auto_minimize_ms is longer than the timeout; the widget never minimizes"
                    .to_string(),
            );
        }

        if self.channel.bind.parse::<SocketAddr>().is_err() {
            warnings.push(format!(
                "Invalid channel.bind '{}': expected host:port such as 127.0.0.1:3142",
                self.channel.bind
            ));
        }

        for (name, url) in [("api.base_url", &self.api.base_url), ("app.base_url", &self.app.base_url)] {
            if let Some(url) = url
                && !is_http_url(url)
            {
                warnings.push(format!(
                    "Invalid {} '{}': should start with http:// or https://",
                    name, url
                ));
            }
        }

        if !(1..=MAX_CHAPTERS).contains(&self.defaults.chapters) {
            warnings.push(format!(
                "defaults.chapters = {} is outside 1..={}",
                self.defaults.chapters, MAX_CHAPTERS
            ));
        }

        if self.api.token_env.trim().is_empty() {
            warnings.push("api.token_env is empty".to_string());
        }

        warnings
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Location of the `.coursegen` directory for a project.
pub fn coursegen_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(".coursegen")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults() {
        let toml = CoursegenToml::default();
        assert_eq!(toml.generation.timeout_secs, 900);
        assert_eq!(toml.generation.auto_minimize_ms, 3000);
        assert_eq!(toml.timeout(), Duration::from_secs(15 * 60));
        assert_eq!(toml.auto_minimize_delay(), Duration::from_secs(3));
        assert_eq!(toml.channel.bind, "127.0.0.1:3142");
        assert_eq!(toml.api.token_env, "COURSEGEN_API_TOKEN");
        assert!(!toml.app.open_browser);
        assert!(toml.validate().is_empty());
    }

    #[test]
    fn test_parse_partial_file() {
        let content = r#"
[generation]
timeout_secs = 1200

[defaults]
level = "advanced"
chapters = 8
"#;
        let toml = CoursegenToml::parse(content).unwrap();
        assert_eq!(toml.generation.timeout_secs, 1200);
        assert_eq!(toml.generation.auto_minimize_ms, 3000);
        assert_eq!(toml.defaults.level, CourseLevel::Advanced);
        assert_eq!(toml.defaults.chapters, 8);
        assert_eq!(toml.defaults.category, "Programming");
    }

    #[test]
    fn test_parse_empty_file() {
        let toml = CoursegenToml::parse("").unwrap();
        assert_eq!(toml.generation.timeout_secs, 900);
    }

    #[test]
    fn test_parse_rejects_unknown_level() {
        let content = r#"
[defaults]
level = "expert"
"#;
        assert!(CoursegenToml::parse(content).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut toml = CoursegenToml::default();
        toml.api.base_url = Some("https://api.example.com".to_string());
        toml.defaults.chapters = 3;
        toml.save(&path).unwrap();

        let loaded = CoursegenToml::load(&path).unwrap();
        assert_eq!(loaded.api.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(loaded.defaults.chapters, 3);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let toml = CoursegenToml::load_or_default(dir.path()).unwrap();
        assert_eq!(toml.generation.timeout_secs, 900);
    }

    #[test]
    fn test_request_for_uses_defaults_section() {
        let content = r#"
[defaults]
category = "Data Science"
language = "Spanish"
chapters = 7
"#;
        let toml = CoursegenToml::parse(content).unwrap();
        let request = toml.request_for("Pandas basics");
        assert_eq!(request.topic, "Pandas basics");
        assert_eq!(request.category, "Data Science");
        assert_eq!(request.language, "Spanish");
        assert_eq!(request.no_of_chapters, 7);
        assert_eq!(request.duration, "5 hours");
    }

    #[test]
    fn test_api_base_url_priority() {
        let _guard = ENV_MUTEX.lock().unwrap();

        let saved = std::env::var(API_URL_ENV).ok();
        unsafe { std::env::remove_var(API_URL_ENV) };

        let toml = CoursegenToml::default();
        assert_eq!(toml.api_base_url(), DEFAULT_API_URL);

        unsafe { std::env::set_var(API_URL_ENV, "http://env.example.com") };
        assert_eq!(toml.api_base_url(), "http://env.example.com");

        // File wins over env
        let toml = CoursegenToml::parse("[api]\nbase_url = \"http://file.example.com\"\n").unwrap();
        assert_eq!(toml.api_base_url(), "http://file.example.com");

        unsafe { std::env::remove_var(API_URL_ENV) };
        if let Some(val) = saved {
            unsafe { std::env::set_var(API_URL_ENV, val) };
        }
    }

    #[test]
    fn test_api_token_from_configured_env() {
        let _guard = ENV_MUTEX.lock().unwrap();

        let toml = CoursegenToml::parse("[api]\ntoken_env = \"COURSEGEN_TEST_TOKEN_XYZ\"\n").unwrap();
        unsafe { std::env::remove_var("COURSEGEN_TEST_TOKEN_XYZ") };
        assert!(toml.api_token().is_none());

        unsafe { std::env::set_var("COURSEGEN_TEST_TOKEN_XYZ", "tok-123") };
        assert_eq!(toml.api_token().as_deref(), Some("tok-123"));

        unsafe { std::env::set_var("COURSEGEN_TEST_TOKEN_XYZ", "  ") };
        assert!(toml.api_token().is_none());

        unsafe { std::env::remove_var("COURSEGEN_TEST_TOKEN_XYZ") };
    }

    #[test]
    fn test_validate_warnings() {
        let content = r#"
[api]
base_url = "localhost:8000"

[generation]
timeout_secs = 0

[defaults]
chapters = 12

[channel]
bind = "not-an-address"
"#;
        let toml = CoursegenToml::parse(content).unwrap();
        let warnings = toml.validate();
        assert!(warnings.iter().any(|w| w.contains("timeout_secs is 0")));
        assert!(warnings.iter().any(|w| w.contains("api.base_url")));
        assert!(warnings.iter().any(|w| w.contains("channel.bind")));
        assert!(warnings.iter().any(|w| w.contains("defaults.chapters")));
    }

    #[test]
    fn test_validate_short_timeout() {
        let toml = CoursegenToml::parse("[generation]\ntimeout_secs = 30\n").unwrap();
        let warnings = toml.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("very short"));
    }

    #[test]
    fn test_validate_huge_timeout() {
        let toml =
            CoursegenToml::parse("[generation]\ntimeout_secs = 9223372036854775807\n").unwrap();
        let warnings = toml.validate();
        assert!(warnings.iter().any(|w| w.contains("exceeds one day")));
        assert!(!warnings.iter().any(|w| w.contains("never minimizes")));

        let day = CoursegenToml::parse("[generation]\ntimeout_secs = 86400\n").unwrap();
        assert!(day.validate().is_empty());
    }
}
