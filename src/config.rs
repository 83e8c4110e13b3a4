use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::coursegen_config::{CONFIG_FILE_NAME, CoursegenToml, coursegen_dir};
use crate::generation::OrchestratorSettings;

/// Runtime configuration for coursegen.
///
/// Bridges the parsed `coursegen.toml` with the paths and values the
/// commands need. Environment values are resolved once, here.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub coursegen_dir: PathBuf,
    pub config_file: PathBuf,
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub app_base_url: String,
    pub channel_bind: String,
    pub open_browser: bool,
    pub timeout: Duration,
    pub auto_minimize_delay: Duration,
    pub verbose: bool,
    toml: CoursegenToml,
}

impl Config {
    /// Resolve configuration for `project_dir`.
    ///
    /// `.env` in the project directory is loaded first, so its values take
    /// part in the environment layer.
    pub fn new(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let _ = dotenvy::from_path(project_dir.join(".env"));

        let coursegen_dir = coursegen_dir(&project_dir);
        let toml = CoursegenToml::load_or_default(&coursegen_dir)?;

        Ok(Self {
            config_file: coursegen_dir.join(CONFIG_FILE_NAME),
            state_dir: coursegen_dir.join("state"),
            log_dir: coursegen_dir.join("logs"),
            api_base_url: toml.api_base_url(),
            api_token: toml.api_token(),
            app_base_url: toml.app_base_url(),
            channel_bind: toml.channel.bind.clone(),
            open_browser: toml.app.open_browser,
            timeout: toml.timeout(),
            auto_minimize_delay: toml.auto_minimize_delay(),
            project_dir,
            coursegen_dir,
            verbose,
            toml,
        })
    }

    /// The parsed configuration file (or its defaults).
    pub fn toml(&self) -> &CoursegenToml {
        &self.toml
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings::default()
            .with_timeout(self.timeout)
            .with_auto_minimize_delay(self.auto_minimize_delay)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.state_dir).context("Failed to create state directory")?;
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        Ok(())
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
