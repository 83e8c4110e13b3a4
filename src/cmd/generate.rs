//! Job-running commands: `coursegen generate` and `coursegen watch`.

use anyhow::{Context, Result, bail};
use console::style;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use coursegen::config::Config;
use coursegen::generation::effects::course_path;
use coursegen::generation::{
    BrowserNavigator, CallbackChannel, Collaborators, EffectDispatcher, FileSnapshotStore,
    FullGenerationRequest, GenerationState, GenerationStatus, HttpSubmitter, JobOrchestrator,
    Rehydration, SNAPSHOT_KEY, SnapshotStore,
};
use coursegen::ui::GenerationUI;
use coursegen::ui::icons::{LINK, SPARKLE};

use super::super::{Cli, GenerateArgs};

fn build_request(config: &Config, args: &GenerateArgs) -> FullGenerationRequest {
    let mut request = config.toml().request_for(args.topic.trim());
    if let Some(category) = &args.category {
        request.category = category.clone();
    }
    if let Some(level) = args.level {
        request.level = level;
    }
    if let Some(language) = &args.language {
        request.language = language.clone();
    }
    if let Some(duration) = &args.duration {
        request.duration = duration.clone();
    }
    if let Some(chapters) = args.chapters {
        request.no_of_chapters = chapters;
    }
    request.user_instructions = args
        .instructions
        .clone()
        .filter(|i| !i.trim().is_empty());
    request
}

/// A running callback channel plus an orchestrator wired to it.
struct Session {
    orchestrator: JobOrchestrator,
    ui: GenerationUI,
    channel: Arc<CallbackChannel>,
    app_base_url: String,
}

async fn open_session(config: &Config, open: bool) -> Result<Session> {
    config.ensure_directories()?;

    let mut channel = CallbackChannel::new();
    channel.start(&config.channel_bind).await?;
    let channel = Arc::new(channel);

    let ui = GenerationUI::new(config.verbose);
    let open = open || config.open_browser;
    let effects = EffectDispatcher::new(
        Arc::new(ui.notifier()),
        Arc::new(BrowserNavigator::new(&config.app_base_url, open)),
    )
    .with_auto_navigate(open);

    let orchestrator = JobOrchestrator::new(
        Collaborators {
            store: Arc::new(FileSnapshotStore::new(config.state_dir.clone())),
            channel: channel.clone(),
            submitter: Arc::new(HttpSubmitter::new(
                &config.api_base_url,
                config.api_token.clone(),
            )),
            effects,
        },
        config.orchestrator_settings(),
    );

    Ok(Session {
        orchestrator,
        ui,
        channel,
        app_base_url: config.app_base_url.trim_end_matches('/').to_string(),
    })
}

/// Render state changes until the job settles or the user interrupts.
///
/// Returns `None` when interrupted.
async fn follow(session: &Session) -> Result<Option<GenerationState>> {
    let mut states = session.orchestrator.watch();
    loop {
        let state = states.borrow_and_update().clone();
        if state.job.status() != GenerationStatus::InProgress {
            session.ui.finish(&state);
            return Ok(Some(state));
        }
        session.ui.render(&state);

        tokio::select! {
            changed = states.changed() => {
                changed.context("Generation orchestrator stopped unexpectedly")?;
            }
            _ = tokio::signal::ctrl_c() => {
                session.ui.clear();
                session.orchestrator.dispose();
                println!();
                println!(
                    "Stopped watching. The job keeps running; run '{}' to resume.",
                    style("coursegen watch").cyan()
                );
                return Ok(None);
            }
        }
    }
}

fn conclude(session: &Session, state: &GenerationState) -> Result<()> {
    session.orchestrator.dispose();
    match state.job.status() {
        GenerationStatus::Completed => {
            if let Some(course_id) = state.job.result().and_then(|r| r.course_id.as_deref()) {
                println!(
                    "{}{}{}",
                    LINK,
                    session.app_base_url,
                    course_path(course_id)
                );
            }
            Ok(())
        }
        GenerationStatus::Failed => {
            let (reason, message) = state
                .job
                .error()
                .map(|e| (e.reason.to_string(), e.message.clone()))
                .unwrap_or_else(|| ("unknown".to_string(), "Generation failed".to_string()));
            bail!("Generation failed ({}): {}", reason, message)
        }
        status => bail!("Generation stopped in unexpected state {}", status),
    }
}

pub async fn cmd_generate(project_dir: &Path, cli: &Cli, args: &GenerateArgs) -> Result<()> {
    let config = Config::new(project_dir.to_path_buf(), cli.verbose)?;

    let mut request = build_request(&config, args);
    let problems = request.validate();
    if !problems.is_empty() {
        bail!("Invalid generation request:\n  - {}", problems.join("\n  - "));
    }

    let session = open_session(&config, args.open).await?;
    request.callback_url = session.channel.event_url();

    if let Rehydration::Resumed(previous) = session.orchestrator.init()? {
        println!(
            "{} replacing tracked generation at {}%",
            style("Note:").yellow(),
            previous.job.percent()
        );
    }

    println!();
    println!(
        "{}Generating {} ({}, {} chapters)",
        SPARKLE,
        style(&request.topic).bold(),
        request.level,
        request.no_of_chapters
    );
    println!();

    let job_id = session.orchestrator.start(&request).await?;
    info!(%job_id, "Generation accepted");

    match follow(&session).await? {
        Some(state) => conclude(&session, &state),
        None => Ok(()),
    }
}

pub async fn cmd_watch(project_dir: &Path, cli: &Cli, open: bool) -> Result<()> {
    let config = Config::new(project_dir.to_path_buf(), cli.verbose)?;

    // Peek before binding the callback port, so an idle `watch` has no side effects.
    let store = FileSnapshotStore::new(config.state_dir.clone());
    if store.get(SNAPSHOT_KEY).ok().flatten().is_none() {
        println!("No active generation.");
        return Ok(());
    }

    let session = open_session(&config, open).await?;
    match session.orchestrator.init()? {
        Rehydration::Resumed(state) => {
            println!();
            println!(
                "Resuming generation at {}% ({})",
                state.job.percent(),
                state
                    .job
                    .current_step()
                    .map(|s| s.label())
                    .unwrap_or("waiting for first update")
            );
            println!();
        }
        Rehydration::Empty | Rehydration::Discarded(_) => {
            session.orchestrator.dispose();
            println!("No active generation.");
            return Ok(());
        }
    }

    match follow(&session).await? {
        Some(state) => conclude(&session, &state),
        None => Ok(()),
    }
}
