//! Snapshot inspection commands: `coursegen status` and `coursegen reset`.

use anyhow::{Context, Result};
use chrono::Utc;
use console::style;
use std::path::Path;
use std::time::Duration;

use coursegen::config::Config;
use coursegen::generation::{FileSnapshotStore, GenerationState, SNAPSHOT_KEY, SnapshotStore};
use coursegen::ui::icons::CLOCK;
use coursegen::ui::{StepMark, step_marks};

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

fn load_snapshot(store: &FileSnapshotStore) -> Result<Option<(String, Option<GenerationState>)>> {
    let raw = store
        .get(SNAPSHOT_KEY)
        .context("Failed to read generation snapshot")?;
    Ok(raw.map(|raw| {
        let parsed = serde_json::from_str::<GenerationState>(&raw).ok();
        (raw, parsed)
    }))
}

pub fn cmd_status(project_dir: &Path, json: bool) -> Result<()> {
    let config = Config::new(project_dir.to_path_buf(), false)?;
    let store = FileSnapshotStore::new(config.state_dir.clone());

    let Some((raw, parsed)) = load_snapshot(&store)? else {
        println!("No active generation.");
        return Ok(());
    };

    if json {
        println!("{}", raw.trim());
        return Ok(());
    }

    let Some(state) = parsed else {
        println!(
            "Snapshot at {} is unreadable; it will be discarded on the next 'coursegen watch'.",
            store.path_for(SNAPSHOT_KEY).display()
        );
        return Ok(());
    };

    let job = &state.job;
    println!();
    println!("Generation Status");
    println!("=================");
    println!();
    if let Some(id) = job.job_id() {
        println!("Job:      {}", id);
    }
    println!("Status:   {}", style(job.status()).cyan());
    println!("Progress: {}%", job.percent());
    if !job.message().is_empty() {
        println!("Message:  {}", job.message());
    }
    if let Some(eta) = job.estimated_time_remaining() {
        println!("ETA:      {}", eta);
    }
    println!();
    for (step, mark) in step_marks(job) {
        let marker = match mark {
            StepMark::Done => style("done").green(),
            StepMark::Active => style("running").yellow(),
            StepMark::Pending => style("pending").dim(),
        };
        println!("  {:<20} {}", step.label(), marker);
    }
    println!();

    if let Some(started_at) = job.started_at() {
        let elapsed = (Utc::now() - started_at).to_std().unwrap_or(Duration::ZERO);
        let budget = config.timeout.saturating_sub(elapsed);
        println!("Started:  {} ({} ago)", started_at.to_rfc3339(), format_duration(elapsed));
        if budget.is_zero() {
            println!("{}Timeout budget exhausted; 'coursegen watch' will fail it.", CLOCK);
        } else {
            println!("{}Times out in {}", CLOCK, format_duration(budget));
        }
        println!();
    }

    Ok(())
}

pub fn cmd_reset(project_dir: &Path) -> Result<()> {
    let config = Config::new(project_dir.to_path_buf(), false)?;
    let store = FileSnapshotStore::new(config.state_dir.clone());

    if store.get(SNAPSHOT_KEY).ok().flatten().is_none() {
        println!("No active generation.");
        return Ok(());
    }

    store
        .remove(SNAPSHOT_KEY)
        .context("Failed to remove generation snapshot")?;
    println!("Stopped tracking the active generation.");
    println!(
        "{}",
        style("The server-side job was not cancelled and may still finish.").dim()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn test_load_snapshot_variants() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().to_path_buf());
        assert!(load_snapshot(&store).unwrap().is_none());

        store.set(SNAPSHOT_KEY, "{broken").unwrap();
        let (raw, parsed) = load_snapshot(&store).unwrap().unwrap();
        assert_eq!(raw, "{broken");
        assert!(parsed.is_none());

        store
            .set(SNAPSHOT_KEY, r#"{"job":{"status":"IN_PROGRESS","percent":55}}"#)
            .unwrap();
        let (_, parsed) = load_snapshot(&store).unwrap().unwrap();
        assert_eq!(parsed.unwrap().job.percent(), 55);
    }
}
