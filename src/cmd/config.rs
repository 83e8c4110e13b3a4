//! Configuration view and validation commands: `coursegen config`.

use anyhow::Result;

use coursegen::config::Config;
use coursegen::coursegen_config::{CONFIG_FILE_NAME, CoursegenToml, coursegen_dir};

use super::super::ConfigCommands;

fn print_sections(toml: &CoursegenToml) {
    println!("[api]");
    if let Some(url) = &toml.api.base_url {
        println!("  base_url = \"{}\"", url);
    }
    println!("  token_env = \"{}\"", toml.api.token_env);
    println!();

    println!("[generation]");
    println!("  timeout_secs = {}", toml.generation.timeout_secs);
    println!("  auto_minimize_ms = {}", toml.generation.auto_minimize_ms);
    println!();

    println!("[defaults]");
    println!("  category = \"{}\"", toml.defaults.category);
    println!("  level = \"{}\"", toml.defaults.level);
    println!("  language = \"{}\"", toml.defaults.language);
    println!("  duration = \"{}\"", toml.defaults.duration);
    println!("  chapters = {}", toml.defaults.chapters);
    println!();

    println!("[channel]");
    println!("  bind = \"{}\"", toml.channel.bind);
    println!();

    println!("[app]");
    if let Some(url) = &toml.app.base_url {
        println!("  base_url = \"{}\"", url);
    }
    println!("  open_browser = {}", toml.app.open_browser);
    println!();
}

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    let dir = coursegen_dir(project_dir);
    let config_path = dir.join(CONFIG_FILE_NAME);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Coursegen Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
                println!();
                print_sections(&CoursegenToml::load(&config_path)?);
            } else {
                println!("No {} found at {}", CONFIG_FILE_NAME, config_path.display());
                println!();
                println!("Using default configuration:");
                println!();
                print_sections(&CoursegenToml::default());
                println!("Run 'coursegen config init' to create one.");
                println!();
            }

            // Effective values include .env and environment overrides.
            let config = Config::new(project_dir.to_path_buf(), false)?;
            println!("Effective values (with env overrides):");
            println!("  api_base_url = \"{}\"", config.api_base_url);
            println!(
                "  api_token = {}",
                if config.api_token.is_some() { "(set)" } else { "(not set)" }
            );
            println!("  app_base_url = \"{}\"", config.app_base_url);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No {} found. Using defaults (valid).", CONFIG_FILE_NAME);
                return Ok(());
            }

            let warnings = CoursegenToml::load(&config_path)?.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!(
                    "{} already exists at {}",
                    CONFIG_FILE_NAME,
                    config_path.display()
                );
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&dir)?;
            CoursegenToml::default().save(&config_path)?;

            println!("Created {} at {}", CONFIG_FILE_NAME, config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [api] base_url, token_env");
            println!("  - [generation] timeout_secs, auto_minimize_ms");
            println!("  - [defaults] category, level, language, duration, chapters");
            println!();
        }
    }

    Ok(())
}
