use super::Context;
use crate::cli::{EnvCommand, PathsCommand, SettingsCommand};

use anyhow::{Context as _, Result};
use subbrain_core::settings::{SettingsField, fetch_defaults};
use subbrain_core::{PathMapping, Settings, SettingsSynchronizer};

pub async fn run(ctx: &Context, command: SettingsCommand) -> Result<()> {
    let sync = SettingsSynchronizer::new(ctx.session.clone(), ctx.client.clone());

    // Purely local, no settings needed.
    if let SettingsCommand::Paths {
        command: PathsCommand::Check { host, container },
    } = &command
    {
        return check_paths(host, container);
    }
    if let SettingsCommand::Defaults { json } = command {
        let defaults = fetch_defaults(&ctx.client)
            .await
            .context("Failed to fetch default settings")?;
        if json {
            println!("{}", serde_json::to_string_pretty(&defaults.settings)?);
        } else {
            println!("{}\n", defaults.message);
            print!("{}", format_settings(&defaults.settings));
        }
        return Ok(());
    }

    sync.load().await.context("Failed to load settings")?;

    match command {
        SettingsCommand::Show { json } => {
            let settings = sync.settings().context("Settings were not loaded")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                print!("{}", format_settings(&settings));
            }
        }
        SettingsCommand::Set { field, value } => {
            let field: SettingsField = field.parse()?;
            sync.patch(field.parse_patch(&value)?)?;
            save(&sync).await?;
        }
        SettingsCommand::Env { command } => {
            match command {
                EnvCommand::Set { key, value } => sync.set_custom(&key, &value)?,
                EnvCommand::Unset { key } => sync.remove_custom(&key)?,
            }
            save(&sync).await?;
        }
        SettingsCommand::Paths { command } => paths(&sync, command).await?,
        // Answered before loading.
        SettingsCommand::Defaults { .. } => {}
    }
    Ok(())
}

async fn paths(sync: &SettingsSynchronizer, command: PathsCommand) -> Result<()> {
    match command {
        PathsCommand::Check { host, container } => check_paths(&host, &container)?,
        PathsCommand::Test { host, container } => {
            let message = match (host, container) {
                (Some(host), Some(container)) => {
                    sync.test_path_mapping(&PathMapping::new(host, container)).await?
                }
                (None, None) => sync.test_current_path_mapping().await?,
                _ => anyhow::bail!("give both a host and a container path, or neither"),
            };
            println!("{}", message);
        }
        PathsCommand::Detect { dry_run } => {
            let volumes = sync.detect_volumes().await?;
            for volume in &volumes.subgen_volumes {
                let marker = if volume.suggested { " (suggested)" } else { "" };
                println!("  {} -> {}{}", volume.host_path, volume.container_path, marker);
            }
            if dry_run {
                match volumes.suggested_mapping {
                    Some(m) => println!("Suggested mapping: {} -> {}", m.host_path, m.container_path),
                    None => println!("No mapping could be suggested."),
                }
                return Ok(());
            }
            match sync.adopt_suggestion(&volumes)? {
                Some(mapping) => {
                    println!("Using {} -> {}", mapping.host_path, mapping.container_path);
                    save(sync).await?;
                }
                None => println!("No mapping could be suggested; settings left unchanged."),
            }
        }
        PathsCommand::Set {
            host,
            container,
            enable,
        } => {
            let mapping = PathMapping::new(host, container);
            if let Some(problem) = mapping.problem() {
                println!("Warning: {}", problem);
            }
            sync.set_path_mapping(Some(mapping))?;
            if enable {
                sync.patch(SettingsField::UsePathMapping.parse_patch("true")?)?;
            }
            save(sync).await?;
        }
    }
    Ok(())
}

fn check_paths(host: &str, container: &str) -> Result<()> {
    let mapping = PathMapping::new(host, container);
    println!("host:      {} ({})", host, mapping.host_status().display_name());
    println!("container: {} ({})", container, mapping.container_status().display_name());
    match mapping.problem() {
        None => println!("Ready to test with `subbrain settings paths test`."),
        Some(problem) => println!("{}", problem),
    }
    Ok(())
}

async fn save(sync: &SettingsSynchronizer) -> Result<()> {
    sync.save().await.context("Failed to save settings; nothing was changed on the server")?;
    println!("Settings saved.");
    if let Some(snippet) = sync.compose_snippet() {
        println!("\nUpdated docker-compose environment:\n{}", snippet);
    }
    Ok(())
}

fn format_settings(settings: &Settings) -> String {
    let mut out = String::new();
    let mut line = |name: &str, value: String| {
        out.push_str(&format!("{:<28} {}\n", name, value));
    };
    line("subgen_url", settings.subgen_url.clone());
    line("whisper_model", settings.whisper_model.clone());
    line("compute_type", settings.compute_type.clone());
    line("transcribe_device", settings.transcribe_device.clone());
    line("beam_size", settings.beam_size.to_string());
    line("whisper_threads", settings.whisper_threads.to_string());
    line("concurrent_transcriptions", settings.concurrent_transcriptions.to_string());
    line("clear_vram_on_complete", settings.clear_vram_on_complete.to_string());
    line("whisper_task", settings.whisper_task.clone());
    line("subtitle_language", settings.subtitle_language.clone());
    line("use_path_mapping", settings.use_path_mapping.to_string());
    line(
        "path_mapping",
        settings
            .path_mapping
            .as_ref()
            .map_or_else(|| "-".to_string(), |m| format!("{} -> {}", m.host_path, m.container_path)),
    );
    line("skip_if_english_audio", settings.skip_if_english_audio.to_string());
    line("skip_if_english_subs_exist", settings.skip_if_english_subs_exist.to_string());
    line("skip_files_patterns", settings.skip_files_patterns.join(", "));
    line("auto_skip_threshold", settings.auto_skip_threshold.to_string());
    line("ssa_fix_encoding", settings.ssa_fix_encoding.to_string());
    line("ssa_fix_newlines", settings.ssa_fix_newlines.to_string());
    line("custom_regroup", settings.custom_regroup.clone().unwrap_or_else(|| "-".to_string()));
    for (key, value) in &settings.custom_env {
        line(&format!("env {}", key), value.clone());
    }
    out
}
