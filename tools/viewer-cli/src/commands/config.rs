//! Configuration management commands.

use std::fs;

use anyhow::{bail, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::generate_default_config;
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Init { force } => init_config(force, ctx),
        ConfigCommand::Validate => validate_config(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("source", &path.display().to_string()),
        None => ctx.output.kv("source", "built-in defaults"),
    }
    println!();
    print!("{}", toml::to_string_pretty(&ctx.config)?);

    Ok(())
}

fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join("viewer.toml");

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, generate_default_config())?;
    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    // Errors were already rejected while loading; these are soft checks.
    let config = &ctx.config;
    let mut warnings: Vec<String> = Vec::new();

    if config.timeouts.variant_switch_ms > config.timeouts.initial_load_ms {
        warnings.push(format!(
            "timeouts.variant_switch_ms ({}) exceeds initial_load_ms ({})",
            config.timeouts.variant_switch_ms, config.timeouts.initial_load_ms
        ));
    }
    if config.viewport.root_margin_px == 0.0 {
        warnings.push("viewport.root_margin_px is 0; loads start only once visible".to_string());
    }
    if config.cache.failure_cooldown_ms == 0 {
        warnings.push("cache.failure_cooldown_ms is 0; failed assets are refetched on every retry".to_string());
    }
    if !config.assets.fallback_poster.starts_with('/') && config.assets.base_path.is_empty() {
        warnings.push("assets.fallback_poster should be an absolute path".to_string());
    }

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "valid": true,
            "source": ctx.config_path.as_ref().map(|p| p.display().to_string()),
            "warnings": warnings,
        }));
        return Ok(());
    }

    if ctx.config_path.is_none() {
        ctx.output.info("No config file found; checking built-in defaults");
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if warnings.is_empty() {
        ctx.output.success("Configuration is valid");
    } else {
        ctx.output.success("Configuration is valid (with warnings)");
    }

    Ok(())
}
