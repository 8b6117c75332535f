use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use relay_core::config::{has_errors, ConfigWarning, RoutingConfig, WarnLevel};
use relay_core::credentials::ChainedSecrets;
use relay_core::types::ChannelKind;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the routing config (secrets are never shown)
    Show,

    /// Validate the stored routing config
    Validate,

    /// Validate a routing document without saving it
    Check {
        /// JSON routing document
        file: PathBuf,
    },

    /// Replace the routing config with a document; inline secrets move to secrets.env
    Apply {
        /// JSON routing document
        file: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => {
            let config = RoutingConfig::read(root).context("failed to load routing config")?;
            report(&config.validate(), json)
        }
        ConfigSubcommand::Check { file } => {
            let config = read_document(&file)?;
            report(&config.validate(), json)
        }
        ConfigSubcommand::Apply { file } => apply(root, &file, json),
    }
}

fn read_document(file: &Path) -> anyhow::Result<RoutingConfig> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    RoutingConfig::parse(&data).with_context(|| format!("failed to parse {}", file.display()))
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let secrets = ChainedSecrets::standard(root).context("failed to read secrets")?;
    let config = RoutingConfig::load(root, &secrets).context("failed to load routing config")?;

    if json {
        return print_json(&config);
    }

    println!("Defaults:");
    for &kind in ChannelKind::all() {
        let target = config.defaults.get(kind).and_then(|s| s.target.as_deref());
        print_scope(kind, target, config.defaults.secret_configured(kind));
    }
    for (team, set) in &config.teams {
        println!("Team {team}:");
        for &kind in ChannelKind::all() {
            let target = set.get(kind).and_then(|s| s.target.as_deref());
            print_scope(kind, target, set.secret_configured(kind));
        }
    }

    println!("\nRules:");
    if config.rules.is_empty() {
        println!("  (none)");
    }
    for (index, rule) in config.rules.iter().enumerate() {
        let when = serde_json::to_string(&rule.when)?;
        let then = serde_json::to_string(&rule.then)?;
        println!("  {}  when {when}  then {then}", rule.label(index));
    }
    if let Some(fallback) = &config.fallback {
        println!("\nFallback for unmatched failures: {}", serde_json::to_string(fallback)?);
    }
    Ok(())
}

fn print_scope(kind: ChannelKind, target: Option<&str>, secret: bool) {
    println!(
        "  {:<9} target: {:<20} secret: {}",
        kind.as_str(),
        target.unwrap_or("-"),
        if secret { "configured" } else { "missing" }
    );
}

// ---------------------------------------------------------------------------
// validate / check
// ---------------------------------------------------------------------------

fn report(warnings: &[ConfigWarning], json: bool) -> anyhow::Result<()> {
    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Routing config is valid. No warnings.");
    } else {
        for w in warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if has_errors(warnings) {
        anyhow::bail!("routing config validation found errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

fn apply(root: &Path, file: &Path, json: bool) -> anyhow::Result<()> {
    let config = read_document(file)?;
    let warnings = config.validate();
    if has_errors(&warnings) {
        return report(&warnings, json);
    }
    config.save(root).context("failed to save routing config")?;

    if json {
        return print_json(&serde_json::json!({
            "saved": true,
            "warnings": warnings,
        }));
    }
    for w in &warnings {
        println!("[warning] {}", w.message);
    }
    println!(
        "Routing config saved: {} rule(s), {} team(s).",
        config.rules.len(),
        config.teams.len()
    );
    Ok(())
}
