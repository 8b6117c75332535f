use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use relay_core::credentials;
use std::path::Path;

#[derive(Subcommand)]
pub enum SecretsSubcommand {
    /// Store one or more secrets, e.g. CHAT_TOKEN_PAYMENTS=xoxb-...
    Set {
        /// KEY=VALUE pairs
        #[arg(required = true, value_parser = parse_kv)]
        pairs: Vec<(String, String)>,
    },

    /// Remove secrets by key
    Unset {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// List stored key names (values are never printed)
    Names,
}

pub fn run(root: &Path, subcmd: SecretsSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SecretsSubcommand::Set { pairs } => {
            credentials::set_secrets(root, &pairs).context("failed to write secrets")?;
            let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
            if json {
                print_json(&serde_json::json!({ "set": keys }))?;
            } else {
                for key in keys {
                    println!("  set: {key}");
                }
            }
        }
        SecretsSubcommand::Unset { keys } => {
            let removed = credentials::unset_secrets(root, &keys).context("failed to write secrets")?;
            if json {
                print_json(&serde_json::json!({ "removed": removed }))?;
            } else if removed.is_empty() {
                println!("No matching secrets.");
            } else {
                for key in &removed {
                    println!("  removed: {key}");
                }
            }
        }
        SecretsSubcommand::Names => {
            let names = credentials::secret_names(root).context("failed to read secrets")?;
            if json {
                print_json(&names)?;
            } else if names.is_empty() {
                println!("No secrets stored.");
            } else {
                for name in &names {
                    println!("{name}");
                }
            }
        }
    }
    Ok(())
}

fn parse_kv(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, _)) if k.trim().is_empty() => Err(format!("key cannot be empty in: {s}")),
        Some((k, v)) => Ok((k.trim().to_string(), v.to_string())),
        None => Err(format!("expected KEY=VALUE, got: {s}")),
    }
}
