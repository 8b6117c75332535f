use anyhow::Context;
use relay_core::config::default_config;
use relay_core::{io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing relay in: {}", root.display());

    for dir in [paths::RELAY_DIR, paths::LOGS_DIR] {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let document = default_config()
        .to_json_pretty()
        .context("failed to render default routing config")?;
    let created = io::write_if_missing(&paths::routing_path(root), document.as_bytes())
        .context("failed to write routing.json")?;
    if created {
        println!("  created: {}", paths::ROUTING_FILE);
    } else {
        println!("  exists:  {}", paths::ROUTING_FILE);
    }

    io::ensure_gitignore_entry(root, paths::SECRETS_FILE)
        .context("failed to update .gitignore")?;
    println!("  ignored: {}", paths::SECRETS_FILE);

    println!("\nNext: store channel secrets with `relay secrets set CHAT_TOKEN_DEFAULT=...`");
    Ok(())
}
