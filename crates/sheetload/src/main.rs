mod cli;
mod paths;
mod run;

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use cli::{Command, ConfigAction};
use loaderconfig::LoaderConfig;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Command::Preload(args) => run::preload(cli.config.as_deref(), args),
        Command::Config(config_cmd) => {
            handle_config_command(cli.config.as_deref(), config_cmd.action)
        }
    }
}

fn handle_config_command(explicit: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => run_config_show(explicit),
        ConfigAction::Where => run_config_where(explicit),
        ConfigAction::Init { force } => run_config_init(explicit, force),
    }
}

fn run_config_show(explicit: Option<&Path>) -> Result<()> {
    let resolved = run::resolve_config(explicit)?;
    let rendered = resolved
        .config
        .to_toml_string()
        .context("failed to render configuration")?;
    if resolved.from_file {
        println!("# loaded from {}", resolved.path.display());
    } else {
        println!("# defaults ({} not found)", resolved.path.display());
    }
    print!("{rendered}");
    Ok(())
}

fn run_config_where(explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => paths::AppPaths::discover()?.config_file(),
    };
    let status = if path.is_file() { "present" } else { "missing" };
    println!("Configuration file: {} ({status})", path.display());
    Ok(())
}

fn run_config_init(explicit: Option<&Path>, force: bool) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => paths::AppPaths::discover()?.config_file(),
    };
    if path.exists() && !force {
        bail!(
            "configuration already exists at {}; pass --force to overwrite",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let rendered = LoaderConfig::default()
        .to_toml_string()
        .context("failed to render default configuration")?;
    fs::write(&path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote default configuration");
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
