use std::path::Path;

use anyhow::{Context, Result};
use burrow_common::helpers::fs::secure_file;
use burrow_common::{BurrowConfig, BurrowConfigStore, Secret};
use dialoguer::theme::ColorfulTheme;
use tracing::*;

use crate::commands::common::require_interactive_terminal;
use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    info!("Welcome to Burrow {version}");

    if cli.config.exists() {
        error!("Config file already exists at {}.", cli.config.display());
        error!("To generate a new config file, rename or delete the existing one first.");
        std::process::exit(1);
    }

    require_interactive_terminal(&cli.config)?;

    let theme = ColorfulTheme::default();
    let defaults = BurrowConfigStore::default();

    let user: String = dialoguer::Input::with_theme(&theme)
        .with_prompt("Username")
        .default(defaults.user.clone())
        .interact_text()?;

    let pass = dialoguer::Password::with_theme(&theme)
        .with_prompt("Password (leave empty for the default)")
        .allow_empty_password(true)
        .interact()?;
    let pass = if pass.is_empty() {
        defaults.pass.clone()
    } else {
        Secret::new(pass)
    };

    let port: u16 = dialoguer::Input::with_theme(&theme)
        .with_prompt("Port")
        .default(defaults.port)
        .interact_text()?;

    let store = BurrowConfigStore {
        user,
        pass,
        port,
        ..defaults
    };
    write_config(&cli.config, &store)?;
    info!("Saved into {}", cli.config.display());

    let config = load_config(&cli.config)?;
    prepare_directories(&config)?;

    info!("All done. Start the server with `burrow --config {} run`", cli.config.display());
    Ok(())
}

fn write_config(path: &Path, store: &BurrowConfigStore) -> Result<()> {
    let yaml = serde_yaml::to_string(store).context("Could not serialize config")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Could not write config to {}", path.display()))?;
    secure_file(path).context("Could not secure config")?;
    Ok(())
}

fn prepare_directories(config: &BurrowConfig) -> Result<()> {
    let root = config.prepare_served_root()?;
    info!("Files will be served from {}", root.display());
    burrow_protocol_sftp::generate_host_keys(&config.keys_path())?;
    Ok(())
}
