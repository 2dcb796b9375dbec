use anyhow::Result;
use tracing::*;

use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    config.validate();
    config.listen_address()?;

    let root = config.root_path();
    if root.exists() && !root.is_dir() {
        anyhow::bail!("Served root {} is not a directory", root.display());
    }

    info!("No problems found");
    Ok(())
}
