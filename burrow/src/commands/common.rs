use std::io::IsTerminal;
use std::path::Path;

use anyhow::{bail, Result};

/// `setup` prompts for credentials, so it refuses to run without a terminal
/// on stdin and points at the non-interactive alternatives instead.
pub(crate) fn require_interactive_terminal(config: &Path) -> Result<()> {
    check_interactive(std::io::stdin().is_terminal(), config)
}

fn check_interactive(interactive: bool, config: &Path) -> Result<()> {
    if !interactive {
        bail!(
            "`setup` needs an interactive terminal. Write {} by hand or set SFTP_USER, SFTP_PASS and SFTP_PORT, then use `run`.",
            config.display()
        );
    }
    Ok(())
}
