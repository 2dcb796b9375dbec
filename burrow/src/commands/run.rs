use anyhow::Result;
use burrow_protocol_sftp::SftpProtocolServer;
#[cfg(target_os = "linux")]
use sd_notify::NotifyState;
use tracing::*;

use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    info!(%version, "Burrow");

    let config = load_config(&cli.config)?;
    config.validate();
    let address = config.listen_address()?;

    let server = SftpProtocolServer::new(&config)?;

    if console::user_attended() {
        info!("--------------------------------------------");
        info!("Burrow is now running.");
        info!("Accepting SFTP connections on {address}");
        info!("Serving {}", server.root().display());
        info!("Log in as {}", config.store.user);
        info!("--------------------------------------------");
    }

    #[cfg(target_os = "linux")]
    if let Ok(true) = sd_notify::booted() {
        use std::time::Duration;
        tokio::spawn(async {
            if let Err(error) = async {
                sd_notify::notify(false, &[NotifyState::Ready])?;
                loop {
                    sd_notify::notify(false, &[NotifyState::Watchdog])?;
                    tokio::time::sleep(Duration::from_secs(15)).await;
                }
                #[allow(unreachable_code)]
                Ok::<(), anyhow::Error>(())
            }
            .await
            {
                error!(?error, "Failed to communicate with systemd");
            }
        });
    }

    drop(config);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
        result = server.run(address) => {
            if let Err(error) = result {
                error!(?error, "SFTP server error");
                std::process::exit(1);
            }
        }
    }

    info!("Exiting");
    Ok(())
}
