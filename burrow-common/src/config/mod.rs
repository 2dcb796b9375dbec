mod defaults;

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use defaults::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{BurrowError, Secret};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BurrowConfigStore {
    #[serde(default = "_default_address")]
    pub address: String,

    #[serde(default = "_default_port")]
    pub port: u16,

    /// Directory exposed to clients
    #[serde(default = "_default_root_path")]
    pub root: String,

    /// Host key directory
    #[serde(default = "_default_keys_path")]
    pub keys: String,

    #[serde(default = "_default_username")]
    pub user: String,

    #[serde(default = "_default_password")]
    pub pass: Secret<String>,

    #[serde(default = "_default_inactivity_timeout", with = "humantime_serde")]
    pub inactivity_timeout: Duration,
}

impl Default for BurrowConfigStore {
    fn default() -> Self {
        Self {
            address: _default_address(),
            port: _default_port(),
            root: _default_root_path(),
            keys: _default_keys_path(),
            user: _default_username(),
            pass: _default_password(),
            inactivity_timeout: _default_inactivity_timeout(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BurrowConfig {
    pub store: BurrowConfigStore,
    pub paths_relative_to: PathBuf,
}

impl BurrowConfig {
    pub fn listen_address(&self) -> Result<SocketAddr, BurrowError> {
        let endpoint = format!("{}:{}", self.store.address, self.store.port);
        (self.store.address.as_str(), self.store.port)
            .to_socket_addrs()
            .map_err(|_| BurrowError::ListenAddress(endpoint.clone()))?
            .next()
            .ok_or(BurrowError::ListenAddress(endpoint))
    }

    pub fn root_path(&self) -> PathBuf {
        self.paths_relative_to.join(&self.store.root)
    }

    pub fn keys_path(&self) -> PathBuf {
        self.paths_relative_to.join(&self.store.keys)
    }

    /// Creates the served root if it is missing and returns its canonical path.
    pub fn prepare_served_root(&self) -> Result<PathBuf, BurrowError> {
        let path = self.root_path();
        if !path.exists() {
            std::fs::create_dir_all(&path).map_err(|source| BurrowError::RootUnavailable {
                path: path.clone(),
                source,
            })?;
        }
        if !path.is_dir() {
            return Err(BurrowError::RootNotADirectory(path));
        }
        path.canonicalize()
            .map_err(|source| BurrowError::RootUnavailable { path, source })
    }

    pub fn validate(&self) {
        if self.store.user == _default_username()
            && self.store.pass == _default_password()
        {
            warn!("Using the default credentials - set `user` and `pass` in the config file or SFTP_USER / SFTP_PASS in the environment.");
        }
    }
}
