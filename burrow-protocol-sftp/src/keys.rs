use std::fs::{create_dir_all, File};
use std::path::Path;

use anyhow::{Context, Result};
use burrow_common::helpers::fs::{secure_directory, secure_file};
use rand::rngs::OsRng;
use russh::keys::{encode_pkcs8_pem, load_secret_key, Algorithm, HashAlg, PrivateKey};
use tracing::*;

pub const HOST_KEY_ED25519: &str = "host-ed25519";
pub const HOST_KEY_RSA: &str = "host-rsa";

/// Generates any host key missing from `path`.
pub fn generate_host_keys(path: &Path) -> Result<()> {
    create_dir_all(path)
        .with_context(|| format!("Failed to create key directory {}", path.display()))?;
    secure_directory(path)?;

    let key_path = path.join(HOST_KEY_ED25519);
    if !key_path.exists() {
        info!("Generating Ed25519 host key");
        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)
            .context("Failed to generate Ed25519 key")?;
        let f = File::create(&key_path)?;
        encode_pkcs8_pem(&key, f)?;
    }
    secure_file(&key_path)?;

    let key_path = path.join(HOST_KEY_RSA);
    if !key_path.exists() {
        info!("Generating RSA host key (this can take a bit)");
        let key = PrivateKey::random(
            &mut OsRng,
            Algorithm::Rsa {
                hash: Some(HashAlg::Sha512),
            },
        )
        .context("Failed to generate RSA key")?;
        let f = File::create(&key_path)?;
        encode_pkcs8_pem(&key, f)?;
    }
    secure_file(&key_path)?;

    Ok(())
}

pub fn load_host_keys(path: &Path) -> Result<Vec<PrivateKey>, russh::keys::Error> {
    let mut keys = Vec::new();
    keys.push(load_secret_key(path.join(HOST_KEY_ED25519), None)?);
    keys.push(load_secret_key(path.join(HOST_KEY_RSA), None)?);
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_host_keys_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let keys_path = dir.path().join("keys");

        generate_host_keys(&keys_path).unwrap();
        let first = std::fs::read(keys_path.join(HOST_KEY_ED25519)).unwrap();
        generate_host_keys(&keys_path).unwrap();
        let second = std::fs::read(keys_path.join(HOST_KEY_ED25519)).unwrap();
        assert_eq!(first, second);

        let keys = load_host_keys(&keys_path).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].algorithm(), Algorithm::Ed25519);
        assert!(keys[1].algorithm().is_rsa());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(keys_path.join(HOST_KEY_RSA))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
