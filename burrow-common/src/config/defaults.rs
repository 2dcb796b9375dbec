use std::time::Duration;

use crate::Secret;

pub(crate) const fn _default_port() -> u16 {
    2222
}

#[inline]
pub(crate) fn _default_address() -> String {
    "0.0.0.0".to_owned()
}

#[inline]
pub(crate) fn _default_root_path() -> String {
    "./sftp_root".to_owned()
}

#[inline]
pub(crate) fn _default_keys_path() -> String {
    "./keys".to_owned()
}

#[inline]
pub(crate) fn _default_username() -> String {
    "user".to_owned()
}

#[inline]
pub(crate) fn _default_password() -> Secret<String> {
    Secret::new("password".to_owned())
}

#[inline]
pub(crate) fn _default_inactivity_timeout() -> Duration {
    Duration::from_secs(60 * 10)
}
