//! SFTP request handling
//!
//! `russh-sftp` decodes packets and calls into [`SftpSession`] one request
//! at a time. The session resolves paths through the [`PathSandbox`],
//! keeps open files and directory cursors in its handle table and turns
//! every failure into a protocol status code.

mod attrs;
mod handler;
mod handles;
mod sandbox;
mod session;
mod status;

pub use attrs::{long_name, FileAttrs};
pub use handles::{HandleId, READDIR_BATCH_SIZE};
pub use sandbox::{normalize_virtual_path, PathSandbox};
pub use session::{SftpSession, MAX_READ_LENGTH};
pub use status::SftpError;
