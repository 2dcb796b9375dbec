//! Request failures and their SFTP status codes.

use std::io::ErrorKind;

use russh_sftp::protocol::{Status, StatusCode};
use tracing::*;

use super::handles::HandleId;

#[derive(thiserror::Error, Debug)]
pub enum SftpError {
    #[error("path {0:?} is outside the served root")]
    OutsideRoot(String),
    #[error("unknown handle {0:?}")]
    UnknownHandle(String),
    #[error("handle {0} is not a {1} handle")]
    WrongHandleKind(HandleId, &'static str),
    #[error("end of data")]
    Eof,
    #[error("duplicate init packet")]
    DuplicateInit,
    #[error("unsupported request")]
    Unsupported,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<SftpError> for StatusCode {
    fn from(error: SftpError) -> Self {
        match error {
            SftpError::Io(ref error) => status_for_io_error(error),
            SftpError::OutsideRoot(_) => StatusCode::PermissionDenied,
            SftpError::Eof => StatusCode::Eof,
            SftpError::Unsupported => StatusCode::OpUnsupported,
            SftpError::UnknownHandle(_)
            | SftpError::WrongHandleKind(..)
            | SftpError::DuplicateInit => StatusCode::Failure,
        }
    }
}

pub fn status_for_io_error(error: &std::io::Error) -> StatusCode {
    match error.kind() {
        ErrorKind::NotFound => StatusCode::NoSuchFile,
        ErrorKind::PermissionDenied => StatusCode::PermissionDenied,
        _ => StatusCode::Failure,
    }
}

/// Log a failed request before it is turned into a bare status code.
/// The peer never sees the original error text.
pub fn observe<T>(request: &'static str, result: Result<T, SftpError>) -> Result<T, SftpError> {
    match &result {
        Ok(_) | Err(SftpError::Eof) => {}
        Err(SftpError::Io(error)) => {
            warn!(%request, %error, kind=?error.kind(), "Filesystem operation failed")
        }
        Err(SftpError::OutsideRoot(path)) => {
            warn!(%request, ?path, "Rejected path outside the served root")
        }
        Err(error) => warn!(%request, %error, "Rejected request"),
    }
    result
}

pub fn ok_status(id: u32) -> Status {
    Status {
        id,
        status_code: StatusCode::Ok,
        error_message: "Ok".to_owned(),
        language_tag: "en-US".to_owned(),
    }
}
