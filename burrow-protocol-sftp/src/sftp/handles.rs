//! Per-session table of open file and directory handles.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::PathBuf;

use data_encoding::HEXLOWER;
use russh_sftp::protocol::OpenFlags;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use super::status::SftpError;

pub const READDIR_BATCH_SIZE: usize = 100;

/// Opaque 4-byte handle identifier, sent to the client as 8 hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub u32);

impl HandleId {
    pub fn encode(&self) -> String {
        HEXLOWER.encode(&self.0.to_be_bytes())
    }

    pub fn decode(handle: &str) -> Result<Self, SftpError> {
        let unknown = || SftpError::UnknownHandle(handle.to_owned());
        let bytes = HEXLOWER.decode(handle.as_bytes()).map_err(|_| unknown())?;
        let bytes: [u8; 4] = bytes.try_into().map_err(|_| unknown())?;
        Ok(Self(u32::from_be_bytes(bytes)))
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[derive(Debug)]
pub struct OpenFile {
    pub file: File,
    pub flags: OpenFlags,
    pub path: PathBuf,
}

/// Directory listing snapshot taken at OPENDIR time.
#[derive(Debug)]
pub struct DirCursor {
    pub path: PathBuf,
    remaining: VecDeque<String>,
}

impl DirCursor {
    pub fn new(path: PathBuf, mut names: Vec<String>) -> Self {
        names.sort();
        Self {
            path,
            remaining: names.into(),
        }
    }

    /// Take the next batch of up to `max` names. `None` once the snapshot is
    /// exhausted, including for an empty directory.
    pub fn next_batch(&mut self, max: usize) -> Option<Vec<String>> {
        if self.remaining.is_empty() {
            return None;
        }
        let count = max.min(self.remaining.len());
        Some(self.remaining.drain(..count).collect())
    }
}

#[derive(Debug)]
pub enum HandleEntry {
    File(OpenFile),
    Directory(DirCursor),
}

#[derive(Debug, Default)]
pub struct HandleTable {
    next_id: u32,
    entries: HashMap<HandleId, HandleEntry>,
}

impl HandleTable {
    pub fn allocate(&mut self, entry: HandleEntry) -> HandleId {
        let mut id = HandleId(self.next_id);
        while self.entries.contains_key(&id) {
            id = HandleId(id.0.wrapping_add(1));
        }
        self.next_id = id.0.wrapping_add(1);
        self.entries.insert(id, entry);
        id
    }

    pub fn lookup(&mut self, handle: &str) -> Result<&mut HandleEntry, SftpError> {
        let id = HandleId::decode(handle)?;
        self.entries
            .get_mut(&id)
            .ok_or_else(|| SftpError::UnknownHandle(handle.to_owned()))
    }

    pub fn lookup_file(&mut self, handle: &str) -> Result<&mut OpenFile, SftpError> {
        let id = HandleId::decode(handle)?;
        match self.entries.get_mut(&id) {
            Some(HandleEntry::File(file)) => Ok(file),
            Some(HandleEntry::Directory(_)) => Err(SftpError::WrongHandleKind(id, "file")),
            None => Err(SftpError::UnknownHandle(handle.to_owned())),
        }
    }

    pub fn lookup_dir(&mut self, handle: &str) -> Result<&mut DirCursor, SftpError> {
        let id = HandleId::decode(handle)?;
        match self.entries.get_mut(&id) {
            Some(HandleEntry::Directory(cursor)) => Ok(cursor),
            Some(HandleEntry::File(_)) => Err(SftpError::WrongHandleKind(id, "directory")),
            None => Err(SftpError::UnknownHandle(handle.to_owned())),
        }
    }

    /// Remove a handle and release its resources. The handle is invalid
    /// afterwards even if flushing the file fails.
    pub async fn release(&mut self, handle: &str) -> Result<(), SftpError> {
        let id = HandleId::decode(handle)?;
        match self.entries.remove(&id) {
            Some(entry) => release_entry(entry).await,
            None => Err(SftpError::UnknownHandle(handle.to_owned())),
        }
    }

    pub fn take_all(&mut self) -> Vec<HandleEntry> {
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub async fn release_entry(entry: HandleEntry) -> Result<(), SftpError> {
    if let HandleEntry::File(mut open) = entry {
        open.file.flush().await?;
        tracing::debug!(path=?open.path, flags=?open.flags, "Closed file");
    }
    Ok(())
}

/// Release every entry, returning how many were released.
pub async fn release_all(entries: Vec<HandleEntry>) -> usize {
    let count = entries.len();
    for entry in entries {
        if let Err(error) = release_entry(entry).await {
            tracing::warn!(%error, "Failed to release handle");
        }
    }
    count
}
