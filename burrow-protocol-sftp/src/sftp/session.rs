use std::io::SeekFrom;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use burrow_common::SessionId;
use russh_sftp::protocol::{File as NameEntry, OpenFlags};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::oneshot;
use tracing::*;

use super::attrs::{long_name, FileAttrs};
use super::handles::{
    release_all, DirCursor, HandleEntry, HandleTable, OpenFile, READDIR_BATCH_SIZE,
};
use super::sandbox::{normalize_virtual_path, PathSandbox};
use super::status::SftpError;

/// Upper bound for a single READ response.
pub const MAX_READ_LENGTH: u32 = 255 * 1024;

/// One SFTP subsystem channel. Owns the handle table for that channel.
pub struct SftpSession {
    id: SessionId,
    username: String,
    remote_address: Option<SocketAddr>,
    sandbox: Arc<PathSandbox>,
    handles: HandleTable,
    version: Option<u32>,
    released_tx: Option<oneshot::Sender<usize>>,
}

impl SftpSession {
    pub fn new(
        id: SessionId,
        username: String,
        remote_address: Option<SocketAddr>,
        sandbox: Arc<PathSandbox>,
    ) -> Self {
        Self {
            id,
            username,
            remote_address,
            sandbox,
            handles: HandleTable::default(),
            version: None,
            released_tx: None,
        }
    }

    /// Resolves with the number of handles released once the session is
    /// dropped and its leftover handles are closed.
    pub fn subscribe_release(&mut self) -> oneshot::Receiver<usize> {
        let (tx, rx) = oneshot::channel();
        self.released_tx = Some(tx);
        rx
    }

    pub fn make_logging_span(&self) -> tracing::Span {
        let client_ip = self.remote_address.map(|addr| addr.ip().to_string());
        info_span!("SFTP", session=%self.id, session_username=%self.username, client_ip=?client_ip)
    }

    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, SftpError> {
        self.sandbox
            .resolve(path)
            .ok_or_else(|| SftpError::OutsideRoot(path.to_owned()))
    }

    pub fn _init(&mut self, version: u32) -> Result<(), SftpError> {
        if self.version.is_some() {
            return Err(SftpError::DuplicateInit);
        }
        debug!(client_version = version, "SFTP session initialized");
        self.version = Some(version);
        Ok(())
    }

    pub async fn _open(&mut self, filename: &str, flags: OpenFlags) -> Result<String, SftpError> {
        let path = self.resolve(filename)?;

        let append = flags.contains(OpenFlags::APPEND);
        let create = flags.contains(OpenFlags::CREATE);
        let truncate = flags.contains(OpenFlags::TRUNCATE);
        let write = flags.contains(OpenFlags::WRITE) || append || create || truncate;
        let read = flags.contains(OpenFlags::READ) || !write;

        let mut options = OpenOptions::new();
        options.read(read).write(write).append(append);
        if create {
            if flags.contains(OpenFlags::EXCLUDE) {
                options.create_new(true);
            } else {
                options.create(true);
            }
        }
        if truncate && !append {
            options.truncate(true);
        }

        let file = options.open(&path).await?;
        debug!(?path, ?flags, "Opened file");
        let id = self
            .handles
            .allocate(HandleEntry::File(OpenFile { file, flags, path }));
        Ok(id.encode())
    }

    pub async fn _read(&mut self, handle: &str, offset: u64, len: u32) -> Result<Vec<u8>, SftpError> {
        let open = self.handles.lookup_file(handle)?;
        let len = len.min(MAX_READ_LENGTH);

        open.file.seek(SeekFrom::Start(offset)).await?;
        let mut data = Vec::with_capacity(len as usize);
        (&mut open.file)
            .take(u64::from(len))
            .read_to_end(&mut data)
            .await?;

        if data.is_empty() {
            return Err(SftpError::Eof);
        }
        Ok(data)
    }

    pub async fn _write(&mut self, handle: &str, offset: u64, data: &[u8]) -> Result<(), SftpError> {
        let open = self.handles.lookup_file(handle)?;
        open.file.seek(SeekFrom::Start(offset)).await?;
        open.file.write_all(data).await?;
        open.file.flush().await?;
        Ok(())
    }

    pub async fn _close(&mut self, handle: &str) -> Result<(), SftpError> {
        self.handles.release(handle).await
    }

    pub async fn _opendir(&mut self, path: &str) -> Result<String, SftpError> {
        let path = self.resolve(path)?;

        let mut names = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&path).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        debug!(?path, entries = names.len(), "Opened directory");
        let id = self
            .handles
            .allocate(HandleEntry::Directory(DirCursor::new(path, names)));
        Ok(id.encode())
    }

    pub async fn _readdir(&mut self, handle: &str) -> Result<Vec<NameEntry>, SftpError> {
        let cursor = self.handles.lookup_dir(handle)?;
        let dir = cursor.path.clone();
        let Some(batch) = cursor.next_batch(READDIR_BATCH_SIZE) else {
            return Err(SftpError::Eof);
        };

        let mut files = Vec::with_capacity(batch.len());
        for filename in batch {
            let entry = match tokio::fs::metadata(dir.join(&filename)).await {
                Ok(meta) => {
                    let attrs = FileAttrs::from_metadata(&meta);
                    NameEntry {
                        longname: long_name(&filename, &attrs),
                        filename,
                        attrs: attrs.into(),
                    }
                }
                Err(error) => {
                    debug!(%error, ?filename, "Could not stat directory entry");
                    NameEntry {
                        longname: filename.clone(),
                        filename,
                        attrs: FileAttrs::default().into(),
                    }
                }
            };
            files.push(entry);
        }
        Ok(files)
    }

    pub async fn _stat(&mut self, path: &str) -> Result<FileAttrs, SftpError> {
        let path = self.resolve(path)?;
        let meta = tokio::fs::metadata(&path).await?;
        Ok(FileAttrs::from_metadata(&meta))
    }

    pub async fn _lstat(&mut self, path: &str) -> Result<FileAttrs, SftpError> {
        let path = self.resolve(path)?;
        let meta = tokio::fs::symlink_metadata(&path).await?;
        Ok(FileAttrs::from_metadata(&meta))
    }

    pub async fn _fstat(&mut self, handle: &str) -> Result<FileAttrs, SftpError> {
        let meta = match self.handles.lookup(handle)? {
            HandleEntry::File(open) => open.file.metadata().await?,
            HandleEntry::Directory(cursor) => tokio::fs::metadata(&cursor.path).await?,
        };
        Ok(FileAttrs::from_metadata(&meta))
    }

    pub async fn _mkdir(&mut self, path: &str) -> Result<(), SftpError> {
        let path = self.resolve(path)?;
        tokio::fs::create_dir(&path).await?;
        info!(?path, "Created directory");
        Ok(())
    }

    pub async fn _rmdir(&mut self, path: &str) -> Result<(), SftpError> {
        let path = self.resolve(path)?;
        tokio::fs::remove_dir(&path).await?;
        info!(?path, "Removed directory");
        Ok(())
    }

    pub async fn _remove(&mut self, path: &str) -> Result<(), SftpError> {
        let path = self.resolve(path)?;
        tokio::fs::remove_file(&path).await?;
        info!(?path, "Removed file");
        Ok(())
    }

    pub async fn _rename(&mut self, old_path: &str, new_path: &str) -> Result<(), SftpError> {
        let from = self.resolve(old_path)?;
        let to = self.resolve(new_path)?;
        tokio::fs::rename(&from, &to).await?;
        info!(?from, ?to, "Renamed");
        Ok(())
    }

    /// Attribute changes are acknowledged and ignored.
    pub fn _setstat(&mut self, path: &str) -> Result<(), SftpError> {
        self.resolve(path)?;
        Ok(())
    }

    pub fn _fsetstat(&mut self, handle: &str) -> Result<(), SftpError> {
        self.handles.lookup(handle)?;
        Ok(())
    }

    pub fn _realpath(&self, path: &str) -> NameEntry {
        let normalized = normalize_virtual_path(path);
        NameEntry {
            filename: normalized.clone(),
            longname: normalized,
            attrs: Default::default(),
        }
    }
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        let entries = self.handles.take_all();
        let released_tx = self.released_tx.take();
        let notify = move |count: usize| {
            if let Some(tx) = released_tx {
                let _ = tx.send(count);
            }
        };
        let span = self.make_logging_span();
        if entries.is_empty() {
            span.in_scope(|| debug!("SFTP session closed"));
            notify(0);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(
                    async move {
                        let count = release_all(entries).await;
                        info!(count, "Released handles left open at session end");
                        notify(count);
                    }
                    .instrument(span),
                );
            }
            Err(_) => {
                let count = entries.len();
                span.in_scope(|| warn!(count, "No runtime, dropping open handles"));
                drop(entries);
                notify(count);
            }
        }
    }
}

impl std::fmt::Debug for SftpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SftpSession {{ id: {}, handles: {} }}", self.id, self.handles.len())
    }
}

#[cfg(test)]
mod tests {
    use russh_sftp::protocol::StatusCode;
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;

    fn setup() -> (TempDir, SftpSession) {
        let dir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        let session = SftpSession::new(
            Uuid::new_v4(),
            "user".into(),
            None,
            Arc::new(PathSandbox::new(root)),
        );
        (dir, session)
    }

    fn status<T>(result: Result<T, SftpError>) -> StatusCode {
        match result {
            Ok(_) => StatusCode::Ok,
            Err(error) => error.into(),
        }
    }

    #[tokio::test]
    async fn test_read_small_file() {
        let (dir, mut session) = setup();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();

        let handle = session._open("/a.txt", OpenFlags::READ).await.unwrap();
        assert_eq!(session._read(&handle, 0, 10).await.unwrap(), b"hi");
        assert_eq!(status(session._read(&handle, 2, 10).await), StatusCode::Eof);
        assert_eq!(status(session._read(&handle, 100, 10).await), StatusCode::Eof);
        session._close(&handle).await.unwrap();
        assert_eq!(session.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_read_is_capped() {
        let (dir, mut session) = setup();
        std::fs::write(dir.path().join("big"), vec![7u8; 300 * 1024]).unwrap();

        let handle = session._open("big", OpenFlags::READ).await.unwrap();
        let data = session._read(&handle, 0, u32::MAX).await.unwrap();
        assert_eq!(data.len(), MAX_READ_LENGTH as usize);
        let rest = session._read(&handle, u64::from(MAX_READ_LENGTH), u32::MAX).await.unwrap();
        assert_eq!(rest.len(), 300 * 1024 - MAX_READ_LENGTH as usize);
    }

    #[tokio::test]
    async fn test_write_then_read_back() {
        let (dir, mut session) = setup();

        let handle = session
            ._open("/out.bin", OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE)
            .await
            .unwrap();
        session._write(&handle, 0, b"hello").await.unwrap();
        session._write(&handle, 5, b" world").await.unwrap();
        session._close(&handle).await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("out.bin")).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_open_exclusive_existing_file_fails() {
        let (dir, mut session) = setup();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();

        let result = session
            ._open("/a.txt", OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::EXCLUDE)
            .await;
        assert_eq!(status(result), StatusCode::Failure);
        assert_eq!(session.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let (_dir, mut session) = setup();
        assert_eq!(
            status(session._open("/missing", OpenFlags::READ).await),
            StatusCode::NoSuchFile
        );
    }

    #[tokio::test]
    async fn test_empty_directory_listing() {
        let (_dir, mut session) = setup();

        let handle = session._opendir("/").await.unwrap();
        assert_eq!(status(session._readdir(&handle).await), StatusCode::Eof);
        session._close(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_directory_pagination() {
        let (dir, mut session) = setup();
        for i in 0..250 {
            std::fs::write(dir.path().join(format!("file{i:03}")), b"x").unwrap();
        }

        let handle = session._opendir("/").await.unwrap();
        let mut sizes = Vec::new();
        let mut names = std::collections::HashSet::new();
        loop {
            match session._readdir(&handle).await {
                Ok(batch) => {
                    sizes.push(batch.len());
                    for entry in batch {
                        assert_eq!(entry.attrs.size, Some(1));
                        assert!(entry.longname.ends_with(&entry.filename));
                        assert!(names.insert(entry.filename));
                    }
                }
                Err(error) => {
                    assert_eq!(StatusCode::from(error), StatusCode::Eof);
                    break;
                }
            }
        }
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(names.len(), 250);
    }

    #[tokio::test]
    async fn test_directory_snapshot_is_not_refreshed() {
        let (dir, mut session) = setup();
        std::fs::write(dir.path().join("a"), b"").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let handle = session._opendir("/").await.unwrap();
        std::fs::remove_file(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("b"), b"").unwrap();

        let batch = session._readdir(&handle).await.unwrap();
        let names: Vec<_> = batch.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["a", "sub"]);

        assert_eq!(batch[0].longname, "a");
        assert_eq!(batch[0].attrs.permissions, Some(0));
        assert!(batch[1].longname.starts_with('d'));
    }

    #[tokio::test]
    async fn test_stat_outside_root_is_denied() {
        let outer = tempfile::tempdir().unwrap();
        std::fs::write(outer.path().join("secret"), b"x").unwrap();
        let root = outer.path().join("root");
        std::fs::create_dir(&root).unwrap();
        let mut session = SftpSession::new(
            Uuid::new_v4(),
            "user".into(),
            None,
            Arc::new(PathSandbox::new(std::fs::canonicalize(&root).unwrap())),
        );

        for path in ["/../../etc/passwd", "../secret", "/../secret"] {
            assert_eq!(
                status(session._stat(path).await),
                StatusCode::PermissionDenied
            );
            assert_eq!(
                status(session._lstat(path).await),
                StatusCode::PermissionDenied
            );
        }
        assert_eq!(
            status(session._open("../secret", OpenFlags::READ).await),
            StatusCode::PermissionDenied
        );
        assert_eq!(
            status(session._remove("../secret").await),
            StatusCode::PermissionDenied
        );
        assert_eq!(
            status(session._mkdir("../escape").await),
            StatusCode::PermissionDenied
        );
        assert!(outer.path().join("secret").exists());
        assert!(!outer.path().join("escape").exists());
    }

    #[tokio::test]
    async fn test_rename() {
        let (dir, mut session) = setup();
        std::fs::write(dir.path().join("old.txt"), b"contents").unwrap();
        let before = session._stat("/old.txt").await.unwrap();

        session._rename("/old.txt", "/new.txt").await.unwrap();
        assert_eq!(
            status(session._stat("/old.txt").await),
            StatusCode::NoSuchFile
        );
        let after = session._stat("/new.txt").await.unwrap();
        assert_eq!(after.size, before.size);
        assert_eq!(after.mode, before.mode);
        assert_eq!(after.mtime, before.mtime);

        assert_eq!(
            status(session._rename("/new.txt", "/../new.txt").await),
            StatusCode::PermissionDenied
        );
        assert!(dir.path().join("new.txt").exists());
    }

    #[tokio::test]
    async fn test_directory_lifecycle() {
        let (dir, mut session) = setup();

        session._mkdir("/docs").await.unwrap();
        assert!(session._stat("/docs").await.unwrap().is_dir());
        assert_eq!(status(session._mkdir("/docs").await), StatusCode::Failure);

        std::fs::write(dir.path().join("docs/x"), b"").unwrap();
        assert_eq!(status(session._rmdir("/docs").await), StatusCode::Failure);
        session._remove("/docs/x").await.unwrap();
        session._rmdir("/docs").await.unwrap();
        assert_eq!(status(session._rmdir("/docs").await), StatusCode::NoSuchFile);
    }

    #[tokio::test]
    async fn test_wrong_handle_kind() {
        let (dir, mut session) = setup();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();

        let file = session._open("/a.txt", OpenFlags::READ).await.unwrap();
        let directory = session._opendir("/").await.unwrap();

        assert_eq!(status(session._read(&directory, 0, 10).await), StatusCode::Failure);
        assert_eq!(status(session._write(&directory, 0, b"x").await), StatusCode::Failure);
        assert_eq!(status(session._readdir(&file).await), StatusCode::Failure);
        assert_eq!(status(session._read("not-a-handle", 0, 10).await), StatusCode::Failure);
    }

    #[tokio::test]
    async fn test_handle_rejected_after_close() {
        let (dir, mut session) = setup();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();

        let handle = session._open("/a.txt", OpenFlags::READ).await.unwrap();
        session._close(&handle).await.unwrap();

        assert_eq!(status(session._close(&handle).await), StatusCode::Failure);
        assert_eq!(status(session._read(&handle, 0, 10).await), StatusCode::Failure);
        assert_eq!(status(session._fstat(&handle).await), StatusCode::Failure);
        assert_eq!(status(session._fsetstat(&handle)), StatusCode::Failure);

        let next = session._open("/a.txt", OpenFlags::READ).await.unwrap();
        assert_ne!(next, handle);
    }

    #[tokio::test]
    async fn test_fstat() {
        let (dir, mut session) = setup();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();

        let file = session._open("/a.txt", OpenFlags::READ).await.unwrap();
        assert_eq!(session._fstat(&file).await.unwrap().size, 2);

        let directory = session._opendir("/").await.unwrap();
        assert!(session._fstat(&directory).await.unwrap().is_dir());
        session._fsetstat(&directory).unwrap();
        session._fsetstat(&file).unwrap();
    }

    #[tokio::test]
    async fn test_setstat() {
        let (dir, mut session) = setup();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();

        session._setstat("/a.txt").unwrap();
        assert_eq!(
            status(session._setstat("/../a.txt")),
            StatusCode::PermissionDenied
        );
    }

    #[test]
    fn test_realpath() {
        let (_dir, session) = setup();
        assert_eq!(session._realpath(".").filename, "/");
        assert_eq!(session._realpath("").filename, "/");
        let entry = session._realpath("docs\\..\\a.txt");
        assert_eq!(entry.filename, "/a.txt");
        assert_eq!(entry.longname, "/a.txt");
    }

    #[test]
    fn test_duplicate_init() {
        let (_dir, mut session) = setup();
        session._init(3).unwrap();
        assert_eq!(status(session._init(3)), StatusCode::Failure);
    }

    #[tokio::test]
    async fn test_drop_releases_open_handles() {
        let (dir, mut session) = setup();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        let file = session
            ._open("/pending", OpenFlags::WRITE | OpenFlags::CREATE)
            .await
            .unwrap();
        session._write(&file, 0, b"data").await.unwrap();
        let closed = session._open("/a.txt", OpenFlags::READ).await.unwrap();
        session._close(&closed).await.unwrap();
        session._opendir("/").await.unwrap();

        let released = session.subscribe_release();
        drop(session);

        let count = tokio::time::timeout(std::time::Duration::from_secs(5), released)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(std::fs::read(dir.path().join("pending")).unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_drop_without_open_handles() {
        let (_dir, mut session) = setup();
        let released = session.subscribe_release();
        drop(session);
        assert_eq!(released.await.unwrap(), 0);
    }

    #[test]
    fn test_drop_outside_runtime() {
        let (dir, mut session) = setup();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        runtime.block_on(async {
            session._open("/a.txt", OpenFlags::READ).await.unwrap();
        });
        drop(runtime);

        let mut released = session.subscribe_release();
        drop(session);
        assert_eq!(released.try_recv().unwrap(), 1);
    }
}
