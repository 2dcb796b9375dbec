use std::collections::HashMap;

use russh_sftp::protocol::{
    Attrs, Data, FileAttributes, Handle, Name, OpenFlags, Status, StatusCode, Version,
};
use tracing::*;

use super::session::SftpSession;
use super::status::{observe, ok_status, SftpError};

impl russh_sftp::server::Handler for SftpSession {
    type Error = StatusCode;

    fn unimplemented(&self) -> Self::Error {
        let span = self.make_logging_span();
        span.in_scope(|| debug!("Unsupported request"));
        StatusCode::from(SftpError::Unsupported)
    }

    async fn init(
        &mut self,
        version: u32,
        _extensions: HashMap<String, String>,
    ) -> Result<Version, Self::Error> {
        let span = self.make_logging_span();
        span.in_scope(|| observe("init", self._init(version)))?;
        Ok(Version::new())
    }

    async fn open(
        &mut self,
        id: u32,
        filename: String,
        pflags: OpenFlags,
        _attrs: FileAttributes,
    ) -> Result<Handle, Self::Error> {
        let span = self.make_logging_span();
        let handle = async { observe("open", self._open(&filename, pflags).await) }
            .instrument(span)
            .await?;
        Ok(Handle { id, handle })
    }

    async fn close(&mut self, id: u32, handle: String) -> Result<Status, Self::Error> {
        let span = self.make_logging_span();
        async { observe("close", self._close(&handle).await) }
            .instrument(span)
            .await?;
        Ok(ok_status(id))
    }

    async fn read(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        len: u32,
    ) -> Result<Data, Self::Error> {
        let span = self.make_logging_span();
        let data = async { observe("read", self._read(&handle, offset, len).await) }
            .instrument(span)
            .await?;
        Ok(Data { id, data })
    }

    async fn write(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<Status, Self::Error> {
        let span = self.make_logging_span();
        async { observe("write", self._write(&handle, offset, &data).await) }
            .instrument(span)
            .await?;
        Ok(ok_status(id))
    }

    async fn lstat(&mut self, id: u32, path: String) -> Result<Attrs, Self::Error> {
        let span = self.make_logging_span();
        let attrs = async { observe("lstat", self._lstat(&path).await) }
            .instrument(span)
            .await?;
        Ok(Attrs {
            id,
            attrs: attrs.into(),
        })
    }

    async fn fstat(&mut self, id: u32, handle: String) -> Result<Attrs, Self::Error> {
        let span = self.make_logging_span();
        let attrs = async { observe("fstat", self._fstat(&handle).await) }
            .instrument(span)
            .await?;
        Ok(Attrs {
            id,
            attrs: attrs.into(),
        })
    }

    async fn setstat(
        &mut self,
        id: u32,
        path: String,
        _attrs: FileAttributes,
    ) -> Result<Status, Self::Error> {
        let span = self.make_logging_span();
        span.in_scope(|| observe("setstat", self._setstat(&path)))?;
        Ok(ok_status(id))
    }

    async fn fsetstat(
        &mut self,
        id: u32,
        handle: String,
        _attrs: FileAttributes,
    ) -> Result<Status, Self::Error> {
        let span = self.make_logging_span();
        span.in_scope(|| observe("fsetstat", self._fsetstat(&handle)))?;
        Ok(ok_status(id))
    }

    async fn opendir(&mut self, id: u32, path: String) -> Result<Handle, Self::Error> {
        let span = self.make_logging_span();
        let handle = async { observe("opendir", self._opendir(&path).await) }
            .instrument(span)
            .await?;
        Ok(Handle { id, handle })
    }

    async fn readdir(&mut self, id: u32, handle: String) -> Result<Name, Self::Error> {
        let span = self.make_logging_span();
        let files = async { observe("readdir", self._readdir(&handle).await) }
            .instrument(span)
            .await?;
        Ok(Name { id, files })
    }

    async fn remove(&mut self, id: u32, filename: String) -> Result<Status, Self::Error> {
        let span = self.make_logging_span();
        async { observe("remove", self._remove(&filename).await) }
            .instrument(span)
            .await?;
        Ok(ok_status(id))
    }

    async fn mkdir(
        &mut self,
        id: u32,
        path: String,
        _attrs: FileAttributes,
    ) -> Result<Status, Self::Error> {
        let span = self.make_logging_span();
        async { observe("mkdir", self._mkdir(&path).await) }
            .instrument(span)
            .await?;
        Ok(ok_status(id))
    }

    async fn rmdir(&mut self, id: u32, path: String) -> Result<Status, Self::Error> {
        let span = self.make_logging_span();
        async { observe("rmdir", self._rmdir(&path).await) }
            .instrument(span)
            .await?;
        Ok(ok_status(id))
    }

    async fn realpath(&mut self, id: u32, path: String) -> Result<Name, Self::Error> {
        Ok(Name {
            id,
            files: vec![self._realpath(&path)],
        })
    }

    async fn stat(&mut self, id: u32, path: String) -> Result<Attrs, Self::Error> {
        let span = self.make_logging_span();
        let attrs = async { observe("stat", self._stat(&path).await) }
            .instrument(span)
            .await?;
        Ok(Attrs {
            id,
            attrs: attrs.into(),
        })
    }

    async fn rename(
        &mut self,
        id: u32,
        oldpath: String,
        newpath: String,
    ) -> Result<Status, Self::Error> {
        let span = self.make_logging_span();
        async { observe("rename", self._rename(&oldpath, &newpath).await) }
            .instrument(span)
            .await?;
        Ok(ok_status(id))
    }
}
