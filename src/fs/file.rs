// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;
use tracing::debug;

use crate::{
    client::session::PooledConnection,
    error::{IrodsError, Result},
    handlers::data_object,
    models::types::{FileOpenMode, Whence},
};

/// An open data object. The handle owns the pooled connection it was
/// opened on for its whole lifetime, so it can never outlive the
/// descriptor's connection; closing returns the connection to the pool.
#[derive(Debug)]
pub struct FileHandle {
    pub(crate) conn: PooledConnection,
    pub(crate) descriptor: i32,
    pub(crate) path: String,
    pub(crate) mode: FileOpenMode,
    pub(crate) offset: i64,
    pub(crate) dirty: bool,
    closed: bool,
}

impl FileHandle {
    pub(crate) fn new(
        conn: PooledConnection,
        descriptor: i32,
        path: String,
        mode: FileOpenMode,
        offset: i64,
    ) -> Self {
        Self {
            conn,
            descriptor,
            path,
            mode,
            offset,
            dirty: false,
            closed: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> FileOpenMode {
        self.mode
    }

    /// Current offset, mirrored locally after every seek/read/write.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub async fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64> {
        let new_offset =
            data_object::seek_data_object(&self.conn, self.descriptor, offset, whence).await?;
        self.offset = new_offset;
        Ok(new_offset)
    }

    /// Reads up to `length` bytes from the current offset.
    pub async fn read(&mut self, length: usize) -> Result<Bytes> {
        if !self.mode.allows_read() {
            return Err(IrodsError::protocol("read", "handle not open for reading"));
        }
        let data =
            data_object::read_data_object(&self.conn, self.descriptor, length as i32).await?;
        self.offset += data.len() as i64;
        Ok(data)
    }

    /// Writes the whole buffer at the current offset.
    pub async fn write(&mut self, data: Bytes) -> Result<()> {
        if !self.mode.allows_write() {
            return Err(IrodsError::protocol("write", "handle not open for writing"));
        }
        let len = data.len() as i64;
        data_object::write_data_object(&self.conn, self.descriptor, data).await?;
        self.offset += len;
        self.dirty = true;
        Ok(())
    }

    /// Closes the descriptor and hands the connection back to the pool.
    /// Returns whether the handle wrote anything, so the caller can
    /// invalidate caches.
    pub async fn close(mut self) -> Result<bool> {
        self.closed = true;
        let dirty = self.dirty;
        data_object::close_data_object(&self.conn, self.descriptor).await?;
        debug!("closed {} (descriptor {})", self.path, self.descriptor);
        Ok(dirty)
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // A leaked descriptor cannot be closed synchronously; poison the
        // connection so the pool discards it instead of re-issuing it
        // with the descriptor still open server-side.
        self.conn.poison();
    }
}
