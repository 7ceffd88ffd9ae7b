// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Sequential and parallel data transfers. Parallel transfers follow the
//! 4.3 scheme: one primary descriptor establishes the replica and hands
//! out a replica-access token; sibling writers open with the token,
//! stream their byte range, and close without touching the catalog; the
//! primary close publishes size and status. Pre-4.3 servers fall back to
//! tokenless concurrent opens.

use std::{
    io::SeekFrom,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use bytes::Bytes;
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cfg::config::FsConfig,
    client::session::{PooledConnection, Session},
    error::{IrodsError, Result},
    handlers::{data_object, transfer},
    models::{
        descriptor::DescriptorInfo,
        types::{FileOpenMode, Whence},
    },
};

/// `(bytes_done, bytes_total)`, invoked at least once per chunk boundary.
/// Only the global count is monotonic; per-task accounting can move
/// backwards when a task retries.
pub type ProgressCallback = Arc<dyn Fn(i64, i64) + Send + Sync>;

fn report(progress: Option<&ProgressCallback>, done: i64, total: i64) {
    if let Some(cb) = progress {
        cb(done, total);
    }
}

/// Task count derived from the transfer size: one task below 4 MiB, then
/// one per 32 MiB, capped.
pub(crate) fn default_task_count(size: i64, max_tasks: u32) -> u32 {
    const SINGLE_TASK_LIMIT: i64 = 4 * 1024 * 1024;
    const BYTES_PER_TASK: i64 = 32 * 1024 * 1024;

    if size <= SINGLE_TASK_LIMIT {
        return 1;
    }
    (((size + BYTES_PER_TASK - 1) / BYTES_PER_TASK) as u32).clamp(2, max_tasks.max(1))
}

async fn task_connection(
    session: &Arc<Session>,
    redirect: Option<&str>,
) -> Result<PooledConnection> {
    match redirect {
        Some(host) => {
            let port = session.account().port;
            session.connect_redirected(host, port).await
        }
        None => session.acquire_connection().await,
    }
}

fn local_io(action: &'static str) -> impl FnOnce(std::io::Error) -> IrodsError {
    move |e| IrodsError::transport(action, e)
}

// ── sequential transfers ────────────────────────────────────────────────

pub(crate) async fn upload_sequential(
    session: &Arc<Session>,
    config: &FsConfig,
    local_path: &Path,
    dest_path: &str,
    resource: &str,
    overwrite: bool,
    redirect: Option<&str>,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    let total = tokio::fs::metadata(local_path)
        .await
        .map_err(local_io("stat local file"))?
        .len() as i64;
    let mut file = File::open(local_path)
        .await
        .map_err(local_io("open local file"))?;

    let conn = task_connection(session, redirect).await?;
    let descriptor = data_object::create_data_object(&conn, dest_path, resource, overwrite).await?;

    let result = async {
        let mut buf = vec![0u8; config.transfer_chunk_size];
        let mut done: i64 = 0;
        loop {
            let n = file.read(&mut buf).await.map_err(local_io("read local file"))?;
            if n == 0 {
                break;
            }
            data_object::write_data_object(&conn, descriptor, Bytes::copy_from_slice(&buf[..n]))
                .await?;
            done += n as i64;
            report(progress, done, total);
        }
        Ok(())
    }
    .await;

    let close_result = data_object::close_data_object(&conn, descriptor).await;
    conn.release().await;
    result.and(close_result)
}

pub(crate) async fn download_sequential(
    session: &Arc<Session>,
    config: &FsConfig,
    src_path: &str,
    resource: &str,
    local_path: &Path,
    total: i64,
    redirect: Option<&str>,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    let conn = task_connection(session, redirect).await?;
    let descriptor =
        data_object::open_data_object(&conn, src_path, resource, FileOpenMode::ReadOnly).await?;

    let result = async {
        let mut file = File::create(local_path)
            .await
            .map_err(local_io("create local file"))?;
        let mut done: i64 = 0;
        loop {
            let chunk =
                data_object::read_data_object(&conn, descriptor, config.transfer_chunk_size as i32)
                    .await?;
            if chunk.is_empty() {
                break;
            }
            file.write_all(&chunk).await.map_err(local_io("write local file"))?;
            done += chunk.len() as i64;
            report(progress, done, total);
        }
        file.flush().await.map_err(local_io("flush local file"))?;
        report(progress, done, total);
        Ok(())
    }
    .await;

    let close_result = data_object::close_data_object(&conn, descriptor).await;
    conn.release().await;
    result.and(close_result)
}

// ── parallel upload ─────────────────────────────────────────────────────

fn partition(total: i64, tasks: u32) -> Vec<(i64, i64)> {
    let tasks = tasks.max(1) as i64;
    let base = total / tasks;
    let remainder = total % tasks;

    let mut ranges = Vec::with_capacity(tasks as usize);
    let mut start = 0;
    for index in 0..tasks {
        let len = base + i64::from(index < remainder);
        if len > 0 {
            ranges.push((start, len));
            start += len;
        }
    }
    ranges
}

struct TaskShared {
    session: Arc<Session>,
    redirect: Option<String>,
    remote_path: String,
    local_path: PathBuf,
    token: Option<DescriptorInfo>,
    chunk_size: usize,
    retry: u32,
    cancel: CancellationToken,
    done: Arc<AtomicI64>,
    total: i64,
    progress: Option<ProgressCallback>,
}

pub(crate) async fn upload_parallel(
    session: &Arc<Session>,
    config: &FsConfig,
    local_path: &Path,
    dest_path: &str,
    resource: &str,
    tasks: u32,
    overwrite: bool,
    redirect: Option<&str>,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    let total = tokio::fs::metadata(local_path)
        .await
        .map_err(local_io("stat local file"))?
        .len() as i64;

    let task_count = if tasks == 0 {
        default_task_count(total, config.max_parallel_transfer_tasks)
    } else {
        tasks.min(config.max_parallel_transfer_tasks.max(1))
    };

    if task_count <= 1 || total == 0 {
        return upload_sequential(
            session, config, local_path, dest_path, resource, overwrite, redirect, progress,
        )
        .await;
    }

    // The primary descriptor establishes the replica and (on 4.3) the
    // shared token; it stays open until every sibling finished.
    let primary = task_connection(session, redirect).await?;
    let primary_fd = data_object::create_data_object(&primary, dest_path, resource, overwrite).await?;

    let token = if primary.version().is_some_and(|v| v.supports_replica_token()) {
        match transfer::get_descriptor_info(&primary, primary_fd).await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!("descriptor info unavailable, falling back to tokenless opens: {e}");
                None
            }
        }
    } else {
        None
    };

    let shared = Arc::new(TaskShared {
        session: session.clone(),
        redirect: redirect.map(str::to_string),
        remote_path: dest_path.to_string(),
        local_path: local_path.to_path_buf(),
        token,
        chunk_size: config.transfer_chunk_size,
        retry: config.transfer_task_retry,
        cancel: CancellationToken::new(),
        done: Arc::new(AtomicI64::new(0)),
        total,
        progress: progress.cloned(),
    });

    debug!("parallel upload of {dest_path}: {total} bytes over {task_count} tasks");

    let mut set = JoinSet::new();
    for (start, len) in partition(total, task_count) {
        let shared = shared.clone();
        set.spawn(async move { upload_task(shared, start, len).await });
    }

    let mut first_error: Option<IrodsError> = None;
    while let Some(joined) = set.join_next().await {
        let task_result = joined
            .unwrap_or_else(|e| Err(IrodsError::protocol("transfer task", e.to_string())));
        if let Err(e) = task_result {
            shared.cancel.cancel();
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }

    // Primary close publishes size and status in the catalog.
    let close_result = data_object::close_data_object(&primary, primary_fd).await;
    primary.release().await;

    match first_error {
        Some(e) => Err(e),
        None => {
            close_result?;
            report(progress, total, total);
            Ok(())
        }
    }
}

async fn upload_task(shared: Arc<TaskShared>, start: i64, len: i64) -> Result<()> {
    let mut attempt = 0;
    loop {
        if shared.cancel.is_cancelled() {
            return Ok(());
        }
        match upload_range_once(&shared, start, len).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() && attempt < shared.retry => {
                attempt += 1;
                warn!("retrying upload range at {start} (attempt {attempt}): {e}");
            }
            Err(e) => {
                shared.cancel.cancel();
                return Err(e);
            }
        }
    }
}

async fn upload_range_once(shared: &TaskShared, start: i64, len: i64) -> Result<()> {
    let mut file = File::open(&shared.local_path)
        .await
        .map_err(local_io("open local file"))?;
    file.seek(SeekFrom::Start(start as u64))
        .await
        .map_err(local_io("seek local file"))?;

    // The primary already created the replica; siblings open it without
    // truncating it.
    let conn = task_connection(&shared.session, shared.redirect.as_deref()).await?;
    let descriptor = match &shared.token {
        Some(info) => {
            let inp = transfer::sibling_open_request(
                &shared.remote_path,
                FileOpenMode::ReadWrite,
                info,
            );
            data_object::open_data_object_with(&conn, &inp).await?
        }
        None => {
            data_object::open_data_object(&conn, &shared.remote_path, "", FileOpenMode::ReadWrite)
                .await?
        }
    };

    let mut written: i64 = 0;
    let body = async {
        data_object::seek_data_object(&conn, descriptor, start, Whence::SeekSet).await?;
        let mut remaining = len;
        let mut buf = vec![0u8; shared.chunk_size];
        while remaining > 0 {
            if shared.cancel.is_cancelled() {
                break;
            }
            let want = (remaining as usize).min(shared.chunk_size);
            file.read_exact(&mut buf[..want])
                .await
                .map_err(local_io("read local file"))?;
            data_object::write_data_object(&conn, descriptor, Bytes::copy_from_slice(&buf[..want]))
                .await?;
            written += want as i64;
            remaining -= want as i64;
            let done = shared.done.fetch_add(want as i64, Ordering::SeqCst) + want as i64;
            report(shared.progress.as_ref(), done, shared.total);
        }
        Ok(())
    }
    .await;

    // Sibling descriptors must not update the catalog; that is the
    // primary descriptor's close.
    let close_result = match &shared.token {
        Some(_) => transfer::close_replica(&conn, descriptor, false).await,
        None => data_object::close_data_object(&conn, descriptor).await,
    };
    conn.release().await;

    if let Err(e) = &body {
        shared.done.fetch_sub(written, Ordering::SeqCst);
        debug!("upload range at {start} failed after {written} bytes: {e}");
    }
    body.and(close_result)
}

// ── parallel download ───────────────────────────────────────────────────

pub(crate) async fn download_parallel(
    session: &Arc<Session>,
    config: &FsConfig,
    src_path: &str,
    resource: &str,
    local_path: &Path,
    total: i64,
    tasks: u32,
    redirect: Option<&str>,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    let task_count = if tasks == 0 {
        default_task_count(total, config.max_parallel_transfer_tasks)
    } else {
        tasks.min(config.max_parallel_transfer_tasks.max(1))
    };

    if task_count <= 1 || total == 0 {
        return download_sequential(
            session, config, src_path, resource, local_path, total, redirect, progress,
        )
        .await;
    }

    let file = File::create(local_path)
        .await
        .map_err(local_io("create local file"))?;
    file.set_len(total as u64)
        .await
        .map_err(local_io("allocate local file"))?;
    drop(file);

    let shared = Arc::new(TaskShared {
        session: session.clone(),
        redirect: redirect.map(str::to_string),
        remote_path: src_path.to_string(),
        local_path: local_path.to_path_buf(),
        token: None,
        chunk_size: config.transfer_chunk_size,
        retry: config.transfer_task_retry,
        cancel: CancellationToken::new(),
        done: Arc::new(AtomicI64::new(0)),
        total,
        progress: progress.cloned(),
    });

    debug!("parallel download of {src_path}: {total} bytes over {task_count} tasks");

    let mut set = JoinSet::new();
    for (start, len) in partition(total, task_count) {
        let shared = shared.clone();
        set.spawn(async move { download_task(shared, start, len).await });
    }

    let mut first_error: Option<IrodsError> = None;
    while let Some(joined) = set.join_next().await {
        let task_result = joined
            .unwrap_or_else(|e| Err(IrodsError::protocol("transfer task", e.to_string())));
        if let Err(e) = task_result {
            shared.cancel.cancel();
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            report(progress, total, total);
            Ok(())
        }
    }
}

async fn download_task(shared: Arc<TaskShared>, start: i64, len: i64) -> Result<()> {
    let mut attempt = 0;
    loop {
        if shared.cancel.is_cancelled() {
            return Ok(());
        }
        match download_range_once(&shared, start, len).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() && attempt < shared.retry => {
                attempt += 1;
                warn!("retrying download range at {start} (attempt {attempt}): {e}");
            }
            Err(e) => {
                shared.cancel.cancel();
                return Err(e);
            }
        }
    }
}

async fn download_range_once(shared: &TaskShared, start: i64, len: i64) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(&shared.local_path)
        .await
        .map_err(local_io("open local file"))?;
    file.seek(SeekFrom::Start(start as u64))
        .await
        .map_err(local_io("seek local file"))?;

    let conn = task_connection(&shared.session, shared.redirect.as_deref()).await?;
    let descriptor =
        data_object::open_data_object(&conn, &shared.remote_path, "", FileOpenMode::ReadOnly)
            .await?;

    let mut written: i64 = 0;
    let body = async {
        data_object::seek_data_object(&conn, descriptor, start, Whence::SeekSet).await?;
        let mut remaining = len;
        while remaining > 0 {
            if shared.cancel.is_cancelled() {
                break;
            }
            let want = (remaining as usize).min(shared.chunk_size) as i32;
            let chunk = data_object::read_data_object(&conn, descriptor, want).await?;
            if chunk.is_empty() {
                return Err(IrodsError::protocol(
                    "parallel download",
                    format!("server returned no data with {remaining} bytes outstanding"),
                ));
            }
            file.write_all(&chunk).await.map_err(local_io("write local file"))?;
            written += chunk.len() as i64;
            remaining -= chunk.len() as i64;
            let done = shared.done.fetch_add(chunk.len() as i64, Ordering::SeqCst)
                + chunk.len() as i64;
            report(shared.progress.as_ref(), done, shared.total);
        }
        file.flush().await.map_err(local_io("flush local file"))
    }
    .await;

    let close_result = data_object::close_data_object(&conn, descriptor).await;
    conn.release().await;

    if let Err(e) = &body {
        shared.done.fetch_sub(written, Ordering::SeqCst);
        debug!("download range at {start} failed after {written} bytes: {e}");
    }
    body.and(close_result)
}
