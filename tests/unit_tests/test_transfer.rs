// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Result;
use bytes::Bytes;
use irods_client_rs::{
    client::session::Session,
    error::IrodsError,
    fs::{FileSystem, ProgressCallback},
    models::{
        api,
        types::{FileOpenMode, Whence},
    },
    utils,
};

use crate::unit_tests::common::{HOME, MockServer};

async fn filesystem(server: &MockServer) -> Result<FileSystem> {
    let session = Session::new(server.account(), server.session_config()).await?;
    Ok(FileSystem::new(session, server.fs_config()))
}

fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("irods-client-rs-{}-{name}", std::process::id()))
}

/// Deterministic but non-repeating content.
fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

#[tokio::test]
async fn test_upload_download_round_trip() -> Result<()> {
    let server = MockServer::start().await?;
    let fs = filesystem(&server).await?;

    let local = scratch_path("up-small.bin");
    let content = patterned(700 * 1024);
    tokio::fs::write(&local, &content).await?;

    let remote = format!("{HOME}/small.bin");
    fs.upload_file(&local, &remote, "", false, None).await?;
    assert_eq!(server.state.file_content(&remote), Some(content.clone()));
    assert_eq!(fs.stat(&remote).await?.size, content.len() as i64);

    let back = scratch_path("down-small.bin");
    fs.download_file(&remote, "", &back, None).await?;
    assert_eq!(
        utils::md5_hex_of_file(&local).await?,
        utils::md5_hex_of_file(&back).await?
    );

    tokio::fs::remove_file(&local).await.ok();
    tokio::fs::remove_file(&back).await.ok();
    fs.release().await;
    Ok(())
}

#[tokio::test]
async fn test_upload_without_overwrite_fails_on_existing() -> Result<()> {
    let server = MockServer::start().await?;
    server.state.seed_file(&format!("{HOME}/taken.bin"), vec![1]);
    let fs = filesystem(&server).await?;

    let local = scratch_path("up-conflict.bin");
    tokio::fs::write(&local, b"contents").await?;

    match fs
        .upload_file(&local, &format!("{HOME}/taken.bin"), "", false, None)
        .await
    {
        Err(IrodsError::AlreadyExists { .. }) => {}
        other => panic!("expected AlreadyExists, got {other:?}"),
    }

    // with overwrite it goes through
    fs.upload_file(&local, &format!("{HOME}/taken.bin"), "", true, None)
        .await?;
    assert_eq!(
        server.state.file_content(&format!("{HOME}/taken.bin")),
        Some(b"contents".to_vec())
    );

    tokio::fs::remove_file(&local).await.ok();
    fs.release().await;
    Ok(())
}

#[tokio::test]
async fn test_parallel_upload_round_trip_with_progress() -> Result<()> {
    let server = MockServer::start().await?;
    let fs = filesystem(&server).await?;

    // 10 MiB over 256 KiB chunks: plenty of progress callbacks
    let local = scratch_path("up-large.bin");
    let content = patterned(10 * 1024 * 1024);
    tokio::fs::write(&local, &content).await?;

    let calls = Arc::new(AtomicU64::new(0));
    let calls_in_cb = calls.clone();
    let total_len = content.len() as i64;
    let progress: ProgressCallback = Arc::new(move |done, total| {
        calls_in_cb.fetch_add(1, Ordering::SeqCst);
        assert!(done <= total);
        assert_eq!(total, total_len);
    });

    let remote = format!("{HOME}/large.bin");
    fs.upload_file_parallel(&local, &remote, "", 3, false, Some(progress.clone()))
        .await?;

    assert!(
        calls.load(Ordering::SeqCst) >= 10,
        "expected at least 10 progress callbacks, got {}",
        calls.load(Ordering::SeqCst)
    );
    assert_eq!(server.state.file_content(&remote), Some(content.clone()));

    // the replica-token handshake must have run against a 4.3 server
    assert!(server.state.api_calls(api::GET_FILE_DESCRIPTOR_INFO_APN) >= 1);
    assert!(server.state.api_calls(api::REPLICA_CLOSE_APN) >= 1);

    // checksum comparison through a parallel download
    let back = scratch_path("down-large.bin");
    fs.download_file_from_resource_server(&remote, "", &back, Some(progress))
        .await?;
    assert_eq!(
        utils::md5_hex_of_file(&local).await?,
        utils::md5_hex_of_file(&back).await?
    );

    tokio::fs::remove_file(&local).await.ok();
    tokio::fs::remove_file(&back).await.ok();
    fs.release().await;
    Ok(())
}

#[tokio::test]
async fn test_open_file_read_write_seek() -> Result<()> {
    let server = MockServer::start().await?;
    server
        .state
        .seed_file(&format!("{HOME}/rw.bin"), patterned(4096));
    let fs = filesystem(&server).await?;

    let path = format!("{HOME}/rw.bin");
    let mut handle = fs.open_file(&path, "", FileOpenMode::ReadWrite).await?;

    let head = handle.read(16).await?;
    assert_eq!(head, Bytes::from(patterned(16)));
    assert_eq!(handle.offset(), 16);

    let pos = handle.seek(1024, Whence::SeekSet).await?;
    assert_eq!(pos, 1024);
    handle.write(Bytes::from_static(b"overwrite")).await?;
    assert_eq!(handle.offset(), 1024 + 9);

    fs.close_file(handle).await?;

    let content = server.state.file_content(&path).expect("file exists");
    assert_eq!(&content[1024..1033], b"overwrite");

    // write-visibility: the entry cache was invalidated by the close
    let entry = fs.stat(&path).await?;
    assert_eq!(entry.size, 4096);

    fs.release().await;
    Ok(())
}

#[tokio::test]
async fn test_open_file_append_seeks_to_end() -> Result<()> {
    let server = MockServer::start().await?;
    server.state.seed_file(&format!("{HOME}/log.txt"), b"line1\n".to_vec());
    let fs = filesystem(&server).await?;

    let path = format!("{HOME}/log.txt");
    let mut handle = fs.open_file(&path, "", FileOpenMode::Append).await?;
    assert_eq!(handle.offset(), 6);
    handle.write(Bytes::from_static(b"line2\n")).await?;
    fs.close_file(handle).await?;

    assert_eq!(
        server.state.file_content(&path),
        Some(b"line1\nline2\n".to_vec())
    );

    fs.release().await;
    Ok(())
}

#[tokio::test]
async fn test_open_missing_file_for_read_fails() -> Result<()> {
    let server = MockServer::start().await?;
    let fs = filesystem(&server).await?;

    match fs
        .open_file(&format!("{HOME}/ghost.bin"), "", FileOpenMode::ReadOnly)
        .await
    {
        Err(IrodsError::NotFound { .. }) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }

    fs.release().await;
    Ok(())
}

#[tokio::test]
async fn test_open_file_posix_w_plus_truncates_and_reads() -> Result<()> {
    let server = MockServer::start().await?;
    let path = format!("{HOME}/scratch.bin");
    server.state.seed_file(&path, patterned(2048));
    let fs = filesystem(&server).await?;

    let mut handle = fs.open_file_posix(&path, "", "w+").await?;
    assert_eq!(handle.mode(), FileOpenMode::ReadWriteTruncate);
    handle.write(Bytes::from_static(b"fresh")).await?;
    handle.seek(0, Whence::SeekSet).await?;
    let back = handle.read(16).await?;
    assert_eq!(back, Bytes::from_static(b"fresh"));
    fs.close_file(handle).await?;

    // the old 2 KiB body is gone
    assert_eq!(server.state.file_content(&path), Some(b"fresh".to_vec()));

    fs.release().await;
    Ok(())
}

#[tokio::test]
async fn test_open_file_posix_a_plus_reads_and_appends() -> Result<()> {
    let server = MockServer::start().await?;
    let path = format!("{HOME}/log2.txt");
    server.state.seed_file(&path, b"one\n".to_vec());
    let fs = filesystem(&server).await?;

    let mut handle = fs.open_file_posix(&path, "", "a+").await?;
    assert_eq!(handle.offset(), 4);
    handle.write(Bytes::from_static(b"two\n")).await?;
    handle.seek(0, Whence::SeekSet).await?;
    let back = handle.read(32).await?;
    assert_eq!(back, Bytes::from_static(b"one\ntwo\n"));
    fs.close_file(handle).await?;

    fs.release().await;
    Ok(())
}

#[tokio::test]
async fn test_open_file_posix_rejects_unknown_mode() -> Result<()> {
    let server = MockServer::start().await?;
    let fs = filesystem(&server).await?;

    match fs.open_file_posix(&format!("{HOME}/x"), "", "rw").await {
        Err(IrodsError::Protocol { .. }) => {}
        other => panic!("expected protocol error for bad mode, got {other:?}"),
    }

    fs.release().await;
    Ok(())
}

#[test]
fn test_open_mode_flags_match_posix() {
    use irods_client_rs::models::types::open_flags::*;

    let table = [
        ("r", O_RDONLY),
        ("r+", O_RDWR),
        ("w", O_WRONLY | O_CREAT | O_TRUNC),
        ("w+", O_RDWR | O_CREAT | O_TRUNC),
        ("a", O_WRONLY | O_CREAT | O_APPEND),
        ("a+", O_RDWR | O_CREAT | O_APPEND),
    ];
    for (mode, flags) in table {
        let parsed = FileOpenMode::from_posix(mode).expect("known mode");
        assert_eq!(parsed.flags(), flags, "flags for {mode:?}");
    }
    assert!(FileOpenMode::from_posix("x").is_none());
}
