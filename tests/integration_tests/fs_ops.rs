// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use anyhow::Result;
use irods_client_rs::{
    cfg::config::FsConfig,
    client::session::Session,
    fs::{FileSystem, ProgressCallback},
    models::types::{AccessLevel, EntryKind},
    utils,
};
use serial_test::serial;

use crate::integration_tests::common::{home_dir, test_account, test_session_config, unique_name};

#[tokio::test]
#[serial]
async fn test_dir_and_metadata_lifecycle_live() -> Result<()> {
    let Some(account) = test_account()? else {
        return Ok(());
    };
    let home = home_dir(&account);
    let session = Session::new(account, test_session_config()).await?;
    let fs = FileSystem::new(session, FsConfig::default());

    let dir = format!("{home}/{}/a/b", unique_name("it-mkdir"));
    fs.make_dir(&dir, true).await?;
    assert!(fs.exists_dir(&dir).await?);
    assert_eq!(fs.stat(&dir).await?.kind, EntryKind::Directory);

    fs.add_metadata(&dir, "purpose", "integration", "").await?;
    let metas = fs.list_metadata(&dir).await?;
    assert!(metas.iter().any(|m| m.attribute == "purpose"));
    fs.delete_metadata(&dir, "purpose", "integration", "").await?;

    let acls = fs.list_acls(&home).await?;
    assert!(acls.iter().any(|a| a.access_level == AccessLevel::Own));

    let root = utils::dirname(&utils::dirname(&dir));
    fs.remove_dir(&root, true, true).await?;
    assert!(!fs.exists_dir(&dir).await?);

    fs.release().await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_parallel_transfer_live() -> Result<()> {
    let Some(account) = test_account()? else {
        return Ok(());
    };
    let home = home_dir(&account);
    let session = Session::new(account, test_session_config()).await?;
    let fs = FileSystem::new(session, FsConfig::default());

    let local = std::env::temp_dir().join(unique_name("it-up"));
    let content: Vec<u8> = (0..8 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    tokio::fs::write(&local, &content).await?;

    let calls = Arc::new(AtomicU64::new(0));
    let calls_in_cb = calls.clone();
    let progress: ProgressCallback = Arc::new(move |_, _| {
        calls_in_cb.fetch_add(1, Ordering::SeqCst);
    });

    let remote = format!("{home}/{}", unique_name("it-large"));
    fs.upload_file_parallel(&local, &remote, "", 0, false, Some(progress.clone()))
        .await?;
    assert_eq!(fs.stat(&remote).await?.size, content.len() as i64);
    assert!(calls.load(Ordering::SeqCst) > 0);

    let back = std::env::temp_dir().join(unique_name("it-down"));
    fs.download_file_from_resource_server(&remote, "", &back, Some(progress))
        .await?;
    assert_eq!(
        utils::md5_hex_of_file(&local).await?,
        utils::md5_hex_of_file(&back).await?
    );

    fs.remove_file(&remote, true).await?;
    tokio::fs::remove_file(&local).await.ok();
    tokio::fs::remove_file(&back).await.ok();

    fs.release().await;
    Ok(())
}
