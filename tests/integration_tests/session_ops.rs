// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use irods_client_rs::client::session::Session;

use crate::integration_tests::common::{home_dir, test_account, test_session_config};

#[tokio::test]
async fn test_session_against_live_server() -> Result<()> {
    let Some(account) = test_account()? else {
        return Ok(());
    };
    let home = home_dir(&account);

    let session = Session::new(account, test_session_config()).await?;

    let conn = session.acquire_connection().await?;
    let version = conn.version().cloned().expect("version");
    assert!(version.release_version.starts_with("rods"));

    let coll = irods_client_rs::handlers::collection::get_collection(&conn, &home).await?;
    assert_eq!(coll.path, home);
    assert!(coll.id > 0);
    conn.release().await;

    session.release().await;
    Ok(())
}

#[tokio::test]
async fn test_many_connections_live() -> Result<()> {
    let Some(account) = test_account()? else {
        return Ok(());
    };

    let mut config = test_session_config();
    config.connection_max = 30;
    config.connection_max_idle = 30;
    let session = Session::new(account, config).await?;

    let mut held = Vec::new();
    for _ in 0..30 {
        held.push(session.acquire_connection().await?);
    }
    assert_eq!(session.connection_total(), 30);
    for conn in held {
        conn.release().await;
    }

    session.release().await;
    Ok(())
}
