// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Live-server test support. These tests run only when
//! `IRODS_TEST_ACCOUNT` points at an account YAML for a reachable
//! server; without it every test passes as a no-op so the suite stays
//! green in isolated environments.

use anyhow::{Context, Result};
use irods_client_rs::cfg::config::{Account, SessionConfig};

pub fn test_account() -> Result<Option<Account>> {
    let Ok(path) = std::env::var("IRODS_TEST_ACCOUNT") else {
        return Ok(None);
    };
    let account = Account::load_from_file(&path)
        .with_context(|| format!("failed to load account from {path}"))?;
    Ok(Some(account))
}

pub fn test_session_config() -> SessionConfig {
    SessionConfig::new("irods-client-rs-integration")
}

pub fn unique_name(prefix: &str) -> String {
    format!(
        "{prefix}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
    )
}

pub fn home_dir(account: &Account) -> String {
    format!("/{}/home/{}", account.zone, account.client_user)
}
