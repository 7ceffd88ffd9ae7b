// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use tracing::warn;

use crate::{
    client::connection::Connection,
    error::Result,
    handlers::query::run_query,
    models::{
        access::ModAccessControlInp,
        api,
        columns::*,
        query::GenQueryInp,
        types::{Access, AccessLevel, EntryKind, UserType},
    },
    utils,
};

/// Lists the ACL of a path. Rows with tokens this client does not know
/// (ticket grants and the like) are skipped.
pub async fn list_accesses(conn: &Connection, kind: EntryKind, path: &str) -> Result<Vec<Access>> {
    let access_col = match kind {
        EntryKind::Directory => COL_COLL_ACCESS_NAME,
        EntryKind::File => COL_DATA_ACCESS_NAME,
    };

    let mut inp = GenQueryInp::new()
        .select(access_col)
        .select(COL_USER_NAME)
        .select(COL_USER_ZONE)
        .select(COL_USER_TYPE);
    match kind {
        EntryKind::Directory => {
            inp = inp
                .condition_eq(COL_COLL_NAME, path)
                .condition_eq(COL_COLL_TOKEN_NAMESPACE, "access_type");
        }
        EntryKind::File => {
            let (parent, name) = utils::split_path(path);
            inp = inp
                .condition_eq(COL_COLL_NAME, &parent)
                .condition_eq(COL_DATA_NAME, &name)
                .condition_eq(COL_DATA_TOKEN_NAMESPACE, "access_type");
        }
    }

    let rows = run_query(conn, inp, path).await?;
    let mut accesses = Vec::with_capacity(rows.len());
    for row in &rows {
        let token = row.require(access_col)?;
        let Some(access_level) = AccessLevel::from_token(token) else {
            warn!("skipping unknown access token {token:?} on {path}");
            continue;
        };
        let type_token = row.require(COL_USER_TYPE)?;
        let Some(user_type) = UserType::from_token(type_token) else {
            warn!("skipping unknown user type {type_token:?} on {path}");
            continue;
        };
        accesses.push(Access {
            path: path.to_string(),
            user_name: row.require(COL_USER_NAME)?.to_string(),
            user_zone: row.get(COL_USER_ZONE).unwrap_or_default().to_string(),
            user_type,
            access_level,
        });
    }
    Ok(accesses)
}

pub async fn set_access(
    conn: &Connection,
    path: &str,
    user: &str,
    zone: &str,
    level: AccessLevel,
    recursive: bool,
    as_admin: bool,
) -> Result<()> {
    let inp = ModAccessControlInp::set(path, user, zone, level, recursive, as_admin);
    conn.request_status(api::MOD_ACCESS_CONTROL_AN, &inp, path).await?;
    Ok(())
}

/// Toggles the collection inheritance flag.
pub async fn set_access_inherit(
    conn: &Connection,
    path: &str,
    inherit: bool,
    recursive: bool,
) -> Result<()> {
    let inp = ModAccessControlInp::set_inherit(path, inherit, recursive);
    conn.request_status(api::MOD_ACCESS_CONTROL_AN, &inp, path).await?;
    Ok(())
}
