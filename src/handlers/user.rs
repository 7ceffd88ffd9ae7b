// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    client::connection::Connection,
    error::Result,
    handlers::query::{QueryRow, run_query},
    models::{
        columns::*,
        query::GenQueryInp,
        types::{User, UserType},
    },
};

fn user_from_row(row: &QueryRow) -> Result<Option<User>> {
    let Some(user_type) = row.get(COL_USER_TYPE).and_then(UserType::from_token) else {
        return Ok(None);
    };
    Ok(Some(User {
        id: row.parse_i64(COL_USER_ID)?,
        name: row.require(COL_USER_NAME)?.to_string(),
        zone: row.get(COL_USER_ZONE).unwrap_or_default().to_string(),
        user_type,
    }))
}

fn user_selects() -> GenQueryInp {
    GenQueryInp::new()
        .select(COL_USER_ID)
        .select(COL_USER_NAME)
        .select(COL_USER_ZONE)
        .select(COL_USER_TYPE)
}

/// All users in the zone (groups excluded).
pub async fn list_users(conn: &Connection) -> Result<Vec<User>> {
    let inp = user_selects().condition(COL_USER_TYPE, "<> 'rodsgroup'");
    let rows = run_query(conn, inp, "users").await?;
    rows.iter().filter_map(|r| user_from_row(r).transpose()).collect()
}

/// All groups in the zone.
pub async fn list_groups(conn: &Connection) -> Result<Vec<User>> {
    let inp = user_selects().condition_eq(COL_USER_TYPE, "rodsgroup");
    let rows = run_query(conn, inp, "groups").await?;
    rows.iter().filter_map(|r| user_from_row(r).transpose()).collect()
}

/// Members of one group. The catalog lists a group as a member of
/// itself; that row is dropped.
pub async fn list_group_members(conn: &Connection, group: &str) -> Result<Vec<User>> {
    let inp = user_selects().condition_eq(COL_USER_GROUP_NAME, group);
    let rows = run_query(conn, inp, group).await?;
    let users: Vec<User> = rows
        .iter()
        .filter_map(|r| user_from_row(r).transpose())
        .collect::<Result<_>>()?;
    Ok(users.into_iter().filter(|u| u.name != group).collect())
}

/// Names of the groups a user belongs to.
pub async fn list_user_groups(conn: &Connection, user: &str) -> Result<Vec<String>> {
    let inp = GenQueryInp::new()
        .select(COL_USER_GROUP_NAME)
        .condition_eq(COL_USER_NAME, user);
    let rows = run_query(conn, inp, user).await?;
    let mut groups: Vec<String> = rows
        .iter()
        .filter_map(|r| r.get(COL_USER_GROUP_NAME))
        .filter(|g| *g != user)
        .map(str::to_string)
        .collect();
    groups.sort();
    groups.dedup();
    Ok(groups)
}
