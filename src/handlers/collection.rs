// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    client::connection::Connection,
    error::{IrodsError, Result},
    handlers::query::{QueryRow, run_query},
    models::{
        api,
        collection::CollInp,
        columns::*,
        error_codes,
        message::api_message,
        query::GenQueryInp,
        types::Collection,
    },
    utils,
};

fn collection_selects(inp: GenQueryInp) -> GenQueryInp {
    inp.select(COL_COLL_ID)
        .select(COL_COLL_NAME)
        .select(COL_COLL_OWNER_NAME)
        .select(COL_COLL_OWNER_ZONE)
        .select(COL_COLL_CREATE_TIME)
        .select(COL_COLL_MODIFY_TIME)
        .select(COL_COLL_INHERITANCE)
}

fn collection_from_row(row: &QueryRow) -> Result<Collection> {
    let path = row.require(COL_COLL_NAME)?.to_string();
    Ok(Collection {
        id: row.parse_i64(COL_COLL_ID)?,
        name: utils::basename(&path),
        owner_name: row.require(COL_COLL_OWNER_NAME)?.to_string(),
        owner_zone: row.require(COL_COLL_OWNER_ZONE)?.to_string(),
        create_time: row.time(COL_COLL_CREATE_TIME)?,
        modify_time: row.time(COL_COLL_MODIFY_TIME)?,
        inheritance: row.get(COL_COLL_INHERITANCE) == Some("1"),
        path,
    })
}

/// Looks one collection up by its absolute path.
pub async fn get_collection(conn: &Connection, path: &str) -> Result<Collection> {
    let inp = collection_selects(GenQueryInp::new()).condition_eq(COL_COLL_NAME, path);
    let rows = run_query(conn, inp, path).await?;
    match rows.first() {
        Some(row) => collection_from_row(row),
        None => Err(IrodsError::NotFound {
            path: path.to_string(),
        }),
    }
}

/// Lists the child collections of a path, in catalog order.
pub async fn list_sub_collections(conn: &Connection, path: &str) -> Result<Vec<Collection>> {
    let inp = collection_selects(GenQueryInp::new()).condition_eq(COL_COLL_PARENT_NAME, path);
    let rows = run_query(conn, inp, path).await?;
    rows.iter().map(collection_from_row).collect()
}

pub async fn create_collection(conn: &Connection, path: &str, recursive: bool) -> Result<()> {
    conn.request_status(api::COLL_CREATE_AN, &CollInp::create(path, recursive), path)
        .await?;
    Ok(())
}

/// Removes a collection. During a recursive removal the server streams
/// progress replies that must each be acknowledged before the final
/// status arrives.
pub async fn delete_collection(
    conn: &Connection,
    path: &str,
    recursive: bool,
    force: bool,
) -> Result<()> {
    let inp = CollInp::remove(path, recursive, force);
    let mut guard = conn.lock().await;
    let mut reply = guard.exchange(api_message(api::RM_COLL_AN, &inp)?).await?;
    while reply.int_info == error_codes::SYS_SVR_TO_CLI_COLL_STAT {
        guard
            .send_ack(error_codes::SYS_CLI_TO_SVR_COLL_STAT_REPLY)
            .await?;
        reply = guard.read_reply().await?;
    }
    reply.check(api::RM_COLL_AN, path)
}

pub async fn rename_collection(conn: &Connection, src: &str, dest: &str) -> Result<()> {
    use crate::models::data_object::DataObjCopyInp;
    conn.request_status(api::DATA_OBJ_RENAME_AN, &DataObjCopyInp::rename(src, dest, true), src)
        .await?;
    Ok(())
}
