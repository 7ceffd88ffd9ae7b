// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::{
    client::connection::Connection,
    error::{IrodsError, Result},
    handlers::query::{QueryRow, run_query},
    models::{
        api,
        columns::*,
        data_object::{DataObjCopyInp, DataObjInp, FileLseekOut, OpenedDataObjInp},
        query::GenQueryInp,
        types::{Collection, DataObject, FileOpenMode, Replica, Whence},
    },
    utils,
};

fn data_object_selects(inp: GenQueryInp) -> GenQueryInp {
    inp.select(COL_D_DATA_ID)
        .select(COL_DATA_NAME)
        .select(COL_DATA_SIZE)
        .select(COL_DATA_TYPE_NAME)
        .select(COL_DATA_REPL_NUM)
        .select(COL_D_OWNER_NAME)
        .select(COL_D_OWNER_ZONE)
        .select(COL_D_DATA_CHECKSUM)
        .select(COL_D_DATA_STATUS)
        .select(COL_D_RESC_NAME)
        .select(COL_D_DATA_PATH)
        .select(COL_D_RESC_HIER)
        .select(COL_D_CREATE_TIME)
        .select(COL_D_MODIFY_TIME)
}

fn replica_from_row(row: &QueryRow) -> Result<Replica> {
    Ok(Replica {
        number: row.parse_i64(COL_DATA_REPL_NUM)? as i32,
        owner_name: row.require(COL_D_OWNER_NAME)?.to_string(),
        owner_zone: row.get(COL_D_OWNER_ZONE).unwrap_or_default().to_string(),
        checksum: row.get(COL_D_DATA_CHECKSUM).unwrap_or_default().to_string(),
        status: row.get(COL_D_DATA_STATUS).unwrap_or_default().to_string(),
        resource_name: row.get(COL_D_RESC_NAME).unwrap_or_default().to_string(),
        physical_path: row.get(COL_D_DATA_PATH).unwrap_or_default().to_string(),
        resource_hierarchy: row.get(COL_D_RESC_HIER).unwrap_or_default().to_string(),
        create_time: row.time(COL_D_CREATE_TIME)?,
        modify_time: row.time(COL_D_MODIFY_TIME)?,
    })
}

/// Rows sharing one catalog id are a single data object with several
/// replicas; merge them preserving the order ids first appeared in.
fn merge_rows(collection: &Collection, rows: &[QueryRow]) -> Result<Vec<DataObject>> {
    let mut objects: Vec<DataObject> = Vec::new();

    for row in rows {
        let id = row.parse_i64(COL_D_DATA_ID)?;
        let replica = replica_from_row(row)?;

        if let Some(existing) = objects.iter_mut().find(|o| o.id == id) {
            existing.replicas.push(replica);
            continue;
        }

        let name = row.require(COL_DATA_NAME)?.to_string();
        objects.push(DataObject {
            id,
            path: utils::join_path(&collection.path, &name),
            name,
            size: row.parse_i64(COL_DATA_SIZE)?,
            data_type: row.get(COL_DATA_TYPE_NAME).unwrap_or_default().to_string(),
            replicas: vec![replica],
        });
    }

    Ok(objects)
}

/// Looks a data object up by collection and file name, with all replicas.
pub async fn get_data_object(
    conn: &Connection,
    collection: &Collection,
    name: &str,
) -> Result<DataObject> {
    let inp = data_object_selects(GenQueryInp::new())
        .condition_eq(COL_D_COLL_ID, &collection.id.to_string())
        .condition_eq(COL_DATA_NAME, name);
    let path = utils::join_path(&collection.path, name);
    let rows = run_query(conn, inp, &path).await?;
    merge_rows(collection, &rows)?
        .into_iter()
        .next()
        .ok_or(IrodsError::NotFound { path })
}

/// Lists all data objects in a collection.
pub async fn list_data_objects(conn: &Connection, collection: &Collection) -> Result<Vec<DataObject>> {
    let inp = data_object_selects(GenQueryInp::new())
        .condition_eq(COL_D_COLL_ID, &collection.id.to_string());
    let rows = run_query(conn, inp, &collection.path).await?;
    merge_rows(collection, &rows)
}

/// Creates a data object, returning the server-side descriptor.
pub async fn create_data_object(
    conn: &Connection,
    path: &str,
    resource: &str,
    force: bool,
) -> Result<i32> {
    conn.request_status(api::DATA_OBJ_CREATE_AN, &DataObjInp::create(path, resource, force), path)
        .await
}

/// Opens an existing data object, returning the server-side descriptor.
pub async fn open_data_object(
    conn: &Connection,
    path: &str,
    resource: &str,
    mode: FileOpenMode,
) -> Result<i32> {
    conn.request_status(api::DATA_OBJ_OPEN_AN, &DataObjInp::open(path, resource, mode), path)
        .await
}

/// Open with a caller-assembled request; parallel transfers use this to
/// attach replica-token key-vals.
pub async fn open_data_object_with(conn: &Connection, inp: &DataObjInp) -> Result<i32> {
    let path = inp.obj_path.clone();
    conn.request_status(api::DATA_OBJ_OPEN_AN, inp, &path).await
}

/// Seeks; the locally mirrored offset is the caller's concern.
pub async fn seek_data_object(
    conn: &Connection,
    descriptor: i32,
    offset: i64,
    whence: Whence,
) -> Result<i64> {
    let out: FileLseekOut = conn
        .request(
            api::DATA_OBJ_LSEEK_AN,
            &OpenedDataObjInp::seek(descriptor, offset, whence),
            "",
        )
        .await?;
    Ok(out.offset)
}

/// Reads up to `length` bytes from an open descriptor.
pub async fn read_data_object(conn: &Connection, descriptor: i32, length: i32) -> Result<Bytes> {
    let mut guard = conn.lock().await;
    guard
        .request_read_bs(api::DATA_OBJ_READ_AN, &OpenedDataObjInp::read(descriptor, length), "")
        .await
}

/// Writes one buffer to an open descriptor.
pub async fn write_data_object(conn: &Connection, descriptor: i32, data: Bytes) -> Result<()> {
    let body = OpenedDataObjInp::write(descriptor, data.len() as i32);
    let mut guard = conn.lock().await;
    guard
        .request_with_bs(api::DATA_OBJ_WRITE_AN, &body, data, "")
        .await?;
    Ok(())
}

pub async fn close_data_object(conn: &Connection, descriptor: i32) -> Result<()> {
    conn.request_status(api::DATA_OBJ_CLOSE_AN, &OpenedDataObjInp::close(descriptor), "")
        .await?;
    Ok(())
}

pub async fn delete_data_object(conn: &Connection, path: &str, force: bool) -> Result<()> {
    conn.request_status(api::DATA_OBJ_UNLINK_AN, &DataObjInp::unlink(path, force), path)
        .await?;
    Ok(())
}

pub async fn rename_data_object(conn: &Connection, src: &str, dest: &str) -> Result<()> {
    conn.request_status(api::DATA_OBJ_RENAME_AN, &DataObjCopyInp::rename(src, dest, false), src)
        .await?;
    Ok(())
}

/// Server-side copy; no bytes travel through the client.
pub async fn copy_data_object(
    conn: &Connection,
    src: &str,
    dest: &str,
    resource: &str,
    force: bool,
) -> Result<()> {
    conn.request_status(api::DATA_OBJ_COPY_AN, &DataObjCopyInp::copy(src, dest, resource, force), src)
        .await?;
    Ok(())
}

pub async fn truncate_data_object(conn: &Connection, path: &str, size: i64) -> Result<()> {
    conn.request_status(api::DATA_OBJ_TRUNCATE_AN, &DataObjInp::truncate(path, size), path)
        .await?;
    Ok(())
}
