// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Connection-level pieces of redirected and parallel transfers: the
//! transfer-plan probe, the 4.3 replica-token handshake, and sibling
//! replica close.

use crate::{
    client::connection::Connection,
    error::Result,
    models::{
        api,
        data_object::{DataObjInp, HostStr, OPR_TYPE_GET, OPR_TYPE_PUT},
        descriptor::{
            BinBytesBuf, DescriptorInfo, descriptor_info_request, replica_close_request,
        },
        query::{KW_REPLICA_TOKEN, KW_RESC_HIER},
        types::FileOpenMode,
    },
};

/// Asks the catalog provider where an upload should go. `None` means
/// "this server is fine".
pub async fn get_host_for_put(
    conn: &Connection,
    path: &str,
    resource: &str,
) -> Result<Option<String>> {
    host_probe(conn, api::GET_HOST_FOR_PUT_AN, path, resource, OPR_TYPE_PUT).await
}

/// Asks the catalog provider where a download should come from.
pub async fn get_host_for_get(
    conn: &Connection,
    path: &str,
    resource: &str,
) -> Result<Option<String>> {
    host_probe(conn, api::GET_HOST_FOR_GET_AN, path, resource, OPR_TYPE_GET).await
}

async fn host_probe(
    conn: &Connection,
    api_number: i32,
    path: &str,
    resource: &str,
    opr_type: i32,
) -> Result<Option<String>> {
    let inp = DataObjInp::host_probe(path, resource, opr_type);
    let mut guard = conn.lock().await;
    let reply: Option<HostStr> = guard.request_maybe(api_number, &inp, path).await?;
    Ok(reply
        .as_ref()
        .and_then(|h| h.redirect_target())
        .map(str::to_string))
}

/// Fetches the replica token and resource hierarchy of an open
/// descriptor (4.3 servers).
pub async fn get_descriptor_info(conn: &Connection, descriptor: i32) -> Result<DescriptorInfo> {
    let reply: BinBytesBuf = conn
        .request(
            api::GET_FILE_DESCRIPTOR_INFO_APN,
            &descriptor_info_request(descriptor),
            "",
        )
        .await?;
    DescriptorInfo::from_reply(&reply)
}

/// Open request for a sibling writer of a parallel transfer: same object,
/// shared replica token, pinned to the primary's replica.
pub fn sibling_open_request(path: &str, mode: FileOpenMode, info: &DescriptorInfo) -> DataObjInp {
    let mut inp = DataObjInp::open(path, "", mode);
    inp.key_vals.add(KW_REPLICA_TOKEN, info.replica_token.clone());
    if !info.resource_hierarchy.is_empty() {
        inp.key_vals.add(KW_RESC_HIER, info.resource_hierarchy.clone());
    }
    inp
}

/// Closes a sibling descriptor without touching catalog size or status;
/// only the primary descriptor's close updates the catalog.
pub async fn close_replica(conn: &Connection, descriptor: i32, update_catalog: bool) -> Result<()> {
    conn.request_status(
        api::REPLICA_CLOSE_APN,
        &replica_close_request(descriptor, update_catalog),
        "",
    )
    .await?;
    Ok(())
}
