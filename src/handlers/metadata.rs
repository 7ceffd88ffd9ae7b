// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    client::connection::Connection,
    error::Result,
    handlers::query::run_query,
    models::{
        api,
        columns::*,
        metadata::ModAvuMetadataInp,
        query::GenQueryInp,
        types::{EntryKind, Meta},
    },
    utils,
};

/// Lists the AVUs attached to a path.
pub async fn list_metadata(conn: &Connection, kind: EntryKind, path: &str) -> Result<Vec<Meta>> {
    let (id_col, name_col, value_col, units_col) = match kind {
        EntryKind::Directory => (
            COL_META_COLL_ATTR_ID,
            COL_META_COLL_ATTR_NAME,
            COL_META_COLL_ATTR_VALUE,
            COL_META_COLL_ATTR_UNITS,
        ),
        EntryKind::File => (
            COL_META_DATA_ATTR_ID,
            COL_META_DATA_ATTR_NAME,
            COL_META_DATA_ATTR_VALUE,
            COL_META_DATA_ATTR_UNITS,
        ),
    };

    let mut inp = GenQueryInp::new()
        .select(id_col)
        .select(name_col)
        .select(value_col)
        .select(units_col);
    match kind {
        EntryKind::Directory => {
            inp = inp.condition_eq(COL_COLL_NAME, path);
        }
        EntryKind::File => {
            let (parent, name) = utils::split_path(path);
            inp = inp
                .condition_eq(COL_COLL_NAME, &parent)
                .condition_eq(COL_DATA_NAME, &name);
        }
    }

    let rows = run_query(conn, inp, path).await?;
    rows.iter()
        .map(|row| {
            Ok(Meta {
                id: row.parse_i64(id_col)?,
                path: path.to_string(),
                attribute: row.require(name_col)?.to_string(),
                value: row.require(value_col)?.to_string(),
                units: row.get(units_col).unwrap_or_default().to_string(),
            })
        })
        .collect()
}

pub async fn add_metadata(
    conn: &Connection,
    kind: EntryKind,
    path: &str,
    attribute: &str,
    value: &str,
    units: &str,
) -> Result<()> {
    let inp = ModAvuMetadataInp::add(kind, path, attribute, value, units);
    conn.request_status(api::MOD_AVU_METADATA_AN, &inp, path).await?;
    Ok(())
}

pub async fn delete_metadata(
    conn: &Connection,
    kind: EntryKind,
    path: &str,
    attribute: &str,
    value: &str,
    units: &str,
) -> Result<()> {
    let inp = ModAvuMetadataInp::remove(kind, path, attribute, value, units);
    conn.request_status(api::MOD_AVU_METADATA_AN, &inp, path).await?;
    Ok(())
}
