// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Paged catalog queries. The connection lock is held across
//! continuation pages so no other request can interleave with an open
//! server-side statement.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    client::connection::Connection,
    error::{IrodsError, Result},
    models::{
        api, codec, error_codes,
        message::api_message,
        query::{GenQueryInp, GenQueryOut},
    },
    utils,
};

/// One catalog row, keyed by column id.
#[derive(Debug, Clone, Default)]
pub struct QueryRow {
    values: HashMap<i32, String>,
}

impl QueryRow {
    pub fn get(&self, column: i32) -> Option<&str> {
        self.values.get(&column).map(String::as_str)
    }

    pub fn require(&self, column: i32) -> Result<&str> {
        self.get(column).ok_or_else(|| {
            IrodsError::protocol("decode query result", format!("column {column} missing"))
        })
    }

    pub fn parse_i64(&self, column: i32) -> Result<i64> {
        let raw = self.require(column)?;
        raw.parse().map_err(|e| {
            IrodsError::protocol(
                "decode query result",
                format!("column {column} value {raw:?}: {e}"),
            )
        })
    }

    pub fn time(&self, column: i32) -> Result<DateTime<Utc>> {
        utils::parse_catalog_time(self.require(column)?)
    }
}

/// Runs a query to exhaustion, following the continuation index until the
/// server reports zero. Rows from all pages are concatenated in
/// submission order; `CAT_NO_ROWS_FOUND` yields an empty vector.
pub async fn run_query(conn: &Connection, base: GenQueryInp, path: &str) -> Result<Vec<QueryRow>> {
    let mut guard = conn.lock().await;
    let mut rows: Vec<QueryRow> = Vec::new();
    let mut continue_index = 0;

    loop {
        let mut inp = base.clone();
        inp.continue_index = continue_index;

        let reply = guard.exchange(api_message(api::GEN_QUERY_AN, &inp)?).await?;
        if reply.int_info < 0 {
            if error_codes::main_code(reply.int_info) == error_codes::CAT_NO_ROWS_FOUND {
                break;
            }
            reply.check(api::GEN_QUERY_AN, path)?;
        }

        let out: GenQueryOut = codec::unmarshal(&reply.body).inspect_err(|e| {
            if e.poisons_connection() {
                conn.poison();
            }
        })?;
        out.validate()?;
        debug!(
            "query page: {} rows, continue {}",
            out.row_count, out.continue_index
        );

        for row_index in 0..out.row_count as usize {
            let mut row = QueryRow::default();
            for result in &out.results[..out.attribute_count as usize] {
                row.values
                    .insert(result.attribute_index, result.values[row_index].clone());
            }
            rows.push(row);
        }

        continue_index = out.continue_index;
        if continue_index == 0 {
            break;
        }
    }

    Ok(rows)
}
