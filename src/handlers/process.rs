// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    client::connection::Connection,
    error::Result,
    models::{
        api,
        proc_stat::*,
        query::GenQueryOut,
        types::Process,
    },
    utils,
};

fn processes_from_table(table: &GenQueryOut) -> Result<Vec<Process>> {
    table.validate()?;

    let column = |index: i32, row: usize| -> String {
        table
            .results
            .iter()
            .find(|r| r.attribute_index == index)
            .and_then(|r| r.values.get(row))
            .cloned()
            .unwrap_or_default()
    };

    let mut processes = Vec::with_capacity(table.row_count as usize);
    for row in 0..table.row_count as usize {
        processes.push(Process {
            id: column(PROC_PID_INDEX, row).parse().unwrap_or(-1),
            start_time: utils::parse_catalog_time(&column(PROC_STARTTIME_INDEX, row))?,
            proxy_user: column(PROC_PROXY_NAME_INDEX, row),
            proxy_zone: column(PROC_PROXY_ZONE_INDEX, row),
            client_user: column(PROC_CLIENT_NAME_INDEX, row),
            client_zone: column(PROC_CLIENT_ZONE_INDEX, row),
            client_address: column(PROC_REMOTE_ADDR_INDEX, row),
            server_address: column(PROC_SERVER_ADDR_INDEX, row),
            client_program: column(PROC_PROG_NAME_INDEX, row),
        });
    }
    Ok(processes)
}

/// Agent processes across the whole zone.
pub async fn list_processes(conn: &Connection) -> Result<Vec<Process>> {
    let table: GenQueryOut = conn
        .request(api::PROC_STAT_AN, &ProcStatInp::all(), "processes")
        .await?;
    processes_from_table(&table)
}

/// Agent processes of one server.
pub async fn stat_processes(conn: &Connection, server_address: &str) -> Result<Vec<Process>> {
    let table: GenQueryOut = conn
        .request(api::PROC_STAT_AN, &ProcStatInp::for_server(server_address), server_address)
        .await?;
    processes_from_table(&table)
}
