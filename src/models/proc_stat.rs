// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};

use crate::models::query::KeyValPair;

// Attribute indices of the GenQueryOut-shaped PROC_STAT reply table.
pub const PROC_PID_INDEX: i32 = 0;
pub const PROC_STARTTIME_INDEX: i32 = 1;
pub const PROC_CLIENT_NAME_INDEX: i32 = 2;
pub const PROC_CLIENT_ZONE_INDEX: i32 = 3;
pub const PROC_PROXY_NAME_INDEX: i32 = 4;
pub const PROC_PROXY_ZONE_INDEX: i32 = 5;
pub const PROC_REMOTE_ADDR_INDEX: i32 = 6;
pub const PROC_SERVER_ADDR_INDEX: i32 = 7;
pub const PROC_PROG_NAME_INDEX: i32 = 8;

/// `ProcStatInp_PI`: agent-process listing request. An empty `addr`
/// means "all servers in the zone".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "ProcStatInp_PI")]
pub struct ProcStatInp {
    #[serde(default)]
    pub addr: String,
    #[serde(rename = "rodsZone", default)]
    pub rods_zone: String,
    #[serde(rename = "KeyValPair_PI", default)]
    pub key_vals: KeyValPair,
}

impl ProcStatInp {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_server(addr: &str) -> Self {
        Self {
            addr: addr.to_string(),
            ..Self::default()
        }
    }
}
