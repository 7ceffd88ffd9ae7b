// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The 4.3-era JSON APIs (descriptor info, replica close). Their payloads
//! are JSON documents riding inside a `BinBytesBuf_PI` element.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{IrodsError, Result};

/// `BinBytesBuf_PI`: a length-prefixed opaque buffer. The JSON APIs put
/// plain (XML-escaped) JSON text in `buf`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "BinBytesBuf_PI")]
pub struct BinBytesBuf {
    pub buflen: i32,
    #[serde(default)]
    pub buf: String,
}

impl BinBytesBuf {
    pub fn from_json(value: &serde_json::Value) -> Self {
        let text = value.to_string();
        Self {
            buflen: text.len() as i32,
            buf: text,
        }
    }

    pub fn json(&self) -> Result<serde_json::Value> {
        // servers occasionally NUL-terminate the buffer
        serde_json::from_str(self.buf.trim_end_matches('\0'))
            .map_err(|e| IrodsError::protocol("decode json payload", e.to_string()))
    }
}

/// Request payload for GET_FILE_DESCRIPTOR_INFO.
pub fn descriptor_info_request(descriptor: i32) -> BinBytesBuf {
    BinBytesBuf::from_json(&json!({ "fd": descriptor }))
}

/// Request payload for REPLICA_CLOSE; sibling writers of a parallel
/// transfer close without touching catalog size/status.
pub fn replica_close_request(descriptor: i32, update_catalog: bool) -> BinBytesBuf {
    BinBytesBuf::from_json(&json!({
        "fd": descriptor,
        "update_size": update_catalog,
        "update_status": update_catalog,
        "compute_checksum": false,
        "send_notifications": false,
        "preserve_replica_state_table": false,
    }))
}

/// The slice of the descriptor-info reply parallel transfers need.
#[derive(Debug, Clone)]
pub struct DescriptorInfo {
    pub replica_token: String,
    pub resource_hierarchy: String,
}

impl DescriptorInfo {
    pub fn from_reply(reply: &BinBytesBuf) -> Result<Self> {
        let doc = reply.json()?;
        let replica_token = doc
            .get("replica_token")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let resource_hierarchy = doc
            .get("data_object_info")
            .and_then(|info| info.get("resource_hierarchy"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if replica_token.is_empty() {
            return Err(IrodsError::protocol(
                "descriptor info",
                "reply carried no replica_token",
            ));
        }
        Ok(Self {
            replica_token,
            resource_hierarchy,
        })
    }
}
