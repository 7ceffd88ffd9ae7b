// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    error::{IrodsError, Result},
    models::{api, codec, error_codes},
};

pub const MSG_TYPE_CONNECT: &str = "RODS_CONNECT";
pub const MSG_TYPE_CS_NEG: &str = "RODS_CS_NEG_T";
pub const MSG_TYPE_VERSION: &str = "RODS_VERSION";
pub const MSG_TYPE_API_REQ: &str = "RODS_API_REQ";
pub const MSG_TYPE_API_REPLY: &str = "RODS_API_REPLY";
pub const MSG_TYPE_DISCONNECT: &str = "RODS_DISCONNECT";

/// The follow-up message the shared secret travels in after TLS escalation.
pub const MSG_TYPE_SHARED_SECRET: &str = "SHARED_SECRET";

/// Upper bound accepted for any single framed segment. Anything larger is
/// treated as a framing error rather than an allocation request.
pub const MAX_SEGMENT_LEN: u32 = 512 * 1024 * 1024;

/// `MsgHeader_PI`: the length-prefixed XML header in front of every
/// message. `int_info` carries the API number on requests and the signed
/// result code on replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "MsgHeader_PI")]
pub struct MessageHeader {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(rename = "msgLen")]
    pub msg_len: u32,
    #[serde(rename = "errorLen")]
    pub error_len: u32,
    #[serde(rename = "bsLen")]
    pub bs_len: u32,
    #[serde(rename = "intInfo")]
    pub int_info: i32,
}

impl MessageHeader {
    pub fn new(msg_type: &str, msg_len: u32, error_len: u32, bs_len: u32, int_info: i32) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            msg_len,
            error_len,
            bs_len,
            int_info,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (label, len) in [
            ("msgLen", self.msg_len),
            ("errorLen", self.error_len),
            ("bsLen", self.bs_len),
        ] {
            if len > MAX_SEGMENT_LEN {
                return Err(IrodsError::protocol(
                    "read header",
                    format!("{label} {len} exceeds segment limit"),
                ));
            }
        }
        Ok(())
    }
}

/// One complete message: header fields plus the three payload segments in
/// wire order (message, error, binary stream).
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub msg_type: String,
    pub int_info: i32,
    pub body: Vec<u8>,
    pub error: Vec<u8>,
    pub bs: Bytes,
}

impl Message {
    pub fn header(&self) -> MessageHeader {
        MessageHeader::new(
            &self.msg_type,
            self.body.len() as u32,
            self.error.len() as u32,
            self.bs.len() as u32,
            self.int_info,
        )
    }

    pub fn header_only(msg_type: &str) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            ..Self::default()
        }
    }

    /// Maps a negative reply status onto a domain error. `path` feeds the
    /// user-visible message; pass what the operation was addressing.
    pub fn check(&self, api: i32, path: &str) -> Result<()> {
        if self.int_info >= 0 {
            return Ok(());
        }
        Err(error_codes::to_error(api::name(api), path, self.int_info))
    }
}

/// Builds a `RODS_API_REQ` message with a serialized XML body.
pub fn api_message<T: Serialize>(api: i32, body: &T) -> Result<Message> {
    Ok(Message {
        msg_type: MSG_TYPE_API_REQ.to_string(),
        int_info: api,
        body: codec::marshal(body)?.into_bytes(),
        error: Vec::new(),
        bs: Bytes::new(),
    })
}

/// Same as [`api_message`] with an outbound binary stream attached.
pub fn api_message_with_bs<T: Serialize>(api: i32, body: &T, bs: Bytes) -> Result<Message> {
    let mut msg = api_message(api, body)?;
    msg.bs = bs;
    Ok(msg)
}

/// An API request without a body (e.g. the auth challenge request).
pub fn api_message_empty(api: i32) -> Message {
    Message {
        msg_type: MSG_TYPE_API_REQ.to_string(),
        int_info: api,
        ..Message::default()
    }
}
