// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::{IrodsError, Result};

/// Servers pad/truncate the password to this length before hashing.
pub const MAX_PASSWORD_LENGTH: usize = 50;
/// The native-auth challenge is always this many raw bytes.
pub const CHALLENGE_LENGTH: usize = 64;

/// `authRequestOut_PI`: the base64 challenge for native authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "authRequestOut_PI")]
pub struct AuthChallenge {
    pub challenge: String,
}

impl AuthChallenge {
    pub fn challenge_bytes(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(self.challenge.trim())
            .map_err(|e| IrodsError::protocol("decode auth challenge", e.to_string()))
    }
}

/// `authResponseInp_PI`: digest plus `user#zone`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "authResponseInp_PI")]
pub struct AuthResponse {
    pub response: String,
    pub username: String,
}

impl AuthResponse {
    pub fn new(response: String, user: &str, zone: &str) -> Self {
        Self {
            response,
            username: format!("{user}#{zone}"),
        }
    }
}

/// `pamAuthRequestInp_PI`: PAM credentials, only ever sent over TLS.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "pamAuthRequestInp_PI")]
pub struct PamAuthRequest {
    #[serde(rename = "pamUser")]
    pub pam_user: String,
    #[serde(rename = "pamPassword")]
    pub pam_password: String,
    #[serde(rename = "timeToLive")]
    pub time_to_live: i32,
}

/// `pamAuthRequestOut_PI`: the derived native password.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "pamAuthRequestOut_PI")]
pub struct PamAuthReply {
    #[serde(rename = "irodsPamPassword")]
    pub irods_pam_password: String,
}

/// Computes the native-auth digest: MD5 over the 64-byte challenge
/// followed by the password zero-padded to 50 bytes, with any zero bytes
/// in the digest bumped to 0x01 (the C client's string-safety quirk),
/// base64-encoded.
pub fn native_auth_digest(challenge: &[u8], password: &str) -> String {
    let mut padded = [0u8; MAX_PASSWORD_LENGTH];
    let take = password.len().min(MAX_PASSWORD_LENGTH);
    padded[..take].copy_from_slice(&password.as_bytes()[..take]);

    let mut hasher = Md5::new();
    hasher.update(&challenge[..challenge.len().min(CHALLENGE_LENGTH)]);
    hasher.update(padded);
    let mut digest = hasher.finalize();

    for b in digest.iter_mut() {
        if *b == 0 {
            *b = 1;
        }
    }
    BASE64.encode(digest)
}
