// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};

use crate::models::types::AccessLevel;

/// `modAccessControlInp_PI`: one ACL mutation (`ichmod`'s wire form).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "modAccessControlInp_PI")]
pub struct ModAccessControlInp {
    #[serde(rename = "recursiveFlag")]
    pub recursive_flag: i32,
    #[serde(rename = "accessLevel")]
    pub access_level: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub zone: String,
    pub path: String,
}

impl ModAccessControlInp {
    pub fn set(
        path: &str,
        user: &str,
        zone: &str,
        level: AccessLevel,
        recursive: bool,
        as_admin: bool,
    ) -> Self {
        let mut token = level.as_request_token().to_string();
        if as_admin {
            token = format!("admin:{token}");
        }
        Self {
            recursive_flag: recursive as i32,
            access_level: token,
            user_name: user.to_string(),
            zone: zone.to_string(),
            path: path.to_string(),
        }
    }

    /// The collection "inherit"/"noinherit" toggle travels as a pseudo
    /// access level with an empty user.
    pub fn set_inherit(path: &str, inherit: bool, recursive: bool) -> Self {
        Self {
            recursive_flag: recursive as i32,
            access_level: if inherit { "inherit" } else { "noinherit" }.to_string(),
            user_name: String::new(),
            zone: String::new(),
            path: path.to_string(),
        }
    }
}
