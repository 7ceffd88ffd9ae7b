// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};

/// `endTransactionInp_PI`: commits or rolls back the agent's open
/// catalog transaction. Sessions configured with `StartNewTransaction`
/// commit at checkout so every caller starts on a fresh transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "endTransactionInp_PI")]
pub struct EndTransactionInp {
    pub arg0: String,
    #[serde(default)]
    pub arg1: String,
}

impl EndTransactionInp {
    pub fn commit() -> Self {
        Self {
            arg0: "commit".to_string(),
            arg1: String::new(),
        }
    }

    pub fn rollback() -> Self {
        Self {
            arg0: "rollback".to_string(),
            arg1: String::new(),
        }
    }
}
