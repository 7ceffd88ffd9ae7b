// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};

use crate::models::{query::KeyValPair, types::EntryKind};

/// The `arg1` target selector of a metadata mutation.
pub fn target_token(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Directory => "-C",
        EntryKind::File => "-d",
    }
}

/// `ModAVUMetadataInp_PI`: the ten-argument metadata mutation request
/// (`imeta`'s wire form).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "ModAVUMetadataInp_PI")]
pub struct ModAvuMetadataInp {
    pub arg0: String,
    pub arg1: String,
    pub arg2: String,
    pub arg3: String,
    pub arg4: String,
    pub arg5: String,
    #[serde(default)]
    pub arg6: String,
    #[serde(default)]
    pub arg7: String,
    #[serde(default)]
    pub arg8: String,
    #[serde(default)]
    pub arg9: String,
    #[serde(rename = "KeyValPair_PI")]
    pub key_vals: KeyValPair,
}

impl ModAvuMetadataInp {
    pub fn add(kind: EntryKind, path: &str, attribute: &str, value: &str, units: &str) -> Self {
        Self::operation("add", kind, path, attribute, value, units)
    }

    pub fn remove(kind: EntryKind, path: &str, attribute: &str, value: &str, units: &str) -> Self {
        Self::operation("rm", kind, path, attribute, value, units)
    }

    fn operation(
        op: &str,
        kind: EntryKind,
        path: &str,
        attribute: &str,
        value: &str,
        units: &str,
    ) -> Self {
        Self {
            arg0: op.to_string(),
            arg1: target_token(kind).to_string(),
            arg2: path.to_string(),
            arg3: attribute.to_string(),
            arg4: value.to_string(),
            arg5: units.to_string(),
            arg6: String::new(),
            arg7: String::new(),
            arg8: String::new(),
            arg9: String::new(),
            key_vals: KeyValPair::default(),
        }
    }
}
