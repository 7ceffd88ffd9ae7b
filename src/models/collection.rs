// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};

use crate::models::query::{KW_FORCE_FLAG, KW_RECURSIVE_OPR, KeyValPair};

/// `CollInpNew_PI`: create/remove collection request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "CollInpNew_PI")]
pub struct CollInp {
    #[serde(rename = "collName")]
    pub coll_name: String,
    pub flags: i32,
    #[serde(rename = "oprType")]
    pub opr_type: i32,
    #[serde(rename = "KeyValPair_PI")]
    pub key_vals: KeyValPair,
}

impl CollInp {
    pub fn create(path: &str, recursive: bool) -> Self {
        let mut key_vals = KeyValPair::default();
        if recursive {
            key_vals.add(KW_RECURSIVE_OPR, "");
        }
        Self {
            coll_name: path.to_string(),
            flags: 0,
            opr_type: 0,
            key_vals,
        }
    }

    pub fn remove(path: &str, recursive: bool, force: bool) -> Self {
        let mut key_vals = KeyValPair::default();
        if recursive {
            key_vals.add(KW_RECURSIVE_OPR, "");
        }
        if force {
            key_vals.add(KW_FORCE_FLAG, "");
        }
        Self {
            coll_name: path.to_string(),
            flags: 0,
            opr_type: 0,
            key_vals,
        }
    }
}

/// `CollOprStat_PI`: progress report streamed during recursive removal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "CollOprStat_PI")]
pub struct CollOprStat {
    #[serde(rename = "filesCnt", default)]
    pub files_count: i32,
    #[serde(rename = "totalFileCnt", default)]
    pub total_file_count: i32,
    #[serde(rename = "bytesWritten", default)]
    pub bytes_written: i64,
    #[serde(rename = "lastObjPath", default)]
    pub last_obj_path: String,
}
