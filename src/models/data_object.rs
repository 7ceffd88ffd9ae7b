// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};

use crate::models::{
    query::{KW_DATA_TYPE, KW_DEST_RESC_NAME, KW_FORCE_FLAG, KeyValPair},
    types::{FileOpenMode, Whence, open_flags},
};

/// Default creation mode sent in `createMode` (0644).
pub const DEFAULT_CREATE_MODE: i32 = 0o644;

// Operation types carried in `oprType`.
pub const OPR_TYPE_NONE: i32 = 0;
pub const OPR_TYPE_PUT: i32 = 1;
pub const OPR_TYPE_GET: i32 = 2;
pub const OPR_TYPE_COPY_DEST: i32 = 9;
pub const OPR_TYPE_COPY_SRC: i32 = 10;
pub const OPR_TYPE_RENAME_DATA_OBJ: i32 = 11;
pub const OPR_TYPE_RENAME_COLL: i32 = 12;

/// `DataObjInp_PI`: the workhorse request for create/open/unlink/
/// truncate/redirect operations on one path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "DataObjInp_PI")]
pub struct DataObjInp {
    #[serde(rename = "objPath")]
    pub obj_path: String,
    #[serde(rename = "createMode")]
    pub create_mode: i32,
    #[serde(rename = "openFlags")]
    pub open_flags: i32,
    pub offset: i64,
    #[serde(rename = "dataSize")]
    pub data_size: i64,
    #[serde(rename = "numThreads")]
    pub num_threads: i32,
    #[serde(rename = "oprType")]
    pub opr_type: i32,
    #[serde(rename = "KeyValPair_PI")]
    pub key_vals: KeyValPair,
}

impl DataObjInp {
    pub fn new(path: &str) -> Self {
        Self {
            obj_path: path.to_string(),
            create_mode: 0,
            open_flags: 0,
            offset: 0,
            data_size: -1,
            num_threads: 0,
            opr_type: OPR_TYPE_NONE,
            key_vals: KeyValPair::default(),
        }
    }

    pub fn create(path: &str, resource: &str, force: bool) -> Self {
        let mut inp = Self::new(path);
        inp.create_mode = DEFAULT_CREATE_MODE;
        inp.open_flags = open_flags::O_RDWR;
        inp.key_vals.add(KW_DATA_TYPE, "generic");
        if !resource.is_empty() {
            inp.key_vals.add(KW_DEST_RESC_NAME, resource);
        }
        if force {
            inp.key_vals.add(KW_FORCE_FLAG, "");
        }
        inp
    }

    pub fn open(path: &str, resource: &str, mode: FileOpenMode) -> Self {
        let mut inp = Self::new(path);
        inp.open_flags = mode.flags();
        if !resource.is_empty() {
            inp.key_vals.add(KW_DEST_RESC_NAME, resource);
        }
        inp
    }

    pub fn unlink(path: &str, force: bool) -> Self {
        let mut inp = Self::new(path);
        if force {
            inp.key_vals.add(KW_FORCE_FLAG, "");
        }
        inp
    }

    pub fn truncate(path: &str, size: i64) -> Self {
        let mut inp = Self::new(path);
        inp.data_size = size;
        inp
    }

    /// Transfer-plan probe for GET_HOST_FOR_PUT / GET_HOST_FOR_GET.
    pub fn host_probe(path: &str, resource: &str, opr_type: i32) -> Self {
        let mut inp = Self::new(path);
        inp.opr_type = opr_type;
        if !resource.is_empty() {
            inp.key_vals.add(KW_DEST_RESC_NAME, resource);
        }
        inp
    }
}

/// `DataObjCopyInp_PI`: source and destination pair used by rename and
/// server-side copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "DataObjCopyInp_PI")]
pub struct DataObjCopyInp {
    #[serde(rename = "DataObjInp_PI")]
    pub objects: Vec<DataObjInp>,
}

impl DataObjCopyInp {
    pub fn rename(src: &str, dest: &str, collection: bool) -> Self {
        let opr = if collection {
            OPR_TYPE_RENAME_COLL
        } else {
            OPR_TYPE_RENAME_DATA_OBJ
        };
        let mut src_inp = DataObjInp::new(src);
        src_inp.opr_type = opr;
        let mut dest_inp = DataObjInp::new(dest);
        dest_inp.opr_type = opr;
        Self {
            objects: vec![src_inp, dest_inp],
        }
    }

    pub fn copy(src: &str, dest: &str, resource: &str, force: bool) -> Self {
        let mut src_inp = DataObjInp::new(src);
        src_inp.opr_type = OPR_TYPE_COPY_SRC;
        let mut dest_inp = DataObjInp::new(dest);
        dest_inp.opr_type = OPR_TYPE_COPY_DEST;
        if !resource.is_empty() {
            dest_inp.key_vals.add(KW_DEST_RESC_NAME, resource);
        }
        if force {
            dest_inp.key_vals.add(KW_FORCE_FLAG, "");
        }
        Self {
            objects: vec![src_inp, dest_inp],
        }
    }
}

/// `OpenedDataObjInp_PI`: operations on an open server-side descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "OpenedDataObjInp_PI")]
pub struct OpenedDataObjInp {
    #[serde(rename = "l1descInx")]
    pub descriptor: i32,
    pub len: i32,
    pub whence: i32,
    #[serde(rename = "oprType")]
    pub opr_type: i32,
    pub offset: i64,
    #[serde(rename = "bytesWritten")]
    pub bytes_written: i64,
    #[serde(rename = "KeyValPair_PI")]
    pub key_vals: KeyValPair,
}

impl OpenedDataObjInp {
    fn new(descriptor: i32) -> Self {
        Self {
            descriptor,
            len: 0,
            whence: 0,
            opr_type: 0,
            offset: 0,
            bytes_written: 0,
            key_vals: KeyValPair::default(),
        }
    }

    pub fn seek(descriptor: i32, offset: i64, whence: Whence) -> Self {
        let mut inp = Self::new(descriptor);
        inp.offset = offset;
        inp.whence = whence as i32;
        inp
    }

    pub fn read(descriptor: i32, len: i32) -> Self {
        let mut inp = Self::new(descriptor);
        inp.len = len;
        inp
    }

    pub fn write(descriptor: i32, len: i32) -> Self {
        let mut inp = Self::new(descriptor);
        inp.len = len;
        inp
    }

    pub fn close(descriptor: i32) -> Self {
        Self::new(descriptor)
    }
}

/// `fileLseekOut_PI`: the resulting offset of a seek.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "fileLseekOut_PI")]
pub struct FileLseekOut {
    pub offset: i64,
}

/// `STR_PI`: the host a transfer got redirected to ("thisAddress" or an
/// empty string means "no redirection").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "STR_PI")]
pub struct HostStr {
    #[serde(rename = "myStr")]
    pub host: String,
}

impl HostStr {
    /// The redirection target, if the reply actually redirects.
    pub fn redirect_target(&self) -> Option<&str> {
        let host = self.host.trim();
        if host.is_empty() || host == "thisAddress" || host == "localhost" {
            None
        } else {
            Some(host)
        }
    }
}
