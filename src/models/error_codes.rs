// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! iRODS error codes. A code is a negative multiple of 1000 (the main
//! error) optionally offset by a POSIX errno sub-code, e.g. `-910005`
//! is main `-910000` with sub `-5` (EIO).

use crate::error::IrodsError;

pub const SYS_FILE_DESC_OUT_OF_RANGE: i32 = -9000;
pub const OVERWRITE_WITHOUT_FORCE_FLAG: i32 = -317000;
pub const USER_FILE_DOES_NOT_EXIST: i32 = -310000;
pub const CAT_NO_ROWS_FOUND: i32 = -808000;
pub const CAT_NAME_EXISTS_AS_COLLECTION: i32 = -809000;
pub const CAT_NAME_EXISTS_AS_DATAOBJ: i32 = -810000;
pub const CAT_UNKNOWN_COLLECTION: i32 = -813000;
pub const CAT_NO_ACCESS_PERMISSION: i32 = -818000;
pub const CAT_COLLECTION_NOT_EMPTY: i32 = -821000;
pub const CAT_INVALID_AUTHENTICATION: i32 = -826000;
pub const CAT_INVALID_USER: i32 = -827000;
pub const CAT_INSUFFICIENT_PRIVILEGE_LEVEL: i32 = -830000;

/// Streaming status codes exchanged during recursive collection removal.
pub const SYS_SVR_TO_CLI_COLL_STAT: i32 = 99999996;
pub const SYS_CLI_TO_SVR_COLL_STAT_REPLY: i32 = 99999997;

/// Splits a server code into `(main, sub)`; the sub-code is the errno part.
pub fn split(code: i32) -> (i32, i32) {
    let sub = code % 1000;
    (code - sub, sub)
}

pub fn main_code(code: i32) -> i32 {
    split(code).0
}

/// Maps a negative reply status onto the domain error kinds.
pub fn to_error(api: &'static str, path: &str, code: i32) -> IrodsError {
    let (main, sub) = split(code);
    match main {
        CAT_NO_ROWS_FOUND | CAT_UNKNOWN_COLLECTION | USER_FILE_DOES_NOT_EXIST => {
            IrodsError::NotFound {
                path: path.to_string(),
            }
        }
        CAT_NAME_EXISTS_AS_COLLECTION
        | CAT_NAME_EXISTS_AS_DATAOBJ
        | OVERWRITE_WITHOUT_FORCE_FLAG => IrodsError::AlreadyExists {
            path: path.to_string(),
        },
        CAT_NO_ACCESS_PERMISSION | CAT_INSUFFICIENT_PRIVILEGE_LEVEL => {
            IrodsError::PermissionDenied {
                path: path.to_string(),
                api,
            }
        }
        CAT_INVALID_AUTHENTICATION | CAT_INVALID_USER => IrodsError::AuthFailure {
            user: path.to_string(),
            detail: format!("server code {main}"),
        },
        _ => IrodsError::Server {
            api,
            path: path.to_string(),
            main,
            sub,
        },
    }
}
