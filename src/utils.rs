// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use md5::{Digest, Md5};
use tokio::{fs::File, io::AsyncReadExt};

use crate::error::{IrodsError, Result};

/// Joins a collection path and a child name with exactly one separator.
pub fn join_path(dir_path: &str, name: &str) -> String {
    format!("{}/{}", dir_path.trim_end_matches('/'), name)
}

/// Splits an absolute path into `(parent, name)`.
pub fn split_path(path: &str) -> (String, String) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/".to_string(), trimmed[1..].to_string()),
        Some(idx) => (trimmed[..idx].to_string(), trimmed[idx + 1..].to_string()),
        None => ("/".to_string(), trimmed.to_string()),
    }
}

pub fn dirname(path: &str) -> String {
    split_path(path).0
}

pub fn basename(path: &str) -> String {
    split_path(path).1
}

pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Collapses duplicate separators and strips any trailing one ("/" stays "/").
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(path.len());
    let mut prev_sep = false;
    for c in path.chars() {
        if c == '/' {
            if !prev_sep {
                out.push(c);
            }
            prev_sep = true;
        } else {
            out.push(c);
            prev_sep = false;
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Depth of the path: "/" is 0, "/a" is 0, "/a/b" is 1, relative paths are -1.
pub fn path_depth(path: &str) -> i32 {
    if !is_absolute(path) {
        return -1;
    }
    let cleaned = clean_path(path);
    if cleaned == "/" {
        return 0;
    }
    cleaned[1..].split('/').count() as i32 - 1
}

/// All parent directories of the path, ordered from the root down
/// ("/a/b/c" yields ["/", "/a", "/a/b"]).
pub fn parent_dirs(path: &str) -> Vec<String> {
    let cleaned = clean_path(path);
    let mut parents = Vec::new();
    if cleaned == "/" {
        return parents;
    }

    let mut cur = cleaned;
    while cur != "/" {
        let parent = dirname(&cur);
        parents.push(parent.clone());
        cur = parent;
    }

    parents.sort_by_key(|p| p.len());
    parents
}

/// Parses a catalog timestamp ("01598471234", epoch seconds, possibly
/// zero-padded). Empty or zero values map to the epoch.
pub fn parse_catalog_time(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(Utc.timestamp_opt(0, 0).single().unwrap_or_default());
    }
    let secs: i64 = trimmed
        .trim_start_matches('0')
        .parse()
        .or_else(|e| if trimmed.chars().all(|c| c == '0') { Ok(0) } else { Err(e) })
        .map_err(|e| IrodsError::protocol("parse catalog time", format!("{value:?}: {e}")))?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| IrodsError::protocol("parse catalog time", format!("{value:?} out of range")))
}

/// MD5 of a local file, streamed in 1 MiB blocks, as lowercase hex.
pub async fn md5_hex_of_file(path: impl AsRef<Path>) -> Result<String> {
    let mut file = File::open(path.as_ref())
        .await
        .map_err(|e| IrodsError::transport("open local file", e))?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| IrodsError::transport("read local file", e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
