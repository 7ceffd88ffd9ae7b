// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Domain value types. Everything here is an immutable value that gets
//! copied into the cache; identity is always the absolute path, never the
//! catalog row id (ids can change across server restarts).

use core::fmt;

use chrono::{DateTime, Utc};

use crate::{
    error::{IrodsError, Result},
    utils,
};

/// Server version obtained during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub release_version: String,
    pub api_version: String,
    pub cookie: i32,
}

impl Version {
    /// Parses `rods4.3.1` style release strings into `(major, minor, patch)`.
    pub fn release_tuple(&self) -> Result<(u32, u32, u32)> {
        let digits = self.release_version.trim_start_matches("rods");
        let mut parts = digits.split('.');
        let mut next = |label| {
            parts
                .next()
                .and_then(|p| p.parse::<u32>().ok())
                .ok_or_else(|| {
                    IrodsError::protocol(
                        "parse release version",
                        format!("{:?} has no {label}", self.release_version),
                    )
                })
        };
        Ok((next("major")?, next("minor")?, next("patch")?))
    }

    /// Replica-access tokens for concurrent writers exist from 4.3.0 on.
    pub fn supports_replica_token(&self) -> bool {
        matches!(self.release_tuple(), Ok((maj, min, _)) if (maj, min) >= (4, 3))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// One filesystem node, the unit the entry cache stores.
#[derive(Debug, Clone)]
pub struct Entry {
    pub path: String,
    pub name: String,
    pub parent: String,
    pub kind: EntryKind,
    pub id: i64,
    pub owner_name: String,
    pub owner_zone: String,
    pub size: i64,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
    pub checksum: Option<String>,
    pub type_name: String,
    /// ACL inheritance flag; only meaningful for directories and only
    /// populated once an ACL listing observed it.
    pub inherit: bool,
}

impl Entry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn from_collection(coll: &Collection) -> Self {
        let (parent, name) = utils::split_path(&coll.path);
        Self {
            path: coll.path.clone(),
            name,
            parent,
            kind: EntryKind::Directory,
            id: coll.id,
            owner_name: coll.owner_name.clone(),
            owner_zone: coll.owner_zone.clone(),
            size: 0,
            create_time: coll.create_time,
            modify_time: coll.modify_time,
            checksum: None,
            type_name: String::new(),
            inherit: coll.inheritance,
        }
    }

    pub fn from_data_object(obj: &DataObject) -> Self {
        let (parent, name) = utils::split_path(&obj.path);
        let master = obj.master_replica();
        Self {
            path: obj.path.clone(),
            name,
            parent,
            kind: EntryKind::File,
            id: obj.id,
            owner_name: master.map(|r| r.owner_name.clone()).unwrap_or_default(),
            owner_zone: master.map(|r| r.owner_zone.clone()).unwrap_or_default(),
            size: obj.size,
            create_time: master.map(|r| r.create_time).unwrap_or_default(),
            modify_time: master.map(|r| r.modify_time).unwrap_or_default(),
            checksum: obj
                .replicas
                .iter()
                .find(|r| !r.checksum.is_empty())
                .map(|r| r.checksum.clone()),
            type_name: obj.data_type.clone(),
            inherit: false,
        }
    }
}

/// A collection row from the catalog.
#[derive(Debug, Clone)]
pub struct Collection {
    pub id: i64,
    pub path: String,
    pub name: String,
    pub owner_name: String,
    pub owner_zone: String,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
    pub inheritance: bool,
}

/// One physical copy of a data object.
#[derive(Debug, Clone, Default)]
pub struct Replica {
    pub number: i32,
    pub owner_name: String,
    pub owner_zone: String,
    pub checksum: String,
    pub status: String,
    pub resource_name: String,
    pub physical_path: String,
    pub resource_hierarchy: String,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
}

/// A data object with all replicas that share its catalog id.
#[derive(Debug, Clone)]
pub struct DataObject {
    pub id: i64,
    pub path: String,
    pub name: String,
    pub size: i64,
    pub data_type: String,
    pub replicas: Vec<Replica>,
}

impl DataObject {
    /// Replica number 0, falling back to the first one returned.
    pub fn master_replica(&self) -> Option<&Replica> {
        self.replicas
            .iter()
            .find(|r| r.number == 0)
            .or_else(|| self.replicas.first())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    User,
    Admin,
    GroupAdmin,
    Group,
}

impl UserType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "rodsuser" => Some(UserType::User),
            "rodsadmin" => Some(UserType::Admin),
            "groupadmin" => Some(UserType::GroupAdmin),
            "rodsgroup" => Some(UserType::Group),
            _ => None,
        }
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            UserType::User => "rodsuser",
            UserType::Admin => "rodsadmin",
            UserType::GroupAdmin => "groupadmin",
            UserType::Group => "rodsgroup",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub zone: String,
    pub user_type: UserType,
}

/// Access levels as stored in the catalog token table. `parse` accepts
/// both the pre-4.3 spellings ("read object") and the 4.3 ones
/// ("read_object").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Null,
    Read,
    Write,
    Own,
}

impl AccessLevel {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "null" => Some(AccessLevel::Null),
            "read object" | "read_object" | "read" => Some(AccessLevel::Read),
            "modify object" | "modify_object" | "write" => Some(AccessLevel::Write),
            "own" => Some(AccessLevel::Own),
            _ => None,
        }
    }

    /// Token used in a ModAccessControl request.
    pub fn as_request_token(&self) -> &'static str {
        match self {
            AccessLevel::Null => "null",
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::Own => "own",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_request_token())
    }
}

/// One ACL row attached to a path.
#[derive(Debug, Clone)]
pub struct Access {
    pub path: String,
    pub user_name: String,
    pub user_zone: String,
    pub user_type: UserType,
    pub access_level: AccessLevel,
}

/// One AVU triple attached to a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    pub id: i64,
    pub path: String,
    pub attribute: String,
    pub value: String,
    pub units: String,
}

/// One agent process as reported by the server.
#[derive(Debug, Clone)]
pub struct Process {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub proxy_user: String,
    pub proxy_zone: String,
    pub client_user: String,
    pub client_zone: String,
    pub client_address: String,
    pub server_address: String,
    pub client_program: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    SeekSet = 0,
    SeekCur = 1,
    SeekEnd = 2,
}

/// POSIX-style open flags as the server expects them in `openFlags`.
pub mod open_flags {
    pub const O_RDONLY: i32 = 0;
    pub const O_WRONLY: i32 = 1;
    pub const O_RDWR: i32 = 2;
    pub const O_CREAT: i32 = 64;
    pub const O_EXCL: i32 = 128;
    pub const O_TRUNC: i32 = 512;
    pub const O_APPEND: i32 = 1024;
}

/// Open modes, one per POSIX `fopen` mode string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOpenMode {
    /// `"r"`
    ReadOnly,
    /// `"r+"`
    ReadWrite,
    /// `"w"`
    WriteTruncate,
    /// `"w+"`
    ReadWriteTruncate,
    /// `"a"`
    Append,
    /// `"a+"`
    ReadAppend,
}

impl FileOpenMode {
    pub fn from_posix(mode: &str) -> Option<Self> {
        match mode {
            "r" => Some(FileOpenMode::ReadOnly),
            "r+" => Some(FileOpenMode::ReadWrite),
            "w" => Some(FileOpenMode::WriteTruncate),
            "w+" => Some(FileOpenMode::ReadWriteTruncate),
            "a" => Some(FileOpenMode::Append),
            "a+" => Some(FileOpenMode::ReadAppend),
            _ => None,
        }
    }

    pub fn flags(&self) -> i32 {
        use open_flags::*;
        match self {
            FileOpenMode::ReadOnly => O_RDONLY,
            FileOpenMode::ReadWrite => O_RDWR,
            FileOpenMode::WriteTruncate => O_WRONLY | O_CREAT | O_TRUNC,
            FileOpenMode::ReadWriteTruncate => O_RDWR | O_CREAT | O_TRUNC,
            FileOpenMode::Append => O_WRONLY | O_CREAT | O_APPEND,
            FileOpenMode::ReadAppend => O_RDWR | O_CREAT | O_APPEND,
        }
    }

    pub fn allows_read(&self) -> bool {
        matches!(
            self,
            FileOpenMode::ReadOnly
                | FileOpenMode::ReadWrite
                | FileOpenMode::ReadWriteTruncate
                | FileOpenMode::ReadAppend
        )
    }

    pub fn allows_write(&self) -> bool {
        !matches!(self, FileOpenMode::ReadOnly)
    }

    /// Whether opening a missing path falls back to creating it.
    pub fn creates_missing(&self) -> bool {
        matches!(
            self,
            FileOpenMode::WriteTruncate
                | FileOpenMode::ReadWriteTruncate
                | FileOpenMode::Append
                | FileOpenMode::ReadAppend
        )
    }

    /// Append modes position the cursor at the end right after open.
    pub fn seeks_to_end(&self) -> bool {
        matches!(self, FileOpenMode::Append | FileOpenMode::ReadAppend)
    }
}
