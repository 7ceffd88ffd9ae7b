// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The filesystem façade: path-oriented operations multiplexed onto
//! pooled connections, coordinated with the multi-namespace cache.

pub mod cache;
pub mod file;
pub mod transfer;

use std::{path::Path, sync::Arc};

use tracing::debug;

pub use crate::fs::{file::FileHandle, transfer::ProgressCallback};
use crate::{
    cfg::config::FsConfig,
    client::{connection::Connection, metrics::Metrics, session::Session},
    error::{IrodsError, Result},
    fs::cache::FileSystemCache,
    handlers::{access, collection, data_object, metadata, process, transfer as transfer_api, user},
    models::types::{
        Access, AccessLevel, Entry, EntryKind, FileOpenMode, Meta, Process, User, Whence,
    },
    utils,
};

pub struct FileSystem {
    session: Arc<Session>,
    config: FsConfig,
    cache: FileSystemCache,
}

impl FileSystem {
    pub fn new(session: Arc<Session>, config: FsConfig) -> Self {
        let cache = FileSystemCache::new(
            config.cache_timeout,
            &config.cache_timeout_settings,
            config.invalidate_parent_entry_cache_immediately,
        );
        Self {
            session,
            config,
            cache,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        self.session.metrics()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Shuts the underlying session down.
    pub async fn release(self) {
        self.session.release().await;
    }

    fn resource_or_default<'a>(&'a self, resource: &'a str) -> &'a str {
        if resource.is_empty() {
            &self.session.account().default_resource
        } else {
            resource
        }
    }

    // ── stat and existence ──────────────────────────────────────────────

    /// Entry cache, then negative cache, then the catalog: first as a
    /// collection at `path`, then as a data object under its parent.
    pub async fn stat(&self, path: &str) -> Result<Entry> {
        let path = utils::clean_path(path);
        if let Some(entry) = self.cache.entry(&path) {
            return Ok(entry);
        }
        if self.cache.has_negative_entry(&path) {
            return Err(IrodsError::NotFound { path });
        }

        let conn = self.session.acquire_connection().await?;
        let result = stat_uncached(&conn, &path).await;
        conn.release().await;

        match result {
            Ok(entry) => {
                self.cache.set_entry(&entry);
                Ok(entry)
            }
            Err(e) if e.is_not_found() => {
                debug!("negative-caching {path}");
                self.cache.set_negative_entry(&path);
                Err(IrodsError::NotFound { path })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn exists_dir(&self, path: &str) -> Result<bool> {
        match self.stat(path).await {
            Ok(entry) => Ok(entry.is_dir()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn exists_file(&self, path: &str) -> Result<bool> {
        match self.stat(path).await {
            Ok(entry) => Ok(!entry.is_dir()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ── listing ─────────────────────────────────────────────────────────

    /// Children of a collection, lexicographically ordered by name.
    pub async fn list(&self, path: &str) -> Result<Vec<Entry>> {
        let path = utils::clean_path(path);

        if let Some(names) = self.cache.dir(&path) {
            let cached: Option<Vec<Entry>> = names
                .iter()
                .map(|name| self.cache.entry(&utils::join_path(&path, name)))
                .collect();
            if let Some(entries) = cached {
                return Ok(entries);
            }
            // some child entries expired; refetch the listing
        }

        let conn = self.session.acquire_connection().await?;
        let result = async {
            let coll = collection::get_collection(&conn, &path).await?;
            let subs = collection::list_sub_collections(&conn, &path).await?;
            let objects = data_object::list_data_objects(&conn, &coll).await?;
            Ok((subs, objects))
        }
        .await;
        conn.release().await;
        let (subs, objects) = result?;

        let mut entries: Vec<Entry> = subs
            .iter()
            .map(Entry::from_collection)
            .chain(objects.iter().map(Entry::from_data_object))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        for entry in &entries {
            self.cache.set_entry(entry);
        }
        self.cache
            .set_dir(&path, entries.iter().map(|e| e.name.clone()).collect());
        Ok(entries)
    }

    // ── directories ─────────────────────────────────────────────────────

    pub async fn make_dir(&self, path: &str, recursive: bool) -> Result<()> {
        let path = utils::clean_path(path);
        let conn = self.session.acquire_connection().await?;

        let result = async {
            if recursive {
                let mut targets = utils::parent_dirs(&path);
                targets.push(path.clone());
                for target in targets {
                    if target == "/" {
                        continue;
                    }
                    if collection::get_collection(&conn, &target).await.is_ok() {
                        continue;
                    }
                    collection::create_collection(&conn, &target, true).await?;
                    self.invalidate_after_create(&target);
                }
            } else {
                collection::create_collection(&conn, &path, false).await?;
                self.invalidate_after_create(&path);
            }
            Ok(())
        }
        .await;

        conn.release().await;
        result
    }

    pub async fn remove_dir(&self, path: &str, recursive: bool, force: bool) -> Result<()> {
        let path = utils::clean_path(path);
        let conn = self.session.acquire_connection().await?;
        let result = collection::delete_collection(&conn, &path, recursive, force).await;
        conn.release().await;
        result?;

        self.cache.remove_path_tree(&path);
        self.cache.remove_dir(&utils::dirname(&path));
        self.cache.remove_parent_entry(&path);
        Ok(())
    }

    // ── files ───────────────────────────────────────────────────────────

    pub async fn remove_file(&self, path: &str, force: bool) -> Result<()> {
        let path = utils::clean_path(path);
        let conn = self.session.acquire_connection().await?;
        let result = data_object::delete_data_object(&conn, &path, force).await;
        conn.release().await;
        result?;

        self.cache.remove_entry(&path);
        self.cache.remove_metadata(&path);
        self.cache.remove_acls(&path);
        self.cache.remove_dir(&utils::dirname(&path));
        self.cache.remove_parent_entry(&path);
        Ok(())
    }

    /// Renames a file or directory, dispatching on the source's kind.
    pub async fn rename(&self, src: &str, dest: &str) -> Result<()> {
        let src = utils::clean_path(src);
        let dest = utils::clean_path(dest);
        let entry = self.stat(&src).await?;

        let conn = self.session.acquire_connection().await?;
        let result = match entry.kind {
            EntryKind::Directory => collection::rename_collection(&conn, &src, &dest).await,
            EntryKind::File => data_object::rename_data_object(&conn, &src, &dest).await,
        };
        conn.release().await;
        result?;

        self.cache.remove_path_tree(&src);
        self.cache.remove_path_tree(&dest);
        self.cache.remove_negative_entry_tree(&dest);
        self.cache.remove_dir(&utils::dirname(&src));
        self.cache.remove_dir(&utils::dirname(&dest));
        self.cache.remove_parent_entry(&src);
        self.cache.remove_parent_entry(&dest);
        Ok(())
    }

    /// Server-side copy of a data object.
    pub async fn copy(&self, src: &str, dest: &str, force: bool) -> Result<()> {
        let src = utils::clean_path(src);
        let dest = utils::clean_path(dest);

        let conn = self.session.acquire_connection().await?;
        let result = data_object::copy_data_object(&conn, &src, &dest, "", force).await;
        conn.release().await;
        result?;

        self.invalidate_after_create(&dest);
        Ok(())
    }

    pub async fn truncate(&self, path: &str, size: i64) -> Result<()> {
        let path = utils::clean_path(path);
        let conn = self.session.acquire_connection().await?;
        let result = data_object::truncate_data_object(&conn, &path, size).await;
        conn.release().await;
        result?;

        self.cache.remove_entry(&path);
        self.cache.remove_dir(&utils::dirname(&path));
        self.cache.remove_parent_entry(&path);
        Ok(())
    }

    // ── open files ──────────────────────────────────────────────────────

    /// Opens (or, for write modes, creates) a data object. The returned
    /// handle owns its pooled connection until closed.
    pub async fn open_file(&self, path: &str, resource: &str, mode: FileOpenMode) -> Result<FileHandle> {
        let path = utils::clean_path(path);
        let resource = self.resource_or_default(resource).to_string();
        let conn = self.session.acquire_connection().await?;

        let opened = async {
            match data_object::open_data_object(&conn, &path, &resource, mode).await {
                Ok(fd) => Ok((fd, false)),
                Err(e) if e.is_not_found() && mode.creates_missing() => {
                    let fd = data_object::create_data_object(&conn, &path, &resource, false).await?;
                    Ok((fd, true))
                }
                Err(e) => Err(e),
            }
        }
        .await;

        let (descriptor, created) = match opened {
            Ok(v) => v,
            Err(e) => {
                conn.release().await;
                return Err(e);
            }
        };

        let mut offset = 0;
        if mode.seeks_to_end() && !created {
            match data_object::seek_data_object(&conn, descriptor, 0, Whence::SeekEnd).await {
                Ok(end) => offset = end,
                Err(e) => {
                    conn.release().await;
                    return Err(e);
                }
            }
        }

        if created {
            self.invalidate_after_create(&path);
        }
        Ok(FileHandle::new(conn, descriptor, path, mode, offset))
    }

    /// [`Self::open_file`] with a POSIX `fopen` mode string
    /// (`"r"`, `"r+"`, `"w"`, `"w+"`, `"a"`, `"a+"`).
    pub async fn open_file_posix(
        &self,
        path: &str,
        resource: &str,
        mode: &str,
    ) -> Result<FileHandle> {
        let mode = FileOpenMode::from_posix(mode).ok_or_else(|| {
            IrodsError::protocol("open file", format!("unknown open mode {mode:?}"))
        })?;
        self.open_file(path, resource, mode).await
    }

    /// Closes a handle and applies write-visibility invalidation.
    pub async fn close_file(&self, handle: FileHandle) -> Result<()> {
        let path = handle.path().to_string();
        let dirty = handle.close().await?;
        if dirty {
            self.invalidate_after_create(&path);
        }
        Ok(())
    }

    // ── transfers ───────────────────────────────────────────────────────

    pub async fn upload_file(
        &self,
        local_path: impl AsRef<Path>,
        irods_path: &str,
        resource: &str,
        overwrite: bool,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let dest = utils::clean_path(irods_path);
        let resource = self.resource_or_default(resource).to_string();
        transfer::upload_sequential(
            &self.session,
            &self.config,
            local_path.as_ref(),
            &dest,
            &resource,
            overwrite,
            None,
            progress.as_ref(),
        )
        .await?;
        self.invalidate_after_create(&dest);
        Ok(())
    }

    pub async fn upload_file_parallel(
        &self,
        local_path: impl AsRef<Path>,
        irods_path: &str,
        resource: &str,
        tasks: u32,
        overwrite: bool,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let dest = utils::clean_path(irods_path);
        let resource = self.resource_or_default(resource).to_string();
        let redirect = self.transfer_redirect_for_put(&dest, &resource).await?;
        transfer::upload_parallel(
            &self.session,
            &self.config,
            local_path.as_ref(),
            &dest,
            &resource,
            tasks,
            overwrite,
            redirect.as_deref(),
            progress.as_ref(),
        )
        .await?;
        self.invalidate_after_create(&dest);
        Ok(())
    }

    /// Parallel upload that honors the catalog provider's redirection to
    /// a resource server.
    pub async fn upload_file_to_resource_server(
        &self,
        local_path: impl AsRef<Path>,
        irods_path: &str,
        resource: &str,
        overwrite: bool,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        self.upload_file_parallel(local_path, irods_path, resource, 0, overwrite, progress)
            .await
    }

    pub async fn download_file(
        &self,
        irods_path: &str,
        resource: &str,
        local_path: impl AsRef<Path>,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let src = utils::clean_path(irods_path);
        let resource = self.resource_or_default(resource).to_string();
        let entry = self.stat(&src).await?;
        if entry.is_dir() {
            return Err(IrodsError::protocol("download", "path is a collection"));
        }
        transfer::download_sequential(
            &self.session,
            &self.config,
            &src,
            &resource,
            local_path.as_ref(),
            entry.size,
            None,
            progress.as_ref(),
        )
        .await
    }

    /// Parallel download that honors resource-server redirection.
    pub async fn download_file_from_resource_server(
        &self,
        irods_path: &str,
        resource: &str,
        local_path: impl AsRef<Path>,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let src = utils::clean_path(irods_path);
        let resource = self.resource_or_default(resource).to_string();
        let entry = self.stat(&src).await?;
        if entry.is_dir() {
            return Err(IrodsError::protocol("download", "path is a collection"));
        }

        let conn = self.session.acquire_connection().await?;
        let redirect = transfer_api::get_host_for_get(&conn, &src, &resource).await;
        conn.release().await;
        let redirect = self.filter_redirect(redirect?);

        transfer::download_parallel(
            &self.session,
            &self.config,
            &src,
            &resource,
            local_path.as_ref(),
            entry.size,
            0,
            redirect.as_deref(),
            progress.as_ref(),
        )
        .await
    }

    async fn transfer_redirect_for_put(&self, dest: &str, resource: &str) -> Result<Option<String>> {
        let conn = self.session.acquire_connection().await?;
        let redirect = transfer_api::get_host_for_put(&conn, dest, resource).await;
        conn.release().await;
        Ok(self.filter_redirect(redirect?))
    }

    /// A redirection back to the host we already talk to is not one.
    fn filter_redirect(&self, redirect: Option<String>) -> Option<String> {
        redirect.filter(|host| *host != self.session.account().host)
    }

    // ── ACLs ────────────────────────────────────────────────────────────

    /// Lists the ACL of a path; for directories this also refreshes the
    /// inheritance flag on the cached entry.
    pub async fn list_acls(&self, path: &str) -> Result<Vec<Access>> {
        let path = utils::clean_path(path);
        if let Some(acls) = self.cache.acls(&path) {
            return Ok(acls);
        }

        let entry = self.stat(&path).await?;
        let conn = self.session.acquire_connection().await?;
        let result = async {
            let accesses = access::list_accesses(&conn, entry.kind, &path).await?;
            let inherit = if entry.is_dir() {
                Some(collection::get_collection(&conn, &path).await?.inheritance)
            } else {
                None
            };
            Ok((accesses, inherit))
        }
        .await;
        conn.release().await;
        let (accesses, inherit) = result?;

        if let Some(inherit) = inherit {
            let mut refreshed = entry;
            refreshed.inherit = inherit;
            self.cache.set_entry(&refreshed);
        }
        self.cache.set_acls(&path, accesses.clone());
        Ok(accesses)
    }

    pub async fn set_acl(
        &self,
        path: &str,
        user: &str,
        zone: &str,
        level: AccessLevel,
        recursive: bool,
        as_admin: bool,
    ) -> Result<()> {
        let path = utils::clean_path(path);
        let conn = self.session.acquire_connection().await?;
        let result = access::set_access(&conn, &path, user, zone, level, recursive, as_admin).await;
        conn.release().await;
        result?;

        self.cache.remove_acls(&path);
        Ok(())
    }

    /// Sets the collection inheritance flag.
    pub async fn set_acl_inherit(&self, path: &str, inherit: bool, recursive: bool) -> Result<()> {
        let path = utils::clean_path(path);
        let conn = self.session.acquire_connection().await?;
        let result = access::set_access_inherit(&conn, &path, inherit, recursive).await;
        conn.release().await;
        result?;

        self.cache.remove_acls(&path);
        self.cache.remove_entry(&path);
        Ok(())
    }

    // ── metadata ────────────────────────────────────────────────────────

    pub async fn list_metadata(&self, path: &str) -> Result<Vec<Meta>> {
        let path = utils::clean_path(path);
        if let Some(metas) = self.cache.metadata(&path) {
            return Ok(metas);
        }

        let entry = self.stat(&path).await?;
        let conn = self.session.acquire_connection().await?;
        let result = metadata::list_metadata(&conn, entry.kind, &path).await;
        conn.release().await;
        let metas = result?;

        self.cache.set_metadata(&path, metas.clone());
        Ok(metas)
    }

    pub async fn add_metadata(
        &self,
        path: &str,
        attribute: &str,
        value: &str,
        units: &str,
    ) -> Result<()> {
        let path = utils::clean_path(path);
        let entry = self.stat(&path).await?;
        let conn = self.session.acquire_connection().await?;
        let result =
            metadata::add_metadata(&conn, entry.kind, &path, attribute, value, units).await;
        conn.release().await;
        result?;

        self.cache.remove_metadata(&path);
        Ok(())
    }

    pub async fn delete_metadata(
        &self,
        path: &str,
        attribute: &str,
        value: &str,
        units: &str,
    ) -> Result<()> {
        let path = utils::clean_path(path);
        let entry = self.stat(&path).await?;
        let conn = self.session.acquire_connection().await?;
        let result =
            metadata::delete_metadata(&conn, entry.kind, &path, attribute, value, units).await;
        conn.release().await;
        result?;

        self.cache.remove_metadata(&path);
        Ok(())
    }

    // ── users, groups, processes ────────────────────────────────────────

    pub async fn list_users(&self) -> Result<Vec<User>> {
        if let Some(users) = self.cache.users() {
            return Ok(users);
        }
        let conn = self.session.acquire_connection().await?;
        let result = user::list_users(&conn).await;
        conn.release().await;
        let users = result?;
        self.cache.set_users(users.clone());
        Ok(users)
    }

    pub async fn list_groups(&self) -> Result<Vec<User>> {
        if let Some(groups) = self.cache.groups() {
            return Ok(groups);
        }
        let conn = self.session.acquire_connection().await?;
        let result = user::list_groups(&conn).await;
        conn.release().await;
        let groups = result?;
        self.cache.set_groups(groups.clone());
        Ok(groups)
    }

    pub async fn list_group_members(&self, group: &str) -> Result<Vec<User>> {
        if let Some(users) = self.cache.group_users(group) {
            return Ok(users);
        }
        let conn = self.session.acquire_connection().await?;
        let result = user::list_group_members(&conn, group).await;
        conn.release().await;
        let users = result?;
        self.cache.set_group_users(group, users.clone());
        Ok(users)
    }

    pub async fn list_user_groups(&self, username: &str) -> Result<Vec<String>> {
        if let Some(groups) = self.cache.user_groups(username) {
            return Ok(groups);
        }
        let conn = self.session.acquire_connection().await?;
        let result = user::list_user_groups(&conn, username).await;
        conn.release().await;
        let groups = result?;
        self.cache.set_user_groups(username, groups.clone());
        Ok(groups)
    }

    pub async fn list_processes(&self) -> Result<Vec<Process>> {
        let conn = self.session.acquire_connection().await?;
        let result = process::list_processes(&conn).await;
        conn.release().await;
        result
    }

    pub async fn stat_process(&self, server_address: &str) -> Result<Vec<Process>> {
        let conn = self.session.acquire_connection().await?;
        let result = process::stat_processes(&conn, server_address).await;
        conn.release().await;
        result
    }

    // ── cache plumbing ──────────────────────────────────────────────────

    /// Invalidation after anything appeared at `path`: the negative
    /// subtree is gone, the parent listing changed, and (policy
    /// permitting) the parent entry is stale.
    fn invalidate_after_create(&self, path: &str) {
        self.cache.remove_entry(path);
        self.cache.remove_negative_entry_tree(path);
        self.cache.remove_dir(&utils::dirname(path));
        self.cache.remove_parent_entry(path);
    }
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystem")
            .field("session", &self.session)
            .finish()
    }
}

async fn stat_uncached(conn: &Connection, path: &str) -> Result<Entry> {
    match collection::get_collection(conn, path).await {
        Ok(coll) => return Ok(Entry::from_collection(&coll)),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    let (parent, name) = utils::split_path(path);
    let coll = collection::get_collection(conn, &parent)
        .await
        .map_err(|e| match e {
            IrodsError::NotFound { .. } => IrodsError::NotFound {
                path: path.to_string(),
            },
            other => other,
        })?;
    let object = data_object::get_data_object(conn, &coll, &name).await?;
    Ok(Entry::from_data_object(&object))
}
