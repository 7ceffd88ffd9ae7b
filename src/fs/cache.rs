// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The multi-namespace metadata cache: nine logically independent
//! key→value stores with TTL, per-path overrides, and a negative-entry
//! store with prefix invalidation. Expiry is lazy; readers never block
//! readers.

use std::{collections::HashMap, time::Duration};

use dashmap::DashMap;
use tokio::time::Instant;

use crate::{
    cfg::config::CacheTimeoutSetting,
    models::types::{Access, Entry, Meta, User},
    utils,
};

#[derive(Debug, Clone)]
struct CacheItem<V> {
    value: V,
    expires_at: Option<Instant>,
}

/// One namespace: a concurrent map with lazy per-entry expiry.
#[derive(Debug)]
struct TtlMap<V> {
    inner: DashMap<String, CacheItem<V>>,
}

impl<V: Clone> TtlMap<V> {
    fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    fn set(&self, key: &str, value: V, ttl: Duration) {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.inner
            .insert(key.to_string(), CacheItem { value, expires_at });
    }

    fn get(&self, key: &str) -> Option<V> {
        let item = self.inner.get(key)?;
        if let Some(deadline) = item.expires_at {
            if Instant::now() >= deadline {
                drop(item);
                self.inner.remove(key);
                return None;
            }
        }
        Some(item.value.clone())
    }

    fn remove(&self, key: &str) {
        self.inner.remove(key);
    }

    /// Removes the key and everything under it ("`key/`" prefix match).
    fn remove_tree(&self, key: &str) {
        let prefix = format!("{}/", key.trim_end_matches('/'));
        let victims: Vec<String> = self
            .inner
            .iter()
            .map(|kv| kv.key().clone())
            .filter(|k| k == key || k.starts_with(&prefix))
            .collect();
        for k in victims {
            self.inner.remove(&k);
        }
    }

    fn clear(&self) {
        self.inner.clear();
    }
}

/// Key used by the zone-wide listing namespaces.
const WILDCARD: &str = "*";

#[derive(Debug)]
pub struct FileSystemCache {
    timeout: Duration,
    timeout_overrides: HashMap<String, CacheTimeoutSetting>,
    invalidate_parent_entry: bool,

    entries: TtlMap<Entry>,
    negative_entries: TtlMap<()>,
    dirs: TtlMap<Vec<String>>,
    metadata: TtlMap<Vec<Meta>>,
    acls: TtlMap<Vec<Access>>,
    group_users: TtlMap<Vec<User>>,
    user_groups: TtlMap<Vec<String>>,
    groups: TtlMap<Vec<User>>,
    users: TtlMap<Vec<User>>,
}

impl FileSystemCache {
    pub fn new(
        timeout: Duration,
        overrides: &[CacheTimeoutSetting],
        invalidate_parent_entry: bool,
    ) -> Self {
        let timeout_overrides = overrides
            .iter()
            .map(|s| (s.path.clone(), s.clone()))
            .collect();
        Self {
            timeout,
            timeout_overrides,
            invalidate_parent_entry,
            entries: TtlMap::new(),
            negative_entries: TtlMap::new(),
            dirs: TtlMap::new(),
            metadata: TtlMap::new(),
            acls: TtlMap::new(),
            group_users: TtlMap::new(),
            user_groups: TtlMap::new(),
            groups: TtlMap::new(),
            users: TtlMap::new(),
        }
    }

    /// Effective TTL for a path: exact override first, then the nearest
    /// ancestor override with `inherit`, then the default.
    fn ttl_for_path(&self, path: &str) -> Duration {
        if self.timeout_overrides.is_empty() {
            return self.timeout;
        }
        if let Some(setting) = self.timeout_overrides.get(path) {
            return setting.timeout;
        }
        for parent in utils::parent_dirs(path).iter().rev() {
            if let Some(setting) = self.timeout_overrides.get(parent) {
                if setting.inherit {
                    return setting.timeout;
                }
            }
        }
        self.timeout
    }

    // entries

    pub fn set_entry(&self, entry: &Entry) {
        self.entries
            .set(&entry.path, entry.clone(), self.ttl_for_path(&entry.path));
    }

    pub fn entry(&self, path: &str) -> Option<Entry> {
        self.entries.get(path)
    }

    pub fn remove_entry(&self, path: &str) {
        self.entries.remove(path);
    }

    /// Applies the parent-invalidation policy after a mutation of `path`.
    pub fn remove_parent_entry(&self, path: &str) {
        if self.invalidate_parent_entry {
            self.entries.remove(&utils::dirname(path));
        }
    }

    /// Drops every path-keyed namespace at and under `path`; renames and
    /// recursive removals use this.
    pub fn remove_path_tree(&self, path: &str) {
        self.entries.remove_tree(path);
        self.dirs.remove_tree(path);
        self.metadata.remove_tree(path);
        self.acls.remove_tree(path);
    }

    // negative entries

    pub fn set_negative_entry(&self, path: &str) {
        self.negative_entries.set(path, (), self.ttl_for_path(path));
    }

    pub fn has_negative_entry(&self, path: &str) -> bool {
        self.negative_entries.get(path).is_some()
    }

    pub fn remove_negative_entry(&self, path: &str) {
        self.negative_entries.remove(path);
    }

    /// Any create at or under `path` clears the whole negative subtree.
    pub fn remove_negative_entry_tree(&self, path: &str) {
        self.negative_entries.remove_tree(path);
    }

    // dir listings

    pub fn set_dir(&self, path: &str, children: Vec<String>) {
        self.dirs.set(path, children, self.ttl_for_path(path));
    }

    pub fn dir(&self, path: &str) -> Option<Vec<String>> {
        self.dirs.get(path)
    }

    pub fn remove_dir(&self, path: &str) {
        self.dirs.remove(path);
    }

    // metadata

    pub fn set_metadata(&self, path: &str, metas: Vec<Meta>) {
        self.metadata.set(path, metas, self.ttl_for_path(path));
    }

    pub fn metadata(&self, path: &str) -> Option<Vec<Meta>> {
        self.metadata.get(path)
    }

    pub fn remove_metadata(&self, path: &str) {
        self.metadata.remove(path);
    }

    // acls

    pub fn set_acls(&self, path: &str, accesses: Vec<Access>) {
        self.acls.set(path, accesses, self.ttl_for_path(path));
    }

    pub fn acls(&self, path: &str) -> Option<Vec<Access>> {
        self.acls.get(path)
    }

    pub fn remove_acls(&self, path: &str) {
        self.acls.remove(path);
    }

    // user / group listings

    pub fn set_group_users(&self, group: &str, users: Vec<User>) {
        self.group_users.set(group, users, self.timeout);
    }

    pub fn group_users(&self, group: &str) -> Option<Vec<User>> {
        self.group_users.get(group)
    }

    pub fn set_user_groups(&self, user: &str, groups: Vec<String>) {
        self.user_groups.set(user, groups, self.timeout);
    }

    pub fn user_groups(&self, user: &str) -> Option<Vec<String>> {
        self.user_groups.get(user)
    }

    pub fn set_groups(&self, groups: Vec<User>) {
        self.groups.set(WILDCARD, groups, self.timeout);
    }

    pub fn groups(&self) -> Option<Vec<User>> {
        self.groups.get(WILDCARD)
    }

    pub fn set_users(&self, users: Vec<User>) {
        self.users.set(WILDCARD, users, self.timeout);
    }

    pub fn users(&self) -> Option<Vec<User>> {
        self.users.get(WILDCARD)
    }

    /// Admin mutations drop every user/group namespace at once.
    pub fn clear_user_caches(&self) {
        self.group_users.clear();
        self.user_groups.clear();
        self.groups.clear();
        self.users.clear();
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.negative_entries.clear();
        self.dirs.clear();
        self.metadata.clear();
        self.acls.clear();
        self.clear_user_caches();
    }
}
