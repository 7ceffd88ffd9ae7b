// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use chrono::Utc;
use irods_client_rs::{
    cfg::config::CacheTimeoutSetting,
    fs::cache::FileSystemCache,
    models::types::{Entry, EntryKind},
};

fn entry(path: &str, kind: EntryKind) -> Entry {
    let (parent, name) = irods_client_rs::utils::split_path(path);
    Entry {
        path: path.to_string(),
        name,
        parent,
        kind,
        id: 1,
        owner_name: "rods".to_string(),
        owner_zone: "zone".to_string(),
        size: 0,
        create_time: Utc::now(),
        modify_time: Utc::now(),
        checksum: None,
        type_name: String::new(),
        inherit: false,
    }
}

fn cache_with(overrides: &[CacheTimeoutSetting]) -> FileSystemCache {
    FileSystemCache::new(Duration::from_secs(120), overrides, true)
}

#[test]
fn test_entry_cache_round_trip() {
    let cache = cache_with(&[]);
    let e = entry("/zone/home/a", EntryKind::Directory);
    cache.set_entry(&e);
    assert_eq!(cache.entry("/zone/home/a").map(|e| e.path), Some(e.path));
    cache.remove_entry("/zone/home/a");
    assert!(cache.entry("/zone/home/a").is_none());
}

#[test]
fn test_ttl_override_expires_immediately() {
    let overrides = [CacheTimeoutSetting {
        path: "/zone/volatile".to_string(),
        timeout: Duration::from_millis(1),
        inherit: true,
    }];
    let cache = cache_with(&overrides);

    let e = entry("/zone/volatile/x", EntryKind::File);
    cache.set_entry(&e);
    std::thread::sleep(Duration::from_millis(20));
    assert!(
        cache.entry("/zone/volatile/x").is_none(),
        "inherited override must expire the child"
    );

    let stable = entry("/zone/home/a", EntryKind::File);
    cache.set_entry(&stable);
    assert!(cache.entry("/zone/home/a").is_some());
}

#[test]
fn test_ttl_override_without_inherit_only_hits_exact_path() {
    let overrides = [CacheTimeoutSetting {
        path: "/zone/volatile".to_string(),
        timeout: Duration::from_millis(1),
        inherit: false,
    }];
    let cache = cache_with(&overrides);

    let child = entry("/zone/volatile/x", EntryKind::File);
    cache.set_entry(&child);
    std::thread::sleep(Duration::from_millis(20));
    assert!(
        cache.entry("/zone/volatile/x").is_some(),
        "non-inherited override must not apply below the exact path"
    );
}

#[test]
fn test_negative_entry_prefix_invalidation() {
    let cache = cache_with(&[]);
    cache.set_negative_entry("/zone/a");
    cache.set_negative_entry("/zone/a/b");
    cache.set_negative_entry("/zone/a/b/c");
    cache.set_negative_entry("/zone/ab");

    cache.remove_negative_entry_tree("/zone/a");
    assert!(!cache.has_negative_entry("/zone/a"));
    assert!(!cache.has_negative_entry("/zone/a/b"));
    assert!(!cache.has_negative_entry("/zone/a/b/c"));
    // sibling with a shared string prefix but different path component
    assert!(cache.has_negative_entry("/zone/ab"));
}

#[test]
fn test_parent_entry_invalidation_policy() {
    let cache = cache_with(&[]);
    let parent = entry("/zone/home", EntryKind::Directory);
    cache.set_entry(&parent);
    cache.remove_parent_entry("/zone/home/child");
    assert!(cache.entry("/zone/home").is_none());

    let no_invalidate = FileSystemCache::new(Duration::from_secs(120), &[], false);
    no_invalidate.set_entry(&parent);
    no_invalidate.remove_parent_entry("/zone/home/child");
    assert!(no_invalidate.entry("/zone/home").is_some());
}

#[test]
fn test_dir_cache_and_tree_removal() {
    let cache = cache_with(&[]);
    cache.set_dir("/zone/home", vec!["a".to_string(), "b".to_string()]);
    assert_eq!(cache.dir("/zone/home").map(|d| d.len()), Some(2));

    cache.set_entry(&entry("/zone/home/a", EntryKind::File));
    cache.set_entry(&entry("/zone/home/a/b", EntryKind::File));
    cache.remove_path_tree("/zone/home/a");
    assert!(cache.entry("/zone/home/a").is_none());
    assert!(cache.entry("/zone/home/a/b").is_none());
    assert!(cache.dir("/zone/home").is_some());
}
