// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::error::IrodsError;

/// Shared counters for one session. The session owns the single instance;
/// connections hold a non-owning `Arc` handle so the Session→Connection→
/// Session cycle never materializes.
#[derive(Debug, Default)]
pub struct Metrics {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    connections_occupied: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    /// Failure counts keyed by the error's kind label.
    failures: DashMap<&'static str, u64>,
    /// Request counts keyed by API number.
    requests: DashMap<i32, u64>,
}

impl Metrics {
    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_occupied(&self) {
        self.connections_occupied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_released(&self) {
        self.connections_occupied.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn add_bytes_sent(&self, n: u64) {
        self.bytes_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_bytes_received(&self, n: u64) {
        self.bytes_received.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_api_request(&self, api: i32) {
        *self.requests.entry(api).or_insert(0) += 1;
    }

    pub fn record_failure(&self, error: &IrodsError) {
        *self.failures.entry(error.kind_label()).or_insert(0) += 1;
    }

    /// Connections currently open (opened minus closed).
    pub fn connections_open(&self) -> u64 {
        self.connections_opened
            .load(Ordering::Relaxed)
            .saturating_sub(self.connections_closed.load(Ordering::Relaxed))
    }

    /// Connections currently checked out of the pool.
    pub fn connections_occupied(&self) -> u64 {
        self.connections_occupied.load(Ordering::Relaxed)
    }

    pub fn connections_opened_total(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }

    pub fn connections_closed_total(&self) -> u64 {
        self.connections_closed.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn request_count(&self, api: i32) -> u64 {
        self.requests.get(&api).map(|v| *v).unwrap_or(0)
    }

    pub fn failure_count(&self, kind: &str) -> u64 {
        self.failures.get(kind).map(|v| *v).unwrap_or(0)
    }
}
