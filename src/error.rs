// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{io, time::Duration};

use thiserror::Error;

use crate::cfg::enums::CSNegotiationPolicy;

pub type Result<T, E = IrodsError> = std::result::Result<T, E>;

/// Error kinds surfaced by the library. `Transport` and `Protocol` poison
/// the connection they occurred on and are never retried at this layer.
#[derive(Debug, Error)]
pub enum IrodsError {
    #[error("transport failure during {action}")]
    Transport {
        action: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("protocol failure during {action}: {detail}")]
    Protocol {
        action: &'static str,
        detail: String,
    },

    #[error("authentication rejected for {user}: {detail}")]
    AuthFailure { user: String, detail: String },

    #[error("client/server negotiation incompatible: client {client}, server {server}")]
    Negotiation {
        client: CSNegotiationPolicy,
        server: CSNegotiationPolicy,
    },

    #[error("{path}: not found")]
    NotFound { path: String },

    #[error("{path}: already exists")]
    AlreadyExists { path: String },

    #[error("{path}: permission denied ({api})")]
    PermissionDenied { path: String, api: &'static str },

    #[error("{api} failed on {path}: server error {main} (sub {sub})")]
    Server {
        api: &'static str,
        path: String,
        main: i32,
        sub: i32,
    },

    #[error("{action} cancelled")]
    Cancelled { action: &'static str },

    #[error("timed out waiting for a pooled connection after {waited:?}")]
    PoolExhausted { waited: Duration },
}

impl IrodsError {
    pub fn transport(action: &'static str, source: io::Error) -> Self {
        Self::Transport { action, source }
    }

    pub fn protocol(action: &'static str, detail: impl Into<String>) -> Self {
        Self::Protocol {
            action,
            detail: detail.into(),
        }
    }

    /// True for errors that make the connection unusable.
    pub fn poisons_connection(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Protocol { .. } | Self::Cancelled { .. }
        )
    }

    /// True for errors a parallel-transfer task may retry (bounded).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Stable label used by the failure metrics.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Protocol { .. } => "protocol",
            Self::AuthFailure { .. } => "auth",
            Self::Negotiation { .. } => "negotiation",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::Server { .. } => "server",
            Self::Cancelled { .. } => "cancelled",
            Self::PoolExhausted { .. } => "pool_exhausted",
        }
    }
}
