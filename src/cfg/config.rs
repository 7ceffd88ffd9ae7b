// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, path::PathBuf, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::enums::{AuthScheme, CSNegotiationPolicy};

pub const DEFAULT_PORT: u16 = 1247;

/// Connection identity of one iRODS account. Immutable after validation;
/// the session clones it for every connection it opens.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Account {
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Port", default = "default_port")]
    pub port: u16,
    #[serde(rename = "Zone")]
    pub zone: String,

    #[serde(rename = "ProxyUser")]
    pub proxy_user: String,
    /// Empty means "same as the proxy user".
    #[serde(default, rename = "ClientUser")]
    pub client_user: String,
    /// Empty means "same as the proxy zone".
    #[serde(default, rename = "ClientZone")]
    pub client_zone: String,

    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "AuthScheme", default = "default_auth_scheme")]
    pub auth_scheme: AuthScheme,
    #[serde(default, rename = "DefaultResource")]
    pub default_resource: String,

    #[serde(rename = "ClientServerNegotiation", default)]
    pub client_server_negotiation: bool,
    #[serde(rename = "CSNegotiationPolicy", default = "default_cs_policy")]
    pub cs_negotiation_policy: CSNegotiationPolicy,

    /// Requested lifetime of a PAM-derived password, in seconds.
    #[serde(rename = "PamTTL", default = "default_pam_ttl")]
    pub pam_ttl: i32,

    #[serde(rename = "SSL", default)]
    pub ssl: SslConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_auth_scheme() -> AuthScheme {
    AuthScheme::Native
}

fn default_cs_policy() -> CSNegotiationPolicy {
    CSNegotiationPolicy::DontCare
}

fn default_pam_ttl() -> i32 {
    1
}

/// Symmetric wrapping parameters announced after TLS escalation, plus the
/// trust configuration for the TLS handshake itself.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SslConfig {
    #[serde(rename = "CACertificateFile", default)]
    pub ca_certificate_file: Option<PathBuf>,
    /// When false a test rig may present any certificate.
    #[serde(rename = "VerifyServer", default = "default_true")]
    pub verify_server: bool,
    #[serde(rename = "EncryptionAlgorithm", default = "default_encryption_algorithm")]
    pub encryption_algorithm: String,
    #[serde(rename = "EncryptionKeySize", default = "default_key_size")]
    pub encryption_key_size: u32,
    #[serde(rename = "EncryptionSaltSize", default = "default_salt_size")]
    pub encryption_salt_size: u32,
    #[serde(rename = "HashRounds", default = "default_hash_rounds")]
    pub hash_rounds: u32,
}

fn default_true() -> bool {
    true
}

fn default_encryption_algorithm() -> String {
    "AES-256-CBC".to_string()
}

fn default_key_size() -> u32 {
    32
}

fn default_salt_size() -> u32 {
    8
}

fn default_hash_rounds() -> u32 {
    16
}

impl Default for SslConfig {
    fn default() -> Self {
        Self {
            ca_certificate_file: None,
            verify_server: true,
            encryption_algorithm: default_encryption_algorithm(),
            encryption_key_size: default_key_size(),
            encryption_salt_size: default_salt_size(),
            hash_rounds: default_hash_rounds(),
        }
    }
}

impl Account {
    /// Loads an account from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut account: Account =
            serde_yaml::from_str(&s).context("failed to parse account YAML")?;
        account.validate_and_normalize()?;
        Ok(account)
    }

    /// Validates invariants and fills derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.host.is_empty(), "Host must not be empty");
        ensure!(!self.zone.is_empty(), "Zone must not be empty");
        ensure!(!self.proxy_user.is_empty(), "ProxyUser must not be empty");

        if self.client_user.is_empty() {
            self.client_user = self.proxy_user.clone();
        }
        if self.client_zone.is_empty() {
            self.client_zone = self.zone.clone();
        }

        for user in [&self.proxy_user, &self.client_user] {
            ensure!(
                user.chars()
                    .all(|c| c.is_ascii_alphanumeric() || "._@#-".contains(c)),
                "invalid username {user:?}"
            );
        }

        ensure!(
            self.ssl.encryption_key_size > 0,
            "EncryptionKeySize must be > 0"
        );
        Ok(())
    }

    /// Same account pointed at another server, used when a transfer is
    /// redirected to a resource server.
    pub fn redirected_to(&self, host: &str, port: u16) -> Self {
        let mut account = self.clone();
        account.host = host.to_string();
        account.port = port;
        account
    }
}

/// Session-level knobs. Everything here is runtime behavior; nothing is
/// sent on the wire except `application_name`.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SessionConfig {
    #[serde(rename = "ApplicationName")]
    pub application_name: String,

    /// Hard max age before a connection is force-recycled.
    #[serde(rename = "ConnectionLifespan", with = "serde_secs", default = "default_lifespan")]
    pub connection_lifespan: Duration,
    #[serde(rename = "OperationTimeout", with = "serde_secs", default = "default_op_timeout")]
    pub operation_timeout: Duration,
    #[serde(
        rename = "ConnectionIdleTimeout",
        with = "serde_secs",
        default = "default_idle_timeout"
    )]
    pub connection_idle_timeout: Duration,

    #[serde(rename = "ConnectionMax", default = "default_connection_max")]
    pub connection_max: usize,
    /// Connections opened eagerly at session start.
    #[serde(rename = "ConnectionInitNumber", default = "default_connection_init")]
    pub connection_init_number: usize,
    /// Idle target the sweeper sheds down to.
    #[serde(rename = "ConnectionMaxIdle", default = "default_connection_max_idle")]
    pub connection_max_idle: usize,

    #[serde(rename = "TcpBufferSize", default = "default_tcp_buffer_size")]
    pub tcp_buffer_size: usize,

    /// Whether each checkout begins a server-side transaction.
    #[serde(rename = "StartNewTransaction", default)]
    pub start_new_transaction: bool,
}

fn default_lifespan() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_op_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_connection_max() -> usize {
    10
}

fn default_connection_init() -> usize {
    1
}

fn default_connection_max_idle() -> usize {
    5
}

fn default_tcp_buffer_size() -> usize {
    4 * 1024 * 1024
}

impl SessionConfig {
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            connection_lifespan: default_lifespan(),
            operation_timeout: default_op_timeout(),
            connection_idle_timeout: default_idle_timeout(),
            connection_max: default_connection_max(),
            connection_init_number: default_connection_init(),
            connection_max_idle: default_connection_max_idle(),
            tcp_buffer_size: default_tcp_buffer_size(),
            start_new_transaction: false,
        }
    }

    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(self.connection_max >= 1, "ConnectionMax must be >= 1");
        if self.connection_init_number > self.connection_max {
            self.connection_init_number = self.connection_max;
        }
        if self.connection_max_idle > self.connection_max {
            self.connection_max_idle = self.connection_max;
        }
        ensure!(self.tcp_buffer_size > 0, "TcpBufferSize must be > 0");
        Ok(())
    }
}

/// TTL override for one path prefix of the metadata cache.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CacheTimeoutSetting {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Timeout", with = "serde_secs")]
    pub timeout: Duration,
    #[serde(rename = "Inherit", default)]
    pub inherit: bool,
}

/// Filesystem façade knobs.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FsConfig {
    /// Default TTL of every cache namespace; zero means "keep forever".
    #[serde(rename = "CacheTimeout", with = "serde_secs", default = "default_cache_timeout")]
    pub cache_timeout: Duration,
    #[serde(rename = "CacheTimeoutSettings", default)]
    pub cache_timeout_settings: Vec<CacheTimeoutSetting>,
    #[serde(rename = "InvalidateParentEntryCacheImmediately", default = "default_true")]
    pub invalidate_parent_entry_cache_immediately: bool,

    #[serde(rename = "MaxParallelTransferTasks", default = "default_max_tasks")]
    pub max_parallel_transfer_tasks: u32,
    #[serde(rename = "TransferChunkSize", default = "default_chunk_size")]
    pub transfer_chunk_size: usize,
    /// Bounded retries for a transfer task that hit a transport error.
    #[serde(rename = "TransferTaskRetry", default = "default_task_retry")]
    pub transfer_task_retry: u32,
}

fn default_cache_timeout() -> Duration {
    Duration::from_secs(2 * 60)
}

fn default_max_tasks() -> u32 {
    4
}

fn default_chunk_size() -> usize {
    4 * 1024 * 1024
}

fn default_task_retry() -> u32 {
    1
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            cache_timeout: default_cache_timeout(),
            cache_timeout_settings: Vec::new(),
            invalidate_parent_entry_cache_immediately: true,
            max_parallel_transfer_tasks: default_max_tasks(),
            transfer_chunk_size: default_chunk_size(),
            transfer_task_retry: default_task_retry(),
        }
    }
}

/// Serde helpers for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
