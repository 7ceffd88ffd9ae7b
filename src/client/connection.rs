// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fmt::Debug,
    io,
    pin::Pin,
    sync::{
        Arc,
        Mutex as StdMutex,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
    time::Duration,
};

use bytes::{Bytes, BytesMut};
use once_cell::sync::OnceCell;
use rand::RngExt;
use serde::{Serialize, de::DeserializeOwned};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf},
    net::{TcpSocket, TcpStream},
    sync::{Mutex, MutexGuard},
    time::Instant,
};
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cfg::{config::Account, config::SessionConfig, enums::AuthScheme, enums::NegotiationOutcome},
    client::{common::io_with_timeout, metrics::Metrics},
    error::{IrodsError, Result},
    models::{
        api,
        auth::{AuthChallenge, AuthResponse, PamAuthReply, PamAuthRequest, native_auth_digest},
        codec,
        error_codes,
        message::{
            MAX_SEGMENT_LEN, MSG_TYPE_CONNECT, MSG_TYPE_CS_NEG, MSG_TYPE_DISCONNECT,
            MSG_TYPE_SHARED_SECRET, Message, MessageHeader, api_message, api_message_empty,
        },
        negotiation::{self, CsNegotiation},
        startup::{StartupPack, VersionReply},
        transaction::EndTransactionInp,
        types::Version,
    },
};

/// Lifecycle of one connection. `Closed` is terminal; protocol and
/// transport errors route through `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Negotiating,
    Authenticating,
    Idle,
    Busy,
    Closing,
    Closed,
}

/// The socket, plain or TLS-escalated.
#[derive(Debug)]
pub enum ConnStream {
    Tcp(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl ConnStream {
    pub fn is_tls(&self) -> bool {
        matches!(self, ConnStream::Tls(_))
    }
}

impl AsyncRead for ConnStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ConnStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            ConnStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ConnStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            ConnStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            ConnStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ConnStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            ConnStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ConnStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            ConnStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// One authenticated connection to an iRODS server.
///
/// Requests are strictly serialized: [`Connection::lock`] hands out the
/// stream guard, and every exchange holds it from the first byte written
/// until the full reply (including the binary stream) is consumed.
#[derive(Debug)]
pub struct Connection {
    account: Account,
    config: Arc<SessionConfig>,
    stream: Mutex<Option<ConnStream>>,
    state: StdMutex<ConnectionState>,
    version: OnceCell<Version>,
    created_at: Instant,
    last_used: StdMutex<Instant>,
    connected: AtomicBool,
    failed: AtomicBool,
    open_accounted: AtomicBool,
    close_accounted: AtomicBool,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
}

impl Connection {
    /// Establishes, negotiates, and authenticates a new connection.
    pub async fn connect(
        account: Account,
        config: Arc<SessionConfig>,
        metrics: Arc<Metrics>,
        cancel: CancellationToken,
    ) -> Result<Arc<Self>> {
        let conn = Arc::new(Self {
            account,
            config,
            stream: Mutex::new(None),
            state: StdMutex::new(ConnectionState::New),
            version: OnceCell::new(),
            created_at: Instant::now(),
            last_used: StdMutex::new(Instant::now()),
            connected: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            open_accounted: AtomicBool::new(false),
            close_accounted: AtomicBool::new(false),
            metrics,
            cancel,
        });
        conn.establish().await?;
        Ok(conn)
    }

    async fn establish(&self) -> Result<()> {
        let timeout = self.config.operation_timeout;
        self.set_state(ConnectionState::Connecting);

        let addr = format!("{}:{}", self.account.host, self.account.port);
        debug!("connecting to {addr}");
        let sock_addr = io_with_timeout(
            "resolve host",
            async {
                tokio::net::lookup_host(&addr).await.and_then(|mut it| {
                    it.next().ok_or_else(|| {
                        io::Error::new(io::ErrorKind::AddrNotAvailable, "host resolved to nothing")
                    })
                })
            },
            timeout,
            &self.cancel,
        )
        .await?;

        let socket = if sock_addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|e| IrodsError::transport("connect", e))?;
        if self.config.tcp_buffer_size > 0 {
            let size = self.config.tcp_buffer_size as u32;
            let _ = socket.set_recv_buffer_size(size);
            let _ = socket.set_send_buffer_size(size);
        }

        let tcp = io_with_timeout("connect", socket.connect(sock_addr), timeout, &self.cancel)
            .await?;
        tcp.set_nodelay(true)
            .map_err(|e| IrodsError::transport("connect", e))?;

        let mut stream = ConnStream::Tcp(tcp);

        let startup = StartupPack::new(&self.account, &self.config.application_name);
        let startup_msg = Message {
            msg_type: MSG_TYPE_CONNECT.to_string(),
            int_info: 0,
            body: codec::marshal(&startup)?.into_bytes(),
            error: Vec::new(),
            bs: Bytes::new(),
        };
        send_message(&mut stream, &startup_msg, timeout, &self.cancel, &self.metrics).await?;

        self.set_state(ConnectionState::Negotiating);

        let mut use_ssl = false;
        let mut reply =
            read_message(&mut stream, timeout, &self.cancel, &self.metrics).await?;

        if reply.msg_type == MSG_TYPE_CS_NEG {
            let server_neg: CsNegotiation = codec::unmarshal(&reply.body)?;
            let server_policy = server_neg.policy()?;
            let client_policy = self.account.cs_negotiation_policy;

            match negotiation::negotiate(client_policy, server_policy) {
                Ok(outcome) => {
                    debug!("negotiated {outcome} (client {client_policy}, server {server_policy})");
                    let accept = CsNegotiation::accept(outcome);
                    let msg = Message {
                        msg_type: MSG_TYPE_CS_NEG.to_string(),
                        int_info: 0,
                        body: codec::marshal(&accept)?.into_bytes(),
                        error: Vec::new(),
                        bs: Bytes::new(),
                    };
                    send_message(&mut stream, &msg, timeout, &self.cancel, &self.metrics).await?;
                    use_ssl = outcome == NegotiationOutcome::UseSsl;
                }
                Err(e) => {
                    let refuse = CsNegotiation::refuse();
                    if let Ok(body) = codec::marshal(&refuse) {
                        let msg = Message {
                            msg_type: MSG_TYPE_CS_NEG.to_string(),
                            int_info: 0,
                            body: body.into_bytes(),
                            error: Vec::new(),
                            bs: Bytes::new(),
                        };
                        let _ = send_message(&mut stream, &msg, timeout, &self.cancel, &self.metrics)
                            .await;
                    }
                    return Err(e);
                }
            }

            reply = read_message(&mut stream, timeout, &self.cancel, &self.metrics).await?;
        }

        if reply.int_info < 0 {
            return Err(error_codes::to_error(
                "Version",
                &self.account.host,
                reply.int_info,
            ));
        }
        let version_reply: VersionReply = codec::unmarshal(&reply.body)?;
        let version = version_reply.into_version()?;
        debug!(
            "server release {} api {}",
            version.release_version, version.api_version
        );
        let _ = self.version.set(version);

        if use_ssl {
            stream = self.escalate_tls(stream, timeout).await?;
            self.send_shared_secret(&mut stream, timeout).await?;
        }

        self.set_state(ConnectionState::Authenticating);
        self.authenticate(&mut stream, timeout).await?;

        *self.stream.lock().await = Some(stream);
        self.connected.store(true, Ordering::SeqCst);
        self.touch();
        self.metrics.connection_opened();
        self.open_accounted.store(true, Ordering::SeqCst);
        self.set_state(ConnectionState::Idle);
        Ok(())
    }

    async fn escalate_tls(&self, stream: ConnStream, timeout: Duration) -> Result<ConnStream> {
        let ConnStream::Tcp(tcp) = stream else {
            return Err(IrodsError::protocol("tls escalation", "socket already wrapped"));
        };

        let connector = build_tls_connector(&self.account)?;
        let server_name = rustls::pki_types::ServerName::try_from(self.account.host.clone())
            .map_err(|e| IrodsError::protocol("tls escalation", e.to_string()))?;

        let tls = io_with_timeout(
            "tls handshake",
            connector.connect(server_name, tcp),
            timeout,
            &self.cancel,
        )
        .await?;
        debug!("tls established with {}", self.account.host);
        Ok(ConnStream::Tls(Box::new(tls)))
    }

    /// Announces the symmetric parameters and ships the shared key the
    /// server uses to wrap eligible payloads.
    async fn send_shared_secret(&self, stream: &mut ConnStream, timeout: Duration) -> Result<()> {
        let ssl = &self.account.ssl;

        let params = MessageHeader::new(
            &ssl.encryption_algorithm,
            ssl.encryption_key_size,
            ssl.encryption_salt_size,
            ssl.hash_rounds,
            0,
        );
        send_header_only(stream, &params, timeout, &self.cancel, &self.metrics).await?;

        let mut key = vec![0u8; ssl.encryption_key_size as usize];
        rand::rng().fill(&mut key[..]);
        let msg = Message {
            msg_type: MSG_TYPE_SHARED_SECRET.to_string(),
            int_info: 0,
            body: key,
            error: Vec::new(),
            bs: Bytes::new(),
        };
        send_message(stream, &msg, timeout, &self.cancel, &self.metrics).await
    }

    async fn authenticate(&self, stream: &mut ConnStream, timeout: Duration) -> Result<()> {
        match self.account.auth_scheme {
            AuthScheme::Native => {
                let password = self.account.password.clone();
                self.auth_native(stream, timeout, &password).await
            }
            AuthScheme::Pam => {
                if !stream.is_tls() {
                    return Err(IrodsError::AuthFailure {
                        user: self.account.proxy_user.clone(),
                        detail: "PAM authentication requires an SSL connection".to_string(),
                    });
                }
                let derived = self.auth_pam(stream, timeout).await?;
                self.auth_native(stream, timeout, &derived).await
            }
            AuthScheme::Gsi => Err(IrodsError::AuthFailure {
                user: self.account.proxy_user.clone(),
                detail: "GSI authentication is not supported".to_string(),
            }),
        }
    }

    async fn auth_native(
        &self,
        stream: &mut ConnStream,
        timeout: Duration,
        password: &str,
    ) -> Result<()> {
        let reply = exchange_on(
            stream,
            api_message_empty(api::AUTH_REQUEST_AN),
            timeout,
            &self.cancel,
            &self.metrics,
        )
        .await?;
        if reply.int_info < 0 {
            return Err(self.auth_failure(reply.int_info));
        }
        let challenge: AuthChallenge = codec::unmarshal(&reply.body)?;
        let digest = native_auth_digest(&challenge.challenge_bytes()?, password);

        let response = AuthResponse::new(digest, &self.account.proxy_user, &self.account.zone);
        let reply = exchange_on(
            stream,
            api_message(api::AUTH_RESPONSE_AN, &response)?,
            timeout,
            &self.cancel,
            &self.metrics,
        )
        .await?;
        if reply.int_info < 0 {
            return Err(self.auth_failure(reply.int_info));
        }
        Ok(())
    }

    async fn auth_pam(&self, stream: &mut ConnStream, timeout: Duration) -> Result<String> {
        let request = PamAuthRequest {
            pam_user: self.account.proxy_user.clone(),
            pam_password: self.account.password.clone(),
            time_to_live: self.account.pam_ttl,
        };
        let reply = exchange_on(
            stream,
            api_message(api::PAM_AUTH_REQUEST_AN, &request)?,
            timeout,
            &self.cancel,
            &self.metrics,
        )
        .await?;
        if reply.int_info < 0 {
            return Err(self.auth_failure(reply.int_info));
        }
        let out: PamAuthReply = codec::unmarshal(&reply.body)?;
        Ok(out.irods_pam_password)
    }

    fn auth_failure(&self, code: i32) -> IrodsError {
        let (main, sub) = error_codes::split(code);
        self.metrics.record_failure(&IrodsError::AuthFailure {
            user: String::new(),
            detail: String::new(),
        });
        IrodsError::AuthFailure {
            user: format!("{}#{}", self.account.proxy_user, self.account.zone),
            detail: format!("server code {main} (sub {sub})"),
        }
    }

    /// Serializes a multi-message sequence; every wire exchange goes
    /// through the guard this returns.
    pub async fn lock(&self) -> ConnectionGuard<'_> {
        ConnectionGuard {
            conn: self,
            stream: self.stream.lock().await,
        }
    }

    /// One request/response pair decoded into `R`.
    pub async fn request<Q, R>(&self, api_number: i32, body: &Q, path: &str) -> Result<R>
    where
        Q: Serialize + Debug,
        R: DeserializeOwned,
    {
        self.lock().await.request(api_number, body, path).await
    }

    /// One request that only carries a status reply.
    pub async fn request_status<Q>(&self, api_number: i32, body: &Q, path: &str) -> Result<i32>
    where
        Q: Serialize + Debug,
    {
        self.lock().await.request_status(api_number, body, path).await
    }

    /// Fire-and-forget send; nothing is read back.
    pub async fn request_without_response(&self, msg: Message) -> Result<()> {
        self.lock().await.send(msg).await
    }

    /// Keep-alive no-op; a failure marks the connection broken.
    pub async fn poke(&self) -> Result<()> {
        let mut guard = self.lock().await;
        let reply = guard.exchange(api_message_empty(api::GET_MISC_SVR_INFO_AN)).await?;
        reply.check(api::GET_MISC_SVR_INFO_AN, &self.account.host)?;
        Ok(())
    }

    /// Commits the agent's open catalog transaction.
    pub async fn commit(&self) -> Result<()> {
        self.request_status(api::END_TRANSACTION_AN, &EndTransactionInp::commit(), "")
            .await?;
        Ok(())
    }

    /// Rolls the agent's open catalog transaction back.
    pub async fn rollback(&self) -> Result<()> {
        self.request_status(api::END_TRANSACTION_AN, &EndTransactionInp::rollback(), "")
            .await?;
        Ok(())
    }

    /// Sends the disconnect message (best-effort) and tears the socket
    /// down. Idempotent.
    pub async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.set_state(ConnectionState::Closing);

        let mut slot = self.stream.lock().await;
        if let Some(stream) = slot.as_mut() {
            let msg = Message::header_only(MSG_TYPE_DISCONNECT);
            let _ = send_message(
                stream,
                &msg,
                Duration::from_secs(5),
                &self.cancel,
                &self.metrics,
            )
            .await;
            let _ = stream.shutdown().await;
        }
        *slot = None;

        if self.open_accounted.load(Ordering::SeqCst)
            && !self.close_accounted.swap(true, Ordering::SeqCst)
        {
            self.metrics.connection_closed();
        }
        self.set_state(ConnectionState::Closed);
    }

    /// Marks the connection unusable and wakes any pending socket
    /// operation on it.
    pub fn poison(&self) {
        self.failed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.set_state(ConnectionState::Closing);
        self.cancel.cancel();
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.failed.load(Ordering::SeqCst)
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.get()
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn state(&self) -> ConnectionState {
        self.state.lock().map(|s| *s).unwrap_or(ConnectionState::Closed)
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub(crate) fn operation_timeout(&self) -> Duration {
        self.config.operation_timeout
    }

    /// Age since the connection was established.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the connection last carried a request.
    pub fn idle_time(&self) -> Duration {
        self.last_used
            .lock()
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    pub(crate) fn touch(&self) {
        if let Ok(mut t) = self.last_used.lock() {
            *t = Instant::now();
        }
    }

    fn set_state(&self, next: ConnectionState) {
        if let Ok(mut s) = self.state.lock() {
            *s = next;
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.open_accounted.load(Ordering::SeqCst)
            && !self.close_accounted.swap(true, Ordering::SeqCst)
        {
            self.metrics.connection_closed();
        }
    }
}

/// Exclusive use of the connection's stream; holds the mutex from the
/// first byte of a request until the reply is fully consumed.
pub struct ConnectionGuard<'a> {
    conn: &'a Connection,
    stream: MutexGuard<'a, Option<ConnStream>>,
}

impl ConnectionGuard<'_> {
    fn stream(&mut self) -> Result<&mut ConnStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| IrodsError::protocol("request", "connection is closed"))
    }

    /// One framed request/response round trip. Errors that poison the
    /// connection are recorded and the connection marked broken.
    pub async fn exchange(&mut self, msg: Message) -> Result<Message> {
        let conn = self.conn;
        let timeout = conn.operation_timeout();
        if msg.msg_type == crate::models::message::MSG_TYPE_API_REQ {
            conn.metrics.record_api_request(msg.int_info);
        }

        let stream = self.stream()?;
        conn.set_state(ConnectionState::Busy);
        let result = async {
            send_message(stream, &msg, timeout, &conn.cancel, &conn.metrics).await?;
            read_message(stream, timeout, &conn.cancel, &conn.metrics).await
        }
        .await;
        conn.touch();

        match result {
            Ok(reply) => {
                conn.set_state(ConnectionState::Idle);
                Ok(reply)
            }
            Err(e) => {
                conn.metrics.record_failure(&e);
                if e.poisons_connection() {
                    warn!("poisoning connection: {e}");
                    conn.poison();
                }
                Err(e)
            }
        }
    }

    /// Sends without reading a reply.
    pub async fn send(&mut self, msg: Message) -> Result<()> {
        let conn = self.conn;
        let timeout = conn.operation_timeout();
        let stream = self.stream()?;
        let result = send_message(stream, &msg, timeout, &conn.cancel, &conn.metrics).await;
        conn.touch();
        if let Err(e) = &result {
            conn.metrics.record_failure(e);
            if e.poisons_connection() {
                conn.poison();
            }
        }
        result
    }

    /// Reads one more reply without sending; used by operations where
    /// the server streams several replies for a single request.
    pub async fn read_reply(&mut self) -> Result<Message> {
        let conn = self.conn;
        let timeout = conn.operation_timeout();
        let stream = self.stream()?;
        let result = read_message(stream, timeout, &conn.cancel, &conn.metrics).await;
        conn.touch();
        if let Err(e) = &result {
            conn.metrics.record_failure(e);
            if e.poisons_connection() {
                conn.poison();
            }
        }
        result
    }

    /// Sends a bare big-endian int, the acknowledgement the recursive
    /// collection-removal stream expects.
    pub async fn send_ack(&mut self, value: i32) -> Result<()> {
        let conn = self.conn;
        let timeout = conn.operation_timeout();
        let stream = self.stream()?;
        io_with_timeout(
            "write ack",
            stream.write_all(&value.to_be_bytes()),
            timeout,
            &conn.cancel,
        )
        .await
        .inspect_err(|e| {
            if e.poisons_connection() {
                conn.poison();
            }
        })?;
        conn.metrics.add_bytes_sent(4);
        Ok(())
    }

    pub async fn request<Q, R>(&mut self, api_number: i32, body: &Q, path: &str) -> Result<R>
    where
        Q: Serialize + Debug,
        R: DeserializeOwned,
    {
        let reply = self.exchange(api_message(api_number, body)?).await?;
        reply.check(api_number, path)?;
        self.decode(&reply)
    }

    /// Like [`Self::request`] but tolerates an empty reply body.
    pub async fn request_maybe<Q, R>(
        &mut self,
        api_number: i32,
        body: &Q,
        path: &str,
    ) -> Result<Option<R>>
    where
        Q: Serialize + Debug,
        R: DeserializeOwned,
    {
        let reply = self.exchange(api_message(api_number, body)?).await?;
        reply.check(api_number, path)?;
        if reply.body.is_empty() {
            return Ok(None);
        }
        self.decode(&reply).map(Some)
    }

    pub async fn request_status<Q>(&mut self, api_number: i32, body: &Q, path: &str) -> Result<i32>
    where
        Q: Serialize + Debug,
    {
        let reply = self.exchange(api_message(api_number, body)?).await?;
        reply.check(api_number, path)?;
        Ok(reply.int_info)
    }

    /// Request with an outbound binary stream (writes). Returns the
    /// status, which for writes is the byte count accepted.
    pub async fn request_with_bs<Q>(
        &mut self,
        api_number: i32,
        body: &Q,
        bs: Bytes,
        path: &str,
    ) -> Result<i32>
    where
        Q: Serialize + Debug,
    {
        let reply = self
            .exchange(crate::models::message::api_message_with_bs(api_number, body, bs)?)
            .await?;
        reply.check(api_number, path)?;
        Ok(reply.int_info)
    }

    /// Request whose reply carries the payload in the binary stream
    /// (reads). Returns the bytes.
    pub async fn request_read_bs<Q>(&mut self, api_number: i32, body: &Q, path: &str) -> Result<Bytes>
    where
        Q: Serialize + Debug,
    {
        let reply = self.exchange(api_message(api_number, body)?).await?;
        reply.check(api_number, path)?;
        Ok(reply.bs)
    }

    fn decode<R: DeserializeOwned>(&self, reply: &Message) -> Result<R> {
        codec::unmarshal(&reply.body).inspect_err(|e| {
            if e.poisons_connection() {
                self.conn.poison();
            }
        })
    }
}

// ── wire framing ─────────────────────────────────────────────────────────

async fn send_header_only(
    stream: &mut ConnStream,
    header: &MessageHeader,
    timeout: Duration,
    cancel: &CancellationToken,
    metrics: &Metrics,
) -> Result<()> {
    let header_xml = codec::marshal(header)?;
    let mut buf = BytesMut::with_capacity(4 + header_xml.len());
    buf.extend_from_slice(&(header_xml.len() as u32).to_be_bytes());
    buf.extend_from_slice(header_xml.as_bytes());

    io_with_timeout("write header", stream.write_all(&buf), timeout, cancel).await?;
    metrics.add_bytes_sent(buf.len() as u64);
    Ok(())
}

pub(crate) async fn send_message(
    stream: &mut ConnStream,
    msg: &Message,
    timeout: Duration,
    cancel: &CancellationToken,
    metrics: &Metrics,
) -> Result<()> {
    let header_xml = codec::marshal(&msg.header())?;
    let mut buf = BytesMut::with_capacity(4 + header_xml.len() + msg.body.len() + msg.error.len());
    buf.extend_from_slice(&(header_xml.len() as u32).to_be_bytes());
    buf.extend_from_slice(header_xml.as_bytes());
    buf.extend_from_slice(&msg.body);
    buf.extend_from_slice(&msg.error);

    io_with_timeout("write message", stream.write_all(&buf), timeout, cancel).await?;
    if !msg.bs.is_empty() {
        io_with_timeout("write binary stream", stream.write_all(&msg.bs), timeout, cancel).await?;
    }
    io_with_timeout("flush message", stream.flush(), timeout, cancel).await?;
    metrics.add_bytes_sent((buf.len() + msg.bs.len()) as u64);
    Ok(())
}

pub(crate) async fn read_message(
    stream: &mut ConnStream,
    timeout: Duration,
    cancel: &CancellationToken,
    metrics: &Metrics,
) -> Result<Message> {
    let mut len_buf = [0u8; 4];
    io_with_timeout("read header length", stream.read_exact(&mut len_buf), timeout, cancel)
        .await?;
    let header_len = u32::from_be_bytes(len_buf);
    if header_len == 0 || header_len > MAX_SEGMENT_LEN {
        return Err(IrodsError::protocol(
            "read header length",
            format!("unreasonable header length {header_len}"),
        ));
    }

    let mut header_buf = vec![0u8; header_len as usize];
    io_with_timeout("read header", stream.read_exact(&mut header_buf), timeout, cancel).await?;
    let header: MessageHeader = codec::unmarshal(&header_buf)?;
    header.validate()?;

    let mut body = vec![0u8; header.msg_len as usize];
    if !body.is_empty() {
        io_with_timeout("read body", stream.read_exact(&mut body), timeout, cancel).await?;
    }
    let mut error = vec![0u8; header.error_len as usize];
    if !error.is_empty() {
        io_with_timeout("read error segment", stream.read_exact(&mut error), timeout, cancel)
            .await?;
    }
    let mut bs = BytesMut::zeroed(header.bs_len as usize);
    if !bs.is_empty() {
        io_with_timeout("read binary stream", stream.read_exact(&mut bs), timeout, cancel)
            .await?;
    }

    metrics.add_bytes_received(
        4 + header_len as u64 + header.msg_len as u64 + header.error_len as u64 + header.bs_len as u64,
    );

    Ok(Message {
        msg_type: header.msg_type,
        int_info: header.int_info,
        body,
        error,
        bs: bs.freeze(),
    })
}

async fn exchange_on(
    stream: &mut ConnStream,
    msg: Message,
    timeout: Duration,
    cancel: &CancellationToken,
    metrics: &Metrics,
) -> Result<Message> {
    send_message(stream, &msg, timeout, cancel, metrics).await?;
    read_message(stream, timeout, cancel, metrics).await
}

// ── TLS plumbing ─────────────────────────────────────────────────────────

fn build_tls_connector(account: &Account) -> Result<TlsConnector> {
    let ssl = &account.ssl;

    let config = if !ssl.verify_server {
        rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(InsecureVerifier::new()))
            .with_no_client_auth()
    } else {
        let mut roots = rustls::RootCertStore::empty();
        if let Some(path) = &ssl.ca_certificate_file {
            let pem = std::fs::read(path)
                .map_err(|e| IrodsError::transport("read ca certificate", e))?;
            for cert in rustls_pemfile::certs(&mut &pem[..]) {
                let cert = cert.map_err(|e| IrodsError::transport("parse ca certificate", e))?;
                roots.add(cert).map_err(|e| {
                    IrodsError::protocol("load ca certificate", e.to_string())
                })?;
            }
        } else {
            let native = rustls_native_certs::load_native_certs()
                .map_err(|e| IrodsError::transport("load native certificates", e))?;
            for cert in native {
                let _ = roots.add(cert);
            }
        }
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Accept-anything verifier for test rigs with self-signed certificates
/// (`VerifyServer: false`). Signature checks still run.
#[derive(Debug)]
struct InsecureVerifier {
    provider: rustls::crypto::CryptoProvider,
}

impl InsecureVerifier {
    fn new() -> Self {
        Self {
            provider: rustls::crypto::aws_lc_rs::default_provider(),
        }
    }
}

impl rustls::client::danger::ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
