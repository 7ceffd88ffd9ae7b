// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    ops::Deref,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use tokio::{sync::Notify, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cfg::config::{Account, SessionConfig},
    client::{connection::Connection, metrics::Metrics},
    error::{IrodsError, Result},
};

/// Rewrites server-announced hosts that are only reachable under another
/// name on the client side (container test rigs and the like).
pub type AddressResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Default)]
struct PoolState {
    /// LIFO stack; the newest connection has the warmest socket.
    idle: Vec<Arc<Connection>>,
    live: usize,
    closed: bool,
}

enum Plan {
    Reuse(Arc<Connection>),
    Open,
    Wait,
}

/// A bounded pool of authenticated connections over one account.
///
/// Invariants: `idle ≤ live ≤ connection_max`, and no connection is ever
/// handed to two callers at once; checkout removes it from the pool
/// until it is returned or discarded.
pub struct Session {
    account: Account,
    config: Arc<SessionConfig>,
    resolver: Option<AddressResolver>,
    metrics: Arc<Metrics>,
    state: StdMutex<PoolState>,
    returned: Notify,
    cancel: CancellationToken,
}

impl Session {
    pub async fn new(account: Account, config: SessionConfig) -> Result<Arc<Self>> {
        Self::build(account, config, None).await
    }

    pub async fn new_with_resolver(
        account: Account,
        config: SessionConfig,
        resolver: AddressResolver,
    ) -> Result<Arc<Self>> {
        Self::build(account, config, Some(resolver)).await
    }

    async fn build(
        mut account: Account,
        mut config: SessionConfig,
        resolver: Option<AddressResolver>,
    ) -> Result<Arc<Self>> {
        account
            .validate_and_normalize()
            .map_err(|e| IrodsError::protocol("validate account", e.to_string()))?;
        config
            .validate_and_normalize()
            .map_err(|e| IrodsError::protocol("validate session config", e.to_string()))?;

        let session = Arc::new(Self {
            account,
            config: Arc::new(config),
            resolver,
            metrics: Arc::new(Metrics::default()),
            state: StdMutex::new(PoolState::default()),
            returned: Notify::new(),
            cancel: CancellationToken::new(),
        });

        for _ in 0..session.config.connection_init_number {
            let conn = session.open_connection().await?;
            let mut st = session.lock_state();
            st.live += 1;
            st.idle.push(conn);
        }

        session.spawn_sweeper();
        Ok(session)
    }

    /// Checks a connection out of the pool, blocking up to the operation
    /// timeout when the pool is at capacity.
    pub async fn acquire_connection(self: &Arc<Self>) -> Result<PooledConnection> {
        let deadline = Instant::now() + self.config.operation_timeout;

        loop {
            let plan = {
                let mut st = self.lock_state();
                if st.closed {
                    return Err(IrodsError::protocol("acquire connection", "session released"));
                }
                if let Some(conn) = st.idle.pop() {
                    Plan::Reuse(conn)
                } else if st.live < self.config.connection_max {
                    st.live += 1;
                    Plan::Open
                } else {
                    Plan::Wait
                }
            };

            match plan {
                Plan::Reuse(conn) => {
                    if !conn.is_connected() || conn.age() > self.config.connection_lifespan {
                        self.retire(conn).await;
                        continue;
                    }
                    if conn.idle_time() > self.config.connection_idle_timeout {
                        if let Err(e) = conn.poke().await {
                            debug!("keep-alive failed, discarding connection: {e}");
                            self.retire(conn).await;
                            continue;
                        }
                    }
                    if self.config.start_new_transaction {
                        if let Err(e) = conn.commit().await {
                            debug!("transaction reset failed, discarding connection: {e}");
                            self.retire(conn).await;
                            continue;
                        }
                    }
                    self.metrics.connection_occupied();
                    return Ok(PooledConnection::pooled(self.clone(), conn));
                }
                Plan::Open => match self.open_connection().await {
                    Ok(conn) => {
                        if self.config.start_new_transaction {
                            if let Err(e) = conn.commit().await {
                                self.retire(conn).await;
                                return Err(e);
                            }
                        }
                        self.metrics.connection_occupied();
                        return Ok(PooledConnection::pooled(self.clone(), conn));
                    }
                    Err(e) => {
                        self.lock_state().live -= 1;
                        self.returned.notify_one();
                        return Err(e);
                    }
                },
                Plan::Wait => {
                    let notified = self.returned.notified();
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        self.metrics.record_failure(&IrodsError::PoolExhausted {
                            waited: self.config.operation_timeout,
                        });
                        return Err(IrodsError::PoolExhausted {
                            waited: self.config.operation_timeout,
                        });
                    }
                }
            }
        }
    }

    /// Explicit return; equivalent to dropping the guard, but closes
    /// surplus connections in-line instead of on a background task.
    pub async fn return_connection(&self, conn: PooledConnection) -> Result<()> {
        conn.release().await;
        Ok(())
    }

    /// Explicit discard: the connection is closed, never re-pooled.
    pub async fn discard_connection(&self, mut conn: PooledConnection) {
        if let Some(inner) = conn.conn.take() {
            inner.poison();
            if let Some(victim) = conn.session.settle(inner, conn.is_pooled, true) {
                victim.disconnect().await;
            }
        }
    }

    /// Opens a connection outside the pool, pointed at a resource server
    /// the catalog provider redirected us to.
    pub async fn connect_redirected(self: &Arc<Self>, host: &str, port: u16) -> Result<PooledConnection> {
        let resolved = self.resolve_address(host);
        debug!("redirected connection to {resolved}:{port}");
        let account = self.account.redirected_to(&resolved, port);
        let conn = Connection::connect(
            account,
            self.config.clone(),
            self.metrics.clone(),
            self.cancel.child_token(),
        )
        .await?;
        Ok(PooledConnection::unpooled(self.clone(), conn))
    }

    /// Applies the resolver; without one the server-provided host is
    /// used verbatim.
    pub fn resolve_address(&self, host: &str) -> String {
        match &self.resolver {
            Some(resolve) => resolve(host),
            None => host.to_string(),
        }
    }

    /// Closes every pooled connection and stops the sweeper. Connections
    /// currently checked out are closed when they come back.
    pub async fn release(&self) {
        self.cancel.cancel();
        let victims = {
            let mut st = self.lock_state();
            st.closed = true;
            st.live -= st.idle.len();
            std::mem::take(&mut st.idle)
        };
        for conn in victims {
            conn.disconnect().await;
        }
        self.returned.notify_waiters();
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of live connections (idle plus checked out).
    pub fn connection_total(&self) -> usize {
        self.lock_state().live
    }

    // ── internals ────────────────────────────────────────────────────────

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn open_connection(&self) -> Result<Arc<Connection>> {
        Connection::connect(
            self.account.clone(),
            self.config.clone(),
            self.metrics.clone(),
            self.cancel.child_token(),
        )
        .await
    }

    /// Removes a still-counted connection from the pool and closes it.
    async fn retire(&self, conn: Arc<Connection>) {
        self.lock_state().live -= 1;
        self.returned.notify_one();
        conn.disconnect().await;
    }

    /// Accounts for a returned connection. Returns the connection when
    /// the caller must close it.
    fn settle(&self, conn: Arc<Connection>, pooled: bool, broken: bool) -> Option<Arc<Connection>> {
        if pooled {
            self.metrics.connection_released();
        }
        if !pooled {
            return Some(conn);
        }

        let mut st = self.lock_state();
        let keep = !broken
            && !st.closed
            && conn.is_connected()
            && conn.age() <= self.config.connection_lifespan
            && st.live <= self.config.connection_max_idle;
        if keep {
            conn.touch();
            st.idle.push(conn);
            drop(st);
            self.returned.notify_one();
            None
        } else {
            st.live -= 1;
            drop(st);
            self.returned.notify_one();
            Some(conn)
        }
    }

    fn spawn_sweeper(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        let period = self
            .config
            .connection_idle_timeout
            .checked_div(2)
            .filter(|p| *p >= Duration::from_secs(1))
            .unwrap_or(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(session) = weak.upgrade() else { break };
                session.sweep_idle().await;
            }
        });
    }

    /// Drops idle connections past the idle timeout or lifespan and
    /// sheds the idle stack down to `connection_max_idle`.
    async fn sweep_idle(&self) {
        let victims = {
            let mut st = self.lock_state();
            let mut victims = Vec::new();

            let mut kept = Vec::with_capacity(st.idle.len());
            for conn in st.idle.drain(..) {
                let stale = conn.idle_time() > self.config.connection_idle_timeout
                    || conn.age() > self.config.connection_lifespan
                    || !conn.is_connected();
                if stale {
                    victims.push(conn);
                } else {
                    kept.push(conn);
                }
            }
            while kept.len() > self.config.connection_max_idle {
                // oldest entries sit at the bottom of the stack
                victims.push(kept.remove(0));
            }
            st.idle = kept;
            st.live -= victims.len();
            victims
        };

        if !victims.is_empty() {
            debug!("idle sweeper closing {} connections", victims.len());
            for conn in victims {
                conn.disconnect().await;
            }
            self.returned.notify_waiters();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.account.host)
            .field("zone", &self.account.zone)
            .field("live", &self.connection_total())
            .finish()
    }
}

/// Scoped checkout of one connection. Dropping the guard returns the
/// connection to the pool; a guard dropped while panicking, or holding a
/// poisoned connection, discards it instead.
#[derive(Debug)]
pub struct PooledConnection {
    session: Arc<Session>,
    conn: Option<Arc<Connection>>,
    is_pooled: bool,
}

impl PooledConnection {
    fn pooled(session: Arc<Session>, conn: Arc<Connection>) -> Self {
        Self {
            session,
            conn: Some(conn),
            is_pooled: true,
        }
    }

    fn unpooled(session: Arc<Session>, conn: Arc<Connection>) -> Self {
        Self {
            session,
            conn: Some(conn),
            is_pooled: false,
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        self.conn
            .as_ref()
            .expect("pooled connection accessed after release")
    }

    /// Returns the connection to the pool, closing it in-line when the
    /// pool does not want it back.
    pub async fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            let broken = conn.is_failed();
            if let Some(victim) = self.session.settle(conn, self.is_pooled, broken) {
                victim.disconnect().await;
            }
        }
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let broken = conn.is_failed() || std::thread::panicking();
        if let Some(victim) = self.session.settle(conn, self.is_pooled, broken) {
            // Without a runtime we fall back to dropping the socket;
            // Connection::drop keeps the metrics straight.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move { victim.disconnect().await });
            } else {
                warn!("dropping connection without graceful disconnect");
            }
        }
    }
}
