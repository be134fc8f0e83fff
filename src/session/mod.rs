//! Session-aware client for a coordination-service ensemble.
//!
//! Provides the core pieces for working against a ZooKeeper-style
//! hierarchical store through a pluggable transport:
//! - [`SessionClient`] - connection lifecycle, typed events, watched and
//!   cached reads, writes
//! - transparent reconnect after session expiry (see
//!   [`crate::ClientConfig::reconnect`])
//! - recursive tree operations (`create_recursive`, `delete_recursive`)
//!
//! # Basic Usage
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use keeper_client::ClientConfig;
//! use keeper_client::SessionClient;
//! # use keeper_client::Connector;
//! # async fn demo(connector: Arc<dyn Connector>) -> keeper_client::Result<()> {
//! let config = ClientConfig::builder("node1:2181,node2:2181").build();
//! let client = SessionClient::new(connector, config);
//!
//! client.connect().await?;
//! client.wait_until_connected(Some(Duration::from_secs(5))).await?;
//!
//! let children = client.cached_get_children("/services").await?;
//! println!("services: {children:?}");
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

mod cache;
mod tree;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::bus::EventBus;
use crate::bus::SubscriptionId;
use crate::metrics::SESSION_EXPIRED_METRIC;
use crate::metrics::SESSION_RECONNECT_METRIC;
use crate::metrics::WATCH_EVENT_METRIC;
use crate::Acl;
use crate::ClientConfig;
use crate::ClientEvent;
use crate::Connector;
use crate::CreateMode;
use crate::Error;
use crate::KeeperState;
use crate::RawWatchedEvent;
use crate::RawWatcher;
use crate::Result;
use crate::Session;
use crate::Stat;
use crate::TransportError;

use cache::WatchCache;

/// Per-call watcher receiving the typed event instead of raw codes
pub type Watcher = Arc<dyn Fn(ClientEvent) + Send + Sync>;

/// One live connection epoch: the handle plus its dispatch task's
/// cancellation token. Replaced wholesale on reconnect.
pub(crate) struct SessionSlot {
    session: Box<dyn Session>,
    cancel: CancellationToken,
}

struct ClientInner {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    slot: ArcSwapOption<SessionSlot>,
    caches: WatchCache,
    on_state: EventBus<KeeperState>,
    on_event: EventBus<ClientEvent>,
}

/// Session-aware coordination client.
///
/// Cheap to clone; clones share one session. Constructed disconnected -
/// call [`connect()`](SessionClient::connect) to open a session and
/// [`close()`](SessionClient::close) to release it (the client is
/// reusable afterwards). There is no drop-based cleanup: a client that
/// is never closed leaves the handle to the transport's own teardown.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<ClientInner>,
}

impl SessionClient {
    pub fn new(
        connector: Arc<dyn Connector>,
        config: ClientConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                connector,
                slot: ArcSwapOption::empty(),
                caches: WatchCache::new(),
                on_state: EventBus::new(),
                on_event: EventBus::new(),
            }),
        }
    }

    /// Opens a session against the configured server list and registers
    /// the global watcher.
    ///
    /// Connection attempts happen in the transport's background; this
    /// call returns once the handle exists, not once it is usable - use
    /// [`wait_until_connected`](SessionClient::wait_until_connected) for
    /// that. The initial (typically "connecting") state is published on
    /// the state bus.
    ///
    /// # Errors
    /// - [`Error::AlreadyConnected`] if a handle is already held
    /// - [`Error::Transport`] if the transport refuses to open a session
    pub async fn connect(&self) -> Result<()> {
        if self.inner.slot.load().is_some() {
            return Err(Error::AlreadyConnected);
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        // Invoked from the transport's I/O context: forward and return.
        let watcher: RawWatcher = Arc::new(move |raw| {
            let _ = raw_tx.send(raw);
        });

        let session = self
            .inner
            .connector
            .connect(&self.inner.config.servers, watcher)
            .await?;

        let cancel = CancellationToken::new();
        self.inner.slot.store(Some(Arc::new(SessionSlot {
            session,
            cancel: cancel.clone(),
        })));

        tokio::spawn(Self::dispatch_loop(
            Arc::downgrade(&self.inner),
            raw_rx,
            cancel,
        ));

        if let Some(state) = self.state_name() {
            self.inner.on_state.publish(&state);
        }
        Ok(())
    }

    /// Releases the session handle and stops event dispatch.
    ///
    /// A no-op when not connected. All cached entries are dropped: the
    /// watches backing them die with the session, so a later session
    /// starts cold.
    pub async fn close(&self) -> Result<()> {
        if let Some(slot) = self.inner.slot.swap(None) {
            slot.cancel.cancel();
            match slot.session.close().await {
                Ok(()) => {}
                // the ensemble already discarded this handle
                Err(TransportError::InvalidHandle) | Err(TransportError::SessionExpired) => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.inner.caches.invalidate_all();
        Ok(())
    }

    /// Current connection state; `None` before the first `connect()` or
    /// after `close()`.
    pub fn state_name(&self) -> Option<KeeperState> {
        let slot = self.inner.slot.load();
        slot.as_ref().map(|slot| {
            KeeperState::try_from(slot.session.state_code())
                .expect("native client reported a state outside the vendor enumeration")
        })
    }

    /// Ensemble-assigned session identifier; `None` until connected
    pub fn client_id(&self) -> Option<i64> {
        let slot = self.inner.slot.load();
        slot.as_ref().map(|slot| slot.session.client_id())
    }

    /// Bus publishing the derived connection state after every
    /// notification
    pub fn on_state(&self) -> &EventBus<KeeperState> {
        &self.inner.on_state
    }

    /// Bus publishing every wrapped notification from the global watcher
    pub fn on_event(&self) -> &EventBus<ClientEvent> {
        &self.inner.on_event
    }

    /// Blocks the caller until the session reaches the connected state.
    ///
    /// Fast path: returns immediately when already connected. The state
    /// is re-checked after the internal waiter subscribes, closing the
    /// race where the transition lands between check and subscription.
    ///
    /// # Errors
    /// - [`Error::Timeout`] if `timeout` elapses without observing the
    ///   connected state. The internal waiter is unsubscribed on every
    ///   exit path; no listener leaks.
    pub async fn wait_until_connected(
        &self,
        timeout: Option<Duration>,
    ) -> Result<()> {
        if self.state_name() == Some(KeeperState::Connected) {
            return Ok(());
        }

        let notify = Arc::new(Notify::new());
        let waiter = {
            let notify = Arc::clone(&notify);
            self.inner.on_state.subscribe(move |state: &KeeperState| {
                if *state == KeeperState::Connected {
                    notify.notify_one();
                }
            })
        };

        // state may have changed between the entry of this method and the
        // waiter being subscribed
        let outcome = if self.state_name() == Some(KeeperState::Connected) {
            Ok(())
        } else {
            match timeout {
                Some(deadline) => tokio::time::timeout(deadline, notify.notified())
                    .await
                    .map(|_| ())
                    .map_err(|_| Error::Timeout),
                None => {
                    notify.notified().await;
                    Ok(())
                }
            }
        };

        self.unsubscribe_waiter(waiter);

        match outcome {
            // the transition may have landed right at the deadline
            Err(Error::Timeout) if self.state_name() == Some(KeeperState::Connected) => Ok(()),
            other => other,
        }
    }

    fn unsubscribe_waiter(
        &self,
        waiter: SubscriptionId,
    ) {
        self.inner
            .on_state
            .unsubscribe(waiter)
            .expect("waiter is subscribed until this point");
    }

    /// Checks whether a node exists, optionally leaving a one-shot watch
    /// for its next create/delete/change.
    pub async fn exists(
        &self,
        path: &str,
        watch: Option<Watcher>,
    ) -> Result<Option<Stat>> {
        let slot = self.current_slot()?;
        Ok(slot.session.exists(path, wrap_watcher(watch)).await?)
    }

    /// Reads data and metadata, optionally leaving a one-shot watch for
    /// the node's next change or deletion.
    pub async fn get_data(
        &self,
        path: &str,
        watch: Option<Watcher>,
    ) -> Result<(Bytes, Stat)> {
        let slot = self.current_slot()?;
        Ok(slot.session.get_data(path, wrap_watcher(watch)).await?)
    }

    /// Lists child names, optionally leaving a one-shot watch for the
    /// next child-list change.
    pub async fn get_children(
        &self,
        path: &str,
        watch: Option<Watcher>,
    ) -> Result<Vec<String>> {
        let slot = self.current_slot()?;
        Ok(slot.session.get_children(path, wrap_watcher(watch)).await?)
    }

    /// Creates a node, returning the actual created path (sequential
    /// modes append a counter suffix).
    pub async fn create(
        &self,
        path: &str,
        data: impl Into<Bytes> + Send,
        acl: Vec<Acl>,
        mode: CreateMode,
    ) -> Result<String> {
        let slot = self.current_slot()?;
        Ok(slot.session.create(path, data.into(), acl, mode).await?)
    }

    /// Creates `path` and any missing ancestors, bottom of the recursion
    /// first. Ancestors are created empty and persistent with the same
    /// ACL. Already-existing nodes are left alone; losing a create race
    /// to a concurrent creator counts as success.
    pub async fn create_recursive(
        &self,
        path: &str,
        data: impl Into<Bytes> + Send,
        acl: Vec<Acl>,
    ) -> Result<()> {
        self.create_recursive_inner(path, data.into(), &acl).await
    }

    fn create_recursive_inner<'a>(
        &'a self,
        path: &'a str,
        data: Bytes,
        acl: &'a [Acl],
    ) -> futures::future::BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.exists(path, None).await?.is_some() {
                return Ok(());
            }

            if let Some((parent, _)) = path.rsplit_once('/') {
                if !parent.is_empty() {
                    self.create_recursive_inner(parent, Bytes::new(), acl).await?;
                }
            }

            // a concurrent creator may have won while the ancestors were
            // being filled in
            if self.exists(path, None).await?.is_none() {
                match self
                    .create(path, data, acl.to_vec(), CreateMode::Persistent)
                    .await
                {
                    Ok(_) => {}
                    Err(Error::Transport(TransportError::NodeExists(_))) => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        })
    }

    /// Overwrites a node's data, returning the fresh metadata. Pass
    /// [`crate::constants::ANY_VERSION`] to skip the optimistic version
    /// check.
    pub async fn set_data(
        &self,
        path: &str,
        data: impl Into<Bytes> + Send,
        version: i32,
    ) -> Result<Stat> {
        let slot = self.current_slot()?;
        Ok(slot.session.set_data(path, data.into(), version).await?)
    }

    /// Deletes a single (childless) node
    pub async fn delete(
        &self,
        path: &str,
        version: i32,
    ) -> Result<()> {
        let slot = self.current_slot()?;
        Ok(slot.session.delete(path, version).await?)
    }

    pub async fn get_acl(
        &self,
        path: &str,
    ) -> Result<(Vec<Acl>, Stat)> {
        let slot = self.current_slot()?;
        Ok(slot.session.get_acl(path).await?)
    }

    pub async fn set_acl(
        &self,
        path: &str,
        version: i32,
        acl: Vec<Acl>,
    ) -> Result<Stat> {
        let slot = self.current_slot()?;
        Ok(slot.session.set_acl(path, version, acl).await?)
    }

    /// Reports whether the node is owned by a session (and so vanishes
    /// with it). With `use_cache` the data read goes through the watch
    /// cache.
    pub async fn is_ephemeral(
        &self,
        path: &str,
        use_cache: bool,
    ) -> Result<bool> {
        let (_, stat) = if use_cache {
            self.cached_get_data(path).await?
        } else {
            self.get_data(path, None).await?
        };
        Ok(stat.ephemeral_owner != 0)
    }

    pub(crate) fn current_slot(&self) -> Result<Arc<SessionSlot>> {
        self.inner.slot.load_full().ok_or(Error::NotConnected)
    }

    /// Drains the global watcher's channel for one connection epoch.
    ///
    /// This task is the single dispatch context of the client: event
    /// wrapping, bus publication and the expiry policy all run here, in
    /// the transport's delivery order.
    async fn dispatch_loop(
        inner: Weak<ClientInner>,
        mut raw_rx: UnboundedReceiver<RawWatchedEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                raw = raw_rx.recv() => {
                    let Some(raw) = raw else { break };
                    // the owning client may be gone; this task must not
                    // keep it alive
                    let Some(inner) = inner.upgrade() else { break };
                    let client = SessionClient { inner };
                    client.dispatch_raw(raw).await;
                }
            }
        }
    }

    // Returns a boxed (rather than `async fn`-opaque) future on purpose:
    // `connect` spawns `dispatch_loop`, which awaits `dispatch_raw`, which
    // awaits `connect` on the reconnect path. A concrete `dyn Future + Send`
    // return type breaks the auto-trait inference cycle that otherwise makes
    // the spawned `dispatch_loop` future un-provably `Send`.
    fn dispatch_raw(
        &self,
        raw: RawWatchedEvent,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
        let event = ClientEvent::from_raw(&raw)
            .expect("native client delivered codes outside the vendor enumerations");
        debug!(%event, "received event");
        WATCH_EVENT_METRIC
            .with_label_values(&[event.event_type.name()])
            .inc();

        self.inner.on_event.publish(&event);
        // publish the state as derived *now*: the connection may have
        // moved on since the event was generated
        if let Some(state) = self.state_name() {
            self.inner.on_state.publish(&state);
        }

        if event.keeper_state == KeeperState::Expired {
            SESSION_EXPIRED_METRIC.inc();
            // the expired session took its watches with it
            self.inner.caches.invalidate_all();

            if self.inner.config.reconnect {
                info!("session expired, reconnecting");
                if let Err(e) = self.close().await {
                    warn!(error = %e, "closing the expired handle failed");
                }
                match self.connect().await {
                    Ok(()) => SESSION_RECONNECT_METRIC.inc(),
                    Err(e) => error!(error = %e, "reconnect after session expiry failed"),
                }
            }
        }
        })
    }
}

fn wrap_watcher(watch: Option<Watcher>) -> Option<RawWatcher> {
    watch.map(|watch| -> RawWatcher {
        Arc::new(move |raw: RawWatchedEvent| {
            let event = ClientEvent::from_raw(&raw)
                .expect("native client delivered codes outside the vendor enumerations");
            watch(event);
        })
    })
}

#[cfg(test)]
mod cache_test;
#[cfg(test)]
mod tree_test;
