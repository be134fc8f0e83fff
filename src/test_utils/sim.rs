//! In-memory coordination service for unit tests.
//!
//! Implements the transport seam over a flat path map with one-shot
//! watches, session-owned ephemeral nodes, forced session expiry and
//! per-operation call counting, so tests can assert transport traffic
//! and watch-driven invalidation without a live ensemble.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::constants::CHANGED_EVENT;
use crate::constants::CHILD_EVENT;
use crate::constants::CONNECTED_STATE;
use crate::constants::CONNECTING_STATE;
use crate::constants::CREATED_EVENT;
use crate::constants::DELETED_EVENT;
use crate::constants::EXPIRED_SESSION_STATE;
use crate::constants::SESSION_EVENT;
use crate::Acl;
use crate::Connector;
use crate::CreateMode;
use crate::RawWatchedEvent;
use crate::RawWatcher;
use crate::Session;
use crate::Stat;
use crate::TransportError;

#[derive(Debug, Clone, Default)]
struct SimNode {
    data: Bytes,
    acl: Vec<Acl>,
    version: i32,
    cversion: i32,
    aversion: i32,
    czxid: i64,
    mzxid: i64,
    ephemeral_owner: i64,
}

#[derive(Default)]
struct WatchTable {
    exists: HashMap<String, Vec<RawWatcher>>,
    data: HashMap<String, Vec<RawWatcher>>,
    children: HashMap<String, Vec<RawWatcher>>,
}

struct SessionShared {
    id: i64,
    state: AtomicI32,
    closed: AtomicBool,
    watcher: RawWatcher,
}

/// The simulated ensemble. Shared by every session opened through
/// [`SimConnector`].
pub struct SimBackend {
    tree: Mutex<BTreeMap<String, SimNode>>,
    watches: Mutex<WatchTable>,
    zxid: AtomicI64,
    next_session_id: AtomicI64,
    reachable: bool,
    current: Mutex<Option<Arc<SessionShared>>>,
    counts: Mutex<HashMap<&'static str, usize>>,
    creations: Mutex<Vec<String>>,
    deletions: Mutex<Vec<String>>,
}

impl SimBackend {
    pub fn new() -> Arc<Self> {
        Self::build(true)
    }

    /// An ensemble nothing can reach: sessions stay connecting forever
    pub fn unreachable() -> Arc<Self> {
        Self::build(false)
    }

    fn build(reachable: bool) -> Arc<Self> {
        Arc::new(Self {
            tree: Mutex::new(BTreeMap::new()),
            watches: Mutex::new(WatchTable::default()),
            zxid: AtomicI64::new(0),
            next_session_id: AtomicI64::new(0),
            reachable,
            current: Mutex::new(None),
            counts: Mutex::new(HashMap::new()),
            creations: Mutex::new(Vec::new()),
            deletions: Mutex::new(Vec::new()),
        })
    }

    /// Transport calls issued for `op` so far
    pub fn op_count(
        &self,
        op: &'static str,
    ) -> usize {
        self.counts.lock().get(op).copied().unwrap_or(0)
    }

    /// Paths deleted, in deletion order
    pub fn deletions(&self) -> Vec<String> {
        self.deletions.lock().clone()
    }

    /// Paths created through the transport, in creation order
    pub fn creations(&self) -> Vec<String> {
        self.creations.lock().clone()
    }

    pub fn contains(
        &self,
        path: &str,
    ) -> bool {
        self.tree.lock().contains_key(path)
    }

    /// Seeds a persistent node (and any missing ancestors) without
    /// firing watches or counting operations.
    pub fn seed(
        &self,
        path: &str,
        data: &[u8],
    ) {
        self.seed_node(path, data, 0);
    }

    /// Seeds an ephemeral node owned by the current session (or a
    /// synthetic foreign session when none is open).
    pub fn seed_ephemeral(
        &self,
        path: &str,
        data: &[u8],
    ) {
        let owner = self
            .current
            .lock()
            .as_ref()
            .map(|shared| shared.id)
            .unwrap_or(1);
        self.seed_node(path, data, owner);
    }

    fn seed_node(
        &self,
        path: &str,
        data: &[u8],
        ephemeral_owner: i64,
    ) {
        if let Some((parent, _)) = path.rsplit_once('/') {
            if !parent.is_empty() && !self.contains(parent) {
                self.seed_node(parent, b"", 0);
            }
        }
        let zxid = self.zxid.fetch_add(1, Ordering::SeqCst) + 1;
        self.tree.lock().insert(
            path.to_string(),
            SimNode {
                data: Bytes::copy_from_slice(data),
                acl: Acl::open_unsafe(),
                czxid: zxid,
                mzxid: zxid,
                ephemeral_owner,
                ..SimNode::default()
            },
        );
    }

    /// Expires the current session: its ephemeral nodes vanish, every
    /// outstanding watch dies with it, and the global watcher observes
    /// the expiry.
    pub fn expire_session(&self) {
        let Some(shared) = self.current.lock().clone() else {
            return;
        };
        shared.state.store(EXPIRED_SESSION_STATE, Ordering::SeqCst);

        {
            let mut tree = self.tree.lock();
            let owned: Vec<String> = tree
                .iter()
                .filter(|(_, node)| node.ephemeral_owner == shared.id)
                .map(|(path, _)| path.clone())
                .collect();
            for path in owned {
                tree.remove(&path);
            }
        }
        *self.watches.lock() = WatchTable::default();

        (shared.watcher)(RawWatchedEvent {
            event_type: SESSION_EVENT,
            keeper_state: EXPIRED_SESSION_STATE,
            path: String::new(),
        });
    }

    fn bump(
        &self,
        op: &'static str,
    ) {
        *self.counts.lock().entry(op).or_insert(0) += 1;
    }

    fn open_session(
        self: &Arc<Self>,
        watcher: RawWatcher,
    ) -> Box<dyn Session> {
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst) + 1;
        let state = if self.reachable {
            CONNECTED_STATE
        } else {
            CONNECTING_STATE
        };
        let shared = Arc::new(SessionShared {
            id,
            state: AtomicI32::new(state),
            closed: AtomicBool::new(false),
            watcher,
        });
        *self.current.lock() = Some(Arc::clone(&shared));

        if self.reachable {
            (shared.watcher)(RawWatchedEvent {
                event_type: SESSION_EVENT,
                keeper_state: CONNECTED_STATE,
                path: String::new(),
            });
        }

        Box::new(SimSession {
            backend: Arc::clone(self),
            shared,
        })
    }

    fn fire(
        &self,
        watchers: Vec<RawWatcher>,
        event_type: i32,
        path: &str,
    ) {
        for watcher in watchers {
            watcher(RawWatchedEvent {
                event_type,
                keeper_state: CONNECTED_STATE,
                path: path.to_string(),
            });
        }
    }

    /// Drains the one-shot watchers interested in `path` from the given
    /// tables.
    fn drain(
        &self,
        path: &str,
        exists: bool,
        data: bool,
        children: bool,
    ) -> Vec<RawWatcher> {
        let mut table = self.watches.lock();
        let mut drained = Vec::new();
        if exists {
            drained.extend(table.exists.remove(path).unwrap_or_default());
        }
        if data {
            drained.extend(table.data.remove(path).unwrap_or_default());
        }
        if children {
            drained.extend(table.children.remove(path).unwrap_or_default());
        }
        drained
    }

    fn stat_of(
        tree: &BTreeMap<String, SimNode>,
        path: &str,
        node: &SimNode,
    ) -> Stat {
        Stat {
            czxid: node.czxid,
            mzxid: node.mzxid,
            ctime: 0,
            mtime: 0,
            version: node.version,
            cversion: node.cversion,
            aversion: node.aversion,
            ephemeral_owner: node.ephemeral_owner,
            data_length: node.data.len() as i32,
            num_children: Self::children_of(tree, path).len() as i32,
            pzxid: node.mzxid,
        }
    }

    fn children_of(
        tree: &BTreeMap<String, SimNode>,
        path: &str,
    ) -> Vec<String> {
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{}/", path)
        };
        tree.range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| {
                let rest = &key[prefix.len()..];
                (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
            })
            .collect()
    }
}

/// [`Connector`] handing out sessions against one [`SimBackend`]
pub struct SimConnector {
    backend: Arc<SimBackend>,
}

impl SimConnector {
    pub fn new(backend: Arc<SimBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Connector for SimConnector {
    async fn connect(
        &self,
        _servers: &str,
        watcher: RawWatcher,
    ) -> std::result::Result<Box<dyn Session>, TransportError> {
        Ok(self.backend.open_session(watcher))
    }
}

struct SimSession {
    backend: Arc<SimBackend>,
    shared: Arc<SessionShared>,
}

impl SimSession {
    fn check_live(&self) -> std::result::Result<(), TransportError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(TransportError::InvalidHandle);
        }
        match self.shared.state.load(Ordering::SeqCst) {
            EXPIRED_SESSION_STATE => Err(TransportError::SessionExpired),
            CONNECTED_STATE => Ok(()),
            _ => Err(TransportError::ConnectionLoss),
        }
    }

    fn register(
        &self,
        table: fn(&mut WatchTable) -> &mut HashMap<String, Vec<RawWatcher>>,
        path: &str,
        watch: Option<RawWatcher>,
    ) {
        if let Some(watch) = watch {
            let mut watches = self.backend.watches.lock();
            table(&mut watches)
                .entry(path.to_string())
                .or_default()
                .push(watch);
        }
    }
}

#[async_trait]
impl Session for SimSession {
    fn state_code(&self) -> i32 {
        self.shared.state.load(Ordering::SeqCst)
    }

    fn client_id(&self) -> i64 {
        self.shared.id
    }

    async fn exists(
        &self,
        path: &str,
        watch: Option<RawWatcher>,
    ) -> std::result::Result<Option<Stat>, TransportError> {
        self.backend.bump("exists");
        self.check_live()?;
        let stat = {
            let tree = self.backend.tree.lock();
            tree.get(path)
                .map(|node| SimBackend::stat_of(&tree, path, node))
        };
        self.register(|table: &mut WatchTable| &mut table.exists, path, watch);
        Ok(stat)
    }

    async fn get_data(
        &self,
        path: &str,
        watch: Option<RawWatcher>,
    ) -> std::result::Result<(Bytes, Stat), TransportError> {
        self.backend.bump("get_data");
        self.check_live()?;
        let result = {
            let tree = self.backend.tree.lock();
            let node = tree
                .get(path)
                .ok_or_else(|| TransportError::NoNode(path.to_string()))?;
            (node.data.clone(), SimBackend::stat_of(&tree, path, node))
        };
        self.register(|table: &mut WatchTable| &mut table.data, path, watch);
        Ok(result)
    }

    async fn get_children(
        &self,
        path: &str,
        watch: Option<RawWatcher>,
    ) -> std::result::Result<Vec<String>, TransportError> {
        self.backend.bump("get_children");
        self.check_live()?;
        let children = {
            let tree = self.backend.tree.lock();
            if !tree.contains_key(path) && path != "/" {
                return Err(TransportError::NoNode(path.to_string()));
            }
            SimBackend::children_of(&tree, path)
        };
        self.register(|table: &mut WatchTable| &mut table.children, path, watch);
        Ok(children)
    }

    async fn create(
        &self,
        path: &str,
        data: Bytes,
        acl: Vec<Acl>,
        mode: CreateMode,
    ) -> std::result::Result<String, TransportError> {
        self.backend.bump("create");
        self.check_live()?;

        let created_path = {
            let mut tree = self.backend.tree.lock();

            let created_path = match mode {
                CreateMode::PersistentSequential | CreateMode::EphemeralSequential => {
                    let seq = self.backend.zxid.fetch_add(1, Ordering::SeqCst) + 1;
                    format!("{path}{seq:010}")
                }
                _ => path.to_string(),
            };

            if tree.contains_key(&created_path) {
                return Err(TransportError::NodeExists(created_path));
            }
            if let Some((parent, _)) = created_path.rsplit_once('/') {
                if !parent.is_empty() && !tree.contains_key(parent) {
                    return Err(TransportError::NoNode(parent.to_string()));
                }
            }

            let ephemeral_owner = match mode {
                CreateMode::Ephemeral | CreateMode::EphemeralSequential => self.shared.id,
                _ => 0,
            };
            let zxid = self.backend.zxid.fetch_add(1, Ordering::SeqCst) + 1;
            tree.insert(
                created_path.clone(),
                SimNode {
                    data,
                    acl,
                    czxid: zxid,
                    mzxid: zxid,
                    ephemeral_owner,
                    ..SimNode::default()
                },
            );
            created_path
        };
        self.backend.creations.lock().push(created_path.clone());

        let on_node = self.backend.drain(&created_path, true, false, false);
        self.backend.fire(on_node, CREATED_EVENT, &created_path);
        if let Some((parent, _)) = created_path.rsplit_once('/') {
            if !parent.is_empty() {
                let on_parent = self.backend.drain(parent, false, false, true);
                self.backend.fire(on_parent, CHILD_EVENT, parent);
            }
        }
        Ok(created_path)
    }

    async fn set_data(
        &self,
        path: &str,
        data: Bytes,
        version: i32,
    ) -> std::result::Result<Stat, TransportError> {
        self.backend.bump("set_data");
        self.check_live()?;

        let stat = {
            let mut tree = self.backend.tree.lock();
            let node = tree
                .get_mut(path)
                .ok_or_else(|| TransportError::NoNode(path.to_string()))?;
            if version != crate::constants::ANY_VERSION && version != node.version {
                return Err(TransportError::BadVersion(path.to_string()));
            }
            node.data = data;
            node.version += 1;
            node.mzxid = self.backend.zxid.fetch_add(1, Ordering::SeqCst) + 1;
            let node = node.clone();
            SimBackend::stat_of(&tree, path, &node)
        };

        let watchers = self.backend.drain(path, true, true, false);
        self.backend.fire(watchers, CHANGED_EVENT, path);
        Ok(stat)
    }

    async fn delete(
        &self,
        path: &str,
        version: i32,
    ) -> std::result::Result<(), TransportError> {
        self.backend.bump("delete");
        self.check_live()?;

        {
            let mut tree = self.backend.tree.lock();
            let node = tree
                .get(path)
                .ok_or_else(|| TransportError::NoNode(path.to_string()))?;
            if version != crate::constants::ANY_VERSION && version != node.version {
                return Err(TransportError::BadVersion(path.to_string()));
            }
            if !SimBackend::children_of(&tree, path).is_empty() {
                return Err(TransportError::NotEmpty(path.to_string()));
            }
            tree.remove(path);
        }
        self.backend.deletions.lock().push(path.to_string());

        let on_node = self.backend.drain(path, true, true, true);
        self.backend.fire(on_node, DELETED_EVENT, path);
        if let Some((parent, _)) = path.rsplit_once('/') {
            if !parent.is_empty() {
                let on_parent = self.backend.drain(parent, false, false, true);
                self.backend.fire(on_parent, CHILD_EVENT, parent);
            }
        }
        Ok(())
    }

    async fn get_acl(
        &self,
        path: &str,
    ) -> std::result::Result<(Vec<Acl>, Stat), TransportError> {
        self.backend.bump("get_acl");
        self.check_live()?;
        let tree = self.backend.tree.lock();
        let node = tree
            .get(path)
            .ok_or_else(|| TransportError::NoNode(path.to_string()))?;
        Ok((node.acl.clone(), SimBackend::stat_of(&tree, path, node)))
    }

    async fn set_acl(
        &self,
        path: &str,
        version: i32,
        acl: Vec<Acl>,
    ) -> std::result::Result<Stat, TransportError> {
        self.backend.bump("set_acl");
        self.check_live()?;
        let mut tree = self.backend.tree.lock();
        let node = tree
            .get_mut(path)
            .ok_or_else(|| TransportError::NoNode(path.to_string()))?;
        if version != crate::constants::ANY_VERSION && version != node.aversion {
            return Err(TransportError::BadVersion(path.to_string()));
        }
        node.acl = acl;
        node.aversion += 1;
        let node = node.clone();
        Ok(SimBackend::stat_of(&tree, path, &node))
    }

    async fn close(&self) -> std::result::Result<(), TransportError> {
        self.shared.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
