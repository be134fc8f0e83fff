//! Transport seam to the underlying coordination-client library.
//!
//! The wire protocol, TCP session management, and ACL encoding live
//! behind these traits; this crate only assumes an async request/response
//! API with one-shot watch callbacks. [`Connector`] opens sessions,
//! [`Session`] is one live handle. Watch callbacks deliver raw vendor
//! codes (see [`crate::constants`]) and are invoked from the transport's
//! I/O context, so they must be cheap and non-blocking.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;

use crate::TransportError;

/// A raw watch or session notification as delivered by the native client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawWatchedEvent {
    pub event_type: i32,
    pub keeper_state: i32,
    pub path: String,
}

/// Callback registered with the transport, globally or per call
pub type RawWatcher = Arc<dyn Fn(RawWatchedEvent) + Send + Sync>;

/// Node metadata as maintained by the coordination service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    /// Zxid of the create that made this node
    pub czxid: i64,
    /// Zxid of the last modification
    pub mzxid: i64,
    pub ctime: i64,
    pub mtime: i64,
    /// Data version, bumped by every set
    pub version: i32,
    /// Child-list version
    pub cversion: i32,
    /// ACL version
    pub aversion: i32,
    /// Session id owning this node, or 0 for persistent nodes
    pub ephemeral_owner: i64,
    pub data_length: i32,
    pub num_children: i32,
    pub pzxid: i64,
}

/// Permission bits for [`Acl`] entries

pub mod perms {
    pub const READ: u32 = 1;
    pub const WRITE: u32 = 2;
    pub const CREATE: u32 = 4;
    pub const DELETE: u32 = 8;
    pub const ADMIN: u32 = 16;
    pub const ALL: u32 = READ | WRITE | CREATE | DELETE | ADMIN;
}

/// One access-control entry. Encoding is a transport concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    pub perms: u32,
    pub scheme: String,
    pub id: String,
}

impl Acl {
    /// The world-readable, fully open ACL
    pub fn open_unsafe() -> Vec<Acl> {
        vec![Acl {
            perms: perms::ALL,
            scheme: "world".to_string(),
            id: "anyone".to_string(),
        }]
    }
}

/// Node lifetime and naming semantics for create operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreateMode {
    #[default]
    Persistent,
    /// Deleted automatically when the owning session ends
    Ephemeral,
    PersistentSequential,
    EphemeralSequential,
}

/// Opens sessions against a server list.
///
/// The global watcher receives every session state change and every
/// fired watch of the returned session.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a session in the background and returns its handle.
    ///
    /// This does not wait for the session to reach the connected state;
    /// connection progress is reported through the global watcher.
    async fn connect(
        &self,
        servers: &str,
        watcher: RawWatcher,
    ) -> std::result::Result<Box<dyn Session>, TransportError>;
}

/// One live session handle.
///
/// Watches taken out through the optional per-call watcher are one-shot:
/// they fire a single notification for the next matching change, then
/// must be re-subscribed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Session: Send + Sync {
    /// Raw connection state code (see [`crate::constants`])
    fn state_code(&self) -> i32;

    /// Ensemble-assigned session identifier
    fn client_id(&self) -> i64;

    /// # Errors
    /// - [`TransportError::ConnectionLoss`] / [`TransportError::SessionExpired`] on a dead session
    async fn exists(
        &self,
        path: &str,
        watch: Option<RawWatcher>,
    ) -> std::result::Result<Option<Stat>, TransportError>;

    /// # Errors
    /// - [`TransportError::NoNode`] if the node does not exist
    async fn get_data(
        &self,
        path: &str,
        watch: Option<RawWatcher>,
    ) -> std::result::Result<(Bytes, Stat), TransportError>;

    /// # Errors
    /// - [`TransportError::NoNode`] if the node does not exist
    async fn get_children(
        &self,
        path: &str,
        watch: Option<RawWatcher>,
    ) -> std::result::Result<Vec<String>, TransportError>;

    /// Returns the actual created path (differs from `path` for
    /// sequential modes).
    ///
    /// # Errors
    /// - [`TransportError::NodeExists`] if the path is taken
    /// - [`TransportError::NoNode`] if the parent does not exist
    async fn create(
        &self,
        path: &str,
        data: Bytes,
        acl: Vec<Acl>,
        mode: CreateMode,
    ) -> std::result::Result<String, TransportError>;

    /// # Errors
    /// - [`TransportError::BadVersion`] if `version` is not current and
    ///   not [`crate::constants::ANY_VERSION`]
    async fn set_data(
        &self,
        path: &str,
        data: Bytes,
        version: i32,
    ) -> std::result::Result<Stat, TransportError>;

    /// # Errors
    /// - [`TransportError::NotEmpty`] if the node still has children
    async fn delete(
        &self,
        path: &str,
        version: i32,
    ) -> std::result::Result<(), TransportError>;

    async fn get_acl(
        &self,
        path: &str,
    ) -> std::result::Result<(Vec<Acl>, Stat), TransportError>;

    async fn set_acl(
        &self,
        path: &str,
        version: i32,
        acl: Vec<Acl>,
    ) -> std::result::Result<Stat, TransportError>;

    /// Releases the handle. Further calls fail with
    /// [`TransportError::InvalidHandle`].
    async fn close(&self) -> std::result::Result<(), TransportError>;
}
