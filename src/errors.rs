//! Coordination Client Error Hierarchy
//!
//! Defines error types for the session-aware client layer, categorized by
//! where they originate: the transport seam, the client's own lifecycle
//! rules, or configuration loading.

use config::ConfigError;

use crate::bus::SubscriptionId;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `wait_until_connected` did not observe the connected state within
    /// the caller's deadline. The caller decides whether to retry.
    #[error("timed out waiting for the session to become connected")]
    Timeout,

    /// Protocol-level failures surfaced verbatim from the transport
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Raw codes outside the vendor enumerations
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Unsubscribing a listener that is not registered on the bus. This
    /// signals a programming error; it is never retried.
    #[error("subscription {0:?} is not registered on this bus")]
    ListenerNotFound(SubscriptionId),

    /// `connect()` on a client that already holds a live handle
    #[error("client is already connected; call close() first")]
    AlreadyConnected,

    /// A data operation before `connect()` or after `close()`
    #[error("client is not connected")]
    NotConnected,

    /// Configuration loading/validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors surfaced by transport implementations for data-plane and
/// session operations. These pass through the client layer unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The addressed node does not exist
    #[error("no node at {0}")]
    NoNode(String),

    /// Create on a path that is already taken
    #[error("node already exists at {0}")]
    NodeExists(String),

    /// Delete on a node that still has children
    #[error("node at {0} is not empty")]
    NotEmpty(String),

    /// Optimistic version check failed on set/delete
    #[error("version conflict at {0}")]
    BadVersion(String),

    /// Session authentication failed
    #[error("authentication failed")]
    AuthFailed,

    /// The session lacks permission for the operation
    #[error("no authorization for {0}")]
    NoAuth(String),

    /// The connection to the ensemble dropped mid-operation
    #[error("connection to the ensemble was lost")]
    ConnectionLoss,

    /// The session was expired by the ensemble
    #[error("session expired")]
    SessionExpired,

    /// Operation on a closed or released handle
    #[error("session handle is closed")]
    InvalidHandle,

    /// Request or response could not be (de)serialized
    #[error("marshalling error: {0}")]
    Marshalling(String),
}

/// A raw code outside the vendor-defined enumerations reached the typed
/// mapping layer. From a live native client this cannot happen; it means
/// a transport implementation produced codes the mapping was never
/// extended for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown watch event type code {0}")]
    UnknownEventType(i32),

    #[error("unknown connection state code {0}")]
    UnknownKeeperState(i32),
}
