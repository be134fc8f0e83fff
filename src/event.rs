//! Typed view over the native client's watch notifications.
//!
//! Every asynchronous notification funneled through the global watcher is
//! wrapped into a [`ClientEvent`] before it reaches any subscriber, so
//! callers never handle raw positional codes.

use std::fmt;

use crate::constants::ASSOCIATING_STATE;
use crate::constants::AUTH_FAILED_STATE;
use crate::constants::CHANGED_EVENT;
use crate::constants::CHILD_EVENT;
use crate::constants::CONNECTED_STATE;
use crate::constants::CONNECTING_STATE;
use crate::constants::CREATED_EVENT;
use crate::constants::DELETED_EVENT;
use crate::constants::EXPIRED_SESSION_STATE;
use crate::constants::INIT_STATE;
use crate::constants::NOT_CONNECTED_STATE;
use crate::constants::NOT_WATCHING_EVENT;
use crate::constants::SESSION_EVENT;
use crate::ProtocolError;
use crate::RawWatchedEvent;

/// What kind of change a watch notification reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    NotWatching,
    Session,
    Created,
    Deleted,
    Changed,
    Child,
}

impl EventType {
    /// Symbolic name, matching the native client's vocabulary
    pub fn name(&self) -> &'static str {
        match self {
            EventType::NotWatching => "not-watching",
            EventType::Session => "session",
            EventType::Created => "created",
            EventType::Deleted => "deleted",
            EventType::Changed => "changed",
            EventType::Child => "child",
        }
    }
}

impl TryFrom<i32> for EventType {
    type Error = ProtocolError;

    fn try_from(code: i32) -> std::result::Result<Self, ProtocolError> {
        match code {
            NOT_WATCHING_EVENT => Ok(EventType::NotWatching),
            SESSION_EVENT => Ok(EventType::Session),
            CREATED_EVENT => Ok(EventType::Created),
            DELETED_EVENT => Ok(EventType::Deleted),
            CHANGED_EVENT => Ok(EventType::Changed),
            CHILD_EVENT => Ok(EventType::Child),
            other => Err(ProtocolError::UnknownEventType(other)),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Connection state of the session, as reported by the native client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeeperState {
    Associating,
    AuthFailed,
    Connected,
    Connecting,
    Expired,
}

impl KeeperState {
    /// Symbolic name, matching the native client's vocabulary
    pub fn name(&self) -> &'static str {
        match self {
            KeeperState::Associating => "associating",
            KeeperState::AuthFailed => "auth-failed",
            KeeperState::Connected => "connected",
            KeeperState::Connecting => "connecting",
            KeeperState::Expired => "expired",
        }
    }
}

impl TryFrom<i32> for KeeperState {
    type Error = ProtocolError;

    fn try_from(code: i32) -> std::result::Result<Self, ProtocolError> {
        match code {
            ASSOCIATING_STATE => Ok(KeeperState::Associating),
            AUTH_FAILED_STATE => Ok(KeeperState::AuthFailed),
            CONNECTED_STATE => Ok(KeeperState::Connected),
            // the two pre-connection codes read as "connecting"
            CONNECTING_STATE | INIT_STATE | NOT_CONNECTED_STATE => Ok(KeeperState::Connecting),
            EXPIRED_SESSION_STATE => Ok(KeeperState::Expired),
            other => Err(ProtocolError::UnknownKeeperState(other)),
        }
    }
}

impl fmt::Display for KeeperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single watch or session notification, as published on the client's
/// event bus and delivered to per-call watchers.
///
/// The embedded `keeper_state` is the connection state at the moment the
/// native client generated the notification; the session may have moved
/// on by the time a subscriber runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEvent {
    pub event_type: EventType,
    pub keeper_state: KeeperState,
    pub path: String,
}

impl ClientEvent {
    /// Maps a raw notification into the typed model.
    ///
    /// Fails only for codes outside the vendor enumerations, which is a
    /// programming error in the transport implementation rather than a
    /// runtime case; the dispatch path panics on it.
    pub fn from_raw(raw: &RawWatchedEvent) -> std::result::Result<Self, ProtocolError> {
        Ok(Self {
            event_type: EventType::try_from(raw.event_type)?,
            keeper_state: KeeperState::try_from(raw.keeper_state)?,
            path: raw.path.clone(),
        })
    }
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {:?} (state: {})",
            self.event_type, self.path, self.keeper_state
        )
    }
}
