// -
// Wire-level enumerations of the native coordination client.
//
// Transport implementations report watch notifications and session state
// with these raw codes; [`crate::EventType`] and [`crate::KeeperState`]
// are the typed views over them.

/// Watch event type codes

pub const CREATED_EVENT: i32 = 1;
pub const DELETED_EVENT: i32 = 2;
pub const CHANGED_EVENT: i32 = 3;
pub const CHILD_EVENT: i32 = 4;
pub const SESSION_EVENT: i32 = -1;
pub const NOT_WATCHING_EVENT: i32 = -2;

/// Connection state codes

pub const CONNECTING_STATE: i32 = 1;
pub const ASSOCIATING_STATE: i32 = 2;
pub const CONNECTED_STATE: i32 = 3;
pub const AUTH_FAILED_STATE: i32 = -113;
pub const EXPIRED_SESSION_STATE: i32 = -112;

/// Pre-connection states some native clients report before the first real
/// transition; both read as "connecting".
pub const INIT_STATE: i32 = 0;
pub const NOT_CONNECTED_STATE: i32 = 999;

/// Version argument that disables the optimistic version check on
/// set/delete operations.
pub const ANY_VERSION: i32 = -1;
