use crate::constants::AUTH_FAILED_STATE;
use crate::constants::CHANGED_EVENT;
use crate::constants::CHILD_EVENT;
use crate::constants::CONNECTED_STATE;
use crate::constants::CREATED_EVENT;
use crate::constants::DELETED_EVENT;
use crate::constants::EXPIRED_SESSION_STATE;
use crate::constants::INIT_STATE;
use crate::constants::NOT_CONNECTED_STATE;
use crate::constants::NOT_WATCHING_EVENT;
use crate::constants::SESSION_EVENT;
use crate::ClientEvent;
use crate::EventType;
use crate::KeeperState;
use crate::ProtocolError;
use crate::RawWatchedEvent;

#[test]
fn test_event_type_mapping_covers_vendor_enumeration() {
    assert_eq!(EventType::try_from(CREATED_EVENT), Ok(EventType::Created));
    assert_eq!(EventType::try_from(DELETED_EVENT), Ok(EventType::Deleted));
    assert_eq!(EventType::try_from(CHANGED_EVENT), Ok(EventType::Changed));
    assert_eq!(EventType::try_from(CHILD_EVENT), Ok(EventType::Child));
    assert_eq!(EventType::try_from(SESSION_EVENT), Ok(EventType::Session));
    assert_eq!(
        EventType::try_from(NOT_WATCHING_EVENT),
        Ok(EventType::NotWatching)
    );
}

#[test]
fn test_pre_connection_aliases_read_as_connecting() {
    assert_eq!(
        KeeperState::try_from(INIT_STATE),
        Ok(KeeperState::Connecting)
    );
    assert_eq!(
        KeeperState::try_from(NOT_CONNECTED_STATE),
        Ok(KeeperState::Connecting)
    );
}

#[test]
fn test_unknown_codes_fail_loudly() {
    assert_eq!(
        EventType::try_from(42),
        Err(ProtocolError::UnknownEventType(42))
    );
    assert_eq!(
        KeeperState::try_from(-7),
        Err(ProtocolError::UnknownKeeperState(-7))
    );
}

#[test]
fn test_symbolic_names() {
    assert_eq!(EventType::Child.name(), "child");
    assert_eq!(EventType::NotWatching.name(), "not-watching");
    assert_eq!(KeeperState::AuthFailed.name(), "auth-failed");
    assert_eq!(KeeperState::Expired.name(), "expired");
}

#[test]
fn test_from_raw_wraps_all_three_fields() {
    let raw = RawWatchedEvent {
        event_type: CHANGED_EVENT,
        keeper_state: CONNECTED_STATE,
        path: "/a/b".to_string(),
    };
    let event = ClientEvent::from_raw(&raw).unwrap();

    assert_eq!(event.event_type, EventType::Changed);
    assert_eq!(event.keeper_state, KeeperState::Connected);
    assert_eq!(event.path, "/a/b");
    assert_eq!(event.to_string(), "changed at \"/a/b\" (state: connected)");
}

#[test]
fn test_from_raw_rejects_unknown_state() {
    let raw = RawWatchedEvent {
        event_type: SESSION_EVENT,
        keeper_state: 12345,
        path: String::new(),
    };
    assert_eq!(
        ClientEvent::from_raw(&raw),
        Err(ProtocolError::UnknownKeeperState(12345))
    );
}

#[test]
fn test_state_mapping_covers_terminal_states() {
    assert_eq!(
        KeeperState::try_from(AUTH_FAILED_STATE),
        Ok(KeeperState::AuthFailed)
    );
    assert_eq!(
        KeeperState::try_from(EXPIRED_SESSION_STATE),
        Ok(KeeperState::Expired)
    );
}
