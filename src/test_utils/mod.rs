//! the test_utils folder here will share fixtures between the unit tests
//! of the session, cache and tree modules

pub mod sim;

use std::sync::Arc;
use std::time::Duration;

use crate::test_utils::sim::SimBackend;
use crate::test_utils::sim::SimConnector;
use crate::ClientConfig;
use crate::KeeperState;
use crate::SessionClient;

pub fn sim_config(reconnect: bool) -> ClientConfig {
    ClientConfig::builder("sim:2181").reconnect(reconnect).build()
}

/// A client wired to the given simulated ensemble, not yet connected
pub fn sim_client(
    backend: &Arc<SimBackend>,
    reconnect: bool,
) -> SessionClient {
    SessionClient::new(
        Arc::new(SimConnector::new(Arc::clone(backend))),
        sim_config(reconnect),
    )
}

/// A client that has connected and reached the connected state
pub async fn connected_client(backend: &Arc<SimBackend>) -> SessionClient {
    let client = sim_client(backend, true);
    client.connect().await.expect("session should open");
    client
        .wait_until_connected(Some(Duration::from_secs(5)))
        .await
        .expect("session should connect");
    client
}

/// Polls until the client reports `want`; panics after five seconds
pub async fn wait_for_state(
    client: &SessionClient,
    want: KeeperState,
) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while client.state_name() != Some(want) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("state never reached {want}"));
}
