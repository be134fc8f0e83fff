use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;

lazy_static! {
    pub static ref CACHE_HIT_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("keeper_cache_hit", "Cached reads served from memory"),
        &["op"]
    )
    .expect("metric can not be created");

    pub static ref CACHE_MISS_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("keeper_cache_miss", "Cached reads that went to the transport"),
        &["op"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_EVENT_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("keeper_watch_event", "Watch notifications by event type"),
        &["event_type"]
    )
    .expect("metric can not be created");

    pub static ref SESSION_EXPIRED_METRIC: IntCounter = IntCounter::new(
        "keeper_session_expired",
        "Session expiries observed through the global watcher"
    )
    .expect("metric can not be created");

    pub static ref SESSION_RECONNECT_METRIC: IntCounter = IntCounter::new(
        "keeper_session_reconnect",
        "Successful automatic reconnects after session expiry"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

/// Registers the client metrics on the given registry (typically
/// [`struct@REGISTRY`]). Call once per registry before scraping.
pub fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(CACHE_HIT_METRIC.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(CACHE_MISS_METRIC.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(WATCH_EVENT_METRIC.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(SESSION_EXPIRED_METRIC.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(SESSION_RECONNECT_METRIC.clone()))
        .expect("collector can be registered");
}

#[cfg(test)]
mod metrics_test;
