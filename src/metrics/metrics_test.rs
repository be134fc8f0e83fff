use prometheus::Registry;

use super::*;

fn create_test_registry() -> Registry {
    let registry = Registry::new_custom(Some("keeper".to_string()), None).unwrap();
    register_custom_metrics(&registry);
    registry
}

#[test]
fn test_custom_registry() {
    let registry = create_test_registry();

    CACHE_HIT_METRIC.with_label_values(&["exists"]).inc();
    let metrics = &registry.gather();
    assert!(!metrics.is_empty());

    let metric_names: Vec<_> = metrics.iter().map(|m| m.get_name()).collect();
    assert!(
        metric_names.contains(&"keeper_keeper_cache_hit"),
        "Missing keeper_cache_hit"
    );
}

#[test]
fn test_counter_increment() {
    // label value the client code never uses, to avoid test pollution
    CACHE_MISS_METRIC.with_label_values(&["probe"]).inc();
    CACHE_MISS_METRIC.with_label_values(&["probe"]).inc();

    let value = CACHE_MISS_METRIC.with_label_values(&["probe"]).get();
    assert_eq!(value, 2, "Counter should increment correctly");
}

#[test]
fn test_labels_are_distinguished() {
    WATCH_EVENT_METRIC.with_label_values(&["probe-a"]).inc();
    WATCH_EVENT_METRIC.with_label_values(&["probe-b"]).inc();
    WATCH_EVENT_METRIC.with_label_values(&["probe-b"]).inc();

    assert_eq!(WATCH_EVENT_METRIC.with_label_values(&["probe-a"]).get(), 1);
    assert_eq!(WATCH_EVENT_METRIC.with_label_values(&["probe-b"]).get(), 2);
}
