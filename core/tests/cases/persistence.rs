use crate::common::{manual_client, TestHarness};
use httptraffic_core::ClientConfig;

fn connections_for(config: ClientConfig) -> (u64, usize, u64) {
    let mut h = TestHarness::new();
    let server = h.add_server(1);
    let client = h.add_client(0, config);
    h.connect(0, 1);
    h.start_app(1, 1.0, 10.0);
    h.start_app(0, 2.0, 10.0);
    h.run_until(10.0);
    (client.connections_opened(), server.connections_used_by(0), client.received())
}

#[test]
fn test_forced_non_persistent_overrides_http11() {
    let cfg = ClientConfig {
        http1_1: true,
        force_persistent: Some(false),
        ..manual_client(1, 3)
    };
    assert_eq!(connections_for(cfg), (3, 3, 3));
}

#[test]
fn test_forced_persistent_spans_pages() {
    let cfg = ClientConfig {
        force_persistent: Some(true),
        ..manual_client(2, 2)
    };
    assert_eq!(connections_for(cfg), (1, 1, 4));
}

#[test]
fn test_http11_keeps_multi_object_pages_on_one_connection() {
    let cfg = ClientConfig {
        http1_1: true,
        ..manual_client(1, 3)
    };
    assert_eq!(connections_for(cfg), (1, 1, 3));
}

#[test]
fn test_http11_single_object_pages_reconnect() {
    let cfg = ClientConfig {
        http1_1: true,
        ..manual_client(2, 1)
    };
    assert_eq!(connections_for(cfg), (2, 2, 2));
}

#[test]
fn test_http10_uses_a_connection_per_object() {
    assert_eq!(connections_for(manual_client(1, 3)), (3, 3, 3));
}
