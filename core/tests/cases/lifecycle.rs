use crate::common::{manual_client, TestHarness};
use httptraffic_core::ClientConfig;

#[test]
fn test_nothing_arrives_without_a_server() {
    let mut h = TestHarness::new();
    let server = h.add_server(1);
    let client = h.add_client(0, manual_client(1, 1));
    h.connect(0, 1);
    h.start_app(0, 2.0, 10.0);
    h.run_until(10.0);

    assert_eq!(client.received(), 0);
    assert_eq!(client.connections_opened(), 1);
    assert!(server.served_for(0).is_empty());
    assert_eq!(server.stats.read().unwrap().connections_accepted, 0);
}

#[test]
fn test_unlinked_client_traffic_is_dropped() {
    let mut h = TestHarness::new();
    h.add_server(1);
    let client = h.add_client(0, ClientConfig { remote: Some(1), ..manual_client(1, 1) });
    h.start_app(1, 1.0, 10.0);
    h.start_app(0, 2.0, 10.0);
    h.run_until(9.0);

    assert_eq!(client.received(), 0);
    assert_eq!(h.sim.dropped, 1);
}

#[test]
fn test_stop_mid_object_abandons_it() {
    let mut h = TestHarness::new();
    let server = h.add_server(1);
    let client = h.add_client(0, manual_client(1, 1));
    h.connect(0, 1);
    h.start_app(1, 1.0, 10.0);
    // The reply is due about 108 ms after the start.
    h.start_app(0, 2.0, 2.05);
    h.run_until(10.0);

    assert_eq!(client.received(), 0);
    assert_eq!(client.stats.read().unwrap().objects_requested, 1);
    assert!(!h.is_running(0));
    assert_eq!(h.sim.pending_for(0), 0);
    // The close reached the server before its delay ran out.
    assert!(server.served_for(0).is_empty());
}

#[test]
fn test_restart_runs_a_fresh_session() {
    let mut h = TestHarness::new();
    let server = h.add_server(1);
    let client = h.add_client(0, ClientConfig { max_sessions: 2, ..manual_client(1, 1) });
    h.connect(0, 1);
    h.start_app(1, 1.0, 10.0);
    h.start_app(0, 2.0, 2.05);
    h.run_until(2.5);

    h.start_app(0, 3.0, 10.0);
    h.run_until(10.0);

    assert_eq!(client.received(), 1);
    let served = server.served_for(0);
    assert_eq!(served.len(), 1);
    assert_eq!((served[0].page, served[0].object, served[0].conn_seq), (1, 1, 1));
    assert_eq!(client.stats.read().unwrap().sessions_completed, 1);
}

#[test]
fn test_prescheduled_restart_window_runs() {
    let mut h = TestHarness::new();
    let server = h.add_server(1);
    let client = h.add_client(0, ClientConfig { max_sessions: 2, ..manual_client(1, 1) });
    h.connect(0, 1);
    h.start_app(1, 1.0, 10.0);
    h.start_app(0, 2.0, 2.05);
    h.start_app(0, 3.0, 10.0);
    h.run_until(10.0);

    assert_eq!(client.received(), 1);
    let served = server.served_for(0);
    assert_eq!(served.len(), 1);
    assert_eq!(served[0].conn_seq, 1);
    assert!(!h.is_running(0));
}

#[test]
fn test_server_stop_ends_service() {
    let mut h = TestHarness::new();
    let server = h.add_server(1);
    let client = h.add_client(0, manual_client(1, 5));
    h.connect(0, 1);
    h.start_app(1, 1.0, 2.5);
    h.start_app(0, 2.0, 10.0);
    h.run_until(10.0);

    let served = server.served_for(0).len() as u64;
    assert!(served > 0 && served < 5, "served {served}");
    assert_eq!(client.received(), served);
    assert!(!h.is_running(1));
}
