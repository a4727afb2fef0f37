use crate::common::{manual_client, TestHarness};
use httptraffic_core::{ClientConfig, ClientState, Experiment};

#[test]
fn test_single_object_is_delivered() {
    let mut h = TestHarness::new();
    let server = h.add_server(1);
    let client = h.add_client(0, manual_client(1, 1));
    h.connect(0, 1);

    h.start_app(1, 1.0, 10.0);
    h.start_app(0, 2.0, 10.0);
    h.run_until(10.0);

    assert_eq!(client.received(), 1, "Did not receive expected number of objects");
    assert_eq!(server.served_for(0).len(), 1);
    let stats = client.stats.read().unwrap();
    assert_eq!(stats.sessions_completed, 1);
    assert_eq!(stats.bytes_received, 100);
    assert_eq!(stats.delivery_failures, 0);
    // Handshake, request and reply cross a 2 ms link; the server holds it 100 ms.
    let rt = stats.response_times.percentile_ms(50.0).unwrap();
    assert!(rt > 100.0 && rt < 120.0, "response time {rt} ms");
}

#[test]
fn test_multi_page_session_completes() {
    let mut h = TestHarness::new();
    h.add_server(1);
    let client = h.add_client(0, manual_client(2, 3));
    h.connect(0, 1);
    h.start_app(1, 1.0, 10.0);
    h.start_app(0, 2.0, 20.0);
    h.run_until(9.0);

    let stats = client.stats.read().unwrap();
    assert_eq!(stats.objects_requested, 6);
    assert_eq!(stats.objects_received, 6);
    assert_eq!(stats.pages_completed, 2);
    assert_eq!(stats.sessions_completed, 1);
    assert_eq!(stats.bytes_requested, 600);
    assert!(h.is_running(0));
    // Only the scheduled stop is left once the single session is done.
    assert_eq!(h.sim.pending_for(0), 1);
}

#[test]
fn test_large_responses_are_reassembled() {
    let mut h = TestHarness::new();
    h.add_server(1);
    let client = h.add_client(
        0,
        ClientConfig {
            user_response_size: 250_000,
            ..manual_client(1, 2)
        },
    );
    h.connect(0, 1);
    h.start_app(1, 1.0, 10.0);
    h.start_app(0, 2.0, 10.0);
    h.run_until(10.0);

    assert_eq!(client.received(), 2);
    assert_eq!(client.stats.read().unwrap().bytes_received, 500_000);
}

#[test]
fn test_automatic_traffic_flows() {
    let exp = Experiment {
        clients: 3,
        stop: 120.0,
        ..Experiment::default()
    };
    let mut bed = exp.build().unwrap();
    let summary = bed.run();

    assert!(summary.objects_received > 0, "automatic mode produced no traffic");
    assert!(summary.sessions_completed > 0);
    assert!(summary.requests_served >= summary.objects_received);
    assert_eq!(summary.delivery_failures, 0);
    assert_eq!(summary.response_times.count, summary.objects_received);
}

#[test]
fn test_client_state_is_reported() {
    use httptraffic_core::Client;
    let client = Client::new("c", manual_client(1, 1)).unwrap();
    assert_eq!(client.state(), ClientState::Idle);
    assert_eq!(client.received(), 0);
}
