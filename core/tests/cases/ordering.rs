use crate::common::{assert_ascending, manual_client, TestHarness};
use httptraffic_core::{Experiment, SERVER_NODE};

#[test]
fn test_manual_session_is_served_in_order() {
    let mut h = TestHarness::new();
    let server = h.add_server(1);
    let client = h.add_client(0, manual_client(3, 4));
    h.connect(0, 1);
    h.start_app(1, 1.0, 10.0);
    h.start_app(0, 2.0, 10.0);
    h.run_until(10.0);

    let order: Vec<(u32, u32)> = server.served_for(0).iter().map(|s| (s.page, s.object)).collect();
    let expected: Vec<(u32, u32)> = (1..=3).flat_map(|p| (1..=4).map(move |o| (p, o))).collect();
    assert_eq!(order, expected);
    assert_eq!(client.received(), 12);
}

#[test]
fn test_clients_interleave_but_each_stays_ordered() {
    let mut h = TestHarness::new();
    let server = h.add_server(1);
    for id in [0, 2, 3] {
        h.add_client(id, manual_client(2, 3));
        h.connect(id, 1);
        h.start_app(id, 2.0, 10.0);
    }
    h.start_app(1, 1.0, 10.0);
    h.run_until(10.0);

    let served = server.stats.read().unwrap().served.clone();
    assert_eq!(served.len(), 18);
    // All three clients are active at once, so the global log mixes them.
    assert_ne!(served[0].client, served[1].client);
    for id in [0, 2, 3] {
        let mine = server.served_for(id);
        assert_eq!(mine.len(), 6);
        assert_ascending(&mine);
    }
}

#[test]
fn test_automatic_sessions_stay_ordered() {
    for run_no in [1, 7, 42] {
        let exp = Experiment {
            run_no,
            clients: 4,
            stop: 200.0,
            ..Experiment::default()
        };
        let mut bed = exp.build().unwrap();
        bed.run();

        let served = bed.server_stats.read().unwrap().served.clone();
        assert!(!served.is_empty(), "run {run_no} served nothing");
        for (id, _) in &bed.clients {
            assert_ne!(*id, SERVER_NODE);
            let mine: Vec<_> = served.iter().filter(|s| s.client == *id).copied().collect();
            assert_ascending(&mine);
        }
    }
}
