use httptraffic_core::{Experiment, ServedRequest, TrafficSummary};

fn run(run_no: u64) -> (Vec<ServedRequest>, TrafficSummary) {
    let exp = Experiment {
        run_no,
        clients: 3,
        stop: 90.0,
        ..Experiment::default()
    };
    let mut bed = exp.build().unwrap();
    let summary = bed.run();
    let served = bed.server_stats.read().unwrap().served.clone();
    (served, summary)
}

#[test]
fn test_same_run_number_replays_exactly() {
    let (served_a, summary_a) = run(5);
    let (served_b, summary_b) = run(5);
    assert!(!served_a.is_empty());
    assert_eq!(served_a, served_b);
    assert_eq!(summary_a.bytes_received, summary_b.bytes_received);
    assert_eq!(summary_a.response_times, summary_b.response_times);
}

#[test]
fn test_run_number_changes_the_traffic() {
    let (served_a, _) = run(5);
    let (served_b, _) = run(6);
    assert_ne!(served_a, served_b);
}

#[test]
fn test_experiment_json_round_trips_into_the_same_run() {
    let exp = Experiment {
        run_no: 11,
        clients: 2,
        stop: 30.0,
        ..Experiment::default()
    };
    let text = serde_json::to_string(&exp).unwrap();
    let mut a = exp.build().unwrap();
    let mut b = Experiment::from_json(&text).unwrap().build().unwrap();
    assert_eq!(a.run().objects_received, b.run().objects_received);
}
