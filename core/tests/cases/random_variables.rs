use httptraffic_core::random::{
    FlowArriveVariable, NonPersistRspSizeVariable, NumPagesVariable, ObjsPerPageVariable,
    PersistRspSizeVariable, PersistentVariable, ReqSizeVariable, ServerDelayVariable,
    SingleObjVariable, TimeBtwnObjsVariable, TimeBtwnPagesVariable,
};
use httptraffic_core::{HttpRandomVariable, RuntimeVariable, TrafficModel, VariableKind};

#[test]
fn test_flow_arrival_reference_means() {
    let rv = RuntimeVariable::new(1).unwrap();
    let flow = rv.model().variable(VariableKind::FlowArrive);
    assert!((flow.average() - 4.3018).abs() < 1e-9);
    assert!((flow.average_of(0) - 0.0262).abs() < 1e-9);
    assert!((flow.average_of(1) - 3.32).abs() < 1e-9);
}

#[test]
fn test_rate_scales_flow_arrivals() {
    let rv = RuntimeVariable::with_rate(1, 2.0).unwrap();
    assert_eq!(rv.rate(), 2.0);
    assert!((rv.average(VariableKind::FlowArrive) - 2.1509).abs() < 1e-9);
    assert!(RuntimeVariable::with_rate(1, 0.0).is_err());
}

#[test]
fn test_unconfigured_model_samples_zero() {
    let rv = RuntimeVariable::with_model(3, TrafficModel::default());
    assert_eq!(rv.sample(VariableKind::SingleObj), 0.0);
    assert_eq!(rv.average(VariableKind::FlowArrive), 0.0);
    // Counts are floored at one so a session always has work.
    assert_eq!(rv.sample_count(VariableKind::NumPages), 1);
}

#[test]
fn test_sampled_flow_gap_mean_is_close() {
    let rv = RuntimeVariable::new(21).unwrap();
    let n = 20_000;
    let mean = (0..n).map(|_| rv.sample(VariableKind::FlowArrive)).sum::<f64>() / n as f64;
    assert!((mean - 4.3018).abs() < 0.3, "sample mean {mean}");
}

#[test]
fn test_unconfigured_variables_average_zero() {
    assert_eq!(FlowArriveVariable::default().average(), 0.0);
    assert_eq!(NumPagesVariable::default().average(), 0.0);
    assert_eq!(ObjsPerPageVariable::default().average(), 0.0);
    assert_eq!(SingleObjVariable::default().average(), 0.0);
    assert_eq!(PersistRspSizeVariable::default().average(), 0.0);
    assert_eq!(NonPersistRspSizeVariable::default().average(), 0.0);
    assert_eq!(ReqSizeVariable::default().average(), 0.0);
    assert_eq!(TimeBtwnPagesVariable::default().average(), 0.0);
    assert_eq!(TimeBtwnObjsVariable::default().average(), 0.0);
    assert_eq!(ServerDelayVariable::default().average(), 0.0);
    assert_eq!(PersistentVariable::default().average(), 0.0);
}

#[test]
fn test_unconfigured_model_averages_zero_for_every_kind() {
    let model = TrafficModel::default();
    for kind in [
        VariableKind::FlowArrive,
        VariableKind::NumPages,
        VariableKind::ObjsPerPage,
        VariableKind::SingleObj,
        VariableKind::PersistRspSize,
        VariableKind::NonPersistRspSize,
        VariableKind::ReqSize,
        VariableKind::TimeBtwnPages,
        VariableKind::TimeBtwnObjs,
        VariableKind::ServerDelay,
        VariableKind::Persistent,
    ] {
        assert_eq!(model.variable(kind).average(), 0.0, "{kind:?}");
    }
}
