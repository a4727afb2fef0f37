use std::any::Any;
use crate::engine::{Event, ScheduleCmd};

pub type NodeId = u32;

/// An application installed on a node. Driven entirely by events the
/// simulation hands it; everything it wants to happen later goes back out
/// as `ScheduleCmd`s.
pub trait Component: Any {
    fn on_event(&mut self, event: Event) -> Vec<ScheduleCmd>;
    fn name(&self) -> &str;
    fn kind(&self) -> &str;

    // Serialization
    fn encode_config(&self) -> serde_json::Value;

    fn is_running(&self) -> bool;
    fn add_target(&mut self, target: NodeId);
    fn get_targets(&self) -> Vec<NodeId>;
}
