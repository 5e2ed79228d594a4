//! Flow graph and record types consumed by the stage chain.

mod flow_node;
mod record;
mod scope;

pub use flow_node::{
  DEFAULT_COLLECTOR_CAPACITY, FlowNode, FlowNodeKind, OutputSelector, SinkNode, TransformNode,
};
pub use record::{KEY_FIELD, Record, VALUE_FIELD};
pub use scope::{ElementId, Scope};
