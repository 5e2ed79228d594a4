//! Elements of the declarative flow graph.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::operator::RecordOperator;
use crate::sink::RecordSink;

/// Default number of records buffered by a sink's intermediate collector.
pub const DEFAULT_COLLECTOR_CAPACITY: usize = 64;

/// Discriminant of [FlowNode], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowNodeKind {
  Source,
  Transform,
  Marker,
  Group,
  Aggregate,
  Sink,
}

impl fmt::Display for FlowNodeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FlowNodeKind::Source => write!(f, "source"),
      FlowNodeKind::Transform => write!(f, "transform"),
      FlowNodeKind::Marker => write!(f, "marker"),
      FlowNodeKind::Group => write!(f, "group"),
      FlowNodeKind::Aggregate => write!(f, "aggregate"),
      FlowNodeKind::Sink => write!(f, "sink"),
    }
  }
}

/// How a transform combines its operator result with the incoming record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSelector {
  /// Incoming record with the result's fields written over it.
  #[default]
  All,
  /// The operator result alone.
  Results,
}

/// A per-record operator node.
#[derive(Clone)]
pub struct TransformNode {
  pub name: String,
  pub operator: Arc<dyn RecordOperator>,
  pub output: OutputSelector,
}

impl TransformNode {
  pub fn new(name: impl Into<String>, operator: Arc<dyn RecordOperator>) -> Self {
    Self {
      name: name.into(),
      operator,
      output: OutputSelector::All,
    }
  }

  pub fn with_output(mut self, output: OutputSelector) -> Self {
    self.output = output;
    self
  }
}

impl fmt::Debug for TransformNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TransformNode")
      .field("name", &self.name)
      .field("output", &self.output)
      .finish_non_exhaustive()
  }
}

/// A terminal output destination.
#[derive(Clone)]
pub struct SinkNode {
  pub name: String,
  pub sink: Arc<dyn RecordSink>,
  /// Fields written to the destination; `None` writes the whole record.
  pub fields: Option<Vec<String>>,
  /// The sink asks to be written through an intermediate collector.
  pub use_intermediate_collector: bool,
  pub collector_capacity: usize,
}

impl SinkNode {
  pub fn new(name: impl Into<String>, sink: Arc<dyn RecordSink>) -> Self {
    Self {
      name: name.into(),
      sink,
      fields: None,
      use_intermediate_collector: false,
      collector_capacity: DEFAULT_COLLECTOR_CAPACITY,
    }
  }

  pub fn with_fields<I, S>(mut self, fields: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.fields = Some(fields.into_iter().map(Into::into).collect());
    self
  }

  pub fn buffered(mut self, capacity: usize) -> Self {
    self.use_intermediate_collector = true;
    self.collector_capacity = capacity.max(1);
    self
  }
}

impl fmt::Debug for SinkNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SinkNode")
      .field("name", &self.name)
      .field("fields", &self.fields)
      .field("use_intermediate_collector", &self.use_intermediate_collector)
      .field("collector_capacity", &self.collector_capacity)
      .finish_non_exhaustive()
  }
}

/// A node of the flow graph.
#[derive(Debug, Clone)]
pub enum FlowNode {
  /// Where records enter the step.
  Source { name: String },
  Transform(TransformNode),
  /// Structural no-op; traversed but never staged.
  Marker { name: String },
  /// Grouping boundary; ends this chain.
  Group { name: String },
  /// Reduce-side operator following a group.
  Aggregate { name: String },
  Sink(SinkNode),
}

impl FlowNode {
  pub fn kind(&self) -> FlowNodeKind {
    match self {
      FlowNode::Source { .. } => FlowNodeKind::Source,
      FlowNode::Transform(_) => FlowNodeKind::Transform,
      FlowNode::Marker { .. } => FlowNodeKind::Marker,
      FlowNode::Group { .. } => FlowNodeKind::Group,
      FlowNode::Aggregate { .. } => FlowNodeKind::Aggregate,
      FlowNode::Sink(_) => FlowNodeKind::Sink,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      FlowNode::Source { name }
      | FlowNode::Marker { name }
      | FlowNode::Group { name }
      | FlowNode::Aggregate { name } => name,
      FlowNode::Transform(t) => &t.name,
      FlowNode::Sink(s) => &s.name,
    }
  }
}
