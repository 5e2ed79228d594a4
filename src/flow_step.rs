//! Graph provider interface and the in-memory flow step that implements it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::GraphError;
use crate::sink::RecordSink;
use crate::types::{ElementId, FlowNode, Scope, SinkNode, TransformNode};

/// Supplies the flow description the chain builder walks.
pub trait GraphProvider {
  /// Position of the named source element.
  fn start_position(&self, source: &str) -> Result<ElementId, GraphError>;

  /// Edge annotation leaving the element at `from`.
  fn next_scope(&self, from: ElementId) -> Result<Scope, GraphError>;

  /// Element an edge leads to.
  fn next_node(&self, scope: &Scope) -> Result<&FlowNode, GraphError>;

  /// Trap sink declared for the named node, if any.
  fn trap_for(&self, name: &str) -> Option<Arc<dyn RecordSink>>;
}

/// One step of a flow: elements joined by scopes, plus named sources and traps.
#[derive(Default)]
pub struct FlowStep {
  elements: Vec<FlowNode>,
  scopes: Vec<Scope>,
  sources: HashMap<String, ElementId>,
  traps: HashMap<String, Arc<dyn RecordSink>>,
}

impl FlowStep {
  pub fn builder() -> FlowStepBuilder {
    FlowStepBuilder::default()
  }

  pub fn elements(&self) -> &[FlowNode] {
    &self.elements
  }

  pub fn scopes(&self) -> &[Scope] {
    &self.scopes
  }

  pub fn source_names(&self) -> impl Iterator<Item = &str> {
    self.sources.keys().map(String::as_str)
  }
}

impl GraphProvider for FlowStep {
  fn start_position(&self, source: &str) -> Result<ElementId, GraphError> {
    self
      .sources
      .get(source)
      .copied()
      .ok_or_else(|| GraphError::UnknownSource(source.to_string()))
  }

  fn next_scope(&self, from: ElementId) -> Result<Scope, GraphError> {
    self
      .scopes
      .iter()
      .find(|s| s.from == from)
      .cloned()
      .ok_or(GraphError::NoOutgoingEdge(from))
  }

  fn next_node(&self, scope: &Scope) -> Result<&FlowNode, GraphError> {
    self
      .elements
      .get(scope.to.0)
      .ok_or(GraphError::MissingElement(scope.to))
  }

  fn trap_for(&self, name: &str) -> Option<Arc<dyn RecordSink>> {
    self.traps.get(name).cloned()
  }
}

/// Builds a [FlowStep] as a simple path: each added element is linked after the previous one.
#[derive(Default)]
pub struct FlowStepBuilder {
  step: FlowStep,
  last: Option<ElementId>,
  grouping: Option<(Vec<String>, Option<Vec<String>>)>,
}

impl FlowStepBuilder {
  fn push(mut self, node: FlowNode, arguments: Option<Vec<String>>) -> Self {
    let id = ElementId(self.step.elements.len());
    self.step.elements.push(node);
    if let Some(from) = self.last {
      let mut scope = Scope::new(from, id);
      scope.argument_fields = arguments;
      if let Some((grouping, values)) = self.grouping.take() {
        scope.grouping_fields = grouping;
        scope.value_fields = values;
      }
      self.step.scopes.push(scope);
    }
    self.last = Some(id);
    self
  }

  /// Starts a path at a new named source.
  pub fn source(mut self, name: impl Into<String>) -> Self {
    let name = name.into();
    let id = ElementId(self.step.elements.len());
    self.step.sources.insert(name.clone(), id);
    self.step.elements.push(FlowNode::Source { name });
    self.last = Some(id);
    self.grouping = None;
    self
  }

  pub fn transform(self, node: TransformNode) -> Self {
    self.push(FlowNode::Transform(node), None)
  }

  /// Adds a transform whose operator only sees `arguments`.
  pub fn transform_args<I, S>(self, node: TransformNode, arguments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let args = arguments.into_iter().map(Into::into).collect();
    self.push(FlowNode::Transform(node), Some(args))
  }

  pub fn marker(self, name: impl Into<String>) -> Self {
    self.push(FlowNode::Marker { name: name.into() }, None)
  }

  /// Adds a group; the edge leaving it carries `grouping` and `values`.
  pub fn group<I, S>(
    self,
    name: impl Into<String>,
    grouping: I,
    values: Option<Vec<String>>,
  ) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let grouping = grouping.into_iter().map(Into::into).collect();
    let mut this = self.push(FlowNode::Group { name: name.into() }, None);
    this.grouping = Some((grouping, values));
    this
  }

  pub fn aggregate(self, name: impl Into<String>) -> Self {
    self.push(FlowNode::Aggregate { name: name.into() }, None)
  }

  pub fn sink(self, node: SinkNode) -> Self {
    self.push(FlowNode::Sink(node), None)
  }

  /// Adds an arbitrary element after the previous one.
  pub fn element(self, node: FlowNode) -> Self {
    self.push(node, None)
  }

  /// Declares a trap for the node named `node`.
  pub fn trap(mut self, node: impl Into<String>, sink: Arc<dyn RecordSink>) -> Self {
    self.step.traps.insert(node.into(), sink);
    self
  }

  pub fn build(self) -> FlowStep {
    self.step
  }
}
