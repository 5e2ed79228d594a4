//! Stages: the runtime form of one flow node inside the chain.

use tracing::{debug, instrument};

use super::collector::SinkCollector;
use super::trap::Trap;
use crate::error::{OperatorError, StageError};
use crate::observer::ChainObserver;
use crate::types::{FlowNodeKind, OutputSelector, Record, Scope, SinkNode, TransformNode};

/// Variant-specific behavior of a stage.
pub(crate) enum StageKind {
  Transform {
    incoming: Scope,
    node: TransformNode,
  },
  Group {
    incoming: Scope,
    outgoing: Scope,
  },
  Sink {
    incoming: Scope,
    node: SinkNode,
    collector: Option<SinkCollector>,
  },
}

/// One link of the chain. Links are arena indices owned by [super::Chain].
pub struct Stage {
  name: String,
  kind: StageKind,
  trap: Option<Trap>,
  pub(crate) predecessor: Option<usize>,
  pub(crate) successor: Option<usize>,
  closed: bool,
}

impl Stage {
  fn new(name: String, kind: StageKind, trap: Option<Trap>) -> Self {
    Self {
      name,
      kind,
      trap,
      predecessor: None,
      successor: None,
      closed: false,
    }
  }

  pub(crate) fn transform(incoming: Scope, node: TransformNode, trap: Option<Trap>) -> Self {
    Self::new(
      node.name.clone(),
      StageKind::Transform { incoming, node },
      trap,
    )
  }

  pub(crate) fn group(
    name: impl Into<String>,
    incoming: Scope,
    outgoing: Scope,
    trap: Option<Trap>,
  ) -> Self {
    Self::new(name.into(), StageKind::Group { incoming, outgoing }, trap)
  }

  /// Sink stages carry no trap.
  pub(crate) fn sink(incoming: Scope, node: SinkNode, use_intermediate_collector: bool) -> Self {
    let collector = use_intermediate_collector
      .then(|| SinkCollector::open(node.sink.clone(), node.collector_capacity));
    Self::new(
      node.name.clone(),
      StageKind::Sink {
        incoming,
        node,
        collector,
      },
      None,
    )
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Kind of flow node this stage runs.
  pub fn node_kind(&self) -> FlowNodeKind {
    match self.kind {
      StageKind::Transform { .. } => FlowNodeKind::Transform,
      StageKind::Group { .. } => FlowNodeKind::Group,
      StageKind::Sink { .. } => FlowNodeKind::Sink,
    }
  }

  pub fn predecessor(&self) -> Option<usize> {
    self.predecessor
  }

  pub fn successor(&self) -> Option<usize> {
    self.successor
  }

  pub fn has_trap(&self) -> bool {
    self.trap.is_some()
  }

  pub fn is_closed(&self) -> bool {
    self.closed
  }

  /// Edge annotation on the way into this stage.
  pub fn incoming_scope(&self) -> &Scope {
    match &self.kind {
      StageKind::Transform { incoming, .. }
      | StageKind::Group { incoming, .. }
      | StageKind::Sink { incoming, .. } => incoming,
    }
  }

  /// Edge annotation leaving a group stage.
  pub fn outgoing_scope(&self) -> Option<&Scope> {
    match &self.kind {
      StageKind::Group { outgoing, .. } => Some(outgoing),
      _ => None,
    }
  }

  /// True when a sink stage writes through its intermediate collector.
  pub fn uses_intermediate_collector(&self) -> bool {
    matches!(
      self.kind,
      StageKind::Sink {
        collector: Some(_),
        ..
      }
    )
  }

  /// Processes one record and returns what must be forwarded: to the successor, or to the
  /// output target when this stage is the tail.
  ///
  /// A recoverable failure on a stage with a trap diverts the original record and forwards nothing.
  pub(crate) fn collect(
    &mut self,
    record: Record,
    observer: &dyn ChainObserver,
  ) -> Result<Vec<Record>, StageError> {
    let stage = &self.name;
    let result = match &mut self.kind {
      StageKind::Transform { incoming, node } => {
        apply_transform(incoming, node, &record).map_err(|source| StageError::Operator {
          stage: stage.clone(),
          source,
        })
      }
      StageKind::Group { outgoing, .. } => {
        package_group(outgoing, &record).map_err(|source| StageError::Group {
          stage: stage.clone(),
          source,
        })
      }
      StageKind::Sink {
        node, collector, ..
      } => write_sink(stage, node, collector.as_mut(), &record),
    };

    match (result, &self.trap) {
      (Err(cause), Some(trap)) => {
        observer.on_trap(stage, &record, &cause.to_string());
        trap.divert(&record).map_err(|source| StageError::Trap {
          stage: stage.clone(),
          source,
        })?;
        Ok(Vec::new())
      }
      (result, _) => result,
    }
  }

  /// Flushes buffered output and releases resources. Later calls are no-ops.
  #[instrument(level = "trace", skip(self, observer), fields(stage = %self.name))]
  pub(crate) fn close(&mut self, observer: &dyn ChainObserver) -> Result<(), StageError> {
    if self.closed {
      return Ok(());
    }
    self.closed = true;

    let mut first_error = None;
    match &mut self.kind {
      StageKind::Transform { node, .. } => node.operator.cleanup(),
      StageKind::Group { .. } => {}
      StageKind::Sink { collector, .. } => {
        if let Some(mut collector) = collector.take() {
          debug!(stage = %self.name, pending = collector.pending(), "closing sink collector");
          if let Err(source) = collector.close() {
            first_error = Some(StageError::Sink {
              stage: self.name.clone(),
              source,
            });
          }
        }
      }
    }
    if let Some(trap) = &self.trap
      && let Err(source) = trap.flush()
      && first_error.is_none()
    {
      first_error = Some(StageError::Trap {
        stage: self.name.clone(),
        source,
      });
    }
    observer.on_stage_closed(&self.name);

    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }
}

impl std::fmt::Debug for Stage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Stage")
      .field("name", &self.name)
      .field("kind", &self.node_kind())
      .field("predecessor", &self.predecessor)
      .field("successor", &self.successor)
      .field("trap", &self.trap)
      .field("closed", &self.closed)
      .finish()
  }
}

/// Runs the transform operator on the scope's argument fields and shapes each result.
fn apply_transform(
  incoming: &Scope,
  node: &TransformNode,
  record: &Record,
) -> Result<Vec<Record>, OperatorError> {
  let args = record.select_or_all(incoming.argument_fields.as_deref())?;
  let results = node.operator.operate(incoming, &args)?;
  Ok(match node.output {
    OutputSelector::All => results
      .into_iter()
      .map(|r| record.clone().overlay(r))
      .collect(),
    OutputSelector::Results => results,
  })
}

/// Projects a record onto the sink fields and either buffers it in the collector or returns it
/// for the output target.
fn write_sink(
  stage: &str,
  node: &SinkNode,
  collector: Option<&mut SinkCollector>,
  record: &Record,
) -> Result<Vec<Record>, StageError> {
  let projected = record
    .select_or_all(node.fields.as_deref())
    .map_err(|source| StageError::Projection {
      stage: stage.to_string(),
      source,
    })?;
  match collector {
    Some(collector) => {
      collector
        .collect(projected)
        .map_err(|source| StageError::Sink {
          stage: stage.to_string(),
          source,
        })?;
      Ok(Vec::new())
    }
    None => Ok(vec![projected]),
  }
}

/// Packages a record as a key/value envelope for the grouping boundary.
fn package_group(outgoing: &Scope, record: &Record) -> Result<Vec<Record>, OperatorError> {
  let key = record.select(&outgoing.grouping_fields)?;
  let value = record.select_or_all(outgoing.value_fields.as_deref())?;
  Ok(vec![Record::keyed(key, value)])
}
