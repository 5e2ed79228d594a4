//! Walks a flow step from a source and builds the stage chain.
//!
//! Legal shapes: zero or more transforms, then zero or more markers, then exactly one group or
//! sink. Anything else at the end of the walk is a construction error.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::chain::Chain;
use super::resolver::resolve;
use super::stage::Stage;
use super::trap::Trap;
use crate::error::ConstructionError;
use crate::flow_step::GraphProvider;
use crate::observer::ChainObserver;
use crate::types::{ElementId, FlowNode};

/// Appends `stage` after `tail` and returns its index, the new tail.
fn append(stages: &mut Vec<Stage>, tail: Option<usize>, mut stage: Stage) -> usize {
  stage.predecessor = tail;
  stages.push(stage);
  stages.len() - 1
}

/// Builds and resolves the chain starting at the element at `start`.
#[instrument(level = "trace", skip(provider, observer))]
pub fn build_chain<P: GraphProvider + ?Sized>(
  provider: &P,
  start: ElementId,
  observer: Arc<dyn ChainObserver>,
) -> Result<Chain, ConstructionError> {
  let mut stages = Vec::new();
  let mut tail = None;

  let mut incoming = provider.next_scope(start)?;
  let mut node = provider.next_node(&incoming)?;

  while let FlowNode::Transform(transform) = node {
    let trap = Trap::resolve(provider, &transform.name);
    let stage = Stage::transform(incoming.clone(), transform.clone(), trap);
    tail = Some(append(&mut stages, tail, stage));

    incoming = provider.next_scope(incoming.to)?;
    node = provider.next_node(&incoming)?;
  }

  let mut skipped_marker = false;
  while let FlowNode::Marker { name } = node {
    debug!(marker = %name, "skipping marker");
    skipped_marker = true;
    incoming = provider.next_scope(incoming.to)?;
    node = provider.next_node(&incoming)?;
  }

  let terminal = match node {
    FlowNode::Group { name } => {
      let outgoing = provider.next_scope(incoming.to)?;
      let trap = Trap::resolve(provider, name);
      Stage::group(name.clone(), incoming, outgoing, trap)
    }
    FlowNode::Sink(sink) => {
      let use_collector = skipped_marker || sink.use_intermediate_collector;
      Stage::sink(incoming, sink.clone(), use_collector)
    }
    other => return Err(ConstructionError::UnexpectedTerminal(other.kind())),
  };
  let tail = append(&mut stages, tail, terminal);
  let head = resolve(&mut stages, tail);

  let chain = Chain::new(stages, head, tail, observer);
  info!(
    stages = chain.len(),
    terminal = %chain.tail_stage().node_kind(),
    "stage chain built"
  );
  Ok(chain)
}
