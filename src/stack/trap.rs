//! Trap resolution: side-output sinks for records a stage diverts.

use std::fmt;
use std::sync::Arc;

use tracing::instrument;

use crate::error::SinkError;
use crate::flow_step::GraphProvider;
use crate::sink::RecordSink;
use crate::types::Record;

/// A trap sink bound to the node that declared it. The sink itself is owned elsewhere.
#[derive(Clone)]
pub struct Trap {
  node: String,
  sink: Arc<dyn RecordSink>,
}

impl Trap {
  pub fn new(node: impl Into<String>, sink: Arc<dyn RecordSink>) -> Self {
    Self {
      node: node.into(),
      sink,
    }
  }

  /// Looks up the trap declared for `node`, if any.
  #[instrument(level = "trace", skip(provider))]
  pub fn resolve<P: GraphProvider + ?Sized>(provider: &P, node: &str) -> Option<Trap> {
    provider.trap_for(node).map(|sink| Trap::new(node, sink))
  }

  pub fn node(&self) -> &str {
    &self.node
  }

  /// Writes the original record to the trap sink.
  pub fn divert(&self, record: &Record) -> Result<(), SinkError> {
    self.sink.write(record)
  }

  pub fn flush(&self) -> Result<(), SinkError> {
    self.sink.flush()
  }
}

impl fmt::Debug for Trap {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Trap")
      .field("node", &self.node)
      .finish_non_exhaustive()
  }
}
