//! Execution unit: decodes raw input pairs, drives them through the chain, closes it at the end.
//!
//! Lifecycle: built (chain constructed) → running (records pushed) → closed (after
//! [ExecutionUnit::on_end]). An untrapped per-record error moves the unit to failed, which only
//! accepts `on_end`. A construction error never yields a unit.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::error::{ConstructionError, ExecutionError};
use crate::flow_step::GraphProvider;
use crate::observer::{ChainObserver, TracingObserver};
use crate::sink::OutputTarget;
use crate::source::RecordSource;
use crate::stack::{Chain, build_chain};

/// Lifecycle state of an [ExecutionUnit].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
  Built,
  Running,
  /// A record failed without a trap; the chain must be closed but takes no more records.
  Failed,
  Closed,
}

/// One map-side execution unit over a shard of input records.
pub struct ExecutionUnit {
  source: String,
  decoder: Box<dyn RecordSource>,
  chain: Chain,
  observer: Arc<dyn ChainObserver>,
  state: UnitState,
  records: u64,
}

impl ExecutionUnit {
  /// Builds the chain for `source` with a [TracingObserver].
  pub fn new<P: GraphProvider + ?Sized>(
    provider: &P,
    source: &str,
    decoder: Box<dyn RecordSource>,
  ) -> Result<Self, ConstructionError> {
    Self::with_observer(provider, source, decoder, Arc::new(TracingObserver::new()))
  }

  /// Builds the chain for `source`, reporting chain events to `observer`.
  #[instrument(level = "trace", skip(provider, decoder, observer))]
  pub fn with_observer<P: GraphProvider + ?Sized>(
    provider: &P,
    source: &str,
    decoder: Box<dyn RecordSource>,
    observer: Arc<dyn ChainObserver>,
  ) -> Result<Self, ConstructionError> {
    let start = provider.start_position(source)?;
    debug!(source, start = %start, "map current source");
    let chain = build_chain(provider, start, Arc::clone(&observer))?;
    Ok(Self {
      source: source.to_string(),
      decoder,
      chain,
      observer,
      state: UnitState::Built,
      records: 0,
    })
  }

  pub fn state(&self) -> UnitState {
    self.state
  }

  pub fn source(&self) -> &str {
    &self.source
  }

  pub fn chain(&self) -> &Chain {
    &self.chain
  }

  pub fn stage_count(&self) -> usize {
    self.chain.len()
  }

  /// Stage names, head to tail.
  pub fn stage_names(&self) -> Vec<&str> {
    self.chain.stage_names()
  }

  /// Records pushed into the chain so far.
  pub fn records_processed(&self) -> u64 {
    self.records
  }

  /// Decodes `(key, value)` and pushes the record through the chain. Tail output goes to `output`,
  /// which may differ from call to call.
  ///
  /// Any error is fatal to the unit: later calls return [ExecutionError::Failed].
  pub fn on_record(
    &mut self,
    key: &[u8],
    value: &[u8],
    output: &mut dyn OutputTarget,
  ) -> Result<(), ExecutionError> {
    match self.state {
      UnitState::Closed => return Err(ExecutionError::Closed),
      UnitState::Failed => return Err(ExecutionError::Failed),
      UnitState::Built | UnitState::Running => {}
    }
    self.state = UnitState::Running;

    let result = self.push(key, value, output);
    if let Err(e) = &result {
      warn!(source = %self.source, error = %e, "execution unit failed");
      self.state = UnitState::Failed;
    }
    result
  }

  fn push(
    &mut self,
    key: &[u8],
    value: &[u8],
    output: &mut dyn OutputTarget,
  ) -> Result<(), ExecutionError> {
    let record = self.decoder.decode(key, value)?;
    self.observer.on_record(key, &record);
    self.records += 1;
    self.chain.collect(record, output)?;
    Ok(())
  }

  /// Closes every stage once. Further calls return `Ok(())` without touching the chain.
  #[instrument(level = "trace", skip(self), fields(source = %self.source))]
  pub fn on_end(&mut self) -> Result<(), ExecutionError> {
    if self.state == UnitState::Closed {
      return Ok(());
    }
    self.state = UnitState::Closed;
    let result = self.chain.close();
    info!(records = self.records, ok = result.is_ok(), "execution unit closed");
    result.map_err(ExecutionError::from)
  }
}
