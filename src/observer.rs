//! Observability handle injected into an execution unit.

use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::types::Record;

/// Receives chain events; passed in at construction.
pub trait ChainObserver: Send + Sync {
  /// A raw pair was decoded and is about to enter the chain head.
  fn on_record(&self, _key: &[u8], _record: &Record) {}

  /// A stage diverted `record` to its trap.
  fn on_trap(&self, _stage: &str, _record: &Record, _cause: &str) {}

  /// A stage finished closing.
  fn on_stage_closed(&self, _stage: &str) {}
}

/// Emits chain events as `tracing` events tagged with the execution unit id.
#[derive(Debug, Clone)]
pub struct TracingObserver {
  unit_id: Uuid,
}

impl TracingObserver {
  pub fn new() -> Self {
    Self {
      unit_id: Uuid::new_v4(),
    }
  }

  pub fn unit_id(&self) -> Uuid {
    self.unit_id
  }
}

impl Default for TracingObserver {
  fn default() -> Self {
    Self::new()
  }
}

impl ChainObserver for TracingObserver {
  fn on_record(&self, key: &[u8], record: &Record) {
    debug!(
      unit = %self.unit_id,
      key = %String::from_utf8_lossy(key),
      value = %record,
      "map record"
    );
  }

  fn on_trap(&self, stage: &str, record: &Record, cause: &str) {
    warn!(unit = %self.unit_id, stage, record = %record, cause, "record diverted to trap");
  }

  fn on_stage_closed(&self, stage: &str) {
    trace!(unit = %self.unit_id, stage, "stage closed");
  }
}
