//! Intermediate collector a sink stage writes through instead of the per-call output target.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::SinkError;
use crate::sink::RecordSink;
use crate::types::{DEFAULT_COLLECTOR_CAPACITY, Record};

/// Buffers records and writes them into the sink element's own store.
pub(crate) struct SinkCollector {
  sink: Arc<dyn RecordSink>,
  buffer: VecDeque<Record>,
  capacity: usize,
}

impl SinkCollector {
  pub(crate) fn open(sink: Arc<dyn RecordSink>, capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      sink,
      buffer: VecDeque::with_capacity(capacity.min(DEFAULT_COLLECTOR_CAPACITY)),
      capacity,
    }
  }

  pub(crate) fn collect(&mut self, record: Record) -> Result<(), SinkError> {
    self.buffer.push_back(record);
    if self.buffer.len() >= self.capacity {
      self.drain()?;
    }
    Ok(())
  }

  /// Records waiting to be written.
  pub(crate) fn pending(&self) -> usize {
    self.buffer.len()
  }

  /// Writes buffered records in order. A record leaves the buffer only once the sink accepted it.
  fn drain(&mut self) -> Result<(), SinkError> {
    while let Some(record) = self.buffer.front() {
      self.sink.write(record)?;
      self.buffer.pop_front();
    }
    Ok(())
  }

  /// Writes what is buffered and flushes the sink.
  pub(crate) fn close(&mut self) -> Result<(), SinkError> {
    self.drain()?;
    self.sink.flush()
  }
}
