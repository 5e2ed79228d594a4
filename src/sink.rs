//! Record sinks (terminal stores and traps) and per-call output targets.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tracing::instrument;

use crate::error::SinkError;
use crate::types::Record;

/// A shared, externally owned destination for records.
///
/// Used both for sink elements written through an intermediate collector and for traps.
pub trait RecordSink: Send + Sync {
  fn write(&self, record: &Record) -> Result<(), SinkError>;

  fn flush(&self) -> Result<(), SinkError> {
    Ok(())
  }
}

/// The output handle supplied by the runtime on each `on_record` call.
pub trait OutputTarget {
  fn accept(&mut self, record: Record) -> Result<(), SinkError>;
}

impl OutputTarget for Vec<Record> {
  fn accept(&mut self, record: Record) -> Result<(), SinkError> {
    self.push(record);
    Ok(())
  }
}

/// Writes each accepted record as one JSON line.
pub struct JsonLinesWriter<W: Write> {
  inner: W,
  written: u64,
}

impl<W: Write> JsonLinesWriter<W> {
  pub fn new(inner: W) -> Self {
    Self { inner, written: 0 }
  }

  /// Number of records written so far.
  pub fn written(&self) -> u64 {
    self.written
  }

  pub fn flush(&mut self) -> Result<(), SinkError> {
    self.inner.flush()?;
    Ok(())
  }
}

impl<W: Write> OutputTarget for JsonLinesWriter<W> {
  fn accept(&mut self, record: Record) -> Result<(), SinkError> {
    serde_json::to_writer(&mut self.inner, &record)?;
    self.inner.write_all(b"\n")?;
    self.written += 1;
    Ok(())
  }
}

/// In-memory sink; records are kept in write order.
#[derive(Debug, Default)]
pub struct MemorySink {
  name: String,
  records: Mutex<Vec<Record>>,
  flushes: Mutex<usize>,
}

impl MemorySink {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }

  fn lock(&self) -> Result<MutexGuard<'_, Vec<Record>>, SinkError> {
    self
      .records
      .lock()
      .map_err(|_| SinkError::Poisoned(self.name.clone()))
  }

  /// Snapshot of the records written so far.
  pub fn records(&self) -> Vec<Record> {
    self.records.lock().map(|r| r.clone()).unwrap_or_default()
  }

  pub fn len(&self) -> usize {
    self.records.lock().map(|r| r.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Number of times [RecordSink::flush] was called.
  pub fn flush_count(&self) -> usize {
    self.flushes.lock().map(|f| *f).unwrap_or(0)
  }
}

impl RecordSink for MemorySink {
  fn write(&self, record: &Record) -> Result<(), SinkError> {
    self.lock()?.push(record.clone());
    Ok(())
  }

  fn flush(&self) -> Result<(), SinkError> {
    let mut flushes = self
      .flushes
      .lock()
      .map_err(|_| SinkError::Poisoned(self.name.clone()))?;
    *flushes += 1;
    Ok(())
  }
}

/// File sink writing one JSON object per line.
pub struct JsonLinesSink {
  name: String,
  writer: Mutex<JsonLinesWriter<BufWriter<File>>>,
}

impl JsonLinesSink {
  /// Creates (or truncates) the file at `path`, creating parent directories if needed.
  #[instrument(level = "trace", skip(name, path))]
  pub fn create(name: impl Into<String>, path: &Path) -> Result<Self, SinkError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    Ok(Self {
      name: name.into(),
      writer: Mutex::new(JsonLinesWriter::new(BufWriter::new(file))),
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, JsonLinesWriter<BufWriter<File>>>, SinkError> {
    self
      .writer
      .lock()
      .map_err(|_| SinkError::Poisoned(self.name.clone()))
  }
}

impl RecordSink for JsonLinesSink {
  fn write(&self, record: &Record) -> Result<(), SinkError> {
    self.lock()?.accept(record.clone())
  }

  fn flush(&self) -> Result<(), SinkError> {
    self.lock()?.flush()
  }
}
