//! Helpers shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::OperatorError;
use crate::observer::ChainObserver;
use crate::operator::{BuiltinOperator, RecordOperator};
use crate::types::{Record, Scope, TransformNode};

pub(crate) fn rec(v: serde_json::Value) -> Record {
  Record::from_value(v).unwrap()
}

pub(crate) fn builtin(name: &str, op: BuiltinOperator) -> TransformNode {
  TransformNode::new(name, Arc::new(op.compile().unwrap()))
}

pub(crate) fn identity(name: &str) -> TransformNode {
  builtin(name, BuiltinOperator::Identity)
}

pub(crate) fn uppercase(name: &str, field: &str) -> TransformNode {
  builtin(
    name,
    BuiltinOperator::Uppercase {
      field: field.to_string(),
    },
  )
}

pub(crate) fn divide(name: &str) -> TransformNode {
  builtin(
    name,
    BuiltinOperator::Divide {
      numerator: "a".into(),
      divisor: "b".into(),
      into: "q".into(),
    },
  )
}

/// Operator counting calls and cleanups; emits `fan_out` copies of its input.
#[derive(Default)]
pub(crate) struct CountingOperator {
  pub(crate) fan_out: usize,
  pub(crate) calls: AtomicUsize,
  pub(crate) cleanups: AtomicUsize,
}

impl CountingOperator {
  pub(crate) fn new(fan_out: usize) -> Arc<Self> {
    Arc::new(Self {
      fan_out,
      ..Default::default()
    })
  }

  pub(crate) fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub(crate) fn cleanups(&self) -> usize {
    self.cleanups.load(Ordering::SeqCst)
  }
}

impl RecordOperator for CountingOperator {
  fn operate(&self, _scope: &Scope, args: &Record) -> Result<Vec<Record>, OperatorError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(vec![args.clone(); self.fan_out])
  }

  fn cleanup(&self) {
    self.cleanups.fetch_add(1, Ordering::SeqCst);
  }
}

/// Observer keeping every event it sees.
#[derive(Default)]
pub(crate) struct RecordingObserver {
  pub(crate) records: Mutex<Vec<Record>>,
  pub(crate) traps: Mutex<Vec<(String, Record)>>,
  pub(crate) closed: Mutex<Vec<String>>,
}

impl RecordingObserver {
  pub(crate) fn closed(&self) -> Vec<String> {
    self.closed.lock().unwrap().clone()
  }

  pub(crate) fn traps(&self) -> Vec<(String, Record)> {
    self.traps.lock().unwrap().clone()
  }
}

impl ChainObserver for RecordingObserver {
  fn on_record(&self, _key: &[u8], record: &Record) {
    self.records.lock().unwrap().push(record.clone());
  }

  fn on_trap(&self, stage: &str, record: &Record, _cause: &str) {
    self
      .traps
      .lock()
      .unwrap()
      .push((stage.to_string(), record.clone()));
  }

  fn on_stage_closed(&self, stage: &str) {
    self.closed.lock().unwrap().push(stage.to_string());
  }
}
