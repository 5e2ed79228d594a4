//! Error types for chain construction, per-record execution and shutdown.

use thiserror::Error;

use crate::types::{ElementId, FlowNodeKind};

/// Failure reported by a [crate::flow_step::GraphProvider].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
  #[error("unknown source '{0}'")]
  UnknownSource(String),
  #[error("no outgoing edge from element {0}")]
  NoOutgoingEdge(ElementId),
  #[error("element {0} does not exist")]
  MissingElement(ElementId),
}

/// Failure raised by a record operator for a single record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperatorError {
  #[error("field '{0}' is missing")]
  MissingField(String),
  #[error("field '{field}' expected {expected}")]
  WrongType {
    field: String,
    expected: &'static str,
  },
  #[error("division by zero in field '{0}'")]
  DivideByZero(String),
  #[error("{0}")]
  Failed(String),
}

/// Failure writing to a sink, trap or output target.
#[derive(Error, Debug)]
pub enum SinkError {
  #[error("sink io: {0}")]
  Io(#[from] std::io::Error),
  #[error("sink serialization: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("sink '{0}' is poisoned")]
  Poisoned(String),
}

/// Failure turning a raw key/value pair into a record.
#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("invalid json record: {0}")]
  Json(#[from] serde_json::Error),
  #[error("record is not a json object")]
  NotAnObject,
  #[error("invalid delimited record: {0}")]
  Delimited(#[from] csv::Error),
  #[error("expected {expected} fields, got {actual}")]
  FieldCount { expected: usize, actual: usize },
  #[error("empty input line")]
  Empty,
}

/// Fatal error while building the chain; no partial chain is usable.
#[derive(Error, Debug)]
pub enum ConstructionError {
  #[error("chain must end in a group or sink, found {0}")]
  UnexpectedTerminal(FlowNodeKind),
  #[error("graph provider: {0}")]
  Graph(#[from] GraphError),
}

/// Error raised by a stage while collecting or closing.
#[derive(Error, Debug)]
pub enum StageError {
  #[error("stage '{stage}' operator failed: {source}")]
  Operator {
    stage: String,
    #[source]
    source: OperatorError,
  },
  #[error("stage '{stage}' could not package record: {source}")]
  Group {
    stage: String,
    #[source]
    source: OperatorError,
  },
  #[error("stage '{stage}' could not project record: {source}")]
  Projection {
    stage: String,
    #[source]
    source: OperatorError,
  },
  #[error("stage '{stage}' sink failed: {source}")]
  Sink {
    stage: String,
    #[source]
    source: SinkError,
  },
  #[error("stage '{stage}' trap failed: {source}")]
  Trap {
    stage: String,
    #[source]
    source: SinkError,
  },
}

/// Error surfaced to the runtime driving an [crate::ExecutionUnit].
#[derive(Error, Debug)]
pub enum ExecutionError {
  #[error("decode: {0}")]
  Decode(#[from] DecodeError),
  #[error(transparent)]
  Stage(#[from] StageError),
  #[error("execution unit is closed")]
  Closed,
  #[error("execution unit failed on an earlier record")]
  Failed,
}

/// Failure loading or materializing a flow descriptor.
#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("reading flow descriptor: {0}")]
  Io(#[from] std::io::Error),
  #[error("parsing flow descriptor: {0}")]
  Json(#[from] serde_json::Error),
  #[error("invalid pattern in '{node}': {source}")]
  Pattern {
    node: String,
    #[source]
    source: regex::Error,
  },
  #[error("opening sink: {0}")]
  Sink(#[from] SinkError),
  #[error("sink '{0}' writes through a collector and needs a path")]
  SinkNeedsPath(String),
  #[error("delimiter {0:?} is not a single ASCII character")]
  Delimiter(char),
}
