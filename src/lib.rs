//! # flowstack
//!
//! Resolves one step of a declarative flow graph into an ordered chain of stages for a single
//! execution unit, then drives records through it one at a time.
//!
//! ## Architecture
//!
//! - [flow_step]: the graph provider the chain builder walks ([FlowStep] is the in-memory one).
//! - [stack]: chain construction ([stack::build_chain]), successor resolution, traps and stages.
//! - [ExecutionUnit]: decodes raw pairs, pushes them into the chain head and closes the chain at
//!   the end.
//!
//! A chain is zero or more transforms, optionally followed by markers, ending in exactly one
//! group or sink.

pub mod config;
pub mod error;
pub mod execution_unit;
pub mod flow_step;
pub mod observer;
pub mod operator;
pub mod sink;
pub mod source;
pub mod stack;
#[cfg(test)]
mod test_util;
pub mod types;

pub use error::{ConstructionError, ExecutionError, StageError};
pub use execution_unit::{ExecutionUnit, UnitState};
pub use flow_step::{FlowStep, GraphProvider};
pub use observer::{ChainObserver, TracingObserver};
pub use operator::{BuiltinOperator, RecordOperator};
pub use sink::{MemorySink, OutputTarget, RecordSink};
pub use source::{JsonRecordSource, RecordSource};
pub use types::{FlowNode, Record, Scope};
