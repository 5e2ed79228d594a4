//! Flow descriptor (JSON) loading.
//!
//! A descriptor names the source and its record format, lists the step's elements in order and
//! maps node names to trap files. Relative paths resolve against a base directory, normally the
//! descriptor's own.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::ConfigError;
use crate::flow_step::FlowStep;
use crate::operator::BuiltinOperator;
use crate::sink::{JsonLinesSink, MemorySink, RecordSink};
use crate::source::{RecordSource, SourceFormat};
use crate::types::{DEFAULT_COLLECTOR_CAPACITY, OutputSelector, SinkNode, TransformNode};

/// Source section of a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
  pub name: String,
  #[serde(default)]
  pub record: SourceFormat,
}

/// One element of the step, in path order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementDescriptor {
  Transform {
    name: String,
    operator: BuiltinOperator,
    #[serde(default)]
    arguments: Option<Vec<String>>,
    #[serde(default)]
    output: OutputSelector,
  },
  Marker {
    name: String,
  },
  Group {
    name: String,
    grouping: Vec<String>,
    #[serde(default)]
    values: Option<Vec<String>>,
  },
  Aggregate {
    name: String,
  },
  Sink {
    name: String,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    fields: Option<Vec<String>>,
    #[serde(default)]
    buffered: bool,
    #[serde(default = "default_capacity")]
    capacity: usize,
  },
}

fn default_capacity() -> usize {
  DEFAULT_COLLECTOR_CAPACITY
}

/// A whole flow step as written on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDescriptor {
  pub source: SourceDescriptor,
  pub elements: Vec<ElementDescriptor>,
  #[serde(default)]
  pub traps: BTreeMap<String, PathBuf>,
}

/// A materialized descriptor, ready to build an execution unit from.
pub struct LoadedFlow {
  pub step: FlowStep,
  pub source_name: String,
  pub decoder: Box<dyn RecordSource>,
}

/// Loads a descriptor from `path`. Returns error if the file is missing or invalid JSON.
#[instrument(level = "trace", skip(path))]
pub fn load_flow_descriptor(path: &Path) -> Result<FlowDescriptor, ConfigError> {
  let bytes = std::fs::read(path)?;
  Ok(serde_json::from_slice(&bytes)?)
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    base.join(path)
  }
}

impl FlowDescriptor {
  /// Opens file sinks and traps and builds the in-memory [FlowStep].
  #[instrument(level = "trace", skip(self, base))]
  pub fn into_flow_step(self, base: &Path) -> Result<LoadedFlow, ConfigError> {
    let mut builder = FlowStep::builder().source(self.source.name.clone());
    let mut seen_marker = false;

    for element in self.elements {
      builder = match element {
        ElementDescriptor::Transform {
          name,
          operator,
          arguments,
          output,
        } => {
          let compiled = operator.compile().map_err(|source| ConfigError::Pattern {
            node: name.clone(),
            source,
          })?;
          let node = TransformNode::new(name, Arc::new(compiled)).with_output(output);
          match arguments {
            Some(args) => builder.transform_args(node, args),
            None => builder.transform(node),
          }
        }
        ElementDescriptor::Marker { name } => {
          seen_marker = true;
          builder.marker(name)
        }
        ElementDescriptor::Group {
          name,
          grouping,
          values,
        } => builder.group(name, grouping, values),
        ElementDescriptor::Aggregate { name } => builder.aggregate(name),
        ElementDescriptor::Sink {
          name,
          path,
          fields,
          buffered,
          capacity,
        } => {
          let store: Arc<dyn RecordSink> = match path {
            Some(path) => Arc::new(JsonLinesSink::create(&name, &resolve_path(base, &path))?),
            None if buffered || seen_marker => return Err(ConfigError::SinkNeedsPath(name)),
            None => Arc::new(MemorySink::new(&name)),
          };
          let mut node = SinkNode::new(name, store);
          node.fields = fields;
          if buffered {
            node = node.buffered(capacity);
          } else {
            node.collector_capacity = capacity.max(1);
          }
          builder.sink(node)
        }
      };
    }

    for (node, path) in self.traps {
      let sink = JsonLinesSink::create(format!("trap:{node}"), &resolve_path(base, &path))?;
      builder = builder.trap(node, Arc::new(sink));
    }

    Ok(LoadedFlow {
      step: builder.build(),
      source_name: self.source.name,
      decoder: self.source.record.into_source()?,
    })
  }
}
