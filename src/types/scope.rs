//! Element positions and the edge annotations ("scopes") between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of an element in the flow description.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ElementId(pub usize);

impl fmt::Display for ElementId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Metadata on the edge between two elements.
///
/// Stages read it to pick operator arguments and to shape grouped output; it is never mutated
/// once the flow is described.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scope {
  pub from: ElementId,
  pub to: ElementId,
  /// Fields handed to a transform operator; `None` hands over the whole record.
  pub argument_fields: Option<Vec<String>>,
  /// Grouping key fields (on the edge leaving a group).
  pub grouping_fields: Vec<String>,
  /// Value fields carried past a group; `None` carries the whole record.
  pub value_fields: Option<Vec<String>>,
}

impl Scope {
  pub fn new(from: ElementId, to: ElementId) -> Self {
    Self {
      from,
      to,
      ..Default::default()
    }
  }

  pub fn with_arguments<I, S>(mut self, fields: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.argument_fields = Some(fields.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_grouping<I, S>(mut self, fields: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.grouping_fields = fields.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_values<I, S>(mut self, fields: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.value_fields = Some(fields.into_iter().map(Into::into).collect());
    self
  }
}
