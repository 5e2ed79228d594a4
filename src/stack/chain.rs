//! The resolved stage chain: a simple path stored as an arena of stages.

use std::sync::Arc;

use tracing::instrument;

use super::stage::Stage;
use crate::error::StageError;
use crate::observer::ChainObserver;
use crate::sink::OutputTarget;
use crate::types::Record;

/// Stages from head to tail, linked by index. The topology is fixed once built.
pub struct Chain {
  stages: Vec<Stage>,
  head: usize,
  tail: usize,
  observer: Arc<dyn ChainObserver>,
  closed: bool,
}

impl Chain {
  pub(crate) fn new(
    stages: Vec<Stage>,
    head: usize,
    tail: usize,
    observer: Arc<dyn ChainObserver>,
  ) -> Self {
    Self {
      stages,
      head,
      tail,
      observer,
      closed: false,
    }
  }

  /// Number of stages; never zero.
  pub fn len(&self) -> usize {
    self.stages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.stages.is_empty()
  }

  pub fn head(&self) -> usize {
    self.head
  }

  pub fn tail(&self) -> usize {
    self.tail
  }

  pub fn stage(&self, index: usize) -> Option<&Stage> {
    self.stages.get(index)
  }

  pub fn head_stage(&self) -> &Stage {
    &self.stages[self.head]
  }

  pub fn tail_stage(&self) -> &Stage {
    &self.stages[self.tail]
  }

  pub fn is_closed(&self) -> bool {
    self.closed
  }

  /// Stages in execution order.
  pub fn iter(&self) -> ChainIter<'_> {
    ChainIter {
      chain: self,
      next: Some(self.head),
    }
  }

  /// Stage names in execution order.
  pub fn stage_names(&self) -> Vec<&str> {
    self.iter().map(Stage::name).collect()
  }

  /// Pushes `record` into the head. Whatever leaves the tail goes to `output`.
  pub fn collect(
    &mut self,
    record: Record,
    output: &mut dyn OutputTarget,
  ) -> Result<(), StageError> {
    self.collect_at(self.head, record, output)
  }

  fn collect_at(
    &mut self,
    index: usize,
    record: Record,
    output: &mut dyn OutputTarget,
  ) -> Result<(), StageError> {
    let stage = &mut self.stages[index];
    let forwarded = stage.collect(record, self.observer.as_ref())?;
    let successor = stage.successor;

    match successor {
      Some(next) => {
        for record in forwarded {
          self.collect_at(next, record, output)?;
        }
      }
      None => {
        for record in forwarded {
          output
            .accept(record)
            .map_err(|source| StageError::Sink {
              stage: self.stages[index].name().to_string(),
              source,
            })?;
        }
      }
    }
    Ok(())
  }

  /// Closes every stage exactly once, head to tail.
  ///
  /// Every stage is closed even if an earlier one fails; the first error is returned. A second
  /// call does nothing.
  #[instrument(level = "trace", skip(self))]
  pub fn close(&mut self) -> Result<(), StageError> {
    if self.closed {
      return Ok(());
    }
    self.closed = true;

    let mut first_error = None;
    let mut next = Some(self.head);
    while let Some(index) = next {
      let stage = &mut self.stages[index];
      if let Err(e) = stage.close(self.observer.as_ref())
        && first_error.is_none()
      {
        first_error = Some(e);
      }
      next = stage.successor;
    }

    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }
}

/// Head-to-tail iterator over a [Chain].
pub struct ChainIter<'a> {
  chain: &'a Chain,
  next: Option<usize>,
}

impl<'a> Iterator for ChainIter<'a> {
  type Item = &'a Stage;

  fn next(&mut self) -> Option<Self::Item> {
    let stage = self.chain.stages.get(self.next?)?;
    self.next = stage.successor;
    Some(stage)
  }
}
