//! Turns the tail-first build order into head-first successor links.

use tracing::instrument;

use super::stage::Stage;

/// Walks predecessor links back from `tail`, pointing each predecessor's successor at the stage
/// it precedes. Returns the head (the stage without a predecessor).
///
/// Re-running on the same stages yields the same links and head.
#[instrument(level = "trace", skip(stages))]
pub(crate) fn resolve(stages: &mut [Stage], tail: usize) -> usize {
  stages[tail].successor = None;
  let mut current = tail;
  while let Some(previous) = stages[current].predecessor {
    stages[previous].successor = Some(current);
    current = previous;
  }
  current
}
