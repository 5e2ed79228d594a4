//! Tests for per-variant stage behavior.

use std::sync::Arc;

use serde_json::json;

use super::stage::Stage;
use super::trap::Trap;
use crate::error::{OperatorError, StageError};
use crate::operator::BuiltinOperator;
use crate::sink::MemorySink;
use crate::test_util::{
  CountingOperator, RecordingObserver, builtin, divide, rec, uppercase,
};
use crate::types::{ElementId, OutputSelector, Record, Scope, SinkNode, TransformNode};

fn group_scope(grouping: &[&str]) -> Scope {
  Scope::new(ElementId(1), ElementId(2)).with_grouping(grouping.iter().copied())
}

#[test]
fn transform_overlays_result_on_input() {
  let obs = RecordingObserver::default();
  let mut stage = Stage::transform(Scope::default(), uppercase("up", "msg"), None);
  let out = stage.collect(rec(json!({"msg": "hi", "n": 1})), &obs).unwrap();
  assert_eq!(out, vec![rec(json!({"msg": "HI", "n": 1}))]);
}

#[test]
fn transform_sees_only_argument_fields() {
  let obs = RecordingObserver::default();
  let seen = |_: &Scope, args: &Record| -> Result<Vec<Record>, OperatorError> {
    assert_eq!(args.fields().collect::<Vec<_>>(), vec!["a"]);
    Ok(vec![rec(json!({"sum": 1}))])
  };
  let node = TransformNode::new("t", Arc::new(seen));
  let scope = Scope::default().with_arguments(["a"]);

  let mut all = Stage::transform(scope.clone(), node.clone(), None);
  let out = all.collect(rec(json!({"a": 1, "b": 2})), &obs).unwrap();
  assert_eq!(out, vec![rec(json!({"a": 1, "b": 2, "sum": 1}))]);

  let mut results = Stage::transform(scope, node.with_output(OutputSelector::Results), None);
  let out = results.collect(rec(json!({"a": 1, "b": 2})), &obs).unwrap();
  assert_eq!(out, vec![rec(json!({"sum": 1}))]);
}

#[test]
fn transform_filter_and_flatmap() {
  let obs = RecordingObserver::default();
  let filter = builtin(
    "f",
    BuiltinOperator::FilterEquals {
      field: "k".into(),
      value: json!(1),
    },
  );
  let mut stage = Stage::transform(Scope::default(), filter, None);
  assert!(stage.collect(rec(json!({"k": 2})), &obs).unwrap().is_empty());

  let op = CountingOperator::new(3);
  let mut stage = Stage::transform(Scope::default(), TransformNode::new("fm", op.clone()), None);
  assert_eq!(stage.collect(rec(json!({"k": 2})), &obs).unwrap().len(), 3);
  assert_eq!(op.calls(), 1);
}

#[test]
fn transform_failure_with_trap_diverts_original() {
  let obs = RecordingObserver::default();
  let trap_sink = Arc::new(MemorySink::new("trap"));
  let trap = Trap::new("div", trap_sink.clone());
  let mut stage = Stage::transform(Scope::default(), divide("div"), Some(trap));
  let bad = rec(json!({"a": 1, "b": 0}));
  let out = stage.collect(bad.clone(), &obs).unwrap();
  assert!(out.is_empty());
  assert_eq!(trap_sink.records(), vec![bad.clone()]);
  assert_eq!(obs.traps(), vec![("div".to_string(), bad)]);
}

#[test]
fn transform_failure_without_trap_is_fatal() {
  let obs = RecordingObserver::default();
  let mut stage = Stage::transform(Scope::default(), divide("div"), None);
  let err = stage.collect(rec(json!({"a": 1, "b": 0})), &obs).unwrap_err();
  match err {
    StageError::Operator { stage, source } => {
      assert_eq!(stage, "div");
      assert_eq!(source, OperatorError::DivideByZero("b".into()));
    }
    other => panic!("unexpected error: {other}"),
  }
}

#[test]
fn missing_argument_field_is_trappable() {
  let obs = RecordingObserver::default();
  let trap_sink = Arc::new(MemorySink::new("trap"));
  let scope = Scope::default().with_arguments(["missing"]);
  let mut stage = Stage::transform(
    scope,
    uppercase("up", "missing"),
    Some(Trap::new("up", trap_sink.clone())),
  );
  assert!(stage.collect(rec(json!({"msg": "x"})), &obs).unwrap().is_empty());
  assert_eq!(trap_sink.len(), 1);
}

#[test]
fn group_packages_key_and_value() {
  let obs = RecordingObserver::default();
  let outgoing = group_scope(&["user"]).with_values(["n"]);
  let mut stage = Stage::group("g", Scope::default(), outgoing, None);
  let out = stage
    .collect(rec(json!({"user": "a", "n": 2, "skip": true})), &obs)
    .unwrap();
  assert_eq!(
    out,
    vec![rec(json!({"key": {"user": "a"}, "value": {"n": 2}}))]
  );
}

#[test]
fn group_missing_key_traps_or_fails() {
  let obs = RecordingObserver::default();
  let trap_sink = Arc::new(MemorySink::new("trap"));
  let mut trapped = Stage::group(
    "g",
    Scope::default(),
    group_scope(&["user"]),
    Some(Trap::new("g", trap_sink.clone())),
  );
  assert!(trapped.collect(rec(json!({"n": 1})), &obs).unwrap().is_empty());
  assert_eq!(trap_sink.len(), 1);

  let mut fatal = Stage::group("g", Scope::default(), group_scope(&["user"]), None);
  assert!(matches!(
    fatal.collect(rec(json!({"n": 1})), &obs),
    Err(StageError::Group { .. })
  ));
}

#[test]
fn direct_sink_projects_and_returns_record() {
  let obs = RecordingObserver::default();
  let store = Arc::new(MemorySink::new("out"));
  let node = SinkNode::new("out", store.clone()).with_fields(["b"]);
  let mut stage = Stage::sink(Scope::default(), node, false);
  let out = stage.collect(rec(json!({"a": 1, "b": 2})), &obs).unwrap();
  assert_eq!(out, vec![rec(json!({"b": 2}))]);
  assert!(store.is_empty());

  assert!(matches!(
    stage.collect(rec(json!({"a": 1})), &obs),
    Err(StageError::Projection { .. })
  ));
}

#[test]
fn collector_sink_buffers_until_capacity_and_flushes_on_close() {
  let obs = RecordingObserver::default();
  let store = Arc::new(MemorySink::new("out"));
  let node = SinkNode::new("out", store.clone()).buffered(2);
  let mut stage = Stage::sink(Scope::default(), node, true);
  assert!(stage.uses_intermediate_collector());
  for n in 0..3 {
    assert!(stage.collect(rec(json!({"n": n})), &obs).unwrap().is_empty());
  }
  assert_eq!(store.len(), 2);
  stage.close(&obs).unwrap();
  assert_eq!(store.len(), 3);
  assert_eq!(store.flush_count(), 1);
  assert!(!stage.uses_intermediate_collector());
}

#[test]
fn collector_sink_with_huge_capacity_builds() {
  let obs = RecordingObserver::default();
  let store = Arc::new(MemorySink::new("out"));
  let node = SinkNode::new("out", store.clone()).buffered(usize::MAX / 2);
  let mut stage = Stage::sink(Scope::default(), node, true);
  stage.collect(rec(json!({"n": 1})), &obs).unwrap();
  assert!(store.is_empty());
  stage.close(&obs).unwrap();
  assert_eq!(store.len(), 1);
}

#[test]
fn close_runs_once() {
  let obs = RecordingObserver::default();
  let op = CountingOperator::new(1);
  let trap_sink = Arc::new(MemorySink::new("trap"));
  let mut stage = Stage::transform(
    Scope::default(),
    TransformNode::new("t", op.clone()),
    Some(Trap::new("t", trap_sink.clone())),
  );
  stage.close(&obs).unwrap();
  stage.close(&obs).unwrap();
  assert!(stage.is_closed());
  assert_eq!(op.cleanups(), 1);
  assert_eq!(trap_sink.flush_count(), 1);
  assert_eq!(obs.closed(), vec!["t".to_string()]);
}
