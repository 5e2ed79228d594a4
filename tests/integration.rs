//! Integration tests that run the run_flow CLI and the library on the descriptor fixtures in
//! tests/integration/. Descriptors are copied into a temp dir first so sink and trap files land
//! there.

use std::path::{Path, PathBuf};
use std::process::Command;

use flowstack::config::load_flow_descriptor;
use flowstack::{ConstructionError, ExecutionError, ExecutionUnit, Record};
use serde_json::{Value, json};

fn integration_dir() -> PathBuf {
  Path::new(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("integration")
}

fn fixture(name: &str) -> PathBuf {
  integration_dir().join(name)
}

/// Copies descriptor `name` into `dir` and returns the copy's path.
fn stage_descriptor(dir: &Path, name: &str) -> PathBuf {
  let to = dir.join(name);
  std::fs::copy(fixture(name), &to).expect("copy descriptor");
  to
}

/// Runs the run_flow binary. Returns (stdout, stderr, success).
fn run_flow(args: &[&str]) -> (String, String, bool) {
  let out = Command::new(env!("CARGO_BIN_EXE_run_flow"))
    .args(args)
    .env_remove("FLOWSTACK_FLOW")
    .output()
    .expect("run run_flow");
  (
    String::from_utf8_lossy(&out.stdout).into_owned(),
    String::from_utf8_lossy(&out.stderr).into_owned(),
    out.status.success(),
  )
}

/// Runs the run_flow binary with FLOWSTACK_FLOW set to `flow`.
fn run_flow_with_env(flow: &Path, args: &[&str]) -> (String, String, bool) {
  let out = Command::new(env!("CARGO_BIN_EXE_run_flow"))
    .args(args)
    .env("FLOWSTACK_FLOW", flow)
    .output()
    .expect("run run_flow");
  (
    String::from_utf8_lossy(&out.stdout).into_owned(),
    String::from_utf8_lossy(&out.stderr).into_owned(),
    out.status.success(),
  )
}

fn json_lines(text: &str) -> Vec<Value> {
  text
    .lines()
    .filter(|l| !l.trim().is_empty())
    .map(|l| serde_json::from_str(l).expect("json line"))
    .collect()
}

// ---- CLI ----

#[test]
fn cli_upper_group_writes_keyed_records_to_stdout() {
  let dir = tempfile::tempdir().unwrap();
  let flow = stage_descriptor(dir.path(), "upper_group.json");
  let input = fixture("events.jsonl");
  let (stdout, stderr, success) = run_flow(&[
    "--flow",
    flow.to_str().unwrap(),
    input.to_str().unwrap(),
  ]);
  assert!(success, "run_flow failed: {stderr}");
  assert_eq!(
    json_lines(&stdout),
    vec![
      json!({"key": {"msg": "HI"}, "value": {"msg": "HI"}}),
      json!({"key": {"msg": "THERE"}, "value": {"msg": "THERE"}}),
      json!({"key": {"msg": "HI"}, "value": {"msg": "HI"}}),
    ]
  );
  assert!(stderr.contains("Flow completed"));
  assert!(stderr.contains("Records: 3"));
}

#[test]
fn cli_trap_diverts_zero_divisor_and_continues() {
  let dir = tempfile::tempdir().unwrap();
  let flow = stage_descriptor(dir.path(), "divide_trap.json");
  let output = dir.path().join("out.jsonl");
  let (_, stderr, success) = run_flow(&[
    "--flow",
    flow.to_str().unwrap(),
    "--output",
    output.to_str().unwrap(),
    fixture("numbers.jsonl").to_str().unwrap(),
  ]);
  assert!(success, "run_flow failed: {stderr}");
  let out = std::fs::read_to_string(&output).unwrap();
  assert_eq!(json_lines(&out), vec![json!({"q": 5.0}), json!({"q": 3.0})]);
  let trapped = std::fs::read_to_string(dir.path().join("trap").join("ratio.jsonl")).unwrap();
  assert_eq!(json_lines(&trapped), vec![json!({"a": 1, "b": 0})]);
}

#[test]
fn cli_untrapped_failure_exits_non_zero() {
  let dir = tempfile::tempdir().unwrap();
  let flow = stage_descriptor(dir.path(), "divide_no_trap.json");
  let (_, stderr, success) = run_flow(&[
    "--flow",
    flow.to_str().unwrap(),
    fixture("numbers.jsonl").to_str().unwrap(),
  ]);
  assert!(!success);
  assert!(stderr.contains("line 2"), "stderr: {stderr}");
  assert!(stderr.contains("division by zero"), "stderr: {stderr}");
}

#[test]
fn cli_bad_terminal_exits_non_zero() {
  let dir = tempfile::tempdir().unwrap();
  let flow = stage_descriptor(dir.path(), "bad_terminal.json");
  let (_, stderr, success) = run_flow(&[
    "--flow",
    flow.to_str().unwrap(),
    fixture("events.jsonl").to_str().unwrap(),
  ]);
  assert!(!success);
  assert!(stderr.contains("Error building stage chain"), "stderr: {stderr}");
  assert!(stderr.contains("aggregate"), "stderr: {stderr}");
}

#[test]
fn cli_marker_routes_through_sink_file() {
  let dir = tempfile::tempdir().unwrap();
  let flow = stage_descriptor(dir.path(), "csv_marker.json");
  let (stdout, stderr, success) = run_flow(&[
    "--flow",
    flow.to_str().unwrap(),
    fixture("people.csv").to_str().unwrap(),
  ]);
  assert!(success, "run_flow failed: {stderr}");
  assert!(json_lines(&stdout).is_empty());
  let written = std::fs::read_to_string(dir.path().join("people_out.jsonl")).unwrap();
  assert_eq!(
    json_lines(&written),
    vec![json!({"name": "grace"}), json!({"name": "linus"})]
  );
}

#[test]
fn cli_env_flow_overrides_flag() {
  let dir = tempfile::tempdir().unwrap();
  let flow = stage_descriptor(dir.path(), "upper_group.json");
  let missing = dir.path().join("missing.json");
  let (stdout, stderr, success) = run_flow_with_env(
    &flow,
    &[
      "--flow",
      missing.to_str().unwrap(),
      fixture("events.jsonl").to_str().unwrap(),
    ],
  );
  assert!(success, "run_flow failed: {stderr}");
  assert_eq!(json_lines(&stdout).len(), 3);
}

#[test]
fn cli_env_flow_without_flag() {
  let dir = tempfile::tempdir().unwrap();
  let flow = stage_descriptor(dir.path(), "upper_group.json");
  let (stdout, stderr, success) =
    run_flow_with_env(&flow, &[fixture("events.jsonl").to_str().unwrap()]);
  assert!(success, "run_flow failed: {stderr}");
  assert_eq!(json_lines(&stdout).len(), 3);
}

// ---- Library ----

fn unit_for(dir: &Path, name: &str) -> Result<ExecutionUnit, ConstructionError> {
  let flow = stage_descriptor(dir, name);
  let loaded = load_flow_descriptor(&flow)
    .unwrap()
    .into_flow_step(dir)
    .unwrap();
  ExecutionUnit::new(&loaded.step, &loaded.source_name, loaded.decoder)
}

#[test]
fn lib_upper_group_single_record() {
  let dir = tempfile::tempdir().unwrap();
  let mut unit = unit_for(dir.path(), "upper_group.json").unwrap();
  let mut out: Vec<Record> = Vec::new();
  unit.on_record(b"0", br#"{"msg":"hi"}"#, &mut out).unwrap();
  unit.on_end().unwrap();
  assert_eq!(out.len(), 1);
  assert_eq!(
    out[0].clone().into_value(),
    json!({"key": {"msg": "HI"}, "value": {"msg": "HI"}})
  );
}

#[test]
fn lib_bad_terminal_is_construction_error() {
  let dir = tempfile::tempdir().unwrap();
  assert!(matches!(
    unit_for(dir.path(), "bad_terminal.json"),
    Err(ConstructionError::UnexpectedTerminal(_))
  ));
}

#[test]
fn lib_records_after_end_are_rejected() {
  let dir = tempfile::tempdir().unwrap();
  let mut unit = unit_for(dir.path(), "divide_trap.json").unwrap();
  unit.on_end().unwrap();
  let mut out: Vec<Record> = Vec::new();
  assert!(matches!(
    unit.on_record(b"0", br#"{"a":1,"b":1}"#, &mut out),
    Err(ExecutionError::Closed)
  ));
}
