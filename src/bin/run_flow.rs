//! CLI: Run one execution unit over a line-oriented input file.
//!
//! Loads a flow descriptor, builds the stage chain for its source, feeds every input line through
//! it and closes the chain.
//!
//! Usage: `run_flow --flow <descriptor.json> [--output <file>] <input>`
//!
//! Set RUST_LOG=flowstack=debug to trace each record, RUST_LOG=flowstack=trace for span events.

use clap::Parser;
use flowstack::config::{LoadedFlow, load_flow_descriptor};
use flowstack::sink::JsonLinesWriter;
use flowstack::{ExecutionUnit, OutputTarget};
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

/// Run one flowstack execution unit over an input file.
#[derive(Parser, Debug)]
#[command(name = "run_flow")]
#[command(after_help = r#"Environment variables:
  FLOWSTACK_FLOW   Flow descriptor path (overrides --flow).

Examples:
  run_flow --flow flow.json input.jsonl
  run_flow --flow flow.json --output out.jsonl input.jsonl"#)]
struct Args {
  /// Flow descriptor (JSON). FLOWSTACK_FLOW takes precedence when set.
  #[arg(long, value_name = "FILE", env = "FLOWSTACK_FLOW")]
  flow: PathBuf,

  /// Where tail output is written as JSON lines. Default: stdout.
  #[arg(long, value_name = "FILE")]
  output: Option<PathBuf>,

  /// Input file, one raw record per line.
  #[arg(value_name = "INPUT")]
  input: PathBuf,
}

fn load(flow: &Path) -> Result<LoadedFlow, String> {
  let descriptor = load_flow_descriptor(flow).map_err(|e| e.to_string())?;
  let base = flow.parent().unwrap_or_else(|| Path::new("."));
  descriptor.into_flow_step(base).map_err(|e| e.to_string())
}

/// Feeds every line of `input` through `unit`. Returns the number of lines read.
fn run_lines(
  unit: &mut ExecutionUnit,
  input: &Path,
  output: &mut dyn OutputTarget,
) -> Result<u64, String> {
  let file = File::open(input).map_err(|e| format!("reading {}: {}", input.display(), e))?;
  let mut lines = 0u64;
  for (line_no, line) in BufReader::new(file).lines().enumerate() {
    let line = line.map_err(|e| format!("reading {}: {}", input.display(), e))?;
    if line.trim().is_empty() {
      continue;
    }
    let key = line_no.to_string();
    unit
      .on_record(key.as_bytes(), line.as_bytes(), output)
      .map_err(|e| format!("line {}: {}", line_no + 1, e))?;
    lines += 1;
  }
  Ok(lines)
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    .with_writer(io::stderr)
    .init();

  let args = Args::parse();
  // FLOWSTACK_FLOW overrides --flow.
  let flow = env::var_os("FLOWSTACK_FLOW")
    .map(PathBuf::from)
    .unwrap_or_else(|| args.flow.clone());
  info!(flow = %flow.display(), input = %args.input.display(), "run_flow starting");

  let loaded = match load(&flow) {
    Ok(l) => l,
    Err(e) => {
      eprintln!("Error loading flow: {}", e);
      process::exit(1);
    }
  };

  let mut unit = match ExecutionUnit::new(&loaded.step, &loaded.source_name, loaded.decoder) {
    Ok(u) => u,
    Err(e) => {
      eprintln!("Error building stage chain: {}", e);
      process::exit(1);
    }
  };
  info!(stages = ?unit.chain().stage_names(), "stage chain ready");

  let sink: Box<dyn Write> = match &args.output {
    Some(path) => match File::create(path) {
      Ok(f) => Box::new(BufWriter::new(f)),
      Err(e) => {
        eprintln!("Error creating {}: {}", path.display(), e);
        process::exit(1);
      }
    },
    None => Box::new(BufWriter::new(io::stdout())),
  };
  let mut output = JsonLinesWriter::new(sink);

  let run = run_lines(&mut unit, &args.input, &mut output);
  let closed = unit.on_end();
  let flushed = output.flush();

  let mut failed = false;
  if let Err(e) = &run {
    error!(error = %e, "record processing failed");
    eprintln!("Record error: {}", e);
    failed = true;
  }
  if let Err(e) = closed {
    eprintln!("Close error: {}", e);
    failed = true;
  }
  if let Err(e) = flushed {
    eprintln!("Output error: {}", e);
    failed = true;
  }

  eprintln!("Flow completed.");
  eprintln!("  Stages: {:?}", unit.chain().stage_names());
  eprintln!("  Records: {}", unit.records_processed());
  eprintln!("  Emitted: {}", output.written());
  if failed {
    process::exit(1);
  }
}
