//! Binary entrypoint: read one request JSON object from stdin, write one report to stdout.
//!
//! On failure the output is an ErrorOutput object and the exit code is 1.
//! Logs go to stderr (`RUST_LOG`, default `warn`).

use quality_engine::{run, EngineError, ErrorOutput, Input};
use std::io::{self, Read, Write};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .with_target(false)
    .init();
}

fn main() {
  init_tracing();
  if let Err(err) = run_binary() {
    let _ = serde_json::to_writer(io::stdout(), &err);
    let _ = writeln!(io::stdout());
    std::process::exit(1);
  }
}

fn run_binary() -> Result<(), ErrorOutput> {
  let mut raw = String::new();
  io::stdin()
    .lock()
    .read_to_string(&mut raw)
    .map_err(|e| ErrorOutput::new(format!("read error: {}", e)))?;
  let input: Input = serde_json::from_str(&raw).map_err(|e| ErrorOutput::new(format!("json parse: {}", e)))?;

  let report = run(&input).map_err(|e| match e {
    EngineError::Validation { field, reason } => ErrorOutput::new(reason).with_field(field),
    other => ErrorOutput::new(other.to_string()),
  })?;

  let json = serde_json::to_vec(&report).map_err(|e| ErrorOutput::new(format!("json encode: {}", e)))?;
  let mut out = io::stdout().lock();
  out
    .write_all(&json)
    .and_then(|_| writeln!(out))
    .map_err(|e| ErrorOutput::new(format!("write error: {}", e)))?;
  Ok(())
}
