//! month-clone: start the next month of a QA metrics dataset
//!
//! Usage:
//!   month-clone <dataset.json>              # clone in place
//!   month-clone <dataset.json> -o out.json  # write the result elsewhere
//!
//! Deep-copies the latest month as the following calendar month and renames
//! its sprints "Sprint <Month> 01" / "Sprint <Month> 02". Everything else in
//! the file is written back as read.
//! Exit codes: 0 cloned, 1 the next month already exists, 2 any other error.

use quality_engine::dataset::clone_latest_month_value;
use quality_engine::EngineError;
use serde_json::Value;
use std::env;
use std::fs;
use std::io;
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .with_target(false)
    .init();
}

fn usage() -> ! {
  eprintln!("Usage: month-clone <dataset.json> [-o|--output <out.json>]");
  process::exit(2);
}

fn load(path: &str) -> Value {
  let contents = fs::read_to_string(path).unwrap_or_else(|e| {
    eprintln!("month-clone: cannot read {}: {}", path, e);
    process::exit(2);
  });
  serde_json::from_str(&contents).unwrap_or_else(|e| {
    eprintln!("month-clone: invalid JSON in {}: {}", path, e);
    process::exit(2);
  })
}

fn main() {
  init_tracing();

  let args: Vec<String> = env::args().skip(1).collect();
  let mut input = None;
  let mut output = None;
  let mut iter = args.iter();
  while let Some(arg) = iter.next() {
    match arg.as_str() {
      "-o" | "--output" => match iter.next() {
        Some(path) => output = Some(path.clone()),
        None => usage(),
      },
      "-h" | "--help" => usage(),
      _ if input.is_none() && !arg.starts_with('-') => input = Some(arg.clone()),
      _ => usage(),
    }
  }
  let Some(input) = input else { usage() };
  let output = output.unwrap_or_else(|| input.clone());

  let mut document = load(&input);
  let month = match clone_latest_month_value(&mut document) {
    Ok(m) => m,
    Err(EngineError::MonthExists(m)) => {
      eprintln!("month-clone: month {} already exists in {}", m, input);
      process::exit(1);
    }
    Err(e) => {
      eprintln!("month-clone: {}", e);
      process::exit(2);
    }
  };

  let json = serde_json::to_string_pretty(&document).unwrap_or_else(|e| {
    eprintln!("month-clone: cannot encode dataset: {}", e);
    process::exit(2);
  });
  if let Err(e) = fs::write(&output, json + "\n") {
    eprintln!("month-clone: cannot write {}: {}", output, e);
    process::exit(2);
  }

  info!(month = %month, output = %output, "month created");
  println!("Created {} ({} {}) -> {}", month, month.month_name(), month.year(), output);
}
