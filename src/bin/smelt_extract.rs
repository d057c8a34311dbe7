//! smelt-extract: extract metrics from JSON documents on the command line
//!
//! Usage:
//!   # Read a document from a file, print metrics to stdout
//!   smelt-extract --config extract.json data.json
//!
//!   # Read from stdin
//!   echo '{"metrics": [{"cpu": 1}]}' | smelt-extract --config extract.json
//!
//!   # Process newline-delimited JSON, one document per line
//!   smelt-extract --config extract.json --ndjson events.jsonl

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use smelt::Config;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

#[derive(Parser, Debug)]
#[command(name = "smelt-extract")]
#[command(about = "Extract metrics from JSON documents", long_about = None)]
struct Args {
    /// Extraction configuration file: a JSON config object, or an array of
    /// them processed in order
    #[arg(long, short = 'c')]
    config: String,

    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Process newline-delimited JSON (one document per line)
    #[arg(long)]
    ndjson: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config_bytes = std::fs::read(&args.config)
        .with_context(|| format!("failed to read config file {}", args.config))?;
    let configs = load_configs(&config_bytes)?;
    let parser = smelt::Parser::new(configs)?;

    if args.ndjson {
        process_ndjson(&parser, args.input)?;
    } else {
        let mut bytes = read_input(args.input)?;
        let document: Value = simd_json::serde::from_slice(&mut bytes)
            .context("failed to parse JSON document")?;
        report(&parser.parse_document(&document));
    }

    Ok(())
}

/// Accept either a single config object or an array of configs.
fn load_configs(bytes: &[u8]) -> Result<Vec<Config>> {
    let value: Value = serde_json::from_slice(bytes).context("config file is not valid JSON")?;
    let configs = match value {
        Value::Array(_) => {
            serde_json::from_value(value).context("config array has an invalid entry")?
        }
        other => vec![serde_json::from_value(other).context("invalid config object")?],
    };
    Ok(configs)
}

fn read_input(input: Option<String>) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    match input {
        Some(path) => {
            File::open(&path)
                .with_context(|| format!("failed to open input file {path}"))?
                .read_to_end(&mut bytes)?;
        }
        None => {
            std::io::stdin().read_to_end(&mut bytes)?;
        }
    }
    Ok(bytes)
}

/// Stream documents line by line through the parser.
fn process_ndjson(parser: &smelt::Parser, input: Option<String>) -> Result<()> {
    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(&path).with_context(|| format!("failed to open input file {path}"))?,
        )),
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    for line in reader.lines() {
        let line = line.context("failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        let mut bytes = line.into_bytes();
        let document: Value =
            simd_json::serde::from_slice(&mut bytes).context("failed to parse JSON line")?;
        report(&parser.parse_document(&document));
    }

    Ok(())
}

fn report(output: &smelt::ParseOutput) {
    for metric in &output.metrics {
        println!("{metric}");
    }
    for error in &output.errors {
        eprintln!("error: {error}");
    }
}
