//! Bake annotations into a PDF from the command line.
//!
//! Usage:
//!   bake_overlays <input.pdf> <annotations.json> <output.pdf> [--delete 0,2] [--verbose]
//!
//! The annotations file is a JSON array of annotation records, the same shape
//! the authoring surface produces. `--delete` takes zero-based page indices.

use std::path::PathBuf;
use std::process::ExitCode;

use pdf_overlay::{apply, AnnotationRecord, AnnotationStatus};

struct Config {
    input: PathBuf,
    annotations: PathBuf,
    output: PathBuf,
    deletions: Vec<usize>,
    verbose: bool,
}

impl Config {
    fn from_args() -> Option<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut positional = Vec::new();
        let mut deletions = Vec::new();
        let mut verbose = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--delete" => {
                    i += 1;
                    let list = args.get(i)?;
                    for part in list.split(',') {
                        match part.trim().parse::<usize>() {
                            Ok(index) => deletions.push(index),
                            Err(_) => {
                                eprintln!("Error: bad page index '{}'", part);
                                return None;
                            }
                        }
                    }
                }
                "--verbose" | "-v" => {
                    verbose = true;
                }
                other => positional.push(other.to_string()),
            }
            i += 1;
        }

        if positional.len() != 3 {
            return None;
        }
        Some(Self {
            input: PathBuf::from(&positional[0]),
            annotations: PathBuf::from(&positional[1]),
            output: PathBuf::from(&positional[2]),
            deletions,
            verbose,
        })
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let Some(config) = Config::from_args() else {
        eprintln!(
            "Usage: bake_overlays <input.pdf> <annotations.json> <output.pdf> [--delete 0,2] [--verbose]"
        );
        return ExitCode::FAILURE;
    };

    let source = match std::fs::read(&config.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", config.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let annotations: Vec<AnnotationRecord> = match std::fs::read_to_string(&config.annotations)
        .map_err(|e| e.to_string())
        .and_then(|json| serde_json::from_str(&json).map_err(|e| e.to_string()))
    {
        Ok(records) => records,
        Err(e) => {
            eprintln!(
                "Error: cannot parse {}: {}",
                config.annotations.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };

    let output = match apply(&source, &annotations, &config.deletions) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::write(&config.output, &output.bytes) {
        eprintln!("Error: cannot write {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }

    let report = &output.report;
    println!(
        "{}: {} annotation(s) applied, {} skipped/failed, {} page(s) deleted",
        config.output.display(),
        report.applied(),
        report.outcomes.len() - report.applied(),
        report.pages_deleted
    );

    if config.verbose {
        for outcome in &report.outcomes {
            match &outcome.status {
                AnnotationStatus::Applied => println!("  {} applied", outcome.id),
                AnnotationStatus::Skipped(reason) => {
                    println!("  {} skipped ({:?})", outcome.id, reason)
                }
                AnnotationStatus::Failed(message) => {
                    println!("  {} failed ({})", outcome.id, message)
                }
            }
        }
    }

    ExitCode::SUCCESS
}
