use std::env;
use std::error::Error;
use std::fs::{read_to_string, write};

use lag_correlation::{LagReport, QueryRequest};
use log::info;

fn print_usage() {
    eprintln!("Usage: lagcorr run --input <request.json> [--output <report.json>]");
}

#[derive(Debug, PartialEq)]
struct RunArgs {
    input: String,
    output: Option<String>,
}

/// Parse `run --input X [--output Y]`; `None` means print usage.
fn parse_args(args: &[String]) -> Option<RunArgs> {
    if args.len() < 2 || args[1] != "run" {
        return None;
    }

    let mut input: Option<String> = None;
    let mut output: Option<String> = None;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--input" | "--output" if i + 1 >= args.len() => return None,
            "--input" => {
                input = Some(args[i + 1].clone());
                i += 2;
            }
            "--output" => {
                output = Some(args[i + 1].clone());
                i += 2;
            }
            other => {
                eprintln!("ignoring unknown argument '{}'", other);
                i += 1;
            }
        }
    }

    if input.is_none() {
        eprintln!("Input path is required");
    }
    Some(RunArgs { input: input?, output })
}

/// Run the request at `args.input`; writes the report when an output path is given.
fn run(args: &RunArgs) -> Result<(LagReport, String), Box<dyn Error>> {
    let request: QueryRequest = serde_json::from_str(&read_to_string(&args.input)?)?;
    info!("loaded request for '{}' from {}", request.query.policy_index, args.input);

    let report = request.run()?;
    let body = serde_json::to_string_pretty(&report)?;
    if let Some(path) = &args.output {
        write(path, &body)?;
    }
    Ok((report, body))
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let argv: Vec<String> = env::args().collect();
    let Some(args) = parse_args(&argv) else {
        print_usage();
        return Ok(());
    };

    let (report, body) = run(&args)?;
    match &args.output {
        Some(path) => println!("Written {} lag lines to {}", report.lines.len(), path),
        None => println!("{}", body),
    }
    Ok(())
}
