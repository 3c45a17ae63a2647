//! Dump the parsed records of an exchange file to stdout. Handy for
//! checking what the importer will see before running a bulk import.

use std::path::Path;
use std::process::ExitCode;

use finsight::exchange;

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let path = match std::env::args().nth(1) {
        Some(p) => p,
        None => {
            eprintln!("usage: dump_sheet <file.xlsx|file.csv>");
            return ExitCode::FAILURE;
        }
    };

    match exchange::parse_exchange_file(Path::new(&path)) {
        Ok(records) => {
            for (idx, record) in records.iter().enumerate() {
                let mut pairs: Vec<_> = record.iter().collect();
                pairs.sort();
                let line: Vec<String> =
                    pairs.iter().map(|(k, v)| format!("{}={:?}", k, v)).collect();
                println!("{:>4}  {}", idx + 1, line.join("  "));
            }
            println!("{} record(s)", records.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
