use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use tracing::error;

use trackstat::args::{Args, Command, ReportArgs};
use trackstat::filter::{Mode, Query};
use trackstat::patterns::{append_pattern, load_patterns};
use trackstat::query::{print_report, run_query, DataPaths};
use trackstat::utils::{setup_logging, validate_args};
use trackstat::EventLog;

fn report(paths: &DataPaths, args: &ReportArgs) -> Result<()> {
    let query = Query {
        mode: if args.full { Mode::Full } else { Mode::Default },
        destination: args.domain.clone(),
        source: args.source.clone(),
    };
    let report = run_query(paths, &query).context("Aggregation run failed")?;

    if args.json {
        let shown = args.top.unwrap_or(report.domains.len());
        let domains = &report.domains[..shown.min(report.domains.len())];
        println!("{}", serde_json::to_string_pretty(domains)?);
    } else {
        print_report(&report, args.top);
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let paths = DataPaths {
        log_file: args.log_file,
        blocklist: args.blocklist,
        ignorelist: args.ignorelist,
    };

    match args.command {
        Command::Record => {
            let log = EventLog::new(&paths.log_file);
            let summary = log.record_stream(io::stdin().lock())?;
            println!(
                "Recorded {} events ({} skipped)",
                summary.written, summary.skipped
            );
        }
        Command::List { ignored } => {
            let path = if ignored {
                &paths.ignorelist
            } else {
                &paths.blocklist
            };
            let patterns = load_patterns(path)?;
            println!("{}", serde_json::to_string(&patterns)?);
        }
        Command::Report(report_args) => report(&paths, &report_args)?,
        Command::Block { pattern } => {
            if append_pattern(&paths.blocklist, &pattern)? {
                println!("Blocked {pattern}");
            } else {
                println!("{pattern} is already blocked");
            }
        }
        Command::Ignore { pattern } => {
            if append_pattern(&paths.ignorelist, &pattern)? {
                println!("Ignoring {pattern}");
            } else {
                println!("{pattern} is already ignored");
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    validate_args(&args)?;

    match run(args) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
