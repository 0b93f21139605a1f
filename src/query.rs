use std::path::PathBuf;
use std::time::Instant;

use tracing::info;

use crate::entry::ResourceType;
use crate::error::Result;
use crate::eventlog::EventLog;
use crate::filter::{Mode, Query, RunSummary};
use crate::patterns::load_patterns;
use crate::rank::{rank, RankedDomain};
use crate::stats::DomainStats;
use crate::utils::format_number;

/// Where a run reads its inputs from.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub log_file: PathBuf,
    pub blocklist: PathBuf,
    pub ignorelist: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("log.txt"),
            blocklist: PathBuf::from("blocklist.txt"),
            ignorelist: PathBuf::from("ignore.txt"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub query: Query,
    pub summary: RunSummary,
    pub domains: Vec<RankedDomain>,
}

/// Re-reads the log from scratch and aggregates what `query` selects.
///
/// Pattern lists are loaded fresh on every call. Nothing is shared between runs.
pub fn aggregate(paths: &DataPaths, query: &Query) -> Result<(DomainStats, RunSummary)> {
    query.validate()?;

    let (blocked, ignored) = if query.uses_patterns() {
        (load_patterns(&paths.blocklist)?, load_patterns(&paths.ignorelist)?)
    } else {
        (Vec::new(), Vec::new())
    };
    let pipeline = query.pipeline(blocked, ignored)?;

    let log = EventLog::new(&paths.log_file);
    let mut stats = DomainStats::new();
    let summary = pipeline.run(log.entries()?, &mut stats)?;
    Ok((stats, summary))
}

pub fn run_query(paths: &DataPaths, query: &Query) -> Result<Report> {
    let start_time = Instant::now();
    info!(
        action = "start",
        component = "query",
        mode = ?query.mode,
        destination = ?query.destination,
        source = ?query.source,
        "Starting aggregation run"
    );

    let (stats, summary) = aggregate(paths, query)?;
    let domains = rank(&stats);

    info!(
        action = "complete",
        component = "query",
        domains = domains.len(),
        entries_read = summary.read,
        entries_counted = summary.accepted,
        duration_ms = start_time.elapsed().as_millis(),
        "Aggregation run completed"
    );

    Ok(Report {
        query: query.clone(),
        summary,
        domains,
    })
}

pub fn print_report(report: &Report, top: Option<usize>) {
    let heading = match (&report.query.destination, &report.query.source) {
        (Some(host), _) => format!("Third-party usage of {host}"),
        (_, Some(host)) => format!("Requests originating from {host}"),
        _ => "Third-party domain usage".to_string(),
    };
    println!("\n--- {} ---", heading);
    match report.query.mode {
        Mode::Default => {
            println!("Effectively unblocked requests (blocklist and ignore-list applied)")
        }
        Mode::Full => println!("All allowed requests (no lists applied)"),
    }
    println!(
        "Entries read: {}, counted: {}",
        format_number(report.summary.read as u64),
        format_number(report.summary.accepted as u64)
    );
    println!(
        "Domains: {} (ordered by source domain count)",
        format_number(report.domains.len() as u64)
    );

    let shown = top.unwrap_or(report.domains.len());
    for domain in report.domains.iter().take(shown) {
        println!("\n{}", domain.domain);
        if let Some(parent) = &domain.parent {
            println!("  - suffix: {parent}");
        }
        println!("  - used on domains:");
        for src in &domain.src_domains {
            println!("    - {} ({})", src.name, format_number(src.count));
        }
        println!("  - usage:");
        for kind in ResourceType::ALL {
            let urls = domain.per_type.get(kind);
            if urls.is_empty() {
                continue;
            }
            println!("    - {}: {}", kind.label(), format_number(urls.len() as u64));
            for url in urls {
                println!("      - {} ({})", url.name, format_number(url.count));
            }
        }
    }
}
