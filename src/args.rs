use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "trackstat",
    about = "Record third-party browser requests and rank the domains they go to",
    version,
    long_about = None
)]
pub struct Args {
    /// Append-only request log
    #[arg(long, global = true, default_value = "log.txt")]
    pub log_file: PathBuf,

    /// Blocklist, one domain pattern per line
    #[arg(long, global = true, default_value = "blocklist.txt")]
    pub blocklist: PathBuf,

    /// Ignore-list, one domain pattern per line
    #[arg(long, global = true, default_value = "ignore.txt")]
    pub ignorelist: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Append newline-delimited JSON events from stdin to the log
    Record,

    /// Print the blocklist as a JSON array
    List {
        /// Print the ignore-list instead
        #[arg(long)]
        ignored: bool,
    },

    /// Aggregate the log and print per-domain usage
    Report(ReportArgs),

    /// Add a domain pattern to the blocklist
    Block {
        /// Host, or `.host` for all of its subdomains
        pattern: String,
    },

    /// Add a domain pattern to the ignore-list
    Ignore {
        /// Host, or `.host` for all of its subdomains
        pattern: String,
    },
}

#[derive(ClapArgs, Debug)]
pub struct ReportArgs {
    /// Count every allowed request, ignoring blocklist and ignore-list
    #[arg(long)]
    pub full: bool,

    /// Only requests to this exact host
    #[arg(long, conflicts_with = "source")]
    pub domain: Option<String>,

    /// Only requests made from pages on this exact host
    #[arg(long)]
    pub source: Option<String>,

    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Number of top domains to display
    #[arg(short, long)]
    pub top: Option<usize>,
}
