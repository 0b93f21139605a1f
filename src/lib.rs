pub mod args;
pub mod domain;
pub mod entry;
pub mod error;
pub mod eventlog;
pub mod filter;
pub mod patterns;
pub mod query;
pub mod rank;
pub mod stats;
pub mod utils;

pub use args::Args;
pub use entry::{Action, Entry, Event, ResourceType};
pub use error::{Error, Result};
pub use eventlog::EventLog;
pub use filter::{Mode, Pipeline, Query};
pub use query::{run_query, DataPaths, Report};
pub use rank::{rank, RankedDomain};
pub use stats::{DomainStat, DomainStats};
