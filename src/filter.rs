//! Composable filter stages between the event log and the aggregator.
//!
//! A [`Pipeline`] holds an ordered list of [`Stage`]s. Each entry is offered to
//! the stages in turn; the first one to return [`Verdict::Drop`] ends its
//! journey, and entries that pass every stage are handed to a [`Sink`].

use std::cell::OnceCell;

use tracing::{info, warn};

use crate::domain::{first_match, host_of};
use crate::entry::{Action, Entry};
use crate::error::{Error, Result};
use crate::stats::DomainStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Forward,
    Drop,
}

/// An entry on its way through the stages.
///
/// The request host is resolved on first use and shared by every later stage,
/// so an unparsable request URL is reported once per entry.
pub struct Candidate<'a> {
    pub entry: &'a Entry,
    request_host: OnceCell<Option<String>>,
}

impl<'a> Candidate<'a> {
    pub fn new(entry: &'a Entry) -> Self {
        Self {
            entry,
            request_host: OnceCell::new(),
        }
    }

    /// Host of the request URL, `None` when it does not parse.
    pub fn request_host(&self) -> Option<&str> {
        self.request_host
            .get_or_init(|| match host_of(&self.entry.request_url) {
                Ok(host) => Some(host),
                Err(e) => {
                    warn!(
                        action = "match",
                        component = "domain_matcher",
                        url = %self.entry.request_url,
                        error = %e,
                        "Unparsable URL, treating as non-match"
                    );
                    None
                }
            })
            .as_deref()
    }
}

pub trait Stage {
    fn name(&self) -> &'static str;

    fn check(&self, candidate: &Candidate<'_>) -> Verdict;
}

/// Terminal stage. Never drops, but may fail the run.
pub trait Sink {
    fn accept(&mut self, entry: &Entry) -> Result<()>;
}

impl Sink for DomainStats {
    fn accept(&mut self, entry: &Entry) -> Result<()> {
        self.count(entry)
    }
}

/// Keeps entries with the given action.
#[derive(Debug, Clone)]
pub struct ActionFilter {
    action: Action,
}

impl ActionFilter {
    pub fn allowed() -> Self {
        Self {
            action: Action::Allow,
        }
    }
}

impl Stage for ActionFilter {
    fn name(&self) -> &'static str {
        "action"
    }

    fn check(&self, candidate: &Candidate<'_>) -> Verdict {
        if candidate.entry.action == self.action {
            Verdict::Forward
        } else {
            Verdict::Drop
        }
    }
}

/// Applies the current blocklist to historical entries, logging every drop.
///
/// Unparsable request URLs match nothing and are forwarded.
#[derive(Debug, Clone)]
pub struct BlockedDomainFilter {
    patterns: Vec<String>,
}

impl BlockedDomainFilter {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }
}

impl Stage for BlockedDomainFilter {
    fn name(&self) -> &'static str {
        "blocked"
    }

    fn check(&self, candidate: &Candidate<'_>) -> Verdict {
        if self.patterns.is_empty() {
            return Verdict::Forward;
        }
        let hit = candidate
            .request_host()
            .and_then(|host| first_match(host, &self.patterns));
        match hit {
            Some(pattern) => {
                warn!(
                    action = "drop",
                    component = "blocked_filter",
                    url = %candidate.entry.request_url,
                    pattern = pattern,
                    "Post-facto blocking"
                );
                Verdict::Drop
            }
            None => Verdict::Forward,
        }
    }
}

/// Hides ignore-listed destinations. Silent.
#[derive(Debug, Clone)]
pub struct IgnoredDomainFilter {
    patterns: Vec<String>,
}

impl IgnoredDomainFilter {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }
}

impl Stage for IgnoredDomainFilter {
    fn name(&self) -> &'static str {
        "ignored"
    }

    fn check(&self, candidate: &Candidate<'_>) -> Verdict {
        if self.patterns.is_empty() {
            return Verdict::Forward;
        }
        match candidate
            .request_host()
            .and_then(|host| first_match(host, &self.patterns))
        {
            Some(_) => Verdict::Drop,
            None => Verdict::Forward,
        }
    }
}

/// Keeps entries whose request host is exactly `host`.
#[derive(Debug, Clone)]
pub struct DestinationFilter {
    host: String,
}

impl DestinationFilter {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl Stage for DestinationFilter {
    fn name(&self) -> &'static str {
        "destination"
    }

    fn check(&self, candidate: &Candidate<'_>) -> Verdict {
        match candidate.request_host() {
            Some(host) if host == self.host => Verdict::Forward,
            _ => Verdict::Drop,
        }
    }
}

/// Keeps entries whose tab host is exactly `host`.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    host: String,
}

impl SourceFilter {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl Stage for SourceFilter {
    fn name(&self) -> &'static str {
        "source"
    }

    fn check(&self, candidate: &Candidate<'_>) -> Verdict {
        let url = &candidate.entry.tab_url;
        match host_of(url) {
            Ok(host) if host == self.host => Verdict::Forward,
            Ok(_) => Verdict::Drop,
            Err(e) => {
                warn!(
                    action = "drop",
                    component = "source_filter",
                    url = %url,
                    error = %e,
                    "Unparsable tab URL"
                );
                Verdict::Drop
            }
        }
    }
}

/// Counters for one pipeline pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub read: usize,
    pub dropped: usize,
    pub accepted: usize,
}

#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Does `entry` make it past every stage?
    pub fn admits(&self, entry: &Entry) -> bool {
        let candidate = Candidate::new(entry);
        self.stages
            .iter()
            .all(|stage| stage.check(&candidate) == Verdict::Forward)
    }

    /// Drains `entries` through the stages into `sink`. Stops at the first error.
    pub fn run<I, S>(&self, entries: I, sink: &mut S) -> Result<RunSummary>
    where
        I: IntoIterator<Item = Result<Entry>>,
        S: Sink,
    {
        let mut summary = RunSummary::default();
        for entry in entries {
            let entry = entry?;
            summary.read += 1;
            if self.admits(&entry) {
                sink.accept(&entry)?;
                summary.accepted += 1;
            } else {
                summary.dropped += 1;
            }
        }
        info!(
            action = "complete",
            component = "pipeline",
            read = summary.read,
            dropped = summary.dropped,
            accepted = summary.accepted,
            "Pipeline drained"
        );
        Ok(summary)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Blocklist and ignore-list applied.
    #[default]
    Default,
    /// Only the action filter applied.
    Full,
}

/// What one report asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub mode: Mode,
    pub destination: Option<String>,
    pub source: Option<String>,
}

impl Query {
    pub fn validate(&self) -> Result<()> {
        if self.destination.is_some() && self.source.is_some() {
            return Err(Error::InvalidQuery(
                "destination and source filters cannot be combined".to_string(),
            ));
        }
        Ok(())
    }

    /// Does this query need the pattern lists loaded?
    pub fn uses_patterns(&self) -> bool {
        self.mode == Mode::Default
    }

    /// Assembles the stage list for this query. The pattern lists are only
    /// consulted in [`Mode::Default`].
    pub fn pipeline(&self, blocked: Vec<String>, ignored: Vec<String>) -> Result<Pipeline> {
        self.validate()?;

        let mut pipeline = Pipeline::new().with(ActionFilter::allowed());
        if self.mode == Mode::Default {
            pipeline = pipeline
                .with(BlockedDomainFilter::new(blocked))
                .with(IgnoredDomainFilter::new(ignored));
        }
        if let Some(host) = &self.destination {
            pipeline = pipeline.with(DestinationFilter::new(host.clone()));
        }
        if let Some(host) = &self.source {
            pipeline = pipeline.with(SourceFilter::new(host.clone()));
        }
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ResourceType;

    fn entry(action: Action, url: &str, tab: &str) -> Entry {
        Entry {
            timestamp: String::new(),
            action,
            resource_type: ResourceType::Image,
            request_url: url.to_string(),
            tab_url: tab.to_string(),
        }
    }

    fn allow(url: &str, tab: &str) -> Entry {
        entry(Action::Allow, url, tab)
    }

    fn check(stage: &impl Stage, url: &str, tab: &str) -> Verdict {
        stage.check(&Candidate::new(&allow(url, tab)))
    }

    #[test]
    fn test_action_filter() {
        let stage = ActionFilter::allowed();
        assert_eq!(check(&stage, "http://a.test/", "http://b.test/"), Verdict::Forward);

        let blocked = entry(Action::Block, "http://a.test/", "http://b.test/");
        assert_eq!(stage.check(&Candidate::new(&blocked)), Verdict::Drop);
    }

    #[test]
    fn test_blocked_filter() {
        let stage = BlockedDomainFilter::new(vec![".tracker.net".into(), "ads.example.com".into()]);
        let tab = "http://s.test/";
        assert_eq!(check(&stage, "http://x.tracker.net/p", tab), Verdict::Drop);
        assert_eq!(check(&stage, "http://ads.example.com/", tab), Verdict::Drop);
        assert_eq!(check(&stage, "http://tracker.net/", tab), Verdict::Forward);
        assert_eq!(check(&stage, "http://cdn.example.com/", tab), Verdict::Forward);
        assert_eq!(check(&stage, "http://ads.example.com:8080/", tab), Verdict::Forward);
    }

    #[test]
    fn test_blocked_filter_forwards_unparsable() {
        // The matcher fails closed; the aggregator decides what to do with it.
        let stage = BlockedDomainFilter::new(vec!["ads.example.com".into()]);
        assert_eq!(check(&stage, "garbage", "http://s.test/"), Verdict::Forward);
    }

    #[test]
    fn test_ignored_filter() {
        let stage = IgnoredDomainFilter::new(vec!["fonts.example.com".into()]);
        let tab = "http://s.test/";
        assert_eq!(check(&stage, "https://fonts.example.com/f.woff", tab), Verdict::Drop);
        assert_eq!(check(&stage, "https://example.com/", tab), Verdict::Forward);
    }

    #[test]
    fn test_request_host_resolved_once() {
        let e = allow("garbage", "http://s.test/");
        let candidate = Candidate::new(&e);
        assert_eq!(candidate.request_host(), None);
        assert_eq!(candidate.request_host(), None);
        assert_eq!(candidate.request_host.get(), Some(&None));

        let e = allow("http://cdn.test:81/x", "http://s.test/");
        assert_eq!(Candidate::new(&e).request_host(), Some("cdn.test:81"));
    }

    #[test]
    fn test_destination_and_source_filters() {
        let url = "http://ads.example.com/a.png";
        let tab = "http://site.test/page";

        let check_dest = |host: &str| check(&DestinationFilter::new(host), url, tab);
        assert_eq!(check_dest("ads.example.com"), Verdict::Forward);
        assert_eq!(check_dest("example.com"), Verdict::Drop);

        let check_src = |host: &str| check(&SourceFilter::new(host), url, tab);
        assert_eq!(check_src("site.test"), Verdict::Forward);
        assert_eq!(check_src("ads.example.com"), Verdict::Drop);

        let source = SourceFilter::new("site.test");
        assert_eq!(check(&source, "http://a.test/", "nonsense"), Verdict::Drop);
    }

    #[test]
    fn test_default_query_stage_order() {
        let query = Query {
            destination: Some("ads.example.com".into()),
            ..Query::default()
        };
        let pipeline = query.pipeline(Vec::new(), Vec::new()).unwrap();
        assert_eq!(
            pipeline.stage_names(),
            vec!["action", "blocked", "ignored", "destination"]
        );
    }

    #[test]
    fn test_full_query_skips_lists() {
        let query = Query {
            mode: Mode::Full,
            source: Some("site.test".into()),
            ..Query::default()
        };
        let pipeline = query
            .pipeline(vec!["ads.example.com".into()], Vec::new())
            .unwrap();
        assert_eq!(pipeline.stage_names(), vec!["action", "source"]);
        assert!(pipeline.admits(&allow("http://ads.example.com/", "http://site.test/")));
        assert!(!query.uses_patterns());
    }

    #[test]
    fn test_combined_filters_rejected() {
        let query = Query {
            mode: Mode::Default,
            destination: Some("a.test".into()),
            source: Some("b.test".into()),
        };
        assert!(matches!(
            query.pipeline(Vec::new(), Vec::new()),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_run_counts_and_stops_on_error() {
        let pipeline = Query::default()
            .pipeline(vec!["blocked.test".into()], Vec::new())
            .unwrap();
        let entries = vec![
            Ok(allow("http://ads.example.com/a.png", "http://site.test/")),
            Ok(allow("http://blocked.test/x", "http://site.test/")),
            Ok(entry(Action::Block, "http://ads.example.com/b", "http://site.test/")),
            Err(Error::UnknownAction("maybe".into())),
            Ok(allow("http://never.test/", "http://site.test/")),
        ];

        let mut stats = DomainStats::new();
        let err = pipeline.run(entries, &mut stats).unwrap_err();
        assert!(matches!(err, Error::UnknownAction(_)));
        assert_eq!(stats.len(), 1);
        assert!(stats.get("never.test").is_none());
    }

    #[test]
    fn test_run_summary() {
        let pipeline = Query::default().pipeline(Vec::new(), Vec::new()).unwrap();
        let entries = vec![
            Ok(allow("http://ads.example.com/a.png", "http://site.test/")),
            Ok(entry(Action::Block, "http://ads.example.com/b", "http://site.test/")),
        ];
        let mut stats = DomainStats::new();
        let summary = pipeline.run(entries, &mut stats).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                read: 2,
                dropped: 1,
                accepted: 1
            }
        );
    }
}
