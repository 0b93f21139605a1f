use std::collections::HashMap;

use url::Url;

use crate::domain::host_key;
use crate::entry::{Entry, ResourceType};
use crate::error::{Error, Result};

/// Schemes that mark browser/extension-internal traffic.
const INTERNAL_SCHEMES: &[&str] = &["chrome-extension", "moz-extension"];

/// Usage of one destination host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainStat {
    pub domain: String,
    /// Source (tab) host -> number of requests made from it.
    pub src_domains: HashMap<String, u64>,
    /// Request URL -> count, one map per [`ResourceType`], indexed by
    /// [`ResourceType::index`].
    urls: [HashMap<String, u64>; ResourceType::COUNT],
}

impl DomainStat {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Self::default()
        }
    }

    pub fn urls(&self, kind: ResourceType) -> &HashMap<String, u64> {
        &self.urls[kind.index()]
    }

    /// Distinct URLs seen across all resource types.
    pub fn distinct_url_count(&self) -> usize {
        self.urls.iter().map(HashMap::len).sum()
    }
}

/// Destination host -> statistics, owned by a single aggregation run.
#[derive(Debug, Clone, Default)]
pub struct DomainStats {
    domains: HashMap<String, DomainStat>,
}

impl DomainStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn get(&self, domain: &str) -> Option<&DomainStat> {
        self.domains.get(domain)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomainStat> {
        self.domains.values()
    }

    /// Folds one entry into the statistics.
    ///
    /// Extension-internal and first-party requests are ignored. Empty or
    /// relative URLs have host `""`; any other unparsable request or tab URL
    /// fails the run.
    pub fn count(&mut self, entry: &Entry) -> Result<()> {
        let request = parse_url(&entry.request_url)?;
        if let Some(url) = &request {
            if INTERNAL_SCHEMES.contains(&url.scheme()) {
                return Ok(());
            }
        }

        let tab = parse_url(&entry.tab_url)?;
        let host = request.as_ref().map(host_key).unwrap_or_default();
        let tab_host = tab.as_ref().map(host_key).unwrap_or_default();
        if host == tab_host {
            // first party
            return Ok(());
        }

        let stat = self
            .domains
            .entry(host.clone())
            .or_insert_with(|| DomainStat::new(host));
        *stat.urls[entry.resource_type.index()]
            .entry(entry.request_url.clone())
            .or_insert(0) += 1;
        *stat.src_domains.entry(tab_host).or_insert(0) += 1;
        Ok(())
    }
}

/// `None` for URLs without a scheme (including `""`), which carry no host.
fn parse_url(url: &str) -> Result<Option<Url>> {
    match Url::parse(url) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(None),
        Err(source) => Err(Error::InvalidUrl {
            url: url.to_string(),
            source,
        }),
    }
}
