//! Deterministic ordering of aggregation results.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::domain::parent_pattern;
use crate::entry::ResourceType;
use crate::stats::{DomainStat, DomainStats};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCount {
    pub name: String,
    pub count: u64,
}

/// Per-resource-type URL lists of one domain, each in [`order_counts`] order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerType {
    pub xmlhttp: Vec<NameCount>,
    pub image: Vec<NameCount>,
    pub stylesheet: Vec<NameCount>,
    pub script: Vec<NameCount>,
    pub sub_frame: Vec<NameCount>,
    pub other: Vec<NameCount>,
}

impl PerType {
    pub fn get(&self, kind: ResourceType) -> &[NameCount] {
        match kind {
            ResourceType::XmlHttpRequest => &self.xmlhttp,
            ResourceType::Image => &self.image,
            ResourceType::StyleSheet => &self.stylesheet,
            ResourceType::Script => &self.script,
            ResourceType::SubFrame => &self.sub_frame,
            ResourceType::Other => &self.other,
        }
    }
}

/// One destination domain, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedDomain {
    pub domain: String,
    /// Wider pattern that would also cover sibling hosts.
    pub parent: Option<String>,
    pub src_domains: Vec<NameCount>,
    pub per_type: PerType,
}

impl RankedDomain {
    pub fn from_stat(stat: &DomainStat) -> Self {
        let per_type = PerType {
            xmlhttp: order_counts(stat.urls(ResourceType::XmlHttpRequest)),
            image: order_counts(stat.urls(ResourceType::Image)),
            stylesheet: order_counts(stat.urls(ResourceType::StyleSheet)),
            script: order_counts(stat.urls(ResourceType::Script)),
            sub_frame: order_counts(stat.urls(ResourceType::SubFrame)),
            other: order_counts(stat.urls(ResourceType::Other)),
        };
        Self {
            domain: stat.domain.clone(),
            parent: parent_pattern(&stat.domain),
            src_domains: order_counts(&stat.src_domains),
            per_type,
        }
    }
}

/// Most used first: by count, then by name ascending.
pub fn order_counts(counts: &HashMap<String, u64>) -> Vec<NameCount> {
    let mut ordered: Vec<NameCount> = counts
        .iter()
        .map(|(name, count)| NameCount {
            name: name.clone(),
            count: *count,
        })
        .collect();
    ordered.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ordered
}

/// Total order over domains: more source domains first, then more distinct
/// URLs, then host name ascending.
pub fn compare_domains(a: &DomainStat, b: &DomainStat) -> Ordering {
    b.src_domains
        .len()
        .cmp(&a.src_domains.len())
        .then_with(|| b.distinct_url_count().cmp(&a.distinct_url_count()))
        .then_with(|| a.domain.cmp(&b.domain))
}

pub fn rank_domains(stats: &DomainStats) -> Vec<&DomainStat> {
    let mut ranked: Vec<&DomainStat> = stats.iter().collect();
    ranked.sort_by(|a, b| compare_domains(a, b));
    ranked
}

pub fn rank(stats: &DomainStats) -> Vec<RankedDomain> {
    rank_domains(stats)
        .into_iter()
        .map(RankedDomain::from_stat)
        .collect()
}
