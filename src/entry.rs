use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// What the extension did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Block,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Block => "block",
        }
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Action::Allow),
            "block" => Ok(Action::Block),
            other => Err(Error::UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The browser's classification of a request. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    #[serde(rename = "xmlhttprequest")]
    XmlHttpRequest,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "stylesheet")]
    StyleSheet,
    #[serde(rename = "script")]
    Script,
    #[serde(rename = "sub_frame")]
    SubFrame,
    #[serde(rename = "other")]
    Other,
}

impl ResourceType {
    pub const COUNT: usize = 6;

    pub const ALL: [ResourceType; Self::COUNT] = [
        ResourceType::XmlHttpRequest,
        ResourceType::Image,
        ResourceType::StyleSheet,
        ResourceType::Script,
        ResourceType::SubFrame,
        ResourceType::Other,
    ];

    /// Position of this type in [`ResourceType::ALL`].
    pub fn index(self) -> usize {
        match self {
            ResourceType::XmlHttpRequest => 0,
            ResourceType::Image => 1,
            ResourceType::StyleSheet => 2,
            ResourceType::Script => 3,
            ResourceType::SubFrame => 4,
            ResourceType::Other => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::XmlHttpRequest => "xmlhttprequest",
            ResourceType::Image => "image",
            ResourceType::StyleSheet => "stylesheet",
            ResourceType::Script => "script",
            ResourceType::SubFrame => "sub_frame",
            ResourceType::Other => "other",
        }
    }

    /// Plural heading used in text reports.
    pub fn label(self) -> &'static str {
        match self {
            ResourceType::XmlHttpRequest => "xmlhttps",
            ResourceType::Image => "images",
            ResourceType::StyleSheet => "stylesheets",
            ResourceType::Script => "scripts",
            ResourceType::SubFrame => "subframes",
            ResourceType::Other => "others",
        }
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnknownResourceType(s.to_string()))
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed request, as read back from the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub timestamp: String,
    pub action: Action,
    pub resource_type: ResourceType,
    pub request_url: String,
    pub tab_url: String,
}

/// Inbound event as posted by the browser extension.
///
/// Unknown fields (`reason`, `tabId`, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub action: Action,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub url: String,
    #[serde(rename = "tab")]
    pub tab_url: String,
}
