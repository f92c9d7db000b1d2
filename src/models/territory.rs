//! Territories and the search criteria they bundle.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Limits;

/// A configured topic or brand with its own criteria and tracked accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Territory {
    /// Territory name; part of every identity and cursor key
    pub name: String,

    /// Free-text search terms
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Account identifiers whose timelines are followed
    #[serde(default)]
    pub accounts: Vec<String>,

    /// Hashtags or topic tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Networks this territory is harvested on (empty means all)
    #[serde(default)]
    pub networks: Vec<String>,

    /// Overrides `harvest.limits`
    #[serde(default)]
    pub limits: Option<Limits>,
}

impl Territory {
    /// All criteria in harvest order: keywords, then accounts, then tags.
    ///
    /// Blank entries are skipped.
    pub fn criteria(&self) -> Vec<Criterion> {
        let keywords = self.keywords.iter().map(|v| (CriterionKind::Keyword, v));
        let accounts = self.accounts.iter().map(|v| (CriterionKind::Account, v));
        let tags = self.tags.iter().map(|v| (CriterionKind::Tag, v));

        keywords
            .chain(accounts)
            .chain(tags)
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(kind, value)| Criterion::new(kind, value.trim()))
            .collect()
    }

    /// Whether this territory should be harvested on `network`.
    pub fn includes_network(&self, network: &str) -> bool {
        self.networks.is_empty() || self.networks.iter().any(|n| n == network)
    }
}

/// What a criterion value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    Keyword,
    Account,
    Tag,
}

impl CriterionKind {
    /// The feed action used to query this kind of criterion.
    pub fn action(self) -> Action {
        match self {
            CriterionKind::Keyword => Action::Search,
            CriterionKind::Account => Action::Timeline,
            CriterionKind::Tag => Action::Tag,
        }
    }
}

/// Kind of remote query; one component of a cursor key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Search,
    Timeline,
    Tag,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Search => "search",
            Action::Timeline => "timeline",
            Action::Tag => "tag",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A keyword, account or tag used to query a network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Criterion {
    pub kind: CriterionKind,
    pub value: String,
}

impl Criterion {
    pub fn new(kind: CriterionKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn keyword(value: impl Into<String>) -> Self {
        Self::new(CriterionKind::Keyword, value)
    }

    pub fn account(value: impl Into<String>) -> Self {
        Self::new(CriterionKind::Account, value)
    }

    pub fn tag(value: impl Into<String>) -> Self {
        Self::new(CriterionKind::Tag, value)
    }

    pub fn action(&self) -> Action {
        self.kind.action()
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action(), self.value)
    }
}
