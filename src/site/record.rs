//! Raw domain records and their classification into match rules.

use crate::rule_type::MatchRule;

/// Match kind of a raw upstream domain record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKind {
    /// Substring match
    Plain,
    /// Regular expression
    Regex,
    /// Domain and all of its subdomains
    RootDomain,
    /// Exact domain
    Full,
    /// Kind code this crate does not know
    Unknown(i32),
}

impl RawKind {
    /// Map an upstream wire code to a kind.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => RawKind::Plain,
            1 => RawKind::Regex,
            2 => RawKind::RootDomain,
            3 => RawKind::Full,
            other => RawKind::Unknown(other),
        }
    }
}

/// One domain record exactly as the upstream dataset carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDomainRecord {
    pub kind: RawKind,
    pub value: String,
    pub tags: Vec<String>,
}

impl RawDomainRecord {
    /// Create a record without tags.
    pub fn new(kind: RawKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            tags: Vec::new(),
        }
    }

    /// Attach tags to the record.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Classify this record into typed match rules.
    ///
    /// Yields at most two rules. A root domain matches its apex exactly only
    /// when it has more than one label; the suffix rule is always emitted.
    pub fn classify(&self) -> Vec<MatchRule> {
        match self.kind {
            RawKind::Plain => vec![MatchRule::keyword(self.value.as_str())],
            RawKind::Regex => vec![MatchRule::regex(self.value.as_str())],
            RawKind::Full => vec![MatchRule::domain(self.value.as_str())],
            RawKind::RootDomain => {
                let suffix = MatchRule::suffix(format!(".{}", self.value));
                if self.value.contains('.') {
                    vec![MatchRule::domain(self.value.as_str()), suffix]
                } else {
                    vec![suffix]
                }
            }
            RawKind::Unknown(_) => Vec::new(),
        }
    }
}

/// All records of one upstream country/category entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSiteEntry {
    /// Code as found upstream, not yet lowercased
    pub code: String,
    pub records: Vec<RawDomainRecord>,
}
