//! Match rule definitions.

use std::fmt;

/// MatchKind is the closed set of domain match kinds a rule can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchKind {
    /// Exact domain match
    Domain,
    /// Domain suffix match, value carries the leading dot
    DomainSuffix,
    /// Substring match
    DomainKeyword,
    /// Regular expression match
    DomainRegex,
}

impl MatchKind {
    /// All kinds in wire-code order.
    pub const ALL: [MatchKind; 4] = [
        MatchKind::Domain,
        MatchKind::DomainSuffix,
        MatchKind::DomainKeyword,
        MatchKind::DomainRegex,
    ];

    /// Get the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Domain => "domain",
            MatchKind::DomainSuffix => "domain_suffix",
            MatchKind::DomainKeyword => "domain_keyword",
            MatchKind::DomainRegex => "domain_regex",
        }
    }

    /// Convert to a u8 value for binary serialization.
    pub fn as_u8(&self) -> u8 {
        match self {
            MatchKind::Domain => 0,
            MatchKind::DomainSuffix => 1,
            MatchKind::DomainKeyword => 2,
            MatchKind::DomainRegex => 3,
        }
    }

    /// Convert from a u8 value.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(MatchKind::Domain),
            1 => Some(MatchKind::DomainSuffix),
            2 => Some(MatchKind::DomainKeyword),
            3 => Some(MatchKind::DomainRegex),
            _ => None,
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed domain match rule.
///
/// Two rules are the same rule when both kind and value are equal; this is
/// the key every dedup and set-difference step works on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchRule {
    pub kind: MatchKind,
    pub value: String,
}

impl MatchRule {
    /// Create a new rule.
    pub fn new(kind: MatchKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn domain(value: impl Into<String>) -> Self {
        Self::new(MatchKind::Domain, value)
    }

    pub fn suffix(value: impl Into<String>) -> Self {
        Self::new(MatchKind::DomainSuffix, value)
    }

    pub fn keyword(value: impl Into<String>) -> Self {
        Self::new(MatchKind::DomainKeyword, value)
    }

    pub fn regex(value: impl Into<String>) -> Self {
        Self::new(MatchKind::DomainRegex, value)
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}
