//! Partition a category's rules by match kind.

use ahash::AHashSet;

use crate::rule_type::{MatchKind, MatchRule};

/// A category's rules split into one list per match kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledRules {
    pub domain: Vec<String>,
    pub domain_suffix: Vec<String>,
    pub domain_keyword: Vec<String>,
    pub domain_regex: Vec<String>,
}

impl CompiledRules {
    /// Partition rules by kind, keeping their relative order.
    pub fn compile(rules: &[MatchRule]) -> Self {
        let mut compiled = Self::default();
        for rule in rules {
            compiled.list_mut(rule.kind).push(rule.value.clone());
        }
        compiled
    }

    /// Like [`compile`](Self::compile), but also drops exact domains that a
    /// suffix rule of the same category already matches.
    pub fn compile_optimized(rules: &[MatchRule]) -> Self {
        let mut compiled = Self::compile(rules);
        let suffixes: AHashSet<&str> = rules
            .iter()
            .filter(|rule| rule.kind == MatchKind::DomainSuffix)
            .map(|rule| rule.value.as_str())
            .collect();
        if suffixes.is_empty() {
            return compiled;
        }
        compiled
            .domain
            .retain(|domain| !covered_by_suffix(domain, &suffixes));
        compiled
    }

    pub fn list(&self, kind: MatchKind) -> &[String] {
        match kind {
            MatchKind::Domain => &self.domain,
            MatchKind::DomainSuffix => &self.domain_suffix,
            MatchKind::DomainKeyword => &self.domain_keyword,
            MatchKind::DomainRegex => &self.domain_regex,
        }
    }

    fn list_mut(&mut self, kind: MatchKind) -> &mut Vec<String> {
        match kind {
            MatchKind::Domain => &mut self.domain,
            MatchKind::DomainSuffix => &mut self.domain_suffix,
            MatchKind::DomainKeyword => &mut self.domain_keyword,
            MatchKind::DomainRegex => &mut self.domain_regex,
        }
    }

    /// Total number of values across all four lists.
    pub fn len(&self) -> usize {
        MatchKind::ALL.iter().map(|kind| self.list(*kind).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether an exact domain is matched by one of the suffixes.
///
/// A dotted suffix (`.example.com`) matches strict subdomains only; a bare
/// one (`example.com`) also matches the domain itself.
fn covered_by_suffix(domain: &str, suffixes: &AHashSet<&str>) -> bool {
    if suffixes.contains(domain) {
        return true;
    }
    domain.match_indices('.').any(|(idx, _)| {
        let dotted = &domain[idx..];
        suffixes.contains(dotted) || suffixes.contains(&dotted[1..])
    })
}
