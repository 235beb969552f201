//! Category table: base categories and their attribute-tagged variants.

use std::fmt;
use std::hash::Hash;

use ahash::{AHashMap, AHashSet};

use super::record::RawSiteEntry;
use crate::rule_type::MatchRule;

/// Remove duplicates from a list, keeping the first occurrence of each item.
///
/// Callers must not rely on the resulting order beyond that.
pub fn uniq<T: Eq + Hash + Clone>(items: Vec<T>) -> Vec<T> {
    let mut seen = AHashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// A category name: a lowercase base code, optionally qualified by one tag.
///
/// Renders as `base` or `base@tag`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category {
    pub base: String,
    pub tag: Option<String>,
}

impl Category {
    pub fn base(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            tag: None,
        }
    }

    pub fn tagged(base: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            tag: Some(tag.into()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}@{}", self.base, tag),
            None => write!(f, "{}", self.base),
        }
    }
}

/// Rules of one base code plus every tagged sub-category derived from it.
#[derive(Debug, Clone, Default)]
pub struct SiteGroup {
    /// Rules of the base category itself, `None` when only tagged variants exist
    pub rules: Option<Vec<MatchRule>>,
    /// Tag name to the rules of `base@tag`
    pub tags: AHashMap<String, Vec<MatchRule>>,
}

impl SiteGroup {
    fn is_empty(&self) -> bool {
        self.rules.is_none() && self.tags.is_empty()
    }
}

/// Mapping from category to its rule list, keyed by base code first.
#[derive(Debug, Clone, Default)]
pub struct CategoryTable {
    groups: AHashMap<String, SiteGroup>,
}

impl CategoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table by indexing every entry in order.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a RawSiteEntry>,
    {
        let mut table = Self::new();
        for entry in entries {
            table.index_entry(entry);
        }
        table
    }

    /// Index one upstream entry.
    ///
    /// Every record is classified once; its rules go to the base category
    /// and to `code@tag` for each tag the record carries. All lists are
    /// deduplicated before they are installed.
    pub fn index_entry(&mut self, entry: &RawSiteEntry) {
        let code = entry.code.to_lowercase();
        let mut base = Vec::with_capacity(entry.records.len() * 2);
        let mut tagged: AHashMap<String, Vec<MatchRule>> = AHashMap::new();

        for record in &entry.records {
            let rules = record.classify();
            for tag in &record.tags {
                tagged
                    .entry(tag.clone())
                    .or_default()
                    .extend(rules.iter().cloned());
            }
            base.extend(rules);
        }

        let group = self.groups.entry(code).or_default();
        group.rules = Some(uniq(base));
        for (tag, rules) in tagged {
            group.tags.insert(tag, uniq(rules));
        }
    }

    /// Set the rule list of a category, replacing any previous one.
    pub fn insert(&mut self, category: Category, rules: Vec<MatchRule>) {
        let group = self.groups.entry(category.base).or_default();
        match category.tag {
            Some(tag) => {
                group.tags.insert(tag, rules);
            }
            None => group.rules = Some(rules),
        }
    }

    pub fn get(&self, category: &Category) -> Option<&[MatchRule]> {
        let group = self.groups.get(&category.base)?;
        match &category.tag {
            Some(tag) => group.tags.get(tag).map(Vec::as_slice),
            None => group.rules.as_deref(),
        }
    }

    pub fn contains(&self, category: &Category) -> bool {
        self.get(category).is_some()
    }

    /// Remove a category and return its rules.
    pub fn remove(&mut self, category: &Category) -> Option<Vec<MatchRule>> {
        let group = self.groups.get_mut(&category.base)?;
        let removed = match &category.tag {
            Some(tag) => group.tags.remove(tag),
            None => group.rules.take(),
        };
        if group.is_empty() {
            self.groups.remove(&category.base);
        }
        removed
    }

    /// Iterate over all base codes and their groups, in no particular order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &SiteGroup)> {
        self.groups.iter().map(|(base, group)| (base.as_str(), group))
    }

    /// Snapshot of every category currently in the table, sorted.
    pub fn categories(&self) -> Vec<Category> {
        let mut categories = Vec::with_capacity(self.len());
        for (base, group) in &self.groups {
            if group.rules.is_some() {
                categories.push(Category::base(base.as_str()));
            }
            for tag in group.tags.keys() {
                categories.push(Category::tagged(base.as_str(), tag.as_str()));
            }
        }
        categories.sort();
        categories
    }

    /// All category names, sorted lexicographically.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.categories().iter().map(ToString::to_string).collect();
        names.sort();
        names
    }

    /// Iterate over every category and its rules, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[MatchRule])> + '_ {
        self.categories().into_iter().filter_map(move |category| {
            let rules = self.get(&category)?;
            Some((category, rules))
        })
    }

    /// Number of categories (base and tagged).
    pub fn len(&self) -> usize {
        self.groups
            .values()
            .map(|group| usize::from(group.rules.is_some()) + group.tags.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of rules across every category.
    pub fn rule_count(&self) -> usize {
        self.groups
            .values()
            .map(|group| {
                group.rules.as_ref().map_or(0, Vec::len)
                    + group.tags.values().map(Vec::len).sum::<usize>()
            })
            .sum()
    }
}
