//! Exclusion reconciliation and category aggregation.
//!
//! Upstream lists encode "category without X" as a tagged category whose tag
//! mirrors or negates the last `-` segment of the base name:
//!
//! | base            | tag   | action                          |
//! |-----------------|-------|---------------------------------|
//! | `category-ads`  | `ads` | drop `category-ads@ads`         |
//! | `google`        | `!google` | subtract from `google`, drop |
//! | `geolocation-!cn` | `cn` | subtract from base, drop       |
//! | anything else   |       | keep as its own category        |

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use super::table::{uniq, Category, CategoryTable};
use crate::error::{Error, Result};
use crate::rule_type::MatchRule;

/// Last `-` separated segment of a base name, or the whole name.
pub fn last_name(base: &str) -> &str {
    match base.rsplit_once('-') {
        Some((_, last)) if !last.is_empty() => last,
        _ => base,
    }
}

/// Decision for one tagged category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The tag repeats the base name; the tagged category is a duplicate.
    Drop(Category),
    /// The tag negates the base name; its rules leave the base.
    Exclude(Category),
}

impl Reconciliation {
    /// Decide what happens to `base@tag`, if anything.
    pub fn decide(base: &str, tag: &str) -> Option<Self> {
        let last = last_name(base);
        let category = Category::tagged(base, tag);
        if last == tag {
            Some(Reconciliation::Drop(category))
        } else if tag.strip_prefix('!') == Some(last) || last.strip_prefix('!') == Some(tag) {
            Some(Reconciliation::Exclude(category))
        } else {
            None
        }
    }

    pub fn category(&self) -> &Category {
        match self {
            Reconciliation::Drop(category) | Reconciliation::Exclude(category) => category,
        }
    }
}

/// Every reconciliation decision for a table, computed before any mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub actions: Vec<Reconciliation>,
}

impl ReconcilePlan {
    /// Snapshot the table and decide every tagged category.
    pub fn build(table: &CategoryTable) -> Self {
        let actions = table
            .categories()
            .into_iter()
            .filter_map(|category| {
                let tag = category.tag.as_deref()?;
                Reconciliation::decide(&category.base, tag)
            })
            .collect();
        Self { actions }
    }

    /// Apply the plan: drops first, then exclusions in name order.
    ///
    /// An exclusion whose tagged category is missing means the table was
    /// changed behind the plan's back and aborts with `MissingCategory`.
    pub fn apply(&self, table: &mut CategoryTable) -> Result<()> {
        for action in &self.actions {
            if let Reconciliation::Drop(category) = action {
                log::debug!("dropping duplicate category {}", category);
                table.remove(category);
            }
        }

        for action in &self.actions {
            let Reconciliation::Exclude(category) = action else {
                continue;
            };
            let excluded = table
                .remove(category)
                .ok_or_else(|| Error::MissingCategory(category.to_string()))?;
            let excluded: AHashSet<MatchRule> = excluded.into_iter().collect();

            let base = Category::base(category.base.as_str());
            let rules = table.remove(&base).unwrap_or_default();
            let before = rules.len();
            let rules: Vec<MatchRule> = rules
                .into_iter()
                .filter(|rule| !excluded.contains(rule))
                .collect();
            log::debug!(
                "excluding {} from {}: {} -> {} rules",
                category,
                base,
                before,
                rules.len()
            );
            table.insert(base, rules);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Resolve every exclusion pair in the table.
pub fn reconcile(table: &mut CategoryTable) -> Result<()> {
    let plan = ReconcilePlan::build(table);
    plan.apply(table)?;
    log::info!("reconciled {} tagged categories", plan.len());
    Ok(())
}

/// Unions tagged variants of namespaced categories into one target category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRule {
    /// Base category receiving the union
    pub target: String,
    /// Tag whose variants are collected
    pub tag: String,
    /// Only bases with this prefix contribute
    pub prefix: String,
}

impl Default for AggregateRule {
    fn default() -> Self {
        Self {
            target: "geolocation-cn".to_string(),
            tag: "cn".to_string(),
            prefix: "category-".to_string(),
        }
    }
}

impl AggregateRule {
    /// Tagged categories that feed the target, sorted.
    ///
    /// Bases already named after the tag (`-cn`, `-!cn`) are skipped; their
    /// tagged variants were folded into the base during reconciliation.
    pub fn contributors(&self, table: &CategoryTable) -> Vec<Category> {
        let own = format!("-{}", self.tag);
        let negated = format!("-!{}", self.tag);
        let mut contributors: Vec<Category> = table
            .groups()
            .filter(|(base, group)| {
                *base != self.target
                    && base.starts_with(&self.prefix)
                    && !base.ends_with(&own)
                    && !base.ends_with(&negated)
                    && group.tags.contains_key(&self.tag)
            })
            .map(|(base, _)| Category::tagged(base, self.tag.as_str()))
            .collect();
        contributors.sort();
        contributors
    }

    /// Overwrite the target with the union of itself and every contributor.
    ///
    /// Returns the number of contributing categories. The target is always
    /// written, empty when it did not exist and nothing contributes.
    pub fn apply(&self, table: &mut CategoryTable) -> usize {
        let contributors = self.contributors(table);
        let target = Category::base(self.target.as_str());

        let mut union: Vec<MatchRule> = table
            .get(&target)
            .map(<[MatchRule]>::to_vec)
            .unwrap_or_default();
        for category in &contributors {
            if let Some(rules) = table.get(category) {
                union.extend(rules.iter().cloned());
            }
        }
        let union = uniq(union);

        log::info!(
            "aggregated {} categories into {} ({} rules)",
            contributors.len(),
            target,
            union.len()
        );
        table.insert(target, union);
        contributors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(values: &[&str]) -> Vec<MatchRule> {
        values.iter().map(|v| MatchRule::domain(*v)).collect()
    }

    #[test]
    fn test_last_name() {
        assert_eq!(last_name("category-ads"), "ads");
        assert_eq!(last_name("geolocation-!cn"), "!cn");
        assert_eq!(last_name("cn"), "cn");
        assert_eq!(last_name("trailing-"), "trailing-");
    }

    #[test]
    fn test_decide() {
        assert_eq!(
            Reconciliation::decide("foo-bar", "bar"),
            Some(Reconciliation::Drop(Category::tagged("foo-bar", "bar")))
        );
        assert_eq!(
            Reconciliation::decide("x", "!x"),
            Some(Reconciliation::Exclude(Category::tagged("x", "!x")))
        );
        assert_eq!(
            Reconciliation::decide("geolocation-!cn", "cn"),
            Some(Reconciliation::Exclude(Category::tagged("geolocation-!cn", "cn")))
        );
        assert_eq!(Reconciliation::decide("google", "ads"), None);
    }

    #[test]
    fn test_negation_forms_are_exclusive() {
        for (last, tag) in [("cn", "!cn"), ("!cn", "cn"), ("cn", "cn"), ("!cn", "!cn")] {
            let forward = tag.strip_prefix('!') == Some(last);
            let backward = last.strip_prefix('!') == Some(tag);
            assert!(!(forward && backward));
        }
    }

    #[test]
    fn test_exclusion_subtracts_and_deletes() {
        let mut table = CategoryTable::new();
        table.insert(Category::base("x"), rules(&["a.com", "b.com", "c.com"]));
        table.insert(Category::tagged("x", "!x"), rules(&["b.com"]));

        reconcile(&mut table).unwrap();

        assert_eq!(
            table.get(&Category::base("x")).unwrap(),
            rules(&["a.com", "c.com"]).as_slice()
        );
        assert!(!table.contains(&Category::tagged("x", "!x")));
    }

    #[test]
    fn test_duplicate_tag_deleted_without_effect() {
        let mut table = CategoryTable::new();
        table.insert(Category::base("foo-bar"), rules(&["a.com", "b.com"]));
        table.insert(Category::tagged("foo-bar", "bar"), rules(&["a.com"]));

        reconcile(&mut table).unwrap();

        assert_eq!(table.get(&Category::base("foo-bar")).unwrap().len(), 2);
        assert_eq!(table.names(), vec!["foo-bar"]);
    }

    #[test]
    fn test_unrelated_tags_untouched() {
        let mut table = CategoryTable::new();
        table.insert(Category::base("google"), rules(&["a.com", "b.com"]));
        table.insert(Category::tagged("google", "ads"), rules(&["b.com"]));

        let plan = ReconcilePlan::build(&table);
        assert!(plan.is_empty());
        plan.apply(&mut table).unwrap();
        assert_eq!(table.names(), vec!["google", "google@ads"]);
    }

    #[test]
    fn test_missing_exclusion_is_fatal() {
        let mut table = CategoryTable::new();
        table.insert(Category::base("x"), rules(&["a.com"]));
        table.insert(Category::tagged("x", "!x"), rules(&["a.com"]));

        let plan = ReconcilePlan::build(&table);
        table.remove(&Category::tagged("x", "!x"));

        let err = plan.apply(&mut table).unwrap_err();
        assert!(matches!(err, Error::MissingCategory(name) if name == "x@!x"));
    }

    #[test]
    fn test_aggregate_unions_contributors() {
        let mut table = CategoryTable::new();
        table.insert(Category::base("geolocation-cn"), rules(&["a.cn"]));
        table.insert(Category::base("category-games"), rules(&["g.com", "g.cn"]));
        table.insert(Category::tagged("category-games", "cn"), rules(&["g.cn", "a.cn"]));
        table.insert(Category::base("category-ads-cn"), rules(&["ad.cn"]));
        table.insert(Category::tagged("category-ads-cn", "cn"), rules(&["ad.cn"]));
        table.insert(Category::tagged("category-dev-!cn", "cn"), rules(&["dev.cn"]));
        table.insert(Category::tagged("google", "cn"), rules(&["google.cn"]));

        let rule = AggregateRule::default();
        assert_eq!(
            rule.contributors(&table),
            vec![Category::tagged("category-games", "cn")]
        );
        assert_eq!(rule.apply(&mut table), 1);

        let mut merged = table.get(&Category::base("geolocation-cn")).unwrap().to_vec();
        merged.sort();
        assert_eq!(merged, rules(&["a.cn", "g.cn"]));
    }

    #[test]
    fn test_aggregate_without_inputs_creates_empty_target() {
        let mut table = CategoryTable::new();
        table.insert(Category::base("cn"), rules(&["a.cn"]));

        assert_eq!(AggregateRule::default().apply(&mut table), 0);
        assert_eq!(table.names(), vec!["cn", "geolocation-cn"]);
        assert!(table.get(&Category::base("geolocation-cn")).unwrap().is_empty());
    }

    #[test]
    fn test_aggregate_keeps_existing_target_without_inputs() {
        let mut table = CategoryTable::new();
        table.insert(Category::base("geolocation-cn"), rules(&["a.cn", "b.cn"]));

        assert_eq!(AggregateRule::default().apply(&mut table), 0);
        assert_eq!(table.get(&Category::base("geolocation-cn")).unwrap().len(), 2);
    }
}
