//! Domain pipeline: raw domain-list entries to reconciled, compiled categories.

mod compile;
pub mod decoder;
mod reconcile;
mod record;
mod table;

pub use compile::CompiledRules;
pub use decoder::decode_site_list;
pub use reconcile::{last_name, reconcile, AggregateRule, ReconcilePlan, Reconciliation};
pub use record::{RawDomainRecord, RawKind, RawSiteEntry};
pub use table::{uniq, Category, CategoryTable, SiteGroup};

use crate::error::Result;

/// Build the reconciled category table for a set of raw entries.
///
/// Indexing, exclusion reconciliation and the optional aggregation run in
/// that order; aggregation relies on reconciliation having already folded
/// the excluded variants away.
pub fn build_table(entries: &[RawSiteEntry], aggregate: Option<&AggregateRule>) -> Result<CategoryTable> {
    let mut table = CategoryTable::from_entries(entries);
    log::info!(
        "indexed {} categories ({} rules)",
        table.len(),
        table.rule_count()
    );
    reconcile(&mut table)?;
    if let Some(rule) = aggregate {
        rule.apply(&mut table);
    }
    Ok(table)
}
