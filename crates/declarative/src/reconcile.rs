//! Desired-vs-actual reconciliation
//!
//! A pure function of its two inputs: items present on both sides are
//! managed, desired-only items are missing, actual-only items are
//! untracked. Nothing here touches the system.

use crate::types::{Domain, Item, ItemState, ReconciliationResult};
use std::collections::{HashMap, HashSet};

/// Reconcile using [`Item::key`] as the identity
pub fn reconcile(domain: Domain, desired: Vec<Item>, actual: Vec<Item>) -> ReconciliationResult {
    reconcile_by(domain, desired, actual, Item::key)
}

/// Reconcile using a caller-supplied identity key.
///
/// Duplicate keys within one side collapse to their first occurrence.
/// Managed items are built from the desired item; metadata keys it
/// lacks and an empty path are filled from the observed item.
pub fn reconcile_by<F>(
    domain: Domain,
    desired: Vec<Item>,
    actual: Vec<Item>,
    key: F,
) -> ReconciliationResult
where
    F: Fn(&Item) -> String,
{
    let mut result = ReconciliationResult::empty(domain);

    let mut actual_by_key: HashMap<String, Item> = HashMap::with_capacity(actual.len());
    let mut actual_order = Vec::with_capacity(actual.len());
    for item in actual {
        let k = key(&item);
        if !actual_by_key.contains_key(&k) {
            actual_order.push(k.clone());
            actual_by_key.insert(k, item);
        }
    }

    let mut seen = HashSet::with_capacity(desired.len());
    for mut item in desired {
        let k = key(&item);
        if !seen.insert(k.clone()) {
            continue;
        }

        match actual_by_key.remove(&k) {
            Some(observed) => {
                for (meta_key, value) in observed.metadata {
                    item.metadata.entry(meta_key).or_insert(value);
                }
                if item.path.is_none() {
                    item.path = observed.path;
                }
                item.state = ItemState::Managed;
                result.managed.push(item);
            }
            None => {
                item.state = ItemState::Missing;
                result.missing.push(item);
            }
        }
    }

    for k in actual_order {
        if let Some(mut item) = actual_by_key.remove(&k) {
            item.state = ItemState::Untracked;
            result.untracked.push(item);
        }
    }

    log::debug!(
        "reconciled {domain}: {} managed, {} missing, {} untracked",
        result.managed.len(),
        result.missing.len(),
        result.untracked.len()
    );

    result
}

/// Every desired item could not be checked because the actual-state
/// query failed.
pub fn reconcile_failed(domain: Domain, desired: Vec<Item>, message: &str) -> ReconciliationResult {
    let mut result = ReconciliationResult::empty(domain);
    result.errors = desired
        .into_iter()
        .map(|mut item| {
            item.state = ItemState::Error;
            item.error = Some(message.to_string());
            item
        })
        .collect();
    result
}
