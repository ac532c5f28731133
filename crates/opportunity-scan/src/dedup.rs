use std::collections::{BTreeSet, HashSet};

use crate::scan_types::ResultItem;

/// Keep only results whose identifier has not been delivered yet.
///
/// Provider order is preserved. A result repeated within `items` is kept once.
pub fn filter_undelivered(items: Vec<ResultItem>, delivered: &BTreeSet<String>) -> Vec<ResultItem> {
    let mut seen_this_page = HashSet::new();

    items
        .into_iter()
        .filter(|item| !delivered.contains(&item.id))
        .filter(|item| seen_this_page.insert(item.id.clone()))
        .collect()
}
