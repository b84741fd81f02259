use crate::domain::suggestion::Suggestion;
use std::collections::BTreeSet;

/// Most urgent first. Within a priority tier, deals sort by company name (case-insensitive)
/// and then id; a deal's own suggestions keep their emission order.
pub fn rank(items: &mut [Suggestion]) {
    items.sort_by_cached_key(|s| (s.priority.rank(), s.company.to_lowercase(), s.deal_id));
}

pub fn is_ranked(items: &[Suggestion]) -> bool {
    items
        .windows(2)
        .all(|w| w[0].priority.rank() <= w[1].priority.rank())
}

pub fn without_dismissed(items: Vec<Suggestion>, dismissed: &BTreeSet<String>) -> Vec<Suggestion> {
    if dismissed.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|s| !dismissed.contains(&s.id))
        .collect()
}

pub fn truncate(mut items: Vec<Suggestion>, cap: usize) -> Vec<Suggestion> {
    items.truncate(cap);
    items
}
