use crate::domain::deal::Snapshot;
use crate::domain::preferences::{DisplayLimits, Preferences};
use crate::domain::suggestion::Suggestion;
use crate::engine::{evaluate, ranking, Scope};
use crate::time::clock::Clock;
use std::collections::BTreeSet;
use uuid::Uuid;

/// The three suggestion surfaces. All share one evaluator and differ only in scope and cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Full list for one deal's page.
    Deal(Uuid),
    /// Pipeline-wide list.
    AllDeals,
    /// Short side panel next to a deal.
    Contextual(Uuid),
}

impl View {
    pub fn name(self) -> &'static str {
        match self {
            Self::Deal(_) => "deal",
            Self::AllDeals => "all_deals",
            Self::Contextual(_) => "contextual",
        }
    }

    pub fn scope(self) -> Scope {
        match self {
            Self::Deal(id) | Self::Contextual(id) => Scope::Deal(id),
            Self::AllDeals => Scope::AllDeals,
        }
    }

    pub fn limit(self, display: &DisplayLimits) -> Option<usize> {
        match self {
            Self::Deal(_) => None,
            Self::AllDeals => Some(display.all_deals_limit),
            Self::Contextual(_) => Some(display.contextual_limit),
        }
    }
}

pub fn render(
    view: View,
    snapshot: &Snapshot,
    preferences: &Preferences,
    clock: &Clock,
    dismissed: &BTreeSet<String>,
) -> Vec<Suggestion> {
    let items = evaluate(snapshot, preferences, view.scope(), clock);
    let items = ranking::without_dismissed(items, dismissed);
    match view.limit(&preferences.display) {
        Some(cap) => ranking::truncate(items, cap),
        None => items,
    }
}
