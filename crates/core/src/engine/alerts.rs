use crate::domain::deal::{Deal, Milestone, Snapshot};
use crate::domain::preferences::Preferences;
use crate::domain::suggestion::Suggestion;
use crate::engine::{evaluate, evaluated_deals, ranking, Scope};
use crate::time::clock::Clock;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneAlert {
    pub milestone_id: Uuid,
    pub deal_id: Uuid,
    pub company: String,
    pub title: String,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Overdue: days late. Due this week: days until due. Completed: days since completion.
    pub days: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MilestoneBuckets {
    pub overdue: Vec<MilestoneAlert>,
    pub due_this_week: Vec<MilestoneAlert>,
    pub recently_completed: Vec<MilestoneAlert>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertsWidget {
    pub as_of_date: NaiveDate,
    pub top: Vec<Suggestion>,
    pub buckets: MilestoneBuckets,
}

fn alert(deal: &Deal, m: &Milestone, days: i64) -> MilestoneAlert {
    MilestoneAlert {
        milestone_id: m.id,
        deal_id: deal.id,
        company: deal.company.clone(),
        title: m.title.clone(),
        due_date: m.due_date,
        completed_at: m.completed_at,
        days,
    }
}

pub fn milestone_buckets(
    snapshot: &Snapshot,
    preferences: &Preferences,
    clock: &Clock,
) -> MilestoneBuckets {
    let mut out = MilestoneBuckets::default();
    let recent_days = preferences.thresholds.recently_completed_days;
    let soon_days = preferences.thresholds.due_soon_days;

    for deal in evaluated_deals(snapshot, Scope::AllDeals) {
        for m in snapshot.milestones_for(deal.id) {
            if m.completed {
                // Completed without a timestamp cannot be placed in time.
                let Some(completed_at) = m.completed_at else {
                    continue;
                };
                let since = clock.days_since(completed_at);
                if (0..=recent_days).contains(&since) {
                    out.recently_completed.push(alert(deal, m, since));
                }
                continue;
            }

            let Some(due) = m.due_date else {
                continue;
            };
            let until = clock.days_until(due);
            if until < 0 {
                out.overdue.push(alert(deal, m, -until));
            } else if until < soon_days {
                out.due_this_week.push(alert(deal, m, until));
            }
        }
    }

    out.overdue
        .sort_by_cached_key(|a| (Reverse(a.days), a.company.to_lowercase()));
    out.due_this_week
        .sort_by_cached_key(|a| (a.days, a.company.to_lowercase()));
    out.recently_completed
        .sort_by_cached_key(|a| (Reverse(a.completed_at), a.company.to_lowercase()));

    let cap = preferences.display.bucket_limit;
    out.overdue.truncate(cap);
    out.due_this_week.truncate(cap);
    out.recently_completed.truncate(cap);
    out
}

/// Dashboard widget: the most urgent pipeline-wide suggestions plus the milestone buckets.
pub fn alerts_widget(
    snapshot: &Snapshot,
    preferences: &Preferences,
    clock: &Clock,
    dismissed: &BTreeSet<String>,
) -> AlertsWidget {
    let top = evaluate(snapshot, preferences, Scope::AllDeals, clock);
    let top = ranking::without_dismissed(top, dismissed);
    let top = ranking::truncate(top, preferences.display.widget_limit);

    AlertsWidget {
        as_of_date: clock.today(),
        top,
        buckets: milestone_buckets(snapshot, preferences, clock),
    }
}
