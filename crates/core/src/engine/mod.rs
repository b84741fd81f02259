//! Suggestion derivation: a pure pass over a [`Snapshot`] that applies each enabled rule to
//! every evaluated deal, then ranks the result.

pub mod alerts;
pub mod ranking;
mod rules;
pub mod views;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::domain::deal::{Deal, Snapshot};
use crate::domain::preferences::Preferences;
use crate::domain::suggestion::{Priority, Suggestion, SuggestionRule};
use crate::time::clock::Clock;
use rules::DealContext;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    AllDeals,
    Deal(Uuid),
}

impl Scope {
    pub fn deal_id(self) -> Option<Uuid> {
        match self {
            Self::AllDeals => None,
            Self::Deal(id) => Some(id),
        }
    }

    fn includes(self, deal: &Deal) -> bool {
        match self {
            Self::AllDeals => true,
            Self::Deal(id) => deal.id == id,
        }
    }
}

/// Deals in scope whose status allows evaluation, in snapshot order.
pub fn evaluated_deals(snapshot: &Snapshot, scope: Scope) -> impl Iterator<Item = &Deal> {
    snapshot
        .deals
        .iter()
        .filter(move |d| d.status.is_evaluated() && scope.includes(d))
}

pub fn evaluate(
    snapshot: &Snapshot,
    preferences: &Preferences,
    scope: Scope,
    clock: &Clock,
) -> Vec<Suggestion> {
    let mut out = Vec::new();
    let mut deals_seen: usize = 0;

    for deal in evaluated_deals(snapshot, scope) {
        deals_seen += 1;
        let ctx = DealContext {
            deal,
            milestones: snapshot.milestones_for(deal.id),
            thresholds: &preferences.thresholds,
            clock,
        };
        for rule in SuggestionRule::ALL {
            if preferences.rules.is_enabled(rule) {
                rules::apply(rule, &ctx, &mut out);
            }
        }
    }

    ranking::rank(&mut out);

    tracing::debug!(
        today = %clock.today(),
        deals = deals_seen,
        suggestions = out.len(),
        high = out.iter().filter(|s| s.priority == Priority::High).count(),
        "evaluated suggestions"
    );

    out
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::domain::deal::{DealStatus, LenderStage};
    use crate::domain::suggestion::Category;

    fn prefs() -> Preferences {
        Preferences::default()
    }

    fn eval(snapshot: &Snapshot, prefs: &Preferences) -> Vec<Suggestion> {
        evaluate(snapshot, prefs, Scope::AllDeals, &clock())
    }

    fn of_rule(items: &[Suggestion], rule: SuggestionRule) -> Vec<&Suggestion> {
        items.iter().filter(|s| s.rule == rule).collect()
    }

    /// One deal that trips every rule.
    fn busy_snapshot() -> Snapshot {
        let mut d = deal(1, "Acme");
        d.updated_at = Some(days_ago(15));
        d.lenders = vec![
            lender(10, LenderStage::Identified, 12),
            lender(11, LenderStage::InitialOutreach, 11),
            lender(12, LenderStage::TermSheet, 0),
            lender(13, LenderStage::Closed, 40),
        ];
        let milestones = vec![
            milestone(20, &d, Some(due_in(-8))),
            milestone(21, &d, Some(due_in(0))),
            milestone(22, &d, Some(due_in(1))),
        ];
        Snapshot::new(vec![d], milestones)
    }

    #[test]
    fn repeated_evaluation_is_identical() {
        let snapshot = busy_snapshot();
        let a = eval(&snapshot, &prefs());
        let b = eval(&snapshot, &prefs());
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn archived_and_on_hold_deals_are_skipped() {
        let mut snapshot = busy_snapshot();
        let mut archived = snapshot.deals[0].clone();
        archived.id = Uuid::from_u128(2);
        archived.status = DealStatus::Archived;
        let mut held = snapshot.deals[0].clone();
        held.id = Uuid::from_u128(3);
        held.status = DealStatus::OnHold;
        snapshot = Snapshot::new(
            vec![snapshot.deals[0].clone(), archived, held],
            vec![
                milestone(30, &snapshot.deals[0], Some(due_in(0))),
            ],
        );

        let out = eval(&snapshot, &prefs());
        assert!(!out.is_empty());
        assert!(out
            .iter()
            .all(|s| s.deal_id != Uuid::from_u128(2) && s.deal_id != Uuid::from_u128(3)));
    }

    #[test]
    fn output_is_sorted_by_priority() {
        let out = eval(&busy_snapshot(), &prefs());
        assert!(ranking::is_ranked(&out));
        assert_eq!(out.first().map(|s| s.priority), Some(Priority::High));
        assert_eq!(out.last().map(|s| s.priority), Some(Priority::Medium));
    }

    #[test]
    fn every_rule_fires_on_busy_deal() {
        let out = eval(&busy_snapshot(), &prefs());
        for rule in SuggestionRule::ALL {
            assert!(!of_rule(&out, rule).is_empty(), "rule {rule} did not fire");
        }
        let overdue = of_rule(&out, SuggestionRule::OverdueMilestone);
        assert_eq!(overdue[0].priority, Priority::High);
        assert_eq!(overdue[0].days, Some(8));
        assert_eq!(of_rule(&out, SuggestionRule::StaleDeal)[0].priority, Priority::High);
        assert_eq!(of_rule(&out, SuggestionRule::DueTomorrow)[0].priority, Priority::Medium);
        assert_eq!(of_rule(&out, SuggestionRule::TermSheet)[0].category, Category::Opportunity);
    }

    #[test]
    fn stale_lender_boundaries() {
        let mut d = deal(1, "Acme");
        d.lenders = vec![
            lender(10, LenderStage::InitialOutreach, 7),
            lender(11, LenderStage::InitialOutreach, 6),
            lender(12, LenderStage::InitialOutreach, 5),
            lender(13, LenderStage::Pass, 30),
        ];
        let out = eval(&Snapshot::new(vec![d], Vec::new()), &prefs());
        let stale = of_rule(&out, SuggestionRule::StaleLender);

        let by_lender = |id: u128| {
            stale
                .iter()
                .find(|s| s.lender_id == Some(Uuid::from_u128(id)))
                .map(|s| s.priority)
        };
        assert_eq!(by_lender(10), Some(Priority::High));
        assert_eq!(by_lender(11), None);
        assert_eq!(by_lender(12), Some(Priority::Medium));
        assert_eq!(by_lender(13), None);
        assert_eq!(stale.len(), 2);
    }

    #[test]
    fn lender_without_timestamp_is_ignored() {
        let mut d = deal(1, "Acme");
        let mut l = lender(10, LenderStage::Identified, 30);
        l.updated_at = None;
        d.lenders = vec![l];
        d.updated_at = None;
        let out = eval(&Snapshot::new(vec![d], Vec::new()), &prefs());
        assert!(out.is_empty());
    }

    #[test]
    fn due_today_fires_once_only_when_enabled() {
        let d = deal(1, "Acme");
        let m = milestone(20, &d, Some(due_in(0)));
        let snapshot = Snapshot::new(vec![d], vec![m]);

        let out = eval(&snapshot, &prefs());
        let today = of_rule(&out, SuggestionRule::DueToday);
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].category, Category::Reminder);
        assert_eq!(today[0].priority, Priority::High);
        assert!(of_rule(&out, SuggestionRule::OverdueMilestone).is_empty());

        let mut disabled = prefs();
        disabled.rules.due_today = false;
        assert!(of_rule(&eval(&snapshot, &disabled), SuggestionRule::DueToday).is_empty());
    }

    #[test]
    fn completed_or_undated_milestones_do_not_fire() {
        let d = deal(1, "Acme");
        let mut done = milestone(20, &d, Some(due_in(-3)));
        done.completed = true;
        let undated = milestone(21, &d, None);
        let out = eval(&Snapshot::new(vec![d], vec![done, undated]), &prefs());
        assert!(out.is_empty());
    }

    #[test]
    fn recent_overdue_is_medium() {
        let d = deal(1, "Acme");
        let m = milestone(20, &d, Some(due_in(-6)));
        let out = eval(&Snapshot::new(vec![d], vec![m]), &prefs());
        let overdue = of_rule(&out, SuggestionRule::OverdueMilestone);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].priority, Priority::Medium);
    }

    #[test]
    fn stuck_lenders_group_into_one_suggestion() {
        let mut two = deal(1, "Acme");
        two.lenders = vec![
            lender(10, LenderStage::Identified, 10),
            lender(11, LenderStage::InitialOutreach, 14),
        ];
        let mut one = deal(2, "Beta");
        one.lenders = vec![
            lender(20, LenderStage::Identified, 12),
            lender(21, LenderStage::Identified, 9),
        ];
        let out = eval(&Snapshot::new(vec![two, one], Vec::new()), &prefs());
        let stuck = of_rule(&out, SuggestionRule::StuckLenders);

        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].deal_id, Uuid::from_u128(1));
        assert_eq!(stuck[0].priority, Priority::Medium);
        assert_eq!(stuck[0].days, Some(14));
        assert_eq!(stuck[0].id, format!("stuck-lenders-{}", Uuid::from_u128(1)));
    }

    #[test]
    fn disabling_one_rule_leaves_the_rest_untouched() {
        let snapshot = busy_snapshot();
        let all = eval(&snapshot, &prefs());

        for rule in SuggestionRule::ALL {
            let mut p = prefs();
            p.rules.set(rule, false);
            let out = eval(&snapshot, &p);

            assert!(of_rule(&out, rule).is_empty());
            let expected: Vec<&Suggestion> = all.iter().filter(|s| s.rule != rule).collect();
            let got: Vec<&Suggestion> = out.iter().collect();
            assert_eq!(got, expected, "disabling {rule} changed other rules");
        }
    }

    #[test]
    fn single_deal_scope_limits_output() {
        let busy = busy_snapshot();
        let mut other = deal(5, "Other");
        other.updated_at = Some(days_ago(20));
        let snapshot = Snapshot::new(
            vec![busy.deals[0].clone(), other],
            busy.milestones_by_deal.values().flatten().cloned().collect(),
        );

        let scoped = evaluate(&snapshot, &prefs(), Scope::Deal(Uuid::from_u128(5)), &clock());
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].rule, SuggestionRule::StaleDeal);

        let all = eval(&snapshot, &prefs());
        assert!(all.len() > scoped.len());
    }

    #[test]
    fn ids_are_stable_and_unique() {
        let out = eval(&busy_snapshot(), &prefs());
        let mut ids: Vec<&str> = out.iter().map(|s| s.id.as_str()).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
        assert!(ids.contains(&format!("due-today-{}-{}", Uuid::from_u128(1), Uuid::from_u128(21)).as_str()));
    }

    #[test]
    fn stale_deal_boundaries() {
        let deals: Vec<Deal> = [9, 10, 13, 14]
            .into_iter()
            .enumerate()
            .map(|(i, age)| {
                let mut d = deal(i as u128 + 1, &format!("Deal {age}"));
                d.updated_at = Some(days_ago(age));
                d
            })
            .collect();
        let out = eval(&Snapshot::new(deals, Vec::new()), &prefs());
        let stale = of_rule(&out, SuggestionRule::StaleDeal);

        let by_deal = |id: u128| {
            stale
                .iter()
                .find(|s| s.deal_id == Uuid::from_u128(id))
                .map(|s| s.priority)
        };
        assert_eq!(by_deal(1), None);
        assert_eq!(by_deal(2), Some(Priority::Medium));
        assert_eq!(by_deal(3), Some(Priority::Medium));
        assert_eq!(by_deal(4), Some(Priority::High));
    }

    #[test]
    fn overdue_by_exactly_the_high_threshold_is_high() {
        let d = deal(1, "Acme");
        let m = milestone(20, &d, Some(due_in(-7)));
        let out = eval(&Snapshot::new(vec![d], vec![m]), &prefs());
        let overdue = of_rule(&out, SuggestionRule::OverdueMilestone);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].priority, Priority::High);
        assert_eq!(overdue[0].days, Some(7));
    }

    #[test]
    fn future_timestamps_fire_nothing() {
        let mut d = deal(1, "Acme");
        d.updated_at = Some(days_ago(-30));
        d.lenders = vec![
            lender(10, LenderStage::Identified, -20),
            lender(11, LenderStage::InitialOutreach, -20),
        ];
        let out = eval(&Snapshot::new(vec![d], Vec::new()), &prefs());
        assert!(out.is_empty());
    }

    #[test]
    fn unvalidated_extreme_thresholds_still_evaluate() {
        let mut d = deal(1, "Acme");
        d.lenders = vec![lender(10, LenderStage::Identified, 3)];
        let mut p = prefs();
        p.thresholds.lender_check_in_days = i64::MAX;
        p.thresholds.lender_check_in_window_days = 1;
        p.thresholds.stuck_lender_min_count = 0;

        let out = eval(&Snapshot::new(vec![d], Vec::new()), &p);
        assert!(out.is_empty());
    }
}
