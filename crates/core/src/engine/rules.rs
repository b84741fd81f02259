use crate::domain::deal::{Deal, LenderStage, Milestone};
use crate::domain::preferences::Thresholds;
use crate::domain::suggestion::{Priority, Suggestion, SuggestionRule};
use crate::time::clock::Clock;
use uuid::Uuid;

/// Everything one rule needs to judge one deal.
pub(crate) struct DealContext<'a> {
    pub deal: &'a Deal,
    pub milestones: &'a [Milestone],
    pub thresholds: &'a Thresholds,
    pub clock: &'a Clock,
}

pub(crate) fn apply(rule: SuggestionRule, ctx: &DealContext<'_>, out: &mut Vec<Suggestion>) {
    match rule {
        SuggestionRule::StaleLender => stale_lenders(ctx, out),
        SuggestionRule::OverdueMilestone => overdue_milestones(ctx, out),
        SuggestionRule::DueToday => milestones_due_in(ctx, 0, out),
        SuggestionRule::DueTomorrow => milestones_due_in(ctx, 1, out),
        SuggestionRule::TermSheet => term_sheet(ctx, out),
        SuggestionRule::StaleDeal => stale_deal(ctx, out),
        SuggestionRule::StuckLenders => stuck_lenders(ctx, out),
    }
}

/// Two-step ladder: a short check-in window, then silence, then the urgent tier.
pub(crate) fn lender_staleness(days: i64, t: &Thresholds) -> Option<Priority> {
    let check_in_end = t
        .lender_check_in_days
        .saturating_add(t.lender_check_in_window_days);
    if days >= t.lender_stale_high_days {
        Some(Priority::High)
    } else if (t.lender_check_in_days..check_in_end).contains(&days) {
        Some(Priority::Medium)
    } else {
        None
    }
}

fn base(rule: SuggestionRule, priority: Priority, deal: &Deal, sub_id: Option<Uuid>) -> Suggestion {
    Suggestion {
        id: Suggestion::key(rule, deal.id, sub_id),
        rule,
        category: rule.category(),
        priority,
        deal_id: deal.id,
        company: deal.company.clone(),
        lender_id: None,
        milestone_id: None,
        title: String::new(),
        description: String::new(),
        action_label: None,
        days: None,
    }
}

fn plural(n: i64, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn stale_lenders(ctx: &DealContext<'_>, out: &mut Vec<Suggestion>) {
    let deal = ctx.deal;
    for lender in &deal.lenders {
        if lender.stage.is_terminal() {
            continue;
        }
        let Some(updated_at) = lender.updated_at else {
            continue;
        };
        let days = ctx.clock.days_since(updated_at);
        let Some(priority) = lender_staleness(days, ctx.thresholds) else {
            continue;
        };

        let (title, action) = match priority {
            Priority::High => (format!("Follow up with {}", lender.name), "Follow up"),
            _ => (format!("Check in with {}", lender.name), "Check in"),
        };

        out.push(Suggestion {
            lender_id: Some(lender.id),
            title,
            description: format!(
                "{} on {} has had no update in {} (stage: {}).",
                lender.name,
                deal.company,
                plural(days, "day"),
                lender.stage
            ),
            action_label: Some(action.to_string()),
            days: Some(days),
            ..base(SuggestionRule::StaleLender, priority, deal, Some(lender.id))
        });
    }
}

fn open_milestones<'a>(
    ctx: &'a DealContext<'_>,
) -> impl Iterator<Item = (&'a Milestone, i64)> + 'a {
    let clock = *ctx.clock;
    let milestones: &'a [Milestone] = ctx.milestones;
    milestones
        .iter()
        .filter(|m| !m.completed)
        .filter_map(move |m| m.due_date.map(|due| (m, clock.days_until(due))))
}

fn overdue_milestones(ctx: &DealContext<'_>, out: &mut Vec<Suggestion>) {
    let deal = ctx.deal;
    for (milestone, until) in open_milestones(ctx) {
        if until >= 0 {
            continue;
        }
        let overdue = -until;
        let priority = if overdue >= ctx.thresholds.milestone_overdue_high_days {
            Priority::High
        } else {
            Priority::Medium
        };

        out.push(Suggestion {
            milestone_id: Some(milestone.id),
            title: format!("Overdue: {}", milestone.title),
            description: format!(
                "{} for {} is {} overdue.",
                milestone.title,
                deal.company,
                plural(overdue, "day")
            ),
            action_label: Some("Update milestone".to_string()),
            days: Some(overdue),
            ..base(SuggestionRule::OverdueMilestone, priority, deal, Some(milestone.id))
        });
    }
}

fn milestones_due_in(ctx: &DealContext<'_>, offset_days: i64, out: &mut Vec<Suggestion>) {
    let deal = ctx.deal;
    let (rule, priority, when) = if offset_days == 0 {
        (SuggestionRule::DueToday, Priority::High, "today")
    } else {
        (SuggestionRule::DueTomorrow, Priority::Medium, "tomorrow")
    };

    for (milestone, until) in open_milestones(ctx) {
        if until != offset_days {
            continue;
        }

        out.push(Suggestion {
            milestone_id: Some(milestone.id),
            title: format!("Due {when}: {}", milestone.title),
            description: format!("{} for {} is due {when}.", milestone.title, deal.company),
            action_label: Some("Complete milestone".to_string()),
            days: Some(until),
            ..base(rule, priority, deal, Some(milestone.id))
        });
    }
}

fn term_sheet(ctx: &DealContext<'_>, out: &mut Vec<Suggestion>) {
    let deal = ctx.deal;
    let names: Vec<&str> = deal
        .lenders
        .iter()
        .filter(|l| l.stage == LenderStage::TermSheet)
        .map(|l| l.name.as_str())
        .collect();
    if names.is_empty() {
        return;
    }

    out.push(Suggestion {
        title: format!(
            "{} at term sheet",
            plural(names.len() as i64, "lender")
        ),
        description: format!(
            "{} has term sheets in play: {}.",
            deal.company,
            names.join(", ")
        ),
        action_label: Some("Review term sheets".to_string()),
        ..base(SuggestionRule::TermSheet, Priority::High, deal, None)
    });
}

fn stale_deal(ctx: &DealContext<'_>, out: &mut Vec<Suggestion>) {
    let deal = ctx.deal;
    let Some(updated_at) = deal.updated_at else {
        return;
    };
    let days = ctx.clock.days_since(updated_at);
    if days < ctx.thresholds.deal_stale_days {
        return;
    }
    let priority = if days >= ctx.thresholds.deal_stale_high_days {
        Priority::High
    } else {
        Priority::Medium
    };

    out.push(Suggestion {
        title: format!("{} has gone quiet", deal.company),
        description: format!(
            "No deal activity in {} (stage: {}).",
            plural(days, "day"),
            if deal.stage.is_empty() {
                "unset"
            } else {
                deal.stage.as_str()
            }
        ),
        action_label: Some("Update deal".to_string()),
        days: Some(days),
        ..base(SuggestionRule::StaleDeal, priority, deal, None)
    });
}

fn stuck_lenders(ctx: &DealContext<'_>, out: &mut Vec<Suggestion>) {
    let deal = ctx.deal;
    let stuck: Vec<(&str, i64)> = deal
        .lenders
        .iter()
        .filter(|l| l.stage.is_early())
        .filter_map(|l| {
            let days = ctx.clock.days_since(l.updated_at?);
            (days >= ctx.thresholds.stuck_lender_days).then_some((l.name.as_str(), days))
        })
        .collect();
    if stuck.len() < ctx.thresholds.stuck_lender_min_count.max(1) {
        return;
    }

    let oldest = stuck.iter().map(|(_, d)| *d).max();
    let names: Vec<&str> = stuck.iter().map(|(n, _)| *n).collect();

    out.push(Suggestion {
        title: format!(
            "{} stuck in early outreach",
            plural(stuck.len() as i64, "lender")
        ),
        description: format!(
            "{} has lenders with no movement past outreach: {}.",
            deal.company,
            names.join(", ")
        ),
        action_label: Some("Re-engage lenders".to_string()),
        days: oldest,
        ..base(SuggestionRule::StuckLenders, Priority::Medium, deal, None)
    });
}
