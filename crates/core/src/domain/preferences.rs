use crate::domain::suggestion::SuggestionRule;
use anyhow::ensure;
use serde::{Deserialize, Serialize};

/// Upper bound for every day threshold (about ten years).
pub const MAX_THRESHOLD_DAYS: i64 = 3650;

/// User-tunable inputs to the suggestion engine. Every field has a default, so a partial
/// stored document still loads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub rules: RuleToggles,
    pub thresholds: Thresholds,
    pub display: DisplayLimits,
}

impl Preferences {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.thresholds.validate()?;
        self.display.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleToggles {
    pub stale_lender: bool,
    pub overdue_milestone: bool,
    pub due_today: bool,
    pub due_tomorrow: bool,
    pub term_sheet: bool,
    pub stale_deal: bool,
    pub stuck_lenders: bool,
}

impl Default for RuleToggles {
    fn default() -> Self {
        Self {
            stale_lender: true,
            overdue_milestone: true,
            due_today: true,
            due_tomorrow: true,
            term_sheet: true,
            stale_deal: true,
            stuck_lenders: true,
        }
    }
}

impl RuleToggles {
    pub fn is_enabled(&self, rule: SuggestionRule) -> bool {
        *self.flag(rule)
    }

    pub fn set(&mut self, rule: SuggestionRule, enabled: bool) {
        *self.flag_mut(rule) = enabled;
    }

    fn flag(&self, rule: SuggestionRule) -> &bool {
        match rule {
            SuggestionRule::StaleLender => &self.stale_lender,
            SuggestionRule::OverdueMilestone => &self.overdue_milestone,
            SuggestionRule::DueToday => &self.due_today,
            SuggestionRule::DueTomorrow => &self.due_tomorrow,
            SuggestionRule::TermSheet => &self.term_sheet,
            SuggestionRule::StaleDeal => &self.stale_deal,
            SuggestionRule::StuckLenders => &self.stuck_lenders,
        }
    }

    fn flag_mut(&mut self, rule: SuggestionRule) -> &mut bool {
        match rule {
            SuggestionRule::StaleLender => &mut self.stale_lender,
            SuggestionRule::OverdueMilestone => &mut self.overdue_milestone,
            SuggestionRule::DueToday => &mut self.due_today,
            SuggestionRule::DueTomorrow => &mut self.due_tomorrow,
            SuggestionRule::TermSheet => &mut self.term_sheet,
            SuggestionRule::StaleDeal => &mut self.stale_deal,
            SuggestionRule::StuckLenders => &mut self.stuck_lenders,
        }
    }
}

/// Day counts are whole calendar days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Lender untouched this long gets an urgent follow-up.
    pub lender_stale_high_days: i64,
    /// Start of the one-off check-in nudge for an untouched lender.
    pub lender_check_in_days: i64,
    /// Length of the check-in window; the nudge is silent again until the urgent tier.
    pub lender_check_in_window_days: i64,
    pub milestone_overdue_high_days: i64,
    pub deal_stale_days: i64,
    pub deal_stale_high_days: i64,
    pub stuck_lender_days: i64,
    pub stuck_lender_min_count: usize,
    pub recently_completed_days: i64,
    /// Open milestones due within this many days (today included) land in the
    /// due-this-week bucket.
    pub due_soon_days: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            lender_stale_high_days: 7,
            lender_check_in_days: 5,
            lender_check_in_window_days: 1,
            milestone_overdue_high_days: 7,
            deal_stale_days: 10,
            deal_stale_high_days: 14,
            stuck_lender_days: 10,
            stuck_lender_min_count: 2,
            recently_completed_days: 7,
            due_soon_days: 7,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, v) in [
            ("lender_stale_high_days", self.lender_stale_high_days),
            ("lender_check_in_days", self.lender_check_in_days),
            ("lender_check_in_window_days", self.lender_check_in_window_days),
            ("milestone_overdue_high_days", self.milestone_overdue_high_days),
            ("deal_stale_days", self.deal_stale_days),
            ("deal_stale_high_days", self.deal_stale_high_days),
            ("stuck_lender_days", self.stuck_lender_days),
            ("recently_completed_days", self.recently_completed_days),
            ("due_soon_days", self.due_soon_days),
        ] {
            ensure!(
                v <= MAX_THRESHOLD_DAYS,
                "{name} must be <= {MAX_THRESHOLD_DAYS} (got {v})"
            );
        }

        ensure!(
            self.lender_check_in_days >= 1,
            "lender_check_in_days must be >= 1 (got {})",
            self.lender_check_in_days
        );
        ensure!(
            self.lender_check_in_window_days >= 0,
            "lender_check_in_window_days must be >= 0 (got {})",
            self.lender_check_in_window_days
        );
        let check_in_end = self
            .lender_check_in_days
            .checked_add(self.lender_check_in_window_days);
        ensure!(
            check_in_end.is_some_and(|end| end <= self.lender_stale_high_days),
            "lender check-in window must end at or before lender_stale_high_days ({})",
            self.lender_stale_high_days
        );
        ensure!(
            self.milestone_overdue_high_days >= 1,
            "milestone_overdue_high_days must be >= 1 (got {})",
            self.milestone_overdue_high_days
        );
        ensure!(
            (1..=self.deal_stale_high_days).contains(&self.deal_stale_days),
            "deal_stale_days must be 1..=deal_stale_high_days (got {} / {})",
            self.deal_stale_days,
            self.deal_stale_high_days
        );
        ensure!(
            self.stuck_lender_days >= 1,
            "stuck_lender_days must be >= 1 (got {})",
            self.stuck_lender_days
        );
        ensure!(
            self.stuck_lender_min_count >= 1,
            "stuck_lender_min_count must be >= 1"
        );
        ensure!(
            self.recently_completed_days >= 0,
            "recently_completed_days must be >= 0 (got {})",
            self.recently_completed_days
        );
        ensure!(
            self.due_soon_days >= 1,
            "due_soon_days must be >= 1 (got {})",
            self.due_soon_days
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayLimits {
    pub all_deals_limit: usize,
    pub contextual_limit: usize,
    pub widget_limit: usize,
    pub bucket_limit: usize,
}

impl Default for DisplayLimits {
    fn default() -> Self {
        Self {
            all_deals_limit: 8,
            contextual_limit: 5,
            widget_limit: 5,
            bucket_limit: 5,
        }
    }
}

impl DisplayLimits {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, v) in [
            ("all_deals_limit", self.all_deals_limit),
            ("contextual_limit", self.contextual_limit),
            ("widget_limit", self.widget_limit),
            ("bucket_limit", self.bucket_limit),
        ] {
            ensure!(v >= 1, "{name} must be >= 1");
        }
        Ok(())
    }
}
