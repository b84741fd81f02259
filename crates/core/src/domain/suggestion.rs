use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Ordering follows urgency: `High < Medium < Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Warning,
    Action,
    Opportunity,
    Reminder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionRule {
    StaleLender,
    OverdueMilestone,
    DueToday,
    DueTomorrow,
    TermSheet,
    StaleDeal,
    StuckLenders,
}

impl SuggestionRule {
    /// Per-deal emission order.
    pub const ALL: [Self; 7] = [
        Self::StaleLender,
        Self::OverdueMilestone,
        Self::DueToday,
        Self::DueTomorrow,
        Self::TermSheet,
        Self::StaleDeal,
        Self::StuckLenders,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StaleLender => "stale-lender",
            Self::OverdueMilestone => "overdue-milestone",
            Self::DueToday => "due-today",
            Self::DueTomorrow => "due-tomorrow",
            Self::TermSheet => "term-sheet",
            Self::StaleDeal => "stale-deal",
            Self::StuckLenders => "stuck-lenders",
        }
    }

    pub fn category(self) -> Category {
        match self {
            Self::StaleLender | Self::StuckLenders => Category::Action,
            Self::OverdueMilestone | Self::StaleDeal => Category::Warning,
            Self::DueToday | Self::DueTomorrow => Category::Reminder,
            Self::TermSheet => Category::Opportunity,
        }
    }
}

impl fmt::Display for SuggestionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived advisory notice. Built fresh on every evaluation pass and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// `{rule}-{deal_id}` or `{rule}-{deal_id}-{lender_or_milestone_id}`.
    pub id: String,
    pub rule: SuggestionRule,
    pub category: Category,
    pub priority: Priority,
    pub deal_id: Uuid,
    pub company: String,
    pub lender_id: Option<Uuid>,
    pub milestone_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub action_label: Option<String>,
    /// Elapsed or overdue day count behind the notice, when the rule is date-driven.
    pub days: Option<i64>,
}

impl Suggestion {
    pub fn key(rule: SuggestionRule, deal_id: Uuid, sub_id: Option<Uuid>) -> String {
        match sub_id {
            Some(sub) => format!("{rule}-{deal_id}-{sub}"),
            None => format!("{rule}-{deal_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_is_most_urgent_first() {
        let mut v = vec![Priority::Low, Priority::High, Priority::Medium];
        v.sort();
        assert_eq!(v, vec![Priority::High, Priority::Medium, Priority::Low]);
        assert!(Priority::High.rank() < Priority::Medium.rank());
    }

    #[test]
    fn key_is_composed_from_rule_and_ids() {
        let deal = Uuid::from_u128(1);
        let lender = Uuid::from_u128(2);
        assert_eq!(
            Suggestion::key(SuggestionRule::StaleLender, deal, Some(lender)),
            format!("stale-lender-{deal}-{lender}")
        );
        assert_eq!(
            Suggestion::key(SuggestionRule::TermSheet, deal, None),
            format!("term-sheet-{deal}")
        );
    }
}
