use dealflow_core::domain::suggestion::{Priority, Suggestion, SuggestionRule};
use std::collections::BTreeMap;

/// Counts logged after each run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub deals: usize,
    pub by_rule: BTreeMap<SuggestionRule, usize>,
}

impl DigestSummary {
    pub fn from_suggestions(items: &[Suggestion]) -> Self {
        let mut out = Self {
            total: items.len(),
            ..Self::default()
        };
        let mut deals = std::collections::BTreeSet::new();
        for s in items {
            match s.priority {
                Priority::High => out.high += 1,
                Priority::Medium => out.medium += 1,
                Priority::Low => out.low += 1,
            }
            *out.by_rule.entry(s.rule).or_default() += 1;
            deals.insert(s.deal_id);
        }
        out.deals = deals.len();
        out
    }

    /// `rule=count` pairs in rule order, for a single log field.
    pub fn rules_field(&self) -> String {
        self.by_rule
            .iter()
            .map(|(rule, n)| format!("{rule}={n}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item(rule: SuggestionRule, priority: Priority, deal: u128) -> Suggestion {
        Suggestion {
            id: Suggestion::key(rule, Uuid::from_u128(deal), None),
            rule,
            category: rule.category(),
            priority,
            deal_id: Uuid::from_u128(deal),
            company: format!("Deal {deal}"),
            lender_id: None,
            milestone_id: None,
            title: String::new(),
            description: String::new(),
            action_label: None,
            days: None,
        }
    }

    #[test]
    fn counts_by_priority_rule_and_deal() {
        let items = vec![
            item(SuggestionRule::TermSheet, Priority::High, 1),
            item(SuggestionRule::StaleDeal, Priority::Medium, 1),
            item(SuggestionRule::StaleDeal, Priority::High, 2),
        ];
        let s = DigestSummary::from_suggestions(&items);
        assert_eq!((s.total, s.high, s.medium, s.low, s.deals), (3, 2, 1, 0, 2));
        assert_eq!(s.rules_field(), "term-sheet=1,stale-deal=2");
    }

    #[test]
    fn empty_run_has_empty_rules_field() {
        let s = DigestSummary::from_suggestions(&[]);
        assert_eq!(s.total, 0);
        assert_eq!(s.rules_field(), "");
    }
}
