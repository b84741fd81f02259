use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DealStatus {
    Active,
    #[serde(alias = "on_hold")]
    OnHold,
    Archived,
    Closed,
}

impl DealStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::OnHold => "on-hold",
            Self::Archived => "archived",
            Self::Closed => "closed",
        }
    }

    /// Archived and on-hold deals never produce suggestions.
    pub fn is_evaluated(self) -> bool {
        !matches!(self, Self::Archived | Self::OnHold)
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "active" => Ok(Self::Active),
            "on-hold" => Ok(Self::OnHold),
            "archived" => Ok(Self::Archived),
            "closed" => Ok(Self::Closed),
            other => anyhow::bail!("unknown deal status: {other}"),
        }
    }
}

/// Per-deal lender pipeline stage. Stages outside the known set are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LenderStage {
    Identified,
    InitialOutreach,
    TermSheet,
    Closed,
    Pass,
    Other(String),
}

impl LenderStage {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Identified => "Identified",
            Self::InitialOutreach => "Initial Outreach",
            Self::TermSheet => "Term Sheet",
            Self::Closed => "Closed",
            Self::Pass => "Pass",
            Self::Other(s) => s,
        }
    }

    /// Closed and passed lenders need no follow-up.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Pass)
    }

    pub fn is_early(&self) -> bool {
        matches!(self, Self::Identified | Self::InitialOutreach)
    }
}

impl From<String> for LenderStage {
    fn from(raw: String) -> Self {
        let key: String = raw
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "identified" => Self::Identified,
            "initialoutreach" => Self::InitialOutreach,
            "termsheet" => Self::TermSheet,
            "closed" => Self::Closed,
            "pass" | "passed" => Self::Pass,
            _ => Self::Other(raw.trim().to_string()),
        }
    }
}

impl From<&str> for LenderStage {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<LenderStage> for String {
    fn from(stage: LenderStage) -> Self {
        stage.as_str().to_string()
    }
}

impl fmt::Display for LenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lender {
    pub id: Uuid,
    pub name: String,
    pub stage: LenderStage,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub company: String,
    pub status: DealStatus,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub lenders: Vec<Lender>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Immutable input to one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub deals: Vec<Deal>,
    pub milestones_by_deal: BTreeMap<Uuid, Vec<Milestone>>,
}

impl Snapshot {
    /// Groups milestones under their deal. Milestones pointing at a deal outside the
    /// snapshot are dropped.
    pub fn new(deals: Vec<Deal>, milestones: Vec<Milestone>) -> Self {
        let known: BTreeSet<Uuid> = deals.iter().map(|d| d.id).collect();
        let mut milestones_by_deal: BTreeMap<Uuid, Vec<Milestone>> = BTreeMap::new();
        let mut orphaned: usize = 0;
        for milestone in milestones {
            if known.contains(&milestone.deal_id) {
                milestones_by_deal
                    .entry(milestone.deal_id)
                    .or_default()
                    .push(milestone);
            } else {
                orphaned += 1;
            }
        }

        if orphaned > 0 {
            tracing::debug!(orphaned, "dropped milestones without a matching deal");
        }

        Self {
            deals,
            milestones_by_deal,
        }
    }

    pub fn deal(&self, deal_id: Uuid) -> Option<&Deal> {
        self.deals.iter().find(|d| d.id == deal_id)
    }

    pub fn milestones_for(&self, deal_id: Uuid) -> &[Milestone] {
        self.milestones_by_deal
            .get(&deal_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
