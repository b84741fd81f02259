use crate::domain::deal::{Deal, DealStatus, Lender, LenderStage, Milestone};
use crate::time::clock::Clock;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
}

pub fn clock() -> Clock {
    Clock::utc(today())
}

/// Midday `n` days before `today()`.
pub fn days_ago(n: i64) -> DateTime<Utc> {
    let date = today() - Duration::days(n);
    Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
}

pub fn due_in(n: i64) -> NaiveDate {
    today() + Duration::days(n)
}

/// Active deal touched today, no lenders.
pub fn deal(id: u128, company: &str) -> Deal {
    Deal {
        id: Uuid::from_u128(id),
        company: company.to_string(),
        status: DealStatus::Active,
        stage: "Diligence".to_string(),
        updated_at: Some(days_ago(0)),
        value: Some(5_000_000.0),
        lenders: Vec::new(),
    }
}

pub fn lender(id: u128, stage: LenderStage, updated_days_ago: i64) -> Lender {
    Lender {
        id: Uuid::from_u128(id),
        name: format!("Lender {id}"),
        stage,
        updated_at: Some(days_ago(updated_days_ago)),
    }
}

pub fn milestone(id: u128, deal: &Deal, due_date: Option<NaiveDate>) -> Milestone {
    Milestone {
        id: Uuid::from_u128(id),
        deal_id: deal.id,
        title: format!("Milestone {id}"),
        due_date,
        completed: false,
        completed_at: None,
    }
}
