use crate::domain::deal::{Deal, DealStatus, Lender, LenderStage, Milestone, Snapshot};
use crate::engine::Scope;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

type DealRow = (Uuid, String, String, String, Option<f64>, Option<DateTime<Utc>>);
type LenderRow = (Uuid, Uuid, String, String, Option<DateTime<Utc>>);
type MilestoneRow = (Uuid, Uuid, String, Option<NaiveDate>, bool, Option<DateTime<Utc>>);

pub async fn load_snapshot(pool: &sqlx::PgPool, scope: Scope) -> anyhow::Result<Snapshot> {
    let t0 = std::time::Instant::now();
    let deals = fetch_deals(pool, scope.deal_id()).await?;
    let deal_ids: Vec<Uuid> = deals.iter().map(|d| d.id).collect();
    let milestones = fetch_milestones(pool, &deal_ids).await?;

    tracing::debug!(
        deals = deals.len(),
        milestones = milestones.len(),
        elapsed_ms = t0.elapsed().as_millis(),
        "loaded snapshot from postgres"
    );

    Ok(Snapshot::new(deals, milestones))
}

pub async fn fetch_deals(
    pool: &sqlx::PgPool,
    deal_id: Option<Uuid>,
) -> anyhow::Result<Vec<Deal>> {
    let rows = match deal_id {
        Some(id) => {
            sqlx::query_as::<_, DealRow>(
                "SELECT id, company, status, stage, value, updated_at \
                 FROM deals \
                 WHERE id = $1",
            )
            .persistent(false)
            .bind(id)
            .fetch_all(pool)
            .await
            .context("select deal failed")?
        }
        None => {
            sqlx::query_as::<_, DealRow>(
                "SELECT id, company, status, stage, value, updated_at \
                 FROM deals \
                 ORDER BY company ASC, id ASC",
            )
            .persistent(false)
            .fetch_all(pool)
            .await
            .context("select deals failed")?
        }
    };

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = rows.iter().map(|r| r.0).collect();
    let lender_rows = sqlx::query_as::<_, LenderRow>(
        "SELECT id, deal_id, name, stage, updated_at \
         FROM deal_lenders \
         WHERE deal_id = ANY($1) \
         ORDER BY name ASC, id ASC",
    )
    .persistent(false)
    .bind(ids)
    .fetch_all(pool)
    .await
    .context("select deal_lenders failed")?;

    assemble_deals(rows, lender_rows)
}

pub async fn fetch_milestones(
    pool: &sqlx::PgPool,
    deal_ids: &[Uuid],
) -> anyhow::Result<Vec<Milestone>> {
    if deal_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, MilestoneRow>(
        "SELECT id, deal_id, title, due_date, completed, completed_at \
         FROM deal_milestones \
         WHERE deal_id = ANY($1) \
         ORDER BY due_date ASC NULLS LAST, id ASC",
    )
    .persistent(false)
    .bind(deal_ids.to_vec())
    .fetch_all(pool)
    .await
    .context("select deal_milestones failed")?;

    Ok(rows
        .into_iter()
        .map(
            |(id, deal_id, title, due_date, completed, completed_at)| Milestone {
                id,
                deal_id,
                title,
                due_date,
                completed,
                completed_at,
            },
        )
        .collect())
}

fn assemble_deals(rows: Vec<DealRow>, lender_rows: Vec<LenderRow>) -> anyhow::Result<Vec<Deal>> {
    let mut lenders_by_deal: BTreeMap<Uuid, Vec<Lender>> = BTreeMap::new();
    for (id, deal_id, name, stage, updated_at) in lender_rows {
        lenders_by_deal.entry(deal_id).or_default().push(Lender {
            id,
            name,
            stage: LenderStage::from(stage),
            updated_at,
        });
    }

    let mut out = Vec::with_capacity(rows.len());
    for (id, company, status, stage, value, updated_at) in rows {
        let status = status
            .parse::<DealStatus>()
            .with_context(|| format!("invalid status for deal_id={id}"))?;
        out.push(Deal {
            id,
            company,
            status,
            stage,
            updated_at,
            value,
            lenders: lenders_by_deal.remove(&id).unwrap_or_default(),
        });
    }
    Ok(out)
}
