use crate::config::Settings;
use crate::domain::deal::{Deal, Milestone, Snapshot};
use crate::domain::preferences::Preferences;
use crate::engine::Scope;
use crate::source::error::SourceDiagnosticsError;
use crate::source::SnapshotSource;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

const SOURCE_NAME: &str = "supabase";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const MAX_BACKOFF_SECS: u64 = 30;

// PostgREST embeds deal_lenders under the `lenders` key.
const DEAL_SELECT: &str =
    "id,company,status,stage,updated_at,value,lenders:deal_lenders(id,name,stage,updated_at)";
const MILESTONE_SELECT: &str = "id,deal_id,title,due_date,completed,completed_at";

/// Reads the pipeline through Supabase's PostgREST endpoint with the service-role key.
#[derive(Debug, Clone)]
pub struct SupabaseSnapshotSource {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retries: u32,
}

#[derive(Debug, Deserialize)]
struct PreferencesRow {
    preferences: Preferences,
}

impl SupabaseSnapshotSource {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_supabase_url()?.to_string();
        let api_key = settings.require_supabase_service_role_key()?.to_string();

        let timeout_secs = std::env::var("SUPABASE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("SUPABASE_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build supabase http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            retries,
        })
    }

    fn url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url.trim_end_matches('/'))
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn fetch_once(&self, table: &str, query: &[(&str, String)]) -> Result<Value> {
        let res = self
            .http
            .get(self.url(table))
            .headers(self.headers()?)
            .query(query)
            .send()
            .await
            .with_context(|| format!("supabase request for {table} failed"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read supabase response for {table}"))?;

        if !status.is_success() {
            return Err(SourceDiagnosticsError {
                source_name: SOURCE_NAME,
                stage: "http",
                detail: format!("{table}: status={status}"),
                status: Some(status.as_u16()),
                raw_body: Some(text),
            }
            .into());
        }

        serde_json::from_str::<Value>(&text)
            .with_context(|| format!("supabase response for {table} is not valid JSON: {text}"))
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut attempt: u32 = 0;
        let raw = loop {
            attempt += 1;
            match self.fetch_once(table, query).await {
                Ok(raw) => break raw,
                Err(err) => {
                    let retryable = err
                        .downcast_ref::<SourceDiagnosticsError>()
                        .map_or(true, SourceDiagnosticsError::is_retryable);
                    if !retryable || attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = backoff_for(attempt);
                    tracing::warn!(table, attempt, ?backoff, error = %err, "supabase fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        };

        decode_rows(table, raw)
    }
}

/// Doubles from one second per attempt, capped at `MAX_BACKOFF_SECS`.
fn backoff_for(attempt: u32) -> Duration {
    let secs = 1u64
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

fn decode_rows<T: DeserializeOwned>(table: &str, raw: Value) -> Result<Vec<T>> {
    match serde_json::from_value::<Vec<T>>(raw.clone()) {
        Ok(rows) => Ok(rows),
        Err(e) => Err(SourceDiagnosticsError {
            source_name: SOURCE_NAME,
            stage: "decode",
            detail: format!("{table}: {e}"),
            status: None,
            raw_body: Some(raw.to_string()),
        }
        .into()),
    }
}

fn eq_filter(id: Uuid) -> String {
    format!("eq.{id}")
}

#[async_trait::async_trait]
impl SnapshotSource for SupabaseSnapshotSource {
    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn load_snapshot(&self, scope: Scope) -> Result<Snapshot> {
        let mut deal_query = vec![
            ("select", DEAL_SELECT.to_string()),
            ("order", "company.asc".to_string()),
        ];
        let mut milestone_query = vec![
            ("select", MILESTONE_SELECT.to_string()),
            ("order", "due_date.asc.nullslast".to_string()),
        ];
        if let Some(deal_id) = scope.deal_id() {
            deal_query.push(("id", eq_filter(deal_id)));
            milestone_query.push(("deal_id", eq_filter(deal_id)));
        }

        let deals: Vec<Deal> = self.fetch_rows("deals", &deal_query).await?;
        let milestones: Vec<Milestone> = self
            .fetch_rows("deal_milestones", &milestone_query)
            .await?;

        tracing::debug!(
            source = SOURCE_NAME,
            deals = deals.len(),
            milestones = milestones.len(),
            "loaded snapshot"
        );

        Ok(Snapshot::new(deals, milestones))
    }

    async fn load_preferences(&self, user_id: Uuid) -> Result<Option<Preferences>> {
        let query = [
            ("select", "preferences".to_string()),
            ("user_id", eq_filter(user_id)),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<PreferencesRow> = self.fetch_rows("user_preferences", &query).await?;
        Ok(rows.into_iter().next().map(|r| r.preferences))
    }
}
