use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use dealflow_core::domain::deal::Snapshot;
use dealflow_core::domain::preferences::Preferences;
use dealflow_core::domain::suggestion::Suggestion;
use dealflow_core::engine::alerts::{alerts_widget, AlertsWidget};
use dealflow_core::engine::views::{render, View};
use dealflow_core::engine::Scope;
use dealflow_core::source::postgres::PgSnapshotSource;
use dealflow_core::source::supabase::SupabaseSnapshotSource;
use dealflow_core::source::SnapshotSource;
use dealflow_core::time::clock::{resolve_today, Clock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = dealflow_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let utc_offset = settings.utc_offset()?;

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match dealflow_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "DATABASE_URL missing; preferences cannot be saved");
            None
        }
    };

    let source: Option<Arc<dyn SnapshotSource>> = match &pool {
        Some(pool) => Some(Arc::new(PgSnapshotSource::new(pool.clone()))),
        None if settings.has_supabase() => match SupabaseSnapshotSource::from_settings(&settings) {
            Ok(s) => Some(Arc::new(s)),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "supabase source init failed");
                None
            }
        },
        None => None,
    };

    if let Some(source) = &source {
        tracing::info!(source = source.source_name(), "snapshot source ready");
    } else {
        tracing::error!("no snapshot source configured; starting API in degraded mode");
    }

    let state = AppState {
        pool,
        source,
        utc_offset,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/suggestions", get(get_all_deals_suggestions))
        .route("/deals/:deal_id/suggestions", get(get_deal_suggestions))
        .route(
            "/deals/:deal_id/suggestions/contextual",
            get(get_contextual_suggestions),
        )
        .route("/alerts", get(get_alerts))
        .route(
            "/preferences/:user_id",
            get(get_preferences).put(put_preferences),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    pool: Option<PgPool>,
    source: Option<Arc<dyn SnapshotSource>>,
    utc_offset: FixedOffset,
}

#[derive(Debug, Default, Deserialize)]
struct ViewQuery {
    user_id: Option<Uuid>,
    as_of_date: Option<String>,
    /// Comma-separated suggestion ids the caller has dismissed.
    dismissed: Option<String>,
}

impl ViewQuery {
    fn dismissed_ids(&self) -> BTreeSet<String> {
        parse_dismissed(self.dismissed.as_deref())
    }
}

fn parse_dismissed(raw: Option<&str>) -> BTreeSet<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Serialize)]
struct ApiSuggestions {
    view: &'static str,
    as_of_date: NaiveDate,
    source: &'static str,
    count: usize,
    suggestions: Vec<Suggestion>,
}

fn internal_error(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %e, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

struct Loaded {
    source: &'static str,
    snapshot: Snapshot,
    preferences: Preferences,
    clock: Clock,
}

async fn load(state: &AppState, query: &ViewQuery, scope: Scope) -> Result<Loaded, StatusCode> {
    let Some(source) = &state.source else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let today = resolve_today(query.as_of_date.as_deref(), Utc::now(), state.utc_offset)
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let snapshot = source.load_snapshot(scope).await.map_err(internal_error)?;
    if let Some(deal_id) = scope.deal_id() {
        if snapshot.deal(deal_id).is_none() {
            return Err(StatusCode::NOT_FOUND);
        }
    }

    let preferences = match query.user_id {
        Some(user_id) => {
            let stored = source
                .load_preferences(user_id)
                .await
                .map_err(internal_error)?
                .unwrap_or_default();
            checked_preferences(user_id, stored)?
        }
        None => Preferences::default(),
    };

    Ok(Loaded {
        source: source.source_name(),
        snapshot,
        preferences,
        clock: Clock::new(today, state.utc_offset),
    })
}

/// Stored rows can be edited outside `PUT /preferences`, so they are checked again here.
fn checked_preferences(user_id: Uuid, preferences: Preferences) -> Result<Preferences, StatusCode> {
    match preferences.validate() {
        Ok(()) => Ok(preferences),
        Err(e) => {
            tracing::warn!(%user_id, error = %e, "stored preferences are invalid");
            Err(StatusCode::UNPROCESSABLE_ENTITY)
        }
    }
}

async fn respond_view(
    state: &AppState,
    query: &ViewQuery,
    view: View,
) -> Result<Json<ApiSuggestions>, StatusCode> {
    let loaded = load(state, query, view.scope()).await?;
    let suggestions = render(
        view,
        &loaded.snapshot,
        &loaded.preferences,
        &loaded.clock,
        &query.dismissed_ids(),
    );

    Ok(Json(ApiSuggestions {
        view: view.name(),
        as_of_date: loaded.clock.today(),
        source: loaded.source,
        count: suggestions.len(),
        suggestions,
    }))
}

async fn get_all_deals_suggestions(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<ApiSuggestions>, StatusCode> {
    respond_view(&state, &query, View::AllDeals).await
}

async fn get_deal_suggestions(
    State(state): State<AppState>,
    Path(deal_id): Path<Uuid>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<ApiSuggestions>, StatusCode> {
    respond_view(&state, &query, View::Deal(deal_id)).await
}

async fn get_contextual_suggestions(
    State(state): State<AppState>,
    Path(deal_id): Path<Uuid>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<ApiSuggestions>, StatusCode> {
    respond_view(&state, &query, View::Contextual(deal_id)).await
}

async fn get_alerts(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<AlertsWidget>, StatusCode> {
    let loaded = load(&state, &query, Scope::AllDeals).await?;
    Ok(Json(alerts_widget(
        &loaded.snapshot,
        &loaded.preferences,
        &loaded.clock,
        &query.dismissed_ids(),
    )))
}

async fn get_preferences(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Preferences>, StatusCode> {
    let Some(source) = &state.source else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let prefs = source
        .load_preferences(user_id)
        .await
        .map_err(internal_error)?
        .unwrap_or_default();
    Ok(Json(prefs))
}

async fn put_preferences(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(preferences): Json<Preferences>,
) -> Result<Json<Preferences>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    if let Err(e) = preferences.validate() {
        tracing::info!(%user_id, error = %e, "rejected preferences");
        return Err(StatusCode::BAD_REQUEST);
    }

    dealflow_core::storage::preferences::save_preferences(pool, user_id, &preferences)
        .await
        .map_err(internal_error)?;

    Ok(Json(preferences))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &dealflow_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dismissed_ids_ignore_blanks() {
        let ids = parse_dismissed(Some(" a, ,b,,a "));
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("a") && ids.contains("b"));
        assert!(parse_dismissed(None).is_empty());
    }

    #[test]
    fn invalid_stored_preferences_are_unprocessable() {
        let user_id = Uuid::from_u128(1);
        let mut prefs = Preferences::default();
        prefs.thresholds.lender_check_in_days = i64::MAX;
        prefs.thresholds.lender_check_in_window_days = 1;
        assert_eq!(
            checked_preferences(user_id, prefs),
            Err(StatusCode::UNPROCESSABLE_ENTITY)
        );

        assert_eq!(
            checked_preferences(user_id, Preferences::default()),
            Ok(Preferences::default())
        );
    }
}
