use anyhow::Context;
use clap::{Parser, ValueEnum};
use dealflow_core::engine::views::{render, View};
use dealflow_core::source::postgres::PgSnapshotSource;
use dealflow_core::source::supabase::SupabaseSnapshotSource;
use dealflow_core::source::SnapshotSource;
use dealflow_core::time::clock::{resolve_today, Clock};
use std::collections::BTreeSet;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod digest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    Db,
    Supabase,
}

#[derive(Debug, Parser)]
#[command(name = "dealflow_worker")]
struct Args {
    /// Evaluation date (YYYY-MM-DD). Defaults to today in DEALFLOW_UTC_OFFSET_HOURS.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Limit the run to one deal.
    #[arg(long)]
    deal_id: Option<Uuid>,

    /// Load this user's stored preferences instead of the defaults.
    #[arg(long)]
    user_id: Option<Uuid>,

    #[arg(long, value_enum, default_value_t = SourceKind::Db)]
    source: SourceKind,

    /// Use the capped side-panel view (requires --deal-id).
    #[arg(long, requires = "deal_id")]
    contextual: bool,

    /// Keep at most this many suggestions after the view's own cap.
    #[arg(long)]
    limit: Option<usize>,
}

impl Args {
    fn view(&self) -> View {
        match (self.deal_id, self.contextual) {
            (Some(id), true) => View::Contextual(id),
            (Some(id), false) => View::Deal(id),
            (None, _) => View::AllDeals,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = dealflow_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(&settings, &args).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "suggestion run failed");
        return Err(err);
    }
    Ok(())
}

async fn run(settings: &dealflow_core::config::Settings, args: &Args) -> anyhow::Result<()> {
    let offset = settings.utc_offset()?;
    let today = resolve_today(args.as_of_date.as_deref(), chrono::Utc::now(), offset)?;
    let clock = Clock::new(today, offset);
    let view = args.view();

    let source: Box<dyn SnapshotSource> = match args.source {
        SourceKind::Db => {
            let db_url = settings.require_database_url()?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(2)
                .connect(db_url)
                .await
                .context("connect DATABASE_URL failed")?;
            dealflow_core::storage::migrate(&pool).await?;
            Box::new(PgSnapshotSource::new(pool))
        }
        SourceKind::Supabase => Box::new(SupabaseSnapshotSource::from_settings(settings)?),
    };

    let snapshot = source.load_snapshot(view.scope()).await?;
    if let Some(deal_id) = view.scope().deal_id() {
        anyhow::ensure!(
            snapshot.deal(deal_id).is_some(),
            "deal not found: {deal_id}"
        );
    }

    let preferences = match args.user_id {
        Some(user_id) => source
            .load_preferences(user_id)
            .await?
            .unwrap_or_else(|| {
                tracing::info!(%user_id, "no stored preferences; using defaults");
                Default::default()
            }),
        None => Default::default(),
    };
    preferences
        .validate()
        .context("stored preferences are invalid")?;

    let mut suggestions = render(view, &snapshot, &preferences, &clock, &BTreeSet::new());
    if let Some(limit) = args.limit {
        suggestions.truncate(limit);
    }

    let summary = digest::DigestSummary::from_suggestions(&suggestions);
    tracing::info!(
        %today,
        source = source.source_name(),
        view = view.name(),
        total = summary.total,
        high = summary.high,
        medium = summary.medium,
        low = summary.low,
        deals = summary.deals,
        rules = %summary.rules_field(),
        "suggestion run complete"
    );

    println!(
        "{}",
        serde_json::to_string_pretty(&suggestions).context("serialize suggestions failed")?
    );
    Ok(())
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
    fn picks_view_from_flags() {
        let id = Uuid::from_u128(7);
        let id_arg = id.to_string();
        let args = Args::parse_from([
            "dealflow_worker",
            "--deal-id",
            id_arg.as_str(),
            "--contextual",
        ]);
        assert_eq!(args.view(), View::Contextual(id));

        let args = Args::parse_from(["dealflow_worker", "--source", "supabase"]);
        assert_eq!(args.view(), View::AllDeals);
        assert_eq!(args.source, SourceKind::Supabase);
    }

    #[test]
    fn contextual_requires_deal_id() {
        assert!(Args::try_parse_from(["dealflow_worker", "--contextual"]).is_err());
    }
}
