pub mod domain;
pub mod engine;
pub mod source;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use chrono::FixedOffset;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub supabase_url: Option<String>,
        pub supabase_service_role_key: Option<String>,
        pub sentry_dsn: Option<String>,
        /// Offset used to decide what "today" is; whole hours east of UTC.
        pub utc_offset_hours: i32,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let utc_offset_hours = match std::env::var("DEALFLOW_UTC_OFFSET_HOURS") {
                Ok(s) => s
                    .trim()
                    .parse::<i32>()
                    .with_context(|| format!("invalid DEALFLOW_UTC_OFFSET_HOURS: {s}"))?,
                Err(_) => 0,
            };

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                supabase_url: std::env::var("SUPABASE_URL").ok(),
                supabase_service_role_key: std::env::var("SUPABASE_SERVICE_ROLE_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                utc_offset_hours,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_supabase_url(&self) -> anyhow::Result<&str> {
            self.supabase_url
                .as_deref()
                .context("SUPABASE_URL is required")
        }

        pub fn require_supabase_service_role_key(&self) -> anyhow::Result<&str> {
            self.supabase_service_role_key
                .as_deref()
                .context("SUPABASE_SERVICE_ROLE_KEY is required")
        }

        pub fn has_supabase(&self) -> bool {
            self.supabase_url.is_some() && self.supabase_service_role_key.is_some()
        }

        pub fn utc_offset(&self) -> anyhow::Result<FixedOffset> {
            crate::time::clock::offset_from_hours(self.utc_offset_hours)
        }
    }
}
