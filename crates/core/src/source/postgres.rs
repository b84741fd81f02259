use crate::domain::deal::Snapshot;
use crate::domain::preferences::Preferences;
use crate::engine::Scope;
use crate::source::SnapshotSource;
use crate::storage;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgSnapshotSource {
    pool: sqlx::PgPool,
}

impl PgSnapshotSource {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl SnapshotSource for PgSnapshotSource {
    fn source_name(&self) -> &'static str {
        "postgres"
    }

    async fn load_snapshot(&self, scope: Scope) -> anyhow::Result<Snapshot> {
        storage::snapshot::load_snapshot(&self.pool, scope).await
    }

    async fn load_preferences(&self, user_id: Uuid) -> anyhow::Result<Option<Preferences>> {
        storage::preferences::load_preferences(&self.pool, user_id).await
    }
}
