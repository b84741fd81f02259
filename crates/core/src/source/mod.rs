pub mod error;
pub mod postgres;
pub mod supabase;

use crate::domain::deal::Snapshot;
use crate::domain::preferences::Preferences;
use crate::engine::Scope;
use uuid::Uuid;

/// Where deal pipeline data comes from. The engine only ever sees the returned snapshot.
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// With `Scope::Deal`, only that deal and its milestones are loaded.
    async fn load_snapshot(&self, scope: Scope) -> anyhow::Result<Snapshot>;

    async fn load_preferences(&self, user_id: Uuid) -> anyhow::Result<Option<Preferences>>;
}
