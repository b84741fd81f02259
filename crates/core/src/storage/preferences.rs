use crate::domain::preferences::Preferences;
use anyhow::Context;
use sqlx::types::Json;
use uuid::Uuid;

pub async fn load_preferences(
    pool: &sqlx::PgPool,
    user_id: Uuid,
) -> anyhow::Result<Option<Preferences>> {
    let row: Option<(Json<Preferences>,)> =
        sqlx::query_as("SELECT preferences FROM user_preferences WHERE user_id = $1")
            .persistent(false)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .with_context(|| format!("select user_preferences failed (user_id={user_id})"))?;

    Ok(row.map(|(Json(prefs),)| prefs))
}

/// Upserts after validation; a rejected document leaves the stored one untouched.
pub async fn save_preferences(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    preferences: &Preferences,
) -> anyhow::Result<()> {
    preferences.validate()?;

    sqlx::query(
        "INSERT INTO user_preferences (user_id, preferences, updated_at) \
         VALUES ($1, $2, now()) \
         ON CONFLICT (user_id) DO UPDATE \
           SET preferences = EXCLUDED.preferences, updated_at = EXCLUDED.updated_at",
    )
    .persistent(false)
    .bind(user_id)
    .bind(Json(preferences))
    .execute(pool)
    .await
    .with_context(|| format!("upsert user_preferences failed (user_id={user_id})"))?;

    tracing::info!(%user_id, "saved preferences");
    Ok(())
}
