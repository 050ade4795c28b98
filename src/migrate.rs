use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Creates the `chats` table and its indexes. Idempotent.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chats (
            id TEXT PRIMARY KEY,
            collected_at INTEGER NOT NULL,
            json_path TEXT NOT NULL,
            body TEXT NOT NULL,
            model_name TEXT NOT NULL DEFAULT 'unknown',
            message_count INTEGER NOT NULL DEFAULT 0,
            first_user_message TEXT,
            last_assistant_message TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chats_collected_at ON chats(collected_at DESC)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chats_model_name ON chats(model_name)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}
