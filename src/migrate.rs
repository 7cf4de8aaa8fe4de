use anyhow::Result;
use sqlx::sqlite::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Module set version. A single row; every merge rewrites it.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            module_set_id TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Catalog entries, keyed by (name, revision). Revision is the empty
    // string for unrevisioned sources.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS modules (
            name TEXT NOT NULL,
            revision TEXT NOT NULL,
            schema_url TEXT NOT NULL,
            PRIMARY KEY (name, revision)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_modules_name ON modules(name)")
        .execute(pool)
        .await?;

    Ok(())
}
