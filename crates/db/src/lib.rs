//! SQLite pool factory and table bootstrap for bookshelf.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use bookshelf_kernel::{settings::DatabaseSettings, Migration};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub use sqlx::SqlitePool;

/// Open a connection pool for the configured database.
///
/// In-memory URLs get exactly one connection that never expires, otherwise
/// every pooled connection would see its own empty database.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&settings.url)
        .with_context(|| format!("invalid database url '{}'", settings.url))?
        .create_if_missing(true);

    let pool_options = if is_in_memory(&settings.url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
    } else {
        SqlitePoolOptions::new().max_connections(settings.max_connections)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to '{}'", settings.url))?;

    tracing::info!(
        target: "bookshelf-db",
        url = %settings.url,
        "database pool ready"
    );

    Ok(pool)
}

/// Execute module DDL in the given order.
pub async fn apply_migrations(
    pool: &SqlitePool,
    migrations: &[(String, Migration)],
) -> anyhow::Result<()> {
    for (module, migration) in migrations {
        tracing::info!(
            target: "bookshelf-db",
            module = %module,
            migration = migration.id,
            "applying table ddl"
        );

        sqlx::raw_sql(migration.up)
            .execute(pool)
            .await
            .with_context(|| format!("failed to apply '{}' for module '{}'", migration.id, module))?;
    }

    Ok(())
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn books_ddl() -> Vec<(String, Migration)> {
        vec![(
            "books".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE IF NOT EXISTS books (isbn TEXT PRIMARY KEY, title TEXT NOT NULL);",
            },
        )]
    }

    #[test]
    fn detects_in_memory_urls() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file.db?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://bookshelf.db"));
    }

    #[tokio::test]
    async fn in_memory_pool_shares_one_database() {
        let pool = connect(&DatabaseSettings::in_memory()).await.unwrap();
        apply_migrations(&pool, &books_ddl()).await.unwrap();

        sqlx::query("INSERT INTO books (isbn, title) VALUES ('1', 'One')")
            .execute(&pool)
            .await
            .unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn ddl_can_be_applied_twice() {
        let pool = connect(&DatabaseSettings::in_memory()).await.unwrap();
        apply_migrations(&pool, &books_ddl()).await.unwrap();
        apply_migrations(&pool, &books_ddl()).await.unwrap();
    }
}
