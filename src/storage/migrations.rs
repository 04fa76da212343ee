//! # Database Migration Management
//!
//! Schema migrations are embedded at compile time and applied in version
//! order. Applied versions are tracked in `_sessiond_migrations`.

use crate::errors::{Result, SessiondError};
use crate::storage::DbPool;
use sqlx::Row;
use tracing::{error, info};

/// Embedded migrations as `(file stem, sql)`, sorted by version
const MIGRATIONS: &[(&str, &str)] = &[(
    "20260101000000_create_sessions",
    include_str!("../../migrations/20260101000000_create_sessions.sql"),
)];

/// Run all pending database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Starting database migration process");

    create_migration_table(pool).await?;
    let applied = get_applied_migration_versions(pool).await?;

    let mut migrations_run = 0;
    for (filename, sql) in MIGRATIONS {
        let version = extract_version_from_filename(filename)?;

        if applied.contains(&version) {
            continue;
        }

        info!(version, "Running migration: {}", filename);
        let start_time = std::time::Instant::now();

        let mut tx = pool.begin().await.map_err(|e| SessiondError::Database {
            source: e,
            context: "Failed to start migration transaction".to_string(),
        })?;

        sqlx::raw_sql(sql).execute(&mut *tx).await.map_err(|e| {
            error!(error = %e, migration = filename, "Migration failed");
            SessiondError::Database {
                source: e,
                context: format!("Migration failed: {}", filename),
            }
        })?;

        let execution_time = start_time.elapsed().as_millis() as i64;
        sqlx::query(
            "INSERT INTO _sessiond_migrations (version, description, checksum, execution_time, installed_on) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(version)
        .bind(*filename)
        .bind(calculate_checksum(sql))
        .bind(execution_time)
        .bind(chrono::Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| SessiondError::Database {
            source: e,
            context: format!("Failed to record migration: {}", filename),
        })?;

        tx.commit().await.map_err(|e| SessiondError::Database {
            source: e,
            context: "Failed to commit migration transaction".to_string(),
        })?;

        migrations_run += 1;
        info!(version, execution_time_ms = execution_time, "Migration completed: {}", filename);
    }

    if migrations_run > 0 {
        info!(count = migrations_run, "Database migrations completed");
    } else {
        info!("No pending migrations");
    }

    Ok(())
}

async fn create_migration_table(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _sessiond_migrations (
            version BIGINT PRIMARY KEY,
            description TEXT NOT NULL,
            checksum BLOB NOT NULL,
            execution_time BIGINT NOT NULL,
            installed_on TEXT NOT NULL
        )
    "#,
    )
    .execute(pool)
    .await
    .map_err(|e| SessiondError::Database {
        source: e,
        context: "Failed to create migration tracking table".to_string(),
    })?;

    Ok(())
}

async fn get_applied_migration_versions(pool: &DbPool) -> Result<Vec<i64>> {
    let rows = sqlx::query("SELECT version FROM _sessiond_migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .map_err(|e| SessiondError::Database {
            source: e,
            context: "Failed to get applied migrations".to_string(),
        })?;

    Ok(rows.into_iter().map(|row| row.get::<i64, _>("version")).collect())
}

/// Highest applied migration version, 0 when none
pub async fn get_migration_version(pool: &DbPool) -> Result<i64> {
    let applied = get_applied_migration_versions(pool).await?;
    Ok(applied.into_iter().max().unwrap_or(0))
}

fn extract_version_from_filename(filename: &str) -> Result<i64> {
    let version_str = filename.split('_').next().unwrap_or_default();

    version_str.parse::<i64>().map_err(|_| {
        SessiondError::validation(format!("Invalid version in migration filename: {}", filename))
    })
}

fn calculate_checksum(content: &str) -> Vec<u8> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish().to_le_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::storage::create_pool;

    #[test]
    fn test_extract_version_from_filename() {
        assert_eq!(
            extract_version_from_filename("20260101000000_create_sessions").unwrap(),
            20260101000000
        );
        assert!(extract_version_from_filename("invalid_filename").is_err());
    }

    #[test]
    fn test_calculate_checksum() {
        let a = calculate_checksum("CREATE TABLE t (id INTEGER);");
        let b = calculate_checksum("CREATE TABLE t (id INTEGER);");
        let c = calculate_checksum("CREATE TABLE u (id INTEGER);");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let config = DatabaseConfig { auto_migrate: false, ..DatabaseConfig::in_memory() };
        let pool = create_pool(&config).await.unwrap();
        assert_eq!(get_migration_version(&pool).await.unwrap_or_default(), 0);

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        assert_eq!(get_migration_version(&pool).await.unwrap(), 20260101000000);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sessiond_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
