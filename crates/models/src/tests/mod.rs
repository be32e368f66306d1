
use std::time::Duration;

use configs::DatabaseConfig;
use migration::MigratorTrait;
use sea_orm::DatabaseConnection;

/// Connect and migrate, or `None` when the database is unavailable or
/// `SKIP_DB_TESTS` is set.
pub async fn try_db() -> Option<DatabaseConnection> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return None;
    }
    let cfg = DatabaseConfig {
        url: crate::db::DATABASE_URL.clone(),
        min_connections: 1,
        max_connections: 5,
        connect_timeout_secs: 2,
        acquire_timeout_secs: 2,
        ..DatabaseConfig::default()
    };
    let db = match tokio::time::timeout(Duration::from_secs(5), crate::db::connect_with_config(&cfg)).await {
        Ok(Ok(db)) => db,
        Ok(Err(e)) => {
            eprintln!("skip: cannot connect to db: {}", e);
            return None;
        }
        Err(_) => {
            eprintln!("skip: db connect timed out");
            return None;
        }
    };
    if let Err(e) = migration::Migrator::up(&db, None).await {
        eprintln!("skip: migrate up failed: {}", e);
        return None;
    }
    Some(db)
}
