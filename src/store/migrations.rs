//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                customer TEXT NOT NULL,
                lines TEXT NOT NULL,
                dispatch_date TEXT NOT NULL,
                note TEXT NOT NULL DEFAULT '',
                manual_address TEXT NOT NULL DEFAULT '',
                address TEXT NOT NULL DEFAULT '',
                submitted_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_orders_submitted_by ON orders(submitted_by);

            CREATE TABLE IF NOT EXISTS catalog_items (
                position INTEGER PRIMARY KEY,
                code TEXT NOT NULL DEFAULT '',
                memo TEXT NOT NULL,
                alt_description TEXT NOT NULL DEFAULT '',
                full_name TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS address_entries (
                position INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                address TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        name: "route_sheet",
        sql: r#"
            CREATE TABLE IF NOT EXISTS routes (
                order_id INTEGER PRIMARY KEY,
                customer TEXT NOT NULL,
                address TEXT NOT NULL DEFAULT '',
                notes TEXT NOT NULL,
                seller TEXT NOT NULL,
                dispatch_date TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_routes_dispatch_date ON routes(dispatch_date);

            INSERT OR IGNORE INTO routes
                (order_id, customer, address, notes, seller, dispatch_date, updated_at)
            SELECT o.id, o.customer, o.address,
                   COALESCE((SELECT group_concat(
                                 json_extract(l.value, '$.description') || ' (' ||
                                 json_extract(l.value, '$.quantity') || ')', ', ')
                             FROM json_each(o.lines) AS l), ''),
                   o.submitted_by, o.dispatch_date, o.updated_at
            FROM orders AS o;
        "#,
    },
];

/// Run all pending migrations against the given connection.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    tracing::info!(
        version = get_current_version(conn).await?,
        "Database migrations complete"
    );
    Ok(())
}

/// Highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row.get::<i64>(0).map_err(|e| {
            DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
        }),
        None => Ok(0),
    }
}

async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
