//! Versioned schema for the device-local database

use libsql::Connection;

use crate::error::Result;

/// Ordered schema steps; each runs once, inside its own transaction.
const MIGRATIONS: &[(i32, &[&str])] = &[(
    1,
    &[
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        // One JSON value per namespace key
        "CREATE TABLE IF NOT EXISTS local_records (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    ],
)];

pub async fn run(conn: &Connection) -> Result<()> {
    let applied = schema_version(conn).await?;
    for (version, statements) in MIGRATIONS.iter().filter(|(version, _)| *version > applied) {
        apply(conn, *version, statements).await?;
        tracing::debug!("Local schema now at v{}", version);
    }
    Ok(())
}

/// Highest applied version, 0 for a fresh file.
async fn schema_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            (),
        )
        .await?;
    let tracked = match rows.next().await? {
        Some(row) => row.get::<i64>(0)? > 0,
        None => false,
    };
    if !tracked {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT IFNULL(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(0),
    }
}

async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN", ()).await?;
    for statement in statements {
        if let Err(error) = conn.execute(statement, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(error.into());
        }
    }
    if let Err(error) = conn
        .execute("INSERT INTO schema_version (version) VALUES (?1)", libsql::params![version])
        .await
    {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(error.into());
    }
    conn.execute("COMMIT", ()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    fn latest() -> i32 {
        MIGRATIONS.last().map_or(0, |(version, _)| *version)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rerunning_migrations_is_a_no_op() {
        let db = Database::open_in_memory().await.unwrap();
        run(db.connection()).await.unwrap();
        run(db.connection()).await.unwrap();
        assert_eq!(schema_version(db.connection()).await.unwrap(), latest());
    }

    #[test]
    fn migration_versions_increase() {
        assert!(MIGRATIONS.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }
}
