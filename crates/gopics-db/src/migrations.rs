use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Store: running migration v1 (hashes + ordered indexes)");
        conn.execute_batch(
            "
            BEGIN;

            -- key -> {field -> value}
            CREATE TABLE hashes (
                key     TEXT NOT NULL,
                field   TEXT NOT NULL,
                value   BLOB NOT NULL,
                PRIMARY KEY (key, field)
            ) WITHOUT ROWID;

            -- key -> {member -> score}
            CREATE TABLE zsets (
                key     TEXT NOT NULL,
                member  TEXT NOT NULL,
                score   INTEGER NOT NULL,
                PRIMARY KEY (key, member)
            ) WITHOUT ROWID;

            CREATE INDEX idx_zsets_score
                ON zsets(key, score DESC, member DESC);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Store migrations complete");
    Ok(())
}
