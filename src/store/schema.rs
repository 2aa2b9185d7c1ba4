use anyhow::Result;
use rusqlite::{Connection, params};

pub const SCHEMA_VERSION: &str = "1";

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;

        CREATE TABLE IF NOT EXISTS meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- One denormalized row per recipe. `position` is catalog order and
        -- breaks ranking ties, so it must never be renumbered.
        CREATE TABLE IF NOT EXISTS recipes (
            position       INTEGER PRIMARY KEY,
            id             TEXT NOT NULL UNIQUE,
            name           TEXT NOT NULL,
            ingredients    TEXT NOT NULL,  -- JSON array of strings
            steps          TEXT NOT NULL,  -- JSON array of strings
            n_steps        INTEGER NOT NULL,
            n_ingredients  INTEGER NOT NULL,
            minutes        REAL NOT NULL,
            calories       REAL NOT NULL,
            total_fat      REAL NOT NULL,
            sugar          REAL NOT NULL,
            sodium         REAL NOT NULL,
            protein        REAL NOT NULL,
            is_vegetarian  INTEGER NOT NULL DEFAULT 0,
            is_vegan       INTEGER NOT NULL DEFAULT 0,
            is_gluten_free INTEGER NOT NULL DEFAULT 0,
            is_dairy_free  INTEGER NOT NULL DEFAULT 0,
            embedding      BLOB NOT NULL   -- little-endian f32
        );
    ")?;

    conn.execute(
        "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION],
    )?;

    Ok(())
}
