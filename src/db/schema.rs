// Database schema: table creation and migrations for the local store.
//
// The local store mirrors the hosted backend's relations (messages,
// replies, user_likes, tips, profiles) closely enough that both adapters
// serve the same ContentStore trait. Counter side effects the hosted
// backend performs server-side are emulated here with triggers.
//
// Timestamps are stored as INTEGER milliseconds since the Unix epoch so
// range filters compare numerically.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// Idempotent, safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            display_name TEXT,
            city TEXT,
            yallpoints INTEGER NOT NULL DEFAULT 250,
            yallpoints_earned INTEGER NOT NULL DEFAULT 0,
            tips_given INTEGER NOT NULL DEFAULT 0,
            tips_received INTEGER NOT NULL DEFAULT 0,
            account_type TEXT NOT NULL DEFAULT 'regular',  -- regular / business
            is_verified INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            content TEXT NOT NULL,
            image_url TEXT,
            location_name TEXT,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,       -- created_at + 24h
            likes INTEGER NOT NULL DEFAULT 0,  -- denormalized count of user_likes rows
            tips INTEGER NOT NULL DEFAULT 0,
            category TEXT NOT NULL,            -- live / hot / alerts / deals
            manual_flag TEXT,                  -- alert / business / NULL
            is_important INTEGER NOT NULL DEFAULT 0,
            is_business_post INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS replies (
            id TEXT PRIMARY KEY,
            message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_likes (
            user_id TEXT NOT NULL,
            message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, message_id)
        );

        CREATE TABLE IF NOT EXISTS tips (
            id TEXT PRIMARY KEY,
            from_user_id TEXT NOT NULL,
            to_user_id TEXT NOT NULL,
            message_id TEXT,                   -- NULL for profile tips
            amount INTEGER NOT NULL CHECK (amount > 0),
            is_profile_tip INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        -- Local accounts for the demo/offline identity provider
        CREATE TABLE IF NOT EXISTS accounts (
            email TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            password_salt TEXT NOT NULL,
            password_digest TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        -- Client-side flags (presence means set) and the persisted session
        CREATE TABLE IF NOT EXISTS client_flags (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_feed
            ON messages(expires_at, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_author
            ON messages(user_id);

        CREATE INDEX IF NOT EXISTS idx_replies_message
            ON replies(message_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_tips_parties
            ON tips(from_user_id, to_user_id);
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: tip counters maintained by the store, as the hosted
    // backend does with its own triggers.
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "
            CREATE TRIGGER IF NOT EXISTS trg_tips_counters
            AFTER INSERT ON tips
            BEGIN
                UPDATE messages SET tips = tips + 1 WHERE id = NEW.message_id;
                UPDATE profiles SET tips_given = tips_given + 1 WHERE id = NEW.from_user_id;
                UPDATE profiles SET tips_received = tips_received + 1 WHERE id = NEW.to_user_id;
            END;
            ",
        )
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_table_count() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        // schema_version, profiles, messages, replies, user_likes, tips,
        // accounts, client_flags = 8 tables
        assert_eq!(table_count(&conn).unwrap(), 8i64);
    }

    #[test]
    fn test_migrations_recorded_once() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let versions: Vec<i64> = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[test]
    fn test_tip_trigger_bumps_counters() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO profiles (id, username, created_at) VALUES ('a', 'a', 0), ('b', 'b', 0);
             INSERT INTO messages (id, user_id, content, created_at, expires_at, category)
                 VALUES ('m1', 'b', 'hi', 0, 1, 'live');
             INSERT INTO tips (id, from_user_id, to_user_id, message_id, amount, created_at)
                 VALUES ('t1', 'a', 'b', 'm1', 5, 0);",
        )
        .unwrap();

        let tips: i64 = conn
            .query_row("SELECT tips FROM messages WHERE id = 'm1'", [], |r| r.get(0))
            .unwrap();
        let given: i64 = conn
            .query_row("SELECT tips_given FROM profiles WHERE id = 'a'", [], |r| r.get(0))
            .unwrap();
        let received: i64 = conn
            .query_row("SELECT tips_received FROM profiles WHERE id = 'b'", [], |r| r.get(0))
            .unwrap();
        assert_eq!((tips, given, received), (1, 1, 1));
    }

    #[test]
    fn test_tip_amount_must_be_positive() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO tips (id, from_user_id, to_user_id, amount, created_at)
             VALUES ('t1', 'a', 'b', 0, 0)",
            [],
        );
        assert!(result.is_err());
    }
}
