// Database layer: the ContentStore seam and its local SQLite implementation.
//
// We use rusqlite with the "bundled" feature so there's no system SQLite
// dependency. The database file lives wherever YALLWALL_DB_PATH points
// (defaults to the platform data directory).

pub mod models;
pub mod queries;
pub mod realtime;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use realtime::{ChangeEvent, ChangeFeed};
pub use sqlite::SqliteStore;
pub use traits::ContentStore;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

/// Create the database file (and its directory) if needed, then migrate.
///
/// Called by `yallwall init` and `yallwall demo`.
pub fn initialize(db_path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(db_path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Could not create data directory {}", dir.display()))?;
    }
    connect(db_path)
}

/// Open an existing database. Every other command goes through here, so a
/// missing file points the user at `yallwall init`.
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        anyhow::bail!("No YallWall database at {db_path}. Run `yallwall init` first.");
    }
    connect(db_path)
}

fn connect(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Could not open YallWall database at {db_path}"))?;
    // WAL lets the prefs connection and the store connection share the file
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Also picks up migrations added since the file was created
    schema::create_tables(&conn)?;
    Ok(conn)
}
