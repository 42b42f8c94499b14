//! Opening connections with the sketch functions registered.
//!
//! # Side effects
//! - Each open emits `db_open` start/ok/error events with duration.

use super::DbResult;
use crate::extension::registrar::{load, SqliteHost};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::Instant;

/// Opens a SQLite database file and installs the sketch functions.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with("file", || Connection::open(path))
}

/// Opens an in-memory SQLite database and installs the sketch functions.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with("memory", Connection::open_in_memory)
}

fn open_with(
    mode: &'static str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    if let Err(err) = load(&SqliteHost::new(&conn)) {
        error!(
            "event=db_open module=db status=error mode={} duration_ms={} error_code=extension_load_failed error={}",
            mode,
            started_at.elapsed().as_millis(),
            err
        );
        return Err(err.into());
    }

    info!(
        "event=db_open module=db status=ok mode={} duration_ms={}",
        mode,
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::{open_db, open_db_in_memory};

    #[test]
    fn file_connection_has_sketch_functions() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_db(dir.path().join("sketches.sqlite3")).unwrap();
        let estimate: f64 = conn
            .query_row("SELECT sketch_aggregate(1)", [], |row| row.get(0))
            .unwrap();
        assert!(estimate > 0.5 && estimate < 1.5, "estimate={estimate}");
    }

    #[test]
    fn memory_connections_are_independent() {
        let first = open_db_in_memory().unwrap();
        let second = open_db_in_memory().unwrap();
        first.execute("CREATE TABLE only_here (x INT)", []).unwrap();
        assert!(second.execute("INSERT INTO only_here VALUES (1)", []).is_err());
    }
}
