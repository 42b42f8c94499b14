//! CLI smoke and demo entry point.
//!
//! # Responsibility
//! - Verify `sqlite_hmh_core` linkage and print the resolved capabilities.
//! - Run the estimate demos against an in-memory database.
//!
//! Usage: `sqlite_hmh_cli [ping|demo|demo-serialize] [--log-dir <abs path>] [--log-level <level>]`

use log::{error, info};
use rusqlite::{params, Connection};
use sqlite_hmh_core::db::open_db_in_memory;
use sqlite_hmh_core::{default_log_level, init_logging, load, SqliteHost};
use std::error::Error;
use std::process::ExitCode;
use std::time::Instant;

const DEMO_ROWS: i64 = 200_000;
const USERS_PER_BATCH: i64 = 50_000;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ping,
    Demo,
    DemoSerialize,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Demo => "demo",
            Self::DemoSerialize => "demo-serialize",
        }
    }
}

#[derive(Debug)]
struct Args {
    command: Command,
    log_dir: Option<String>,
    log_level: Option<String>,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut args = Args {
        command: Command::Ping,
        log_dir: None,
        log_level: None,
    };
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "ping" => args.command = Command::Ping,
            "demo" => args.command = Command::Demo,
            "demo-serialize" => args.command = Command::DemoSerialize,
            "--log-dir" => {
                args.log_dir = Some(raw.next().ok_or("--log-dir needs a value")?);
            }
            "--log-level" => {
                args.log_level = Some(raw.next().ok_or("--log-level needs a value")?);
            }
            other => return Err(format!("unknown argument `{other}`")),
        }
    }
    Ok(args)
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            eprintln!(
                "usage: sqlite_hmh_cli [ping|demo|demo-serialize] [--log-dir <abs path>] [--log-level <level>]"
            );
            return ExitCode::from(2);
        }
    };

    if let Some(log_dir) = args.log_dir.as_deref() {
        let level = args.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let command = args.command.name();
    let started_at = Instant::now();
    info!("event=cli_command module=cli status=start command={command}");
    let result = match args.command {
        Command::Ping => ping(),
        Command::Demo => demo(),
        Command::DemoSerialize => demo_serialize(),
    };
    match result {
        Ok(()) => {
            info!(
                "event=cli_command module=cli status=ok command={} duration_ms={}",
                command,
                started_at.elapsed().as_millis()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(
                "event=cli_command module=cli status=error command={} duration_ms={} error={}",
                command,
                started_at.elapsed().as_millis(),
                err
            );
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn ping() -> CliResult {
    let conn = Connection::open_in_memory()?;
    let report = load(&SqliteHost::new(&conn))?;
    println!("sqlite_hmh_core version={}", sqlite_hmh_core::core_version());
    println!("sqlite version={}", rusqlite::version());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn timed<T>(f: impl FnOnce() -> rusqlite::Result<T>) -> rusqlite::Result<(T, f64)> {
    let started_at = Instant::now();
    let value = f()?;
    Ok((value, started_at.elapsed().as_secs_f64() * 1000.0))
}

/// Exact `COUNT(DISTINCT)` against `sketch_aggregate` on the same rows.
fn demo() -> CliResult {
    let mut conn = open_db_in_memory()?;
    conn.execute(
        "CREATE TABLE foobar (foo INT NOT NULL, bar INT NOT NULL)",
        [],
    )?;
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare("INSERT INTO foobar (foo, bar) VALUES (?1, ?2)")?;
        for i in 0..DEMO_ROWS {
            stmt.execute(params![i % 1231, i % 1409])?;
        }
    }
    tx.commit()?;

    let (exact, exact_ms) = timed(|| {
        conn.query_row(
            "SELECT COUNT(*) FROM (SELECT DISTINCT foo, bar FROM foobar)",
            [],
            |row| row.get::<_, i64>(0),
        )
    })?;
    let (approx, approx_ms) = timed(|| {
        conn.query_row("SELECT sketch_aggregate(foo, bar) FROM foobar", [], |row| {
            row.get::<_, f64>(0)
        })
    })?;

    println!("{exact} unique rows in {exact_ms:.2}ms via COUNT()");
    println!(
        "{:.0} unique rows ({:.2}% error) in {:.2}ms ({:.1}x) via sketch_aggregate()",
        approx,
        (1.0 - approx / exact as f64) * 100.0,
        approx_ms,
        exact_ms / approx_ms
    );
    Ok(())
}

fn insert_users(conn: &mut Connection, batch: i64) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare("INSERT INTO users (day, ip) VALUES (?1, ?2)")?;
        for i in 0..USERS_PER_BATCH {
            let n = batch * USERS_PER_BATCH + i;
            let day = (n * 7) % 1095;
            let host = (n * 7919) % 60_000;
            let ip = [10u8, (host >> 8) as u8, (host & 0xff) as u8, 1];
            stmt.execute(params![day, &ip[..]])?;
        }
    }
    tx.commit()
}

fn refresh_stats(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE stats
         SET data = sketch_union(
             data,
             (SELECT sketch_serialize(users.day, users.ip) FROM users WHERE users.day >= 730)
         )
         WHERE stats.name = 'users'",
        [],
    )
}

fn stored_count(conn: &Connection) -> rusqlite::Result<f64> {
    conn.query_row(
        "SELECT sketch_deserialize(data) FROM stats WHERE name = 'users'",
        [],
        |row| row.get(0),
    )
}

/// A stored sketch kept current with `sketch_union`, plus an overlap query.
fn demo_serialize() -> CliResult {
    let mut conn = open_db_in_memory()?;
    conn.execute_batch(
        "CREATE TABLE users (day INT NOT NULL, ip BLOB NOT NULL);
         CREATE TABLE stats (name TEXT PRIMARY KEY, data BLOB);
         INSERT INTO stats (name, data) VALUES ('users', sketch_zero());",
    )?;

    insert_users(&mut conn, 0)?;
    refresh_stats(&conn)?;
    println!("Current count is {:.0}", stored_count(&conn)?);

    insert_users(&mut conn, 1)?;
    refresh_stats(&conn)?;
    println!("Count is now {:.0}", stored_count(&conn)?);

    conn.execute(
        "UPDATE stats SET data = sketch_add(data, ?1, ?2) WHERE name = 'users'",
        params![1095, &[192u8, 168, 0, 1][..]],
    )?;
    println!("After one more visit: {:.0}", stored_count(&conn)?);

    let (approx, approx_ms) = timed(|| {
        conn.query_row(
            "SELECT sketch_intersection(
                 (SELECT sketch_serialize(ip) FROM users WHERE day >= 365),
                 (SELECT sketch_serialize(ip) FROM users WHERE day < 365)
             )",
            [],
            |row| row.get::<_, f64>(0),
        )
    })?;
    println!("Recurring users, approx: {approx:.0}, in {approx_ms:.2}ms");

    let (exact, exact_ms) = timed(|| {
        conn.query_row(
            "SELECT COUNT(DISTINCT users.ip)
             FROM users
             WHERE users.day >= 365
             AND users.ip IN (SELECT u.ip FROM users AS u WHERE u.day < 365)",
            [],
            |row| row.get::<_, i64>(0),
        )
    })?;
    println!("Recurring users, exact: {exact}, in {exact_ms:.2}ms");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_args, Command};

    fn args(values: &[&str]) -> Result<super::Args, String> {
        parse_args(values.iter().map(|value| value.to_string()))
    }

    #[test]
    fn defaults_to_ping() {
        let parsed = args(&[]).unwrap();
        assert_eq!(parsed.command, Command::Ping);
        assert!(parsed.log_dir.is_none());
    }

    #[test]
    fn parses_command_and_log_options() {
        let parsed = args(&["demo-serialize", "--log-dir", "/tmp/hmh", "--log-level", "debug"])
            .unwrap();
        assert_eq!(parsed.command, Command::DemoSerialize);
        assert_eq!(parsed.command.name(), "demo-serialize");
        assert_eq!(parsed.log_dir.as_deref(), Some("/tmp/hmh"));
        assert_eq!(parsed.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn rejects_unknown_arguments_and_missing_values() {
        assert!(args(&["--verbose"]).is_err());
        assert!(args(&["--log-dir"]).is_err());
    }
}
