use rusqlite::Connection;
use sqlite_hmh_core::{load_with_capabilities, CapabilitySet, ExtensionHost, SqliteHost};

fn connection_with(serialize: bool, union_arity2: bool) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    {
        let host = SqliteHost::new(&conn);
        let caps = CapabilitySet {
            supports_serialize: serialize,
            supports_union_arity2: union_arity2,
            ..CapabilitySet::for_host(host.version())
        };
        let report = load_with_capabilities(&host, caps).unwrap();
        assert!(report.is_registered("sketch_serialize", -1));
        assert!(report.is_registered("sketch_deserialize", 1));
        assert_eq!(report.is_registered("sketch_union", 2), union_arity2);
    }
    conn
}

fn call_error(conn: &Connection, sql: &str) -> String {
    let result: rusqlite::Result<rusqlite::types::Value> =
        conn.query_row(sql, [], |row| row.get(0));
    match result {
        Err(rusqlite::Error::SqliteFailure(_, Some(message))) => message,
        Err(other) => other.to_string(),
        Ok(value) => panic!("{sql} should fail, got {value:?}"),
    }
}

#[test]
fn serialization_stubs_fail_at_call_time() {
    let conn = connection_with(false, true);
    conn.execute_batch("CREATE TABLE foo (id INT); INSERT INTO foo VALUES (1);")
        .unwrap();

    for sql in [
        "SELECT sketch_zero()",
        "SELECT sketch_add(X'00', 1)",
        "SELECT sketch_serialize(id) FROM foo",
        "SELECT sketch_serialize(name) FROM sqlite_master WHERE 0",
        "SELECT sketch_deserialize(X'00')",
        "SELECT sketch_union(X'00')",
        "SELECT sketch_union(X'00', X'00')",
        "SELECT sketch_intersection(X'00', X'00')",
    ] {
        let message = call_error(&conn, sql);
        assert!(message.contains("`serialize`-feature"), "{sql}: {message}");
    }
}

#[test]
fn estimation_survives_without_serialization() {
    let conn = connection_with(false, false);
    conn.execute_batch("CREATE TABLE foo (id INT); INSERT INTO foo VALUES (1), (2), (2);")
        .unwrap();
    let r: f64 = conn
        .query_row("SELECT sketch_aggregate(id) FROM foo", [], |row| row.get(0))
        .unwrap();
    assert!(r > 1.8 && r < 2.2, "estimate={r}");
}

#[test]
fn pairwise_union_can_be_left_out() {
    let conn = connection_with(true, false);
    let message = call_error(&conn, "SELECT sketch_union(X'00', X'00')");
    assert!(message.contains("wrong number of arguments"), "{message}");
}
