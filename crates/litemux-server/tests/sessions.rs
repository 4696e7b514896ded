//! Session and store integration tests.
//!
//! These drive the public API the protocol layer uses, end to end against
//! real files: default-database sharing, lazy creation, counters, and
//! concurrent sessions over one logical database.

use std::sync::Arc;

use litemux_server::{CellValue, Session, StatementReply, Store};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> Arc<Store> {
    Arc::new(Store::open(dir.path(), "cache=shared").unwrap())
}

#[test]
fn unselected_clients_share_the_default_database() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    // First client never selects a database.
    let mut first = Session::new(store.clone()).unwrap();
    first.handle_statement("CREATE TABLE t (a INT)").unwrap();

    // A second, fresh connection sees the same schema.
    let mut second = Session::new(store).unwrap();
    let reply = second.handle_statement("SHOW TABLES").unwrap();
    let tables = reply.as_rows().unwrap();
    assert_eq!(tables.rows, vec![vec![CellValue::Text("t".to_string())]]);

    assert!(dir.path().join("__default__.db").exists());
}

#[test]
fn selecting_a_new_database_creates_its_file() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut session = Session::new(store).unwrap();
    session.select_database("orders").unwrap();
    assert!(dir.path().join("orders.db").exists());

    session
        .handle_statement("CREATE TABLE items (id INTEGER PRIMARY KEY, sku TEXT)")
        .unwrap();
    let reply = session
        .handle_statement("INSERT INTO items (sku) VALUES ('ab-1')")
        .unwrap();

    match reply {
        StatementReply::Ok {
            rows_affected,
            last_insert_id,
        } => {
            assert_eq!(rows_affected, 1);
            assert_eq!(last_insert_id, 1);
        }
        StatementReply::Rows(_) => panic!("expected write-path reply"),
    }
}

#[test]
fn databases_survive_a_store_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store = open_store(&dir);
        let mut session = Session::new(store).unwrap();
        session.select_database("ledger").unwrap();
        session
            .handle_statement("CREATE TABLE entries (amount INTEGER)")
            .unwrap();
        session
            .handle_statement("INSERT INTO entries VALUES (12)")
            .unwrap();
    }

    // A new store scans the directory and reopens ledger.db eagerly.
    let store = open_store(&dir);
    let mut session = Session::new(store).unwrap();
    session.select_database("LEDGER").unwrap();
    let reply = session
        .handle_statement("SELECT amount FROM entries")
        .unwrap();
    assert_eq!(
        reply.as_rows().unwrap().rows,
        vec![vec![CellValue::Int(12)]]
    );
}

#[test]
fn concurrent_sessions_write_to_one_database() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut setup = Session::new(store.clone()).unwrap();
    setup.select_database("shared").unwrap();
    setup
        .handle_statement("CREATE TABLE hits (worker INTEGER)")
        .unwrap();

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let store = store.clone();
            std::thread::spawn(move || {
                let mut session = Session::new(store).unwrap();
                session.select_database("shared").unwrap();
                for _ in 0..10 {
                    session
                        .handle_statement(&format!("INSERT INTO hits VALUES ({worker})"))
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let reply = setup
        .handle_statement("SELECT count(*) AS n FROM hits")
        .unwrap();
    let result_set = reply.as_rows().unwrap();
    assert_eq!(result_set.fields, vec!["n"]);
    assert_eq!(result_set.rows, vec![vec![CellValue::Int(40)]]);
}
