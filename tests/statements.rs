use std::fs;

use minidb::{Database, DatabaseConfig, DbError, ExecuteResult, Row, Value};
use tempfile::TempDir;

fn open(dir: &TempDir) -> Database {
    Database::open(DatabaseConfig::new(dir.path())).unwrap()
}

fn rows(result: ExecuteResult) -> Vec<Row> {
    match result {
        ExecuteResult::Selected { rows, .. } => rows,
        other => panic!("expected rows, got {other:?}"),
    }
}

fn ids(rows: &[Row]) -> Vec<Value> {
    rows.iter()
        .map(|row| row.get("id").cloned().unwrap_or(Value::Null))
        .collect()
}

#[test]
fn test_full_statement_cycle() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);

    db.execute("CREATE TABLE users (id int, name str)").unwrap();
    let inserted = db
        .execute("INSERT INTO users (id, name) VALUES (1, 'Alice');")
        .unwrap();
    let ExecuteResult::Inserted { row, .. } = inserted else {
        panic!("expected an inserted row");
    };

    let selected = rows(db.execute("SELECT * FROM users WHERE id=1").unwrap());
    assert_eq!(selected, vec![row]);

    assert_eq!(
        db.execute("UPDATE users SET name='Bob' WHERE id=1")
            .unwrap()
            .count(),
        1
    );
    let selected = rows(db.execute("select name from users").unwrap());
    assert_eq!(selected[0].get("name"), Some(&Value::from("Bob")));

    assert_eq!(db.execute("DELETE FROM users WHERE id=1").unwrap().count(), 1);
    assert!(rows(db.execute("SELECT * FROM users").unwrap()).is_empty());
}

#[test]
fn test_rows_survive_reopen_and_rewrites() {
    let dir = TempDir::new().unwrap();
    {
        let mut db = open(&dir);
        db.execute("CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT, price FLOAT)")
            .unwrap();
        for i in 1..=6 {
            db.execute(&format!(
                "INSERT INTO items (id, label, price) VALUES ({i}, 'item {i}', {i}.5)"
            ))
            .unwrap();
        }
        db.execute("DELETE FROM items WHERE id > 4").unwrap();
        db.execute("UPDATE items SET id = 40 WHERE id = 4").unwrap();
    }

    let mut db = open(&dir);
    let all = rows(db.execute("SELECT * FROM items").unwrap());
    assert_eq!(
        ids(&all),
        vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(40)]
    );
    assert_eq!(all[1].get("price"), Some(&Value::Float(2.5)));

    assert!(db.select_by_key("items", Value::Int(4)).unwrap().is_none());
    assert!(db.select_by_key("items", Value::Int(40)).unwrap().is_some());
    assert!(db.select_by_key("items", Value::Int(5)).unwrap().is_none());

    // 5 was deleted, so its key is free again
    db.execute("INSERT INTO items (id, label) VALUES (5, 'again')")
        .unwrap();
    assert!(matches!(
        db.execute("INSERT INTO items (id, label) VALUES (40, 'clash')"),
        Err(DbError::DuplicateKey { .. })
    ));
}

#[test]
fn test_log_is_json_lines() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);

    db.execute("CREATE TABLE flags (id int, on bool, note str)").unwrap();
    db.execute("INSERT INTO flags (id, on, note) VALUES (1, 'yes', NULL)")
        .unwrap();
    db.execute("INSERT INTO flags (id, on, note) VALUES (2, 0, \"it's\")")
        .unwrap();

    let log = fs::read_to_string(dir.path().join("flags.jsonl")).unwrap();
    let lines: Vec<serde_json::Value> = log
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["on"], serde_json::Value::Bool(true));
    assert!(lines[0]["note"].is_null());
    assert_eq!(lines[1]["on"], serde_json::Value::Bool(false));

    let schema: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("metadata/flags.json")).unwrap())
            .unwrap();
    assert_eq!(schema["table_name"], "flags");
    assert_eq!(schema["columns"].as_array().unwrap().len(), 3);
}

#[test]
fn test_limit_and_conjunctions() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);

    db.execute("CREATE TABLE people (id int, age int, city str)").unwrap();
    let cities = ["Paris", "Lyon", "Paris", "Nice", "Paris"];
    for (i, city) in cities.iter().enumerate() {
        db.execute(&format!(
            "INSERT INTO people (id, age, city) VALUES ({}, {}, '{city}')",
            i + 1,
            20 + i * 5
        ))
        .unwrap();
    }

    let paris = rows(
        db.execute("SELECT id FROM people WHERE city = 'Paris' AND age >= 25")
            .unwrap(),
    );
    assert_eq!(ids(&paris), vec![Value::Int(3), Value::Int(5)]);

    let full = rows(db.execute("SELECT * FROM people").unwrap());
    let limited = rows(db.execute("SELECT * FROM people LIMIT 3").unwrap());
    assert_eq!(limited, full[..3].to_vec());
}

#[test]
fn test_no_match_leaves_log_untouched() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);

    db.execute("CREATE TABLE users (id int, name str)").unwrap();
    db.execute("INSERT INTO users (id, name) VALUES (1, 'Alice')")
        .unwrap();
    let path = dir.path().join("users.jsonl");
    let before = fs::read_to_string(&path).unwrap();

    assert_eq!(
        db.execute("UPDATE users SET name = 'Zed' WHERE id = 2")
            .unwrap()
            .count(),
        0
    );
    assert_eq!(db.execute("DELETE FROM users WHERE id = 2").unwrap().count(), 0);
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_show_and_describe() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);

    assert_eq!(db.execute("SHOW TABLES").unwrap(), ExecuteResult::Tables(vec![]));

    db.execute("CREATE TABLE b (x int)").unwrap();
    db.execute("CREATE TABLE a (y str, PRIMARY KEY (y))").unwrap();

    assert_eq!(
        db.execute("show tables").unwrap(),
        ExecuteResult::Tables(vec!["a".into(), "b".into()])
    );

    let ExecuteResult::Schema(schema) = db.execute("DESCRIBE a").unwrap() else {
        panic!("expected a schema");
    };
    assert_eq!(schema.primary_key.as_deref(), Some("y"));

    db.execute("DROP TABLE a").unwrap();
    assert!(matches!(db.execute("DESCRIBE a"), Err(DbError::NotFound(_))));
}

#[test]
fn test_numeric_edges_on_integer_columns() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);

    db.execute("CREATE TABLE nums (id int PRIMARY KEY)").unwrap();
    db.execute("INSERT INTO nums (id) VALUES (2)").unwrap();

    assert!(matches!(
        db.execute("INSERT INTO nums (id) VALUES (1e20)"),
        Err(DbError::Type { .. })
    ));

    assert!(rows(db.execute("SELECT * FROM nums WHERE id = 2.5").unwrap()).is_empty());
    assert_eq!(rows(db.execute("SELECT * FROM nums WHERE id < 2.5").unwrap()).len(), 1);
    assert_eq!(db.execute("DELETE FROM nums WHERE id = 2.5").unwrap().count(), 0);
    assert_eq!(db.get_table("nums").unwrap().count(), 1);
}
