#![allow(dead_code)]

use sqldbr::condition::column;
use sqldbr::value::flatten;
use sqldbr::{ColumnMap, ColumnMapper, Insert, Row, Update, Value};
use std::sync::Arc;

#[derive(ColumnMapper, Debug, Default, Clone, PartialEq)]
struct User {
    #[dbr(column = "user_id", last_insert_id)]
    id: i64,
    name: String,
    email: Option<String>,
    #[dbr(skip)]
    score: f64,
}

#[derive(ColumnMapper, Debug, Default)]
#[dbr(rename_all = "camelCase")]
struct AuditEntry {
    created_by: String,
    #[dbr(column = "ts")]
    created_at: Option<chrono::NaiveDateTime>,
}

fn user(id: i64, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
        ..User::default()
    }
}

#[test]
fn read_all_emits_mapped_fields_in_order() {
    let mut u = user(3, "ann");
    let mut cm = ColumnMap::read_all();
    u.map_columns(&mut cm).unwrap();
    assert_eq!(
        flatten(cm.args()),
        vec![Value::Int(3), Value::Str("ann".into()), Value::Null]
    );
}

#[test]
fn read_set_follows_requested_order() {
    let mut u = user(3, "ann");
    let mut cm = ColumnMap::read_set(["name", "user_id"]);
    u.map_columns(&mut cm).unwrap();
    assert_eq!(
        flatten(cm.args()),
        vec![Value::Str("ann".into()), Value::Int(3)]
    );
}

#[test]
fn skipped_and_unknown_columns_are_not_found() {
    let mut u = user(3, "ann");
    let err = u.map_columns(&mut ColumnMap::read_set(["score"])).unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("User"));
}

#[test]
fn scan_assigns_row_values() {
    let columns: Arc<[String]> = vec!["email".to_string(), "user_id".to_string()].into();
    let row = Row::new(columns, vec![Value::Str("a@b".into()), Value::Int(9)]).unwrap();
    let mut cm = ColumnMap::scan();
    cm.set_row(row);

    let mut u = User::default();
    u.map_columns(&mut cm).unwrap();
    assert_eq!(u.id, 9);
    assert_eq!(u.email.as_deref(), Some("a@b"));
    assert!(u.name.is_empty());
}

#[test]
fn last_insert_id_field_receives_id() {
    let mut u = User::default();
    u.assign_last_insert_id(41);
    assert_eq!(u.id, 41);

    // types without a marked field ignore the id
    let mut entry = AuditEntry::default();
    entry.assign_last_insert_id(5);
    assert!(entry.created_by.is_empty());
}

#[test]
fn rename_all_and_column_override() {
    let mut entry = AuditEntry {
        created_by: "ops".into(),
        created_at: None,
    };
    let mut cm = ColumnMap::read_set(["createdBy", "ts"]);
    entry.map_columns(&mut cm).unwrap();
    assert_eq!(
        flatten(cm.args()),
        vec![Value::Str("ops".into()), Value::Null]
    );
    assert!(
        entry
            .map_columns(&mut ColumnMap::read_set(["created_by"]))
            .unwrap_err()
            .is_not_found()
    );
}

#[test]
fn derived_records_bind_statements() {
    let mut upd = Update::new("user");
    upd.add_columns(["name", "email"])
        .where_([column("user_id").placeholder()]);
    let mut u = user(12, "bo");
    u.email = Some("bo@x".into());

    let mut dbr = upd.with_args();
    dbr.record("", &mut u);
    let (sql, args) = dbr.to_sql().unwrap();
    assert_eq!(sql, "UPDATE `user` SET `name`=?, `email`=? WHERE (`user_id` = ?)");
    assert_eq!(
        args,
        vec![
            Value::Str("bo".into()),
            Value::Str("bo@x".into()),
            Value::Int(12)
        ]
    );
}

#[test]
fn derived_collections_insert_many_rows() {
    let mut ins = Insert::new("user");
    ins.add_columns(["name", "email"]);
    let mut users = vec![user(0, "a"), user(0, "b"), user(0, "c")];

    let mut dbr = ins.with_args();
    dbr.record("", &mut users);
    let (sql, args) = dbr.to_sql().unwrap();
    assert_eq!(
        sql,
        "INSERT INTO `user` (`name`,`email`) VALUES (?,?),(?,?),(?,?)"
    );
    assert_eq!(args.len(), 6);
    assert_eq!(args[2], Value::Str("b".into()));
}
