use super::*;
use crate::condition::{column, expr};
use crate::ident::Ident;
use crate::value::{ArgBuilder, Args};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn template<'a>(common: &'a Common, key: &str) -> &'a Template {
    common.cache.get(key).expect("template for key")
}

#[test]
fn test_simple_select() {
    let mut sel = Select::new(["a", "b"]);
    sel.from("c").where_([column("id").equal().int(1)]);
    let (sql, args) = sel.to_sql().unwrap();
    assert_eq!(sql, "SELECT `a`, `b` FROM `c` WHERE (`id` = ?)");
    assert_eq!(args, vec![Value::Int(1)]);
}

#[test]
fn test_empty_in_list_is_passed_through() {
    let mut sel = Select::new(["a"]);
    sel.from("t").where_([column("id").is_in().ints(Vec::<i64>::new())]);
    let (sql, args) = sel.to_sql().unwrap();
    assert_eq!(sql, "SELECT `a` FROM `t` WHERE (`id` IN (");
    assert!(args.is_empty());
}

#[test]
fn test_select_without_columns_is_star() {
    let mut sel = Select::new(Vec::<String>::new());
    sel.from("t");
    assert_eq!(sel.to_sql().unwrap().0, "SELECT * FROM `t`");
}

#[test]
fn test_select_all_clauses() {
    let mut sel = Select::new(["p.id", "p.sku"]);
    sel.distinct()
        .from_as("products", "p")
        .join(
            Ident::new("stock").alias("s"),
            [column("s.product_id").column("p.id")],
        )
        .where_([column("p.active").bool(true)])
        .group_by(["p.sku"])
        .having([expr("COUNT(*) > ?").int(1)])
        .order_by(["p.sku DESC"])
        .limit(10)
        .offset(20);
    let (sql, args) = sel.to_sql().unwrap();
    assert_eq!(
        sql,
        "SELECT DISTINCT `p`.`id`, `p`.`sku` FROM `products` AS `p` \
         INNER JOIN `stock` AS `s` ON (`s`.`product_id` = `p`.`id`) \
         WHERE (`p`.`active` = ?) GROUP BY `p`.`sku` HAVING (COUNT(*) > ?) \
         ORDER BY `p`.`sku` DESC LIMIT 10 OFFSET 20"
    );
    assert_eq!(args, vec![Value::Bool(true), Value::Int(1)]);
}

#[test]
fn test_join_using_and_lock() {
    let mut sel = Select::new(["a"]);
    sel.from("t1").left_join_using("t2", ["id", "store_id"]).lock_in_share_mode();
    assert_eq!(
        sel.to_sql().unwrap().0,
        "SELECT `a` FROM `t1` LEFT JOIN `t2` USING (`id`,`store_id`) LOCK IN SHARE MODE"
    );
}

#[test]
fn test_paginate() {
    let mut sel = Select::new(["a"]);
    sel.from("t").paginate(3, 25).for_update();
    assert_eq!(
        sel.to_sql().unwrap().0,
        "SELECT `a` FROM `t` LIMIT 25 OFFSET 50 FOR UPDATE"
    );

    sel.paginate(0, 25);
    assert_eq!(
        sel.to_sql().unwrap().0,
        "SELECT `a` FROM `t` LIMIT 25 OFFSET 0 FOR UPDATE"
    );
}

#[test]
fn test_count_and_restore_columns() {
    let mut sel = Select::new(["a", "b"]);
    sel.from("t").count();
    assert_eq!(sel.to_sql().unwrap().0, "SELECT COUNT(*) AS `counted` FROM `t`");
    sel.count();
    sel.original_columns();
    assert_eq!(sel.to_sql().unwrap().0, "SELECT `a`, `b` FROM `t`");
}

#[test]
fn test_column_aliases() {
    let mut sel = Select::default();
    sel.add_columns_aliases(["e.price", "final_price", "t.qty", "qty"])
        .from_as("catalog_product_entity", "e");
    assert_eq!(
        sel.to_sql().unwrap().0,
        "SELECT `e`.`price` AS `final_price`, `t`.`qty` AS `qty` FROM `catalog_product_entity` AS `e`"
    );

    let mut odd = Select::default();
    odd.add_columns_aliases(["e.price", "final_price", "dangling"]).from("t");
    assert!(odd.to_sql().unwrap_err().is_mismatch());
}

#[test]
fn test_unsafe_mode_keeps_expressions() {
    let mut sel = Select::default();
    sel.unsafe_mode().add_columns(["COUNT(*)", "id"]).from("t");
    assert_eq!(sel.to_sql().unwrap().0, "SELECT COUNT(*), `id` FROM `t`");

    let mut strict = Select::new(["COUNT(*)"]);
    strict.from("t");
    assert_eq!(strict.to_sql().unwrap().0, "SELECT `COUNT(*)` FROM `t`");
}

#[test]
fn test_expression_columns() {
    let mut sub = Select::new(["name"]);
    sub.from("stores").where_([column("id").int(3)]);
    let mut sel = Select::new(["id"]);
    sel.add_columns_conditions([
        expr("COUNT(*)").alias("total"),
        expr("").sub(sub).alias("store"),
    ])
    .from("t");
    let (sql, args) = sel.to_sql().unwrap();
    assert_eq!(
        sql,
        "SELECT `id`, COUNT(*) AS `total`, (SELECT `name` FROM `stores` WHERE (`id` = ?)) AS `store` FROM `t`"
    );
    assert_eq!(args, vec![Value::Int(3)]);
}

#[test]
fn test_exists_sub_select() {
    let mut sub = Select::new(["entity_id"]);
    sub.from("catalog_category_product")
        .where_([column("category_id").int(234)]);
    let mut sel = Select::new(["sku", "type_id"]);
    sel.from("catalog_product_entity")
        .where_([column("entity_id").exists().sub(sub)]);
    let (sql, args) = sel.to_sql().unwrap();
    assert_eq!(
        sql,
        "SELECT `sku`, `type_id` FROM `catalog_product_entity` WHERE (`entity_id` EXISTS \
         (SELECT `entity_id` FROM `catalog_category_product` WHERE (`category_id` = ?)))"
    );
    assert_eq!(args, vec![Value::Int(234)]);
}

#[test]
fn test_derived_table() {
    let mut inner = Select::new(["id"]);
    inner.from("t").where_([column("x").int(1)]);
    let mut sel = Select::with_derived_table(inner.clone(), "d");
    sel.add_columns(["d.id"]);
    assert_eq!(
        sel.to_sql().unwrap().0,
        "SELECT `d`.`id` FROM (SELECT `id` FROM `t` WHERE (`x` = ?)) AS `d`"
    );

    let mut unnamed = Select::with_derived_table(inner, "");
    assert!(unnamed.to_sql().unwrap_err().is_not_valid());
}

#[test]
fn test_order_by_null() {
    let mut sel = Select::new(["a"]);
    sel.from("t").group_by(["a"]).order_by_deactivated();
    assert_eq!(
        sel.to_sql().unwrap().0,
        "SELECT `a` FROM `t` GROUP BY `a` ORDER BY NULL"
    );
}

#[test]
fn test_placeholders_register_columns() {
    let mut sel = Select::new(["a"]);
    sel.from("t").where_([
        column("id").placeholder(),
        column("t.name").placeholder(),
        column("store").named_placeholder(),
        column("sku").is_in().placeholder(),
    ]);
    let (sql, args) = sel.to_sql().unwrap();
    assert_eq!(
        sql,
        "SELECT `a` FROM `t` WHERE (`id` = ?) AND (`t`.`name` = ?) AND (`store` = ?) AND (`sku` IN (?))"
    );
    assert!(args.is_empty());
    assert_eq!(
        template(&sel.common, "").qualified_columns(),
        vec!["id", "t.name", ":store", "sku"]
    );
}

#[test]
fn test_raw_named_placeholders_are_rewritten() {
    let mut sel = Select::new(["a"]);
    sel.from("t").where_([expr("a = :first AND b = ':literal'")]);
    let (sql, _) = sel.to_sql().unwrap();
    assert_eq!(sql, "SELECT `a` FROM `t` WHERE (a = ? AND b = ':literal')");
    assert_eq!(template(&sel.common, "").qualified_columns(), vec![":first"]);
}

#[test]
fn test_listeners_run_before_build() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let mut sel = Select::new(["a"]);
    sel.from("t")
        .listen(
            Listener::new("limit", move |s| {
                counter.fetch_add(1, Ordering::SeqCst);
                s.limit(5);
                ControlFlow::Continue(())
            })
            .once(),
        )
        .listen(Listener::new("stop", |_| ControlFlow::Break(())))
        .listen(Listener::new("skipped", |s| {
            s.distinct();
            ControlFlow::Continue(())
        }));

    assert_eq!(sel.to_sql().unwrap().0, "SELECT `a` FROM `t` LIMIT 5");
    assert_eq!(sel.to_sql().unwrap().0, "SELECT `a` FROM `t` LIMIT 5");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_build_cache_reuses_sql_text() {
    let mut sel = Select::new(["a"]);
    sel.from("t").build_cache().where_([column("id").int(1)]);
    let (first, _) = sel.to_sql().unwrap();

    sel.where_([column("b").int(2)]);
    let (second, args) = sel.to_sql().unwrap();
    assert_eq!(first, second);
    assert_eq!(args, vec![Value::Int(1), Value::Int(2)]);

    sel.with_cache_key("with_b");
    let (third, _) = sel.to_sql().unwrap();
    assert_eq!(third, "SELECT `a` FROM `t` WHERE (`id` = ?) AND (`b` = ?)");

    let cached = sel.cached_queries();
    assert_eq!(cached.len(), 2);
    assert_eq!(cached[0].0, "");
    assert_eq!(cached[1].0, "with_b");
}

#[test]
fn test_without_build_cache_sql_is_regenerated() {
    let mut sel = Select::new(["a"]);
    sel.from("t");
    sel.to_sql().unwrap();
    sel.where_([column("b").int(2)]);
    assert_eq!(sel.to_sql().unwrap().0, "SELECT `a` FROM `t` WHERE (`b` = ?)");
}

#[test]
fn test_insert_explicit_rows() {
    let mut ins = Insert::new("a");
    ins.add_columns(["b", "c"])
        .add_values(Args::new().int(1).str("x"))
        .add_values(Args::new().int(2).str("y"));
    let (sql, args) = ins.to_sql().unwrap();
    assert_eq!(sql, "INSERT INTO `a` (`b`,`c`) VALUES (?,?),(?,?)");
    assert_eq!(
        args,
        vec![
            Value::Int(1),
            Value::Str("x".into()),
            Value::Int(2),
            Value::Str("y".into())
        ]
    );
}

#[test]
fn test_insert_placeholder_rows() {
    let mut ins = Insert::new("a");
    ins.add_columns(["b", "c"]);
    assert_eq!(ins.to_sql().unwrap().0, "INSERT INTO `a` (`b`,`c`) VALUES (?,?)");
    assert_eq!(template(&ins.common, "").qualified_columns(), vec!["b", "c"]);

    ins.set_row_count(3);
    assert_eq!(
        ins.to_sql().unwrap().0,
        "INSERT INTO `a` (`b`,`c`) VALUES (?,?),(?,?),(?,?)"
    );
    let shape = template(&ins.common, "").insert.clone().unwrap();
    assert_eq!(shape.row_count, 3);
    assert!(!shape.explicit);
    assert_eq!(shape.row_slots, 0..6);
}

#[test]
fn test_insert_ignore_on_duplicate_key() {
    let mut ins = Insert::new("catalog_product_entity");
    ins.ignore()
        .add_columns(["sku", "qty"])
        .on_duplicate_key([column("sku").values(), column("qty").int(0)]);
    let (sql, args) = ins.to_sql().unwrap();
    assert_eq!(
        sql,
        "INSERT IGNORE INTO `catalog_product_entity` (`sku`,`qty`) VALUES (?,?) \
         ON DUPLICATE KEY UPDATE `sku`=VALUES(`sku`), `qty`=?"
    );
    assert_eq!(args, vec![Value::Int(0)]);
}

#[test]
fn test_replace_with_list_row() {
    let mut ins = Insert::new("a");
    ins.replace().add_values(Args::new().ints([1, 2]).str("z"));
    assert_eq!(ins.to_sql().unwrap().0, "REPLACE INTO `a` VALUES (?,?,?)");
}

#[test]
fn test_insert_from_select() {
    let mut sel = Select::new(["something_id", "user_id"]);
    sel.from("some_table")
        .where_([column("d").int(1), column("e").str("wat").or()]);
    let mut ins = Insert::new("tableA");
    ins.add_columns(["a", "b"]).from_select(sel);
    let (sql, args) = ins.to_sql().unwrap();
    assert_eq!(
        sql,
        "INSERT INTO `tableA` (`a`,`b`) SELECT `something_id`, `user_id` FROM `some_table` \
         WHERE (`d` = ?) OR (`e` = ?)"
    );
    assert_eq!(args, vec![Value::Int(1), Value::Str("wat".into())]);
    assert!(template(&ins.common, "").insert.is_none());
}

#[test]
fn test_insert_requires_table_and_columns() {
    assert!(Insert::default().to_sql().unwrap_err().is_empty());
    assert!(Insert::new("a").to_sql().unwrap_err().is_empty());
}

#[test]
fn test_update() {
    let mut upd = Update::new("a");
    upd.set([column("b").int(1), expr("c = c + 1")])
        .add_columns(["d"])
        .where_([column("id").int(9)])
        .order_by(["id"])
        .limit(10);
    let (sql, args) = upd.to_sql().unwrap();
    assert_eq!(
        sql,
        "UPDATE `a` SET `b`=?, c = c + 1, `d`=? WHERE (`id` = ?) ORDER BY `id` LIMIT 10"
    );
    assert_eq!(args, vec![Value::Int(1), Value::Int(9)]);
    assert_eq!(template(&upd.common, "").qualified_columns(), vec!["d"]);
}

#[test]
fn test_update_without_set_is_empty() {
    let mut upd = Update::new("a");
    upd.where_([column("id").int(1)]);
    assert!(upd.to_sql().unwrap_err().is_empty());
}

#[test]
fn test_delete() {
    let mut del = Delete::new("a");
    del.where_([column("b").int(1)]).order_by_desc(["id"]).limit(5);
    let (sql, args) = del.to_sql().unwrap();
    assert_eq!(sql, "DELETE FROM `a` WHERE (`b` = ?) ORDER BY `id` DESC LIMIT 5");
    assert_eq!(args, vec![Value::Int(1)]);
}

fn union_members() -> (Select, Select) {
    let mut s1 = Select::new(["a", "b"]);
    s1.from("tableAD").where_([column("a").like().str("T%")]);
    let mut s2 = Select::new(["a", "c"]);
    s2.from("tableAC")
        .where_([column("b").between().float64s([3.141, 6.2])]);
    (s1, s2)
}

#[test]
fn test_union_all() {
    let (s1, s2) = union_members();
    let mut u = Union::new([s1, s2]);
    u.all().order_by(["a"]);
    let (sql, args) = u.to_sql().unwrap();
    assert_eq!(
        sql,
        "(SELECT `a`, `b` FROM `tableAD` WHERE (`a` LIKE ?))\nUNION ALL\n\
         (SELECT `a`, `c` FROM `tableAC` WHERE (`b` BETWEEN ? AND ?)) ORDER BY `a`"
    );
    assert_eq!(
        args,
        vec![Value::Str("T%".into()), Value::Float(3.141), Value::Float(6.2)]
    );
}

#[test]
fn test_union_preserve_result_set() {
    let (s1, s2) = union_members();
    let mut u = Union::new([s1, s2]);
    u.preserve_result_set().order_by_desc(["a"]);
    let (sql, _) = u.to_sql().unwrap();
    assert_eq!(
        sql,
        "(SELECT `a`, `b`, 0 AS `_preserve_result_set` FROM `tableAD` WHERE (`a` LIKE ?))\nUNION\n\
         (SELECT `a`, `c`, 1 AS `_preserve_result_set` FROM `tableAC` WHERE (`b` BETWEEN ? AND ?)) \
         ORDER BY `_preserve_result_set`, `a` DESC"
    );

    // building twice must not add the column again
    let (again, _) = u.to_sql().unwrap();
    assert_eq!(sql, again);
}

#[test]
fn test_union_template() {
    let mut sel = Select::new(["t.value"]);
    sel.from("catalog_product_entity_{type}")
        .where_([column("entity_id").int(1561)]);
    let mut u = Union::template(sel);
    u.string_replace("{type}", ["varchar", "int"]).all();
    let (sql, args) = u.to_sql().unwrap();
    assert_eq!(
        sql,
        "(SELECT `t`.`value` FROM `catalog_product_entity_varchar` WHERE (`entity_id` = ?))\nUNION ALL\n\
         (SELECT `t`.`value` FROM `catalog_product_entity_int` WHERE (`entity_id` = ?))"
    );
    assert_eq!(args, vec![Value::Int(1561), Value::Int(1561)]);
    assert_eq!(template(&u.common, "").repeat, 2);
}

#[test]
fn test_union_template_unbalanced_replacements() {
    let mut u = Union::template(Select::new(["a"]));
    u.string_replace("{a}", ["x", "y"]).string_replace("{b}", ["z"]);
    assert!(u.to_sql().unwrap_err().is_mismatch());
}

#[test]
fn test_empty_union() {
    assert!(Union::default().to_sql().unwrap_err().is_empty());
}

fn select_all_from(table: &str) -> Select {
    let mut sel = Select::new(["*"]);
    sel.from(table);
    sel
}

#[test]
fn test_with_recursive_union() {
    let mut base = Select::default();
    base.unsafe_mode().add_columns(["1"]);
    let mut step = Select::default();
    step.unsafe_mode()
        .add_columns(["n+1"])
        .from("cte")
        .where_([column("n").less().int(5)]);
    let mut body = Union::new([base, step]);
    body.all();

    let mut with = With::new([Cte::new("cte").columns(["n"]).union(body)]);
    with.recursive().select(select_all_from("cte"));
    let (sql, args) = with.to_sql().unwrap();
    assert_eq!(
        sql,
        "WITH RECURSIVE `cte` (`n`) AS ((SELECT 1)\nUNION ALL\n(SELECT n+1 FROM `cte` WHERE (`n` < ?)))\nSELECT * FROM `cte`"
    );
    assert_eq!(args, vec![Value::Int(5)]);
    assert_eq!(with.statement_kind(), crate::monitor::QueryType::Select);
}

#[test]
fn test_with_recursive_requires_union_body() {
    let mut with = With::new([Cte::new("cte").columns(["n"]).select(select_all_from("t"))]);
    with.recursive().select(select_all_from("cte"));
    assert!(with.to_sql().unwrap_err().is_not_valid());
}

#[test]
fn test_with_multiple_ctes() {
    let mut first = Select::new(["a"]);
    first.from("t1");
    let mut with = With::new([
        Cte::new("sel").select(first),
        Cte::new("sel2").select(select_all_from("t2")),
    ]);
    with.select(select_all_from("sel"));
    assert_eq!(
        with.to_sql().unwrap().0,
        "WITH `sel` AS (SELECT `a` FROM `t1`),\n`sel2` AS (SELECT * FROM `t2`)\nSELECT * FROM `sel`"
    );

    let mut del = Delete::new("t1");
    del.where_([column("id").is_in().expr("(SELECT `a` FROM `sel`)")]);
    with.delete(del);
    assert_eq!(with.statement_kind(), crate::monitor::QueryType::Delete);
    assert!(with.to_sql().unwrap().0.ends_with(
        "\nDELETE FROM `t1` WHERE (`id` IN (SELECT `a` FROM `sel`))"
    ));
}

#[test]
fn test_with_requires_body_and_terminal() {
    let mut with = With::new([Cte::new("x")]);
    with.select(select_all_from("x"));
    assert!(with.to_sql().unwrap_err().is_empty());

    let mut with = With::new([Cte::new("x").select(select_all_from("t"))]);
    assert!(with.to_sql().unwrap_err().is_empty());

    let mut with = With::default();
    with.select(select_all_from("t"));
    assert!(with.to_sql().unwrap_err().is_empty());
}
