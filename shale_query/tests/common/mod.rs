#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use stratum::config::DbConfig;
use stratum::db::Database;
use stratum::schema::{FieldDef, TupleDesc};
use stratum::transaction::TransactionId;
use stratum::tuple::Tuple;
use stratum::types::{DataType, Value};

use shale_query::executor::{Operator, SeqScan};

/// A fresh engine over a scratch directory. The directory handle keeps the
/// table files alive for the duration of the test.
pub struct TestDb {
    pub dir: TempDir,
    pub db: Database,
}

pub fn setup(config: DbConfig) -> TestDb {
    let dir = tempfile::tempdir().expect("scratch dir");
    let db = Database::new(config).expect("engine construction");
    TestDb { dir, db }
}

pub fn setup_default() -> TestDb {
    setup(DbConfig::default())
}

/// `(a INT, b TEXT)`, the shape most scenarios use.
pub fn int_text_desc() -> Arc<TupleDesc> {
    Arc::new(
        TupleDesc::new(vec![
            FieldDef::named(DataType::Int, "a"),
            FieldDef::named(DataType::Text, "b"),
        ])
        .expect("two-field schema"),
    )
}

/// `(v INT)`, small enough for many tuples per tiny page.
pub fn int_desc() -> Arc<TupleDesc> {
    Arc::new(TupleDesc::new(vec![FieldDef::named(DataType::Int, "v")]).expect("one-field schema"))
}

/// `(g INT, v INT)` for the aggregate scenarios.
pub fn two_int_desc() -> Arc<TupleDesc> {
    Arc::new(
        TupleDesc::new(vec![
            FieldDef::named(DataType::Int, "g"),
            FieldDef::named(DataType::Int, "v"),
        ])
        .expect("two-field schema"),
    )
}

pub fn create_table(harness: &TestDb, name: &str, desc: Arc<TupleDesc>) -> i32 {
    let path = harness.dir.path().join(format!("{}.dat", name));
    harness
        .db
        .create_table(&path, desc, name)
        .expect("table creation")
        .table_id()
}

pub fn insert_row(
    harness: &TestDb,
    tid: TransactionId,
    table_id: i32,
    values: Vec<Value>,
) {
    let desc = harness
        .db
        .catalog()
        .tuple_desc(table_id)
        .expect("table registered");
    let tuple = Tuple::from_values(desc, values).expect("row matches schema");
    harness
        .db
        .buffer_pool()
        .insert_tuple(tid, table_id, tuple)
        .expect("insert");
}

pub fn scan_table(harness: &TestDb, tid: TransactionId, table_id: i32) -> Vec<Tuple> {
    let mut scan = SeqScan::new(
        Arc::clone(harness.db.buffer_pool()),
        harness.db.catalog(),
        tid,
        table_id,
        "",
    )
    .expect("scan construction");
    drain(&mut scan)
}

pub fn drain(op: &mut dyn Operator) -> Vec<Tuple> {
    let mut out = Vec::new();
    op.open().expect("operator open");
    while op.has_next().expect("has_next") {
        out.push(op.next().expect("next"));
    }
    op.close();
    out
}

pub fn int_at(tuple: &Tuple, index: usize) -> i32 {
    match tuple.value(index).expect("field set") {
        Value::Int(v) => *v,
        other => panic!("expected int field, found {:?}", other),
    }
}

pub fn text_at(tuple: &Tuple, index: usize) -> String {
    match tuple.value(index).expect("field set") {
        Value::Text(s) => s.clone(),
        other => panic!("expected text field, found {:?}", other),
    }
}
