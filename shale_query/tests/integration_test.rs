use std::sync::Arc;

use stratum::config::DbConfig;
use stratum::types::Value;

use shale_query::executor::{Delete, Filter, Insert, Join, Operator, SeqScan};
use shale_query::predicate::{JoinPredicate, Op, Predicate};

mod common;
use common::*;

fn seq_scan(harness: &TestDb, tid: stratum::TransactionId, table_id: i32) -> SeqScan {
    SeqScan::new(
        Arc::clone(harness.db.buffer_pool()),
        harness.db.catalog(),
        tid,
        table_id,
        "",
    )
    .expect("scan construction")
}

#[test]
fn heap_round_trip_with_delete() {
    let harness = setup_default();
    let table = create_table(&harness, "t", int_text_desc());

    let t1 = harness.db.begin();
    for (a, b) in [(1, "x"), (2, "yy"), (3, "zzz")] {
        insert_row(
            &harness,
            t1,
            table,
            vec![Value::Int(a), Value::text(b).unwrap()],
        );
    }
    harness.db.commit(t1).unwrap();

    let t2 = harness.db.begin();
    let rows = scan_table(&harness, t2, table);
    let seen: Vec<_> = rows.iter().map(|t| (int_at(t, 0), text_at(t, 1))).collect();
    assert_eq!(
        seen,
        vec![
            (1, "x".to_string()),
            (2, "yy".to_string()),
            (3, "zzz".to_string())
        ]
    );

    // Delete the a=2 row through the operator pipeline.
    let source = Filter::new(
        Predicate::new(0, Op::Eq, Value::Int(2)),
        Box::new(seq_scan(&harness, t2, table)),
    );
    let mut delete = Delete::new(
        Arc::clone(harness.db.buffer_pool()),
        t2,
        Box::new(source),
    );
    let result = drain(&mut delete);
    assert_eq!(result.len(), 1);
    assert_eq!(int_at(&result[0], 0), 1);
    harness.db.commit(t2).unwrap();

    let t3 = harness.db.begin();
    let rows = scan_table(&harness, t3, table);
    let seen: Vec<_> = rows.iter().map(|t| (int_at(t, 0), text_at(t, 1))).collect();
    assert_eq!(seen, vec![(1, "x".to_string()), (3, "zzz".to_string())]);
    harness.db.commit(t3).unwrap();
}

#[test]
fn tuples_survive_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.dat");

    {
        let db = stratum::Database::new(DbConfig::default()).unwrap();
        db.create_table(&path, int_text_desc(), "t").unwrap();
        let harness = TestDb { dir, db };
        let table = harness
            .db
            .catalog()
            .table_ids()
            .first()
            .copied()
            .unwrap();
        let tid = harness.db.begin();
        insert_row(
            &harness,
            tid,
            table,
            vec![Value::Int(7), Value::text("persisted").unwrap()],
        );
        harness.db.commit(tid).unwrap();

        // Fresh engine, same file: the committed row must still be there.
        let db = stratum::Database::new(DbConfig::default()).unwrap();
        let file = db.create_table(&path, int_text_desc(), "t").unwrap();
        let reopened = TestDb {
            dir: harness.dir,
            db,
        };
        let tid = reopened.db.begin();
        let rows = scan_table(&reopened, tid, file.table_id());
        assert_eq!(rows.len(), 1);
        assert_eq!(int_at(&rows[0], 0), 7);
        assert_eq!(text_at(&rows[0], 1), "persisted");
    }
}

#[test]
fn scan_of_empty_table_is_empty() {
    let harness = setup_default();
    let table = create_table(&harness, "t", int_text_desc());
    let tid = harness.db.begin();
    assert!(scan_table(&harness, tid, table).is_empty());
    harness.db.commit(tid).unwrap();
}

#[test]
fn eviction_keeps_the_cache_bounded() {
    let harness = setup(DbConfig {
        buffer_pages: 2,
        page_size: 64,
        ..DbConfig::default()
    });
    let table = create_table(&harness, "t", int_desc());

    // 64-byte pages of 4-byte tuples hold 15 slots; 75 rows make 5 pages.
    // Committing in page-sized batches keeps at most one page dirty at a
    // time, so NO-STEAL never forces the cache over its bound.
    for batch in 0..5 {
        let tid = harness.db.begin();
        for i in 0..15 {
            insert_row(&harness, tid, table, vec![Value::Int(batch * 15 + i)]);
        }
        harness.db.commit(tid).unwrap();
        assert!(harness.db.buffer_pool().cached_page_count() <= 2);
    }
    let file = harness.db.catalog().get_table(table).unwrap();
    assert_eq!(file.num_pages().unwrap(), 5);

    let tid = harness.db.begin();
    let mut scan = seq_scan(&harness, tid, table);
    let mut seen = Vec::new();
    scan.open().unwrap();
    while scan.has_next().unwrap() {
        seen.push(int_at(&scan.next().unwrap(), 0));
        assert!(
            harness.db.buffer_pool().cached_page_count() <= 2,
            "cache exceeded its bound mid-scan"
        );
    }
    scan.close();
    harness.db.commit(tid).unwrap();

    seen.sort();
    assert_eq!(seen, (0..75).collect::<Vec<_>>());
}

#[test]
fn insert_operator_reports_count_once() {
    let harness = setup_default();
    let source_table = create_table(&harness, "src", int_text_desc());
    let target_table = create_table(&harness, "dst", int_text_desc());

    let t1 = harness.db.begin();
    for i in 0..4 {
        insert_row(
            &harness,
            t1,
            source_table,
            vec![Value::Int(i), Value::text("r").unwrap()],
        );
    }
    harness.db.commit(t1).unwrap();

    let t2 = harness.db.begin();
    let mut insert = Insert::new(
        Arc::clone(harness.db.buffer_pool()),
        harness.db.catalog(),
        t2,
        Box::new(seq_scan(&harness, t2, source_table)),
        target_table,
    )
    .unwrap();
    let result = drain(&mut insert);
    assert_eq!(result.len(), 1);
    assert_eq!(int_at(&result[0], 0), 4);
    harness.db.commit(t2).unwrap();

    let t3 = harness.db.begin();
    assert_eq!(scan_table(&harness, t3, target_table).len(), 4);
    harness.db.commit(t3).unwrap();
}

#[test]
fn insert_rejects_mismatched_schema() {
    let harness = setup_default();
    let ints = create_table(&harness, "ints", int_desc());
    let pairs = create_table(&harness, "pairs", int_text_desc());

    let tid = harness.db.begin();
    let scan = seq_scan(&harness, tid, ints);
    let err = Insert::new(
        Arc::clone(harness.db.buffer_pool()),
        harness.db.catalog(),
        tid,
        Box::new(scan),
        pairs,
    );
    assert!(matches!(
        err,
        Err(stratum::DbError::SchemaMismatch(_))
    ));
    harness.db.commit(tid).unwrap();
}

#[test]
fn join_pairs_matching_rows() {
    let harness = setup_default();
    let left = create_table(&harness, "left", int_text_desc());
    let right = create_table(&harness, "right", int_text_desc());

    let t1 = harness.db.begin();
    for (a, b) in [(1, "l1"), (2, "l2"), (3, "l3")] {
        insert_row(
            &harness,
            t1,
            left,
            vec![Value::Int(a), Value::text(b).unwrap()],
        );
    }
    for (a, b) in [(2, "r2"), (3, "r3"), (3, "r3b"), (4, "r4")] {
        insert_row(
            &harness,
            t1,
            right,
            vec![Value::Int(a), Value::text(b).unwrap()],
        );
    }
    harness.db.commit(t1).unwrap();

    let t2 = harness.db.begin();
    let mut join = Join::new(
        JoinPredicate::new(0, Op::Eq, 0),
        Box::new(seq_scan(&harness, t2, left)),
        Box::new(seq_scan(&harness, t2, right)),
    );
    assert_eq!(join.tuple_desc().num_fields(), 4);

    let mut seen: Vec<_> = drain(&mut join)
        .iter()
        .map(|t| (int_at(t, 0), text_at(t, 1), text_at(t, 3)))
        .collect();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            (2, "l2".to_string(), "r2".to_string()),
            (3, "l3".to_string(), "r3".to_string()),
            (3, "l3".to_string(), "r3b".to_string()),
        ]
    );
    harness.db.commit(t2).unwrap();
}

#[test]
fn filter_with_like_matches_substrings() {
    let harness = setup_default();
    let table = create_table(&harness, "t", int_text_desc());

    let t1 = harness.db.begin();
    for (a, b) in [(1, "alpha"), (2, "beta"), (3, "alphabet")] {
        insert_row(
            &harness,
            t1,
            table,
            vec![Value::Int(a), Value::text(b).unwrap()],
        );
    }
    harness.db.commit(t1).unwrap();

    let t2 = harness.db.begin();
    let mut filter = Filter::new(
        Predicate::new(1, Op::Like, Value::text("alpha").unwrap()),
        Box::new(seq_scan(&harness, t2, table)),
    );
    let hits: Vec<_> = drain(&mut filter).iter().map(|t| int_at(t, 0)).collect();
    assert_eq!(hits, vec![1, 3]);
    harness.db.commit(t2).unwrap();
}

#[test]
fn scan_alias_prefixes_field_names() {
    let harness = setup_default();
    let table = create_table(&harness, "t", int_text_desc());
    let tid = harness.db.begin();
    let scan = SeqScan::new(
        Arc::clone(harness.db.buffer_pool()),
        harness.db.catalog(),
        tid,
        table,
        "t",
    )
    .unwrap();
    assert_eq!(scan.tuple_desc().field_name(0), Some("t.a"));
    assert_eq!(scan.tuple_desc().index_of("t.b").unwrap(), 1);
    harness.db.commit(tid).unwrap();
}
