use std::sync::Arc;

use stratum::types::Value;
use stratum::DbError;

use shale_query::aggregate_executor::{Aggregate, AggregateOp};
use shale_query::executor::{Operator, SeqScan};

mod common;
use common::*;

fn scan(harness: &TestDb, tid: stratum::TransactionId, table_id: i32) -> SeqScan {
    SeqScan::new(
        Arc::clone(harness.db.buffer_pool()),
        harness.db.catalog(),
        tid,
        table_id,
        "",
    )
    .expect("scan construction")
}

fn grouped_table(harness: &TestDb) -> i32 {
    let table = create_table(harness, "t", two_int_desc());
    let tid = harness.db.begin();
    for (g, v) in [(1, 10), (1, 20), (2, 30), (2, 40), (2, 50)] {
        insert_row(harness, tid, table, vec![Value::Int(g), Value::Int(v)]);
    }
    harness.db.commit(tid).unwrap();
    table
}

#[test]
fn sum_grouped_by_first_column() {
    let harness = setup_default();
    let table = grouped_table(&harness);

    let tid = harness.db.begin();
    let mut agg = Aggregate::new(
        Box::new(scan(&harness, tid, table)),
        1,
        Some(0),
        AggregateOp::Sum,
    )
    .unwrap();
    let mut groups: Vec<_> = drain(&mut agg)
        .iter()
        .map(|t| (int_at(t, 0), int_at(t, 1)))
        .collect();
    groups.sort();
    assert_eq!(groups, vec![(1, 30), (2, 120)]);
    harness.db.commit(tid).unwrap();
}

#[test]
fn grouped_count_min_max_avg() {
    let harness = setup_default();
    let table = grouped_table(&harness);
    let tid = harness.db.begin();

    let cases = [
        (AggregateOp::Count, vec![(1, 2), (2, 3)]),
        (AggregateOp::Min, vec![(1, 10), (2, 30)]),
        (AggregateOp::Max, vec![(1, 20), (2, 50)]),
        (AggregateOp::Avg, vec![(1, 15), (2, 40)]),
    ];
    for (op, expected) in cases {
        let mut agg =
            Aggregate::new(Box::new(scan(&harness, tid, table)), 1, Some(0), op).unwrap();
        let mut groups: Vec<_> = drain(&mut agg)
            .iter()
            .map(|t| (int_at(t, 0), int_at(t, 1)))
            .collect();
        groups.sort();
        assert_eq!(groups, expected, "wrong result for {}", op);
    }
    harness.db.commit(tid).unwrap();
}

#[test]
fn ungrouped_aggregate_is_a_single_row() {
    let harness = setup_default();
    let table = grouped_table(&harness);
    let tid = harness.db.begin();

    let mut agg = Aggregate::new(
        Box::new(scan(&harness, tid, table)),
        1,
        None,
        AggregateOp::Sum,
    )
    .unwrap();
    let rows = drain(&mut agg);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].desc().num_fields(), 1);
    assert_eq!(int_at(&rows[0], 0), 150);
    harness.db.commit(tid).unwrap();
}

#[test]
fn avg_truncates_toward_zero() {
    let harness = setup_default();
    let table = create_table(&harness, "t", two_int_desc());
    let tid = harness.db.begin();
    for v in [1, 2, 2] {
        insert_row(&harness, tid, table, vec![Value::Int(0), Value::Int(v)]);
    }
    harness.db.commit(tid).unwrap();

    let tid = harness.db.begin();
    let mut agg = Aggregate::new(
        Box::new(scan(&harness, tid, table)),
        1,
        None,
        AggregateOp::Avg,
    )
    .unwrap();
    let rows = drain(&mut agg);
    // 5 / 3 under integer division.
    assert_eq!(int_at(&rows[0], 0), 1);
    harness.db.commit(tid).unwrap();
}

#[test]
fn count_is_the_only_text_aggregate() {
    let harness = setup_default();
    let table = create_table(&harness, "t", int_text_desc());
    let tid = harness.db.begin();
    for (a, b) in [(1, "x"), (1, "y"), (2, "z")] {
        insert_row(
            &harness,
            tid,
            table,
            vec![Value::Int(a), Value::text(b).unwrap()],
        );
    }
    harness.db.commit(tid).unwrap();

    let tid = harness.db.begin();
    let mut count = Aggregate::new(
        Box::new(scan(&harness, tid, table)),
        1,
        Some(0),
        AggregateOp::Count,
    )
    .unwrap();
    let mut groups: Vec<_> = drain(&mut count)
        .iter()
        .map(|t| (int_at(t, 0), int_at(t, 1)))
        .collect();
    groups.sort();
    assert_eq!(groups, vec![(1, 2), (2, 1)]);

    for op in [
        AggregateOp::Sum,
        AggregateOp::Avg,
        AggregateOp::Min,
        AggregateOp::Max,
    ] {
        let err = Aggregate::new(Box::new(scan(&harness, tid, table)), 1, Some(0), op);
        assert!(
            matches!(err, Err(DbError::IllegalArgument(_))),
            "{} over text must be rejected at construction",
            op
        );
    }
    harness.db.commit(tid).unwrap();
}

#[test]
fn aggregate_output_schema_is_fixed() {
    let harness = setup_default();
    let table = grouped_table(&harness);
    let tid = harness.db.begin();

    let mut agg = Aggregate::new(
        Box::new(scan(&harness, tid, table)),
        1,
        Some(0),
        AggregateOp::Sum,
    )
    .unwrap();
    let desc_before = agg.tuple_desc().clone();
    let rows = drain(&mut agg);
    assert_eq!(agg.tuple_desc(), &desc_before);
    for row in &rows {
        assert_eq!(row.desc().as_ref(), &desc_before);
    }
    assert_eq!(desc_before.field_name(1), Some("SUM(v)"));
    harness.db.commit(tid).unwrap();
}
