//! # MVCC Integration Tests
//!
//! Snapshot isolation through the public table interface: a memory engine
//! table, a transaction manager and row cursors.

use std::sync::Arc;
use std::thread;

use maho::engine::{EngineRegistry, Table};
use maho::mvcc::version::{
    classify, is_proposal, is_proposed_write, is_transaction, make_proposed_write_version,
    make_transaction_version,
};
use maho::mvcc::{is_conflict, MvccError, VersionKind, PROPOSAL};
use maho::{ColumnDef, ColumnType, TransactionManager, TxnContext, Value};

fn accounts() -> Arc<dyn Table> {
    EngineRegistry::with_defaults()
        .unwrap()
        .require("memory")
        .unwrap()
        .create_table(
            4096,
            vec![
                ColumnDef::new("name", ColumnType::Text),
                ColumnDef::new("balance", ColumnType::Int),
            ],
        )
        .unwrap()
}

fn scan(table: &dyn Table, ctx: &TxnContext) -> Vec<(String, i64)> {
    let mut rows = table.rows(ctx, 0, usize::MAX).unwrap();
    let mut dest = vec![Value::Null; 2];
    let mut out = Vec::new();
    while rows.next(&mut dest).unwrap() {
        match (&dest[0], &dest[1]) {
            (Value::Text(name), Value::Int(balance)) => out.push((name.clone(), *balance)),
            other => panic!("unexpected row {:?}", other),
        }
    }
    rows.close();
    out
}

fn commit(txns: &TransactionManager, table: &dyn Table, ctx: &TxnContext) -> u64 {
    txns.commit(ctx, |version| table.commit(ctx, version).map(|_| ()))
        .unwrap()
}

fn seed(txns: &TransactionManager, table: &dyn Table, rows: &[(&str, i64)]) {
    let ctx = txns.begin().unwrap();
    for (name, balance) in rows {
        table
            .insert(&ctx, vec![Value::from(*name), Value::Int(*balance)])
            .unwrap();
    }
    commit(txns, table, &ctx);
}

fn owned(rows: &[(&str, i64)]) -> Vec<(String, i64)> {
    rows.iter().map(|(n, b)| (n.to_string(), *b)).collect()
}

#[test]
fn committed_rows_visible_to_later_snapshots_only() {
    let txns = TransactionManager::new();
    let table = accounts();

    let early = txns.begin().unwrap();
    seed(&txns, table.as_ref(), &[("alice", 10)]);
    let late = txns.begin().unwrap();

    assert!(scan(table.as_ref(), &early).is_empty());
    assert_eq!(scan(table.as_ref(), &late), owned(&[("alice", 10)]));
}

#[test]
fn uncommitted_writes_are_private() {
    let txns = TransactionManager::new();
    let table = accounts();
    seed(&txns, table.as_ref(), &[("alice", 10)]);

    let mut writer = txns.begin().unwrap();
    let reader = txns.begin().unwrap();
    table
        .insert(&writer, vec![Value::from("bob"), Value::Int(5)])
        .unwrap();
    writer.next_statement().unwrap();

    assert_eq!(scan(table.as_ref(), &writer), owned(&[("alice", 10), ("bob", 5)]));
    assert_eq!(scan(table.as_ref(), &reader), owned(&[("alice", 10)]));

    commit(&txns, table.as_ref(), &writer);
    assert_eq!(scan(table.as_ref(), &reader), owned(&[("alice", 10)]));

    let after = txns.begin().unwrap();
    assert_eq!(scan(table.as_ref(), &after), owned(&[("alice", 10), ("bob", 5)]));
}

#[test]
fn update_through_cursor_skips_own_writes() {
    let txns = TransactionManager::new();
    let table = accounts();
    seed(&txns, table.as_ref(), &[("alice", 10), ("bob", 20)]);

    let mut ctx = txns.begin().unwrap();
    {
        let mut rows = table.rows(&ctx, 0, usize::MAX).unwrap();
        let mut dest = vec![Value::Null; 2];
        let mut visited = 0;
        while rows.next(&mut dest).unwrap() {
            let Value::Int(balance) = dest[1] else {
                panic!("balance is not an INT");
            };
            rows.update(&[(1, Value::Int(balance + 1))]).unwrap();
            visited += 1;
        }
        assert_eq!(visited, 2);
    }
    ctx.next_statement().unwrap();
    assert_eq!(scan(table.as_ref(), &ctx), owned(&[("alice", 11), ("bob", 21)]));
}

#[test]
fn concurrent_writers_conflict() {
    let txns = TransactionManager::new();
    let table = accounts();
    seed(&txns, table.as_ref(), &[("alice", 10)]);

    let t1 = txns.begin().unwrap();
    let t2 = txns.begin().unwrap();

    let mut rows = table.rows(&t1, 0, 0).unwrap();
    let mut dest = vec![Value::Null; 2];
    assert!(rows.next(&mut dest).unwrap());
    rows.update(&[(1, Value::Int(0))]).unwrap();
    drop(rows);

    let mut rows = table.rows(&t2, 0, 0).unwrap();
    assert!(rows.next(&mut dest).unwrap());
    let err = rows.delete().unwrap_err();
    assert!(is_conflict(&err));
    assert_eq!(
        err.downcast_ref::<MvccError>(),
        Some(&MvccError::WriteConflict { row: 0, holder: t1.tid() })
    );
    drop(rows);

    table.rollback(&t2).unwrap();
    txns.abort(&t2);
    commit(&txns, table.as_ref(), &t1);

    let reader = txns.begin().unwrap();
    assert_eq!(scan(table.as_ref(), &reader), owned(&[("alice", 0)]));
}

#[test]
fn first_committer_wins() {
    let txns = TransactionManager::new();
    let table = accounts();
    seed(&txns, table.as_ref(), &[("alice", 10)]);

    let slow = txns.begin().unwrap();
    let fast = txns.begin().unwrap();

    let mut dest = vec![Value::Null; 2];
    {
        let mut rows = table.rows(&fast, 0, usize::MAX).unwrap();
        assert!(rows.next(&mut dest).unwrap());
        rows.delete().unwrap();
    }
    commit(&txns, table.as_ref(), &fast);

    let mut rows = table.rows(&slow, 0, usize::MAX).unwrap();
    assert!(rows.next(&mut dest).unwrap());
    let err = rows.update(&[(1, Value::Int(99))]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MvccError>(),
        Some(MvccError::StaleWrite { row: 0, .. })
    ));
}

#[test]
fn rollback_discards_every_write() {
    let txns = TransactionManager::new();
    let table = accounts();
    seed(&txns, table.as_ref(), &[("alice", 10), ("bob", 20)]);

    let ctx = txns.begin().unwrap();
    table
        .insert(&ctx, vec![Value::from("carol"), Value::Int(30)])
        .unwrap();
    {
        let mut rows = table.rows(&ctx, 0, 1).unwrap();
        let mut dest = vec![Value::Null; 2];
        assert!(rows.next(&mut dest).unwrap());
        rows.delete().unwrap();
        assert!(rows.next(&mut dest).unwrap());
        rows.update(&[(0, Value::from("robert"))]).unwrap();
        assert!(!rows.next(&mut dest).unwrap());
    }

    assert_eq!(table.rollback(&ctx).unwrap(), 3);
    txns.abort(&ctx);
    assert_eq!(table.rollback(&ctx).unwrap(), 0);

    let reader = txns.begin().unwrap();
    assert_eq!(scan(table.as_ref(), &reader), owned(&[("alice", 10), ("bob", 20)]));
}

#[test]
fn bad_updates_are_integrity_errors() {
    let txns = TransactionManager::new();
    let table = accounts();
    seed(&txns, table.as_ref(), &[("alice", 10)]);

    let ctx = txns.begin().unwrap();
    let mut rows = table.rows(&ctx, 0, usize::MAX).unwrap();
    let mut dest = vec![Value::Null; 2];

    assert!(rows.delete().is_err());
    assert!(rows.next(&mut dest).unwrap());

    let err = rows.update(&[(2, Value::Int(1))]).unwrap_err();
    assert_eq!(
        err.downcast_ref::<MvccError>(),
        Some(&MvccError::ColumnOutOfRange { column: 2, arity: 2 })
    );
    assert!(!is_conflict(&err));

    let err = rows.update(&[(1, Value::from("ten"))]).unwrap_err();
    assert!(err.to_string().contains("expects INT"));

    assert!(table.insert(&ctx, vec![Value::Int(1)]).is_err());
}

#[test]
fn commits_from_many_threads_get_distinct_versions() {
    let txns = Arc::new(TransactionManager::new());
    let table = accounts();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let txns = Arc::clone(&txns);
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let ctx = txns.begin().unwrap();
                table
                    .insert(&ctx, vec![Value::Text(format!("user{}", i)), Value::Int(i)])
                    .unwrap();
                commit(&txns, table.as_ref(), &ctx)
            })
        })
        .collect();

    let mut versions: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    versions.sort_unstable();
    assert_eq!(versions, (1..=8).collect::<Vec<u64>>());
    assert_eq!(txns.active_count(), 0);

    let reader = txns.begin().unwrap();
    assert_eq!(scan(table.as_ref(), &reader).len(), 8);
}

#[test]
fn version_ranges_are_disjoint() {
    let samples = [
        0,
        make_transaction_version(u32::MAX),
        u32::MAX as u64 + 1,
        make_proposed_write_version(0) - 1,
        make_proposed_write_version(0),
        make_proposed_write_version(u32::MAX),
        PROPOSAL,
    ];
    for v in samples {
        let flags = [is_transaction(v), is_proposed_write(v), is_proposal(v)];
        assert!(flags.iter().filter(|f| **f).count() <= 1, "{:#x}", v);
    }

    assert_eq!(classify(u32::MAX as u64), VersionKind::Transaction(u32::MAX));
    assert_eq!(classify(u32::MAX as u64 + 1), VersionKind::Unassigned);
    assert_eq!(
        classify(make_proposed_write_version(u32::MAX)),
        VersionKind::ProposedWrite(u32::MAX)
    );
    assert_eq!(make_proposed_write_version(u32::MAX), PROPOSAL - 1);
    assert_eq!(classify(PROPOSAL), VersionKind::Proposal);
}
