//! # In-Memory Engine
//!
//! `MemTable` implements [`Table`] over an [`MvccTable`] guarded by one
//! `parking_lot::RwLock` per table. Every operation takes the lock for the
//! duration of a single insert, update, delete, commit, rollback or row fetch;
//! cursors never hold it between calls.
//!
//! ```text
//! MemRows::next  ── read lock ──> visible_values(ctx, row) ──> copy to dest
//! MemRows::update ─ write lock ─> MvccTable::update(ctx, row, updates)
//! MemTable::commit ─ write lock ─> MvccTable::commit(ctx, version)
//! ```
//!
//! Rows written by a statement are invisible to that same statement, so a
//! cursor that updates the rows it visits never sees them a second time.

use std::sync::Arc;

use eyre::{bail, ensure, eyre, Result};
use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;

use super::{Engine, Rows, Table};
use crate::encoding::row::MAX_ROW_ARITY;
use crate::mvcc::{MvccError, MvccTable, RowIndex, TxnContext, Version};
use crate::types::{ColumnDef, ColumnType, Value};

pub struct MemTable {
    table_id: u32,
    columns: Vec<ColumnDef>,
    rows: RwLock<MvccTable>,
}

impl MemTable {
    pub fn new(table_id: u32, columns: Vec<ColumnDef>) -> Result<Self> {
        ensure!(!columns.is_empty(), "table {} has no columns", table_id);

        ensure!(
            columns.len() <= MAX_ROW_ARITY,
            "table {} has {} columns, limit is {}",
            table_id,
            columns.len(),
            MAX_ROW_ARITY
        );

        {
            let mut seen = HashSet::with_capacity(columns.len());
            for column in &columns {
                ensure!(
                    seen.insert(column.name()),
                    "duplicate column '{}' in table {}",
                    column.name(),
                    table_id
                );
            }
        }

        Ok(Self {
            table_id,
            columns,
            rows: RwLock::new(MvccTable::new()),
        })
    }

    pub fn column_defs(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Frees row versions older than `watermark` that no snapshot can reach.
    pub fn prune(&self, watermark: Version) -> usize {
        self.rows.write().prune(watermark)
    }

    fn check_values(&self, values: &[Value]) -> Result<()> {
        ensure!(
            values.len() == self.columns.len(),
            "table {} expects {} values, got {}",
            self.table_id,
            self.columns.len(),
            values.len()
        );
        for (column, value) in self.columns.iter().zip(values) {
            column.check(value)?;
        }
        Ok(())
    }

    fn check_updates(&self, updates: &[(usize, Value)]) -> Result<()> {
        for (index, value) in updates {
            let Some(column) = self.columns.get(*index) else {
                bail!(MvccError::ColumnOutOfRange {
                    column: *index,
                    arity: self.columns.len(),
                });
            };
            column.check(value)?;
        }
        Ok(())
    }
}

impl Table for MemTable {
    fn table_id(&self) -> u32 {
        self.table_id
    }

    fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(ColumnDef::name).collect()
    }

    fn column_types(&self) -> Vec<ColumnType> {
        self.columns.iter().map(ColumnDef::column_type).collect()
    }

    fn rows<'a>(
        &'a self,
        ctx: &TxnContext,
        min_row: usize,
        max_row: usize,
    ) -> Result<Box<dyn Rows + 'a>> {
        ensure!(
            min_row <= max_row,
            "empty row range {}..={}",
            min_row,
            max_row
        );
        Ok(Box::new(MemRows {
            table: self,
            ctx: *ctx,
            next_row: min_row,
            max_row,
            current: None,
            closed: false,
        }))
    }

    fn insert(&self, ctx: &TxnContext, row: Vec<Value>) -> Result<()> {
        self.check_values(&row)?;
        let index = self.rows.write().insert(ctx, row)?;
        tracing::trace!(table = self.table_id, row = index, tid = ctx.tid(), "inserted row");
        Ok(())
    }

    fn commit(&self, ctx: &TxnContext, version: Version) -> Result<usize> {
        let committed = self.rows.write().commit(ctx, version)?;
        tracing::debug!(
            table = self.table_id,
            tid = ctx.tid(),
            version,
            rows = committed,
            "committed rows"
        );
        Ok(committed)
    }

    fn rollback(&self, ctx: &TxnContext) -> Result<usize> {
        let undone = self.rows.write().rollback(ctx)?;
        tracing::debug!(
            table = self.table_id,
            tid = ctx.tid(),
            rows = undone,
            "rolled back rows"
        );
        Ok(undone)
    }
}

pub struct MemRows<'a> {
    table: &'a MemTable,
    ctx: TxnContext,
    next_row: RowIndex,
    max_row: RowIndex,
    current: Option<RowIndex>,
    closed: bool,
}

impl MemRows<'_> {
    fn current(&self) -> Result<RowIndex> {
        ensure!(!self.closed, "cursor is closed");
        self.current
            .ok_or_else(|| eyre!("cursor is not positioned on a row"))
    }
}

impl Rows for MemRows<'_> {
    fn next(&mut self, dest: &mut [Value]) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        ensure!(
            dest.len() == self.table.columns.len(),
            "destination holds {} values, table {} has {} columns",
            dest.len(),
            self.table.table_id,
            self.table.columns.len()
        );

        let rows = self.table.rows.read();
        while self.next_row < rows.len() && self.next_row <= self.max_row {
            let row = self.next_row;
            self.next_row += 1;

            if let Some(values) = rows.visible_values(&self.ctx, row) {
                ensure!(
                    values.len() == dest.len(),
                    "row {} has {} values, expected {}",
                    row,
                    values.len(),
                    dest.len()
                );
                for (slot, value) in dest.iter_mut().zip(values) {
                    slot.clone_from(value);
                }
                self.current = Some(row);
                return Ok(true);
            }
        }

        self.current = None;
        Ok(false)
    }

    fn delete(&mut self) -> Result<()> {
        let row = self.current()?;
        self.table.rows.write().delete(&self.ctx, row)?;
        self.current = None;
        Ok(())
    }

    fn update(&mut self, updates: &[(usize, Value)]) -> Result<()> {
        let row = self.current()?;
        self.table.check_updates(updates)?;
        self.table.rows.write().update(&self.ctx, row, updates)
    }

    fn close(&mut self) {
        self.closed = true;
        self.current = None;
    }
}

#[derive(Default)]
pub struct MemEngine {
    tables: RwLock<HashMap<u32, Arc<MemTable>>>,
}

impl MemEngine {
    pub const NAME: &'static str = "memory";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn mem_table(&self, table_id: u32) -> Option<Arc<MemTable>> {
        self.tables.read().get(&table_id).cloned()
    }
}

impl Engine for MemEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn create_table(&self, table_id: u32, columns: Vec<ColumnDef>) -> Result<Arc<dyn Table>> {
        let mut tables = self.tables.write();
        ensure!(
            !tables.contains_key(&table_id),
            "table {} already exists",
            table_id
        );

        let table = Arc::new(MemTable::new(table_id, columns)?);
        tables.insert(table_id, Arc::clone(&table));
        tracing::info!(table = table_id, columns = table.columns.len(), "created table");

        let table: Arc<dyn Table> = table;
        Ok(table)
    }

    fn table(&self, table_id: u32) -> Option<Arc<dyn Table>> {
        let table = self.mem_table(table_id)?;
        Some(table)
    }

    fn table_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.tables.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::{is_conflict, TransactionManager};

    fn people() -> MemTable {
        MemTable::new(
            4096,
            vec![
                ColumnDef::new("name", ColumnType::Text),
                ColumnDef::new("age", ColumnType::Int),
            ],
        )
        .unwrap()
    }

    fn person(name: &str, age: i64) -> Vec<Value> {
        vec![Value::from(name), Value::Int(age)]
    }

    fn collect(table: &MemTable, ctx: &TxnContext, min: usize, max: usize) -> Vec<Vec<Value>> {
        let mut rows = table.rows(ctx, min, max).unwrap();
        let mut dest = vec![Value::Null; 2];
        let mut out = Vec::new();
        while rows.next(&mut dest).unwrap() {
            out.push(dest.clone());
        }
        rows.close();
        out
    }

    fn seed(mgr: &TransactionManager, table: &MemTable, rows: &[(&str, i64)]) {
        let ctx = mgr.begin().unwrap();
        for (name, age) in rows {
            table.insert(&ctx, person(name, *age)).unwrap();
        }
        mgr.commit(&ctx, |v| table.commit(&ctx, v).map(|_| ()))
            .unwrap();
    }

    #[test]
    fn columns_and_types() {
        let table = people();
        assert_eq!(table.columns(), vec!["name", "age"]);
        assert_eq!(table.column_types(), vec![ColumnType::Text, ColumnType::Int]);
        assert_eq!(table.table_id(), 4096);
    }

    #[test]
    fn invalid_definitions_are_rejected() {
        assert!(MemTable::new(1, vec![]).is_err());
        assert!(MemTable::new(
            1,
            vec![
                ColumnDef::new("a", ColumnType::Int),
                ColumnDef::new("a", ColumnType::Text),
            ]
        )
        .is_err());
    }

    #[test]
    fn distinct_columns_move_into_table() {
        let columns: Vec<ColumnDef> = (0..20)
            .map(|i| ColumnDef::new(format!("c{}", i), ColumnType::Int))
            .collect();
        let table = MemTable::new(7, columns).unwrap();
        assert_eq!(table.column_defs().len(), 20);
        assert_eq!(table.columns()[19], "c19");
    }

    #[test]
    fn column_count_is_capped_at_row_arity() {
        let columns = |n: usize| -> Vec<ColumnDef> {
            (0..n)
                .map(|i| ColumnDef::new(format!("c{}", i), ColumnType::Bool))
                .collect()
        };
        assert!(MemTable::new(1, columns(MAX_ROW_ARITY)).is_ok());
        let err = MemTable::new(1, columns(MAX_ROW_ARITY + 1)).err().unwrap();
        assert!(err.to_string().contains("limit is 32768"));
    }

    #[test]
    fn insert_checks_arity_and_types() {
        let table = people();
        let ctx = TxnContext::new(1, 0, 0);
        assert!(table.insert(&ctx, vec![Value::from("x")]).is_err());
        let err = table
            .insert(&ctx, vec![Value::Int(1), Value::Int(2)])
            .unwrap_err();
        assert!(err.to_string().contains("column 'name' expects TEXT, got INT"));
        table.insert(&ctx, vec![Value::Null, Value::Null]).unwrap();
    }

    #[test]
    fn scan_sees_committed_rows_in_range() {
        let mgr = TransactionManager::new();
        let table = people();
        seed(&mgr, &table, &[("ann", 30), ("bob", 41), ("cid", 25)]);

        let reader = mgr.begin().unwrap();
        assert_eq!(collect(&table, &reader, 0, usize::MAX).len(), 3);
        assert_eq!(collect(&table, &reader, 1, 1), vec![person("bob", 41)]);
        assert_eq!(collect(&table, &reader, 2, 10), vec![person("cid", 25)]);
        assert!(table.rows(&reader, 3, 1).is_err());
    }

    #[test]
    fn update_through_cursor_visits_each_row_once() {
        let mgr = TransactionManager::new();
        let table = people();
        seed(&mgr, &table, &[("ann", 30), ("bob", 41)]);

        let mut ctx = mgr.begin().unwrap();
        ctx.next_statement().unwrap();
        {
            let mut rows = table.rows(&ctx, 0, usize::MAX).unwrap();
            let mut dest = vec![Value::Null; 2];
            let mut visited = 0;
            while rows.next(&mut dest).unwrap() {
                let Value::Int(age) = dest[1] else {
                    panic!("age is not an INT");
                };
                rows.update(&[(1, Value::Int(age + 1))]).unwrap();
                visited += 1;
            }
            assert_eq!(visited, 2);
        }

        ctx.next_statement().unwrap();
        assert_eq!(
            collect(&table, &ctx, 0, usize::MAX),
            vec![person("ann", 31), person("bob", 42)]
        );

        let other = mgr.begin().unwrap();
        assert_eq!(
            collect(&table, &other, 0, usize::MAX),
            vec![person("ann", 30), person("bob", 41)]
        );
    }

    #[test]
    fn delete_and_rollback() {
        let mgr = TransactionManager::new();
        let table = people();
        seed(&mgr, &table, &[("ann", 30), ("bob", 41)]);

        let mut ctx = mgr.begin().unwrap();
        {
            let mut rows = table.rows(&ctx, 0, usize::MAX).unwrap();
            let mut dest = vec![Value::Null; 2];
            assert!(rows.next(&mut dest).unwrap());
            rows.delete().unwrap();
            assert!(rows.delete().is_err());
        }
        ctx.next_statement().unwrap();
        assert_eq!(collect(&table, &ctx, 0, usize::MAX), vec![person("bob", 41)]);

        assert_eq!(table.rollback(&ctx).unwrap(), 1);
        mgr.abort(&ctx);

        let reader = mgr.begin().unwrap();
        assert_eq!(collect(&table, &reader, 0, usize::MAX).len(), 2);
    }

    #[test]
    fn cursor_update_validates_columns() {
        let mgr = TransactionManager::new();
        let table = people();
        seed(&mgr, &table, &[("ann", 30)]);

        let ctx = mgr.begin().unwrap();
        let mut rows = table.rows(&ctx, 0, usize::MAX).unwrap();
        let mut dest = vec![Value::Null; 2];
        assert!(rows.update(&[(1, Value::Int(1))]).is_err());
        assert!(rows.next(&mut dest).unwrap());

        let err = rows.update(&[(5, Value::Int(1))]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<MvccError>(),
            Some(&MvccError::ColumnOutOfRange { column: 5, arity: 2 })
        );
        assert!(rows.update(&[(1, Value::from("old"))]).is_err());

        let mut short = vec![Value::Null; 1];
        assert!(rows.next(&mut short).is_err());

        rows.close();
        assert!(!rows.next(&mut dest).unwrap());
        assert!(rows.delete().is_err());
    }

    #[test]
    fn concurrent_writers_conflict_through_cursor() {
        let mgr = TransactionManager::new();
        let table = people();
        seed(&mgr, &table, &[("ann", 30)]);

        let t1 = mgr.begin().unwrap();
        let t2 = mgr.begin().unwrap();
        let mut dest = vec![Value::Null; 2];

        let mut first = table.rows(&t1, 0, 0).unwrap();
        assert!(first.next(&mut dest).unwrap());
        first.update(&[(1, Value::Int(99))]).unwrap();

        let mut second = table.rows(&t2, 0, 0).unwrap();
        assert!(second.next(&mut dest).unwrap());
        assert_eq!(dest, person("ann", 30));
        let err = second.delete().unwrap_err();
        assert!(is_conflict(&err));
    }

    #[test]
    fn engine_creates_and_finds_tables() {
        let engine = MemEngine::new();
        assert_eq!(engine.name(), "memory");

        engine
            .create_table(4097, vec![ColumnDef::new("v", ColumnType::Blob)])
            .unwrap();
        engine
            .create_table(4096, vec![ColumnDef::new("v", ColumnType::Float)])
            .unwrap();
        assert!(engine
            .create_table(4096, vec![ColumnDef::new("w", ColumnType::Int)])
            .is_err());

        assert_eq!(engine.table_ids(), vec![4096, 4097]);
        assert_eq!(
            engine.table(4096).unwrap().column_types(),
            vec![ColumnType::Float]
        );
        assert!(engine.table(1).is_none());
        assert!(engine.mem_table(4097).is_some());
    }
}
