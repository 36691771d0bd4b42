//! # MVCC Row Store
//!
//! `MvccTable` keeps every row of a table as a chain of versions, newest
//! first. Rows are addressed by a stable row index; nodes live in an arena and
//! point at their predecessor by arena index.
//!
//! ```text
//!   rows[2] ──> node 7 ──────────────> node 3 ──────────────> node 1
//!               stamp: tid=9, cid=2    stamp: v=12            stamp: v=5
//!               values: ["b", 2]       values: None           values: ["a", 1]
//!               (uncommitted update)   (committed delete)     (committed insert)
//! ```
//!
//! ## Read Path
//!
//! ```text
//! visible_values(ctx, row)
//!    │
//!    ▼
//! node = rows[row]
//!    │
//!    ├─ in progress, same tid, same cid  → None (statement can't see itself)
//!    ├─ in progress, same tid            → node.values
//!    ├─ in progress, other tid           → follow previous
//!    ├─ committed, version <= snapshot   → node.values (None = deleted)
//!    └─ committed, version >  snapshot   → follow previous
//! ```
//!
//! A transaction owns at most one node per row: once a row's top node carries
//! the writer's tid, later statements of the same transaction rewrite that node
//! in place and only bump its statement id.
//!
//! ## Write Path
//!
//! ```text
//! modify_for_write(ctx, row, is_update)
//!    │
//!    ├─ top in progress, other tid       → WriteConflict
//!    ├─ top committed after snapshot     → StaleWrite
//!    ├─ top is a tombstone               → RowNotFound
//!    ├─ top in progress, same tid        → reuse top, cid = ctx.cid
//!    └─ otherwise                        → push new top, previous = old top
//! ```
//!
//! ## Commit and Rollback
//!
//! Commit rewrites the stamp of each node in the write set into the assigned
//! committed version; values are not touched. Rollback unlinks each node and
//! restores its predecessor as the top. Rolling back a row that the caller no
//! longer owns is a no-op, so rollback may be repeated safely.
//!
//! ## Thread Safety
//!
//! `MvccTable` is not synchronized. Callers hold one exclusive lock per table
//! for writes and a shared lock for reads (see `engine::MemTable`).

use eyre::{bail, Result};
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::types::Value;

use super::error::MvccError;
use super::stamp::RowStamp;
use super::transaction::{TxnContext, TxnId};
use super::version::Version;

pub type RowIndex = usize;
type NodeId = usize;

#[derive(Debug)]
struct VersionNode {
    stamp: RowStamp,
    values: Option<Vec<Value>>,
    previous: Option<NodeId>,
}

#[derive(Debug, Default)]
pub struct MvccTable {
    nodes: Vec<VersionNode>,
    free_nodes: Vec<NodeId>,
    rows: Vec<Option<NodeId>>,
    write_sets: HashMap<TxnId, SmallVec<[RowIndex; 16]>>,
}

impl MvccTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of row slots ever allocated, including rolled-back inserts.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of live version nodes across all rows.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free_nodes.len()
    }

    pub fn write_set(&self, tid: TxnId) -> &[RowIndex] {
        self.write_sets
            .get(&tid)
            .map(|rows| rows.as_slice())
            .unwrap_or_default()
    }

    pub fn insert(&mut self, ctx: &TxnContext, values: Vec<Value>) -> Result<RowIndex> {
        let stamp = ctx.stamp()?;
        let node = self.alloc_node(VersionNode {
            stamp,
            values: Some(values),
            previous: None,
        });

        let row = self.rows.len();
        self.rows.push(Some(node));
        self.record_write(ctx.tid(), row);
        Ok(row)
    }

    pub fn visible_values(&self, ctx: &TxnContext, row: RowIndex) -> Option<&[Value]> {
        let mut current = self.rows.get(row).copied().flatten();

        while let Some(id) = current {
            let node = &self.nodes[id];
            match node.stamp.tid() {
                Some(tid) if tid == ctx.tid() => {
                    if node.stamp.cid() == Some(ctx.cid()) {
                        return None;
                    }
                    return node.values.as_deref();
                }
                Some(_) => {}
                None => {
                    if node.stamp.raw() <= ctx.snapshot() {
                        return node.values.as_deref();
                    }
                }
            }
            current = node.previous;
        }

        None
    }

    /// Makes the top node of `row` owned by `ctx`, copying it on write when it
    /// belongs to a committed version. For an update the new node carries a
    /// copy of the current values; for a delete it carries none.
    pub fn modify_for_write(
        &mut self,
        ctx: &TxnContext,
        row: RowIndex,
        is_update: bool,
    ) -> Result<()> {
        self.writable_node(ctx, row, is_update).map(|_| ())
    }

    fn writable_node(&mut self, ctx: &TxnContext, row: RowIndex, is_update: bool) -> Result<NodeId> {
        let top = self.top(row)?;
        let stamp = ctx.stamp()?;
        let node = &mut self.nodes[top];

        match node.stamp.tid() {
            Some(holder) if holder != ctx.tid() => {
                tracing::debug!(row, holder, tid = ctx.tid(), "write-write conflict");
                bail!(MvccError::WriteConflict { row, holder });
            }
            Some(_) => {
                if node.values.is_none() {
                    bail!(MvccError::RowNotFound { row });
                }
                node.stamp = stamp;
                return Ok(top);
            }
            None => {
                let version = node.stamp.raw();
                if version > ctx.snapshot() {
                    tracing::debug!(
                        row,
                        version,
                        snapshot = ctx.snapshot(),
                        "write to row changed after snapshot"
                    );
                    bail!(MvccError::StaleWrite {
                        row,
                        version,
                        snapshot: ctx.snapshot(),
                    });
                }
            }
        }

        let values = match &self.nodes[top].values {
            None => bail!(MvccError::RowNotFound { row }),
            Some(values) if is_update => Some(values.clone()),
            Some(_) => None,
        };

        let node = self.alloc_node(VersionNode {
            stamp,
            values,
            previous: Some(top),
        });
        self.rows[row] = Some(node);
        self.record_write(ctx.tid(), row);
        Ok(node)
    }

    pub fn update(
        &mut self,
        ctx: &TxnContext,
        row: RowIndex,
        updates: &[(usize, Value)],
    ) -> Result<()> {
        let top = self.top(row)?;
        if let Some(current) = &self.nodes[top].values {
            let arity = current.len();
            if let Some((column, _)) = updates.iter().find(|(column, _)| *column >= arity) {
                bail!(MvccError::ColumnOutOfRange {
                    column: *column,
                    arity,
                });
            }
        }

        let node = self.writable_node(ctx, row, true)?;
        let Some(values) = self.nodes[node].values.as_mut() else {
            bail!(MvccError::RowNotFound { row });
        };
        for (column, value) in updates {
            values[*column] = value.clone();
        }
        Ok(())
    }

    pub fn delete(&mut self, ctx: &TxnContext, row: RowIndex) -> Result<()> {
        let node = self.writable_node(ctx, row, false)?;
        self.nodes[node].values = None;
        Ok(())
    }

    /// Fails unless the top node of `row` was written by `ctx`'s transaction.
    pub fn check_row(&self, ctx: &TxnContext, row: RowIndex) -> Result<()> {
        let top = self.top(row)?;
        if self.nodes[top].stamp.tid() != Some(ctx.tid()) {
            bail!(MvccError::NotOwner {
                row,
                tid: ctx.tid(),
            });
        }
        Ok(())
    }

    pub fn commit_row(&mut self, ctx: &TxnContext, row: RowIndex, version: Version) -> Result<()> {
        self.check_row(ctx, row)?;
        let top = self.top(row)?;
        self.nodes[top].stamp = RowStamp::committed(version)?;
        self.forget_write(ctx.tid(), row);
        Ok(())
    }

    /// Unlinks `ctx`'s node from `row`. Returns false when there was nothing
    /// to undo.
    pub fn rollback_row(&mut self, ctx: &TxnContext, row: RowIndex) -> Result<bool> {
        let Some(slot) = self.rows.get(row).copied() else {
            bail!(MvccError::RowNotFound { row });
        };
        let Some(top) = slot else {
            return Ok(false);
        };
        if self.nodes[top].stamp.tid() != Some(ctx.tid()) {
            return Ok(false);
        }

        self.rows[row] = self.nodes[top].previous;
        self.free_node(top);
        self.forget_write(ctx.tid(), row);
        Ok(true)
    }

    /// Stamps every row written by `ctx` with `version`. Returns the number
    /// of rows committed.
    pub fn commit(&mut self, ctx: &TxnContext, version: Version) -> Result<usize> {
        let stamp = RowStamp::committed(version)?;
        let Some(rows) = self.write_sets.remove(&ctx.tid()) else {
            return Ok(0);
        };

        let mut committed = 0;
        for row in rows {
            if let Some(top) = self.rows[row] {
                if self.nodes[top].stamp.tid() == Some(ctx.tid()) {
                    self.nodes[top].stamp = stamp;
                    committed += 1;
                }
            }
        }
        Ok(committed)
    }

    /// Discards every row written by `ctx`. Returns the number of rows undone.
    pub fn rollback(&mut self, ctx: &TxnContext) -> Result<usize> {
        let Some(rows) = self.write_sets.remove(&ctx.tid()) else {
            return Ok(0);
        };

        let mut undone = 0;
        for row in rows.into_iter().rev() {
            if self.rollback_row(ctx, row)? {
                undone += 1;
            }
        }
        Ok(undone)
    }

    /// Frees versions no snapshot at or above `watermark` can reach. Returns
    /// the number of nodes freed.
    pub fn prune(&mut self, watermark: Version) -> usize {
        let mut freed = 0;

        for row in 0..self.rows.len() {
            let mut current = self.rows[row];
            let mut keep_from = None;
            while let Some(id) = current {
                let node = &self.nodes[id];
                if !node.stamp.is_in_progress() && node.stamp.raw() <= watermark {
                    keep_from = Some(id);
                    break;
                }
                current = node.previous;
            }

            let Some(oldest_needed) = keep_from else {
                continue;
            };

            let mut doomed = self.nodes[oldest_needed].previous.take();
            while let Some(id) = doomed {
                doomed = self.nodes[id].previous;
                self.free_node(id);
                freed += 1;
            }

            if self.rows[row] == Some(oldest_needed) && self.nodes[oldest_needed].values.is_none()
            {
                self.rows[row] = None;
                self.free_node(oldest_needed);
                freed += 1;
            }
        }

        if freed > 0 {
            tracing::debug!(freed, watermark, "pruned row versions");
        }
        freed
    }

    fn top(&self, row: RowIndex) -> Result<NodeId> {
        match self.rows.get(row) {
            Some(Some(top)) => Ok(*top),
            _ => bail!(MvccError::RowNotFound { row }),
        }
    }

    fn record_write(&mut self, tid: TxnId, row: RowIndex) {
        self.write_sets.entry(tid).or_default().push(row);
    }

    fn forget_write(&mut self, tid: TxnId, row: RowIndex) {
        if let Some(rows) = self.write_sets.get_mut(&tid) {
            rows.retain(|written| *written != row);
            if rows.is_empty() {
                self.write_sets.remove(&tid);
            }
        }
    }

    fn alloc_node(&mut self, node: VersionNode) -> NodeId {
        match self.free_nodes.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn free_node(&mut self, id: NodeId) {
        let node = &mut self.nodes[id];
        node.values = None;
        node.previous = None;
        self.free_nodes.push(id);
    }
}
