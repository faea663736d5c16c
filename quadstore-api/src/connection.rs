//! Connection: the mutation and evaluation surface over a repository
//!
//! A connection is either in auto-commit mode, where every mutation runs in
//! its own write transaction, or holds an explicit transaction opened with
//! [`Connection::begin_transaction`]. Reads and evaluations inside an
//! explicit transaction see its pending changes; otherwise they run against
//! a fresh snapshot.
//!
//! A failed mutation inside an explicit transaction aborts the whole
//! transaction. Closing or dropping a connection rolls back any transaction
//! left open.

use crate::error::{ApiError, Result};
use crate::repository::Repository;
use quadstore_core::{
    CommitReceipt, ContextFilter, ParseError, Statement, StatementFilter, Value, WriteTxn,
};
use quadstore_query::{execute_seeded, Algebra, ExecutionContext, QueryResults, Solution};
use std::sync::Arc;

/// How [`Connection::add_all`] treats malformed stream items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Abort on the first parse error
    #[default]
    Strict,
    /// Log and skip parse errors
    Lenient,
}

/// Outcome of [`Connection::add_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Statements newly added
    pub added: usize,
    /// Statements already present
    pub duplicates: usize,
    /// Stream items skipped as malformed (lenient mode only)
    pub skipped: usize,
}

pub struct Connection<'r> {
    repo: &'r Repository,
    id: u64,
    txn: Option<WriteTxn<'r>>,
    closed: bool,
}

impl<'r> Connection<'r> {
    pub(crate) fn new(repo: &'r Repository, id: u64) -> Self {
        Self {
            repo,
            id,
            txn: None,
            closed: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn repository(&self) -> &'r Repository {
        self.repo
    }

    /// True while an explicit transaction is open
    pub fn is_active(&self) -> bool {
        self.txn.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ApiError::ConnectionClosed);
        }
        Ok(())
    }

    /// Open an explicit transaction, waiting for any other writer to finish.
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.txn.is_some() {
            return Err(ApiError::transaction_state("transaction already active"));
        }
        self.txn = Some(self.repo.store().begin_write()?);
        tracing::debug!(connection = self.id, "transaction begun");
        Ok(())
    }

    /// Run one mutation, in the explicit transaction or auto-committed.
    fn mutate<T>(
        &mut self,
        op: impl FnOnce(&mut WriteTxn<'r>) -> quadstore_core::Result<T>,
    ) -> Result<T> {
        self.ensure_open()?;
        match self.txn.as_mut() {
            Some(txn) => match op(txn) {
                Ok(out) => Ok(out),
                Err(e) => {
                    tracing::warn!(connection = self.id, error = %e, "mutation failed; transaction aborted");
                    if let Some(txn) = self.txn.take() {
                        txn.rollback();
                    }
                    Err(e.into())
                }
            },
            None => {
                let mut txn = self.repo.store().begin_write()?;
                match op(&mut txn) {
                    Ok(out) => {
                        txn.commit()?;
                        Ok(out)
                    }
                    Err(e) => {
                        txn.rollback();
                        Err(e.into())
                    }
                }
            }
        }
    }

    /// Add one statement; false if it was already present
    pub fn add(&mut self, statement: &Statement) -> Result<bool> {
        self.mutate(|txn| txn.add(statement))
    }

    /// Add every statement of a parsed stream.
    ///
    /// In strict mode the first parse error aborts: nothing from the stream
    /// is kept and an explicit transaction is rolled back. In lenient mode
    /// malformed items are logged and skipped.
    pub fn add_all<I>(&mut self, stream: I, mode: ParseMode) -> Result<IngestReport>
    where
        I: IntoIterator<Item = std::result::Result<Statement, ParseError>>,
    {
        let id = self.id;
        self.mutate(|txn| {
            let mut report = IngestReport::default();
            for item in stream {
                match item {
                    Ok(statement) => {
                        if txn.add(&statement)? {
                            report.added += 1;
                        } else {
                            report.duplicates += 1;
                        }
                    }
                    Err(e) if mode == ParseMode::Lenient => {
                        tracing::warn!(connection = id, error = %e, "skipping malformed statement");
                        report.skipped += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(report)
        })
    }

    /// Remove every statement matching `filter`; returns how many were removed
    pub fn remove(&mut self, filter: &StatementFilter) -> Result<usize> {
        self.mutate(|txn| txn.remove_matching(filter))
    }

    /// Remove one statement; false if it was absent
    pub fn remove_statement(&mut self, statement: &Statement) -> Result<bool> {
        self.mutate(|txn| txn.remove(statement))
    }

    /// Remove every statement in the given graph scope
    pub fn clear(&mut self, context: &ContextFilter) -> Result<usize> {
        self.mutate(|txn| txn.clear(context))
    }

    /// Commit the explicit transaction.
    ///
    /// On failure the transaction is rolled back and the connection returns
    /// to auto-commit mode.
    pub fn commit(&mut self) -> Result<CommitReceipt> {
        self.ensure_open()?;
        let txn = self
            .txn
            .take()
            .ok_or_else(|| ApiError::transaction_state("no active transaction"))?;
        Ok(txn.commit()?)
    }

    /// Discard the explicit transaction
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        let txn = self
            .txn
            .take()
            .ok_or_else(|| ApiError::transaction_state("no active transaction"))?;
        txn.rollback();
        Ok(())
    }

    /// Evaluate an algebra tree lazily.
    ///
    /// The connection stays borrowed until the results are dropped, so no
    /// mutation can interleave with an open evaluation.
    pub fn evaluate<'q>(&'q self, algebra: &'q Algebra) -> Result<QueryResults<'q>> {
        self.evaluate_seeded(algebra, Solution::new())
    }

    /// Evaluate with `seed` as the inherited solution
    pub fn evaluate_seeded<'q>(
        &'q self,
        algebra: &'q Algebra,
        seed: Solution,
    ) -> Result<QueryResults<'q>> {
        self.ensure_open()?;
        let ctx = match self.txn.as_ref() {
            Some(txn) => ExecutionContext::new(Arc::new(txn)),
            None => ExecutionContext::new(Arc::new(self.repo.store().begin_read()?)),
        };
        let ctx = ctx
            .with_resolver(self.repo.resolver().clone())
            .with_options(self.repo.query_options());
        Ok(execute_seeded(algebra, seed, ctx)?)
    }

    /// Number of statements in the given graph scope
    pub fn size(&self, context: &ContextFilter) -> Result<u64> {
        self.ensure_open()?;
        Ok(match self.txn.as_ref() {
            Some(txn) => txn.size(context)?,
            None => self.repo.store().begin_read()?.size(context)?,
        })
    }

    /// Named graphs holding at least one statement
    pub fn contexts(&self) -> Result<Vec<Value>> {
        self.ensure_open()?;
        Ok(match self.txn.as_ref() {
            Some(txn) => txn.contexts()?,
            None => self.repo.store().begin_read()?.contexts()?,
        })
    }

    /// Statements matching `filter`
    pub fn statements(&self, filter: &StatementFilter) -> Result<Vec<Statement>> {
        self.ensure_open()?;
        Ok(match self.txn.as_ref() {
            Some(txn) => txn.statements(filter)?,
            None => self.repo.store().begin_read()?.statements(filter)?,
        })
    }

    /// Roll back any open transaction and release the connection. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(txn) = self.txn.take() {
            tracing::warn!(connection = self.id, "closing connection with open transaction; rolling back");
            txn.rollback();
        }
        self.closed = true;
        self.repo.release(self.id);
    }
}

impl Drop for Connection<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
