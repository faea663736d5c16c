//! Commit validation hook
//!
//! A constraint layer plugs in as a [`ChangeValidator`]. It sees every
//! statement as it is added and the net change set once at commit; returning
//! an error from either vetoes the transaction, which is then rolled back.

use crate::error::Result;
use crate::statement::Statement;

/// Net effect of a write transaction relative to its base snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Statements absent before and present after the commit
    pub added: Vec<Statement>,
    /// Statements present before and absent after the commit
    pub removed: Vec<Statement>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Validation hook wrapping mutation and commit.
///
/// Implementations should report vetoes with
/// [`Error::validation`](crate::Error::validation).
pub trait ChangeValidator: Send + Sync {
    /// Called for every added statement before it is staged
    fn check_statement(&self, _statement: &Statement) -> Result<()> {
        Ok(())
    }

    /// Called once at commit, before anything is written
    fn validate(&self, changes: &ChangeSet) -> Result<()>;
}
