//! Operator trait and base types for query execution
//!
//! Operators form a tree that produces solutions one at a time through the
//! `open/next/close` lifecycle pattern. Evaluation is strictly pull-based:
//! an operator only does work when its consumer asks for the next solution.

use crate::binding::Solution;
use crate::context::ExecutionContext;
use crate::error::{QueryError, Result};

/// Query execution operator
///
/// Operators follow a lifecycle pattern for resource control:
/// 1. `open()` - Initialize state, open children
/// 2. `next()` - Pull solutions until exhausted (returns None)
/// 3. `close()` - Release resources; idempotent
///
/// Every solution an operator emits extends the seed solution it was built
/// with, so correlated subtrees see their outer bindings.
pub trait Operator<'a> {
    /// Initialize operator state
    fn open(&mut self, ctx: &ExecutionContext<'a>) -> Result<()>;

    /// Pull the next solution; `Ok(None)` when exhausted
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> Result<Option<Solution>>;

    /// Release resources and close children
    fn close(&mut self);
}

/// Boxed operator for dynamic dispatch
pub type BoxedOperator<'a> = Box<dyn Operator<'a> + 'a>;

/// Operator state for lifecycle tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    /// Not yet opened
    Created,
    /// Opened and ready to produce solutions
    Open,
    /// Exhausted (next returned None)
    Exhausted,
    /// Closed
    Closed,
}

impl OperatorState {
    /// Error unless the operator may be opened
    pub fn check_open(&self) -> Result<()> {
        match self {
            OperatorState::Created => Ok(()),
            OperatorState::Closed => Err(QueryError::OperatorClosed),
            _ => Err(QueryError::OperatorAlreadyOpened),
        }
    }

    /// Whether `next` should produce: errors before `open`, false once done
    pub fn check_next(&self) -> Result<bool> {
        match self {
            OperatorState::Created => Err(QueryError::OperatorNotOpened),
            OperatorState::Open => Ok(true),
            OperatorState::Exhausted | OperatorState::Closed => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_checks() {
        assert!(OperatorState::Created.check_open().is_ok());
        assert!(matches!(
            OperatorState::Open.check_open(),
            Err(QueryError::OperatorAlreadyOpened)
        ));
        assert!(matches!(
            OperatorState::Created.check_next(),
            Err(QueryError::OperatorNotOpened)
        ));
        assert!(!OperatorState::Closed.check_next().unwrap());
        assert!(OperatorState::Open.check_next().unwrap());
    }
}
