//! Errors raised by the timeline and its backing stores.

use thiserror::Error;

use crate::branch::{BranchId, Tick};

/// Failures of the temporal cache and the branch arena.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    /// Nothing was recorded for the key at the requested time or any ancestor time.
    #[error("not found: {0}")]
    NotFound(String),

    /// A write landed behind the tip of its branch.
    #[error("write at tick {tick} is behind the tip {tip} of branch {branch}")]
    BehindTip {
        branch: BranchId,
        tick: Tick,
        tip: Tick,
    },

    /// A write on a parent at or before the tick a child forked from it.
    #[error("write at tick {tick} of branch {branch} would change the past of {child}, forked at {fork_tick}")]
    ForkedPast {
        branch: BranchId,
        tick: Tick,
        child: BranchId,
        fork_tick: Tick,
    },

    /// Some other internal invariant no longer holds.
    #[error("corrupt timeline: {0}")]
    Corruption(String),

    /// The backing store failed to read or write.
    #[error("backing store failure: {0}")]
    Store(String),
}

impl TimelineError {
    /// Build a [`TimelineError::NotFound`] from anything displayable.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        TimelineError::NotFound(what.to_string())
    }

    /// Whether this error is one of the corruption kinds.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            TimelineError::BehindTip { .. }
                | TimelineError::ForkedPast { .. }
                | TimelineError::Corruption(_)
        )
    }
}

pub type TimelineResult<T> = Result<T, TimelineError>;
