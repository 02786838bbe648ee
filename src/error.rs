//! Error taxonomy (§7).
//!
//! Three categories in the specification: `ProgrammerError` (fatal, a bug in
//! the caller — out-of-range segment index, operating on an unassigned
//! segment), `CollaboratorFailure` (an injected dependency failed, e.g.
//! passivator I/O), and `TransientMiss` (not an error at all — an entry
//! present at peek-time evicted before touch, surfaced as `None`, never as
//! `Err`). Only the first two appear in [`ContainerError`].

use std::error::Error as StdError;

/// Errors the container can return. See the module docs for the taxonomy
/// this maps onto.
#[derive(thiserror::Error, Debug)]
pub enum ContainerError {
    /// A caller supplied a segment index outside `[0, segment_count)`. A bug
    /// in the caller, not a runtime condition — logged at `error!` before
    /// being returned.
    #[error("segment index {index} out of range for {segment_count} segments")]
    SegmentOutOfRange {
        /// The offending index.
        index: usize,
        /// The container's configured segment count.
        segment_count: usize,
    },

    /// A caller addressed a segment that is not currently owned by this node
    /// (see `Container::add_segments` / `remove_segments`).
    #[error("segment {index} is not currently assigned to this node")]
    UnassignedSegment {
        /// The offending index.
        index: usize,
    },

    /// An injected collaborator (passivator, activator, expiration manager,
    /// eviction manager) returned an error from inside the atomic compute
    /// step. The in-memory map is left consistent: the mutation that was in
    /// progress is rolled back by the segment's compute machinery before this
    /// error reaches the caller.
    #[error("collaborator failed: {0}")]
    CollaboratorFailure(#[source] Box<dyn StdError + Send + Sync>),
}

impl ContainerError {
    /// True for the `ProgrammerError` category (§7): callers should treat
    /// these as bugs, not retry them.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            ContainerError::SegmentOutOfRange { .. } | ContainerError::UnassignedSegment { .. }
        )
    }
}

/// Result alias used throughout the container's public API.
pub type Result<T> = std::result::Result<T, ContainerError>;
