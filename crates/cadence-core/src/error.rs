use crate::slot::SlotKind;

/// Faults raised by the evaluation engine.
///
/// The consistency variants mean the hook function broke the stable call
/// order contract: the sequence of primitive calls must be identical on
/// every pass. They halt the runtime permanently. The remaining variants
/// are host protocol misuse and leave the runtime in its current phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    #[error("slot {index}: expected {expected} slot, found {found}")]
    KindMismatch {
        index: usize,
        expected: SlotKind,
        found: SlotKind,
    },

    #[error("slot {index}: stored payload type does not match the call site")]
    PayloadMismatch { index: usize },

    #[error("slot {index}: dependency capture shape changed between passes")]
    CaptureShape { index: usize },

    #[error("pass visited {visited} slots but the store holds {stored}")]
    CursorMismatch { visited: usize, stored: usize },

    #[error("slot allocated past the cursor outside the initialize pass")]
    LateAllocation,

    #[error("slot {index} does not exist")]
    MissingSlot { index: usize },

    #[error("initialize requested on an already initialized instance")]
    AlreadyInitialized,

    #[error("pass requested before initialize")]
    NotInitialized,

    #[error("pass or mutation requested after finalize")]
    Finalized,

    #[error("host entry point called from inside a running pass")]
    Reentrant,
}

impl Fault {
    /// Whether this fault poisons the runtime (stable call order broken)
    /// rather than reporting a rejected host request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Fault::KindMismatch { .. }
                | Fault::PayloadMismatch { .. }
                | Fault::CaptureShape { .. }
                | Fault::CursorMismatch { .. }
                | Fault::LateAllocation
                | Fault::MissingSlot { .. }
        )
    }
}
