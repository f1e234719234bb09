// Move request, outcome and error types

use thiserror::Error;

use super::lifecycle::MovePhase;
use crate::board::{GroupId, RecordId};
use crate::confirmation::ConfirmedTransition;
use crate::transaction::TransactionError;

/// A drag-and-drop gesture delivered by the host view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub record_id: RecordId,
    pub source_group: GroupId,
    pub target_group: GroupId,
    /// Card the moved card was dropped right after, `None` for the head of the column
    pub ref_record: Option<RecordId>,
}

impl MoveRequest {
    pub fn new(
        record_id: impl Into<RecordId>,
        source_group: impl Into<GroupId>,
        target_group: impl Into<GroupId>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            source_group: source_group.into(),
            target_group: target_group.into(),
            ref_record: None,
        }
    }

    pub fn after(mut self, ref_record: impl Into<RecordId>) -> Self {
        self.ref_record = Some(ref_record.into());
        self
    }

    pub fn is_reorder(&self) -> bool {
        self.source_group == self.target_group
    }
}

/// Why a gesture was dropped before anything happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Source or target column no longer exists
    StaleGroups,
    /// The card is not in the source column anymore
    RecordMissing,
    /// Another move of the same card is still in flight
    Locked,
}

/// Why a started move was rolled back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Cancel button of the wizard
    Cancelled,
    /// Wizard dismissed without a result
    ClosedWithoutSave,
    /// Wizard saved but the attendance type did not change
    NoEffectiveChange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    Committed {
        phases: Vec<MovePhase>,
        /// Present when the move went through the wizard
        confirmation: Option<ConfirmedTransition>,
    },
    Aborted {
        reason: AbortReason,
        phases: Vec<MovePhase>,
    },
    Ignored(IgnoreReason),
}

impl MoveOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, MoveOutcome::Committed { .. })
    }

    pub fn phases(&self) -> &[MovePhase] {
        match self {
            MoveOutcome::Committed { phases, .. } | MoveOutcome::Aborted { phases, .. } => phases,
            MoveOutcome::Ignored(_) => &[],
        }
    }
}

#[derive(Error, Debug)]
pub enum MoveError {
    /// Commit or abort without an active transaction
    #[error("Transaction invariant violated: {0}")]
    Transaction(#[from] TransactionError),

    /// Failure while asking for confirmation; the card is already back in its column
    #[error("Confirming the move of {record} failed: {source}")]
    Confirmation {
        record: RecordId,
        #[source]
        source: anyhow::Error,
    },

    /// Failure after the backend accepted the move
    #[error("Finalizing the move of {record} failed: {source}")]
    Finalize {
        record: RecordId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Board update failed: {0}")]
    Board(#[source] anyhow::Error),
}
