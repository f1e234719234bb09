use anyhow::anyhow;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

use super::lifecycle::{MoveEvent, MoveTracker};
use super::types::{AbortReason, IgnoreReason, MoveError, MoveOutcome, MoveRequest};
use crate::board::{BoardModel, GroupHeader, GroupValue, Record, RecordId};
use crate::confirmation::{
    ConfirmationGateway, ConfirmationRequest, ConfirmedTransition, SubjectKind, SubjectRef,
    TransitionOutcome,
};
use crate::notification::BoardBus;
use crate::telemetry::{create_move_span, generate_correlation_id};
use crate::transaction::{TransactionError, TransactionGuard};

/// Where an optimistically relocated card came from
struct Relocation {
    original: Record,
    origin_index: usize,
    moved: Record,
}

/// Result of the confirming phase
enum Verdict {
    Proceed(Option<ConfirmedTransition>),
    Abort(AbortReason),
}

/// Drives a drag-and-drop gesture from validation to commit or rollback
pub struct MoveOrchestrator {
    board: Arc<dyn BoardModel>,
    guard: Arc<TransactionGuard>,
    gateway: Arc<ConfirmationGateway>,
    bus: BoardBus,
    state_field: String,
    subject_kind: SubjectKind,
}

impl MoveOrchestrator {
    pub fn new(
        board: Arc<dyn BoardModel>,
        guard: Arc<TransactionGuard>,
        gateway: Arc<ConfirmationGateway>,
        bus: BoardBus,
        state_field: impl Into<String>,
        subject_kind: SubjectKind,
    ) -> Self {
        Self {
            board,
            guard,
            gateway,
            bus,
            state_field: state_field.into(),
            subject_kind,
        }
    }

    pub fn guard(&self) -> &Arc<TransactionGuard> {
        &self.guard
    }

    /// Move a card and wait until the move is resolved.
    ///
    /// Stays pending while the check in/out wizard is open. Duplicate gestures and stale
    /// column references resolve to [`MoveOutcome::Ignored`].
    pub async fn move_record(&self, request: MoveRequest) -> Result<MoveOutcome, MoveError> {
        let correlation_id = generate_correlation_id();
        let span = create_move_span(
            &request.record_id,
            &request.source_group,
            &request.target_group,
            &correlation_id,
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: MoveRequest) -> Result<MoveOutcome, MoveError> {
        let (Some(source), Some(target)) = (
            self.board.group(&request.source_group),
            self.board.group(&request.target_group),
        ) else {
            debug!("Column no longer on the board, move ignored");
            return Ok(MoveOutcome::Ignored(IgnoreReason::StaleGroups));
        };
        let Some(record) = self.board.record(&source.id, &request.record_id) else {
            debug!("Card left its column, move ignored");
            return Ok(MoveOutcome::Ignored(IgnoreReason::RecordMissing));
        };

        match self.guard.start(&request.record_id) {
            Ok(()) => {}
            Err(TransactionError::InProgress(_)) => {
                debug!("Card already moving, duplicate gesture ignored");
                return Ok(MoveOutcome::Ignored(IgnoreReason::Locked));
            }
            Err(e) => return Err(e.into()),
        }
        let mut tracker = MoveTracker::new(request.record_id.clone());
        tracker.advance(MoveEvent::LockAcquired);

        if request.is_reorder() {
            return self.finalize(&request, &target, tracker, false, None).await;
        }

        let group_by = self.board.group_by();
        let candidate = target.candidate_value(&group_by);
        let original_value = record.field_value(&group_by.name);

        let relocation = match self.relocate(&request, &group_by.name, &candidate) {
            Ok(relocation) => relocation,
            Err(source) => {
                tracker.advance(MoveEvent::Abort);
                self.release(&request.record_id, false)?;
                return Err(MoveError::Board(source));
            }
        };
        tracker.advance(MoveEvent::Relocated);

        if group_by.name != self.state_field {
            // Plain regrouping: persist the new value, no wizard involved
            if let Err(source) = self
                .board
                .save_group_value(&relocation.moved, &group_by.name, &candidate)
                .await
            {
                warn!(error = %source, field = %group_by.name, "Saving group value failed");
                self.rollback(&request, relocation);
                self.bus.notify();
                tracker.advance(MoveEvent::Abort);
                self.release(&request.record_id, false)?;
                return Err(MoveError::Board(source));
            }
            return self.finalize(&request, &target, tracker, true, None).await;
        }

        if candidate.same_value(&original_value) {
            debug!("Attendance type unchanged, no confirmation needed");
            return self.finalize(&request, &target, tracker, true, None).await;
        }

        let kind = SubjectKind::from_model(&target.res_model).unwrap_or(self.subject_kind);
        let subject = SubjectRef::new(kind, record.res_id);
        match self
            .confirm(subject, &candidate, &original_value, &mut tracker)
            .await
        {
            Ok(Verdict::Proceed(confirmation)) => {
                self.finalize(&request, &target, tracker, true, confirmation)
                    .await
            }
            Ok(Verdict::Abort(reason)) => {
                self.rollback(&request, relocation);
                self.bus.notify();
                tracker.advance(MoveEvent::Abort);
                self.release(&request.record_id, false)?;
                info!(?reason, phases = ?tracker.history(), "Move rolled back");
                Ok(MoveOutcome::Aborted {
                    reason,
                    phases: tracker.into_history(),
                })
            }
            Err(source) => {
                warn!(error = %source, "Confirmation failed, rolling back");
                self.rollback(&request, relocation);
                self.bus.notify();
                tracker.advance(MoveEvent::Abort);
                self.release(&request.record_id, false)?;
                Err(MoveError::Confirmation {
                    record: request.record_id,
                    source,
                })
            }
        }
    }

    /// Optimistically move the card into the target column, right after the reference card
    fn relocate(
        &self,
        request: &MoveRequest,
        field: &str,
        candidate: &GroupValue,
    ) -> anyhow::Result<Relocation> {
        let (original, origin_index) = self
            .board
            .remove_record(&request.source_group, &request.record_id)
            .ok_or_else(|| {
                anyhow!(
                    "Record {} is not in group {}",
                    request.record_id,
                    request.source_group
                )
            })?;

        let index = request
            .ref_record
            .as_ref()
            .and_then(|after| self.board.position_of(&request.target_group, after))
            .map_or(0, |i| i + 1);
        let mut moved = original.clone();
        moved.data.insert(field.to_string(), candidate.to_json());

        if let Err(e) = self
            .board
            .insert_record(&request.target_group, moved.clone(), index)
        {
            if let Err(restore) =
                self.board
                    .insert_record(&request.source_group, original, origin_index)
            {
                error!(error = %restore, "Card lost while undoing a failed relocation");
            }
            return Err(e);
        }

        debug!(index, "Card relocated");
        Ok(Relocation {
            original,
            origin_index,
            moved,
        })
    }

    /// Put the card back where it was before the move started
    fn rollback(&self, request: &MoveRequest, relocation: Relocation) {
        if self
            .board
            .remove_record(&request.target_group, &request.record_id)
            .is_none()
        {
            warn!("Relocated card missing from target column during rollback");
        }
        if let Err(e) = self.board.insert_record(
            &request.source_group,
            relocation.original,
            relocation.origin_index,
        ) {
            error!(error = %e, "Failed to restore card to its column");
        }
    }

    async fn confirm(
        &self,
        subject: SubjectRef,
        candidate: &GroupValue,
        original: &GroupValue,
        tracker: &mut MoveTracker,
    ) -> anyhow::Result<Verdict> {
        if !self.gateway.requires_confirmation(subject, candidate).await? {
            debug!(subject_id = subject.id, "Attendance type switched without wizard");
            return Ok(Verdict::Proceed(None));
        }

        tracker.advance(MoveEvent::ConfirmationRequested);
        let request = ConfirmationRequest::transition(subject, candidate.clone());
        match self.gateway.request(&request).await? {
            TransitionOutcome::Cancelled => Ok(Verdict::Abort(AbortReason::Cancelled)),
            TransitionOutcome::ClosedWithoutSave => {
                Ok(Verdict::Abort(AbortReason::ClosedWithoutSave))
            }
            TransitionOutcome::Confirmed(confirmation) => {
                let effective = self.gateway.current_state_id(subject).await?;
                if effective == original.relation_id() {
                    return Ok(Verdict::Abort(AbortReason::NoEffectiveChange));
                }
                Ok(Verdict::Proceed(Some(confirmation)))
            }
        }
    }

    async fn finalize(
        &self,
        request: &MoveRequest,
        target: &GroupHeader,
        mut tracker: MoveTracker,
        relocated: bool,
        confirmation: Option<ConfirmedTransition>,
    ) -> Result<MoveOutcome, MoveError> {
        match self.refresh(request, target, relocated).await {
            Ok(()) => {
                self.bus.notify();
                tracker.advance(MoveEvent::Commit);
                self.release(&request.record_id, true)?;
                info!(phases = ?tracker.history(), "Move committed");
                Ok(MoveOutcome::Committed {
                    phases: tracker.into_history(),
                    confirmation,
                })
            }
            Err(source) => {
                warn!(error = %source, "Refreshing the board after a move failed");
                self.bus.notify();
                tracker.advance(MoveEvent::Abort);
                self.release(&request.record_id, false)?;
                Err(MoveError::Finalize {
                    record: request.record_id.clone(),
                    source,
                })
            }
        }
    }

    /// Reload record and progress counters concurrently, then persist the column order
    async fn refresh(
        &self,
        request: &MoveRequest,
        target: &GroupHeader,
        relocated: bool,
    ) -> anyhow::Result<()> {
        if relocated {
            let mut groups = vec![request.source_group.clone()];
            if !target.is_folded {
                groups.push(target.id.clone());
            }
            let reload = async {
                if target.is_folded {
                    Ok(())
                } else {
                    self.board.reload_record(&target.id, &request.record_id).await
                }
            };
            tokio::try_join!(reload, self.board.update_progress(&groups))?;
        }

        if !target.is_folded {
            self.board
                .resequence(&target.id, &request.record_id, request.ref_record.as_ref())
                .await?;
        }
        Ok(())
    }

    fn release(&self, record: &RecordId, commit: bool) -> Result<(), MoveError> {
        let released = if commit {
            self.guard.commit(record)
        } else {
            self.guard.abort(record)
        };
        released.map_err(|e| {
            error!(error = %e, "Transaction released twice");
            MoveError::from(e)
        })
    }
}
