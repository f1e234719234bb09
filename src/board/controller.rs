// Attendance board assembly
//
// Wires the kanban board, transaction guard, confirmation gateway, move orchestrator and
// notification bus of one board session together and forwards host gestures to them.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use super::kanban::KanbanBoard;
use super::types::{Group, GroupByField};
use crate::config::{AttendanceBoardConfig, BoardConfig};
use crate::confirmation::{
    dialog_channel, ConfirmationGateway, ConfirmationRequest, DialogReceiver, TransitionOutcome,
};
use crate::inspector::EmployeeInspector;
use crate::notification::BoardBus;
use crate::orchestrator::{MoveError, MoveOrchestrator, MoveOutcome, MoveRequest};
use crate::remote::{ActionPresenter, RemoteCall};
use crate::transaction::TransactionGuard;

/// One attendance kanban session
pub struct AttendanceBoard {
    config: BoardConfig,
    remote: Arc<dyn RemoteCall>,
    board: Arc<KanbanBoard>,
    bus: BoardBus,
    gateway: Arc<ConfirmationGateway>,
    orchestrator: MoveOrchestrator,
}

impl AttendanceBoard {
    pub fn new(
        config: &BoardConfig,
        remote: Arc<dyn RemoteCall>,
        presenter: Arc<dyn ActionPresenter>,
        group_by: GroupByField,
        groups: Vec<Group>,
    ) -> Self {
        let board = Arc::new(KanbanBoard::new(
            config.subject.model(),
            group_by,
            groups,
            remote.clone(),
        ));
        let bus = BoardBus::new();
        let gateway = Arc::new(ConfirmationGateway::new(remote.clone(), presenter));
        let orchestrator = MoveOrchestrator::new(
            board.clone(),
            Arc::new(TransactionGuard::new()),
            gateway.clone(),
            bus.clone(),
            config.state_field.clone(),
            config.subject,
        );
        debug!(model = config.subject.model(), state_field = %config.state_field, "Attendance board assembled");

        Self {
            config: config.clone(),
            remote,
            board,
            bus,
            gateway,
            orchestrator,
        }
    }

    /// Board whose dialogs are answered by the host through the returned receiver
    pub fn with_dialogs(
        config: &AttendanceBoardConfig,
        remote: Arc<dyn RemoteCall>,
        group_by: GroupByField,
        groups: Vec<Group>,
    ) -> (Self, DialogReceiver) {
        let (presenter, dialogs) = dialog_channel(config.dialog.channel_capacity);
        let board = Self::new(&config.board, remote, Arc::new(presenter), group_by, groups);
        (board, dialogs)
    }

    /// Drag-and-drop gesture
    pub async fn on_drop(&self, request: MoveRequest) -> Result<MoveOutcome, MoveError> {
        self.orchestrator.move_record(request).await
    }

    /// Check in/out button: free wizard for the user's own employee
    pub async fn check_in_out(&self, uid: i64) -> Result<TransitionOutcome> {
        let subject = self
            .gateway
            .resolve_current_subject(self.config.subject, uid)
            .await?;
        if subject.is_none() {
            debug!(uid, "No employee linked to the user, wizard opens without one");
        }

        let request =
            ConfirmationRequest::manual(self.config.subject, subject.map(|subject| subject.id));
        let outcome = self.gateway.request(&request).await?;
        info!(uid, ?outcome, "Check in/out finished");
        self.bus.notify();
        Ok(outcome)
    }

    /// Inspector panel kept current by this board's notifications
    pub fn attach_inspector(&self, uid: i64) -> Arc<EmployeeInspector> {
        let inspector = EmployeeInspector::new(self.remote.clone(), uid);
        inspector.attach(&self.bus);
        inspector
    }

    /// Swap in columns loaded by the host and let satellite views catch up
    pub fn reload(&self, groups: Vec<Group>) {
        self.board.replace_groups(groups);
        self.bus.notify();
    }

    pub fn board(&self) -> &Arc<KanbanBoard> {
        &self.board
    }

    pub fn bus(&self) -> &BoardBus {
        &self.bus
    }

    pub fn guard(&self) -> &Arc<TransactionGuard> {
        self.orchestrator.guard()
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }
}
