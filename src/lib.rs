// Attendance Board Library - confirm-before-commit moves on an attendance kanban
// This exposes the core components for hosts and integration tests

pub mod remote;
pub mod board;
pub mod transaction;
pub mod confirmation;
pub mod orchestrator;
pub mod notification;
pub mod inspector;
pub mod config;
pub mod telemetry;

// Re-export key types for easy access
pub use remote::{ActionPresenter, Domain, RemoteCall};
pub use board::{
    AttendanceBoard, BoardModel, Group, GroupByField, GroupHeader, GroupId, GroupValue,
    KanbanBoard, ProgressData, Record, RecordId,
};
pub use transaction::{
    TransactionError, TransactionEvent, TransactionGuard, TransactionListener, TransactionState,
};
pub use confirmation::{
    dialog_channel, ConfirmationGateway, ConfirmationRequest, ConfirmedTransition, DialogChannel,
    DialogReceiver, PendingDialog, SubjectKind, SubjectRef, TransitionOutcome,
};
pub use orchestrator::{
    AbortReason, IgnoreReason, MoveError, MoveOrchestrator, MoveOutcome, MovePhase, MoveRequest,
};
pub use notification::{BoardBus, SubscriptionId};
pub use inspector::{format_float_time, EmployeeInspector, InspectedEmployee, InspectorSnapshot, LeaveBalance};
pub use crate::config::{AttendanceBoardConfig, BoardConfig, DialogConfig, ObservabilityConfig, config, init_config};
pub use telemetry::{init_telemetry, generate_correlation_id, create_move_span};
