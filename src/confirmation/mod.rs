// Confirmation gateway - asks the user to confirm an attendance transition through the
// check in/out wizard and reports how the flow ended.

pub mod dialog;
pub mod gateway;

pub use dialog::{dialog_channel, DialogChannel, DialogReceiver, PendingDialog};
pub use gateway::{
    ConfirmationGateway, ConfirmationRequest, ConfirmedTransition, SubjectKind, SubjectRef,
    TransitionOutcome,
};
