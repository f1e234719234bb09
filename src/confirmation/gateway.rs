use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::board::GroupValue;
use crate::remote::{is_truthy, ActionPresenter, RemoteCall};

const WIZARD_METHOD: &str = "action_check_in_out_wizard";
const STATE_CHANGE_METHOD: &str = "action_update_attendance_type";
const CURRENT_STATE_METHOD: &str = "get_attendance_type_id";
const NEXT_STATE_KEY: &str = "default_next_attendance_type_id";

/// Backend entity type addressed by a transition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// Full employee record
    #[default]
    Employee,
    /// Public projection of the employee, readable by every user
    PublicEmployee,
}

impl SubjectKind {
    pub fn model(&self) -> &'static str {
        match self {
            SubjectKind::Employee => "hr.employee",
            SubjectKind::PublicEmployee => "hr.employee.public",
        }
    }

    /// Context key the wizard reads its subject from
    pub fn context_key(&self) -> &'static str {
        match self {
            SubjectKind::Employee => "default_employee_id",
            SubjectKind::PublicEmployee => "default_public_employee_id",
        }
    }

    pub fn from_model(model: &str) -> Option<Self> {
        match model {
            "hr.employee" => Some(SubjectKind::Employee),
            "hr.employee.public" => Some(SubjectKind::PublicEmployee),
            _ => None,
        }
    }
}

/// A concrete entity a transition applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    pub kind: SubjectKind,
    pub id: i64,
}

impl SubjectRef {
    pub fn new(kind: SubjectKind, id: i64) -> Self {
        Self { kind, id }
    }
}

/// What the wizard is opened for
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationRequest {
    pub kind: SubjectKind,
    pub subject_id: Option<i64>,
    pub next_value: Option<GroupValue>,
    pub manual_mode: bool,
}

impl ConfirmationRequest {
    /// Confirmation of a drag between two columns
    pub fn transition(subject: SubjectRef, next_value: GroupValue) -> Self {
        Self {
            kind: subject.kind,
            subject_id: Some(subject.id),
            next_value: Some(next_value),
            manual_mode: false,
        }
    }

    /// Free check in/out, the user picks the new state in the wizard
    pub fn manual(kind: SubjectKind, subject_id: Option<i64>) -> Self {
        Self {
            kind,
            subject_id,
            next_value: None,
            manual_mode: true,
        }
    }

    fn context(&self) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert(
            self.kind.context_key().to_string(),
            self.subject_id.map_or(Value::Bool(false), Value::from),
        );
        // Relations travel as their bare id
        let next = self
            .next_value
            .as_ref()
            .map_or(Value::Bool(false), GroupValue::write_value);
        context.insert(NEXT_STATE_KEY.to_string(), next);
        context
    }
}

/// Data reported by a saved wizard
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedTransition {
    pub attendance_id: Option<i64>,
    pub employee_id: Option<i64>,
    pub raw: Value,
}

impl ConfirmedTransition {
    pub fn from_result(raw: Value) -> Self {
        let infos = raw.get("infos");
        let field = |key: &str| infos.and_then(|i| i.get(key)).and_then(Value::as_i64);
        Self {
            attendance_id: field("attendanceId"),
            employee_id: field("employeeId"),
            raw,
        }
    }
}

/// How the confirmation flow ended
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Confirmed(ConfirmedTransition),
    /// Cancel button
    Cancelled,
    /// Dialog closed without any result
    ClosedWithoutSave,
}

impl TransitionOutcome {
    /// Classify the value a dialog closed with
    pub fn from_close(result: Option<Value>) -> Self {
        match result {
            None => TransitionOutcome::ClosedWithoutSave,
            Some(value) if !is_truthy(&value) => TransitionOutcome::ClosedWithoutSave,
            Some(value) if value.get("special").is_some_and(is_truthy) => {
                TransitionOutcome::Cancelled
            }
            Some(value) => TransitionOutcome::Confirmed(ConfirmedTransition::from_result(value)),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, TransitionOutcome::Confirmed(_))
    }
}

/// Opens the check in/out wizard and reports how it ended.
///
/// The gateway never mutates backend state itself; the wizard does.
pub struct ConfirmationGateway {
    remote: Arc<dyn RemoteCall>,
    presenter: Arc<dyn ActionPresenter>,
}

impl ConfirmationGateway {
    pub fn new(remote: Arc<dyn RemoteCall>, presenter: Arc<dyn ActionPresenter>) -> Self {
        Self { remote, presenter }
    }

    /// Open the wizard and wait until it is dismissed
    pub async fn request(&self, request: &ConfirmationRequest) -> Result<TransitionOutcome> {
        let action = self
            .remote
            .call(
                request.kind.model(),
                WIZARD_METHOD,
                vec![Value::Bool(request.manual_mode)],
                request.context(),
            )
            .await?;
        if !action.is_object() {
            bail!("{WIZARD_METHOD} returned no action for {}", request.kind.model());
        }

        debug!(
            model = request.kind.model(),
            subject_id = ?request.subject_id,
            manual_mode = request.manual_mode,
            "Waiting for check in/out wizard"
        );
        let closed = self.presenter.do_action(action).await?;
        let outcome = TransitionOutcome::from_close(closed);
        info!(subject_id = ?request.subject_id, ?outcome, "Check in/out wizard closed");
        Ok(outcome)
    }

    /// Ask the backend whether moving `subject` to `next` needs the wizard.
    ///
    /// `false` means the backend already applied the new state on its own.
    pub async fn requires_confirmation(&self, subject: SubjectRef, next: &GroupValue) -> Result<bool> {
        let next_id = next
            .relation_id()
            .map_or(Value::Bool(false), Value::from);
        let answer = self
            .remote
            .call(
                subject.kind.model(),
                STATE_CHANGE_METHOD,
                vec![json!([subject.id]), next_id],
                Map::new(),
            )
            .await?;
        Ok(is_truthy(&answer))
    }

    /// Attendance type currently effective on the backend
    pub async fn current_state_id(&self, subject: SubjectRef) -> Result<Option<i64>> {
        let current = self
            .remote
            .call(
                subject.kind.model(),
                CURRENT_STATE_METHOD,
                vec![json!([subject.id])],
                Map::new(),
            )
            .await?;
        Ok(current.as_i64())
    }

    /// Subject linked to a user, if any
    pub async fn resolve_current_subject(
        &self,
        kind: SubjectKind,
        uid: i64,
    ) -> Result<Option<SubjectRef>> {
        let rows = self
            .remote
            .search_read(
                kind.model(),
                vec![json!(["user_id", "=", uid])],
                vec!["id".to_string()],
                Some(1),
            )
            .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("id"))
            .and_then(Value::as_i64)
            .map(|id| SubjectRef::new(kind, id)))
    }
}
