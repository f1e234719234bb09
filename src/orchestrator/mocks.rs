// Recording fakes for orchestrator tests - no network, no dialogs

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use crate::board::{Group, GroupByField, KanbanBoard, Record};
use crate::remote::{ActionPresenter, Domain, RemoteCall};

/// A remote call as seen by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub model: String,
    pub method: String,
    pub args: Vec<Value>,
    pub context: Map<String, Value>,
}

/// Backend fake answering the calls a board move makes
#[derive(Debug)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<RecordedCall>>,
    pub needs_wizard: Mutex<bool>,
    pub effective_state: Mutex<Option<i64>>,
    pub failing: Mutex<HashSet<String>>,
    pub rows: Mutex<HashMap<i64, Value>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            needs_wizard: Mutex::new(true),
            effective_state: Mutex::new(None),
            failing: Mutex::new(HashSet::new()),
            rows: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_needs_wizard(&self, needed: bool) {
        *self.needs_wizard.lock().unwrap() = needed;
    }

    /// Attendance type reported after the wizard closed
    pub fn set_effective_state(&self, state: Option<i64>) {
        *self.effective_state.lock().unwrap() = state;
    }

    pub fn fail_method(&self, method: &str) {
        self.failing.lock().unwrap().insert(method.to_string());
    }

    pub fn set_row(&self, res_id: i64, row: Value) {
        self.rows.lock().unwrap().insert(res_id, row);
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.method.clone())
            .collect()
    }

    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    fn record(&self, model: &str, method: &str, args: Vec<Value>, context: Map<String, Value>) -> Result<()> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            method: method.to_string(),
            args,
            context,
        });
        if self.failing.lock().unwrap().contains(method) {
            return Err(anyhow!("{method} failed on {model}"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCall for FakeBackend {
    async fn search_read(
        &self,
        model: &str,
        domain: Domain,
        _fields: Vec<String>,
        _limit: Option<usize>,
    ) -> Result<Vec<Value>> {
        self.record(model, "search_read", domain.clone(), Map::new())?;
        let res_id = domain
            .first()
            .and_then(|leaf| leaf.get(2))
            .and_then(Value::as_i64)
            .unwrap_or_default();
        let row = self
            .rows
            .lock()
            .unwrap()
            .get(&res_id)
            .cloned()
            .unwrap_or_else(|| json!({"id": res_id}));
        Ok(vec![row])
    }

    async fn call(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        context: Map<String, Value>,
    ) -> Result<Value> {
        self.record(model, method, args, context)?;
        Ok(match method {
            "action_check_in_out_wizard" => json!({
                "type": "ir.actions.act_window",
                "res_model": "hr.attendance.check.wizard",
                "target": "new",
            }),
            "action_update_attendance_type" => json!(*self.needs_wizard.lock().unwrap()),
            "get_attendance_type_id" => self
                .effective_state
                .lock()
                .unwrap()
                .map_or(Value::Bool(false), Value::from),
            "read_progress_bar" => json!({
                "1": {"checked_out": 2},
                "2": {"checked_in": 1},
            }),
            _ => json!(true),
        })
    }
}

/// Presenter closing each dialog with the next scripted result
#[derive(Debug, Default)]
pub struct ScriptedPresenter {
    pub closes: Mutex<VecDeque<Option<Value>>>,
    pub shown: Mutex<Vec<Value>>,
}

impl ScriptedPresenter {
    pub fn closing_with(result: Option<Value>) -> Self {
        let presenter = Self::default();
        presenter.closes.lock().unwrap().push_back(result);
        presenter
    }

    pub fn shown_count(&self) -> usize {
        self.shown.lock().unwrap().len()
    }
}

#[async_trait]
impl ActionPresenter for ScriptedPresenter {
    async fn do_action(&self, action: Value) -> Result<Option<Value>> {
        self.shown.lock().unwrap().push(action);
        Ok(self.closes.lock().unwrap().pop_front().flatten())
    }
}

pub fn saved_wizard() -> Value {
    json!({
        "type": "ir.actions.act_window_close",
        "infos": {"attendanceId": 501, "employeeId": 11},
    })
}

fn attendance(id: i64, name: &str) -> Value {
    json!([id, name])
}

/// Three columns: not checked in (r1, r2), checked in (r3) and a folded home office column
pub fn attendance_groups() -> Vec<Group> {
    vec![
        Group::new("g_out", "hr.employee", json!(1), "Not checked in")
            .with_record(Record::new("r1", 11).with_field("attendance_type_id", attendance(1, "Not checked in")))
            .with_record(Record::new("r2", 12).with_field("attendance_type_id", attendance(1, "Not checked in"))),
        Group::new("g_in", "hr.employee", json!(2), "Checked in")
            .with_record(Record::new("r3", 13).with_field("attendance_type_id", attendance(2, "Checked in"))),
        Group::new("g_home", "hr.employee", json!(3), "Home office").folded(true),
    ]
}

pub fn attendance_board(backend: Arc<FakeBackend>) -> Arc<KanbanBoard> {
    Arc::new(KanbanBoard::new(
        "hr.employee",
        GroupByField::relational("attendance_type_id"),
        attendance_groups(),
        backend,
    ))
}
