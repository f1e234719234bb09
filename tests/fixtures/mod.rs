/// Test fixtures: a stateful attendance backend and a scripted dialog host
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use attendance_board::{DialogReceiver, Domain, Group, PendingDialog, RemoteCall};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

pub const NOT_CHECKED_IN: i64 = 1;
pub const CHECKED_IN: i64 = 2;
pub const HOME_OFFICE: i64 = 3;

/// Board columns as loaded by the host view
pub fn load_groups() -> Vec<Group> {
    let json_data = include_str!("attendance_board.json");
    serde_json::from_str(json_data).expect("Failed to parse board fixture JSON")
}

fn type_name(id: i64) -> &'static str {
    match id {
        NOT_CHECKED_IN => "Not checked in",
        CHECKED_IN => "Checked in",
        HOME_OFFICE => "Home office",
        _ => "Unknown",
    }
}

/// Backend holding each employee's attendance type.
///
/// Switching between two present types happens directly; checking in or out needs the wizard.
#[derive(Debug)]
pub struct AttendanceBackend {
    attendance: Mutex<HashMap<i64, i64>>,
    users: HashMap<i64, i64>,
    calls: Mutex<Vec<(String, String)>>,
    next_attendance: AtomicI64,
}

impl AttendanceBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            attendance: Mutex::new(HashMap::from([
                (11, NOT_CHECKED_IN),
                (12, NOT_CHECKED_IN),
                (13, CHECKED_IN),
            ])),
            users: HashMap::from([(2, 11)]),
            calls: Mutex::new(Vec::new()),
            next_attendance: AtomicI64::new(100),
        })
    }

    pub fn attendance_type(&self, employee: i64) -> i64 {
        self.attendance.lock().unwrap()[&employee]
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, method)| method.clone())
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.methods().iter().filter(|m| *m == method).count()
    }

    /// What the wizard does when the user saves it
    pub fn save_wizard(&self, action: &Value) -> Value {
        let context = &action["context"];
        let employee = context["default_employee_id"]
            .as_i64()
            .or_else(|| context["default_public_employee_id"].as_i64())
            .expect("wizard opened without an employee");
        let current = self.attendance_type(employee);
        let next = context["default_next_attendance_type_id"]
            .as_i64()
            .unwrap_or(if current == NOT_CHECKED_IN { CHECKED_IN } else { NOT_CHECKED_IN });
        self.attendance.lock().unwrap().insert(employee, next);

        json!({
            "type": "ir.actions.act_window_close",
            "infos": {
                "attendanceId": self.next_attendance.fetch_add(1, Ordering::Relaxed),
                "employeeId": employee,
            },
        })
    }

    fn row(&self, employee: i64) -> Value {
        let current = self.attendance_type(employee);
        json!({"id": employee, "attendance_type_id": [current, type_name(current)]})
    }
}

fn leaf_value(domain: &Domain, field: &str) -> Option<i64> {
    domain
        .iter()
        .find(|leaf| leaf[0] == field)
        .and_then(|leaf| leaf[2].as_i64())
}

#[async_trait]
impl RemoteCall for AttendanceBackend {
    async fn search_read(
        &self,
        model: &str,
        domain: Domain,
        _fields: Vec<String>,
        _limit: Option<usize>,
    ) -> Result<Vec<Value>> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), "search_read".to_string()));

        if let Some(id) = leaf_value(&domain, "id") {
            return Ok(vec![self.row(id)]);
        }
        let uid = leaf_value(&domain, "user_id").ok_or_else(|| anyhow!("Unsupported domain"))?;
        Ok(self
            .users
            .get(&uid)
            .map(|employee| {
                json!({"id": employee, "name": "Abigail Peterson", "total_overtime": 1.5})
            })
            .into_iter()
            .collect())
    }

    async fn call(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        context: Map<String, Value>,
    ) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), method.to_string()));

        match method {
            "action_update_attendance_type" => {
                let employee = args[0][0].as_i64().ok_or_else(|| anyhow!("No employee"))?;
                let next = args[1].as_i64().unwrap_or(NOT_CHECKED_IN);
                let current = self.attendance_type(employee);
                if current == NOT_CHECKED_IN || next == NOT_CHECKED_IN {
                    return Ok(json!(true));
                }
                self.attendance.lock().unwrap().insert(employee, next);
                Ok(json!(false))
            }
            "action_check_in_out_wizard" => Ok(json!({
                "type": "ir.actions.act_window",
                "res_model": "hr.attendance.check.wizard",
                "target": "new",
                "context": context,
            })),
            "get_attendance_type_id" => {
                let employee = args[0][0].as_i64().ok_or_else(|| anyhow!("No employee"))?;
                Ok(json!(self.attendance_type(employee)))
            }
            "read_progress_bar" => {
                let attendance = self.attendance.lock().unwrap();
                let mut counts = Map::new();
                for key in context["group_keys"].as_array().into_iter().flatten() {
                    let Some(key) = key.as_str() else { continue };
                    let total = attendance
                        .values()
                        .filter(|t| t.to_string() == key)
                        .count();
                    counts.insert(key.to_string(), json!({"employees": total}));
                }
                Ok(Value::Object(counts))
            }
            "get_days_all_request" => Ok(json!([
                ["Paid Time Off", {"remaining_leaves": 10.0, "max_leaves": 20.0, "leaves_taken": 10.0}, "day", 1]
            ])),
            "web_resequence" => Ok(json!(true)),
            other => Err(anyhow!("Unexpected call {other} on {model}")),
        }
    }
}

/// How the scripted user closes a dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAnswer {
    Save,
    Cancel,
    Dismiss,
}

pub fn answer(dialog: PendingDialog, backend: &AttendanceBackend, how: HostAnswer) {
    match how {
        HostAnswer::Save => {
            let result = backend.save_wizard(dialog.action());
            dialog.save(result);
        }
        HostAnswer::Cancel => dialog.cancel(),
        HostAnswer::Dismiss => dialog.dismiss(),
    }
}

/// Answer dialogs in order, returning how many were shown
pub fn spawn_host(
    mut dialogs: DialogReceiver,
    backend: Arc<AttendanceBackend>,
    answers: Vec<HostAnswer>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut shown = 0;
        for how in answers {
            let Some(dialog) = dialogs.next().await else {
                break;
            };
            shown += 1;
            answer(dialog, &backend, how);
        }
        shown
    })
}
