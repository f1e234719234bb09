// Employee inspector - side panel with the session user's overtime and leave balances
//
// Refetches everything on each board notification. Holds no state of its own beyond the last
// snapshot.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{debug, warn};

use crate::notification::{BoardBus, SubscriptionId};
use crate::remote::RemoteCall;

const PUBLIC_EMPLOYEE_MODEL: &str = "hr.employee.public";
const LEAVE_TYPE_MODEL: &str = "hr.leave.type";
const LEAVE_DAYS_METHOD: &str = "get_days_all_request";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectedEmployee {
    pub id: i64,
    pub name: String,
    /// Hours, as a float
    #[serde(default)]
    pub total_overtime: f64,
}

/// One leave type row of the time off summary
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveBalance {
    pub name: String,
    pub remaining: Option<f64>,
    pub allocated: Option<f64>,
    pub taken: Option<f64>,
    pub raw: Value,
}

impl LeaveBalance {
    /// Parse a `[name, {details}, ...]` row
    fn from_row(row: &Value) -> Option<Self> {
        let name = row.get(0)?.as_str()?.to_string();
        let details = row.get(1).and_then(Value::as_object);
        let amount = |key: &str| details.and_then(|d| d.get(key)).and_then(Value::as_f64);
        Some(Self {
            name,
            remaining: amount("remaining_leaves"),
            allocated: amount("max_leaves"),
            taken: amount("leaves_taken"),
            raw: row.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InspectorSnapshot {
    pub employee: Option<InspectedEmployee>,
    pub holidays: Vec<LeaveBalance>,
    /// Completed refreshes
    pub refreshes: u64,
}

impl InspectorSnapshot {
    pub fn overtime_display(&self) -> Option<String> {
        self.employee
            .as_ref()
            .map(|employee| format_float_time(employee.total_overtime))
    }
}

pub struct EmployeeInspector {
    remote: Arc<dyn RemoteCall>,
    uid: i64,
    state: RwLock<InspectorSnapshot>,
}

impl EmployeeInspector {
    pub fn new(remote: Arc<dyn RemoteCall>, uid: i64) -> Arc<Self> {
        Arc::new(Self {
            remote,
            uid,
            state: RwLock::new(InspectorSnapshot::default()),
        })
    }

    /// Refresh on every board notification for as long as the inspector is alive
    pub fn attach(self: &Arc<Self>, bus: &BoardBus) -> SubscriptionId {
        let inspector: Weak<Self> = Arc::downgrade(self);
        bus.subscribe(move || {
            let inspector = inspector.clone();
            async move {
                let Some(inspector) = inspector.upgrade() else {
                    return;
                };
                if let Err(e) = inspector.refresh().await {
                    warn!(uid = inspector.uid, error = %e, "Employee inspector refresh failed");
                }
            }
        })
    }

    pub async fn refresh(&self) -> Result<()> {
        let rows = self
            .remote
            .search_read(
                PUBLIC_EMPLOYEE_MODEL,
                vec![json!(["user_id", "=", self.uid])],
                vec![
                    "id".to_string(),
                    "name".to_string(),
                    "total_overtime".to_string(),
                ],
                Some(1),
            )
            .await?;
        let Some(row) = rows.into_iter().next() else {
            debug!(uid = self.uid, "No employee linked to the user");
            return Ok(());
        };
        let employee: InspectedEmployee = serde_json::from_value(row)?;

        let mut context = Map::new();
        context.insert("employee_id".to_string(), json!(employee.id));
        let days = self
            .remote
            .call(LEAVE_TYPE_MODEL, LEAVE_DAYS_METHOD, Vec::new(), context)
            .await?;
        let holidays = days
            .as_array()
            .map(|rows| rows.iter().filter_map(LeaveBalance::from_row).collect())
            .unwrap_or_default();

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.employee = Some(employee);
        state.holidays = holidays;
        state.refreshes += 1;
        debug!(uid = self.uid, refreshes = state.refreshes, "Employee inspector refreshed");
        Ok(())
    }

    pub fn snapshot(&self) -> InspectorSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Hours as `HH:MM`, e.g. `7.5` is `07:30` and `-1.25` is `-01:15`
pub fn format_float_time(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let value = value.abs();
    let mut hours = value.floor() as u64;
    let mut minutes = (value.fract() * 60.0).round() as u64;
    if minutes == 60 {
        hours += 1;
        minutes = 0;
    }
    format!("{sign}{hours:02}:{minutes:02}")
}
