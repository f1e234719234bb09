// In-memory kanban board backed by the remote model

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::traits::BoardModel;
use super::types::{
    Group, GroupByField, GroupHeader, GroupId, GroupValue, ProgressData, Record, RecordId,
};
use crate::remote::RemoteCall;

const PROGRESS_METHOD: &str = "read_progress_bar";
const RESEQUENCE_METHOD: &str = "web_resequence";
const SEQUENCE_FIELD: &str = "sequence";

/// Grouped columns of one board session
pub struct KanbanBoard {
    res_model: String,
    group_by: GroupByField,
    groups: Mutex<Vec<Group>>,
    remote: Arc<dyn RemoteCall>,
}

impl KanbanBoard {
    pub fn new(
        res_model: impl Into<String>,
        group_by: GroupByField,
        groups: Vec<Group>,
        remote: Arc<dyn RemoteCall>,
    ) -> Self {
        Self {
            res_model: res_model.into(),
            group_by,
            groups: Mutex::new(groups),
            remote,
        }
    }

    pub fn res_model(&self) -> &str {
        &self.res_model
    }

    /// Copy of the current columns
    pub fn groups(&self) -> Vec<Group> {
        self.lock().clone()
    }

    /// Ids of a column's records, in display order
    pub fn record_ids(&self, group: &GroupId) -> Vec<RecordId> {
        self.lock()
            .iter()
            .find(|g| g.id() == group)
            .map(Group::record_ids)
            .unwrap_or_default()
    }

    pub fn progress(&self, group: &GroupId) -> Option<ProgressData> {
        self.lock()
            .iter()
            .find(|g| g.id() == group)
            .and_then(|g| g.progress.clone())
    }

    /// Swap in freshly loaded columns, e.g. after the host re-rendered the view
    pub fn replace_groups(&self, groups: Vec<Group>) {
        *self.lock() = groups;
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Group>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find_res_id(&self, record: &RecordId) -> Option<i64> {
        self.lock()
            .iter()
            .flat_map(|g| g.records.iter())
            .find(|r| &r.id == record)
            .map(|r| r.res_id)
    }
}

#[async_trait]
impl BoardModel for KanbanBoard {
    fn group_by(&self) -> GroupByField {
        self.group_by.clone()
    }

    fn group(&self, group: &GroupId) -> Option<GroupHeader> {
        self.lock()
            .iter()
            .find(|g| g.id() == group)
            .map(|g| g.header.clone())
    }

    fn record(&self, group: &GroupId, record: &RecordId) -> Option<Record> {
        self.lock()
            .iter()
            .find(|g| g.id() == group)
            .and_then(|g| g.record(record).cloned())
    }

    fn position_of(&self, group: &GroupId, record: &RecordId) -> Option<usize> {
        self.lock()
            .iter()
            .find(|g| g.id() == group)
            .and_then(|g| g.position_of(record))
    }

    fn remove_record(&self, group: &GroupId, record: &RecordId) -> Option<(Record, usize)> {
        self.lock()
            .iter_mut()
            .find(|g| g.id() == group)
            .and_then(|g| g.remove_record(record))
    }

    fn insert_record(&self, group: &GroupId, record: Record, index: usize) -> Result<()> {
        let mut groups = self.lock();
        let target = groups
            .iter_mut()
            .find(|g| g.id() == group)
            .ok_or_else(|| anyhow!("Group {group} is no longer on the board"))?;
        target.add_record(record, index);
        Ok(())
    }

    async fn save_group_value(
        &self,
        record: &Record,
        field: &str,
        value: &GroupValue,
    ) -> Result<()> {
        let mut vals = Map::new();
        vals.insert(field.to_string(), value.write_value());
        self.remote
            .call(
                &self.res_model,
                "write",
                vec![json!([record.res_id]), Value::Object(vals)],
                Map::new(),
            )
            .await?;

        let mut groups = self.lock();
        if let Some(local) = groups
            .iter_mut()
            .flat_map(|g| g.records.iter_mut())
            .find(|r| r.id == record.id)
        {
            local.data.insert(field.to_string(), value.to_json());
        }
        Ok(())
    }

    async fn reload_record(&self, group: &GroupId, record: &RecordId) -> Result<()> {
        let res_id = self
            .find_res_id(record)
            .ok_or_else(|| anyhow!("Record {record} is no longer on the board"))?;

        let rows = self
            .remote
            .search_read(&self.res_model, vec![json!(["id", "=", res_id])], Vec::new(), Some(1))
            .await?;
        let Some(Value::Object(fresh)) = rows.into_iter().next() else {
            warn!(record_id = %record, res_id, "Record vanished from the backend during reload");
            return Ok(());
        };

        let mut groups = self.lock();
        let local = groups
            .iter_mut()
            .filter(|g| g.id() == group)
            .flat_map(|g| g.records.iter_mut())
            .find(|r| &r.id == record);
        match local {
            Some(local) => {
                for (key, value) in fresh {
                    local.data.insert(key, value);
                }
                debug!(record_id = %record, group = %group, "Record reloaded");
            }
            None => debug!(record_id = %record, group = %group, "Reloaded record left the group"),
        }
        Ok(())
    }

    async fn update_progress(&self, groups: &[GroupId]) -> Result<()> {
        let keys: Vec<(GroupId, String)> = {
            let board = self.lock();
            board
                .iter()
                .filter(|g| groups.contains(g.id()))
                .map(|g| (g.id().clone(), g.header.progress_key()))
                .collect()
        };
        if keys.is_empty() {
            return Ok(());
        }

        let mut context = Map::new();
        context.insert("group_by".to_string(), json!(self.group_by.name));
        context.insert(
            "group_keys".to_string(),
            json!(keys.iter().map(|(_, key)| key.clone()).collect::<Vec<_>>()),
        );
        let response = self
            .remote
            .call(&self.res_model, PROGRESS_METHOD, Vec::new(), context)
            .await?;

        let mut board = self.lock();
        for (group_id, key) in keys {
            let counts: BTreeMap<String, u64> = response
                .get(&key)
                .and_then(Value::as_object)
                .map(|states| {
                    states
                        .iter()
                        .filter_map(|(state, count)| Some((state.clone(), count.as_u64()?)))
                        .collect()
                })
                .unwrap_or_default();
            if let Some(group) = board.iter_mut().find(|g| g.id() == &group_id) {
                group.progress = Some(ProgressData { counts });
            }
        }
        Ok(())
    }

    async fn resequence(
        &self,
        group: &GroupId,
        record: &RecordId,
        after: Option<&RecordId>,
    ) -> Result<()> {
        let res_ids: Vec<i64> = {
            let mut board = self.lock();
            let column = board
                .iter_mut()
                .find(|g| g.id() == group)
                .ok_or_else(|| anyhow!("Group {group} is no longer on the board"))?;
            let (moved, _) = column
                .remove_record(record)
                .ok_or_else(|| anyhow!("Record {record} is not in group {group}"))?;
            let index = after
                .and_then(|after| column.position_of(after))
                .map_or(0, |i| i + 1);
            column.add_record(moved, index);
            column.records.iter().map(|r| r.res_id).collect()
        };

        let mut context = Map::new();
        context.insert("field".to_string(), json!(SEQUENCE_FIELD));
        self.remote
            .call(&self.res_model, RESEQUENCE_METHOD, vec![json!(res_ids)], context)
            .await?;
        debug!(record_id = %record, group = %group, "Group resequenced");
        Ok(())
    }
}
