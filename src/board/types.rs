// Core data types for the kanban board

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Client-side identifier of a record on the board
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Client-side identifier of a column
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for GroupId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Value of the group-by field, as carried by a record or proposed for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroupValue {
    /// Empty field (`false` on the wire)
    Unset,
    /// Many2one style value, `[id, display_name]` on the wire
    Relation { id: i64, display_name: String },
    /// Any other field type
    Scalar(Value),
}

impl GroupValue {
    pub fn relation(id: i64, display_name: impl Into<String>) -> Self {
        GroupValue::Relation {
            id,
            display_name: display_name.into(),
        }
    }

    /// Parse a field value as returned by the backend.
    ///
    /// `false`/`null` are empty, a two element array starting with an integer is a relation.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null | Value::Bool(false) => GroupValue::Unset,
            Value::Array(pair) if pair.len() == 2 && pair[0].is_i64() => GroupValue::Relation {
                id: pair[0].as_i64().unwrap_or_default(),
                display_name: pair[1].as_str().unwrap_or_default().to_string(),
            },
            other => GroupValue::Scalar(other.clone()),
        }
    }

    /// Wire representation used in record data
    pub fn to_json(&self) -> Value {
        match self {
            GroupValue::Unset => Value::Bool(false),
            GroupValue::Relation { id, display_name } => {
                Value::Array(vec![Value::from(*id), Value::from(display_name.clone())])
            }
            GroupValue::Scalar(value) => value.clone(),
        }
    }

    /// Representation expected by a backend `write`
    pub fn write_value(&self) -> Value {
        match self {
            GroupValue::Unset => Value::Bool(false),
            GroupValue::Relation { id, .. } => Value::from(*id),
            GroupValue::Scalar(value) => value.clone(),
        }
    }

    pub fn relation_id(&self) -> Option<i64> {
        match self {
            GroupValue::Relation { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Compare two values ignoring relation display names
    pub fn same_value(&self, other: &GroupValue) -> bool {
        match (self, other) {
            (GroupValue::Relation { id: a, .. }, GroupValue::Relation { id: b, .. }) => a == b,
            (a, b) => a == b,
        }
    }
}

/// The field the board is grouped by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupByField {
    pub name: String,
    pub relational: bool,
}

impl GroupByField {
    pub fn relational(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            relational: true,
        }
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            relational: false,
        }
    }
}

/// A card on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Backend id of the underlying entity
    pub res_id: i64,
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, res_id: i64) -> Self {
        Self {
            id: id.into(),
            res_id,
            data: Map::new(),
        }
    }

    pub fn with_field(mut self, field: &str, value: Value) -> Self {
        self.data.insert(field.to_string(), value);
        self
    }

    pub fn field_value(&self, field: &str) -> GroupValue {
        self.data
            .get(field)
            .map(GroupValue::from_json)
            .unwrap_or(GroupValue::Unset)
    }
}

/// Per-column progress counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressData {
    pub counts: BTreeMap<String, u64>,
}

impl ProgressData {
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Column metadata without its records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupHeader {
    pub id: GroupId,
    /// Entity type the column groups
    pub res_model: String,
    /// Raw group-by value of the column
    pub value: Value,
    pub display_name: String,
    pub is_folded: bool,
}

impl GroupHeader {
    /// Value a record receives when it is dropped into this column
    pub fn candidate_value(&self, group_by: &GroupByField) -> GroupValue {
        if matches!(self.value, Value::Null | Value::Bool(false)) {
            return GroupValue::Unset;
        }
        if group_by.relational {
            match self.value.as_i64() {
                Some(id) => GroupValue::relation(id, self.display_name.clone()),
                None => GroupValue::from_json(&self.value),
            }
        } else {
            GroupValue::Scalar(self.value.clone())
        }
    }

    /// Key used by the backend to report per-column aggregates
    pub fn progress_key(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            Value::Null | Value::Bool(false) => "false".to_string(),
            other => other.to_string(),
        }
    }
}

/// A column and its ordered records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(flatten)]
    pub header: GroupHeader,
    pub records: Vec<Record>,
    pub progress: Option<ProgressData>,
}

impl Group {
    pub fn new(
        id: impl Into<GroupId>,
        res_model: impl Into<String>,
        value: Value,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            header: GroupHeader {
                id: id.into(),
                res_model: res_model.into(),
                value,
                display_name: display_name.into(),
                is_folded: false,
            },
            records: Vec::new(),
            progress: None,
        }
    }

    pub fn folded(mut self, is_folded: bool) -> Self {
        self.header.is_folded = is_folded;
        self
    }

    pub fn with_record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    pub fn id(&self) -> &GroupId {
        &self.header.id
    }

    pub fn position_of(&self, record: &RecordId) -> Option<usize> {
        self.records.iter().position(|r| &r.id == record)
    }

    pub fn record(&self, record: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| &r.id == record)
    }

    pub fn remove_record(&mut self, record: &RecordId) -> Option<(Record, usize)> {
        let index = self.position_of(record)?;
        Some((self.records.remove(index), index))
    }

    /// Insert at `index`, clamped to the end of the list
    pub fn add_record(&mut self, record: Record, index: usize) -> usize {
        let index = index.min(self.records.len());
        self.records.insert(index, record);
        index
    }

    pub fn record_ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }
}
