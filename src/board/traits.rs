// Board capabilities the move orchestrator relies on

use anyhow::Result;
use async_trait::async_trait;

use super::types::{GroupByField, GroupHeader, GroupId, GroupValue, Record, RecordId};

/// Board state as seen by a move.
///
/// The synchronous methods touch local UI state only. The async ones talk to the backend and
/// may suspend the move; implementations must not hold locks across those suspensions.
#[async_trait]
pub trait BoardModel: Send + Sync {
    /// Field the board is currently grouped by
    fn group_by(&self) -> GroupByField;

    /// Header of a column, `None` once the column is gone
    fn group(&self, group: &GroupId) -> Option<GroupHeader>;

    fn record(&self, group: &GroupId, record: &RecordId) -> Option<Record>;

    fn position_of(&self, group: &GroupId, record: &RecordId) -> Option<usize>;

    /// Take a record out of a column, returning it with the index it occupied
    fn remove_record(&self, group: &GroupId, record: &RecordId) -> Option<(Record, usize)>;

    /// Put a record into a column at `index` (clamped to the list length)
    fn insert_record(&self, group: &GroupId, record: Record, index: usize) -> Result<()>;

    /// Persist a new group-by value for a record
    async fn save_group_value(&self, record: &Record, field: &str, value: &GroupValue)
        -> Result<()>;

    /// Refresh a record's data from the backend
    async fn reload_record(&self, group: &GroupId, record: &RecordId) -> Result<()>;

    /// Refresh progress counters of the given columns
    async fn update_progress(&self, groups: &[GroupId]) -> Result<()>;

    /// Place `record` right after `after` (or first) and persist the column order
    async fn resequence(
        &self,
        group: &GroupId,
        record: &RecordId,
        after: Option<&RecordId>,
    ) -> Result<()>;
}
