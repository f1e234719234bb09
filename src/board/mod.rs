// Board module - data model, board capabilities and the attendance board assembly

pub mod controller;
pub mod kanban;
pub mod traits;
pub mod types;

pub use controller::AttendanceBoard;
pub use kanban::KanbanBoard;
pub use traits::BoardModel;
pub use types::{
    Group, GroupByField, GroupHeader, GroupId, GroupValue, ProgressData, Record, RecordId,
};
