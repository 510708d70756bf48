use crate::error::TaskError;
use crate::model::{Task, TaskId};

/// Keyed task store. Writes for one key must be serialized.
pub trait Storage: Send + Sync {
    fn get(&self, id: &TaskId) -> Result<Option<Task>, TaskError>;
    fn set(&self, task: Task) -> Result<(), TaskError>;
}
