use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task object not found: {0}")]
    TaskObjectNotFound(String),
    #[error("task storage: {0}")]
    Storage(String),
}

impl TaskError {
    pub fn is_task_object_not_found(&self) -> bool {
        matches!(self, TaskError::TaskObjectNotFound(_))
    }
}
