use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::TaskError;
use crate::model::{Task, TaskId};
use crate::traits::Storage;

/// Process-local task store. Tasks are kept for the life of the process.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<HashMap<String, Task>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, id: &TaskId) -> Result<Option<Task>, TaskError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.get(id.as_str()).cloned())
    }

    fn set(&self, task: Task) -> Result<(), TaskError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.insert(task.id.as_str().to_string(), task);
        Ok(())
    }
}
