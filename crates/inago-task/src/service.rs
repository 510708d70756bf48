use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::TaskError;
use crate::memory::MemoryStorage;
use crate::model::{ActiveStatus, FinalStatus, Task, TaskId};
use crate::traits::Storage;

#[derive(Clone)]
pub struct TaskServiceConfig {
    pub storage: Arc<dyn Storage>,
    /// Poll interval of [`TaskService::wait_for_final_status`].
    pub wait_sleep: Duration,
}

impl Default for TaskServiceConfig {
    fn default() -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            wait_sleep: Duration::from_secs(1),
        }
    }
}

/// Runs actions in the background and tracks them as [`Task`]s.
#[derive(Clone)]
pub struct TaskService {
    storage: Arc<dyn Storage>,
    wait_sleep: Duration,
}

impl TaskService {
    pub fn new(config: TaskServiceConfig) -> Self {
        Self {
            storage: config.storage,
            wait_sleep: config.wait_sleep,
        }
    }

    /// Persists a started task, spawns one worker running `action(ctx)` and
    /// returns the persisted snapshot without waiting for the action.
    ///
    /// The worker records the outcome; action errors never propagate past it.
    /// An action that panics leaves the task failed.
    pub fn create<F, Fut>(&self, ctx: CancellationToken, action: F) -> Result<Task, TaskError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let task = Task::started();
        self.persist_state(&task)?;
        debug!(task_id = %task.id, "task created");

        let svc = self.clone();
        let id = task.id.clone();
        tokio::spawn(async move {
            let run = tokio::spawn(async move { action(ctx).await });
            let outcome = match run.await {
                Ok(Ok(())) => svc.mark_as_succeeded(&id),
                Ok(Err(err)) => svc.mark_as_failed_with_error(&id, &format!("{err:#}")),
                Err(join) => {
                    svc.mark_as_failed_with_error(&id, &format!("task action aborted: {join}"))
                }
            };
            if let Err(e) = outcome {
                error!(task_id = %id, "unable to persist final task state: {e}");
            }
        });

        Ok(task)
    }

    pub fn fetch_state(&self, id: &TaskId) -> Result<Task, TaskError> {
        self.storage
            .get(id)?
            .ok_or_else(|| TaskError::TaskObjectNotFound(id.to_string()))
    }

    /// Polls until the task is final. Returns `None` when `closer` fires
    /// first; the action itself keeps running.
    pub async fn wait_for_final_status(
        &self,
        id: &TaskId,
        closer: Option<&CancellationToken>,
    ) -> Result<Option<Task>, TaskError> {
        loop {
            let task = self.fetch_state(id)?;
            if task.is_final() {
                return Ok(Some(task));
            }

            match closer {
                Some(closer) => {
                    tokio::select! {
                        _ = closer.cancelled() => return Ok(None),
                        _ = tokio::time::sleep(self.wait_sleep) => {}
                    }
                }
                None => tokio::time::sleep(self.wait_sleep).await,
            }
        }
    }

    pub fn mark_as_succeeded(&self, id: &TaskId) -> Result<Task, TaskError> {
        self.finish(id, FinalStatus::Succeeded, None)
    }

    pub fn mark_as_failed_with_error(&self, id: &TaskId, err: &str) -> Result<Task, TaskError> {
        self.finish(id, FinalStatus::Failed, Some(err.to_string()))
    }

    pub fn persist_state(&self, task: &Task) -> Result<(), TaskError> {
        self.storage.set(task.clone())
    }

    fn finish(
        &self,
        id: &TaskId,
        status: FinalStatus,
        err: Option<String>,
    ) -> Result<Task, TaskError> {
        let mut task = self.fetch_state(id)?;
        task.active_status = ActiveStatus::Stopped;
        task.final_status = Some(status);
        task.error = err;
        self.persist_state(&task)?;
        debug!(task_id = %id, ?status, "task finished");
        Ok(task)
    }
}
