use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use inago_fleet::Fleet;
use inago_task::{TaskService, TaskServiceConfig};

use crate::fs::{FileSystem, RealFileSystem};

/// Timing and retry knobs of a [`crate::Controller`].
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Consecutive matching polls before a status counts as reached.
    pub wait_count: usize,
    pub wait_sleep: Duration,
    pub wait_timeout: Duration,
    /// Admission retries per slice before an update gives up.
    pub max_failed_change_attempts: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            wait_count: 3,
            wait_sleep: Duration::from_secs(1),
            wait_timeout: Duration::from_secs(5 * 60),
            max_failed_change_attempts: 10,
        }
    }
}

#[derive(Clone)]
pub struct ControllerConfig {
    pub fleet: Arc<dyn Fleet>,
    pub task_service: TaskService,
    pub file_system: Arc<dyn FileSystem>,
    /// Directory holding one sub-directory of unit files per group.
    pub group_root: PathBuf,
    pub settings: ControllerSettings,
}

impl ControllerConfig {
    pub fn new(fleet: Arc<dyn Fleet>) -> Self {
        Self {
            fleet,
            task_service: TaskService::new(TaskServiceConfig::default()),
            file_system: Arc::new(RealFileSystem),
            group_root: PathBuf::from("."),
            settings: ControllerSettings::default(),
        }
    }
}
