#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use inago_controller::{Controller, ControllerConfig, ControllerSettings};
use inago_core::Request;
use inago_fleet::MemoryFleet;
use inago_task::{Task, TaskService, TaskServiceConfig};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const CONTENT_A: &str = "[Unit]\nDescription=worker\n\n[Service]\nExecStart=/bin/worker --v1\n";
pub const CONTENT_B: &str = "[Unit]\nDescription=worker\n\n[Service]\nExecStart=/bin/worker --v2\n";

pub struct Harness {
    pub fleet: Arc<MemoryFleet>,
    pub controller: Controller,
    pub dir: TempDir,
}

pub fn fast_settings() -> ControllerSettings {
    ControllerSettings {
        wait_count: 3,
        wait_sleep: Duration::from_millis(2),
        wait_timeout: Duration::from_secs(5),
        max_failed_change_attempts: 3,
    }
}

pub fn harness() -> Harness {
    harness_with(fast_settings())
}

pub fn harness_with(settings: ControllerSettings) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let fleet = Arc::new(MemoryFleet::new());
    let mut config = ControllerConfig::new(fleet.clone());
    config.task_service = TaskService::new(TaskServiceConfig {
        wait_sleep: Duration::from_millis(2),
        ..Default::default()
    });
    config.group_root = dir.path().to_path_buf();
    config.settings = settings;
    Harness {
        fleet,
        controller: Controller::new(config),
        dir,
    }
}

pub fn write_unit(root: &Path, group: &str, name: &str, content: &str) {
    let dir = root.join(group);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), content).unwrap();
}

pub async fn finish(controller: &Controller, task: Task) -> Task {
    controller.wait_for_task(&task.id, None).await.unwrap().unwrap()
}

/// Submits and starts `group` with the given slices and content.
pub async fn run_group(h: &Harness, group: &str, unit: &str, content: &str, ids: &[&str]) -> Request {
    let req = Request::new(group)
        .with_slice_ids(ids.iter().copied())
        .with_units(vec![inago_core::Unit::new(unit, content)]);
    let ctx = CancellationToken::new();
    let task = h.controller.submit(ctx.clone(), req.clone()).unwrap();
    assert!(finish(&h.controller, task).await.has_succeeded());
    let task = h.controller.start(ctx, req.clone()).unwrap();
    let done = finish(&h.controller, task).await;
    assert!(done.has_succeeded(), "start failed: {:?}", done.error);
    req
}
