use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use inago_controller::{Controller, ControllerError, GroupAction, UpdateOptions};
use inago_core::{group, parse_group_args, Request};
use inago_task::Task;
use inago_validate::{validate_multiple_requests, validate_request};

use crate::output::{
    failure_message, list_table, no_unit_found_message, sentence, status_table, success_message,
    Scope,
};

pub const SUCCESS: u8 = 0;
pub const FAILURE: u8 = 1;

/// Prints `err` with its causes and returns the failure exit code.
fn report(err: ControllerError) -> u8 {
    println!("{:#}", anyhow::Error::from(err));
    FAILURE
}

fn parse_args(args: &[String]) -> Result<Request, ControllerError> {
    let (group, slice_ids) = parse_group_args(args)?;
    Ok(Request::new(group).with_slice_ids(slice_ids))
}

fn is_singleton(req: &Request) -> bool {
    !req.units.is_empty() && !req.has_templated_units()
}

/// Commands acting on the units a group already has on the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    Start,
    Stop,
    Destroy,
}

impl FanOut {
    fn action(self) -> GroupAction {
        match self {
            FanOut::Start => GroupAction::Start,
            FanOut::Stop => GroupAction::Stop,
            FanOut::Destroy => GroupAction::Destroy,
        }
    }
}

pub struct App {
    controller: Controller,
    ctx: CancellationToken,
    no_block: bool,
    verbose: bool,
}

impl App {
    pub fn new(controller: Controller, no_block: bool, verbose: bool) -> Self {
        Self {
            controller,
            ctx: CancellationToken::new(),
            no_block,
            verbose,
        }
    }

    /// Waits for `task` unless `no_block` and prints the outcome.
    async fn block_with_feedback(
        &self,
        req: &Request,
        descriptor: &str,
        task: Task,
        no_block: bool,
    ) -> u8 {
        let scope = Scope::new(is_singleton(req), &req.slice_ids);
        let task = if no_block {
            task
        } else {
            match self.controller.wait_for_task(&task.id, None).await {
                Ok(Some(done)) => done,
                Ok(None) => task,
                Err(e) => return report(e),
            }
        };

        if task.has_failed() {
            let err = task.error.unwrap_or_default();
            println!("{}", failure_message(descriptor, &req.group, &scope, &err));
            return FAILURE;
        }
        println!("{}", success_message(descriptor, &req.group, &scope));
        SUCCESS
    }

    async fn submit_request(&self, args: &[String]) -> Result<Request, ControllerError> {
        if args.iter().any(|a| a.contains('@')) {
            let req = parse_args(args)?;
            return self.controller.extend_with_content(req);
        }

        let (group, scale) = match args {
            [group] => (group, 1),
            [group, scale] => {
                let n = scale.parse::<usize>().map_err(|e| {
                    ControllerError::InvalidArgument(format!("scale '{scale}': {e}"))
                })?;
                (group, n)
            }
            _ => {
                return Err(ControllerError::InvalidArgument(
                    "usage: submit <group> [scale]".to_string(),
                ))
            }
        };

        let req = self.controller.extend_with_content(Request::new(group.as_str()))?;
        if is_singleton(&req) {
            return Ok(req);
        }
        self.controller
            .extend_with_random_slice_ids(req.with_desired_slices(scale))
            .await
    }

    pub async fn submit(&self, args: &[String]) -> u8 {
        let req = match self.submit_request(args).await {
            Ok(req) => req,
            Err(e) => return report(e),
        };
        debug!(group = %req.group, slice_ids = ?req.slice_ids, "submit");
        match self.controller.submit(self.ctx.clone(), req.clone()) {
            Ok(task) => self.block_with_feedback(&req, "submit", task, self.no_block).await,
            Err(e) => report(e),
        }
    }

    pub async fn fan_out(&self, command: FanOut, args: &[String]) -> u8 {
        let req = match parse_args(args) {
            Ok(req) => req,
            Err(e) => return report(e),
        };
        let ctx = self.ctx.clone();
        let created = match command {
            FanOut::Start => self.controller.start(ctx, req.clone()),
            FanOut::Stop => self.controller.stop(ctx, req.clone()),
            FanOut::Destroy => self.controller.destroy(ctx, req.clone()),
        };
        match created {
            Ok(task) => {
                self.block_with_feedback(&req, command.action().as_str(), task, self.no_block)
                    .await
            }
            Err(e) => report(e),
        }
    }

    pub async fn status(&self, args: &[String]) -> u8 {
        let req = match parse_args(args) {
            Ok(req) => req,
            Err(e) => return report(e),
        };
        let statuses = match self.controller.get_status(&req).await {
            Ok(statuses) => statuses,
            Err(e) if e.is_unit_not_found() => {
                println!("{}", no_unit_found_message(args));
                return FAILURE;
            }
            Err(e) if e.is_unit_slice_not_found() => {
                println!("{}", sentence(&e.to_string()));
                return FAILURE;
            }
            Err(e) => return report(e),
        };

        let statuses = if self.verbose {
            statuses
        } else {
            match group(&statuses) {
                Ok(grouped) => grouped,
                Err(e) => return report(e.into()),
            }
        };
        println!("{}", status_table(&req.group, &statuses, self.verbose));
        SUCCESS
    }

    pub async fn list(&self) -> u8 {
        match self.controller.list().await {
            Ok(groups) => {
                println!("{}", list_table(&groups));
                SUCCESS
            }
            Err(e) if e.is_unit_not_found() || e.is_unit_slice_not_found() => {
                println!("No groups to show.");
                FAILURE
            }
            Err(e) => report(e),
        }
    }

    /// Always blocks: the feedback names the slice IDs present afterwards.
    pub async fn update(&self, group_name: &str, opts: UpdateOptions) -> u8 {
        let prepared = async {
            let req = self.controller.extend_with_content(Request::new(group_name))?;
            self.controller.extend_with_existing_slice_ids(req).await
        }
        .await;
        let req = match prepared {
            Ok(req) => req,
            Err(e) => return report(e),
        };

        let task = match self.controller.update(self.ctx.clone(), req.clone(), opts).await {
            Ok(task) => task,
            Err(e) => return report(e),
        };
        let done = match self.controller.wait_for_task(&task.id, None).await {
            Ok(Some(done)) => done,
            Ok(None) => task,
            Err(e) => return report(e),
        };
        let req = match self.controller.extend_with_existing_slice_ids(req).await {
            Ok(req) => req,
            Err(e) => return report(e),
        };
        self.block_with_feedback(&req, "update", done, true).await
    }

    /// Validates each group alone and all groups together. Without arguments
    /// every non-hidden directory of the group root is a group.
    pub fn validate(&self, mut groups: Vec<String>) -> anyhow::Result<u8> {
        if groups.is_empty() {
            let root = self.controller.group_root();
            let entries = std::fs::read_dir(root)
                .with_context(|| format!("read group root {}", root.display()))?;
            for entry in entries {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if entry.file_type()?.is_dir() && !name.starts_with('.') {
                    groups.push(name);
                }
            }
        }
        groups.sort();

        let mut requests = Vec::with_capacity(groups.len());
        for g in &groups {
            match self.controller.extend_with_content(Request::new(g.as_str())) {
                Ok(req) => requests.push(req),
                Err(e) => return Ok(report(e)),
            }
        }

        let mut valid = true;
        for req in &requests {
            match validate_request(req) {
                Ok(()) => println!("Group '{}' is valid.", req.group),
                Err(e) => {
                    valid = false;
                    println!("Group '{}' not valid: {e}.", req.group);
                }
            }
        }
        match validate_multiple_requests(&requests) {
            Ok(()) => println!("Groups are valid globally."),
            Err(e) => {
                valid = false;
                println!("Groups are not valid globally: {e}");
            }
        }

        Ok(if valid { SUCCESS } else { FAILURE })
    }

    /// `submit <group> [scale]` followed by `start <group>`.
    pub async fn up(&self, group_name: &str, scale: Option<String>) -> u8 {
        let mut args = vec![group_name.to_string()];
        args.extend(scale);
        let code = self.submit(&args).await;
        if code != SUCCESS {
            return code;
        }
        self.fan_out(FanOut::Start, &args[..1]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use inago_controller::{ControllerConfig, ControllerSettings};
    use inago_fleet::{FleetCall, MemoryFleet};
    use inago_task::{TaskService, TaskServiceConfig};

    const UNIT: &str = "[Unit]\nDescription=api\n\n[Service]\nExecStart=/bin/api\n";

    fn app(root: &std::path::Path) -> (App, Arc<MemoryFleet>) {
        let fleet = Arc::new(MemoryFleet::new());
        let mut config = ControllerConfig::new(fleet.clone());
        config.task_service = TaskService::new(TaskServiceConfig {
            wait_sleep: Duration::from_millis(2),
            ..Default::default()
        });
        config.group_root = root.to_path_buf();
        config.settings = ControllerSettings {
            wait_count: 2,
            wait_sleep: Duration::from_millis(2),
            wait_timeout: Duration::from_secs(5),
            max_failed_change_attempts: 3,
        };
        (App::new(Controller::new(config), false, false), fleet)
    }

    fn write_group(root: &std::path::Path, group: &str, unit: &str) {
        std::fs::create_dir_all(root.join(group)).unwrap();
        std::fs::write(root.join(group).join(unit), UNIT).unwrap();
    }

    #[tokio::test]
    async fn submit_with_scale_draws_slices() {
        let dir = tempfile::tempdir().unwrap();
        write_group(dir.path(), "api", "api-worker@.service");
        let (app, _) = app(dir.path());

        let req = app
            .submit_request(&["api".to_string(), "3".to_string()])
            .await
            .unwrap();
        assert_eq!(req.slice_ids.len(), 3);
        assert_eq!(req.desired_slices, 0);
    }

    #[tokio::test]
    async fn submit_singleton_keeps_no_slices() {
        let dir = tempfile::tempdir().unwrap();
        write_group(dir.path(), "web", "web-a.service");
        let (app, _) = app(dir.path());

        let req = app
            .submit_request(&["web".to_string(), "2".to_string()])
            .await
            .unwrap();
        assert!(req.slice_ids.is_empty());
        assert!(is_singleton(&req));
    }

    #[tokio::test]
    async fn submit_rejects_bad_scale() {
        let dir = tempfile::tempdir().unwrap();
        write_group(dir.path(), "api", "api-worker@.service");
        let (app, _) = app(dir.path());

        let err = app
            .submit_request(&["api".to_string(), "many".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn up_submits_then_starts() {
        let dir = tempfile::tempdir().unwrap();
        write_group(dir.path(), "web", "web-a.service");
        let (app, fleet) = app(dir.path());

        assert_eq!(app.up("web", None).await, SUCCESS);
        assert_eq!(
            fleet.calls(),
            vec![
                FleetCall::Submit("web-a.service".into()),
                FleetCall::Start("web-a.service".into()),
            ]
        );
    }

    #[tokio::test]
    async fn failed_start_exits_with_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path());
        let code = app
            .fan_out(FanOut::Start, &["ghost".to_string()])
            .await;
        assert_eq!(code, FAILURE);
    }

    #[test]
    fn validate_reports_invalid_groups() {
        let dir = tempfile::tempdir().unwrap();
        write_group(dir.path(), "web", "web-a.service");
        write_group(dir.path(), "webapp", "other.service");
        let (app, _) = app(dir.path());

        let code = app
            .validate(vec!["webapp".to_string(), "web".to_string()])
            .unwrap();
        assert_eq!(code, FAILURE);

        let code = app.validate(vec!["web".to_string()]).unwrap();
        assert_eq!(code, SUCCESS);
    }

    #[test]
    fn validate_without_arguments_scans_group_root() {
        let dir = tempfile::tempdir().unwrap();
        write_group(dir.path(), "web", "web-a.service");
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let (app, _) = app(dir.path());
        assert_eq!(app.validate(vec![]).unwrap(), SUCCESS);

        write_group(dir.path(), "webapp", "other.service");
        assert_eq!(app.validate(vec![]).unwrap(), FAILURE);
    }
}
