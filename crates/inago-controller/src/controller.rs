use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use inago_core::{group, slice_id, unit_base, unit_has_status, Request, Status, UnitStatus};
use inago_fleet::Fleet;
use inago_task::{Task, TaskId, TaskService};
use inago_validate::validate_submit_request;

use crate::config::{ControllerConfig, ControllerSettings};
use crate::error::ControllerError;
use crate::fs::FileSystem;

/// The four group operations a task can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    Submit,
    Start,
    Stop,
    Destroy,
}

impl GroupAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupAction::Submit => "submit",
            GroupAction::Start => "start",
            GroupAction::Stop => "stop",
            GroupAction::Destroy => "destroy",
        }
    }
}

impl fmt::Display for GroupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Units of one group as returned by [`Controller::list`], already folded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStatus {
    pub group: String,
    pub units: Vec<UnitStatus>,
}

/// True iff `name` belongs to the group of `req` and, when slice IDs are
/// given, to one of those slices.
///
/// A unit belongs to group `g` when its name starts with `g-` or `g.`, so
/// `web` does not claim the units of `webapp`.
pub fn matches_group_slices(req: &Request, name: &str) -> bool {
    let in_group = name
        .strip_prefix(req.group.as_str())
        .is_some_and(|rest| rest.starts_with('-') || rest.starts_with('.'));
    if !in_group {
        return false;
    }
    if req.slice_ids.is_empty() {
        return true;
    }
    match slice_id(name) {
        Ok(id) => req.slice_ids.iter().any(|s| *s == id),
        Err(_) => false,
    }
}

/// Group name of a unit as shown by `list`: the unit base up to the first
/// `-` or `.`.
pub fn group_of_unit(name: &str) -> &str {
    let base = unit_base(name);
    match base.find(['-', '.']) {
        Some(idx) => &base[..idx],
        None => base,
    }
}

async fn fired(closer: Option<&CancellationToken>) {
    match closer {
        Some(closer) => closer.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Orchestrates groups of units on top of a [`Fleet`].
#[derive(Clone)]
pub struct Controller {
    pub(crate) fleet: Arc<dyn Fleet>,
    pub(crate) task_service: TaskService,
    pub(crate) file_system: Arc<dyn FileSystem>,
    pub(crate) group_root: PathBuf,
    pub(crate) settings: ControllerSettings,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            fleet: config.fleet,
            task_service: config.task_service,
            file_system: config.file_system,
            group_root: config.group_root,
            settings: config.settings,
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Directory holding one sub-directory of unit files per group.
    pub fn group_root(&self) -> &Path {
        &self.group_root
    }

    /// Validates `req` and submits its expanded units in a background task.
    ///
    /// A templated request carrying only `desired_slices` gets that many
    /// random slice IDs inside the task.
    pub fn submit(&self, ctx: CancellationToken, req: Request) -> Result<Task, ControllerError> {
        validate_submit_request(&req)?;
        let this = self.clone();
        Ok(self.task_service.create(ctx, move |ctx| async move {
            this.run_submit(&ctx, req).await.map_err(anyhow::Error::from)
        })?)
    }

    pub fn start(&self, ctx: CancellationToken, req: Request) -> Result<Task, ControllerError> {
        self.spawn_fan_out(ctx, req, GroupAction::Start)
    }

    pub fn stop(&self, ctx: CancellationToken, req: Request) -> Result<Task, ControllerError> {
        self.spawn_fan_out(ctx, req, GroupAction::Stop)
    }

    pub fn destroy(&self, ctx: CancellationToken, req: Request) -> Result<Task, ControllerError> {
        self.spawn_fan_out(ctx, req, GroupAction::Destroy)
    }

    fn spawn_fan_out(
        &self,
        ctx: CancellationToken,
        req: Request,
        action: GroupAction,
    ) -> Result<Task, ControllerError> {
        let this = self.clone();
        Ok(self.task_service.create(ctx, move |ctx| async move {
            this.run_fan_out(&ctx, &req, action)
                .await
                .map_err(anyhow::Error::from)
        })?)
    }

    async fn run_submit(&self, ctx: &CancellationToken, req: Request) -> Result<(), ControllerError> {
        let req = if req.slice_ids.is_empty() && req.desired_slices > 0 {
            self.extend_with_random_slice_ids(req).await?
        } else {
            req
        };

        for unit in req.extend_slices().units {
            if ctx.is_cancelled() {
                return Err(ControllerError::Cancelled);
            }
            debug!(unit = %unit.name, "submit");
            self.fleet.submit(&unit.name, &unit.content).await?;
        }

        self.wait_for_status(ctx, &req, Status::Stopped, None).await?;
        info!(group = %req.group, slice_ids = ?req.slice_ids, "submitted");
        Ok(())
    }

    async fn run_fan_out(
        &self,
        ctx: &CancellationToken,
        req: &Request,
        action: GroupAction,
    ) -> Result<(), ControllerError> {
        let statuses = self.group_status_with_validate(req).await?;
        for us in &statuses {
            if ctx.is_cancelled() {
                return Err(ControllerError::Cancelled);
            }
            debug!(unit = %us.name, "{action}");
            match action {
                GroupAction::Start => self.fleet.start(&us.name).await?,
                GroupAction::Stop => self.fleet.stop(&us.name).await?,
                GroupAction::Destroy => self.fleet.destroy(&us.name).await?,
                GroupAction::Submit => {
                    return Err(ControllerError::InvalidArgument(
                        "submit cannot fan out over existing units".to_string(),
                    ))
                }
            }
        }

        let desired = match action {
            GroupAction::Start => Status::Running,
            GroupAction::Destroy => Status::NotFound,
            _ => Status::Stopped,
        };
        self.wait_for_status(ctx, req, desired, None).await?;
        info!(group = %req.group, slice_ids = ?req.slice_ids, "{action} done");
        Ok(())
    }

    /// Statuses of all units matching `req`. Slices named in `req` without a
    /// matching unit fail with [`ControllerError::UnitSliceNotFound`].
    pub async fn get_status(&self, req: &Request) -> Result<Vec<UnitStatus>, ControllerError> {
        self.group_status_with_validate(req).await
    }

    /// Every unit known to the scheduler, folded per group and ordered by
    /// group name.
    pub async fn list(&self) -> Result<Vec<GroupStatus>, ControllerError> {
        let statuses = self.fleet.get_status_matching(&|_: &str| true).await?;

        let mut groups: BTreeMap<String, Vec<UnitStatus>> = BTreeMap::new();
        for us in statuses {
            groups
                .entry(group_of_unit(&us.name).to_string())
                .or_default()
                .push(us);
        }

        let mut out = Vec::with_capacity(groups.len());
        for (name, units) in groups {
            out.push(GroupStatus {
                group: name,
                units: group(&units)?,
            });
        }
        Ok(out)
    }

    pub(crate) async fn group_status(&self, req: &Request) -> Result<Vec<UnitStatus>, ControllerError> {
        let matcher = |name: &str| matches_group_slices(req, name);
        Ok(self.fleet.get_status_matching(&matcher).await?)
    }

    pub(crate) async fn group_status_with_validate(
        &self,
        req: &Request,
    ) -> Result<Vec<UnitStatus>, ControllerError> {
        let statuses = self.group_status(req).await?;
        for id in &req.slice_ids {
            if !statuses.iter().any(|us| us.slice_id == *id) {
                return Err(ControllerError::UnitSliceNotFound(id.clone()));
            }
        }
        Ok(statuses)
    }

    /// Polls until every unit matching `req` shows `desired` for
    /// `wait_count` consecutive polls. A fired `closer` ends the wait
    /// successfully.
    pub async fn wait_for_status(
        &self,
        ctx: &CancellationToken,
        req: &Request,
        desired: Status,
        closer: Option<&CancellationToken>,
    ) -> Result<(), ControllerError> {
        let deadline = tokio::time::sleep(self.settings.wait_timeout);
        tokio::pin!(deadline);
        let mut matches = 0;

        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Err(ControllerError::Cancelled),
                _ = fired(closer) => return Ok(()),
                _ = &mut deadline => return Err(ControllerError::WaitTimeoutReached),
                _ = tokio::time::sleep(self.settings.wait_sleep) => {}
            }

            let matched = self.status_matches(req, desired).await?;
            debug!(group = %req.group, %desired, matched, matches, "poll");
            if matched {
                matches += 1;
                if matches >= self.settings.wait_count {
                    return Ok(());
                }
            } else {
                matches = 0;
            }
        }
    }

    async fn status_matches(&self, req: &Request, desired: Status) -> Result<bool, ControllerError> {
        let statuses = match self.group_status(req).await {
            Ok(statuses) => statuses,
            Err(e) if e.is_unit_not_found() && desired == Status::NotFound => return Ok(true),
            Err(e) => return Err(e),
        };
        for us in &statuses {
            if !unit_has_status(us, desired)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn wait_for_task(
        &self,
        id: &TaskId,
        closer: Option<&CancellationToken>,
    ) -> Result<Option<Task>, ControllerError> {
        Ok(self.task_service.wait_for_final_status(id, closer).await?)
    }

    /// Runs one group operation and waits for its task. A failed task is
    /// returned as [`ControllerError::TaskFailed`].
    pub async fn execute_task_action(
        &self,
        ctx: &CancellationToken,
        action: GroupAction,
        req: Request,
    ) -> Result<(), ControllerError> {
        let task = match action {
            GroupAction::Submit => self.submit(ctx.clone(), req)?,
            GroupAction::Start => self.start(ctx.clone(), req)?,
            GroupAction::Stop => self.stop(ctx.clone(), req)?,
            GroupAction::Destroy => self.destroy(ctx.clone(), req)?,
        };

        let Some(task) = self.wait_for_task(&task.id, Some(ctx)).await? else {
            return Err(ControllerError::Cancelled);
        };
        if task.has_failed() {
            return Err(ControllerError::TaskFailed {
                action: action.to_string(),
                message: task.error.unwrap_or_default(),
            });
        }
        Ok(())
    }

    pub(crate) async fn sleep(&self, ctx: &CancellationToken, d: Duration) -> Result<(), ControllerError> {
        tokio::select! {
            _ = ctx.cancelled() => Err(ControllerError::Cancelled),
            _ = tokio::time::sleep(d) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matcher_requires_group_separator() {
        let req = Request::new("web");
        assert!(matches_group_slices(&req, "web-api.service"));
        assert!(matches_group_slices(&req, "web.service"));
        assert!(matches_group_slices(&req, "web-api@1.service"));
        assert!(!matches_group_slices(&req, "webapp-api.service"));
        assert!(!matches_group_slices(&req, "api-web.service"));
    }

    #[test]
    fn matcher_filters_slices_regardless_of_extension() {
        let req = Request::new("web").with_slice_ids(["1", "3"]);
        assert!(matches_group_slices(&req, "web-api@1.service"));
        assert!(matches_group_slices(&req, "web-api@3.mount"));
        assert!(!matches_group_slices(&req, "web-api@2.service"));
        assert!(!matches_group_slices(&req, "web-api@10.service"));
        assert!(!matches_group_slices(&req, "web-api.service"));
    }

    #[test]
    fn group_of_unit_cuts_at_separator() {
        assert_eq!(group_of_unit("web-api@1.service"), "web");
        assert_eq!(group_of_unit("db.service"), "db");
        assert_eq!(group_of_unit("cache.data.mount"), "cache");
    }

    #[test]
    fn action_names() {
        assert_eq!(GroupAction::Destroy.to_string(), "destroy");
        assert_eq!(GroupAction::Submit.as_str(), "submit");
    }
}
