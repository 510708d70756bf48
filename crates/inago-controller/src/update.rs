//! Rolling replacement of slices whose unit files changed.
//!
//! Every dirty slice is replaced by a fresh slice with a new random ID. Two
//! strategies keep the number of running slices within bounds:
//!
//! ```text
//! add-first     running < max_growth + total - min_alive - adds_in_flight
//!               submit+start new, verify, stop+destroy old
//! remove-first  running > min_alive + removes_in_flight
//!               stop+destroy old, submit+start new, verify
//! ```
//!
//! When neither is admissible the slice is retried after `wait_sleep`, up to
//! `max_failed_change_attempts` times.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use inago_core::{group, unit_has_status, Request, Status};
use inago_task::Task;

use crate::controller::{Controller, GroupAction};
use crate::error::ControllerError;
use crate::request::new_slice_ids;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Slices allowed on top of the steady state while replacing.
    pub max_growth: usize,
    /// Slices that must stay running throughout.
    pub min_alive: usize,
    /// Wait after starting a new slice before checking it.
    pub ready_secs: u64,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            max_growth: 1,
            min_alive: 1,
            ready_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    AddFirst,
    RemoveFirst,
}

impl Strategy {
    fn as_str(&self) -> &'static str {
        match self {
            Strategy::AddFirst => "addFirst",
            Strategy::RemoveFirst => "removeFirst",
        }
    }
}

#[derive(Debug)]
enum UpdateEvent {
    Done { old: String, new: String },
    Failed(ControllerError),
}

/// Bookkeeping shared between the slice worker and the collector.
#[derive(Debug, Default)]
pub struct UpdateState {
    current_slice_ids: Mutex<Vec<String>>,
    add_in_progress: AtomicUsize,
    remove_in_progress: AtomicUsize,
}

impl UpdateState {
    pub fn new(slice_ids: Vec<String>) -> Self {
        Self {
            current_slice_ids: Mutex::new(slice_ids),
            ..Default::default()
        }
    }

    pub fn current_slice_ids(&self) -> Vec<String> {
        self.current_slice_ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drops `old` and appends `new`.
    pub fn replace(&self, old: &str, new: &str) {
        let mut ids = self
            .current_slice_ids
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        ids.retain(|id| id != old);
        ids.push(new.to_string());
    }
}

fn addition_allowed(running: usize, total: usize, opts: &UpdateOptions, in_progress: usize) -> bool {
    (running as i64)
        < opts.max_growth as i64 + total as i64 - opts.min_alive as i64 - in_progress as i64
}

fn removal_allowed(running: usize, opts: &UpdateOptions, in_progress: usize) -> bool {
    running > opts.min_alive + in_progress
}

fn stage_error(strategy: Strategy, old: &str, new: &str, err: ControllerError) -> ControllerError {
    match err {
        ControllerError::Cancelled | ControllerError::UpdateFailed(_) => err,
        other => ControllerError::UpdateFailed(format!(
            "{} replacing slice '{old}' with '{new}': {other}",
            strategy.as_str()
        )),
    }
}

/// Decrements an in-flight counter on drop.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Controller {
    /// Checks the update preconditions and starts the rolling replacement
    /// in a background task.
    ///
    /// `req` must carry the new unit files and the group's slice IDs. Fails
    /// with [`ControllerError::UpdateNotAllowed`] when fewer slices exist
    /// than `min_alive` or when nothing differs.
    pub async fn update(
        &self,
        ctx: CancellationToken,
        req: Request,
        opts: UpdateOptions,
    ) -> Result<Task, ControllerError> {
        if !req.is_sliceable() {
            return Err(ControllerError::InvalidArgument(format!(
                "group '{}' has no slices to update",
                req.group
            )));
        }
        let total = req.slice_ids.len();
        if total < opts.min_alive {
            return Err(ControllerError::UpdateNotAllowed(format!(
                "{total} slices cannot keep {} alive",
                opts.min_alive
            )));
        }

        let (dirty, needed) = self.group_needs_update(&req).await?;
        if !needed {
            return Err(ControllerError::UpdateNotAllowed(
                "already up to date".to_string(),
            ));
        }
        info!(group = %req.group, slice_ids = ?dirty.slice_ids, "updating");

        let this = self.clone();
        Ok(self.task_service.create(ctx, move |ctx| async move {
            let ids = this
                .update_with_strategy(&ctx, &req, dirty.slice_ids, opts)
                .await?;
            info!(group = %req.group, slice_ids = ?ids, "update finished");
            Ok::<(), anyhow::Error>(())
        })?)
    }

    /// Replaces each of `dirty` one after the other and returns the group's
    /// slice IDs afterwards.
    ///
    /// The collector gives up after `wait_timeout` without a finished slice,
    /// on the first failure, or on cancellation. The worker is aborted in
    /// each of those cases.
    pub async fn update_with_strategy(
        &self,
        ctx: &CancellationToken,
        req: &Request,
        dirty: Vec<String>,
        opts: UpdateOptions,
    ) -> Result<Vec<String>, ControllerError> {
        let state = Arc::new(UpdateState::new(req.slice_ids.clone()));
        let expected = dirty.len();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let worker = {
            let this = self.clone();
            let ctx = ctx.clone();
            let req = req.clone();
            let state = state.clone();
            tokio::spawn(async move {
                for old in dirty {
                    let result = this.update_slice(&ctx, &req, &old, &state, &opts).await;
                    let event = match result {
                        Ok(new) => UpdateEvent::Done { old, new },
                        Err(e) => UpdateEvent::Failed(e),
                    };
                    let failed = matches!(event, UpdateEvent::Failed(_));
                    if tx.send(event).is_err() || failed {
                        return;
                    }
                }
            })
        };

        let deadline = tokio::time::sleep(self.settings.wait_timeout);
        tokio::pin!(deadline);
        let mut done = 0;

        let outcome = loop {
            if done == expected {
                break Ok(());
            }
            tokio::select! {
                _ = ctx.cancelled() => break Err(ControllerError::Cancelled),
                _ = &mut deadline => break Err(ControllerError::WaitTimeoutReached),
                event = rx.recv() => match event {
                    Some(UpdateEvent::Done { old, new }) => {
                        info!("replaced slice {old} with {new}");
                        done += 1;
                        deadline
                            .as_mut()
                            .reset(tokio::time::Instant::now() + self.settings.wait_timeout);
                    }
                    Some(UpdateEvent::Failed(e)) => break Err(e),
                    None => break Err(ControllerError::UpdateFailed(
                        "update worker stopped early".to_string(),
                    )),
                },
            }
        };

        if let Err(e) = outcome {
            warn!("update aborted: {e}");
            worker.abort();
            return Err(e);
        }
        Ok(state.current_slice_ids())
    }

    async fn update_slice(
        &self,
        ctx: &CancellationToken,
        req: &Request,
        old: &str,
        state: &UpdateState,
        opts: &UpdateOptions,
    ) -> Result<String, ControllerError> {
        let total = req.slice_ids.len();
        let mut failed_attempts = 0;

        loop {
            if ctx.is_cancelled() {
                return Err(ControllerError::Cancelled);
            }
            let running = self
                .num_running(&req.group, &state.current_slice_ids())
                .await?;

            let strategy = if addition_allowed(
                running,
                total,
                opts,
                state.add_in_progress.load(Ordering::SeqCst),
            ) {
                Some((Strategy::AddFirst, &state.add_in_progress))
            } else if removal_allowed(running, opts, state.remove_in_progress.load(Ordering::SeqCst)) {
                Some((Strategy::RemoveFirst, &state.remove_in_progress))
            } else {
                None
            };

            if let Some((strategy, counter)) = strategy {
                let _in_flight = InFlight::enter(counter);
                let new = self.replace_slice(ctx, req, old, strategy, opts).await?;
                state.replace(old, &new);
                return Ok(new);
            }

            failed_attempts += 1;
            if failed_attempts > self.settings.max_failed_change_attempts {
                return Err(ControllerError::UpdateFailed(
                    "reached max failed change attempts limit".to_string(),
                ));
            }
            warn!(slice_id = old, running, failed_attempts, "no change admissible, retrying");
            self.sleep(ctx, self.settings.wait_sleep).await?;
        }
    }

    async fn replace_slice(
        &self,
        ctx: &CancellationToken,
        req: &Request,
        old: &str,
        strategy: Strategy,
        opts: &UpdateOptions,
    ) -> Result<String, ControllerError> {
        let existing = self
            .extend_with_existing_slice_ids(Request::new(req.group.clone()))
            .await?
            .slice_ids;
        let new = new_slice_ids(1, &existing)?.remove(0);
        debug!("{} slice {old} -> {new}", strategy.as_str());

        let result = match strategy {
            Strategy::AddFirst => {
                async {
                    self.add_slice(ctx, req, &new, opts).await?;
                    self.remove_slice(ctx, &req.group, old).await
                }
                .await
            }
            Strategy::RemoveFirst => {
                async {
                    self.remove_slice(ctx, &req.group, old).await?;
                    self.add_slice(ctx, req, &new, opts).await
                }
                .await
            }
        };
        result.map_err(|e| stage_error(strategy, old, &new, e))?;
        Ok(new)
    }

    async fn add_slice(
        &self,
        ctx: &CancellationToken,
        req: &Request,
        id: &str,
        opts: &UpdateOptions,
    ) -> Result<(), ControllerError> {
        let slice = Request {
            group: req.group.clone(),
            slice_ids: vec![id.to_string()],
            units: req.units.clone(),
            desired_slices: 0,
        };
        self.execute_task_action(ctx, GroupAction::Submit, slice.clone())
            .await?;
        self.execute_task_action(ctx, GroupAction::Start, slice)
            .await?;
        self.sleep(ctx, Duration::from_secs(opts.ready_secs)).await?;

        if self.num_running(&req.group, &[id.to_string()]).await? != 1 {
            return Err(ControllerError::UpdateFailed(format!(
                "slice '{id}' is not running"
            )));
        }
        Ok(())
    }

    async fn remove_slice(
        &self,
        ctx: &CancellationToken,
        group: &str,
        id: &str,
    ) -> Result<(), ControllerError> {
        let slice = Request::new(group).with_slice_ids([id]);
        self.execute_task_action(ctx, GroupAction::Stop, slice.clone())
            .await?;
        self.execute_task_action(ctx, GroupAction::Destroy, slice)
            .await
    }

    /// Number of `slice_ids` whose units are consistently running. A slice
    /// whose units do not fold into one entry is not counted.
    pub async fn num_running(&self, group_name: &str, slice_ids: &[String]) -> Result<usize, ControllerError> {
        if slice_ids.is_empty() {
            return Ok(0);
        }
        let req = Request::new(group_name).with_slice_ids(slice_ids.iter().cloned());
        let statuses = match self.group_status(&req).await {
            Ok(statuses) => statuses,
            Err(e) if e.is_unit_not_found() => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut count = 0;
        for id in slice_ids {
            let members: Vec<_> = statuses
                .iter()
                .filter(|us| us.slice_id == *id)
                .cloned()
                .collect();
            if members.is_empty() {
                continue;
            }
            let folded = group(&members)?;
            if folded.len() == 1 && unit_has_status(&folded[0], Status::Running)? {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_formulas() {
        let opts = UpdateOptions {
            max_growth: 1,
            min_alive: 1,
            ready_secs: 0,
        };
        // ceiling is max_growth + total - min_alive = 3
        assert!(addition_allowed(2, 3, &opts, 0));
        assert!(!addition_allowed(3, 3, &opts, 0));
        assert!(!addition_allowed(2, 3, &opts, 1));
        assert!(removal_allowed(2, &opts, 0));
        assert!(!removal_allowed(1, &opts, 0));
        assert!(!removal_allowed(2, &opts, 1));
    }

    #[test]
    fn nothing_admissible_when_growth_is_zero_and_all_must_live() {
        let opts = UpdateOptions {
            max_growth: 0,
            min_alive: 3,
            ready_secs: 0,
        };
        assert!(!addition_allowed(3, 3, &opts, 0));
        assert!(!removal_allowed(3, &opts, 0));
    }

    #[test]
    fn state_replace_keeps_order_of_others() {
        let state = UpdateState::new(vec!["1".into(), "2".into(), "3".into()]);
        state.replace("1", "abc");
        assert_eq!(state.current_slice_ids(), ["2", "3", "abc"]);
    }

    #[test]
    fn in_flight_counter_is_released() {
        let counter = AtomicUsize::new(0);
        {
            let _g = InFlight::enter(&counter);
            assert_eq!(counter.load(Ordering::SeqCst), 1);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stage_errors_name_the_strategy_and_slices() {
        let err = stage_error(
            Strategy::AddFirst,
            "1",
            "abc",
            ControllerError::UnitNotFound("x".into()),
        );
        let msg = err.to_string();
        assert!(err.is_update_failed());
        assert!(msg.contains("addFirst"));
        assert!(msg.contains("'1'") && msg.contains("'abc'"));
        assert!(stage_error(Strategy::RemoveFirst, "1", "2", ControllerError::Cancelled)
            .to_string()
            .contains("cancelled"));
    }
}
