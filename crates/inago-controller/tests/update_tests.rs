mod common;

use std::collections::HashSet;

use common::*;
use inago_controller::{ControllerError, ControllerSettings, UpdateOptions};
use inago_core::{slice_id, Request, Unit};
use inago_fleet::FleetCall;
use tokio_util::sync::CancellationToken;

fn opts(max_growth: usize, min_alive: usize) -> UpdateOptions {
    UpdateOptions {
        max_growth,
        min_alive,
        ready_secs: 0,
    }
}

fn new_content(group: &str, ids: &[&str]) -> Request {
    Request::new(group)
        .with_slice_ids(ids.iter().copied())
        .with_units(vec![Unit::new(format!("{group}-worker@.service"), CONTENT_B)])
}

#[tokio::test]
async fn test_update_replaces_first_slice() {
    let h = harness();
    run_group(&h, "g", "g-worker@.service", CONTENT_A, &["1", "2", "3"]).await;

    let req = new_content("g", &["1", "2", "3"]);
    let (dirty, needed) = h.controller.group_needs_update(&req).await.unwrap();
    assert!(needed);
    assert_eq!(dirty.slice_ids, ["1", "2", "3"]);

    let ids = h
        .controller
        .update_with_strategy(&CancellationToken::new(), &req, vec!["1".to_string()], opts(1, 1))
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(&ids[..2], ["2", "3"]);
    assert_eq!(ids[2].len(), 3);

    let existing = h
        .controller
        .extend_with_existing_slice_ids(Request::new("g"))
        .await
        .unwrap()
        .slice_ids;
    let existing: HashSet<_> = existing.into_iter().collect();
    let expected: HashSet<_> = ids.into_iter().collect();
    assert_eq!(existing, expected);
}

#[tokio::test]
async fn test_update_task_rolls_whole_group() {
    let h = harness();
    run_group(&h, "g", "g-worker@.service", CONTENT_A, &["1", "2", "3"]).await;

    let task = h
        .controller
        .update(CancellationToken::new(), new_content("g", &["1", "2", "3"]), opts(1, 1))
        .await
        .unwrap();
    let done = finish(&h.controller, task).await;
    assert!(done.has_succeeded(), "{:?}", done.error);

    let after = h
        .controller
        .extend_with_existing_slice_ids(Request::new("g"))
        .await
        .unwrap();
    assert_eq!(after.slice_ids.len(), 3);
    assert!(after.slice_ids.iter().all(|id| id.len() == 3));

    let req = new_content("g", &[]);
    let (_, needed) = h.controller.group_needs_update(&req).await.unwrap();
    assert!(!needed);

    // slices are processed one after the other
    let stops: Vec<String> = h
        .fleet
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            FleetCall::Stop(name) => Some(slice_id(&name).unwrap()),
            _ => None,
        })
        .collect();
    assert_eq!(stops, ["1", "2", "3"]);
}

#[tokio::test]
async fn test_update_keeps_running_count_within_bounds() {
    let h = harness();
    run_group(&h, "g", "g-worker@.service", CONTENT_A, &["1", "2", "3"]).await;
    let setup_calls = h.fleet.calls().len();

    let options = opts(1, 1);
    let task = h
        .controller
        .update(CancellationToken::new(), new_content("g", &["1", "2", "3"]), options)
        .await
        .unwrap();
    assert!(finish(&h.controller, task).await.has_succeeded());

    let ceiling = options.max_growth + 3 - options.min_alive;
    let mut running: HashSet<String> = ["1", "2", "3"].iter().map(|s| s.to_string()).collect();
    for call in &h.fleet.calls()[setup_calls..] {
        match call {
            FleetCall::Start(name) => {
                running.insert(slice_id(name).unwrap());
            }
            FleetCall::Stop(name) | FleetCall::Destroy(name) => {
                running.remove(&slice_id(name).unwrap());
            }
            FleetCall::Submit(_) => {}
        }
        assert!(running.len() >= options.min_alive, "{call:?}");
        assert!(running.len() <= ceiling, "{call:?}");
    }
    assert_eq!(running.len(), 3);
}

#[tokio::test]
async fn test_update_with_growth_adds_before_removing() {
    let h = harness();
    run_group(&h, "g", "g-worker@.service", CONTENT_A, &["1", "2"]).await;
    let setup_calls = h.fleet.calls().len();

    let ids = h
        .controller
        .update_with_strategy(
            &CancellationToken::new(),
            &new_content("g", &["1", "2"]),
            vec!["1".to_string()],
            opts(2, 1),
        )
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);

    let calls = &h.fleet.calls()[setup_calls..];
    let first_start = calls
        .iter()
        .position(|c| matches!(c, FleetCall::Start(_)))
        .unwrap();
    let first_stop = calls
        .iter()
        .position(|c| matches!(c, FleetCall::Stop(_)))
        .unwrap();
    assert!(first_start < first_stop);
}

#[tokio::test]
async fn test_update_fails_after_max_attempts() {
    let h = harness();
    run_group(&h, "g", "g-worker@.service", CONTENT_A, &["1", "2", "3"]).await;
    let setup_calls = h.fleet.calls().len();

    let task = h
        .controller
        .update(CancellationToken::new(), new_content("g", &["1", "2", "3"]), opts(0, 3))
        .await
        .unwrap();
    let done = finish(&h.controller, task).await;
    assert!(done.has_failed());
    assert!(done
        .error
        .unwrap()
        .contains("reached max failed change attempts limit"));
    assert_eq!(h.fleet.calls().len(), setup_calls);
}

#[tokio::test]
async fn test_service_and_timer_of_one_base_are_compared_separately() {
    let h = harness();
    let units = vec![
        Unit::new("g-a@.service", CONTENT_A),
        Unit::new("g-a@.timer", "[Timer]\nOnCalendar=hourly\n"),
    ];
    let req = Request::new("g").with_slice_ids(["1"]).with_units(units.clone());
    let task = h.controller.submit(CancellationToken::new(), req.clone()).unwrap();
    assert!(finish(&h.controller, task).await.has_succeeded());

    let (_, needed) = h.controller.group_needs_update(&req).await.unwrap();
    assert!(!needed);
    let (_, needed) = h
        .controller
        .group_needs_update(&Request::new("g").with_units(units))
        .await
        .unwrap();
    assert!(!needed);

    let changed = Request::new("g").with_slice_ids(["1"]).with_units(vec![
        Unit::new("g-a@.service", CONTENT_A),
        Unit::new("g-a@.timer", "[Timer]\nOnCalendar=daily\n"),
    ]);
    let (dirty, needed) = h.controller.group_needs_update(&changed).await.unwrap();
    assert!(needed);
    assert_eq!(dirty.slice_ids, ["1"]);
}

#[tokio::test]
async fn test_update_preconditions() {
    let h = harness();
    run_group(&h, "g", "g-worker@.service", CONTENT_A, &["1", "2"]).await;
    let ctx = CancellationToken::new();

    let err = h
        .controller
        .update(ctx.clone(), new_content("g", &[]), opts(1, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::InvalidArgument(_)));

    let err = h
        .controller
        .update(ctx.clone(), new_content("g", &["1", "2"]), opts(1, 3))
        .await
        .unwrap_err();
    assert!(err.is_update_not_allowed());

    let same = Request::new("g")
        .with_slice_ids(["1", "2"])
        .with_units(vec![Unit::new("g-worker@.service", CONTENT_A)]);
    let err = h.controller.update(ctx, same, opts(1, 1)).await.unwrap_err();
    assert!(err.is_update_not_allowed());
    assert!(err.to_string().contains("already up to date"));
}

#[tokio::test]
async fn test_update_stops_on_cancellation() {
    let h = harness_with(ControllerSettings {
        max_failed_change_attempts: 1_000,
        ..fast_settings()
    });
    run_group(&h, "g", "g-worker@.service", CONTENT_A, &["1", "2"]).await;

    let ctx = CancellationToken::new();
    ctx.cancel();
    let err = h
        .controller
        .update_with_strategy(&ctx, &new_content("g", &["1", "2"]), vec!["1".to_string()], opts(0, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::Cancelled));
}
