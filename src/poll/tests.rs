//! Tests for the fixed-delay poller.

use std::collections::VecDeque;
use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::test_support::CountingProgress;

#[fixture]
fn fast() -> PollSpec {
    PollSpec::new(Duration::ZERO)
}

#[rstest]
#[tokio::test]
async fn returns_on_fourth_check_after_three_ticks(fast: PollSpec) {
    let mut script = VecDeque::from(["A", "A", "A", "B"]);
    let mut progress = CountingProgress::default();

    let outcome = wait_for(
        &fast,
        async || script.pop_front(),
        until_state("B"),
        &mut progress,
    )
    .await;

    assert_eq!(outcome, PollOutcome::Done("B"));
    assert_eq!(progress.ticks(), 3);
    assert!(script.is_empty());
}

#[rstest]
#[tokio::test]
async fn deployment_statuses_tick_until_success(fast: PollSpec) {
    let mut script = VecDeque::from(["queued", "running", "running", "success"]);
    let mut progress = CountingProgress::default();

    let outcome = wait_for(
        &fast,
        async || script.pop_front().map(str::to_owned),
        |status: &String| status == "success",
        &mut progress,
    )
    .await;

    assert_eq!(outcome.done().as_deref(), Some("success"));
    assert_eq!(progress.ticks(), 3);
}

#[rstest]
#[tokio::test]
async fn immediate_match_never_ticks(fast: PollSpec) {
    let mut progress = CountingProgress::default();
    let outcome = wait_for(&fast, async || Some(1), |_: &i32| true, &mut progress).await;
    assert_eq!(outcome, PollOutcome::Done(1));
    assert_eq!(progress.ticks(), 0);
}

#[rstest]
#[tokio::test]
async fn exit_state_predicate_waits_for_change(fast: PollSpec) {
    let mut script = VecDeque::from(["provisioning", "provisioning", "active"]);
    let mut progress = CountingProgress::default();

    let outcome = wait_for(
        &fast,
        async || script.pop_front(),
        while_state("provisioning"),
        &mut progress,
    )
    .await;

    assert_eq!(outcome, PollOutcome::Done("active"));
    assert_eq!(progress.ticks(), 2);
}

#[rstest]
#[tokio::test]
async fn missing_snapshots_are_retried(fast: PollSpec) {
    let mut script = VecDeque::from([None, Some("queued"), None, Some("done")]);
    let mut progress = CountingProgress::default();

    let outcome = wait_for(
        &fast,
        async || script.pop_front().flatten(),
        until_state("done"),
        &mut progress,
    )
    .await;

    assert_eq!(outcome, PollOutcome::Done("done"));
    assert_eq!(progress.ticks(), 3);
}

#[rstest]
#[tokio::test]
async fn attempt_ceiling_reports_timeout_with_last_snapshot(fast: PollSpec) {
    let spec = fast.with_max_attempts(Some(3));
    let mut progress = CountingProgress::default();
    let mut calls = 0_u32;

    let outcome = wait_for(
        &spec,
        async || {
            calls += 1;
            Some(calls)
        },
        |_: &u32| false,
        &mut progress,
    )
    .await;

    assert_eq!(
        outcome,
        PollOutcome::TimedOut {
            attempts: 3,
            last: Some(3)
        }
    );
    assert_eq!(progress.ticks(), 2);
}

#[rstest]
#[tokio::test]
async fn consecutive_failures_surface_fetch_failed(fast: PollSpec) {
    let spec = fast.with_max_consecutive_failures(Some(2));
    let mut script = VecDeque::from([Some("x"), None, Some("y"), None, None, Some("z")]);
    let mut progress = CountingProgress::default();

    let outcome = wait_for(
        &spec,
        async || script.pop_front().flatten(),
        until_state("z"),
        &mut progress,
    )
    .await;

    assert_eq!(outcome, PollOutcome::FetchFailed { consecutive: 2 });
    assert_eq!(script.len(), 1, "the successful snapshot must reset the streak");
}

#[tokio::test]
async fn sleeps_between_checks() {
    let spec = PollSpec::new(Duration::from_millis(20));
    let mut script = VecDeque::from([1, 2]);
    let started = std::time::Instant::now();

    let outcome = wait_for(&spec, async || script.pop_front(), until_state(2), &mut NoProgress).await;

    assert_eq!(outcome, PollOutcome::Done(2));
    assert!(started.elapsed() >= Duration::from_millis(20));
}

#[test]
fn default_delays_match_operations() {
    assert_eq!(PollSpec::default().delay(), DEFAULT_POLL_DELAY);
    assert_eq!(DEPLOYMENT_POLL_DELAY, Duration::from_secs(3));
    assert_eq!(SSH_POLL_DELAY, Duration::from_secs(5));
    assert_eq!(PollSpec::default().max_attempts(), None);
}
