use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tele_core::{CancelToken, FnStage, GraphBuilder, RunStatus, Scheduler, Selection, SkipReason, StageError, StageKind,
                StageReport, StageStatus, Trigger};

#[test]
fn panicking_stage_is_recorded_and_isolated() {
    let graph = GraphBuilder::new().stage(FnStage::new("bad", StageKind::Load, |_| panic!("kaboom")), &[])
                                   .stage(FnStage::new("after", StageKind::Transform, |_| Ok(StageReport::empty())),
                                          &["bad"])
                                   .stage(FnStage::new("other", StageKind::Transform, |_| Ok(StageReport::empty())),
                                          &[])
                                   .build()
                                   .expect("graph");
    let mut scheduler = Scheduler::new(graph);
    let result = scheduler.execute(&Selection::All).expect("run");

    assert_eq!(result.stage("bad").and_then(|s| s.error.clone()),
               Some(StageError::Panicked("kaboom".into())));
    assert_eq!(result.status_of("after"), Some(StageStatus::Skipped));
    assert_eq!(result.status_of("other"), Some(StageStatus::Succeeded));
    assert_eq!(result.status, RunStatus::Failed);
}

#[test]
fn slow_stage_times_out_and_sees_its_token_cancelled() {
    let observed = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&observed);
    let slow = FnStage::new("slow", StageKind::Enrichment, move |ctx| {
        for _ in 0..200 {
            if ctx.is_cancelled() {
                seen.store(1, Ordering::SeqCst);
                return Err(StageError::Cancelled);
            }
            thread::sleep(Duration::from_millis(10));
        }
        Ok(StageReport::empty())
    });
    let graph = GraphBuilder::new().stage(slow, &[])
                                   .stage(FnStage::new("next", StageKind::Load, |_| Ok(StageReport::empty())), &["slow"])
                                   .build()
                                   .expect("graph");
    let mut scheduler = Scheduler::new(graph).with_stage_timeout(Some(Duration::from_millis(50)));
    let result = scheduler.execute(&Selection::All).expect("run");

    assert!(matches!(result.stage("slow").and_then(|s| s.error.clone()), Some(StageError::Timeout { .. })));
    assert_eq!(result.status_of("next"), Some(StageStatus::Skipped));

    // El hilo abandonado observa la cancelación de su token.
    for _ in 0..100 {
        if observed.load(Ordering::SeqCst) == 1 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(observed.load(Ordering::SeqCst), 1);
}

#[test]
fn cancelled_run_skips_remaining_stages() {
    let token = CancelToken::new();
    let trip = token.clone();
    let graph = GraphBuilder::new().stage(FnStage::new("first", StageKind::Extraction, move |_| {
                                              trip.cancel();
                                              Ok(StageReport::empty())
                                          }),
                                          &[])
                                   .stage(FnStage::new("second", StageKind::Load, |_| Ok(StageReport::empty())), &[])
                                   .build()
                                   .expect("graph");
    let mut scheduler = Scheduler::new(graph);
    let result = scheduler.execute_with(&Selection::All, Trigger::Manual, &token).expect("run");

    assert_eq!(result.status_of("first"), Some(StageStatus::Succeeded));
    assert_eq!(result.stage("second").and_then(|s| s.skip_reason.clone()), Some(SkipReason::Cancelled));
    assert_eq!(result.status, RunStatus::Partial);
}

/// Stage que ignora su token y marca si está en ejecución.
fn stubborn(id: &'static str, busy: &Arc<AtomicBool>, sleep_ms: u64) -> FnStage {
    let busy = Arc::clone(busy);
    FnStage::new(id, StageKind::Load, move |_| {
        busy.store(true, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(sleep_ms));
        busy.store(false, Ordering::SeqCst);
        Ok(StageReport::empty())
    })
}

#[test]
fn next_stage_waits_for_timed_out_stage_to_exit() {
    let busy = Arc::new(AtomicBool::new(false));
    let overlapped = Arc::new(AtomicBool::new(false));
    let (a_busy, b_overlap) = (Arc::clone(&busy), Arc::clone(&overlapped));
    let graph = GraphBuilder::new().stage(stubborn("a", &busy, 300), &[])
                                   .stage(FnStage::new("b", StageKind::Transform, move |_| {
                                              b_overlap.store(a_busy.load(Ordering::SeqCst), Ordering::SeqCst);
                                              Ok(StageReport::empty())
                                          }),
                                          &[])
                                   .build()
                                   .expect("graph");
    let mut scheduler = Scheduler::new(graph).with_stage_timeout(Some(Duration::from_millis(50)));
    let result = scheduler.execute(&Selection::All).expect("run");

    assert!(matches!(result.stage("a").and_then(|s| s.error.clone()), Some(StageError::Timeout { .. })));
    assert_eq!(result.status_of("b"), Some(StageStatus::Succeeded));
    assert!(!overlapped.load(Ordering::SeqCst), "b ran while a was still executing");
}

#[test]
fn hung_stage_blocks_the_rest_of_the_run_and_the_next_run() {
    let busy = Arc::new(AtomicBool::new(false));
    let ran_b = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran_b);
    let graph = GraphBuilder::new().stage(stubborn("a", &busy, 400), &[])
                                   .stage(FnStage::new("b", StageKind::Transform, move |_| {
                                              counter.fetch_add(1, Ordering::SeqCst);
                                              Ok(StageReport::empty())
                                          }),
                                          &[])
                                   .build()
                                   .expect("graph");
    let mut scheduler = Scheduler::new(graph).with_stage_timeout(Some(Duration::from_millis(30)))
                                             .with_timeout_grace(Duration::from_millis(20));

    let first = scheduler.execute(&Selection::All).expect("first run");
    assert_eq!(first.stage("b").and_then(|s| s.skip_reason.clone()), Some(SkipReason::Cancelled));
    assert_eq!(first.status, RunStatus::Failed);

    // `a` sigue corriendo: el run siguiente no arranca nada.
    let second = scheduler.execute(&Selection::stages(["b"])).expect("second run");
    assert_eq!(second.stage("b").and_then(|s| s.skip_reason.clone()), Some(SkipReason::Cancelled));
    assert_eq!(ran_b.load(Ordering::SeqCst), 0);

    // Una vez que `a` termina, los runs vuelven a ejecutar stages.
    while busy.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(10));
    }
    let third = scheduler.execute(&Selection::stages(["b"])).expect("third run");
    assert_eq!(third.status_of("b"), Some(StageStatus::Succeeded));
    assert_eq!(ran_b.load(Ordering::SeqCst), 1);
}
