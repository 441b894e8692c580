//! Liveness timer behaviour under paused time.

use std::time::Duration;

use haver_tick::{TickConfig, TickInfo, TickScheduler};
use tokio::time::Instant;

fn exact(interval: Duration) -> TickScheduler {
    TickScheduler::new(TickConfig {
        initial_jitter: Duration::ZERO,
        ..TickConfig::with_interval(interval)
    })
}

#[test]
fn test_zero_interval_is_off() {
    let timer = TickScheduler::new(TickConfig::default());
    assert!(timer.is_disabled());
    assert_eq!(timer.interval(), Duration::ZERO);
}

#[test]
fn test_armed_timer_starts_at_zero() {
    let timer = exact(Duration::from_secs(60));
    assert!(!timer.is_disabled());
    assert_eq!(timer.interval(), Duration::from_secs(60));
    assert_eq!(timer.tick_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_after_one_interval() {
    let start = Instant::now();
    let mut timer = exact(Duration::from_secs(60));

    let info = timer.wait_for_tick().await;
    assert_eq!(info, TickInfo { tick: 1, missed: 0 });
    assert_eq!(start.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_jitter_stays_within_bound() {
    let start = Instant::now();
    let mut timer = TickScheduler::new(TickConfig {
        interval: Duration::from_secs(10),
        initial_jitter: Duration::from_millis(500),
    });

    timer.wait_for_tick().await;
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(10));
    assert!(waited < Duration::from_millis(10_500));
}

#[tokio::test(start_paused = true)]
async fn test_ticks_are_numbered_in_order() {
    let mut timer = exact(Duration::from_secs(1));
    for n in 1..=4 {
        assert_eq!(timer.wait_for_tick().await.tick, n);
    }
    assert_eq!(timer.tick_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_timer_never_fires() {
    let mut timer = TickScheduler::new(TickConfig::default());
    let waited = tokio::time::timeout(Duration::from_secs(86_400), timer.wait_for_tick()).await;
    assert!(waited.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_overdue_tick_reports_missed_and_restarts() {
    let mut timer = exact(Duration::from_secs(2));

    // Stall for 7s past a 2s deadline: the deadlines at 4s and 6s pass unseen.
    tokio::time::advance(Duration::from_secs(7)).await;
    let info = timer.wait_for_tick().await;
    assert_eq!(info.tick, 1);
    assert_eq!(info.missed, 2);

    let resumed = Instant::now();
    let info = timer.wait_for_tick().await;
    assert_eq!(info, TickInfo { tick: 2, missed: 0 });
    assert_eq!(resumed.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_losing_select_branch_keeps_deadline() {
    let start = Instant::now();
    let mut timer = exact(Duration::from_secs(5));

    // A faster branch wins first; the tick must still land at 5s.
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        _ = timer.wait_for_tick() => panic!("tick fired too early"),
    }
    timer.wait_for_tick().await;
    assert_eq!(start.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_timer_alongside_inbound_lines() {
    let mut timer = exact(Duration::from_millis(100));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<&str>();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let _ = tx.send("BYE");
    });

    let mut ticks = 0;
    loop {
        tokio::select! {
            Some(line) = rx.recv() => {
                assert_eq!(line, "BYE");
                break;
            }
            info = timer.wait_for_tick() => {
                ticks += 1;
                assert_eq!(info.tick, ticks);
            }
        }
    }
    assert_eq!(ticks, 2);
}
