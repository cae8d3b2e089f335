//! The process-level scheduling loop (spec §4.7, ambient): runs a
//! `CheckDriver` on the configured collection interval, re-entering
//! immediately whenever the driver signals `continue_after_commit`, and
//! shutting down gracefully on Ctrl-C — the same shape as the teacher's
//! `main.rs` background-task loop plus `tokio::signal::ctrl_c()` await.

use crate::driver::CheckDriver;
use std::time::Duration;
use tokio::time::interval;

/// Drive every instance's `CheckDriver` concurrently until Ctrl-C.
pub async fn run(mut drivers: Vec<CheckDriver>, collection_interval_seconds: u64) {
    let mut ticker = interval(Duration::from_secs(collection_interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_all_cycles(&mut drivers).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received shutdown signal, stopping scheduler");
                break;
            }
        }
    }
}

/// Run one cycle on every driver, immediately re-entering any driver that
/// signals `continue_after_commit` before moving on to the next tick.
async fn run_all_cycles(drivers: &mut [CheckDriver]) {
    for driver in drivers.iter_mut() {
        loop {
            let continue_after_commit = driver.run_cycle().await;
            if !continue_after_commit {
                break;
            }
        }
    }
}
