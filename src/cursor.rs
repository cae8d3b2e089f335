//! The temporal cursor / time-window planner (spec §4.5) — the core of the
//! engine. Has no direct teacher analogue; built straight from the design's
//! quantified invariants and literal end-to-end scenarios (spec §8).

use crate::time::format_canonical;

/// One dispatch window: always has an `earliest_time`; `latest_time` is
/// absent for a real-time tail query (spec §3 `QueryWindow`).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryWindow {
    pub earliest_time: f64,
    pub latest_time: Option<f64>,
}

impl QueryWindow {
    pub fn earliest_canonical(&self) -> String {
        format_canonical(self.earliest_time)
    }

    pub fn latest_canonical(&self) -> Option<String> {
        self.latest_time.map(format_canonical)
    }
}

/// What state a cursor is in, named for readability and diagnostics; the
/// behavior itself is fully determined by `TemporalCursor`'s fields plus
/// `now`, not by this tag. Kept as an explicit enum because the design and
/// its test scenarios (spec §8) name these states directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Delay,
    InitialHistory,
    ChunkedHistory,
    Realtime,
}

/// Per-`(instance, saved_search)` scheduling state (spec §3 `TemporalCursor`).
/// Lives in process memory for the life of the driver; never written to disk.
#[derive(Debug, Clone)]
pub struct TemporalCursor {
    last_committed_time: Option<f64>,
    last_event_timestamp_seen: Option<f64>,
    initial_delay_deadline: Option<f64>,
    in_history_recovery: bool,
}

/// Result of planning one cycle for one search: the window to query (`None`
/// if the search should be skipped this cycle, e.g. still in its initial
/// delay) and whether the driver should re-enter immediately after commit.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub window: Option<QueryWindow>,
    pub continue_after_commit: bool,
    pub state: CursorState,
}

impl TemporalCursor {
    /// A freshly created cursor, optionally starting in the Delay state if
    /// `initial_delay_seconds > 0`.
    pub fn new(now: f64, initial_delay_seconds: u64) -> Self {
        let initial_delay_deadline = if initial_delay_seconds > 0 {
            Some(now + initial_delay_seconds as f64)
        } else {
            None
        };
        Self {
            last_committed_time: None,
            last_event_timestamp_seen: None,
            initial_delay_deadline,
            in_history_recovery: false,
        }
    }

    pub fn last_committed_time(&self) -> Option<f64> {
        self.last_committed_time
    }

    /// Plan the window for this cycle (spec §4.5 "Window computation").
    pub fn plan(
        &mut self,
        now: f64,
        force_reload: bool,
        max_query_chunk_seconds: u64,
        max_initial_history_seconds: u64,
        max_restart_history_seconds: u64,
    ) -> PlanOutcome {
        if let Some(deadline) = self.initial_delay_deadline {
            if now < deadline {
                return PlanOutcome {
                    window: None,
                    continue_after_commit: false,
                    state: CursorState::Delay,
                };
            }
        }

        let chunk = max_query_chunk_seconds as f64;
        let latest_bound = now;

        let (earliest, mut state) = match self.last_committed_time {
            None => {
                self.in_history_recovery = true;
                (now - max_initial_history_seconds as f64, CursorState::InitialHistory)
            }
            Some(committed) if force_reload => {
                self.in_history_recovery = true;
                (
                    (committed).max(now - max_restart_history_seconds as f64),
                    CursorState::ChunkedHistory,
                )
            }
            Some(committed) => (committed, CursorState::Realtime),
        };

        // Clock skew guard: never issue an inverted window.
        let earliest = earliest.min(latest_bound);
        let gap = latest_bound - earliest;

        if gap > chunk {
            if self.in_history_recovery {
                state = CursorState::ChunkedHistory;
            }
            let window = QueryWindow {
                earliest_time: earliest,
                latest_time: Some(earliest + chunk),
            };
            PlanOutcome {
                window: Some(window),
                continue_after_commit: true,
                state,
            }
        } else {
            self.in_history_recovery = false;
            let window = QueryWindow {
                earliest_time: earliest,
                latest_time: None,
            };
            PlanOutcome {
                window: Some(window),
                continue_after_commit: false,
                state: CursorState::Realtime,
            }
        }
    }

    /// Commit a successfully handled window (spec §4.5 "Commit / rollback").
    /// `max_event_timestamp` is the maximum `_time` observed across the
    /// cycle's surviving events, if any.
    pub fn commit(&mut self, window: &QueryWindow, now: f64, max_event_timestamp: Option<f64>) {
        let window_end = window.latest_time.unwrap_or(now);
        let new_committed = match max_event_timestamp {
            Some(max_ts) => window_end.max(max_ts + 1e-6),
            None => window_end,
        };
        self.last_committed_time = Some(self.last_committed_time.unwrap_or(new_committed).max(new_committed));
        if let Some(max_ts) = max_event_timestamp {
            self.last_event_timestamp_seen = Some(
                self.last_event_timestamp_seen
                    .map_or(max_ts, |prev| prev.max(max_ts)),
            );
        }
    }

    /// No-op: failure at any later stage of the cycle leaves the cursor
    /// untouched so the next cycle repeats the same window (spec §4.5).
    pub fn rollback(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: u64 = 3600;
    const DAY: u64 = 86_400;

    #[test]
    fn fresh_cursor_backfills_from_max_initial_history() {
        let now = 1488997799.0; // 2017-03-08T18:29:59Z
        let mut cursor = TemporalCursor::new(now, 0);
        let outcome = cursor.plan(now, false, HOUR, DAY, DAY);
        let window = outcome.window.unwrap();
        assert_eq!(window.earliest_time, now - DAY as f64);
    }

    #[test]
    fn delay_state_produces_no_window_before_deadline() {
        let mut cursor = TemporalCursor::new(1.0, 60);
        let outcome = cursor.plan(1.0, false, HOUR, DAY, DAY);
        assert_eq!(outcome.window, None);
        assert_eq!(outcome.state, CursorState::Delay);

        let outcome = cursor.plan(30.0, false, HOUR, DAY, DAY);
        assert_eq!(outcome.window, None);

        let outcome = cursor.plan(62.0, false, HOUR, DAY, DAY);
        assert!(outcome.window.is_some());
    }

    #[test]
    fn commit_advances_to_window_end_when_no_events() {
        let now = 1000.0;
        let mut cursor = TemporalCursor::new(now, 0);
        let window = QueryWindow {
            earliest_time: 0.0,
            latest_time: Some(500.0),
        };
        cursor.commit(&window, now, None);
        assert_eq!(cursor.last_committed_time(), Some(500.0));
    }

    #[test]
    fn commit_advances_past_last_event_plus_one_microsecond() {
        let now = 1000.0;
        let mut cursor = TemporalCursor::new(now, 0);
        let window = QueryWindow {
            earliest_time: 0.0,
            latest_time: Some(500.0),
        };
        cursor.commit(&window, now, Some(499.999_999));
        let committed = cursor.last_committed_time().unwrap();
        assert!(committed >= 500.0);
    }

    #[test]
    fn realtime_commit_uses_now_when_no_latest_time() {
        let now = 1000.0;
        let mut cursor = TemporalCursor::new(0.0, 0);
        let window = QueryWindow {
            earliest_time: 900.0,
            latest_time: None,
        };
        cursor.commit(&window, now, None);
        assert_eq!(cursor.last_committed_time(), Some(now));
    }

    #[test]
    fn commit_never_decreases_last_committed_time() {
        let mut cursor = TemporalCursor::new(0.0, 0);
        cursor.commit(
            &QueryWindow {
                earliest_time: 0.0,
                latest_time: Some(1000.0),
            },
            1000.0,
            None,
        );
        cursor.commit(
            &QueryWindow {
                earliest_time: 500.0,
                latest_time: Some(600.0),
            },
            600.0,
            None,
        );
        assert_eq!(cursor.last_committed_time(), Some(1000.0));
    }

    #[test]
    fn forced_reload_earliest_is_bounded_by_max_restart_history() {
        // previous commit 2017-03-08T00:00:01Z, now 2017-03-08T12:00:00Z
        let committed = 1488931201.0;
        let now = 1488974400.0;
        let mut cursor = TemporalCursor::new(0.0, 0);
        cursor.commit(
            &QueryWindow {
                earliest_time: 0.0,
                latest_time: Some(committed),
            },
            committed,
            None,
        );
        let outcome = cursor.plan(now, true, HOUR, DAY, DAY);
        let window = outcome.window.unwrap();
        assert_eq!(window.earliest_time, committed.max(now - DAY as f64));
        assert_eq!(outcome.continue_after_commit, true);
    }

    #[test]
    fn chunked_restart_recovery_issues_eleven_one_hour_chunks_then_goes_realtime() {
        let committed_start = 1488931201.0; // 2017-03-08T00:00:01Z
        let now = 1488974400.0; // 2017-03-08T12:00:00Z
        let mut cursor = TemporalCursor::new(0.0, 0);
        cursor.commit(
            &QueryWindow {
                earliest_time: 0.0,
                latest_time: Some(committed_start),
            },
            committed_start,
            None,
        );

        let mut force_reload = true;
        let mut chunk_count = 0;
        loop {
            let outcome = cursor.plan(now, force_reload, HOUR, DAY, DAY);
            force_reload = false;
            let window = outcome.window.clone().unwrap();
            if window.latest_time.is_none() {
                assert_eq!(outcome.continue_after_commit, false);
                break;
            }
            chunk_count += 1;
            assert_eq!(outcome.continue_after_commit, true);
            cursor.commit(&window, now, None);
            assert!(chunk_count <= 20, "chunking did not converge");
        }
        assert_eq!(chunk_count, 11);
    }

    #[test]
    fn clock_skew_never_produces_an_inverted_window() {
        let mut cursor = TemporalCursor::new(0.0, 0);
        cursor.commit(
            &QueryWindow {
                earliest_time: 0.0,
                latest_time: Some(1000.0),
            },
            1000.0,
            None,
        );
        // now goes backwards relative to the last commit
        let outcome = cursor.plan(500.0, false, HOUR, DAY, DAY);
        let window = outcome.window.unwrap();
        assert!(window.earliest_time <= 500.0);
        if let Some(latest) = window.latest_time {
            assert!(window.earliest_time <= latest);
        }
    }
}
