use chrono::{DateTime, Utc};

/// Granularity of the elapsed-time ticker requested from the shell.
pub const TICK_INTERVAL_MS: u64 = 1000;

#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisitTimer {
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_ms: u64,
    pub is_running: bool,
}

impl VisitTimer {
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.started_at = Some(now);
        self.elapsed_ms = 0;
        self.is_running = true;
    }

    /// Ignored unless running, elapsed time never goes backwards.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if !self.is_running {
            return;
        }
        let elapsed_ms = self.elapsed_at(now);
        self.elapsed_ms = self.elapsed_ms.max(elapsed_ms);
    }

    pub fn stop(&mut self, now: DateTime<Utc>) {
        self.tick(now);
        self.is_running = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Elapsed time at `now`, without mutating the timer.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> u64 {
        match (self.started_at, self.is_running) {
            (Some(started_at), true) => u64::try_from((now - started_at).num_milliseconds()).unwrap_or(0),
            _ => self.elapsed_ms,
        }
    }
}

#[cfg(test)]
mod timer_tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn ticks_accumulate_while_running() {
        let mut timer = VisitTimer::default();
        timer.start(t0());

        timer.tick(t0() + Duration::seconds(1));
        timer.tick(t0() + Duration::seconds(3));

        assert_eq!(timer.elapsed_ms, 3000);
        assert!(timer.is_running);
    }

    #[test]
    fn ticks_after_stop_are_ignored() {
        let mut timer = VisitTimer::default();
        timer.start(t0());
        timer.stop(t0() + Duration::seconds(10));

        timer.tick(t0() + Duration::seconds(20));

        assert_eq!(timer.elapsed_ms, 10_000);
        assert!(!timer.is_running);
    }

    #[test]
    fn out_of_order_tick_does_not_decrease_elapsed() {
        let mut timer = VisitTimer::default();
        timer.start(t0());
        timer.tick(t0() + Duration::seconds(5));

        timer.tick(t0() + Duration::seconds(2));

        assert_eq!(timer.elapsed_ms, 5000);
    }

    #[test]
    fn reset_clears_everything() {
        let mut timer = VisitTimer::default();
        timer.start(t0());

        timer.reset();

        assert_eq!(timer, VisitTimer::default());
    }
}
