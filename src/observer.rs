//! Per-stage call-timing, used by the flow controller to read the
//! renderer's actual frame rate and by the orchestrator's diagnostic
//! printer. An explicit handle passed into each stage, not a process-wide
//! registry keyed by name (spec.md §9's note on avoiding a global map).

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const MAX_AGE: Duration = Duration::from_millis(3000);

/// Records one timestamp per `tick()` and answers "how many ticks in the
/// last `window`". Old entries older than `MAX_AGE` are pruned lazily.
pub struct Observer {
    ticks: Mutex<VecDeque<Instant>>,
}

impl Observer {
    pub fn new() -> Self {
        Observer {
            ticks: Mutex::new(VecDeque::new()),
        }
    }

    pub fn tick(&self) {
        let now = Instant::now();
        let mut ticks = self.ticks.lock().unwrap();
        ticks.push_back(now);
        while let Some(&front) = ticks.front() {
            if now.duration_since(front) > MAX_AGE {
                ticks.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of `tick()` calls recorded within `window` of the most
    /// recent one.
    pub fn calls_in_last(&self, window: Duration) -> u32 {
        let ticks = self.ticks.lock().unwrap();
        let Some(&latest) = ticks.back() else {
            return 0;
        };
        ticks
            .iter()
            .rev()
            .take_while(|&&t| latest.duration_since(t) < window)
            .count() as u32
    }
}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_observer_reports_zero_calls() {
        let observer = Observer::new();
        assert_eq!(observer.calls_in_last(Duration::from_secs(1)), 0);
    }

    #[test]
    fn counts_ticks_within_window() {
        let observer = Observer::new();
        for _ in 0..5 {
            observer.tick();
        }
        assert_eq!(observer.calls_in_last(Duration::from_secs(1)), 5);
    }
}
