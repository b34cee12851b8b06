//! Performance Meter (spec §4.8): a sliding-window records/second reading
//! for progress logs. Plays no correctness role.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(30);

pub struct PerformanceMeter {
    samples: VecDeque<(Instant, u64)>,
}

impl PerformanceMeter {
    pub fn new() -> Self {
        PerformanceMeter { samples: VecDeque::new() }
    }

    pub fn add(&mut self, count: u64) {
        let now = Instant::now();
        self.samples.push_back((now, count));
        while let Some((oldest, _)) = self.samples.front() {
            if now.duration_since(*oldest) > WINDOW {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Records per second over the retained window; `0.0` with fewer than
    /// two samples.
    pub fn speed(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        let (first_at, _) = self.samples.front().unwrap();
        let (last_at, _) = self.samples.back().unwrap();
        let elapsed = last_at.duration_since(*first_at).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        let total: u64 = self.samples.iter().skip(1).map(|(_, c)| c).sum();
        total as f64 / elapsed
    }
}

impl Default for PerformanceMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_zero_with_a_single_sample() {
        let mut meter = PerformanceMeter::new();
        meter.add(10);
        assert_eq!(meter.speed(), 0.0);
    }
}
