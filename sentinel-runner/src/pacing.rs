//! Courtesy pause between entities.

use rand::Rng;
use std::time::Duration;

pub trait Pacer {
    fn pause(&mut self);
}

/// Sleeps a uniformly random duration in `[min, max]` seconds.
pub struct RandomPacer {
    min_secs: f64,
    max_secs: f64,
    rng: rand::rngs::ThreadRng,
}

impl RandomPacer {
    pub fn new(min_secs: f64, max_secs: f64) -> Self {
        Self {
            min_secs,
            max_secs: max_secs.max(min_secs),
            rng: rand::thread_rng(),
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let secs = if self.max_secs > self.min_secs {
            self.rng.gen_range(self.min_secs..=self.max_secs)
        } else {
            self.min_secs
        };
        Duration::from_secs_f64(secs.max(0.0))
    }
}

impl Pacer for RandomPacer {
    fn pause(&mut self) {
        let delay = self.next_delay();
        tracing::debug!(delay_ms = delay.as_millis() as u64, "pausing between entities");
        std::thread::sleep(delay);
    }
}

/// No pause (tests, local extract runs).
pub struct NoPause;

impl Pacer for NoPause {
    fn pause(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_stays_in_bounds() {
        let mut pacer = RandomPacer::new(0.5, 1.5);
        for _ in 0..200 {
            let d = pacer.next_delay();
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn degenerate_range_is_fixed() {
        let mut pacer = RandomPacer::new(0.25, 0.25);
        assert_eq!(pacer.next_delay(), Duration::from_millis(250));
    }
}
