//! Playback clock - fixed-cadence progress ticks for the active story.
//!
//! Time is fed in by the caller (`advance`), not read from the wall clock,
//! so cadence and deltas are deterministic: every full interval yields one
//! tick worth `100 * interval / duration` percent. The final tick of a run is
//! clamped so the run never exceeds 100, and is followed by one `Complete`.
//!
//! Each `start()` opens a new generation. Signals carry their generation so
//! the consumer can drop anything produced by a run that was since replaced
//! or stopped.

use log::trace;
use std::time::Duration;

/// Reference tick granularity
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClockSignal {
    /// Progress increment in percent of this run's span
    Tick { generation: u64, delta: f64 },
    /// Run reached 100%. Emitted once, after its last tick.
    Complete { generation: u64 },
}

impl ClockSignal {
    pub fn generation(&self) -> u64 {
        match self {
            ClockSignal::Tick { generation, .. } | ClockSignal::Complete { generation } => *generation,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Run {
    duration: Duration,
    elapsed: Duration,
    emitted: f64,
}

#[derive(Clone, Debug)]
pub struct PlaybackClock {
    interval: Duration,
    generation: u64,
    run: Option<Run>,
    /// Fed time not yet worth a full tick
    carry: Duration,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}

impl PlaybackClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            generation: 0,
            run: None,
            carry: Duration::ZERO,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Generation of the latest run (0 before the first start)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Time elapsed in the current run
    pub fn elapsed(&self) -> Option<Duration> {
        self.run.map(|r| r.elapsed)
    }

    /// Start a run for `duration`, replacing any live run. Returns its generation.
    pub fn start(&mut self, duration: Duration) -> u64 {
        if self.run.is_some() {
            trace!("Clock gen {} replaced before completion", self.generation);
        }
        self.generation += 1;
        self.run = Some(Run {
            duration: duration.max(Duration::from_millis(1)),
            elapsed: Duration::ZERO,
            emitted: 0.0,
        });
        self.carry = Duration::ZERO;
        trace!("Clock gen {} started for {}ms", self.generation, duration.as_millis());
        self.generation
    }

    /// Halt the live run. No-op when idle.
    pub fn stop(&mut self) {
        if self.run.take().is_some() {
            trace!("Clock gen {} stopped", self.generation);
        }
        self.carry = Duration::ZERO;
    }

    /// Feed elapsed time; returns the signals it produced in order.
    ///
    /// Time fed while idle is discarded.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<ClockSignal> {
        let mut signals = Vec::new();
        let generation = self.generation;
        let interval = self.interval;
        let Some(run) = self.run.as_mut() else {
            return signals;
        };

        self.carry += elapsed;
        let mut finished = false;
        while self.carry >= interval {
            self.carry -= interval;
            run.elapsed += interval;

            if run.elapsed >= run.duration {
                let delta = (100.0 - run.emitted).max(0.0);
                run.emitted = 100.0;
                signals.push(ClockSignal::Tick { generation, delta });
                signals.push(ClockSignal::Complete { generation });
                finished = true;
                break;
            }

            let step = 100.0 * interval.as_secs_f64() / run.duration.as_secs_f64();
            let delta = step.min(100.0 - run.emitted);
            run.emitted += delta;
            signals.push(ClockSignal::Tick { generation, delta });
        }

        if finished {
            trace!("Clock gen {} complete", generation);
            self.run = None;
            self.carry = Duration::ZERO;
        }
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(signals: &[ClockSignal]) -> f64 {
        signals
            .iter()
            .map(|s| match s {
                ClockSignal::Tick { delta, .. } => *delta,
                ClockSignal::Complete { .. } => 0.0,
            })
            .sum()
    }

    fn completes(signals: &[ClockSignal]) -> usize {
        signals
            .iter()
            .filter(|s| matches!(s, ClockSignal::Complete { .. }))
            .count()
    }

    #[test]
    fn test_tick_delta_scaled_to_duration() {
        let mut clock = PlaybackClock::default();
        let generation = clock.start(Duration::from_millis(5000));
        let signals = clock.advance(Duration::from_millis(100));
        assert_eq!(signals, vec![ClockSignal::Tick { generation, delta: 2.0 }]);
    }

    #[test]
    fn test_completes_exactly_once_at_duration() {
        let mut clock = PlaybackClock::default();
        clock.start(Duration::from_millis(1000));

        let early = clock.advance(Duration::from_millis(900));
        assert_eq!(early.len(), 9);
        assert_eq!(completes(&early), 0);

        let last = clock.advance(Duration::from_millis(100));
        assert_eq!(completes(&last), 1);
        assert!(matches!(last.last(), Some(ClockSignal::Complete { .. })));
        assert!((total(&early) + total(&last) - 100.0).abs() < 1e-9);
        assert!(!clock.is_running());

        // Nothing more after completion
        assert!(clock.advance(Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_final_tick_clamped() {
        // 250ms: ticks of 40%, 40%, then clamped 20%
        let mut clock = PlaybackClock::default();
        clock.start(Duration::from_millis(250));
        let signals = clock.advance(Duration::from_millis(300));
        let deltas: Vec<f64> = signals
            .iter()
            .filter_map(|s| match s {
                ClockSignal::Tick { delta, .. } => Some(*delta),
                _ => None,
            })
            .collect();
        assert_eq!(deltas.len(), 3);
        assert!((deltas[2] - 20.0).abs() < 1e-9);
        assert!(total(&signals) <= 100.0 + 1e-9);
        assert_eq!(completes(&signals), 1);
    }

    #[test]
    fn test_partial_interval_carries() {
        let mut clock = PlaybackClock::default();
        clock.start(Duration::from_millis(5000));
        assert!(clock.advance(Duration::from_millis(60)).is_empty());
        assert_eq!(clock.advance(Duration::from_millis(60)).len(), 1);
    }

    #[test]
    fn test_stop_halts_and_is_idempotent() {
        let mut clock = PlaybackClock::default();
        clock.stop();
        clock.start(Duration::from_millis(5000));
        clock.stop();
        clock.stop();
        assert!(!clock.is_running());
        assert!(clock.advance(Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn test_restart_bumps_generation() {
        let mut clock = PlaybackClock::default();
        let first = clock.start(Duration::from_millis(5000));
        clock.advance(Duration::from_millis(50));
        let second = clock.start(Duration::from_millis(5000));
        assert_eq!(second, first + 1);

        // Carry from the replaced run is dropped
        assert!(clock.advance(Duration::from_millis(50)).is_empty());
        let signals = clock.advance(Duration::from_millis(50));
        assert!(signals.iter().all(|s| s.generation() == second));
    }
}
