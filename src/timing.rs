//! Wall-clock accounting for the run stages the orchestrator drives (§9's
//! timing-counters addition, grounded on the reference engine's per-stage
//! `Timing` struct in `vars.h`). Counters are cumulative across every
//! orientation/polarization the run performs, not reset per iteration.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunTimings {
    pub init: Duration,
    pub build_particle: Duration,
    pub build_dmatrix: Duration,
    pub solve: Duration,
    pub evaluate_fields: Duration,
    pub integrate: Duration,
}

impl RunTimings {
    pub fn total(&self) -> Duration {
        self.init + self.build_particle + self.build_dmatrix + self.solve + self.evaluate_fields + self.integrate
    }
}

/// A running stopwatch that accumulates elapsed time into a named field via
/// [`Stopwatch::stop`], rather than pairing bare `Instant::now()` calls by
/// hand at every call site.
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Stopwatch { started: Instant::now() }
    }

    /// Elapsed time since `start`, added onto `accumulator`.
    pub fn stop(self, accumulator: &mut Duration) {
        *accumulator += self.started.elapsed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopwatch_accumulates_into_the_given_field() {
        let mut timings = RunTimings::default();
        let sw = Stopwatch::start();
        sw.stop(&mut timings.solve);
        assert!(timings.solve >= Duration::from_nanos(0));
        assert_eq!(timings.total(), timings.solve);
    }
}
