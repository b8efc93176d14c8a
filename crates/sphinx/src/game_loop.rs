//! # Tick Loop
//!
//! Fixed-rate orchestration for sessions:
//!
//! ```text
//! Tick N:
//! ┌──────────────────────────────────────────────────────┐
//! │ 1. BEGIN TICK  - measure delta since the last tick   │
//! │ 2. UPDATE      - session.update(delta) on each peer  │
//! │ 3. END TICK    - record timing, report budget left   │
//! │ 4. SLEEP       - caller waits out the remainder      │
//! └──────────────────────────────────────────────────────┘
//! ```

use std::time::{Duration, Instant};

use sphinx_net::NetConfig;

/// Largest delta handed to a tick, so a stall does not replay as one huge step.
pub const MAX_DELTA: Duration = Duration::from_millis(100);

/// Timing of one tick in progress.
#[derive(Clone, Copy, Debug)]
pub struct TickContext {
    /// Tick number, starting at 0.
    pub tick: u64,
    /// Time since the previous tick began, clamped to [`MAX_DELTA`].
    pub delta: Duration,
    started: Instant,
}

/// Aggregate tick timing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Ticks recorded.
    pub ticks: u64,
    /// Sum of tick durations in microseconds.
    pub total_us: u64,
    /// Slowest tick in microseconds.
    pub max_us: u64,
    /// Ticks that overran the interval.
    pub over_budget: u64,
}

impl TickStats {
    /// Mean tick duration in microseconds.
    #[must_use]
    pub fn average_us(&self) -> u64 {
        self.total_us.checked_div(self.ticks).unwrap_or(0)
    }

    fn record(&mut self, elapsed_us: u64, over_budget: bool) {
        self.ticks += 1;
        self.total_us += elapsed_us;
        self.max_us = self.max_us.max(elapsed_us);
        if over_budget {
            self.over_budget += 1;
        }
    }
}

/// Fixed-rate tick driver.
#[derive(Debug)]
pub struct TickLoop {
    interval: Duration,
    tick: u64,
    last_begin: Option<Instant>,
    stats: TickStats,
}

impl TickLoop {
    /// Loop ticking `tick_rate` times per second.
    ///
    /// # Panics
    ///
    /// Panics if `tick_rate` is zero.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        assert!(tick_rate > 0, "tick rate must be positive");
        Self {
            interval: Duration::from_secs(1) / tick_rate,
            tick: 0,
            last_begin: None,
            stats: TickStats::default(),
        }
    }

    /// Loop at the configured tick rate.
    #[must_use]
    pub fn from_config(config: &NetConfig) -> Self {
        Self::new(config.tick_rate)
    }

    /// Starts a tick. The first tick's delta is one interval.
    pub fn begin_tick(&mut self) -> TickContext {
        let now = Instant::now();
        let delta = self
            .last_begin
            .map_or(self.interval, |last| now.duration_since(last))
            .min(MAX_DELTA);
        self.last_begin = Some(now);
        TickContext {
            tick: self.tick,
            delta,
            started: now,
        }
    }

    /// Finishes a tick. Returns how long to wait before the next one.
    pub fn end_tick(&mut self, ctx: TickContext) -> Duration {
        let elapsed = ctx.started.elapsed();
        let over_budget = elapsed > self.interval;
        self.stats
            .record(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX), over_budget);
        self.tick += 1;

        if over_budget {
            tracing::warn!(
                tick = ctx.tick,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.interval.as_secs_f64() * 1000.0,
                "tick exceeded budget"
            );
        }
        self.interval.saturating_sub(elapsed)
    }

    /// Ticks completed.
    #[inline]
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Target time between ticks.
    #[inline]
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Accumulated timing.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }
}
