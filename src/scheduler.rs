use std::{
    thread,
    time::{Duration, Instant},
};

/// Paces the collector loop.
pub trait Ticker {
    /// Block until the next tick is due, `false` once no more ticks will come.
    fn wait_next(&mut self) -> bool;
}

impl<T: Ticker + ?Sized> Ticker for Box<T> {
    fn wait_next(&mut self) -> bool {
        (**self).wait_next()
    }
}

/// Ticks at a fixed wall-clock rate, catching up without bursting when a tick ran late.
pub struct FixedRateTicker {
    period: Duration,
    next: Option<Instant>,
}

impl FixedRateTicker {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    pub fn from_millis(period_ms: u64) -> Self {
        Self::new(Duration::from_millis(period_ms))
    }
}

impl Ticker for FixedRateTicker {
    fn wait_next(&mut self) -> bool {
        let now = Instant::now();
        let due = self.next.unwrap_or(now);
        if due > now {
            thread::sleep(due - now);
        }
        self.next = Some(due.max(now) + self.period);
        true
    }
}

/// Ticks as fast as it is polled, optionally a limited number of times.
#[derive(Debug, Default)]
pub struct ManualTicker {
    remaining: Option<usize>,
    ticks: usize,
}

impl ManualTicker {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_limit(ticks: usize) -> Self {
        Self {
            remaining: Some(ticks),
            ticks: 0,
        }
    }

    /// Ticks handed out so far
    pub fn ticks(&self) -> usize {
        self.ticks
    }
}

impl Ticker for ManualTicker {
    fn wait_next(&mut self) -> bool {
        match self.remaining.as_mut() {
            Some(0) => return false,
            Some(remaining) => *remaining -= 1,
            None => {}
        }
        self.ticks += 1;
        true
    }
}
