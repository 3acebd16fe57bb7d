use std::time::{Duration, Instant};

/// Counts ticks and reports the rate once per interval.
pub struct FpsCounter {
    frame_count: u32,
    last_time: Instant,
    interval: Duration,
}

impl FpsCounter {
    /// Reports once per second.
    pub fn new() -> Self {
        Self::with_interval(Duration::from_secs(1))
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            frame_count: 0,
            last_time: Instant::now(),
            interval,
        }
    }

    /// Records one tick. Returns the measured rate when an interval elapsed.
    pub fn update(&mut self) -> Option<f32> {
        self.frame_count += 1;
        let elapsed = self.last_time.elapsed();

        if elapsed >= self.interval {
            let fps = self.frame_count as f32 / elapsed.as_secs_f32();
            self.frame_count = 0;
            self.last_time = Instant::now();
            Some(fps)
        } else {
            None
        }
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-rate tick schedule measured from a start instant.
pub struct TickClock {
    start: Instant,
    last_tick: Option<Instant>,
    period: Duration,
}

impl TickClock {
    /// `rate` is in ticks per second; non-positive rates tick as fast as
    /// they are polled.
    pub fn new(rate: f32) -> Self {
        let period = if rate > 0.0 {
            Duration::from_secs_f32(1.0 / rate)
        } else {
            Duration::ZERO
        };
        Self {
            start: Instant::now(),
            last_tick: None,
            period,
        }
    }

    /// Seconds since the clock started, the time passed to each update.
    pub fn elapsed(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }

    /// Returns true and records the tick when a period has passed since the
    /// previous one.
    pub fn poll(&mut self) -> bool {
        let now = Instant::now();
        let due = self.last_tick.map_or(true, |last| now.duration_since(last) >= self.period);
        if due {
            self.last_tick = Some(now);
        }
        due
    }

    /// Time left until the next tick is due.
    pub fn remaining(&self) -> Duration {
        self.last_tick
            .map(|last| self.period.saturating_sub(last.elapsed()))
            .unwrap_or(Duration::ZERO)
    }
}
