//! Simulated "people ahead of you" queue.
//!
//! The constants are tuned by feel, not fitted to any real system.

use serde::Serialize;

use crate::random::{standard_normal, RandomSource};

/// Upper bound of the simulated crowd.
pub const TOTAL_POPULATION: f64 = 12_500.0;
/// Elapsed milliseconds at which half the crowd has arrived.
pub const ARRIVAL_HALF_POINT_MS: f64 = 250.0;
/// Requests processed per millisecond (1600 per 500 ms).
pub const PROCESSING_PER_MS: f64 = 1600.0 / 500.0;
pub const ARRIVAL_NOISE: i64 = 150;
pub const STEP_DROP_MEAN: f64 = 1600.0;
pub const STEP_DROP_STDDEV: f64 = 200.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueState {
    pub queue_count: u32,
    pub wait_seconds: u32,
}

impl QueueState {
    pub fn from_count(queue_count: u32) -> Self {
        Self {
            queue_count,
            wait_seconds: display_time(queue_count as i64),
        }
    }

    pub fn is_clear(&self) -> bool {
        self.queue_count == 0
    }
}

/// Seconds shown for a queue depth. Deeper queues drain faster per head.
pub fn display_time(count: i64) -> u32 {
    if count <= 0 {
        return 0;
    }
    let divisor = if count > 6000 {
        120
    } else if count > 4500 {
        140
    } else if count > 2500 {
        240
    } else {
        300
    };
    ((count + divisor - 1) / divisor) as u32
}

/// Cold estimate of the queue when submitting `elapsed_ms` after the target instant.
pub fn estimate_from_elapsed(elapsed_ms: f64, rng: &mut dyn RandomSource) -> QueueState {
    let t = elapsed_ms.max(0.0);
    let ratio = t / ARRIVAL_HALF_POINT_MS;
    let ratio4 = ratio.powi(4);
    let probability = if ratio4.is_finite() { ratio4 / (1.0 + ratio4) } else { 1.0 };

    let total_arrivals = (TOTAL_POPULATION * probability).floor() as i64;
    let processed = (t * PROCESSING_PER_MS).floor().min(i64::MAX as f64) as i64;
    let noise = rng.next_in_range(-ARRIVAL_NOISE, ARRIVAL_NOISE);

    let count = total_arrivals
        .saturating_sub(processed)
        .saturating_add(noise)
        .clamp(0, TOTAL_POPULATION as i64);
    QueueState::from_count(count as u32)
}

/// One processing step from a previous depth. Never grows the queue.
pub fn evolve(queue_count: u32, rng: &mut dyn RandomSource) -> QueueState {
    let z = standard_normal(rng);
    let drop = (STEP_DROP_MEAN + z * STEP_DROP_STDDEV).floor().max(0.0) as u32;
    QueueState::from_count(queue_count.saturating_sub(drop))
}
