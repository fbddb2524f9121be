//! Per-sample step detection on the raw vertical acceleration axis.

use libm::fabsf;

use crate::cfg::{
    BASELINE_EMA_ALPHA, MIN_STEP_INTERVAL_MS, STEP_RELEASE_FRACTION, STEP_THRESHOLD_G,
};

/// Counts heel strikes as excursions of the vertical acceleration away
/// from a slowly adapting DC estimate.
///
/// The latch only re-arms once the deviation has fallen below half the
/// trigger threshold, so chatter right at the crossing cannot count a
/// step twice. Steps closer together than [`MIN_STEP_INTERVAL_MS`] are
/// collapsed into one.
pub struct StepTracker {
    steps_in_window: u16,
    above_threshold: bool,
    last_step_ms: u32,
    baseline: f32,
}

impl StepTracker {
    pub fn new() -> StepTracker {
        StepTracker {
            steps_in_window: 0,
            above_threshold: false,
            last_step_ms: 0,
            // Resting vertical acceleration is gravity.
            baseline: 1.0,
        }
    }

    pub fn update(&mut self, accel_z: f32, now_ms: u32) {
        self.baseline =
            BASELINE_EMA_ALPHA * accel_z + (1.0 - BASELINE_EMA_ALPHA) * self.baseline;

        let deviation = fabsf(accel_z - self.baseline);

        if deviation > STEP_THRESHOLD_G && !self.above_threshold {
            if now_ms.wrapping_sub(self.last_step_ms) > MIN_STEP_INTERVAL_MS {
                self.steps_in_window += 1;
                self.last_step_ms = now_ms;
            }
            self.above_threshold = true;
        } else if deviation < STEP_THRESHOLD_G * STEP_RELEASE_FRACTION {
            self.above_threshold = false;
        }
    }

    /// Steps counted since the previous take. Consumed once per window.
    pub fn take(&mut self) -> u16 {
        core::mem::take(&mut self.steps_in_window)
    }

    pub fn steps(&self) -> u16 {
        self.steps_in_window
    }

    /// Timestamp of the last counted step, 0 before the first one.
    pub fn last_step_ms(&self) -> u32 {
        self.last_step_ms
    }
}
