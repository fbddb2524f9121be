//! Gait tracking and freezing-of-gait detection.
//!
//! A four-state machine fed once per window with the step count, the
//! timestamp of the last counted step, and the movement variance of the
//! same window the classifier saw. The alarm is raised only while a
//! freeze is confirmed.

#[allow(unused_imports)]
use defmt::{debug, trace, warn};

use crate::cfg::{
    FREEZE_CADENCE_MAX_SPM, FREEZE_CONFIRM_MS, FREEZE_TIMEOUT_MS, FREEZE_VARIANCE_MAX,
    MAX_STEP_AGE_MS, MIN_STEPS_FOR_WALKING, MIN_WALKING_MS, WALKING_CADENCE_SPM,
    WALKING_VARIANCE, WINDOW_SECS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum FogState {
    NotWalking,
    Walking,
    PotentialFreeze,
    FreezeConfirmed,
}

/// Per-window gait evidence.
#[derive(Debug, Clone, Copy, defmt::Format)]
pub struct GaitInput {
    /// Steps counted in this window.
    pub steps: u16,
    /// Timestamp of the last counted step; 0 before the first step.
    pub last_step_ms: u32,
    /// Variance of the accelerometer magnitudes over this window.
    pub variance: f32,
}

pub struct FogDetector {
    pub state: FogState,

    /// When the current walking bout was established. 0 = unset.
    pub walking_start_ms: u32,
    /// When freeze indicators first appeared. 0 = unset.
    pub freeze_start_ms: u32,
    /// When the freeze was confirmed. 0 = unset.
    pub freeze_confirmed_ms: u32,

    pub previous_cadence: f32,
    pub consecutive_walking_windows: u8,
    pub consecutive_freeze_windows: u8,
}

impl FogDetector {
    pub fn new() -> FogDetector {
        FogDetector {
            state: FogState::NotWalking,
            walking_start_ms: 0,
            freeze_start_ms: 0,
            freeze_confirmed_ms: 0,
            previous_cadence: 0.0,
            consecutive_walking_windows: 0,
            consecutive_freeze_windows: 0,
        }
    }

    pub fn alarm(&self) -> bool {
        self.state == FogState::FreezeConfirmed
    }

    /// Advance the machine by one window. Returns the FOG alarm.
    pub fn update(&mut self, input: GaitInput, now_ms: u32) -> bool {
        let cadence = input.steps as f32 * 60.0 / WINDOW_SECS;

        let walking = input.steps >= MIN_STEPS_FOR_WALKING
            && cadence >= WALKING_CADENCE_SPM.0
            && cadence <= WALKING_CADENCE_SPM.1
            && input.variance >= WALKING_VARIANCE.0
            && input.variance <= WALKING_VARIANCE.1;

        // Freeze only means something once walking has been established;
        // standing still from power-on is not freezing of gait.
        let mut freeze = cadence < FREEZE_CADENCE_MAX_SPM
            && input.variance < FREEZE_VARIANCE_MAX
            && self.walking_start_ms != 0;

        let step_age = if input.last_step_ms > 0 {
            now_ms.wrapping_sub(input.last_step_ms)
        } else {
            u32::MAX
        };
        if step_age > MAX_STEP_AGE_MS {
            freeze = false;
        }

        trace!(
            "gait: steps {} cadence {} variance {} walking {} freeze {}",
            input.steps,
            cadence,
            input.variance,
            walking,
            freeze
        );

        // A freeze state without a recorded walking bout is unreachable
        // through the transitions below; recover instead of carrying the
        // inconsistency forward.
        if matches!(self.state, FogState::PotentialFreeze | FogState::FreezeConfirmed)
            && self.walking_start_ms == 0
        {
            warn!("gait: freeze state without a walking bout, resetting");
            self.state = FogState::NotWalking;
            self.consecutive_walking_windows = 0;
            self.consecutive_freeze_windows = 0;
        }

        match self.state {
            FogState::NotWalking => {
                if walking {
                    self.consecutive_walking_windows =
                        self.consecutive_walking_windows.saturating_add(1);
                    self.state = FogState::Walking;
                    self.walking_start_ms = now_ms;
                    self.consecutive_freeze_windows = 0;
                } else {
                    self.consecutive_walking_windows = 0;
                }
            }

            FogState::Walking => {
                let walking_for = now_ms.wrapping_sub(self.walking_start_ms);

                if walking {
                    self.consecutive_walking_windows =
                        self.consecutive_walking_windows.saturating_add(1);
                    self.consecutive_freeze_windows = 0;
                } else if freeze && walking_for >= MIN_WALKING_MS {
                    self.state = FogState::PotentialFreeze;
                    self.freeze_start_ms = now_ms;
                    self.consecutive_freeze_windows = 1;
                    self.consecutive_walking_windows = 0;
                } else if freeze {
                    // Walking was too brief for a freeze to be credible.
                    self.state = FogState::NotWalking;
                    self.consecutive_walking_windows = 0;
                } else {
                    self.state = FogState::NotWalking;
                    self.consecutive_walking_windows = 0;
                    self.consecutive_freeze_windows = 0;
                    self.walking_start_ms = 0;
                }
            }

            FogState::PotentialFreeze => {
                let frozen_for = now_ms.wrapping_sub(self.freeze_start_ms);

                if walking {
                    // False alarm, no penalty.
                    self.state = FogState::Walking;
                    self.consecutive_freeze_windows = 0;
                } else if freeze {
                    self.consecutive_freeze_windows =
                        self.consecutive_freeze_windows.saturating_add(1);

                    if frozen_for >= FREEZE_CONFIRM_MS {
                        debug!("gait: freeze confirmed after {} ms", frozen_for);
                        self.state = FogState::FreezeConfirmed;
                        self.freeze_confirmed_ms = now_ms;
                    }
                } else {
                    // Indicators vanished without walking resuming.
                    self.state = FogState::NotWalking;
                    self.consecutive_walking_windows = 0;
                    self.consecutive_freeze_windows = 0;
                    self.walking_start_ms = 0;
                }
            }

            FogState::FreezeConfirmed => {
                let recovery = input.steps > 0 || input.variance > FREEZE_VARIANCE_MAX;

                if recovery {
                    debug!("gait: recovered from freeze");
                    self.state = FogState::Walking;
                    self.walking_start_ms = now_ms;
                    self.consecutive_walking_windows = 1;
                    self.consecutive_freeze_windows = 0;
                    self.freeze_confirmed_ms = 0;
                } else if now_ms.wrapping_sub(self.freeze_confirmed_ms) >= FREEZE_TIMEOUT_MS {
                    // A freeze this long is an ended episode needing help,
                    // not a live alarm.
                    warn!("gait: confirmed freeze timed out, resetting");
                    self.state = FogState::NotWalking;
                    self.consecutive_walking_windows = 0;
                    self.consecutive_freeze_windows = 0;
                    self.walking_start_ms = 0;
                    self.freeze_start_ms = 0;
                    self.freeze_confirmed_ms = 0;
                }
            }
        }

        self.previous_cadence = cadence;

        self.alarm()
    }
}
