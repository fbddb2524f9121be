//! Build-time tuning parameters for the whole pipeline.
//!
//! Everything here is a named knob: the values are fixed at compile time,
//! but every threshold, band and duration the detection logic depends on
//! lives in this module rather than inline at the point of use.

use static_assertions as sa;

/// Output data rate of both IMU channels. [Hz]
pub const SAMPLE_RATE_HZ: f32 = 52.0;

/// Samples per analysis window (~3 s at 52 Hz).
pub const WINDOW_SZ: usize = 156;

/// Real-FFT length. Windows are zero-padded up to this.
pub const FFT_SZ: usize = 256;

/// Duration of one window. [s]
pub const WINDOW_SECS: f32 = WINDOW_SZ as f32 / SAMPLE_RATE_HZ;

sa::const_assert!(WINDOW_SZ <= FFT_SZ);
sa::const_assert!(FFT_SZ.is_power_of_two());

/// Accelerometer sensitivity at +-2 g. [g/LSB]
pub const ACCEL_SCALE_G: f32 = 6.1e-5;

/// Gyroscope sensitivity at +-250 dps. [dps/LSB]
pub const GYRO_SCALE_DPS: f32 = 8.75e-3;

// Spectral classification.

/// Windows with less accelerometer-magnitude deviation than this are
/// treated as stationary and skip the FFT entirely. [g]
pub const STILL_STD_G: f32 = 0.005;

/// Floor on the per-channel standard deviation used for normalization.
pub const NORM_EPS: f32 = 1e-6;

/// Weight of the accelerometer channel in the combined signal.
pub const ACCEL_WEIGHT: f32 = 0.7;

/// Weight of the gyroscope channel in the combined signal.
pub const GYRO_WEIGHT: f32 = 0.3;

/// Reference band for the adaptive noise floor. [Hz]
pub const NOISE_BAND_HZ: (f32, f32) = (0.5, 2.0);

/// Lower clamp on the noise floor, so quiet windows cannot collapse the
/// detection thresholds.
pub const NOISE_FLOOR_MIN: f32 = 0.25;

/// Bins below this frequency are excluded from all peak searches. [Hz]
pub const BAND_SEARCH_MIN_HZ: f32 = 2.0;

/// Parkinsonian rest tremor band. [Hz]
pub const TREMOR_BAND_HZ: (f32, f32) = (3.0, 5.0);

/// Dyskinesia band. [Hz]
pub const DYSK_BAND_HZ: (f32, f32) = (5.0, 7.0);

/// Tremor detection threshold, as a multiple of the noise floor.
pub const TREMOR_THRESHOLD_FACTOR: f32 = 3.0;

/// Dyskinesia detection threshold, as a multiple of the noise floor.
/// Higher than the tremor factor: dyskinesia energy spreads across the
/// band instead of concentrating in one bin.
pub const DYSK_THRESHOLD_FACTOR: f32 = 4.0;

/// A band peak must exceed the competing band's peak by this ratio before
/// it can be declared the winner.
pub const DOM_RATIO: f32 = 1.1;

/// Upper clamp on the raw intensity score.
pub const INTENSITY_MAX: f32 = 3.0;

// Confirmation.

/// Consecutive windows of the same raw detection before it is reported.
pub const DETECT_CONFIRM_WINDOWS: u8 = 3;

/// Consecutive quiet windows before a confirmed detection clears.
pub const CLEAR_CONFIRM_WINDOWS: u8 = 3;

/// Smoothing factor for the reported intensities.
pub const EMA_ALPHA: f32 = 0.3;

/// Scale from the raw intensity score to the published 0..=1000 range.
pub const INTENSITY_SCALE: f32 = 500.0;

/// Upper bound of the published intensity range.
pub const INTENSITY_FULL: u16 = 1000;

// Step detection.

/// Vertical-axis deviation that counts as a step candidate. [g]
pub const STEP_THRESHOLD_G: f32 = 0.03;

/// Re-arm level of the step latch, as a fraction of the threshold.
pub const STEP_RELEASE_FRACTION: f32 = 0.5;

/// Minimum spacing between two counted steps. [ms]
pub const MIN_STEP_INTERVAL_MS: u32 = 100;

/// Adaptation rate of the vertical-acceleration DC estimate.
pub const BASELINE_EMA_ALPHA: f32 = 0.001;

// Gait / freeze-of-gait.

/// Minimum steps per window for the walking predicate.
pub const MIN_STEPS_FOR_WALKING: u16 = 2;

/// Plausible walking cadence. [steps/min]
pub const WALKING_CADENCE_SPM: (f32, f32) = (10.0, 250.0);

/// Movement-variance band for walking; excludes both stillness and
/// tremor-dominated noise.
pub const WALKING_VARIANCE: (f32, f32) = (0.002, 0.5);

/// Cadence below this counts toward freeze indicators. [steps/min]
pub const FREEZE_CADENCE_MAX_SPM: f32 = 12.0;

/// Movement variance below this counts toward freeze indicators.
pub const FREEZE_VARIANCE_MAX: f32 = 0.020;

/// Walking must have lasted this long before a freeze is credible. [ms]
pub const MIN_WALKING_MS: u32 = 1000;

/// Freeze indicators must persist this long before the alarm fires. [ms]
pub const FREEZE_CONFIRM_MS: u32 = 1250;

/// A confirmed freeze older than this is treated as an ended episode and
/// the machine resets. [ms]
pub const FREEZE_TIMEOUT_MS: u32 = 15_000;

/// Freeze indicators are void once the last counted step is older than
/// this. [ms]
pub const MAX_STEP_AGE_MS: u32 = 15_000;

// Main loop.

/// With no data-ready interrupt for this long, fall back to polling the
/// status register. [ms]
pub const POLL_FALLBACK_MS: u32 = 100;

/// Minimum spacing between fallback status polls (just under the 52 Hz
/// sample period). [ms]
pub const POLL_INTERVAL_MS: u32 = 19;
