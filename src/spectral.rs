//! Frequency-domain classification of tremor vs. dyskinesia.
//!
//! One completed window of accelerometer and gyroscope magnitudes is
//! normalized, combined, Hann-weighted and run through a real-input FFT.
//! Band peaks are compared against thresholds derived from an adaptive
//! noise floor; a band must also dominate its competitor before it wins,
//! so a single window can never report both conditions.

use core::f32::consts::PI;

#[allow(unused_imports)]
use defmt::{debug, trace, warn};
use libm::{ceilf, cosf, floorf, sqrtf};
use microfft::real::rfft_256;
use num_complex::Complex32;
use static_assertions as sa;

use crate::cfg::{
    ACCEL_WEIGHT, BAND_SEARCH_MIN_HZ, DOM_RATIO, DYSK_BAND_HZ, DYSK_THRESHOLD_FACTOR, FFT_SZ,
    GYRO_WEIGHT, INTENSITY_MAX, NOISE_BAND_HZ, NOISE_FLOOR_MIN, NORM_EPS, STILL_STD_G,
    TREMOR_BAND_HZ, TREMOR_THRESHOLD_FACTOR, WINDOW_SZ,
};

// The fixed-size transform below is tied to the configured FFT length.
sa::const_assert_eq!(FFT_SZ, 256);

/// Raw per-window classification, before any temporal confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum Condition {
    None,
    Tremor,
    Dyskinesia,
}

#[derive(Debug, Clone, Copy, PartialEq, defmt::Format)]
pub struct SpectralResult {
    pub condition: Condition,
    /// Severity above the decision boundary, normalized to the threshold
    /// and clamped to `0..=3`. Not a physical unit.
    pub intensity: f32,
    /// Strongest bin in the tremor band. [Hz]
    pub tremor_peak_hz: f32,
    /// Strongest bin in the dyskinesia band. [Hz]
    pub dysk_peak_hz: f32,
}

impl SpectralResult {
    const NONE: SpectralResult = SpectralResult {
        condition: Condition::None,
        intensity: 0.0,
        tremor_peak_hz: 0.0,
        dysk_peak_hz: 0.0,
    };
}

pub struct SpectralClassifier {
    hann: [f32; WINDOW_SZ],
}

impl SpectralClassifier {
    pub fn new() -> SpectralClassifier {
        let mut hann = [0.0; WINDOW_SZ];
        for (i, w) in hann.iter_mut().enumerate() {
            *w = 0.5 * (1.0 - cosf(2.0 * PI * i as f32 / (WINDOW_SZ - 1) as f32));
        }

        SpectralClassifier { hann }
    }

    /// Classify one completed window. Both buffers must hold a full
    /// window of samples.
    pub fn classify(
        &self,
        accel: &[f32; WINDOW_SZ],
        gyro: &[f32; WINDOW_SZ],
        sample_rate: f32,
    ) -> SpectralResult {
        let (accel_mean, accel_std) = mean_std(accel);

        // A stationary wearer gives us nothing to classify; skip the FFT.
        if accel_std < STILL_STD_G {
            return SpectralResult::NONE;
        }

        let (gyro_mean, gyro_std) = mean_std(gyro);

        // Z-score both channels and combine. The accelerometer dominates:
        // tremor and dyskinesia are primarily translational.
        let mut fft = [0.0f32; FFT_SZ];
        for i in 0..WINDOW_SZ {
            let az = (accel[i] - accel_mean) / (accel_std + NORM_EPS);
            let gz = (gyro[i] - gyro_mean) / (gyro_std + NORM_EPS);
            fft[i] = (ACCEL_WEIGHT * az + GYRO_WEIGHT * gz) * self.hann[i];
        }
        // The tail beyond the window stays zero-padded.

        let spectrum = rfft_256(&mut fft);
        let freq_res = sample_rate / FFT_SZ as f32;

        // Bin 0 packs DC in re and the Nyquist bin in im; both are far
        // outside every band of interest.
        let k0 = (ceilf(NOISE_BAND_HZ.0 / freq_res) as usize).max(1);
        let k1 = (floorf(NOISE_BAND_HZ.1 / freq_res) as usize).min(FFT_SZ / 2 - 1);

        let mut noise_sum = 0.0;
        let mut noise_cnt = 0u32;

        let mut tremor_peak = 0.0;
        let mut tremor_hz = 0.0;
        let mut dysk_peak = 0.0;
        let mut dysk_hz = 0.0;

        for (k, c) in spectrum.iter().enumerate().skip(1) {
            let f = k as f32 * freq_res;
            let mag = bin_mag(c);

            if k >= k0 && k <= k1 {
                noise_sum += mag;
                noise_cnt += 1;
            }

            // Below 2 Hz the spectrum is posture and gait, not symptoms.
            if f < BAND_SEARCH_MIN_HZ {
                continue;
            }

            if f >= TREMOR_BAND_HZ.0 && f <= TREMOR_BAND_HZ.1 {
                if mag > tremor_peak {
                    tremor_peak = mag;
                    tremor_hz = f;
                }
            } else if f >= DYSK_BAND_HZ.0 && f <= DYSK_BAND_HZ.1 && mag > dysk_peak {
                dysk_peak = mag;
                dysk_hz = f;
            }
        }

        let mut noise_floor = if noise_cnt > 0 {
            noise_sum / noise_cnt as f32
        } else {
            NOISE_FLOOR_MIN
        };
        if noise_floor < NOISE_FLOOR_MIN {
            noise_floor = NOISE_FLOOR_MIN;
        }

        let tremor_threshold = noise_floor * TREMOR_THRESHOLD_FACTOR;
        let dysk_threshold = noise_floor * DYSK_THRESHOLD_FACTOR;

        let tremor_detected =
            tremor_peak > tremor_threshold && tremor_peak > dysk_peak * DOM_RATIO;
        let dysk_detected = dysk_peak > dysk_threshold && dysk_peak > tremor_peak * DOM_RATIO;

        let (condition, intensity) = if tremor_detected {
            (
                Condition::Tremor,
                (tremor_peak - tremor_threshold) / tremor_threshold,
            )
        } else if dysk_detected {
            (
                Condition::Dyskinesia,
                (dysk_peak - dysk_threshold) / dysk_threshold,
            )
        } else {
            (Condition::None, 0.0)
        };

        let intensity = intensity.clamp(0.0, INTENSITY_MAX);

        if condition != Condition::None {
            debug!(
                "spectral: {:?} at {} Hz, intensity {}",
                condition,
                if condition == Condition::Tremor {
                    tremor_hz
                } else {
                    dysk_hz
                },
                intensity
            );
        }

        SpectralResult {
            condition,
            intensity,
            tremor_peak_hz: tremor_hz,
            dysk_peak_hz: dysk_hz,
        }
    }
}

fn bin_mag(c: &Complex32) -> f32 {
    sqrtf(c.re * c.re + c.im * c.im)
}

/// Mean and standard deviation (population) of one window.
fn mean_std(data: &[f32; WINDOW_SZ]) -> (f32, f32) {
    let mut sum = 0.0;
    for v in data {
        sum += v;
    }
    let mean = sum / WINDOW_SZ as f32;

    let mut var = 0.0;
    for v in data {
        let d = v - mean;
        var += d * d;
    }

    (mean, sqrtf(var / WINDOW_SZ as f32))
}
