//! Multi-window confirmation and smoothing of raw classifications.

use libm::roundf;

use crate::cfg::{
    CLEAR_CONFIRM_WINDOWS, DETECT_CONFIRM_WINDOWS, EMA_ALPHA, INTENSITY_FULL, INTENSITY_SCALE,
};
use crate::spectral::Condition;

/// Hysteresis between raw per-window classifications and the published
/// intensities.
///
/// A detection must repeat for [`DETECT_CONFIRM_WINDOWS`] consecutive
/// windows before it is reported, and a confirmed detection must be
/// absent for [`CLEAR_CONFIRM_WINDOWS`] consecutive windows before it
/// clears. Any mixed stretch in between leaves the previously confirmed
/// values standing. At most one of the two intensities is ever non-zero.
pub struct ConfirmationFilter {
    tremor_consecutive: u8,
    dysk_consecutive: u8,
    none_consecutive: u8,

    tremor_ema: f32,
    dysk_ema: f32,

    tremor_intensity: u16,
    dysk_intensity: u16,
}

impl ConfirmationFilter {
    pub fn new() -> ConfirmationFilter {
        ConfirmationFilter {
            tremor_consecutive: 0,
            dysk_consecutive: 0,
            none_consecutive: 0,
            tremor_ema: 0.0,
            dysk_ema: 0.0,
            tremor_intensity: 0,
            dysk_intensity: 0,
        }
    }

    /// Fold one raw classification into the confirmed state and return
    /// the `(tremor, dysk)` intensity pair to publish.
    pub fn confirm(&mut self, raw: Condition, raw_intensity: f32) -> (u16, u16) {
        match raw {
            Condition::Tremor => {
                self.tremor_consecutive = self.tremor_consecutive.saturating_add(1);
                self.dysk_consecutive = 0;
                self.none_consecutive = 0;
                self.tremor_ema =
                    EMA_ALPHA * raw_intensity + (1.0 - EMA_ALPHA) * self.tremor_ema;
            }
            Condition::Dyskinesia => {
                self.dysk_consecutive = self.dysk_consecutive.saturating_add(1);
                self.tremor_consecutive = 0;
                self.none_consecutive = 0;
                self.dysk_ema = EMA_ALPHA * raw_intensity + (1.0 - EMA_ALPHA) * self.dysk_ema;
            }
            Condition::None => {
                self.none_consecutive = self.none_consecutive.saturating_add(1);
                self.tremor_consecutive = 0;
                self.dysk_consecutive = 0;
            }
        }

        if self.tremor_consecutive >= DETECT_CONFIRM_WINDOWS {
            self.tremor_intensity = scale(self.tremor_ema);
            self.dysk_intensity = 0;
        } else if self.dysk_consecutive >= DETECT_CONFIRM_WINDOWS {
            self.dysk_intensity = scale(self.dysk_ema);
            self.tremor_intensity = 0;
        } else if self.none_consecutive >= CLEAR_CONFIRM_WINDOWS {
            self.tremor_intensity = 0;
            self.dysk_intensity = 0;
            self.tremor_ema = 0.0;
            self.dysk_ema = 0.0;
        }
        // Otherwise: hold whatever was last confirmed.

        (self.tremor_intensity, self.dysk_intensity)
    }

    pub fn intensities(&self) -> (u16, u16) {
        (self.tremor_intensity, self.dysk_intensity)
    }
}

/// Map a smoothed intensity onto the published `0..=1000` range.
fn scale(ema: f32) -> u16 {
    let v = roundf(ema * INTENSITY_SCALE);
    if v >= INTENSITY_FULL as f32 {
        INTENSITY_FULL
    } else if v <= 0.0 {
        0
    } else {
        v as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_confirms_on_the_third_window() {
        let mut f = ConfirmationFilter::new();

        assert_eq!(f.confirm(Condition::Tremor, 2.0), (0, 0));
        assert_eq!(f.confirm(Condition::Tremor, 2.0), (0, 0));

        let (tremor, dysk) = f.confirm(Condition::Tremor, 2.0);
        assert!(tremor > 0);
        assert_eq!(dysk, 0);
    }

    #[test]
    fn dyskinesia_confirms_symmetrically() {
        let mut f = ConfirmationFilter::new();

        for _ in 0..DETECT_CONFIRM_WINDOWS - 1 {
            assert_eq!(f.confirm(Condition::Dyskinesia, 1.5), (0, 0));
        }

        let (tremor, dysk) = f.confirm(Condition::Dyskinesia, 1.5);
        assert_eq!(tremor, 0);
        assert!(dysk > 0);
    }

    #[test]
    fn clearing_needs_the_full_quiet_stretch() {
        let mut f = ConfirmationFilter::new();

        for _ in 0..DETECT_CONFIRM_WINDOWS {
            f.confirm(Condition::Tremor, 2.0);
        }
        let (confirmed, _) = f.intensities();
        assert!(confirmed > 0);

        // One window short of clearing: the detection stands.
        for _ in 0..CLEAR_CONFIRM_WINDOWS - 1 {
            let (tremor, dysk) = f.confirm(Condition::None, 0.0);
            assert_eq!(tremor, confirmed);
            assert_eq!(dysk, 0);
        }

        // The final quiet window clears everything.
        assert_eq!(f.confirm(Condition::None, 0.0), (0, 0));

        // Smoothing state went with it: a fresh detection starts over.
        f.confirm(Condition::Tremor, 2.0);
        f.confirm(Condition::Tremor, 2.0);
        let (tremor, _) = f.confirm(Condition::Tremor, 2.0);
        assert!(tremor > 0);
        assert!(tremor <= 1000);
    }

    #[test]
    fn interrupted_quiet_stretch_does_not_clear() {
        let mut f = ConfirmationFilter::new();

        for _ in 0..DETECT_CONFIRM_WINDOWS {
            f.confirm(Condition::Tremor, 2.0);
        }
        let (confirmed, _) = f.intensities();

        f.confirm(Condition::None, 0.0);
        f.confirm(Condition::None, 0.0);
        // The stretch restarts here.
        f.confirm(Condition::Tremor, 2.0);
        f.confirm(Condition::None, 0.0);
        let (tremor, _) = f.confirm(Condition::None, 0.0);

        assert_eq!(tremor, confirmed);
    }

    #[test]
    fn intensities_are_mutually_exclusive() {
        let mut f = ConfirmationFilter::new();

        let script = [
            Condition::Tremor,
            Condition::Tremor,
            Condition::Tremor,
            Condition::Dyskinesia,
            Condition::Tremor,
            Condition::Dyskinesia,
            Condition::Dyskinesia,
            Condition::Dyskinesia,
            Condition::None,
            Condition::Tremor,
            Condition::None,
            Condition::None,
            Condition::None,
        ];

        for raw in script {
            let (tremor, dysk) = f.confirm(raw, 1.0);
            assert!(
                tremor == 0 || dysk == 0,
                "both intensities set: {} / {}",
                tremor,
                dysk
            );
        }
    }

    #[test]
    fn switching_conditions_hands_over_cleanly() {
        let mut f = ConfirmationFilter::new();

        for _ in 0..DETECT_CONFIRM_WINDOWS {
            f.confirm(Condition::Tremor, 2.0);
        }
        assert!(f.intensities().0 > 0);

        // Two dyskinesia windows: tremor output still stands.
        f.confirm(Condition::Dyskinesia, 1.0);
        let (tremor, dysk) = f.confirm(Condition::Dyskinesia, 1.0);
        assert!(tremor > 0);
        assert_eq!(dysk, 0);

        // The third hands over.
        let (tremor, dysk) = f.confirm(Condition::Dyskinesia, 1.0);
        assert_eq!(tremor, 0);
        assert!(dysk > 0);
    }

    #[test]
    fn output_is_capped_at_full_scale() {
        let mut f = ConfirmationFilter::new();

        for _ in 0..20 {
            f.confirm(Condition::Tremor, 3.0);
        }

        let (tremor, _) = f.intensities();
        assert_eq!(tremor, 1000);
    }
}
