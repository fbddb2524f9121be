//! The cooperative main-loop core.
//!
//! One interrupt source, one loop context. The data-ready handler does
//! the minimum possible work through [`DataReady`]; the loop drains every
//! pending sample in arrival order and runs the per-window sequence
//! (classify, confirm, gait) synchronously before accepting samples into
//! the next window. A quiet interrupt line degrades to polling the
//! sensor's status register instead of stalling acquisition.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};

use crate::cfg::{POLL_FALLBACK_MS, POLL_INTERVAL_MS, SAMPLE_RATE_HZ};
use crate::confirm::ConfirmationFilter;
use crate::gait::{FogDetector, GaitInput};
use crate::imu::{bus::SensorBus, Imu};
use crate::spectral::SpectralClassifier;
use crate::wire::Report;

/// ISR-to-main-loop handoff for the sensor data-ready line.
///
/// The handler side only flags and counts: no bus traffic, no floats, no
/// blocking. The consumer decrements under a critical section so a
/// handler firing between its load and store cannot lose a sample.
pub struct DataReady {
    flag: AtomicBool,
    pending: AtomicU32,
}

impl DataReady {
    pub const fn new() -> DataReady {
        DataReady {
            flag: AtomicBool::new(false),
            pending: AtomicU32::new(0),
        }
    }

    /// Call from the data-ready interrupt handler. Single producer: the
    /// plain load + store pair stays safe on cores without atomic
    /// read-modify-write, since the main loop never increments.
    pub fn notify(&self) {
        let n = self.pending.load(Ordering::Relaxed);
        self.pending.store(n.wrapping_add(1), Ordering::Relaxed);
        self.flag.store(true, Ordering::Release);
    }

    /// Samples waiting to be acquired.
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    /// True when the handler has fired since the last full drain.
    pub fn new_data(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Consume one pending sample, if any.
    fn take(&self) -> bool {
        critical_section::with(|_| {
            let n = self.pending.load(Ordering::Relaxed);
            if n > 0 {
                self.pending.store(n - 1, Ordering::Relaxed);
                true
            } else {
                self.flag.store(false, Ordering::Relaxed);
                false
            }
        })
    }
}

pub struct Pipeline<B> {
    pub imu: Imu<B>,
    classifier: SpectralClassifier,
    confirm: ConfirmationFilter,
    pub gait: FogDetector,

    report: Report,

    /// Windows analyzed since boot.
    pub window_count: u32,

    /// Acquisitions done through the status-register fallback.
    pub fallback_polls: u32,

    last_interrupt_ms: u32,
    last_poll_ms: u32,
}

impl<B: SensorBus> Pipeline<B> {
    pub fn new(bus: B) -> Pipeline<B> {
        Pipeline {
            imu: Imu::new(bus),
            classifier: SpectralClassifier::new(),
            confirm: ConfirmationFilter::new(),
            gait: FogDetector::new(),
            report: Report::default(),
            window_count: 0,
            fallback_polls: 0,
            last_interrupt_ms: 0,
            last_poll_ms: 0,
        }
    }

    /// Boot the sensor. Fatal on identity mismatch or failing
    /// configuration writes; retry policy belongs to the caller.
    pub fn init(&mut self) -> Result<(), crate::imu::Error<B::Error>> {
        self.imu.init()
    }

    /// Run one iteration of the cooperative loop. Returns the report of
    /// the most recent window completed during this call, if any.
    pub fn poll(&mut self, ready: &DataReady, now_ms: u32) -> Option<Report> {
        let mut published = None;

        if ready.new_data() {
            self.last_interrupt_ms = now_ms;

            // Drain every queued sample in arrival order. A completed
            // window is analyzed inside `acquire`, before the next
            // sample can overwrite its first slot.
            while ready.take() {
                if let Some(report) = self.acquire(now_ms) {
                    published = Some(report);
                }
            }
        } else if now_ms.wrapping_sub(self.last_interrupt_ms) > POLL_FALLBACK_MS
            && now_ms.wrapping_sub(self.last_poll_ms) >= POLL_INTERVAL_MS
        {
            // The interrupt line has gone quiet. Ask the status register
            // directly so a missed or misrouted interrupt cannot stall
            // acquisition indefinitely.
            self.last_poll_ms = now_ms;

            match self.imu.data_ready() {
                Ok(true) => {
                    self.fallback_polls += 1;
                    published = self.acquire(now_ms);
                }
                Ok(false) => {}
                Err(e) => {
                    trace!("status poll failed: {}", defmt::Debug2Format(&e));
                }
            }
        }

        published
    }

    /// Most recently published outputs.
    pub fn report(&self) -> Report {
        self.report
    }

    /// Acquire one sample; analyze the window if this sample completed
    /// it. A dropped sample is not an error here, just a missing one.
    fn acquire(&mut self, now_ms: u32) -> Option<Report> {
        match self.imu.read_sample(now_ms) {
            Ok(true) => Some(self.process_window(now_ms)),
            Ok(false) => None,
            Err(e) => {
                debug!("imu: sample dropped: {}", defmt::Debug2Format(&e));
                None
            }
        }
    }

    /// The fixed per-window sequence: statistics, spectral
    /// classification, confirmation, gait. The step count is consumed
    /// here, exactly once per window.
    fn process_window(&mut self, now_ms: u32) -> Report {
        self.window_count = self.window_count.wrapping_add(1);

        let (mean, variance) = self.imu.window.accel_stats();

        let raw = self.classifier.classify(
            self.imu.window.accel(),
            self.imu.window.gyro(),
            SAMPLE_RATE_HZ,
        );

        let (tremor, dysk) = self.confirm.confirm(raw.condition, raw.intensity);

        let steps = self.imu.steps.take();
        let fog = self.gait.update(
            GaitInput {
                steps,
                last_step_ms: self.imu.steps.last_step_ms(),
                variance,
            },
            now_ms,
        );

        self.imu.window.clear_ready();

        self.report = Report { tremor, dysk, fog };

        debug!(
            "window {}: mean {} var {} raw {:?} -> tremor {} dysk {} fog {}",
            self.window_count,
            mean,
            variance,
            raw.condition,
            tremor,
            dysk,
            fog
        );

        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{ACCEL_SCALE_G, GYRO_SCALE_DPS, WINDOW_SZ};
    use crate::imu::bus::mock::MockBus;
    use core::f32::consts::PI;

    #[test]
    fn backlog_drains_with_zero_sample_loss() {
        let ready = DataReady::new();
        let mut p = Pipeline::new(MockBus::new());
        p.init().unwrap();

        // A burst far larger than two whole windows, queued before the
        // loop gets a chance to run.
        let n = 2 * WINDOW_SZ as u32 + 88;
        for _ in 0..n {
            ready.notify();
        }
        assert_eq!(ready.pending(), n);

        let report = p.poll(&ready, 1000);

        assert_eq!(ready.pending(), 0);
        assert_eq!(p.imu.sample_count, n);
        assert_eq!(p.imu.dropped_samples, 0);
        assert_eq!(p.window_count, 2);
        assert_eq!(p.imu.window.index(), 88);

        // Resting device: both windows were quiet.
        assert_eq!(report, Some(Report::default()));
    }

    #[test]
    fn bus_trouble_costs_one_sample_only() {
        let ready = DataReady::new();
        let mut p = Pipeline::new(MockBus::new());

        ready.notify();
        p.imu.bus.fail_bursts = true;
        assert_eq!(p.poll(&ready, 100), None);

        assert_eq!(ready.pending(), 0);
        assert_eq!(p.imu.dropped_samples, 1);
        assert_eq!(p.imu.window.index(), 0);

        // The next sample goes through untouched.
        p.imu.bus.fail_bursts = false;
        ready.notify();
        p.poll(&ready, 120);
        assert_eq!(p.imu.sample_count, 1);
        assert_eq!(p.imu.window.index(), 1);
    }

    #[test]
    fn quiet_interrupt_line_falls_back_to_polling() {
        let ready = DataReady::new();
        let mut p = Pipeline::new(MockBus::new());

        // Within the fallback threshold: nothing happens.
        assert_eq!(p.poll(&ready, 50), None);
        assert_eq!(p.imu.sample_count, 0);

        // Past it: one manual acquisition per poll interval.
        p.poll(&ready, 150);
        assert_eq!(p.imu.sample_count, 1);
        assert_eq!(p.fallback_polls, 1);

        // Too soon for another poll.
        p.poll(&ready, 160);
        assert_eq!(p.imu.sample_count, 1);

        p.poll(&ready, 170);
        assert_eq!(p.imu.sample_count, 2);
    }

    #[test]
    fn fallback_respects_the_status_register() {
        let ready = DataReady::new();
        let mut p = Pipeline::new(MockBus::new());

        // Gyro has no fresh sample: no acquisition.
        p.imu.bus.status = crate::imu::bus::XLDA;
        p.poll(&ready, 150);
        assert_eq!(p.imu.sample_count, 0);
    }

    #[test]
    fn interrupts_suppress_the_polling_fallback() {
        let ready = DataReady::new();
        let mut p = Pipeline::new(MockBus::new());

        ready.notify();
        p.poll(&ready, 1000);
        assert_eq!(p.imu.sample_count, 1);

        // 80 ms later the line counts as live; no fallback poll yet.
        p.poll(&ready, 1080);
        assert_eq!(p.imu.sample_count, 1);
        assert_eq!(p.fallback_polls, 0);
    }

    #[test]
    fn sustained_tremor_reaches_the_report_after_confirmation() {
        let ready = DataReady::new();
        let mut bus = MockBus::new();

        // Four windows of a 4 Hz oscillation, as the sensor would see
        // it: z-axis acceleration around 1 g, x-axis rotation.
        let windows = 4;
        for i in 0..windows * WINDOW_SZ {
            let t = i as f32 / 52.0;
            let s = (2.0 * PI * 4.0 * t).sin();

            let az = ((1.0 + 0.05 * s) / ACCEL_SCALE_G) as i16;
            let gx = ((20.0 * s) / GYRO_SCALE_DPS) as i16;
            bus.push_sample([0, 0, az], [gx, 0, 0]);
        }

        let mut p = Pipeline::new(bus);
        p.init().unwrap();

        let mut reports = Vec::new();
        let mut now = 0u32;
        for _ in 0..windows * WINDOW_SZ {
            ready.notify();
            now += 19;
            if let Some(r) = p.poll(&ready, now) {
                reports.push(r);
            }
        }

        assert_eq!(reports.len(), windows);

        // The first two windows only accumulate evidence.
        assert_eq!(reports[0], Report::default());
        assert_eq!(reports[1], Report::default());

        // The third confirms; the fourth keeps reporting.
        assert!(reports[2].tremor > 0);
        assert_eq!(reports[2].dysk, 0);
        assert!(!reports[2].fog);
        assert!(reports[3].tremor > 0);

        assert_eq!(p.report(), reports[3]);
    }

    #[test]
    fn intensities_stay_mutually_exclusive_end_to_end() {
        let ready = DataReady::new();
        let mut bus = MockBus::new();

        // Three tremor windows followed by four dyskinesia windows.
        for i in 0..7 * WINDOW_SZ {
            let t = i as f32 / 52.0;
            let freq = if i < 3 * WINDOW_SZ { 4.0 } else { 6.0 };
            let s = (2.0 * PI * freq * t).sin();

            let az = ((1.0 + 0.05 * s) / ACCEL_SCALE_G) as i16;
            let gx = ((20.0 * s) / GYRO_SCALE_DPS) as i16;
            bus.push_sample([0, 0, az], [gx, 0, 0]);
        }

        let mut p = Pipeline::new(bus);
        p.init().unwrap();

        let mut now = 0u32;
        for _ in 0..7 * WINDOW_SZ {
            ready.notify();
            now += 19;
            if let Some(r) = p.poll(&ready, now) {
                assert!(r.tremor == 0 || r.dysk == 0);
            }
        }

        // The dyskinesia stretch has taken over by now.
        let r = p.report();
        assert!(r.dysk > 0);
        assert_eq!(r.tremor, 0);
    }
}
