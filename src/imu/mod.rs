//! IMU boot and per-sample acquisition.
//!
//! Each data-ready event pulls one 6-byte burst per channel off the
//! sensor, converts the axes to physical units and appends the two vector
//! magnitudes to the in-flight window, feeding the step detector along
//! the way. Bus trouble costs exactly one sample and nothing else.

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use libm::sqrtf;

pub mod bus;
pub mod steps;
pub mod window;

use crate::cfg::{ACCEL_SCALE_G, GYRO_SCALE_DPS};
use bus::SensorBus;
use steps::StepTracker;
use window::SampleWindow;

#[derive(Debug, Clone, PartialEq, defmt::Format)]
pub enum Error<E> {
    Bus(E),
    /// `WHO_AM_I` did not answer with the expected identity.
    BadDevice(u8),
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Error<E> {
        Error::Bus(e)
    }
}

pub struct Imu<B> {
    pub bus: B,
    pub window: SampleWindow,
    pub steps: StepTracker,

    /// Samples acquired since boot.
    pub sample_count: u32,

    /// Samples abandoned because of bus failures.
    pub dropped_samples: u32,
}

impl<B: SensorBus> Imu<B> {
    pub fn new(bus: B) -> Imu<B> {
        Imu {
            bus,
            window: SampleWindow::new(),
            steps: StepTracker::new(),
            sample_count: 0,
            dropped_samples: 0,
        }
    }

    /// Boot the sensor. The order is significant: identity first, common
    /// settings before channel rates, interrupt routing last. Any failing
    /// write is fatal here and surfaced to the caller; whether to retry
    /// is the caller's decision.
    pub fn init(&mut self) -> Result<(), Error<B::Error>> {
        debug!("imu: checking WHO_AM_I..");
        let id = self.bus.read_register(bus::WHO_AM_I)?;
        if id != bus::DEVICE_ID {
            error!("imu: unexpected device identity: {=u8:#x}", id);
            return Err(Error::BadDevice(id));
        }

        // Block-data-update and register auto-increment.
        self.bus.write_register(bus::CTRL3_C, 0x44)?;

        // Accelerometer: 52 Hz, +-2 g.
        self.bus.write_register(bus::CTRL1_XL, 0x30)?;

        // Gyroscope: 52 Hz, +-250 dps.
        self.bus.write_register(bus::CTRL2_G, 0x30)?;

        // Route accel + gyro data-ready to INT1.
        self.bus.write_register(bus::INT1_CTRL, 0x03)?;

        // Discard any stale status so the first interrupt corresponds to
        // a fresh sample.
        self.bus.read_register(bus::STATUS_REG).ok();

        info!("imu: lsm6dsl ready: 52 Hz, +-2 g, +-250 dps");

        Ok(())
    }

    /// True when both channels flag new data. Used by the polling
    /// fallback when the interrupt line has gone quiet.
    pub fn data_ready(&mut self) -> Result<bool, Error<B::Error>> {
        let status = self.bus.read_register(bus::STATUS_REG)?;
        Ok(status & bus::XLDA != 0 && status & bus::GDA != 0)
    }

    /// Acquire one sample pair. Returns true when this sample completed
    /// the window. A failing burst abandons the sample before any state
    /// is touched.
    pub fn read_sample(&mut self, now_ms: u32) -> Result<bool, Error<B::Error>> {
        let mut accel = [0u8; 6];
        let mut gyro = [0u8; 6];

        if let Err(e) = self
            .bus
            .read_burst(bus::OUTX_L_XL, &mut accel)
            .and_then(|_| self.bus.read_burst(bus::OUTX_L_G, &mut gyro))
        {
            self.dropped_samples = self.dropped_samples.wrapping_add(1);
            return Err(Error::Bus(e));
        }

        let [ax, ay, az] = decode_axes(&accel, ACCEL_SCALE_G);
        let [gx, gy, gz] = decode_axes(&gyro, GYRO_SCALE_DPS);

        let accel_mag = sqrtf(ax * ax + ay * ay + az * az);
        let gyro_mag = sqrtf(gx * gx + gy * gy + gz * gz);

        trace!("imu: |a| = {} g, |g| = {} dps", accel_mag, gyro_mag);

        self.sample_count = self.sample_count.wrapping_add(1);
        let ready = self.window.push(accel_mag, gyro_mag);

        // Step detection uses the raw vertical axis, not the magnitude:
        // tremor in the horizontal plane must not register as steps.
        self.steps.update(az, now_ms);

        Ok(ready)
    }
}

/// Decode three little-endian i16 axes and scale to physical units.
fn decode_axes(raw: &[u8; 6], scale: f32) -> [f32; 3] {
    let x = i16::from_le_bytes([raw[0], raw[1]]) as f32 * scale;
    let y = i16::from_le_bytes([raw[2], raw[3]]) as f32 * scale;
    let z = i16::from_le_bytes([raw[4], raw[5]]) as f32 * scale;
    [x, y, z]
}
