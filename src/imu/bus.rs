//! Register-level link to the LSM6DSL.
//!
//! The acquisition engine only needs the small capability set in
//! [`SensorBus`]; what the bus does on the wire is not its concern.
//! [`I2cBus`] is the production implementation over blocking I2C.

use embedded_hal::blocking::i2c::{Write, WriteRead};

/// 7-bit I2C address of the LSM6DSL.
pub const ADDR: u8 = 0x6a;

pub const WHO_AM_I: u8 = 0x0f;
pub const INT1_CTRL: u8 = 0x0d;
pub const CTRL1_XL: u8 = 0x10;
pub const CTRL2_G: u8 = 0x11;
pub const CTRL3_C: u8 = 0x12;
pub const STATUS_REG: u8 = 0x1e;
pub const OUTX_L_G: u8 = 0x22;
pub const OUTX_L_XL: u8 = 0x28;

/// Expected contents of `WHO_AM_I`.
pub const DEVICE_ID: u8 = 0x6a;

/// `STATUS_REG`: accelerometer has a new sample.
pub const XLDA: u8 = 0x01;

/// `STATUS_REG`: gyroscope has a new sample.
pub const GDA: u8 = 0x02;

/// What the acquisition engine requires from the sensor link.
pub trait SensorBus {
    type Error: core::fmt::Debug;

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error>;
    fn read_register(&mut self, reg: u8) -> Result<u8, Self::Error>;

    /// Read `buf.len()` bytes starting at `reg`. Relies on register
    /// auto-increment being enabled on the device.
    fn read_burst(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error>;
}

/// Sensor link over blocking I2C. Register reads use a repeated start
/// between the address write and the data read.
pub struct I2cBus<I2C> {
    i2c: I2C,
}

impl<I2C> I2cBus<I2C> {
    pub fn new(i2c: I2C) -> I2cBus<I2C> {
        I2cBus { i2c }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<E, I2C> SensorBus for I2cBus<I2C>
where
    E: core::fmt::Debug,
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    type Error = E;

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), E> {
        self.i2c.write(ADDR, &[reg, value])
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, E> {
        let mut value = [0u8; 1];
        self.i2c.write_read(ADDR, &[reg], &mut value)?;
        Ok(value[0])
    }

    fn read_burst(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), E> {
        self.i2c.write_read(ADDR, &[reg], buf)
    }
}
