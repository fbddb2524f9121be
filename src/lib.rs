//! Wearable Parkinsonian movement detection from a 6-axis IMU.
//!
//! Samples an LSM6DSL at 52 Hz, accumulates 3-second windows of
//! acceleration and rotation magnitudes, and classifies each window as
//! tremor (3-5 Hz), dyskinesia (5-7 Hz) or neither, with multi-window
//! confirmation before anything is reported. A separate four-state gait
//! machine watches cadence and movement variance for freezing-of-gait
//! episodes.
//!
//! The crate is the pipeline only: the bus behind [`imu::bus::SensorBus`]
//! and the consumers behind [`wire::Sink`] live with the application.

#![cfg_attr(not(test), no_std)]

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};

pub mod cfg;
pub mod confirm;
pub mod gait;
pub mod imu;
pub mod pipeline;
pub mod spectral;
pub mod wire;

pub use confirm::ConfirmationFilter;
pub use gait::{FogDetector, FogState, GaitInput};
pub use imu::Imu;
pub use pipeline::{DataReady, Pipeline};
pub use spectral::{Condition, SpectralClassifier, SpectralResult};
pub use wire::{Report, ReportFrame, Sink};
