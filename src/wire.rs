//! Published outputs and their framing for the notification channel.
//!
//! The pipeline publishes exactly three values per window. Transports
//! (radio link, indicator) sit behind the [`Sink`] trait and are not part
//! of this crate.

use postcard::experimental::max_size::MaxSize;
use serde::{Deserialize, Serialize};

/// One window's confirmed outputs, published as a unit: a consumer never
/// observes values from two different windows mixed.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, MaxSize, defmt::Format,
)]
pub struct Report {
    /// Confirmed tremor intensity, `0..=1000`.
    pub tremor: u16,
    /// Confirmed dyskinesia intensity, `0..=1000`.
    pub dysk: u16,
    /// Freezing-of-gait alarm.
    pub fog: bool,
}

impl Report {
    /// Fixed layout for consumers that expose the three values as
    /// individual characteristics: tremor LE, dysk LE, fog byte.
    pub fn to_le_bytes(&self) -> [u8; 5] {
        let mut b = [0u8; 5];
        b[0..2].copy_from_slice(&self.tremor.to_le_bytes());
        b[2..4].copy_from_slice(&self.dysk.to_le_bytes());
        b[4] = self.fog as u8;
        b
    }
}

/// Consumer of the published outputs.
pub trait Sink {
    fn publish(&mut self, report: &Report);
}

/// A report with enough framing to go out over an unreliable channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, MaxSize, defmt::Format)]
pub struct ReportFrame {
    /// Window counter at publication.
    pub seq: u32,
    /// Milliseconds since boot at publication.
    pub uptime_ms: u32,
    pub report: Report,
}

/// Worst-case encoded frame length.
pub const FRAME_SZ: usize = ReportFrame::POSTCARD_MAX_SIZE;

impl ReportFrame {
    pub fn encode(&self) -> Result<heapless::Vec<u8, FRAME_SZ>, postcard::Error> {
        postcard::to_vec(self)
    }

    pub fn decode(buf: &[u8]) -> Result<ReportFrame, postcard::Error> {
        postcard::from_bytes(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn characteristic_layout() {
        let r = Report {
            tremor: 0x0302,
            dysk: 0,
            fog: true,
        };

        assert_eq!(r.to_le_bytes(), [0x02, 0x03, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn frame_roundtrip() {
        let frame = ReportFrame {
            seq: 42,
            uptime_ms: 126_000,
            report: Report {
                tremor: 657,
                dysk: 0,
                fog: false,
            },
        };

        let encoded = frame.encode().unwrap();
        assert!(encoded.len() <= FRAME_SZ);

        let decoded = ReportFrame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }
}
