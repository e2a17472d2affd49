use crate::header::AsfHeader;
use crate::preroll::PrerollStart;

/// Highest stream number a payload may carry.
pub const MAX_STREAM_NUMBER: u8 = 127;

/// Session parameters for the data packet decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemuxConfig {
    pub min_packet_size: u32,
    pub max_packet_size: u32,
    pub preroll_ms: i64,
    pub preroll_start: PrerollStart,
    pub max_stream_id: u8,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            min_packet_size: 0,
            max_packet_size: 0,
            preroll_ms: 0,
            preroll_start: PrerollStart::FromCurrent,
            max_stream_id: MAX_STREAM_NUMBER,
        }
    }
}

impl DemuxConfig {
    /// Fixed-size framing with the given packet size.
    pub fn fixed(packet_size: u32) -> Self {
        Self {
            min_packet_size: packet_size,
            max_packet_size: packet_size,
            ..Self::default()
        }
    }

    pub fn with_preroll(mut self, preroll_ms: i64, start: PrerollStart) -> Self {
        self.preroll_ms = preroll_ms;
        self.preroll_start = start;
        self
    }

    pub fn from_header(header: &AsfHeader) -> Self {
        Self {
            min_packet_size: header.file.min_packet_size,
            max_packet_size: header.file.max_packet_size,
            preroll_ms: header.file.preroll_ms as i64,
            ..Self::default()
        }
    }
}
