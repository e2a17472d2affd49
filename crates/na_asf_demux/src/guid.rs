//! ASF GUIDs.

use std::io::Read;

use crate::error::Result;

/// A GUID in its on-wire byte order (first three fields little-endian).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    /// Build a GUID from its canonical `d1-d2-d3-d4` fields.
    pub const fn from_fields(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> Self {
        let a = d1.to_le_bytes();
        let b = d2.to_le_bytes();
        let c = d3.to_le_bytes();
        Guid([
            a[0], a[1], a[2], a[3], b[0], b[1], c[0], c[1], d4[0], d4[1], d4[2], d4[3], d4[4], d4[5],
            d4[6], d4[7],
        ])
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let mut buf = [0u8; 16];
        r.read_exact(&mut buf)?;
        Ok(Guid(buf))
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9], b[10], b[11], b[12],
            b[13], b[14], b[15]
        )
    }
}

// ─── Header objects ──────────────────────────────────────────────────────────

pub const GUID_ASF_HEADER: Guid =
    Guid::from_fields(0x75B2_2630, 0x668E, 0x11CF, [0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C]);
pub const GUID_ASF_DATA: Guid =
    Guid::from_fields(0x75B2_2636, 0x668E, 0x11CF, [0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C]);
pub const GUID_FILE_PROPERTIES: Guid =
    Guid::from_fields(0x8CAB_DCA1, 0xA947, 0x11CF, [0x8E, 0xE4, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65]);
pub const GUID_STREAM_PROPERTIES: Guid =
    Guid::from_fields(0xB7DC_0791, 0xA9B7, 0x11CF, [0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65]);
pub const GUID_HEADER_EXTENSION: Guid =
    Guid::from_fields(0x5FBF_03B5, 0xA92E, 0x11CF, [0x8E, 0xE3, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65]);
pub const GUID_EXTENDED_STREAM_PROPERTIES: Guid =
    Guid::from_fields(0x14E6_A5CB, 0xC672, 0x4332, [0x83, 0x99, 0xA9, 0x69, 0x52, 0x06, 0x5B, 0x5A]);

pub const GUID_STREAM_TYPE_VIDEO: Guid =
    Guid::from_fields(0xBC19_EFC0, 0x5B4D, 0x11CF, [0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B]);
pub const GUID_STREAM_TYPE_AUDIO: Guid =
    Guid::from_fields(0xF869_9E40, 0x5B4D, 0x11CF, [0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B]);

// ─── Payload extension systems ───────────────────────────────────────────────

/// 1-byte clean point flag.
pub const GUID_EXT_OUTPUT_CLEAN_POINT: Guid =
    Guid::from_fields(0xF72A_3C6F, 0x6EB4, 0x4EBC, [0xB1, 0x92, 0x09, 0xAD, 0x97, 0x59, 0xE8, 0x28]);
/// 4-byte DVR video frame descriptor.
pub const GUID_EXT_VIDEO_FRAME: Guid =
    Guid::from_fields(0xDD64_32CC, 0xE229, 0x40DB, [0x80, 0xF6, 0xD2, 0x63, 0x28, 0xD2, 0x76, 0x1F]);
/// 2-byte pixel aspect ratio (numerator, denominator).
pub const GUID_EXT_PIXEL_ASPECT_RATIO: Guid =
    Guid::from_fields(0x1B1E_E554, 0xF9EA, 0x4BC8, [0x82, 0x1A, 0x37, 0x6B, 0x74, 0xE4, 0xC4, 0xB8]);
