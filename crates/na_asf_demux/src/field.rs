//! Variable-width integer fields selected by 2-bit width codes.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{DemuxError, Result};

/// On-wire width of an optional header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthCode {
    Absent,
    Byte,
    Word,
    DWord,
}

impl WidthCode {
    /// Decode the two low bits of `bits`.
    #[inline]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => WidthCode::Absent,
            1 => WidthCode::Byte,
            2 => WidthCode::Word,
            _ => WidthCode::DWord,
        }
    }

    #[inline]
    pub fn size(self) -> usize {
        match self {
            WidthCode::Absent => 0,
            WidthCode::Byte => 1,
            WidthCode::Word => 2,
            WidthCode::DWord => 4,
        }
    }
}

/// Read a field of width `code` at `*pos`, advancing `pos` past it.
///
/// An absent field leaves `pos` untouched and yields `default`. On a short
/// buffer `pos` is not moved.
#[inline]
pub fn read_var(buf: &[u8], pos: &mut usize, code: WidthCode, default: u32) -> Result<u32> {
    let needed = code.size();
    let available = buf.len().saturating_sub(*pos);
    if available < needed {
        return Err(DemuxError::TruncatedField { needed, available });
    }
    let p = &buf[*pos..*pos + needed];
    let v = match code {
        WidthCode::Absent => default,
        WidthCode::Byte => p[0] as u32,
        WidthCode::Word => LittleEndian::read_u16(p) as u32,
        WidthCode::DWord => LittleEndian::read_u32(p),
    };
    *pos += needed;
    Ok(v)
}

/// Read a fixed little-endian u32 at `*pos`.
#[inline]
pub fn read_u32(buf: &[u8], pos: &mut usize) -> Result<u32> {
    read_var(buf, pos, WidthCode::DWord, 0)
}

/// Read a fixed little-endian u16 at `*pos`.
#[inline]
pub fn read_u16(buf: &[u8], pos: &mut usize) -> Result<u16> {
    read_var(buf, pos, WidthCode::Word, 0).map(|v| v as u16)
}

/// Read one byte at `*pos`.
#[inline]
pub fn read_u8(buf: &[u8], pos: &mut usize) -> Result<u8> {
    read_var(buf, pos, WidthCode::Byte, 0).map(|v| v as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUF: [u8; 6] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

    #[test]
    fn widths_are_little_endian() {
        let mut pos = 0;
        assert_eq!(read_var(&BUF, &mut pos, WidthCode::Absent, 7).unwrap(), 7);
        assert_eq!(pos, 0);

        assert_eq!(read_var(&BUF, &mut pos, WidthCode::Byte, 0).unwrap(), 0x11);
        assert_eq!(pos, 1);

        assert_eq!(read_var(&BUF, &mut pos, WidthCode::Word, 0).unwrap(), 0x3322);
        assert_eq!(pos, 3);

        let mut pos = 1;
        assert_eq!(read_var(&BUF, &mut pos, WidthCode::DWord, 0).unwrap(), 0x5544_3322);
        assert_eq!(pos, 5);
    }

    #[test]
    fn short_buffer_does_not_advance() {
        for (code, start) in [(WidthCode::Byte, 6), (WidthCode::Word, 5), (WidthCode::DWord, 3)] {
            let mut pos = start;
            let err = read_var(&BUF, &mut pos, code, 0).unwrap_err();
            assert!(matches!(err, DemuxError::TruncatedField { .. }), "{err}");
            assert_eq!(pos, start);
        }
    }

    #[test]
    fn absent_needs_no_bytes() {
        let mut pos = 6;
        assert_eq!(read_var(&BUF, &mut pos, WidthCode::Absent, 0).unwrap(), 0);
    }

    #[test]
    fn from_bits_masks_high_bits() {
        assert_eq!(WidthCode::from_bits(0xFD), WidthCode::Byte);
        assert_eq!(WidthCode::from_bits(0x62 >> 5), WidthCode::DWord);
        assert_eq!(WidthCode::from_bits(0x80 >> 6), WidthCode::Word);
    }
}
