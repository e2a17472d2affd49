//! Data packet header decoding and packet-level error recovery.

use bytes::Bytes;
use log::{debug, error, warn};

use crate::demuxer::{AsfDemuxer, PacketStatus};
use crate::error::{DemuxError, Result, Severity};
use crate::field::{read_u16, read_u32, read_u8, read_var, WidthCode};
use crate::host::DemuxHost;
use crate::source::ByteSource;

const EC_PRESENT: u8 = 0x80;
const EC_DATA_LENGTH: u8 = 0x02;

/// Width codes from the property byte, used by every payload header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyFlags {
    pub replication_length: WidthCode,
    pub object_offset: WidthCode,
    pub object_number: WidthCode,
}

impl PropertyFlags {
    pub fn from_byte(b: u8) -> Self {
        Self {
            replication_length: WidthCode::from_bits(b),
            object_offset: WidthCode::from_bits(b >> 2),
            object_number: WidthCode::from_bits(b >> 4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub has_error_correction: bool,
    pub multiple_payloads: bool,
    pub length_width: WidthCode,
    pub sequence_width: WidthCode,
    pub padding_width: WidthCode,
    pub property: PropertyFlags,
    pub length: u32,
    pub padding_length: u32,
    pub send_time_ms: u32,
    pub duration_ms: u16,
}

impl PacketHeader {
    /// Parse the fixed part of a packet header from `head` (at least
    /// `min_size` bytes). Returns the header and the number of bytes it took.
    pub fn parse(head: &[u8], min_size: u32) -> Result<(Self, usize)> {
        let mut i = 0usize;
        let first = read_u8(head, &mut i)?;

        let has_error_correction = first & EC_PRESENT != 0;
        if has_error_correction {
            let data_length = first & 0x0F;
            let opaque = (first >> 4) & 0x01;
            let length_type = (first >> 5) & 0x03;
            if length_type != 0 || opaque != 0 || data_length != EC_DATA_LENGTH {
                return Err(DemuxError::MalformedHeader(format!(
                    "error correction flags {first:#04x}"
                )));
            }
            i += data_length as usize;
        } else {
            warn!("no error correction");
            i = 0;
        }

        if i + 2 >= min_size as usize {
            return Err(DemuxError::MalformedHeader(format!(
                "header of {} bytes does not fit packet size {min_size}",
                i + 2
            )));
        }

        let flags = read_u8(head, &mut i)?;
        let property = PropertyFlags::from_byte(read_u8(head, &mut i)?);

        let length_width = WidthCode::from_bits(flags >> 5);
        let sequence_width = WidthCode::from_bits(flags >> 1);
        let padding_width = WidthCode::from_bits(flags >> 3);

        let mut length = read_var(head, &mut i, length_width, min_size)?;
        let _sequence = read_var(head, &mut i, sequence_width, 0)?;
        let mut padding_length = read_var(head, &mut i, padding_width, 0)?;

        if padding_length > length {
            warn!("Too large padding: {padding_length}");
            return Err(DemuxError::MalformedHeader(format!(
                "padding {padding_length} exceeds packet length {length}"
            )));
        }

        if length < min_size {
            // Short packets carry implicit padding up to the minimum size.
            padding_length += min_size - length;
            length = min_size;
        }

        let send_time_ms = read_u32(head, &mut i)?;
        let duration_ms = read_u16(head, &mut i)?;

        Ok((
            Self {
                has_error_correction,
                multiple_payloads: flags & 0x01 != 0,
                length_width,
                sequence_width,
                padding_width,
                property,
                length,
                padding_length,
                send_time_ms,
                duration_ms,
            },
            i,
        ))
    }
}

/// Read position inside the packet being decoded.
///
/// `view` is a read-ahead of the `left` bytes still unread from the source;
/// `skip` counts the bytes of `view` already parsed but not yet consumed.
pub(crate) struct PacketCursor {
    pub header: PacketHeader,
    pub payload_length_width: WidthCode,
    pub view: Bytes,
    pub skip: usize,
    pub left: usize,
    pub consumed: usize,
}

impl PacketCursor {
    fn new(header: PacketHeader, view: Bytes, skip: usize) -> Self {
        Self {
            header,
            payload_length_width: WidthCode::Word,
            left: header.length as usize,
            view,
            skip,
            consumed: 0,
        }
    }

    /// Parsed-but-unconsumed bytes still available in the view.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.left.saturating_sub(self.skip)
    }

    /// View offset where the padding starts.
    pub fn payload_region_end(&self) -> usize {
        let region = (self.header.length - self.header.padding_length) as usize;
        region.saturating_sub(self.consumed)
    }

    /// Record that `skip + len` bytes were consumed from the source.
    pub fn consume(&mut self, len: usize) {
        let n = self.skip + len;
        self.left = self.left.saturating_sub(n);
        self.consumed += n;
        self.skip = 0;
        self.view = Bytes::new();
    }
}

impl<S: ByteSource, H: DemuxHost> AsfDemuxer<S, H> {
    /// Decode one data packet.
    ///
    /// `min_size == max_size` means fixed-size framing: a packet with an
    /// unusable header is skipped whole. With variable framing the same
    /// condition is [`PacketStatus::FatalUnsupported`].
    pub fn decode_one_packet(&mut self, min_size: u32, max_size: u32) -> Result<PacketStatus> {
        if min_size == 0 {
            return Err(DemuxError::InvalidData("ASF packet size is 0".into()));
        }

        let min = min_size as usize;
        let head = self.source.peek(min)?;
        if head.len() < min {
            warn!("cannot peek while getting new packet, EOF ?");
            return Ok(PacketStatus::EndOfStream);
        }

        let (header, header_len) = match PacketHeader::parse(&head, min_size) {
            Ok(v) => v,
            Err(e) => return self.recover(min_size, max_size, &e),
        };

        let length = header.length as usize;
        let view = self.source.peek(length)?;
        if view.len() < length {
            warn!("cannot peek, EOF ?");
            return Ok(PacketStatus::EndOfStream);
        }

        self.stats.packets += 1;
        let mut pkt = PacketCursor::new(header, view, header_len);

        let status = match self.decode_payloads(&mut pkt) {
            Ok(()) => PacketStatus::Consumed,
            Err(e) if e.severity() == Severity::Session => return Err(e),
            Err(_) => {
                self.stats.damaged += 1;
                PacketStatus::Damaged
            }
        };

        if pkt.left > 0 {
            let padding = header.padding_length as usize;
            let unread = pkt.remaining();
            if status == PacketStatus::Consumed {
                if unread > padding {
                    warn!("Didn't read {} bytes in the packet", unread - padding);
                } else if unread < padding {
                    warn!("Read {} too much bytes in the packet", padding - unread);
                }
            }
            if self.source.skip(pkt.left)? < pkt.left {
                error!("cannot skip data, EOF ?");
                return Ok(PacketStatus::EndOfStream);
            }
        }

        Ok(status)
    }

    fn decode_payloads(&mut self, pkt: &mut PacketCursor) -> Result<()> {
        let mut payload_count = 1u8;
        if pkt.header.multiple_payloads {
            let b = read_u8(&pkt.view, &mut pkt.skip)?;
            payload_count = b & 0x3F;
            pkt.payload_length_width = WidthCode::from_bits(b >> 6);
        }

        debug!("{payload_count} payloads");

        for index in 0..payload_count {
            if let Err(e) = self.decode_payload(pkt, index) {
                warn!("payload err {} / {}: {e}", index + 1, payload_count);
                return Err(e);
            }
        }
        Ok(())
    }

    fn recover(&mut self, min_size: u32, max_size: u32, cause: &DemuxError) -> Result<PacketStatus> {
        warn!("unsupported packet header: {cause}");
        if min_size != max_size {
            error!("unsupported packet header, fatal error");
            return Ok(PacketStatus::FatalUnsupported);
        }

        let min = min_size as usize;
        if self.source.skip(min)? != min {
            warn!("cannot skip data, EOF ?");
            return Ok(PacketStatus::EndOfStream);
        }
        self.stats.recovered += 1;
        Ok(PacketStatus::RecoveredSkip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(bytes: &[u8], min: usize) -> Vec<u8> {
        let mut v = bytes.to_vec();
        v.resize(min, 0);
        v
    }

    #[test]
    fn all_fields_absent() {
        let buf = head(&[0x82, 0, 0, 0x00, 0x5D, 0x10, 0x27, 0, 0, 0x64, 0], 64);
        let (h, len) = PacketHeader::parse(&buf, 64).unwrap();
        assert!(h.has_error_correction);
        assert!(!h.multiple_payloads);
        assert_eq!(h.length, 64);
        assert_eq!(h.padding_length, 0);
        assert_eq!(h.send_time_ms, 10_000);
        assert_eq!(h.duration_ms, 100);
        assert_eq!(h.property.replication_length, WidthCode::Byte);
        assert_eq!(h.property.object_offset, WidthCode::DWord);
        assert_eq!(h.property.object_number, WidthCode::Byte);
        assert_eq!(len, 11);
    }

    #[test]
    fn short_length_becomes_padding() {
        // length (word) = 40, padding (byte) = 3
        let buf = head(&[0x82, 0, 0, 0x48, 0x00, 40, 0, 3, 0, 0, 0, 0, 0, 0], 64);
        let (h, len) = PacketHeader::parse(&buf, 64).unwrap();
        assert_eq!(h.length, 64);
        assert_eq!(h.padding_length, 3 + 24);
        assert_eq!(len, 14);
    }

    #[test]
    fn oversized_padding_is_malformed() {
        let buf = head(&[0x82, 0, 0, 0x28, 0x00, 10, 11], 64);
        let err = PacketHeader::parse(&buf, 64).unwrap_err();
        assert!(matches!(err, DemuxError::MalformedHeader(_)), "{err}");
    }

    #[test]
    fn bad_error_correction_is_malformed() {
        for first in [0x83u8, 0x92, 0xA2] {
            let buf = head(&[first, 0, 0, 0, 0], 64);
            assert!(matches!(
                PacketHeader::parse(&buf, 64),
                Err(DemuxError::MalformedHeader(_))
            ));
        }
    }

    #[test]
    fn no_error_correction_starts_at_flags() {
        let buf = head(&[0x01, 0x00, 0, 0, 0, 0, 0, 0], 32);
        let (h, len) = PacketHeader::parse(&buf, 32).unwrap();
        assert!(!h.has_error_correction);
        assert!(h.multiple_payloads);
        assert_eq!(len, 8);
    }

    #[test]
    fn tiny_packet_size_is_malformed() {
        let buf = head(&[0x82, 0, 0], 4);
        assert!(matches!(
            PacketHeader::parse(&buf, 4),
            Err(DemuxError::MalformedHeader(_))
        ));
    }
}
