//! Payload decoding: replicated data, timestamps and sub-payload emission.

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};

use crate::demuxer::AsfDemuxer;
use crate::error::{DemuxError, Result};
use crate::extension::parse_extensions;
use crate::field::{read_u8, read_var};
use crate::host::DemuxHost;
use crate::packet::PacketCursor;
use crate::preroll::US_PER_MS;
use crate::source::ByteSource;
use crate::track::Fragment;

/// The media object offset field, which compressed payloads reuse as a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectPosition {
    RawOffset(u32),
    CompressedBaseTime(u32),
}

impl ObjectPosition {
    /// A fragment at offset zero opens a new media object. Every sub-payload
    /// of a compressed payload is a whole object.
    #[inline]
    pub fn starts_object(self) -> bool {
        match self {
            ObjectPosition::RawOffset(off) => off == 0,
            ObjectPosition::CompressedBaseTime(_) => true,
        }
    }

    #[inline]
    pub fn is_compressed(self) -> bool {
        matches!(self, ObjectPosition::CompressedBaseTime(_))
    }
}

/// Replicated data shapes selected by the replicated data length.
enum Replication {
    /// No replicated data; timing comes from the packet send time.
    None,
    /// One delta byte; the object offset holds the base time.
    Compressed,
    /// Full block of `len` bytes: object size, presentation time, extensions.
    Full { len: usize },
    Invalid,
}

impl Replication {
    fn from_length(len: u32) -> Self {
        match len {
            0 => Replication::None,
            1 => Replication::Compressed,
            2..=7 => Replication::Invalid,
            _ => Replication::Full { len: len as usize },
        }
    }
}

impl<S: ByteSource, H: DemuxHost> AsfDemuxer<S, H> {
    pub(crate) fn decode_payload(&mut self, pkt: &mut PacketCursor, index: u8) -> Result<()> {
        if pkt.left == 0 || pkt.skip >= pkt.left {
            return Err(DemuxError::MalformedPayload("no data left for payload".into()));
        }

        let first = read_u8(&pkt.view, &mut pkt.skip)?;
        let mut is_key_frame = first & 0x80 != 0;
        let stream_id = first & 0x7F;

        if stream_id > self.config.max_stream_id {
            debug!("payload({}) stream {stream_id} out of range, skipping", index + 1);
            pkt.skip = pkt.skip.max(pkt.payload_region_end());
            return Ok(());
        }

        let props = pkt.header.property;
        let media_object_number = read_var(&pkt.view, &mut pkt.skip, props.object_number, 0)?;
        let media_object_offset = read_var(&pkt.view, &mut pkt.skip, props.object_offset, 0)?;
        let replication_length = read_var(&pkt.view, &mut pkt.skip, props.replication_length, 0)?;

        let send_time_ms = pkt.header.send_time_ms;
        self.preroll.resolve_start(send_time_ms);

        let (base_time_ms, position, pts_delta_ms) = match Replication::from_length(replication_length) {
            Replication::None => (send_time_ms as i64, ObjectPosition::RawOffset(media_object_offset), 0),
            Replication::Compressed => {
                let delta = read_u8(&pkt.view, &mut pkt.skip)?;
                (
                    media_object_offset as i64,
                    ObjectPosition::CompressedBaseTime(media_object_offset),
                    delta,
                )
            }
            Replication::Full { len } => {
                let available = pkt.remaining();
                if len > available {
                    return Err(DemuxError::TruncatedField { needed: len, available });
                }
                let block = pkt.view.slice(pkt.skip..pkt.skip + len);
                let base = LittleEndian::read_u32(&block[4..8]);

                if let Some(track) = self.tracks.lookup(stream_id) {
                    if !track.info.extensions.is_empty() {
                        is_key_frame = parse_extensions(
                            &track.info.extensions,
                            &block[8..],
                            stream_id,
                            is_key_frame,
                            &mut self.host,
                        )
                        .is_key_frame;
                    }
                }

                pkt.skip += len;
                if pkt.skip >= pkt.left {
                    return Err(DemuxError::MalformedPayload(
                        "replicated data fills the packet".into(),
                    ));
                }
                (base as i64, ObjectPosition::RawOffset(media_object_offset), 0)
            }
            Replication::Invalid => {
                warn!("Invalid replicated data length detected: {replication_length}");
                pkt.skip = pkt.skip.max(pkt.payload_region_end());
                return Ok(());
            }
        };

        let base_pts_us = self.preroll.relative_ms(base_time_ms).max(0) * US_PER_MS;

        let payload_data_length = if pkt.header.multiple_payloads {
            read_var(&pkt.view, &mut pkt.skip, pkt.payload_length_width, 0)? as usize
        } else {
            pkt.payload_region_end().saturating_sub(pkt.skip)
        };

        debug!(
            "payload({}) stream_number:{stream_id} media_object_number:{media_object_number} \
             media_object_offset:{media_object_offset} replicated_data_length:{replication_length} \
             payload_data_length {payload_data_length}",
            index + 1
        );
        debug!("   pts={base_pts_us} st={send_time_ms}");

        if payload_data_length == 0 || payload_data_length > pkt.remaining() {
            return Err(DemuxError::MalformedPayload(format!(
                "payload length {payload_data_length} with {} bytes left",
                pkt.remaining()
            )));
        }

        let Some(time_offset_us) = self.tracks.lookup(stream_id).map(|t| t.info.time_offset_us()) else {
            debug!("payload({}) stream {stream_id} has no track, skipping", index + 1);
            pkt.skip += payload_data_length;
            return Ok(());
        };

        if self.host.should_skip(stream_id, is_key_frame) {
            pkt.skip += payload_data_length;
            return Ok(());
        }

        let preroll_done = self.preroll.is_done(send_time_ms);
        let huge_delay = self.preroll.is_huge_delay();
        let send_time_us = self.preroll.relative_ms(send_time_ms as i64) * US_PER_MS - time_offset_us;

        if preroll_done || huge_delay {
            let track_time_us = if huge_delay { base_pts_us } else { send_time_us };
            self.host.update_time(stream_id, track_time_us);
        }

        let dts_us = if huge_delay { base_pts_us } else { send_time_us };

        let mut remaining = payload_data_length;
        let mut sub_index = 0i64;
        while remaining > 0 {
            let mut sub_len = remaining;
            if position.is_compressed() {
                sub_len = read_u8(&pkt.view, &mut pkt.skip)? as usize;
                remaining -= 1;
            }
            if sub_len > pkt.remaining() {
                return Err(DemuxError::MalformedPayload(format!(
                    "sub-payload of {sub_len} bytes overruns packet ({} left)",
                    pkt.remaining()
                )));
            }

            self.skip_exact(pkt.skip)?;

            if sub_len > 0 {
                let pts_us = base_pts_us + pts_delta_ms as i64 * sub_index * US_PER_MS - time_offset_us;
                let fragment = Fragment {
                    data: self.read_exact_block(sub_len)?,
                    pts_us,
                    dts_us,
                    is_key_frame,
                };
                if let Some(track) = self.tracks.lookup_mut(stream_id) {
                    if let Some(object) = track.accumulate(fragment, position.starts_object()) {
                        self.host.send(stream_id, object);
                    }
                }
            }

            pkt.consume(sub_len);
            if pkt.left > 0 {
                let view = self.source.peek(pkt.left)?;
                if view.len() < pkt.left {
                    warn!("cannot peek, EOF ?");
                    return Err(DemuxError::ShortRead {
                        requested: pkt.left,
                        got: view.len(),
                    });
                }
                pkt.view = view;
            }

            remaining = remaining.saturating_sub(sub_len);
            sub_index += 1;
        }

        Ok(())
    }

    fn skip_exact(&mut self, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let got = self.source.skip(len)?;
        if got < len {
            return Err(DemuxError::ShortRead { requested: len, got });
        }
        Ok(())
    }

    fn read_exact_block(&mut self, len: usize) -> Result<bytes::Bytes> {
        match self.source.read_block(len)? {
            Some(block) => Ok(block),
            None => {
                warn!("cannot read data");
                let got = self.source.peek(len)?.len();
                Err(DemuxError::ShortRead { requested: len, got })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_position_always_starts_object() {
        assert!(ObjectPosition::CompressedBaseTime(1234).starts_object());
        assert!(ObjectPosition::RawOffset(0).starts_object());
        assert!(!ObjectPosition::RawOffset(16).starts_object());
    }

    #[test]
    fn replication_shapes() {
        assert!(matches!(Replication::from_length(0), Replication::None));
        assert!(matches!(Replication::from_length(1), Replication::Compressed));
        assert!(matches!(Replication::from_length(5), Replication::Invalid));
        assert!(matches!(Replication::from_length(8), Replication::Full { len: 8 }));
    }
}
