//! Decode session: owns the byte source, the host callbacks and per-stream state.

use log::debug;

use crate::config::DemuxConfig;
use crate::error::{DemuxError, Result};
use crate::host::DemuxHost;
use crate::preroll::PrerollState;
use crate::source::ByteSource;
use crate::track::TrackTable;

/// Result of decoding one data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketStatus {
    /// Every payload was decoded.
    Consumed,
    /// A payload was malformed; the rest of the packet was skipped.
    Damaged,
    /// The packet header was unusable and exactly one fixed-size packet was skipped.
    RecoveredSkip,
    /// Not enough data for another packet.
    EndOfStream,
    /// The packet header was unusable and packets are variable-sized, so the
    /// start of the next packet cannot be found.
    FatalUnsupported,
}

impl PacketStatus {
    /// Whether the caller may keep calling [`AsfDemuxer::next_packet`].
    pub fn should_continue(self) -> bool {
        matches!(
            self,
            PacketStatus::Consumed | PacketStatus::Damaged | PacketStatus::RecoveredSkip
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStats {
    pub packets: u64,
    pub damaged: u64,
    pub recovered: u64,
}

/// ASF data packet demuxer.
///
/// Each session has its own preroll state and track table; sessions never
/// share mutable state.
pub struct AsfDemuxer<S: ByteSource, H: DemuxHost> {
    pub(crate) source: S,
    pub(crate) host: H,
    pub(crate) tracks: TrackTable,
    pub(crate) preroll: PrerollState,
    pub(crate) config: DemuxConfig,
    pub(crate) stats: DemuxStats,
}

impl<S: ByteSource, H: DemuxHost> AsfDemuxer<S, H> {
    pub fn new(source: S, host: H, tracks: TrackTable, config: DemuxConfig) -> Self {
        Self {
            source,
            host,
            tracks,
            preroll: PrerollState::new(config.preroll_ms, config.preroll_start),
            config,
            stats: DemuxStats::default(),
        }
    }

    pub fn config(&self) -> &DemuxConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn tracks(&self) -> &TrackTable {
        &self.tracks
    }

    pub fn tracks_mut(&mut self) -> &mut TrackTable {
        &mut self.tracks
    }

    pub fn preroll(&self) -> &PrerollState {
        &self.preroll
    }

    pub fn stats(&self) -> DemuxStats {
        self.stats
    }

    /// Decode one packet using the configured packet sizes.
    pub fn next_packet(&mut self) -> Result<PacketStatus> {
        self.decode_one_packet(self.config.min_packet_size, self.config.max_packet_size)
    }

    /// Decode packets until the stream ends, then flush pending objects.
    ///
    /// A fatal header under variable-size framing ends the session with
    /// [`DemuxError::Unsupported`].
    pub fn run(&mut self) -> Result<DemuxStats> {
        loop {
            match self.next_packet()? {
                PacketStatus::EndOfStream => break,
                PacketStatus::FatalUnsupported => {
                    self.flush();
                    return Err(DemuxError::Unsupported(
                        "unsupported packet header with variable packet size".into(),
                    ));
                }
                _ => {}
            }
        }
        self.flush();
        Ok(self.stats)
    }

    /// Hand every pending media object to the host.
    pub fn flush(&mut self) {
        for track in self.tracks.iter_mut() {
            if let Some(object) = track.flush() {
                debug!(
                    "flush stream {} ({} fragments)",
                    track.info.stream_id,
                    object.len()
                );
                self.host.send(track.info.stream_id, object);
            }
        }
    }
}
