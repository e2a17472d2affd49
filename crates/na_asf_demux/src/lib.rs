//! ASF (Advanced Systems Format) data packet demuxer.
//!
//! Packets are pulled from a forward-only [`ByteSource`], split into
//! payloads and sub-payloads, stamped with presentation/decode times and
//! reassembled per stream into media objects handed to a [`DemuxHost`].

pub mod config;
pub mod demuxer;
pub mod error;
pub mod extension;
pub mod field;
pub mod guid;
pub mod header;
pub mod host;
pub mod packet;
pub mod payload;
pub mod preroll;
pub mod source;
pub mod track;

pub use config::{DemuxConfig, MAX_STREAM_NUMBER};
pub use demuxer::{AsfDemuxer, DemuxStats, PacketStatus};
pub use error::{DemuxError, Result, Severity};
pub use extension::ExtensionDescriptor;
pub use guid::Guid;
pub use header::AsfHeader;
pub use host::DemuxHost;
pub use preroll::{PrerollStart, PrerollState};
pub use source::{ByteSource, ReaderSource};
pub use track::{Fragment, FragmentChain, TrackInfo, TrackTable};
