//! Payload extension systems carried in replicated data.

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use crate::error::DemuxError;
use crate::guid::{Guid, GUID_EXT_OUTPUT_CLEAN_POINT, GUID_EXT_PIXEL_ASPECT_RATIO, GUID_EXT_VIDEO_FRAME};
use crate::host::DemuxHost;

/// Declared size of an extension whose size is stored inline.
pub const VARIABLE_SIZE: u16 = 0xFFFF;

const VIDEO_FRAME_NEW_FRAME: u32 = 0x08;
const VIDEO_FRAME_TYPE_MASK: u32 = 0x07;
const VIDEO_FRAME_TYPE_I: u32 = 0x01;

/// One payload extension system as declared in the extended stream properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionDescriptor {
    pub id: Guid,
    pub declared_size: u16,
}

impl ExtensionDescriptor {
    pub fn new(id: Guid, declared_size: u16) -> Self {
        Self { id, declared_size }
    }

    pub fn is_variable(&self) -> bool {
        self.declared_size == VARIABLE_SIZE
    }
}

/// Signals extracted from one payload's extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionSignals {
    pub is_key_frame: bool,
}

/// Walk `data` (replicated data past its 8 fixed bytes) following `descriptors`.
///
/// Extensions are packed in declaration order. Running out of data ends the
/// walk quietly; a recognized extension with the wrong size logs a warning
/// and ends it as well.
pub fn parse_extensions<H: DemuxHost + ?Sized>(
    descriptors: &[ExtensionDescriptor],
    mut data: &[u8],
    stream_id: u8,
    is_key_frame: bool,
    host: &mut H,
) -> ExtensionSignals {
    let mut signals = ExtensionSignals { is_key_frame };

    for desc in descriptors {
        let size = if desc.is_variable() {
            if data.len() < 2 {
                break;
            }
            let size = LittleEndian::read_u16(data);
            data = &data[2..];
            size
        } else {
            desc.declared_size
        };

        let Some(ext) = data.get(..size as usize) else {
            break;
        };

        if let Err(e) = apply_extension(desc.id, ext, stream_id, &mut signals, host) {
            warn!("stream {stream_id}: {e}");
            break;
        }

        data = &data[size as usize..];
    }

    signals
}

fn apply_extension<H: DemuxHost + ?Sized>(
    id: Guid,
    ext: &[u8],
    stream_id: u8,
    signals: &mut ExtensionSignals,
    host: &mut H,
) -> Result<(), DemuxError> {
    let expect = |expected: usize| {
        if ext.len() == expected {
            Ok(())
        } else {
            Err(DemuxError::ExtensionSizeMismatch {
                extension: id,
                size: ext.len() as u16,
            })
        }
    };

    if id == GUID_EXT_OUTPUT_CLEAN_POINT {
        expect(1)?;
        signals.is_key_frame |= ext[0] != 0;
    } else if id == GUID_EXT_VIDEO_FRAME {
        expect(4)?;
        let v = LittleEndian::read_u32(ext);
        signals.is_key_frame =
            (v & VIDEO_FRAME_NEW_FRAME) != 0 && (v & VIDEO_FRAME_TYPE_MASK) == VIDEO_FRAME_TYPE_I;
    } else if id == GUID_EXT_PIXEL_ASPECT_RATIO {
        expect(2)?;
        host.set_aspect_ratio(stream_id, ext[0], ext[1]);
    }
    Ok(())
}
