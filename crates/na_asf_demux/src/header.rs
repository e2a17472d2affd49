//! ASF header object parsing: the properties the data packet decoder needs.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::config::DemuxConfig;
use crate::error::{DemuxError, Result};
use crate::extension::ExtensionDescriptor;
use crate::guid::{
    Guid, GUID_ASF_DATA, GUID_ASF_HEADER, GUID_EXTENDED_STREAM_PROPERTIES, GUID_FILE_PROPERTIES,
    GUID_HEADER_EXTENSION, GUID_STREAM_PROPERTIES, GUID_STREAM_TYPE_AUDIO, GUID_STREAM_TYPE_VIDEO,
};
use crate::track::{TrackInfo, TrackTable};

const OBJECT_HEADER_SIZE: u64 = 24;

// ─── ASF Object Header ───────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ObjectHeader {
    pub guid: Guid,
    pub size: u64,
}

impl ObjectHeader {
    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let guid = Guid::read(r)?;
        let size = r.read_u64::<LittleEndian>()?;
        if size < OBJECT_HEADER_SIZE {
            return Err(DemuxError::InvalidData("ASF object size < 24".into()));
        }
        Ok(Self { guid, size })
    }
}

/// End offset of an object starting at `pos`, which must not pass `parent_end`.
fn child_end(pos: u64, obj: &ObjectHeader, parent_end: u64) -> Result<u64> {
    match pos.checked_add(obj.size) {
        Some(end) if end <= parent_end => Ok(end),
        _ => Err(DemuxError::InvalidData(format!(
            "object {} of {} bytes overruns its parent",
            obj.guid, obj.size
        ))),
    }
}

fn has_child(pos: u64, parent_end: u64) -> bool {
    pos.checked_add(OBJECT_HEADER_SIZE).is_some_and(|e| e <= parent_end)
}

// ─── File / Stream Properties ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileProperties {
    pub packet_count: u64,
    /// Only the low 32 bits of the on-disk QWORD are kept.
    pub preroll_ms: u32,
    pub broadcast: bool,
    pub seekable: bool,
    pub min_packet_size: u32,
    pub max_packet_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
    Video {
        width: u32,
        height: u32,
        codec_four_cc: [u8; 4],
    },
    Audio {
        format_tag: u16,
        channels: u16,
        sample_rate: u32,
    },
    Other(Guid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub stream_number: u8,
    pub kind: StreamKind,
    /// 100 ns units.
    pub time_offset: u64,
    /// Payload extension systems from the extended stream properties.
    pub extensions: Vec<ExtensionDescriptor>,
}

impl StreamInfo {
    pub fn track_info(&self) -> TrackInfo {
        TrackInfo::new(self.stream_number)
            .with_time_offset(self.time_offset.min(i64::MAX as u64) as i64)
            .with_extensions(self.extensions.clone())
    }
}

// ─── Header ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AsfHeader {
    pub file: FileProperties,
    pub streams: Vec<StreamInfo>,
    /// Absolute offset of the first data packet.
    pub data_offset: u64,
    /// Packet count from the data object.
    pub data_packet_count: u64,
}

impl AsfHeader {
    /// Parse the header object and position `reader` at the first data packet.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let start = reader.stream_position()?;
        let hdr = ObjectHeader::read(reader)?;
        if hdr.guid != GUID_ASF_HEADER {
            return Err(DemuxError::InvalidData("Not an ASF file".into()));
        }

        let _num_headers = reader.read_u32::<LittleEndian>()?;
        let _reserved1 = reader.read_u8()?;
        let _reserved2 = reader.read_u8()?;

        let mut file = None;
        let mut streams: Vec<StreamInfo> = Vec::new();
        let mut extensions: Vec<(u8, Vec<ExtensionDescriptor>)> = Vec::new();

        let header_end = start.saturating_add(hdr.size);
        let mut pos = start + OBJECT_HEADER_SIZE + 4 + 1 + 1;

        while has_child(pos, header_end) {
            let obj = ObjectHeader::read(reader)?;
            let obj_end = child_end(pos, &obj, header_end)?;

            if obj.guid == GUID_FILE_PROPERTIES {
                file = Some(read_file_properties(reader)?);
            } else if obj.guid == GUID_STREAM_PROPERTIES {
                streams.push(read_stream_properties(reader)?);
            } else if obj.guid == GUID_HEADER_EXTENSION {
                read_header_extension(reader, obj_end, &mut extensions)?;
            } else {
                debug!("skipping header object {}", obj.guid);
            }

            pos = obj_end;
            reader.seek(SeekFrom::Start(obj_end))?;
        }

        let file = file.ok_or_else(|| DemuxError::InvalidData("missing file properties".into()))?;
        if file.max_packet_size == 0 {
            return Err(DemuxError::InvalidData("ASF max packet size is 0".into()));
        }

        for (stream_number, exts) in extensions {
            if let Some(s) = streams.iter_mut().find(|s| s.stream_number == stream_number) {
                s.extensions = exts;
            }
        }

        reader.seek(SeekFrom::Start(header_end))?;
        let data_obj = ObjectHeader::read(reader)?;
        if data_obj.guid != GUID_ASF_DATA {
            return Err(DemuxError::InvalidData(
                "Expected ASF Data Object after header".into(),
            ));
        }

        // Data Object payload begins with a FileID GUID (16), total packets (8), reserved (2).
        reader.seek(SeekFrom::Current(16))?;
        let data_packet_count = reader.read_u64::<LittleEndian>()?;
        reader.seek(SeekFrom::Current(2))?;
        let data_offset = reader.stream_position()?;

        Ok(Self {
            file,
            streams,
            data_offset,
            data_packet_count,
        })
    }

    pub fn track_table(&self) -> TrackTable {
        self.streams.iter().map(StreamInfo::track_info).collect()
    }

    pub fn demux_config(&self) -> DemuxConfig {
        DemuxConfig::from_header(self)
    }

    pub fn stream(&self, stream_number: u8) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.stream_number == stream_number)
    }
}

fn read_file_properties<R: Read + Seek>(reader: &mut R) -> Result<FileProperties> {
    reader.seek(SeekFrom::Current(16 + 8 + 8))?; // file_id + file_size + create_time
    let packet_count = reader.read_u64::<LittleEndian>()?;
    reader.seek(SeekFrom::Current(8 + 8))?; // play_time + send_time

    let preroll_ms = reader.read_u32::<LittleEndian>()?;
    let _preroll_hi_ignored = reader.read_u32::<LittleEndian>()?;

    let flags = reader.read_u32::<LittleEndian>()?;
    let min_packet_size = reader.read_u32::<LittleEndian>()?;
    let max_packet_size = reader.read_u32::<LittleEndian>()?;
    let _max_bitrate = reader.read_u32::<LittleEndian>()?;

    Ok(FileProperties {
        packet_count,
        preroll_ms,
        broadcast: flags & 0x01 != 0,
        seekable: flags & 0x02 != 0,
        min_packet_size,
        max_packet_size,
    })
}

fn read_stream_properties<R: Read + Seek>(reader: &mut R) -> Result<StreamInfo> {
    let stream_type = Guid::read(reader)?;
    let _error_correct = Guid::read(reader)?;
    let time_offset = reader.read_u64::<LittleEndian>()?;
    let type_specific_len = reader.read_u32::<LittleEndian>()? as i64;
    let _err_correct_len = reader.read_u32::<LittleEndian>()?;
    let flags = reader.read_u16::<LittleEndian>()?;
    let stream_number = (flags & 0x7F) as u8;
    let _reserved = reader.read_u32::<LittleEndian>()?;

    let kind = if stream_type == GUID_STREAM_TYPE_VIDEO && type_specific_len >= 11 + 40 {
        let _enc_width = reader.read_u32::<LittleEndian>()?;
        let _enc_height = reader.read_u32::<LittleEndian>()?;
        reader.read_u8()?;
        let _fmt_data_size = reader.read_u16::<LittleEndian>()?;

        let _bi_size = reader.read_u32::<LittleEndian>()?;
        let width = reader.read_u32::<LittleEndian>()?;
        let height = reader.read_i32::<LittleEndian>()?.unsigned_abs();
        let _planes = reader.read_u16::<LittleEndian>()?;
        let _bit_count = reader.read_u16::<LittleEndian>()?;
        let mut codec_four_cc = [0u8; 4];
        reader.read_exact(&mut codec_four_cc)?;
        StreamKind::Video {
            width,
            height,
            codec_four_cc,
        }
    } else if stream_type == GUID_STREAM_TYPE_AUDIO && type_specific_len >= 16 {
        let format_tag = reader.read_u16::<LittleEndian>()?;
        let channels = reader.read_u16::<LittleEndian>()?;
        let sample_rate = reader.read_u32::<LittleEndian>()?;
        StreamKind::Audio {
            format_tag,
            channels,
            sample_rate,
        }
    } else {
        StreamKind::Other(stream_type)
    };

    debug!("stream {stream_number}: {kind:?}, time offset {time_offset}");

    Ok(StreamInfo {
        stream_number,
        kind,
        time_offset,
        extensions: Vec::new(),
    })
}

fn read_header_extension<R: Read + Seek>(
    reader: &mut R,
    obj_end: u64,
    out: &mut Vec<(u8, Vec<ExtensionDescriptor>)>,
) -> Result<()> {
    let _reserved1 = Guid::read(reader)?;
    let _reserved2 = reader.read_u16::<LittleEndian>()?;
    let data_size = reader.read_u32::<LittleEndian>()? as u64;

    let mut pos = reader.stream_position()?;
    let end = pos.saturating_add(data_size).min(obj_end);

    while has_child(pos, end) {
        let obj = ObjectHeader::read(reader)?;
        let sub_end = child_end(pos, &obj, end)?;
        if obj.guid == GUID_EXTENDED_STREAM_PROPERTIES {
            out.push(read_extended_stream_properties(reader)?);
        }
        pos = sub_end;
        reader.seek(SeekFrom::Start(sub_end))?;
    }
    Ok(())
}

fn read_extended_stream_properties<R: Read + Seek>(
    reader: &mut R,
) -> Result<(u8, Vec<ExtensionDescriptor>)> {
    // start/end time, bitrate, buffer size, initial fullness, alternate x3, max object size, flags
    reader.seek(SeekFrom::Current(8 + 8 + 4 * 8))?;
    let stream_number = (reader.read_u16::<LittleEndian>()? & 0x7F) as u8;
    let _language_index = reader.read_u16::<LittleEndian>()?;
    let _avg_time_per_frame = reader.read_u64::<LittleEndian>()?;
    let name_count = reader.read_u16::<LittleEndian>()?;
    let system_count = reader.read_u16::<LittleEndian>()?;

    for _ in 0..name_count {
        let _language = reader.read_u16::<LittleEndian>()?;
        let name_len = reader.read_u16::<LittleEndian>()?;
        reader.seek(SeekFrom::Current(name_len as i64))?;
    }

    let mut systems = Vec::with_capacity(system_count as usize);
    for _ in 0..system_count {
        let id = Guid::read(reader)?;
        let declared_size = reader.read_u16::<LittleEndian>()?;
        let info_len = reader.read_u32::<LittleEndian>()?;
        reader.seek(SeekFrom::Current(info_len as i64))?;
        systems.push(ExtensionDescriptor::new(id, declared_size));
    }

    debug!("stream {stream_number}: {} payload extension systems", systems.len());
    Ok((stream_number, systems))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::GUID_EXT_VIDEO_FRAME;
    use byteorder::WriteBytesExt;
    use std::io::{Cursor, Write};

    fn object(guid: Guid, body: &[u8]) -> Vec<u8> {
        let mut v = guid.0.to_vec();
        v.write_u64::<LittleEndian>(24 + body.len() as u64).unwrap();
        v.extend_from_slice(body);
        v
    }

    fn file_properties(preroll: u32, min: u32, max: u32) -> Vec<u8> {
        let mut b = vec![0u8; 16 + 8 + 8];
        b.write_u64::<LittleEndian>(12).unwrap();
        b.extend_from_slice(&[0u8; 16]);
        b.write_u32::<LittleEndian>(preroll).unwrap();
        b.write_u32::<LittleEndian>(0).unwrap();
        b.write_u32::<LittleEndian>(0x02).unwrap();
        b.write_u32::<LittleEndian>(min).unwrap();
        b.write_u32::<LittleEndian>(max).unwrap();
        b.write_u32::<LittleEndian>(128_000).unwrap();
        object(GUID_FILE_PROPERTIES, &b)
    }

    fn audio_stream(number: u16, time_offset: u64) -> Vec<u8> {
        let mut b = GUID_STREAM_TYPE_AUDIO.0.to_vec();
        b.extend_from_slice(&[0u8; 16]);
        b.write_u64::<LittleEndian>(time_offset).unwrap();
        b.write_u32::<LittleEndian>(18).unwrap();
        b.write_u32::<LittleEndian>(0).unwrap();
        b.write_u16::<LittleEndian>(number).unwrap();
        b.write_u32::<LittleEndian>(0).unwrap();
        b.write_u16::<LittleEndian>(0x0161).unwrap();
        b.write_u16::<LittleEndian>(2).unwrap();
        b.write_u32::<LittleEndian>(44_100).unwrap();
        b.write_all(&[0u8; 10]).unwrap();
        object(GUID_STREAM_PROPERTIES, &b)
    }

    fn header_extension(number: u16) -> Vec<u8> {
        let mut esp = vec![0u8; 8 + 8 + 4 * 8];
        esp.write_u16::<LittleEndian>(number).unwrap();
        esp.write_u16::<LittleEndian>(0).unwrap();
        esp.write_u64::<LittleEndian>(0).unwrap();
        esp.write_u16::<LittleEndian>(1).unwrap(); // names
        esp.write_u16::<LittleEndian>(1).unwrap(); // systems
        esp.write_u16::<LittleEndian>(0).unwrap();
        esp.write_u16::<LittleEndian>(4).unwrap();
        esp.write_all(b"a\0b\0").unwrap();
        esp.extend_from_slice(&GUID_EXT_VIDEO_FRAME.0);
        esp.write_u16::<LittleEndian>(4).unwrap();
        esp.write_u32::<LittleEndian>(2).unwrap();
        esp.write_all(&[0xEE, 0xEE]).unwrap();
        let esp = object(GUID_EXTENDED_STREAM_PROPERTIES, &esp);

        let mut b = vec![0u8; 16 + 2];
        b.write_u32::<LittleEndian>(esp.len() as u32).unwrap();
        b.extend_from_slice(&esp);
        object(GUID_HEADER_EXTENSION, &b)
    }

    fn asf_file(children: &[Vec<u8>]) -> Vec<u8> {
        let mut body = Vec::new();
        body.write_u32::<LittleEndian>(children.len() as u32).unwrap();
        body.write_all(&[1, 2]).unwrap();
        for c in children {
            body.extend_from_slice(c);
        }
        let mut out = object(GUID_ASF_HEADER, &body);

        let mut data = vec![0u8; 16];
        data.write_u64::<LittleEndian>(7).unwrap();
        data.write_all(&[1, 1]).unwrap();
        out.extend_from_slice(&object(GUID_ASF_DATA, &data));
        out
    }

    #[test]
    fn parses_properties_and_extensions() {
        let bytes = asf_file(&[
            file_properties(3100, 3200, 3200),
            audio_stream(2, 20_000),
            header_extension(2),
        ]);
        let mut cur = Cursor::new(bytes.clone());
        let hdr = AsfHeader::read(&mut cur).unwrap();

        assert_eq!(hdr.file.preroll_ms, 3100);
        assert_eq!(hdr.file.min_packet_size, 3200);
        assert!(hdr.file.seekable);
        assert!(!hdr.file.broadcast);
        assert_eq!(hdr.data_packet_count, 7);
        assert_eq!(hdr.data_offset, bytes.len() as u64);
        assert_eq!(cur.position(), hdr.data_offset);

        let s = hdr.stream(2).unwrap();
        assert_eq!(
            s.kind,
            StreamKind::Audio { format_tag: 0x0161, channels: 2, sample_rate: 44_100 }
        );
        assert_eq!(s.extensions, vec![ExtensionDescriptor::new(GUID_EXT_VIDEO_FRAME, 4)]);

        let tracks = hdr.track_table();
        let t = tracks.lookup(2).unwrap();
        assert_eq!(t.info.time_offset_us(), 2000);
        assert_eq!(t.info.extensions.len(), 1);

        let cfg = hdr.demux_config();
        assert_eq!((cfg.min_packet_size, cfg.max_packet_size), (3200, 3200));
        assert_eq!(cfg.preroll_ms, 3100);
    }

    #[test]
    fn rejects_child_larger_than_header() {
        let mut bytes = asf_file(&[file_properties(0, 64, 64), audio_stream(1, 0)]);
        // header object size
        bytes[16..24].copy_from_slice(&u64::MAX.to_le_bytes());
        // first child's size
        let child = 24 + 4 + 2 + 16;
        bytes[child..child + 8].copy_from_slice(&u64::MAX.to_le_bytes());
        let mut cur = Cursor::new(bytes);
        assert!(matches!(AsfHeader::read(&mut cur), Err(DemuxError::InvalidData(_))));
    }

    #[test]
    fn rejects_extension_child_overrun() {
        let mut ext = header_extension(2);
        // size of the extended stream properties object inside the extension body
        let esp = 24 + 16 + 2 + 4 + 16;
        ext[esp..esp + 8].copy_from_slice(&(u64::MAX - 8).to_le_bytes());
        let mut cur = Cursor::new(asf_file(&[file_properties(0, 64, 64), ext]));
        assert!(matches!(AsfHeader::read(&mut cur), Err(DemuxError::InvalidData(_))));
    }

    #[test]
    fn rejects_non_asf() {
        let mut cur = Cursor::new(vec![0u8; 64]);
        assert!(matches!(AsfHeader::read(&mut cur), Err(DemuxError::InvalidData(_))));
    }

    #[test]
    fn requires_file_properties() {
        let mut cur = Cursor::new(asf_file(&[audio_stream(1, 0)]));
        assert!(matches!(AsfHeader::read(&mut cur), Err(DemuxError::InvalidData(_))));
    }
}
