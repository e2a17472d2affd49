//! Per-stream metadata and media object reassembly.

use bytes::{Bytes, BytesMut};

use crate::extension::ExtensionDescriptor;

/// One sub-payload worth of media data with its timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub data: Bytes,
    pub pts_us: i64,
    pub dts_us: i64,
    pub is_key_frame: bool,
}

/// Fragments of one media object, in stream order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FragmentChain {
    fragments: Vec<Fragment>,
}

impl FragmentChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fragment> {
        self.fragments.iter()
    }

    /// Total payload bytes across all fragments.
    pub fn data_len(&self) -> usize {
        self.fragments.iter().map(|f| f.data.len()).sum()
    }

    /// Timestamp of the first fragment.
    pub fn pts_us(&self) -> Option<i64> {
        self.fragments.first().map(|f| f.pts_us)
    }

    pub fn dts_us(&self) -> Option<i64> {
        self.fragments.first().map(|f| f.dts_us)
    }

    pub fn is_key_frame(&self) -> bool {
        self.fragments.first().is_some_and(|f| f.is_key_frame)
    }

    /// Concatenate all fragments into one buffer.
    pub fn to_bytes(&self) -> Bytes {
        match self.fragments.as_slice() {
            [] => Bytes::new(),
            [only] => only.data.clone(),
            many => {
                let mut out = BytesMut::with_capacity(self.data_len());
                for f in many {
                    out.extend_from_slice(&f.data);
                }
                out.freeze()
            }
        }
    }
}

impl IntoIterator for FragmentChain {
    type Item = Fragment;
    type IntoIter = std::vec::IntoIter<Fragment>;

    fn into_iter(self) -> Self::IntoIter {
        self.fragments.into_iter()
    }
}

/// Static per-stream properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackInfo {
    pub stream_id: u8,
    /// Presentation offset in 100 ns units.
    pub time_offset_100ns: i64,
    /// Payload extension systems, in declaration order.
    pub extensions: Vec<ExtensionDescriptor>,
}

impl TrackInfo {
    pub fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            ..Self::default()
        }
    }

    pub fn with_time_offset(mut self, time_offset_100ns: i64) -> Self {
        self.time_offset_100ns = time_offset_100ns;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<ExtensionDescriptor>) -> Self {
        self.extensions = extensions;
        self
    }

    #[inline]
    pub fn time_offset_us(&self) -> i64 {
        self.time_offset_100ns / 10
    }
}

/// A stream's metadata plus the media object being reassembled for it.
#[derive(Debug, Clone)]
pub struct Track {
    pub info: TrackInfo,
    pending: FragmentChain,
}

impl Track {
    pub fn new(info: TrackInfo) -> Self {
        Self {
            info,
            pending: FragmentChain::new(),
        }
    }

    pub fn pending(&self) -> &FragmentChain {
        &self.pending
    }

    /// Append `fragment` to the pending object.
    ///
    /// When `starts_object` is set and a previous object is pending, that
    /// object is returned complete before the fragment is appended.
    pub fn accumulate(&mut self, fragment: Fragment, starts_object: bool) -> Option<FragmentChain> {
        let done = if starts_object && !self.pending.is_empty() {
            Some(std::mem::take(&mut self.pending))
        } else {
            None
        };
        self.pending.push(fragment);
        done
    }

    /// Take whatever is pending.
    pub fn flush(&mut self) -> Option<FragmentChain> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// Tracks indexed by stream number.
pub struct TrackTable {
    tracks: [Option<Track>; 128],
}

impl Default for TrackTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackTable {
    pub fn new() -> Self {
        Self {
            tracks: std::array::from_fn(|_| None),
        }
    }

    /// Register a stream, replacing any previous entry (and its pending data).
    pub fn insert(&mut self, info: TrackInfo) {
        let idx = (info.stream_id & 0x7F) as usize;
        self.tracks[idx] = Some(Track::new(info));
    }

    pub fn lookup(&self, stream_id: u8) -> Option<&Track> {
        self.tracks.get(stream_id as usize)?.as_ref()
    }

    pub fn lookup_mut(&mut self, stream_id: u8) -> Option<&mut Track> {
        self.tracks.get_mut(stream_id as usize)?.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.iter_mut().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<TrackInfo> for TrackTable {
    fn from_iter<I: IntoIterator<Item = TrackInfo>>(iter: I) -> Self {
        let mut table = TrackTable::new();
        for info in iter {
            table.insert(info);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(bytes: &'static [u8], pts_us: i64) -> Fragment {
        Fragment {
            data: Bytes::from_static(bytes),
            pts_us,
            dts_us: pts_us,
            is_key_frame: false,
        }
    }

    #[test]
    fn new_object_flushes_previous_chain() {
        let mut t = Track::new(TrackInfo::new(2));
        assert!(t.accumulate(frag(b"ab", 0), true).is_none());
        assert!(t.accumulate(frag(b"cd", 0), false).is_none());

        let done = t.accumulate(frag(b"ef", 40_000), true).unwrap();
        assert_eq!(done.len(), 2);
        assert_eq!(&done.to_bytes()[..], b"abcd");
        assert_eq!(t.pending().pts_us(), Some(40_000));
    }

    #[test]
    fn flush_empties_pending() {
        let mut t = Track::new(TrackInfo::new(1));
        assert!(t.flush().is_none());
        t.accumulate(frag(b"x", 0), true);
        assert_eq!(t.flush().unwrap().data_len(), 1);
        assert!(t.pending().is_empty());
    }

    #[test]
    fn table_lookup() {
        let table: TrackTable = [TrackInfo::new(1), TrackInfo::new(5).with_time_offset(200)]
            .into_iter()
            .collect();
        assert_eq!(table.len(), 2);
        assert!(table.lookup(2).is_none());
        assert!(table.lookup(200).is_none());
        assert_eq!(table.lookup(5).unwrap().info.time_offset_us(), 20);
    }
}
