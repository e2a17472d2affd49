use crate::track::FragmentChain;

/// Callbacks the demuxer drives while decoding packets.
///
/// Only [`DemuxHost::send`] is required; the rest default to no-ops.
pub trait DemuxHost {
    /// Receive a complete media object for `stream_id`.
    fn send(&mut self, stream_id: u8, object: FragmentChain);

    /// Report the current clock estimate of a track, in microseconds.
    fn update_time(&mut self, _stream_id: u8, _track_time_us: i64) {}

    /// Return `true` to drop this payload without emitting data.
    fn should_skip(&mut self, _stream_id: u8, _is_key_frame: bool) -> bool {
        false
    }

    /// Pixel aspect ratio carried by a payload extension.
    fn set_aspect_ratio(&mut self, _stream_id: u8, _num: u8, _den: u8) {}
}

impl<H: DemuxHost + ?Sized> DemuxHost for &mut H {
    fn send(&mut self, stream_id: u8, object: FragmentChain) {
        (**self).send(stream_id, object)
    }

    fn update_time(&mut self, stream_id: u8, track_time_us: i64) {
        (**self).update_time(stream_id, track_time_us)
    }

    fn should_skip(&mut self, stream_id: u8, is_key_frame: bool) -> bool {
        (**self).should_skip(stream_id, is_key_frame)
    }

    fn set_aspect_ratio(&mut self, stream_id: u8, num: u8, den: u8) {
        (**self).set_aspect_ratio(stream_id, num, den)
    }
}

/// Collects every emitted object in order.
impl DemuxHost for Vec<(u8, FragmentChain)> {
    fn send(&mut self, stream_id: u8, object: FragmentChain) {
        self.push((stream_id, object));
    }
}
