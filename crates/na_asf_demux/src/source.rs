//! Forward-only byte sources with read-ahead.

use std::io::{self, ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};

const READ_CHUNK: usize = 16 * 1024;

/// A sequential byte stream the demuxer pulls from.
pub trait ByteSource {
    /// Return up to `len` bytes ahead of the cursor without consuming them.
    ///
    /// Fewer than `len` bytes are returned only at end of stream.
    fn peek(&mut self, len: usize) -> io::Result<Bytes>;

    /// Consume and drop up to `len` bytes, returning how many were consumed.
    fn skip(&mut self, len: usize) -> io::Result<usize>;

    /// Consume exactly `len` bytes. `None` if the stream ends first.
    fn read_block(&mut self, len: usize) -> io::Result<Option<Bytes>>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn peek(&mut self, len: usize) -> io::Result<Bytes> {
        (**self).peek(len)
    }

    fn skip(&mut self, len: usize) -> io::Result<usize> {
        (**self).skip(len)
    }

    fn read_block(&mut self, len: usize) -> io::Result<Option<Bytes>> {
        (**self).read_block(len)
    }
}

/// [`ByteSource`] over any [`Read`], buffering what has been peeked.
///
/// Peeked views and blocks are slices of one refcounted buffer, so handing
/// fragments to the sink does not copy them again.
pub struct ReaderSource<R: Read> {
    inner: R,
    buf: Bytes,
    eof: bool,
    position: u64,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Bytes::new(),
            eof: false,
            position: 0,
        }
    }

    /// Start counting positions from `position` (e.g. the data object offset).
    pub fn with_position(inner: R, position: u64) -> Self {
        Self {
            position,
            ..Self::new(inner)
        }
    }

    /// Absolute offset of the read cursor.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read until `len` bytes are buffered or the stream ends.
    ///
    /// The buffer grows one chunk per read, so a large `len` costs nothing
    /// beyond the bytes the reader actually has.
    fn fill(&mut self, len: usize) -> io::Result<()> {
        if self.buf.len() >= len || self.eof {
            return Ok(());
        }

        let mut more = BytesMut::with_capacity(self.buf.len() + READ_CHUNK);
        more.extend_from_slice(&self.buf);

        while more.len() < len {
            let filled = more.len();
            more.resize(filled + READ_CHUNK, 0);
            match self.inner.read(&mut more[filled..]) {
                Ok(0) => {
                    more.truncate(filled);
                    self.eof = true;
                    break;
                }
                Ok(n) => more.truncate(filled + n),
                Err(e) if e.kind() == ErrorKind::Interrupted => more.truncate(filled),
                Err(e) => return Err(e),
            }
        }

        self.buf = more.freeze();
        Ok(())
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn peek(&mut self, len: usize) -> io::Result<Bytes> {
        self.fill(len)?;
        Ok(self.buf.slice(..len.min(self.buf.len())))
    }

    fn skip(&mut self, len: usize) -> io::Result<usize> {
        let buffered = len.min(self.buf.len());
        self.buf.advance(buffered);
        let mut skipped = buffered;

        let rest = (len - buffered) as u64;
        if rest > 0 && !self.eof {
            let n = io::copy(&mut (&mut self.inner).take(rest), &mut io::sink())?;
            if n < rest {
                self.eof = true;
            }
            skipped += n as usize;
        }

        self.position += skipped as u64;
        Ok(skipped)
    }

    fn read_block(&mut self, len: usize) -> io::Result<Option<Bytes>> {
        let block = self.peek(len)?;
        if block.len() < len {
            return Ok(None);
        }
        self.buf.advance(len);
        self.position += len as u64;
        Ok(Some(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(n: usize) -> Vec<u8> {
        (0..n).map(|i| i as u8).collect()
    }

    #[test]
    fn peek_does_not_consume() {
        let data = numbers(10);
        let mut src = ReaderSource::new(&data[..]);
        assert_eq!(&src.peek(4).unwrap()[..], &[0, 1, 2, 3]);
        assert_eq!(&src.peek(6).unwrap()[..], &[0, 1, 2, 3, 4, 5]);
        assert_eq!(src.position(), 0);
    }

    #[test]
    fn peek_past_end_is_short() {
        let data = numbers(3);
        let mut src = ReaderSource::new(&data[..]);
        assert_eq!(src.peek(8).unwrap().len(), 3);
    }

    #[test]
    fn skip_and_read_block() {
        let data = numbers(40_000);
        let mut src = ReaderSource::new(&data[..]);
        src.peek(2).unwrap();
        assert_eq!(src.skip(20_000).unwrap(), 20_000);
        let block = src.read_block(3).unwrap().unwrap();
        assert_eq!(&block[..], &[data[20_000], data[20_001], data[20_002]]);
        assert_eq!(src.position(), 20_003);

        assert_eq!(src.skip(50_000).unwrap(), 40_000 - 20_003);
        assert!(src.read_block(1).unwrap().is_none());
    }

    /// Reader that remembers the largest buffer it was asked to fill.
    struct Tracking<'a> {
        data: &'a [u8],
        largest_read: usize,
    }

    impl Read for Tracking<'_> {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            self.largest_read = self.largest_read.max(out.len());
            self.data.read(out)
        }
    }

    #[test]
    fn huge_peek_grows_with_input() {
        let data = numbers(64);
        let mut src = ReaderSource::new(Tracking { data: &data, largest_read: 0 });
        assert_eq!(src.peek(0x2000_0000).unwrap().len(), 64);
        assert_eq!(src.peek(0x2000_0000).unwrap().len(), 64);
        assert_eq!(src.into_inner().largest_read, READ_CHUNK);
    }

    #[test]
    fn peek_spans_several_chunks() {
        let data = numbers(READ_CHUNK * 2 + 7);
        let mut src = ReaderSource::new(Tracking { data: &data, largest_read: 0 });
        let view = src.peek(READ_CHUNK * 2 + 1).unwrap();
        assert_eq!(view.len(), READ_CHUNK * 2 + 1);
        assert_eq!(view[READ_CHUNK * 2], data[READ_CHUNK * 2]);
        assert_eq!(src.read_block(data.len()).unwrap().unwrap().len(), data.len());
    }

    #[test]
    fn short_block_is_not_consumed() {
        let data = numbers(5);
        let mut src = ReaderSource::new(&data[..]);
        assert!(src.read_block(6).unwrap().is_none());
        assert_eq!(src.read_block(5).unwrap().unwrap().len(), 5);
    }
}
