//! A fixed-size byte window over either a forward-only input stream or a
//! caller-driven random-access re-read, per spec.md §4.1.
//!
//! [`Window`] owns nothing but buffer mechanics: it never hashes bytes and
//! never forwards them anywhere. Callers extract consumed bytes with
//! [`Window::consume`] and decide what to do with them (feed a hasher,
//! forward to a sink, or simply discard them) — this keeps the window
//! itself a small, reusable primitive instead of the god-object the
//! upstream `PackParser.InputStream` class tends to become.

use crate::error::Error;

/// Something [`Window`] can pull more bytes from.
pub(crate) trait ByteSource {
    /// Read up to `buf.len()` bytes, returning how many were read. `0` means
    /// the source is exhausted.
    fn pull(&mut self, buf: &mut [u8]) -> Result<usize, Error>;
}

/// Wraps any [`std::io::Read`] as the forward `INPUT` source.
pub(crate) struct ForwardSource<R> {
    pub(crate) inner: R,
}

impl<R: std::io::Read> ByteSource for ForwardSource<R> {
    fn pull(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.inner.read(buf).map_err(Error::Io)
    }
}

/// Adapts any `FnMut(&mut [u8]) -> Result<usize, Error>` closure (typically
/// one forwarding to [`crate::sink::Sink::read_database`]) into a
/// [`ByteSource`] for the random-access `DATABASE` source of spec.md §4.1.
impl<F> ByteSource for F
where
    F: FnMut(&mut [u8]) -> Result<usize, Error>,
{
    fn pull(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self(buf)
    }
}

/// The default window size, per spec.md §4.1 ("implementation may choose ~8 KiB").
const DEFAULT_WINDOW: usize = 8 * 1024;

pub(crate) struct Window<Src> {
    buf: Vec<u8>,
    /// Absolute stream position of `buf[0]`.
    base_pos: u64,
    /// Index of the next unread byte.
    offset: usize,
    /// Number of valid bytes in `buf`, i.e. the valid range is `buf[..filled]`.
    filled: usize,
    source: Src,
}

impl<Src: ByteSource> Window<Src> {
    pub(crate) fn new(source: Src) -> Self {
        Window {
            buf: vec![0; DEFAULT_WINDOW],
            base_pos: 0,
            offset: 0,
            filled: 0,
            source,
        }
    }

    /// Absolute position of the next byte that will be read.
    pub(crate) fn stream_position(&self) -> u64 {
        self.base_pos + self.offset as u64
    }

    fn available(&self) -> usize {
        self.filled - self.offset
    }

    /// Ensure at least `n` bytes are available starting at the current
    /// offset, growing or sliding the window as necessary. Fails with
    /// [`Error::UnexpectedEnd`] if the source is exhausted first.
    pub(crate) fn fill(&mut self, n: usize, context: &'static str) -> Result<(), Error> {
        if self.available() >= n {
            return Ok(());
        }
        if self.offset > 0 {
            self.buf.copy_within(self.offset..self.filled, 0);
            self.base_pos += self.offset as u64;
            self.filled -= self.offset;
            self.offset = 0;
        }
        if n > self.buf.len() {
            self.buf.resize(n, 0);
        }
        // Bounded to exactly `n`, never the buffer's full spare capacity: a
        // database re-read source folds every byte it returns into a sink-
        // owned CRC scoped to "this object's bytes" (spec.md §6 `checkCRC`),
        // so pulling past what's actually needed would poison that checksum
        // with bytes belonging to whatever follows in the backing store.
        while self.filled < n {
            let read = self.source.pull(&mut self.buf[self.filled..n])?;
            if read == 0 {
                return Err(Error::UnexpectedEnd { context });
            }
            self.filled += read;
        }
        Ok(())
    }

    /// Read exactly one byte, advancing the cursor.
    pub(crate) fn read_one(&mut self, context: &'static str) -> Result<u8, Error> {
        self.fill(1, context)?;
        let byte = self.buf[self.offset];
        self.offset += 1;
        Ok(byte)
    }

    /// Peek at `n` bytes starting at the current offset without consuming them.
    /// Caller must have called [`Window::fill`] with at least `n` beforehand.
    pub(crate) fn peek(&self, n: usize) -> &[u8] {
        &self.buf[self.offset..self.offset + n]
    }

    /// Peek at whatever is currently buffered and unread, without requesting
    /// a specific amount. Caller must ensure at least one byte is filled.
    pub(crate) fn peek_available(&self) -> &[u8] {
        &self.buf[self.offset..self.filled]
    }

    /// Advance the cursor by `n` bytes (which must already be filled) and
    /// return their absolute stream position together with their bytes.
    pub(crate) fn consume(&mut self, n: usize) -> (u64, &[u8]) {
        let pos = self.base_pos + self.offset as u64;
        let bytes = &self.buf[self.offset..self.offset + n];
        self.offset += n;
        (pos, bytes)
    }

    /// Bytes already buffered but not yet consumed — used to recover
    /// surplus data read past the pack footer (spec.md §6
    /// `expectDataAfterPackFooter`).
    pub(crate) fn unconsumed(&self) -> &[u8] {
        &self.buf[self.offset..self.filled]
    }

    pub(crate) fn into_source(self) -> Src {
        self.source
    }
}
