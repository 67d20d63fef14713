//! The streaming decompressor, per spec.md §4.2.
//!
//! Wraps [`gix_features::zlib::Inflate`] (the same pull-based `zlib_rs`
//! decompressor `gix-pack` itself uses) as a single reusable instance that is
//! `reset()` between objects rather than reconstructed, per the re-design
//! note in spec.md §9 ("Decompressor reused across objects").

use gix_features::zlib::{FlushDecompress, Inflate, Status};

use crate::error::Error;
use crate::reader::{ByteSource, Window};

pub(crate) struct Decompressor {
    inflate: Inflate,
}

impl Decompressor {
    pub(crate) fn new() -> Self {
        Decompressor {
            inflate: Inflate::default(),
        }
    }

    /// Inflate exactly `inflated_size` bytes of object body from `window`,
    /// reporting every deflated chunk it consumes to `on_compressed_chunk`
    /// (so the sink sees the deflated segment per object, per spec.md §6
    /// `onObjectData`). `entry_offset` is only used to attribute errors.
    pub(crate) fn inflate<Src: ByteSource>(
        &mut self,
        window: &mut Window<Src>,
        inflated_size: u64,
        entry_offset: u64,
        mut on_compressed_chunk: impl FnMut(u64, &[u8]),
    ) -> Result<Vec<u8>, Error> {
        self.inflate.reset();
        let mut out = vec![0u8; inflated_size as usize];
        let mut out_pos = 0usize;
        loop {
            window.fill(1, "deflated object body")?;
            let input = window.peek_available();

            let before_in = self.inflate.total_in();
            let before_out = self.inflate.total_out();
            let status = self
                .inflate
                .decompress(input, &mut out[out_pos..], FlushDecompress::NoFlush)
                .map_err(|_| Error::corrupt(entry_offset, "invalid deflate stream"))?;
            let consumed = (self.inflate.total_in() - before_in) as usize;
            let produced = (self.inflate.total_out() - before_out) as usize;

            if consumed > 0 {
                let (pos, bytes) = window.consume(consumed);
                on_compressed_chunk(pos, bytes);
            }
            out_pos += produced;

            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    if consumed == 0 && produced == 0 {
                        return Err(Error::corrupt(
                            entry_offset,
                            "inflate made no progress before end of input",
                        ));
                    }
                }
            }
        }
        if out_pos as u64 != inflated_size {
            return Err(Error::corrupt(
                entry_offset,
                format!(
                    "declared inflated size {inflated_size} does not match actual decompressed length {out_pos}"
                ),
            ));
        }
        Ok(out)
    }
}
