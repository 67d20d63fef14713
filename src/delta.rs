//! Delta payload decoding and application, per spec.md §4.5 and §6.
//!
//! The instruction-opcode layout and the `decode_header_size` varint shape
//! are carried over from `gix_pack::data::delta` (see
//! `reference/delta.rs.teacher-ref` in the original pack crate), generalized
//! to propagate [`crate::Error`] instead of a narrow `apply`-only error type
//! and to enforce `max_object_size`.

use crate::error::Error;

/// Decode a base-128 varint size (either the base-object size or the
/// result-object size) from the front of an inflated delta payload.
/// Equivalent to the canonical `decode_header_size` used by every Git
/// implementation: low 7 bits per byte, little-endian, continuation in the
/// high bit.
pub(crate) fn decode_varint_size(data: &[u8]) -> Option<(u64, usize)> {
    let mut shift = 0u32;
    let mut size = 0u64;
    let mut consumed = 0usize;
    for &byte in data {
        consumed += 1;
        size |= u64::from(byte & 0x7f) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Some((size, consumed));
        }
    }
    None
}

/// Parse the two leading varints of a delta payload (spec.md §4.5 point 2):
/// base-length, then result-length.
pub(crate) fn decode_payload_header(data: &[u8], offset: u64) -> Result<(u64, u64, usize), Error> {
    let (base_size, n1) = decode_varint_size(data)
        .ok_or_else(|| Error::corrupt(offset, "truncated delta base-size varint"))?;
    let (result_size, n2) = decode_varint_size(&data[n1..])
        .ok_or_else(|| Error::corrupt(offset, "truncated delta result-size varint"))?;
    Ok((base_size, result_size, n1 + n2))
}

/// Apply delta instructions in `data` against `base`, writing the
/// reconstructed object into a freshly allocated buffer of exactly
/// `result_size` bytes.
///
/// Opcode layout (spec.md §4.5 point 2 / §6):
/// - high bit set: **copy** — the low 7 bits select which of up to 4 little-
///   endian offset bytes and 3 little-endian length bytes follow; an omitted
///   length field defaults to `0x10000`.
/// - high bit clear: **insert** — the low 7 bits (never 0) are a literal
///   byte count to copy verbatim from the delta stream.
pub(crate) fn apply(
    base: &[u8],
    data: &[u8],
    result_size: u64,
    offset: u64,
    max_object_size: u64,
) -> Result<Vec<u8>, Error> {
    if result_size > max_object_size {
        return Err(Error::TooLargeObject {
            offset,
            size: result_size,
            limit: max_object_size,
        });
    }
    let mut out = vec![0u8; result_size as usize];
    let mut out_pos = 0usize;
    let mut i = 0usize;

    while let Some(&cmd) = data.get(i) {
        i += 1;
        if cmd & 0b1000_0000 != 0 {
            let (mut ofs, mut size): (u32, u32) = (0, 0);
            if cmd & 0b0000_0001 != 0 {
                ofs = u32::from(*byte_at(data, i, offset)?);
                i += 1;
            }
            if cmd & 0b0000_0010 != 0 {
                ofs |= u32::from(*byte_at(data, i, offset)?) << 8;
                i += 1;
            }
            if cmd & 0b0000_0100 != 0 {
                ofs |= u32::from(*byte_at(data, i, offset)?) << 16;
                i += 1;
            }
            if cmd & 0b0000_1000 != 0 {
                ofs |= u32::from(*byte_at(data, i, offset)?) << 24;
                i += 1;
            }
            if cmd & 0b0001_0000 != 0 {
                size = u32::from(*byte_at(data, i, offset)?);
                i += 1;
            }
            if cmd & 0b0010_0000 != 0 {
                size |= u32::from(*byte_at(data, i, offset)?) << 8;
                i += 1;
            }
            if cmd & 0b0100_0000 != 0 {
                size |= u32::from(*byte_at(data, i, offset)?) << 16;
                i += 1;
            }
            if size == 0 {
                size = 0x10000;
            }
            let (ofs, size) = (ofs as usize, size as usize);
            let end = ofs
                .checked_add(size)
                .filter(|&end| end <= base.len())
                .ok_or_else(|| Error::corrupt(offset, "delta copy instruction reads past the base object"))?;
            write_out(&mut out, &mut out_pos, &base[ofs..end], offset)?;
        } else if cmd == 0 {
            return Err(Error::corrupt(offset, "delta instruction byte 0 is invalid"));
        } else {
            let size = cmd as usize;
            let end = i
                .checked_add(size)
                .filter(|&end| end <= data.len())
                .ok_or_else(|| Error::corrupt(offset, "delta insert instruction reads past the delta stream"))?;
            write_out(&mut out, &mut out_pos, &data[i..end], offset)?;
            i = end;
        }
    }

    if out_pos as u64 != result_size {
        return Err(Error::corrupt(
            offset,
            format!("delta produced {out_pos} bytes, expected {result_size}"),
        ));
    }
    Ok(out)
}

fn byte_at(data: &[u8], i: usize, offset: u64) -> Result<&u8, Error> {
    data.get(i)
        .ok_or_else(|| Error::corrupt(offset, "truncated delta copy instruction"))
}

fn write_out(out: &mut [u8], out_pos: &mut usize, src: &[u8], offset: u64) -> Result<(), Error> {
    let end = out_pos
        .checked_add(src.len())
        .filter(|&end| end <= out.len())
        .ok_or_else(|| Error::corrupt(offset, "delta writes past the declared result size"))?;
    out[*out_pos..end].copy_from_slice(src);
    *out_pos = end;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_size_round_trips_multi_byte_values() {
        // 300 needs two continuation bytes: 0b1_0101100, 0b0_0000010
        let data = [0b1010_1100, 0b0000_0010, 0xff];
        let (size, consumed) = decode_varint_size(&data).unwrap();
        assert_eq!(size, 300);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn varint_size_reports_truncation() {
        let data = [0x80, 0x80];
        assert!(decode_varint_size(&data).is_none());
    }

    #[test]
    fn apply_mixes_copy_and_insert_instructions() {
        let base = b"The quick brown fox";
        // copy "The quick " (offset 0, len 10), insert "slow", copy " fox" (offset 15, len 4)
        let mut payload = Vec::new();
        payload.push(0x90); // copy, size-low-byte present, offset omitted (defaults to 0)
        payload.push(10);
        payload.push(4); // insert 4 bytes
        payload.extend_from_slice(b"slow");
        payload.push(0b1001_0001); // copy, offset-byte-0 present, size-low-byte present
        payload.push(15);
        payload.push(4);

        let result = apply(base, &payload, 18, 0, u64::MAX).unwrap();
        assert_eq!(result, b"The quick slow fox");
    }

    #[test]
    fn apply_defaults_omitted_length_to_0x10000() {
        let base = vec![7u8; 0x10000];
        let payload = [0b1000_0000u8]; // copy, no offset/size bytes at all
        let result = apply(&base, &payload, 0x10000, 0, u64::MAX).unwrap();
        assert_eq!(result.len(), 0x10000);
        assert!(result.iter().all(|&b| b == 7));
    }

    #[test]
    fn apply_rejects_copy_past_base_end() {
        let base = b"short";
        let payload = [0b1001_0001u8, 0, 10]; // offset 0, size 10 > base.len()
        let err = apply(base, &payload, 10, 0, u64::MAX).unwrap_err();
        assert!(matches!(err, Error::CorruptObject { .. }));
    }

    #[test]
    fn apply_rejects_oversized_result() {
        let err = apply(b"x", &[1, b'y'], 1, 0, 0).unwrap_err();
        assert!(matches!(err, Error::TooLargeObject { .. }));
    }
}
