//! Utility functions that may be helpful for implementing
//! and testing MapReduce workloads.
//!

use anyhow::Result;
use bytes::{BufMut, Bytes, BytesMut};

/// Read an entire [`Bytes`] slice into a [`String`].
///
/// Note that the entire slice will be read into the string.
/// It is the caller's responsibility to ensure the slice is
/// of the correct length. Failure to do so may result in
/// an error being returned, or the string data being incorrect.
///
/// Returns an error if the slice contains invalid UTF-8.
pub fn string_from_bytes(buf: Bytes) -> Result<String> {
    Ok(String::from_utf8(buf.as_ref().into())?)
}

/// Packs floats as consecutive little-endian `f64`s, no separators.
pub fn floats_to_bytes(floats: &[f64]) -> Bytes {
    let mut buf = BytesMut::with_capacity(floats.len() * 8);
    for f in floats {
        buf.put_f64_le(*f);
    }
    buf.freeze()
}

/// Unpacks the output of [`floats_to_bytes`]. The count is `len / 8`;
/// a trailing partial value is ignored.
pub fn bytes_to_floats(buf: &[u8]) -> Vec<f64> {
    buf.chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect()
}

/// Packs a count as a little-endian `u64`.
pub fn count_to_bytes(count: u64) -> Bytes {
    Bytes::copy_from_slice(&count.to_le_bytes())
}

/// Reads a count written by [`count_to_bytes`].
pub fn bytes_to_count(buf: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = buf
        .try_into()
        .map_err(|_| anyhow::anyhow!("count must be 8 bytes, got {}", buf.len()))?;
    Ok(u64::from_le_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_pack_eight_bytes_each() {
        let packed = floats_to_bytes(&[15.0, 13.2]);
        assert_eq!(packed.len(), 16);
        assert_eq!(&packed[..8], &15.0f64.to_le_bytes());
        assert_eq!(bytes_to_floats(&packed), vec![15.0, 13.2]);
    }

    #[test]
    fn partial_trailing_float_is_dropped() {
        let mut packed = floats_to_bytes(&[1.5]).to_vec();
        packed.extend_from_slice(&[0xff, 0xff]);
        assert_eq!(bytes_to_floats(&packed), vec![1.5]);
    }

    #[test]
    fn counts_round_trip() {
        assert_eq!(bytes_to_count(&count_to_bytes(41)).unwrap(), 41);
        assert!(bytes_to_count(&[1, 2, 3]).is_err());
    }
}
