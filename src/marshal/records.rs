//! Decoding of count-prefixed fixed-size record sequences
//!
//! A successful counted call leaves the buffer holding `count` records of a
//! statically known byte layout. The sequence view validates the count
//! against the allocation once, then yields lazily decoded records; the
//! buffer is immutable for the duration, so the sequence can be iterated
//! any number of times without re-invoking the native call.

use crate::error::{RasError, Result};
use crate::marshal::buffer::CountedCallParams;
use bytes::BufMut;
use std::marker::PhantomData;

/// A native record with a statically known wire size
pub trait FixedRecord: Sized {
    /// Byte length of one record in the native layout
    const SIZE: usize;

    /// Decode one record from exactly [`Self::SIZE`] bytes
    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// Restartable view over the records in a populated counted buffer
pub struct RecordSeq<'a, T: FixedRecord> {
    bytes: &'a [u8],
    count: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: FixedRecord> RecordSeq<'a, T> {
    /// Validate the counted buffer and construct the sequence view.
    ///
    /// A count that does not fit the allocation is corruption reported by
    /// the native layer and is surfaced as an error, never clamped.
    pub fn from_params(params: &'a CountedCallParams) -> Result<Self> {
        let count = params.count() as usize;
        let needed = count.checked_mul(T::SIZE).ok_or_else(|| {
            RasError::CorruptBuffer(format!("Record count {count} overflows the buffer size"))
        })?;

        let buf = params.as_slice();
        if needed > buf.len() {
            return Err(RasError::CorruptBuffer(format!(
                "Buffer holds {} bytes but count {count} needs {needed}",
                buf.len()
            )));
        }

        if log::log_enabled!(log::Level::Debug) && count > 0 {
            let preview = needed.min(64);
            log::debug!(
                "Decoding {count} records of {} bytes, first {preview} bytes: {}",
                T::SIZE,
                hex::encode(&buf[..preview])
            );
        }

        Ok(Self {
            bytes: &buf[..needed],
            count,
            _marker: PhantomData,
        })
    }

    /// Number of records in the sequence
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// A fresh iterator over the records; may be taken more than once
    pub fn iter(&self) -> RecordIter<'a, T> {
        RecordIter {
            bytes: self.bytes,
            index: 0,
            count: self.count,
            _marker: PhantomData,
        }
    }

    /// Decode the whole sequence eagerly
    pub fn collect_all(&self) -> Result<Vec<T>> {
        self.iter().collect()
    }
}

impl<'a, T: FixedRecord> IntoIterator for &'_ RecordSeq<'a, T> {
    type Item = Result<T>;
    type IntoIter = RecordIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over a [`RecordSeq`]
pub struct RecordIter<'a, T: FixedRecord> {
    bytes: &'a [u8],
    index: usize,
    count: usize,
    _marker: PhantomData<T>,
}

impl<T: FixedRecord> Iterator for RecordIter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }

        let start = self.index * T::SIZE;
        self.index += 1;
        Some(T::decode(&self.bytes[start..start + T::SIZE]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.index;
        (remaining, Some(remaining))
    }
}

impl<T: FixedRecord> ExactSizeIterator for RecordIter<'_, T> {}

/// Encode `value` as UTF-16LE into a fixed field of `byte_len` bytes,
/// NUL-padded, the way the native component lays out its wide-string
/// arrays. Fails when the encoded text does not fit with its terminator.
pub fn put_utf16_fixed(buf: &mut impl BufMut, value: &str, byte_len: usize) -> Result<()> {
    debug_assert!(byte_len % 2 == 0);
    let max_units = byte_len / 2;
    let units: Vec<u16> = value.encode_utf16().collect();

    if units.len() >= max_units {
        return Err(RasError::InvalidParameter(format!(
            "String of {} UTF-16 units does not fit a {max_units} unit field",
            units.len()
        )));
    }

    for unit in &units {
        buf.put_u16_le(*unit);
    }
    for _ in units.len()..max_units {
        buf.put_u16_le(0);
    }
    Ok(())
}

/// Decode a fixed UTF-16LE field, stopping at the first NUL terminator
pub fn get_utf16_fixed(bytes: &[u8]) -> Result<String> {
    debug_assert!(bytes.len() % 2 == 0);
    let mut units = Vec::with_capacity(bytes.len() / 2);
    for chunk in bytes.chunks_exact(2) {
        let unit = u16::from_le_bytes([chunk[0], chunk[1]]);
        if unit == 0 {
            break;
        }
        units.push(unit);
    }

    String::from_utf16(&units)
        .map_err(|_| RasError::CorruptBuffer("Invalid UTF-16 in fixed string field".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::buffer::CountedCallParams;
    use crate::marshal::negotiate::{self, RetryPolicy};
    use crate::native::status::{ERROR_BUFFER_TOO_SMALL, SUCCESS};
    use bytes::BufMut;

    /// Minimal 40-byte record for exercising the decoder
    #[derive(Debug, Clone, PartialEq)]
    struct ProbeRecord {
        id: u32,
        payload: [u8; 36],
    }

    impl FixedRecord for ProbeRecord {
        const SIZE: usize = 40;

        fn decode(bytes: &[u8]) -> Result<Self> {
            let id = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let mut payload = [0u8; 36];
            payload.copy_from_slice(&bytes[4..40]);
            Ok(Self { id, payload })
        }
    }

    fn fill_records(params: &mut CountedCallParams, count: u32) {
        let mut out = params.as_mut_slice();
        for i in 0..count {
            out.put_u32_le(i + 1);
            out.put_slice(&[i as u8; 36]);
        }
        params.set_count(count);
        params.set_size(count as usize * ProbeRecord::SIZE);
    }

    #[test]
    fn test_decode_yields_exact_count_in_order() {
        let mut params = CountedCallParams::new();
        params.reset(120).expect("reset");
        fill_records(&mut params, 3);

        let seq = RecordSeq::<ProbeRecord>::from_params(&params).expect("seq");
        assert_eq!(seq.len(), 3);

        let records = seq.collect_all().expect("decode");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[1].id, 2);
        assert_eq!(records[2].id, 3);
        assert_eq!(records[2].payload[0], 2);
    }

    #[test]
    fn test_decode_is_restartable() {
        let mut params = CountedCallParams::new();
        params.reset(80).expect("reset");
        fill_records(&mut params, 2);

        let seq = RecordSeq::<ProbeRecord>::from_params(&params).expect("seq");
        let first: Vec<_> = seq.collect_all().expect("first pass");
        let second: Vec<_> = seq.collect_all().expect("second pass");
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_count_is_empty() {
        let mut params = CountedCallParams::new();
        params.reset(64).expect("reset");
        params.set_count(0);

        let seq = RecordSeq::<ProbeRecord>::from_params(&params).expect("seq");
        assert!(seq.is_empty());
        assert_eq!(seq.iter().count(), 0);
    }

    #[test]
    fn test_count_exceeding_buffer_is_corruption() {
        let mut params = CountedCallParams::new();
        params.reset(40).expect("reset");
        params.set_count(3);

        let result = RecordSeq::<ProbeRecord>::from_params(&params);
        assert!(matches!(result, Err(RasError::CorruptBuffer(_))));
    }

    /// Negotiated enumeration end to end: a simulated native op serving
    /// three 40-byte records, first with an adequate initial buffer, then
    /// from a 10-byte initial buffer that forces one reallocation.
    #[test]
    fn test_negotiated_enumeration_end_to_end() {
        let serve = |p: &mut CountedCallParams| -> u32 {
            let required = 3 * ProbeRecord::SIZE;
            if p.allocated_len() < required {
                p.set_size(required);
                return ERROR_BUFFER_TOO_SMALL;
            }
            let mut out = p.as_mut_slice();
            for i in 0..3u32 {
                out.put_u32_le(i + 10);
                out.put_slice(&[0u8; 36]);
            }
            p.set_count(3);
            p.set_size(required);
            SUCCESS
        };

        let mut params = CountedCallParams::new();
        let policy = RetryPolicy::default().with_initial_size(120);
        negotiate::run(&mut params, &policy, "ProbeEnum", serve).expect("negotiate");
        let direct = RecordSeq::<ProbeRecord>::from_params(&params)
            .expect("seq")
            .collect_all()
            .expect("decode");
        params.release();

        let mut params = CountedCallParams::new();
        let mut calls = 0;
        let policy = RetryPolicy::default().with_initial_size(10);
        negotiate::run(&mut params, &policy, "ProbeEnum", |p| {
            calls += 1;
            serve(p)
        })
        .expect("negotiate from undersized buffer");
        assert_eq!(calls, 2);
        assert_eq!(params.allocated_len(), 120);

        let renegotiated = RecordSeq::<ProbeRecord>::from_params(&params)
            .expect("seq")
            .collect_all()
            .expect("decode");
        params.release();

        assert_eq!(direct, renegotiated);
        assert_eq!(direct[0].id, 10);
        assert_eq!(direct[2].id, 12);
    }

    #[test]
    fn test_utf16_fixed_round_trip() {
        let mut buf = Vec::new();
        put_utf16_fixed(&mut buf, "VPN Office", 32).expect("encode");
        assert_eq!(buf.len(), 32);
        assert_eq!(get_utf16_fixed(&buf).expect("decode"), "VPN Office");
    }

    #[test]
    fn test_utf16_fixed_rejects_overflow() {
        let mut buf = Vec::new();
        let long = "x".repeat(16);
        // 16 units plus the terminator cannot fit 16 units.
        assert!(put_utf16_fixed(&mut buf, &long, 32).is_err());
    }

    #[test]
    fn test_utf16_fixed_non_ascii() {
        let mut buf = Vec::new();
        put_utf16_fixed(&mut buf, "Büro 東京", 64).expect("encode");
        assert_eq!(get_utf16_fixed(&buf).expect("decode"), "Büro 東京");
    }
}
