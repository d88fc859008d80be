//! Byte format of intermediate artifacts.
//!
//! ```text
//! +--------+-------------+---------------------------------------+
//! | "IFC1" | n: u64 (BE) | n x (key: i64 (BE), count: u64 (BE)) |
//! +--------+-------------+---------------------------------------+
//! ```
//!
//! Entries are written in ascending key order, so encoding the same table
//! twice yields the same bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::IntegerCount;

pub const MAGIC: &[u8; 4] = b"IFC1";

const HEADER_LEN: usize = MAGIC.len() + 8;
const ENTRY_LEN: usize = 16;

/// Serialize a table.
pub fn encode(table: &IntegerCount) -> Bytes {
    let entries = table.sorted();

    let mut buf = BytesMut::with_capacity(HEADER_LEN + entries.len() * ENTRY_LEN);
    buf.put_slice(MAGIC);
    buf.put_u64(entries.len() as u64);
    for (key, count) in entries {
        buf.put_i64(key);
        buf.put_u64(count);
    }
    buf.freeze()
}

/// Deserialize a table, rejecting anything [`encode`] would not produce.
///
/// The error is a human-readable reason; callers attach the path.
pub fn decode(mut buf: Bytes) -> Result<IntegerCount, String> {
    if buf.len() < HEADER_LEN {
        return Err(format!("truncated header ({} bytes)", buf.len()));
    }
    if &buf[..MAGIC.len()] != MAGIC {
        return Err("bad magic".to_owned());
    }
    buf.advance(MAGIC.len());

    let n = buf.get_u64();
    let expected = usize::try_from(n)
        .ok()
        .and_then(|n| n.checked_mul(ENTRY_LEN))
        .ok_or_else(|| format!("entry count {n} too large"))?;
    if buf.remaining() != expected {
        return Err(format!(
            "expected {} entry bytes for {} entries, found {}",
            expected,
            n,
            buf.remaining()
        ));
    }

    let mut table = IntegerCount::new();
    let mut previous: Option<i64> = None;
    while buf.has_remaining() {
        let key = buf.get_i64();
        let count = buf.get_u64();
        if previous.is_some_and(|p| p >= key) {
            return Err(format!("key {key} out of order"));
        }
        previous = Some(key);
        // Keys are strictly ascending, so this never collides.
        let _ = table.insert_new(key, count);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(i64, u64)]) -> IntegerCount {
        IntegerCount::from_pairs(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn encoding_is_canonical() {
        let a = table(&[(3, 1), (-2, 9), (i64::MIN, 4), (i64::MAX, u64::MAX)]);
        let b = table(&[(i64::MAX, u64::MAX), (i64::MIN, 4), (3, 1), (-2, 9)]);
        assert_eq!(encode(&a), encode(&b));

        let decoded = decode(encode(&a)).unwrap();
        assert_eq!(decoded, a);
    }

    #[test]
    fn empty_table() {
        let bytes = encode(&IntegerCount::new());
        assert_eq!(bytes.len(), HEADER_LEN);
        assert!(decode(bytes).unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(decode(Bytes::from_static(b"IFC")).is_err());
        assert!(decode(Bytes::from_static(b"XXXX\0\0\0\0\0\0\0\0")).is_err());

        let good = encode(&table(&[(1, 1), (2, 2)]));
        let truncated = good.slice(..good.len() - 1);
        assert!(decode(truncated).is_err());

        let mut trailing = BytesMut::from(&good[..]);
        trailing.put_u8(0);
        assert!(decode(trailing.freeze()).is_err());
    }

    #[test]
    fn rejects_unsorted_keys() {
        let mut buf = BytesMut::new();
        buf.put_slice(MAGIC);
        buf.put_u64(2);
        buf.put_i64(5);
        buf.put_u64(1);
        buf.put_i64(5);
        buf.put_u64(1);
        let err = decode(buf.freeze()).unwrap_err();
        assert!(err.contains("out of order"));
    }
}
