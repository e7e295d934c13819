//! Variable-length integer codecs.
//!
//! Two encodings share the wire:
//!
//! - **CompactSize**: Bitcoin-style length prefix. Values below `0xfd` take one
//!   byte; larger values take a marker (`0xfd`, `0xfe`, `0xff`) followed by a
//!   2, 4 or 8 byte little-endian integer. Used for lengths, counts and
//!   ordinal types.
//!
//! - **VarInt**: 7 data bits per byte, most significant group first, high bit
//!   set on every byte except the last. Each continuation subtracts one before
//!   shifting, so every byte sequence maps to exactly one value and there is
//!   no redundant encoding. Unbounded, so fields derived from hashes decode
//!   into a [`BigUint`]. The `*_u64` variants produce identical bytes for
//!   fields that fit a machine word.

use bytes::BufMut;
use num_bigint::BigUint;
use num_traits::Zero;

use crate::errors::{ProtocolError, Result};

const CONTINUATION: u8 = 0x80;
const DATA_MASK: u8 = 0x7f;

/// Longest VarInt encoding of a `u64`.
pub const MAX_VARINT_U64_LEN: usize = 10;

/// Encoded size of `n` as a CompactSize.
pub const fn compact_size_len(n: u64) -> usize {
    if n < 0xfd {
        1
    } else if n <= 0xffff {
        3
    } else if n <= 0xffff_ffff {
        5
    } else {
        9
    }
}

/// Write `n` as a CompactSize.
pub fn put_compact_size(dst: &mut impl BufMut, n: u64) {
    if n < 0xfd {
        dst.put_u8(n as u8);
    } else if n <= 0xffff {
        dst.put_u8(0xfd);
        dst.put_u16_le(n as u16);
    } else if n <= 0xffff_ffff {
        dst.put_u8(0xfe);
        dst.put_u32_le(n as u32);
    } else {
        dst.put_u8(0xff);
        dst.put_u64_le(n);
    }
}

/// Read a CompactSize from the front of `src`.
///
/// Returns the value and the number of bytes consumed. Encodings that use a
/// wider marker than the value needs are rejected, so decoding and
/// re-encoding always reproduces the input.
pub fn get_compact_size(src: &[u8]) -> Result<(u64, usize)> {
    let first = *src.first().ok_or(ProtocolError::Truncated { needed: 1, available: 0 })?;

    let (value, consumed, floor) = match first {
        0xfd => (u64::from(u16::from_le_bytes(take::<2>(src, 1)?)), 3, 0xfd),
        0xfe => (u64::from(u32::from_le_bytes(take::<4>(src, 1)?)), 5, 0x1_0000),
        0xff => (u64::from_le_bytes(take::<8>(src, 1)?), 9, 0x1_0000_0000),
        b => return Ok((u64::from(b), 1)),
    };

    if value < floor {
        return Err(ProtocolError::NonCanonicalCompactSize(value));
    }

    Ok((value, consumed))
}

/// Encoded size of `n` as a VarInt.
pub fn varint_len(n: &BigUint) -> usize {
    let limit = BigUint::from(DATA_MASK);
    let mut n = n.clone();
    let mut len = 1;
    while n > limit {
        n = (n >> 7usize) - 1u32;
        len += 1;
    }
    len
}

/// Write `n` as a VarInt.
pub fn put_varint(dst: &mut impl BufMut, n: &BigUint) {
    let limit = BigUint::from(DATA_MASK);
    let mut n = n.clone();
    let mut groups = Vec::with_capacity(MAX_VARINT_U64_LEN);

    loop {
        let low = n.iter_u64_digits().next().unwrap_or(0) as u8 & DATA_MASK;
        groups.push(if groups.is_empty() { low } else { low | CONTINUATION });
        if n <= limit {
            break;
        }
        n = (n >> 7usize) - 1u32;
    }

    for byte in groups.iter().rev() {
        dst.put_u8(*byte);
    }
}

/// Read a VarInt from the front of `src`.
///
/// Returns the value and the number of bytes consumed.
pub fn get_varint(src: &[u8]) -> Result<(BigUint, usize)> {
    if src.is_empty() {
        return Err(ProtocolError::Truncated { needed: 1, available: 0 });
    }

    let mut n = BigUint::zero();
    for (i, &byte) in src.iter().enumerate() {
        n = (n << 7usize) | BigUint::from(byte & DATA_MASK);
        if byte & CONTINUATION == 0 {
            return Ok((n, i + 1));
        }
        n += 1u32;
    }

    Err(ProtocolError::MalformedVarInt)
}

/// Encoded size of `n` as a VarInt.
pub const fn varint_len_u64(mut n: u64) -> usize {
    let mut len = 1;
    while n > DATA_MASK as u64 {
        n = (n >> 7) - 1;
        len += 1;
    }
    len
}

/// Write `n` as a VarInt. Byte-identical to [`put_varint`].
pub fn put_varint_u64(dst: &mut impl BufMut, mut n: u64) {
    let mut groups = [0u8; MAX_VARINT_U64_LEN];
    let mut len = 0;

    loop {
        let low = (n as u8) & DATA_MASK;
        groups[len] = if len == 0 { low } else { low | CONTINUATION };
        len += 1;
        if n <= u64::from(DATA_MASK) {
            break;
        }
        n = (n >> 7) - 1;
    }

    for byte in groups[..len].iter().rev() {
        dst.put_u8(*byte);
    }
}

/// Read a VarInt that must fit in a `u64`.
///
/// `field` names the value in the overflow error.
pub fn get_varint_u64(src: &[u8], field: &'static str) -> Result<(u64, usize)> {
    if src.is_empty() {
        return Err(ProtocolError::Truncated { needed: 1, available: 0 });
    }

    let mut n: u64 = 0;
    for (i, &byte) in src.iter().enumerate() {
        if n > u64::MAX >> 7 {
            return Err(ProtocolError::ValueOverflow { field });
        }
        n = (n << 7) | u64::from(byte & DATA_MASK);
        if byte & CONTINUATION == 0 {
            return Ok((n, i + 1));
        }
        n = n.checked_add(1).ok_or(ProtocolError::ValueOverflow { field })?;
    }

    Err(ProtocolError::MalformedVarInt)
}

fn take<const N: usize>(src: &[u8], at: usize) -> Result<[u8; N]> {
    src.get(at..at + N)
        .and_then(|s| s.try_into().ok())
        .ok_or(ProtocolError::Truncated { needed: at + N, available: src.len() })
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;

    // Reference vectors shared with Bitcoin Core's VARINT serializer.
    const VARINT_VECTORS: &[(u64, &[u8])] = &[
        (0, &hex!("00")),
        (0x7f, &hex!("7f")),
        (0x80, &hex!("8000")),
        (0x1234, &hex!("a334")),
        (0xffff, &hex!("82fe7f")),
        (0x12_3456, &hex!("c7e756")),
        (0x8012_3456, &hex!("86ffc7e756")),
        (0xffff_ffff, &hex!("8efefefe7f")),
        (0x7fff_ffff_ffff_ffff, &hex!("fefefefefefefefe7f")),
        (u64::MAX, &hex!("80fefefefefefefefe7f")),
    ];

    fn compact(n: u64) -> Vec<u8> {
        let mut out = Vec::new();
        put_compact_size(&mut out, n);
        out
    }

    #[test]
    fn compact_size_boundaries() {
        assert_eq!(compact(0xfc), hex!("fc"));
        assert_eq!(compact(0xfd), hex!("fdfd00"));
        assert_eq!(compact(0xffff), hex!("fdffff"));
        assert_eq!(compact(0x1_0000), hex!("fe00000100"));
        assert_eq!(compact(0xffff_ffff), hex!("feffffffff"));
        assert_eq!(compact(0x1_0000_0000), hex!("ff0000000001000000"));
    }

    #[test]
    fn compact_size_rejects_non_canonical() {
        assert_eq!(
            get_compact_size(&hex!("fd1000")),
            Err(ProtocolError::NonCanonicalCompactSize(0x10))
        );
        assert_eq!(
            get_compact_size(&hex!("feffff0000")),
            Err(ProtocolError::NonCanonicalCompactSize(0xffff))
        );
    }

    #[test]
    fn compact_size_truncated() {
        assert!(matches!(get_compact_size(&[]), Err(ProtocolError::Truncated { .. })));
        assert!(matches!(get_compact_size(&hex!("fe0100")), Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn varint_reference_vectors() {
        for (value, encoded) in VARINT_VECTORS {
            let mut out = Vec::new();
            put_varint_u64(&mut out, *value);
            assert_eq!(&out[..], *encoded, "u64 encode of {value:#x}");

            let mut big = Vec::new();
            put_varint(&mut big, &BigUint::from(*value));
            assert_eq!(&big[..], *encoded, "bignum encode of {value:#x}");

            assert_eq!(varint_len_u64(*value), encoded.len());
            assert_eq!(varint_len(&BigUint::from(*value)), encoded.len());
            assert_eq!(get_varint_u64(encoded, "test"), Ok((*value, encoded.len())));
        }
    }

    #[test]
    fn varint_beyond_u64() {
        let value = BigUint::from(u128::MAX);
        let mut out = Vec::new();
        put_varint(&mut out, &value);
        assert_eq!(out.len(), varint_len(&value));

        let (decoded, used) = get_varint(&out).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(used, out.len());

        assert_eq!(get_varint_u64(&out, "hashType"), Err(ProtocolError::ValueOverflow {
            field: "hashType"
        }));
    }

    #[test]
    fn varint_dangling_continuation() {
        assert_eq!(get_varint(&hex!("8080")), Err(ProtocolError::MalformedVarInt));
        assert_eq!(get_varint_u64(&hex!("ff"), "flags"), Err(ProtocolError::MalformedVarInt));
    }

    proptest! {
        #[test]
        fn compact_size_round_trip(n in any::<u64>()) {
            let bytes = compact(n);
            prop_assert_eq!(bytes.len(), compact_size_len(n));
            prop_assert_eq!(get_compact_size(&bytes), Ok((n, bytes.len())));
        }

        #[test]
        fn varint_bignum_round_trip(digits in prop::collection::vec(any::<u32>(), 0..8)) {
            let n = BigUint::new(digits);
            let mut bytes = Vec::new();
            put_varint(&mut bytes, &n);
            prop_assert_eq!(bytes.len(), varint_len(&n));
            let (decoded, used) = get_varint(&bytes).unwrap();
            prop_assert_eq!(decoded, n);
            prop_assert_eq!(used, bytes.len());
        }
    }
}
