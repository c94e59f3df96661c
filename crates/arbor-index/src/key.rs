//! Key and value codecs and the key comparator.
//!
//! Keys and values are fixed-width `Copy` types encoded little-endian into
//! page slots. Ordering is decided solely by the injected comparator, never
//! by the encoded bytes.

use std::cmp::Ordering;

/// A fixed-width index key.
pub trait IndexKey: Copy + std::fmt::Debug + Send + Sync + 'static {
    /// Encoded size in bytes.
    const ENCODED_LEN: usize;

    /// Writes the key into `buf`, which is exactly `ENCODED_LEN` bytes.
    fn encode(&self, buf: &mut [u8]);

    /// Reads a key from `buf`, which is exactly `ENCODED_LEN` bytes.
    fn decode(buf: &[u8]) -> Self;
}

/// A fixed-width index value, typically a record identifier.
pub trait IndexValue: Copy + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// Encoded size in bytes.
    const ENCODED_LEN: usize;

    /// Writes the value into `buf`, which is exactly `ENCODED_LEN` bytes.
    fn encode(&self, buf: &mut [u8]);

    /// Reads a value from `buf`, which is exactly `ENCODED_LEN` bytes.
    fn decode(buf: &[u8]) -> Self;
}

macro_rules! impl_int_codec {
    ($($ty:ty),*) => {
        $(
            impl IndexKey for $ty {
                const ENCODED_LEN: usize = std::mem::size_of::<$ty>();

                fn encode(&self, buf: &mut [u8]) {
                    buf.copy_from_slice(&self.to_le_bytes());
                }

                fn decode(buf: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(buf);
                    <$ty>::from_le_bytes(raw)
                }
            }

            impl IndexValue for $ty {
                const ENCODED_LEN: usize = std::mem::size_of::<$ty>();

                fn encode(&self, buf: &mut [u8]) {
                    buf.copy_from_slice(&self.to_le_bytes());
                }

                fn decode(buf: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(buf);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_int_codec!(i64, u64, u32, i32);

/// Identifier of a record in an external heap file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    /// Heap page number.
    pub page_num: u32,
    /// Slot within the heap page.
    pub slot: u32,
}

impl RecordId {
    /// Creates a new record identifier.
    pub fn new(page_num: u32, slot: u32) -> Self {
        Self { page_num, slot }
    }
}

impl From<i64> for RecordId {
    /// Unpacks a 64-bit integer: high 32 bits page number, low 32 bits slot.
    fn from(raw: i64) -> Self {
        Self {
            page_num: (raw >> 32) as u32,
            slot: raw as u32,
        }
    }
}

impl IndexValue for RecordId {
    const ENCODED_LEN: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.page_num.to_le_bytes());
        buf[4..8].copy_from_slice(&self.slot.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        let page_num = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let slot = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Self { page_num, slot }
    }
}

/// Three-valued total order over keys.
///
/// Must be deterministic and stable; the tree consults nothing else when
/// ordering keys. Injected at tree construction and monomorphized into the
/// hot path.
pub trait KeyComparator<K>: Send + Sync {
    /// Compares two keys.
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering;
}

/// Comparator delegating to the key's natural `Ord`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrdComparator;

impl<K: Ord> KeyComparator<K> for OrdComparator {
    #[inline]
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering {
        lhs.cmp(rhs)
    }
}
