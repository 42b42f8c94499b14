//! Row value tagging for sketch hashing.

use rusqlite::functions::Context;
use rusqlite::types::ValueRef;

/// One SQL argument, tagged by storage class.
///
/// The tag takes part in hashing, so `1`, `1.0`, `'1'` and `X'31'` are
/// distinct elements. Variant order and payload types fix the hash of every
/// stored sketch; `Null` is never hashed but keeps its discriminant slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowValue<'a> {
    Null,
    Int(i64),
    /// Bit pattern of the double; `f64` itself is not `Hash`.
    Float(u64),
    Text(&'a str),
    Blob(&'a [u8]),
    /// TEXT that is not valid UTF-8.
    RawText(&'a [u8]),
}

impl<'a> RowValue<'a> {
    /// Returns `None` for SQL NULL.
    pub fn from_value_ref(value: ValueRef<'a>) -> Option<Self> {
        match value {
            ValueRef::Null => None,
            ValueRef::Integer(v) => Some(Self::Int(v)),
            ValueRef::Real(v) => Some(Self::Float(v.to_bits())),
            ValueRef::Text(v) => Some(match std::str::from_utf8(v) {
                Ok(text) => Self::Text(text),
                Err(_) => Self::RawText(v),
            }),
            ValueRef::Blob(v) => Some(Self::Blob(v)),
        }
    }
}

/// Collects the non-NULL arguments of `ctx` starting at `first`, in order.
///
/// An all-NULL row yields an empty tuple, which still hashes to one element.
pub fn row_values<'a>(ctx: &'a Context<'_>, first: usize) -> Vec<RowValue<'a>> {
    (first..ctx.len())
        .filter_map(|idx| RowValue::from_value_ref(ctx.get_raw(idx)))
        .collect()
}
