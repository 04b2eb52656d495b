//! Packed cross-references: `(40-bit table index, 24-bit entry index)`.
//!
//! Bit layout matches `examples/original_source/eden/TableEntry.h` exactly:
//! `table_id << 24 | entry_id % (1 << 24)`. The entry id is truncated by
//! modulo, not bounds-checked, mirroring the original's behavior so that the
//! encoding is bit-for-bit compatible with values that cross the wire or are
//! embedded in generated C.

const ENTRY_BITS: u32 = 24;
const ENTRY_MASK: u64 = (1u64 << ENTRY_BITS) - 1;

/// A packed reference into a table family: `(table, entry)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedRef {
    /// Table index (high 40 bits).
    pub table: u64,
    /// Entry index within that table (low 24 bits).
    pub entry: u64,
}

impl PackedRef {
    /// Construct a packed reference from its parts.
    pub const fn new(table: u64, entry: u64) -> Self {
        Self { table, entry }
    }

    /// Encode into the 64-bit wire representation.
    pub const fn encode(self) -> u64 {
        (self.table << ENTRY_BITS) | (self.entry & ENTRY_MASK)
    }

    /// Decode a 64-bit wire value into its `(table, entry)` parts.
    pub const fn decode(packed: u64) -> Self {
        Self { table: packed >> ENTRY_BITS, entry: packed & ENTRY_MASK }
    }
}

impl From<PackedRef> for u64 {
    fn from(r: PackedRef) -> Self {
        r.encode()
    }
}

impl From<u64> for PackedRef {
    fn from(v: u64) -> Self {
        PackedRef::decode(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let r = PackedRef::new(12, 34);
        let enc = r.encode();
        assert_eq!(PackedRef::decode(enc), r);
    }

    #[test]
    fn matches_original_bit_layout() {
        // table_id = idx * (1<<24), entry_id = entry % (1<<24), from TableEntry.h
        let table: u64 = 5;
        let entry: u64 = 100;
        let expected = (table << 24) | (entry % (1 << 24));
        assert_eq!(PackedRef::new(table, entry).encode(), expected);
    }

    #[test]
    fn entry_truncates_on_overflow() {
        let big_entry = (1u64 << 24) + 7;
        let r = PackedRef::new(1, big_entry);
        let decoded = PackedRef::decode(r.encode());
        assert_eq!(decoded.entry, 7);
    }

    #[test]
    fn zero_roundtrips() {
        let r = PackedRef::new(0, 0);
        assert_eq!(PackedRef::decode(r.encode()), r);
    }
}
