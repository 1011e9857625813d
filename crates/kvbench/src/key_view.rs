//! Zero-copy byte views over string keys.
//!
//! Several backends take `&[u8]` keys. Lookups driven from [`crate::Entry`]
//! keys must not allocate or copy, otherwise the allocation counters would
//! measure the harness instead of the backend.

/// View `key` as bytes.
///
/// The returned slice aliases the string's own storage: same address, same
/// length, no allocation. It is read-only and cannot outlive `key`; the borrow
/// checker enforces both, so no `unsafe` reinterpretation is needed.
#[inline(always)]
pub fn view_bytes(key: &str) -> &[u8] {
    key.as_bytes()
}
