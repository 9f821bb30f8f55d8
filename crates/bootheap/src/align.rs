//! Size alignment.
//!
//! Every payload size is rounded up to a multiple of [`ALIGNMENT`]. Headers
//! are a multiple of the same unit, so rounding sizes is enough to keep every
//! header and payload offset aligned.

/// Alignment unit for payload sizes and offsets, in bytes.
pub const ALIGNMENT: u32 = 4;

/// Round `size` up to the next multiple of [`ALIGNMENT`].
///
/// Returns `None` when the rounded value does not fit in a `u32`.
///
/// ```
/// use bootheap::align::align_to_4;
///
/// assert_eq!(align_to_4(13), Some(16));
/// assert_eq!(align_to_4(16), Some(16));
/// assert_eq!(align_to_4(u32::MAX), None);
/// ```
pub fn align_to_4(size: u32) -> Option<u32> {
    size.checked_add(ALIGNMENT - 1).map(|s| s & !(ALIGNMENT - 1))
}

/// Whether `offset` is a multiple of [`ALIGNMENT`].
pub fn is_aligned(offset: u32) -> bool {
    offset & (ALIGNMENT - 1) == 0
}
