//! The backing buffer and its break cursor.
//!
//! An [`Arena`] is a fixed byte buffer split in two by the break cursor:
//! `[0, brk)` is claimed by blocks, `[brk, capacity)` is untouched. The
//! cursor only moves through [`Arena::sbrk`] (forward) and
//! [`Arena::retract`] (backward). Offsets handed out are relative to the
//! start of the buffer.

/// Fixed-size byte buffer with a break cursor.
pub(crate) struct Arena<B> {
    /// Backing storage. Never resized.
    buf: B,
    /// Boundary between claimed and unclaimed space.
    brk: u32,
    /// Largest value `brk` has reached.
    high_water: u32,
}

impl<B: AsRef<[u8]>> Arena<B> {
    /// Wrap `buf`. The caller has checked that its length fits in `u32`.
    pub(crate) fn new(buf: B) -> Self {
        Self {
            buf,
            brk: 0,
            high_water: 0,
        }
    }

    /// Total size of the buffer in bytes.
    pub(crate) fn capacity(&self) -> u32 {
        self.buf.as_ref().len() as u32
    }

    pub(crate) fn brk(&self) -> u32 {
        self.brk
    }

    pub(crate) fn high_water(&self) -> u32 {
        self.high_water
    }

    /// Bytes between the break cursor and the end of the buffer.
    pub(crate) fn unclaimed(&self) -> u32 {
        self.capacity() - self.brk
    }

    /// Read a little-endian word at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the buffer.
    pub(crate) fn read_u32(&self, offset: u32) -> u32 {
        let start = offset as usize;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.buf.as_ref()[start..start + 4]);
        u32::from_le_bytes(word)
    }

    /// Shared view of `len` bytes at `offset`.
    pub(crate) fn bytes(&self, offset: u32, len: u32) -> &[u8] {
        let start = offset as usize;
        &self.buf.as_ref()[start..start + len as usize]
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Arena<B> {
    /// Advance the break cursor by `increment` bytes.
    ///
    /// Returns the previous break (the start of the newly claimed region),
    /// or `None` without moving the cursor if the buffer cannot hold it.
    pub(crate) fn sbrk(&mut self, increment: u32) -> Option<u32> {
        let new_brk = self.brk.checked_add(increment)?;
        if new_brk > self.capacity() {
            return None;
        }
        let old = self.brk;
        self.brk = new_brk;
        self.high_water = self.high_water.max(new_brk);
        Some(old)
    }

    /// Move the break cursor back to `to`.
    pub(crate) fn retract(&mut self, to: u32) {
        debug_assert!(to <= self.brk, "retract past break: {to} > {}", self.brk);
        self.brk = to.min(self.brk);
    }

    /// Write a little-endian word at `offset`.
    pub(crate) fn write_u32(&mut self, offset: u32, value: u32) {
        let start = offset as usize;
        self.buf.as_mut()[start..start + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Mutable view of `len` bytes at `offset`.
    pub(crate) fn bytes_mut(&mut self, offset: u32, len: u32) -> &mut [u8] {
        let start = offset as usize;
        &mut self.buf.as_mut()[start..start + len as usize]
    }

    /// Zero `len` bytes at `offset`.
    pub(crate) fn wipe(&mut self, offset: u32, len: u32) {
        self.bytes_mut(offset, len).fill(0);
    }
}
