//! Fixed-capacity line buffer.
//!
//! Holds one line of bytes while the comm layer assembles it, and one
//! line of scratch while the shell examines it. Zero heap use.

/// Fixed byte buffer with a running length.
pub struct LineBuffer<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> LineBuffer<N> {
    pub const fn new() -> Self {
        Self { buf: [0u8; N], len: 0 }
    }

    /// Append a byte. Silently ignored when full (overflow is detected
    /// by the caller via [`is_full`](Self::is_full) before flushing).
    #[inline]
    pub fn push(&mut self, byte: u8) {
        if self.len < N {
            self.buf[self.len] = byte;
            self.len += 1;
        }
    }

    /// Drop the last byte (backspace handling).
    #[inline]
    pub fn trim_last(&mut self) {
        if self.len > 0 {
            self.len -= 1;
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Replace contents, truncating to capacity.
    pub fn set(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(N);
        self.buf[..n].copy_from_slice(&bytes[..n]);
        self.len = n;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Set the valid length directly (after an external read filled the
    /// storage). Clamped to capacity.
    #[inline]
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(N);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Raw backing storage, full capacity. Used as an external-read
    /// destination; pair with [`set_len`](Self::set_len).
    #[inline]
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(self.as_bytes()).unwrap_or("")
    }

    /// Whole-buffer comparison against a string, NUL terminator ignored.
    pub fn equals(&self, s: &str) -> bool {
        self.effective() == s.as_bytes()
    }

    pub fn starts_with(&self, s: &str) -> bool {
        self.effective().starts_with(s.as_bytes())
    }

    pub fn contains(&self, s: &str) -> bool {
        if s.is_empty() {
            return true;
        }
        self.effective()
            .windows(s.len())
            .any(|w| w == s.as_bytes())
    }

    /// Line content without a trailing NUL (terminated lines carry
    /// one).
    pub fn effective(&self) -> &[u8] {
        let bytes = self.as_bytes();
        match bytes.last() {
            Some(0) => &bytes[..bytes.len() - 1],
            _ => bytes,
        }
    }
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_trim() {
        let mut buf: LineBuffer<8> = LineBuffer::new();

        buf.push(b'a');
        buf.push(b'b');
        buf.push(b'c');
        buf.trim_last();

        assert_eq!(buf.as_bytes(), b"ab");
    }

    #[test]
    fn test_trim_empty_is_noop() {
        let mut buf: LineBuffer<8> = LineBuffer::new();
        buf.trim_last();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_push_past_capacity_ignored() {
        let mut buf: LineBuffer<2> = LineBuffer::new();

        buf.push(b'x');
        buf.push(b'y');
        buf.push(b'z');

        assert!(buf.is_full());
        assert_eq!(buf.as_bytes(), b"xy");
    }

    #[test]
    fn test_parse_helpers() {
        let mut buf: LineBuffer<32> = LineBuffer::new();
        buf.set(b"sram write 100");

        assert!(buf.equals("sram write 100"));
        assert!(buf.starts_with("sram"));
        assert!(buf.contains("write"));
        assert!(!buf.contains("read"));
        assert!(!buf.equals("sram"));
    }

    #[test]
    fn test_helpers_ignore_forced_nul() {
        let mut buf: LineBuffer<8> = LineBuffer::new();
        buf.set(b"stat\0");

        assert!(buf.equals("stat"));
        assert!(buf.starts_with("st"));
    }
}
