use std::collections::VecDeque;

/// Fixed-capacity byte buffer holding the most recent diagnostic output.
///
/// Backed by a `VecDeque<u8>`. Lines are stored newline-terminated; when a
/// new line does not fit, the oldest bytes are evicted first, so the content
/// is always a suffix of everything appended.
#[derive(Debug, Clone)]
pub struct DiagnosticTail {
    buf: VecDeque<u8>,
    capacity: usize,
}

impl DiagnosticTail {
    /// Create an empty tail holding at most `capacity` bytes (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one line, evicting the oldest bytes when at capacity.
    ///
    /// Empty lines are ignored. A line at least as long as the capacity
    /// replaces the whole content with its own trailing bytes.
    pub fn append_line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        let mut raw = line.as_bytes().to_vec();
        if !line.ends_with('\n') {
            raw.push(b'\n');
        }

        if raw.len() >= self.capacity {
            self.buf.clear();
            self.buf.extend(&raw[raw.len() - self.capacity..]);
            return;
        }

        let overflow = (self.buf.len() + raw.len()).saturating_sub(self.capacity);
        self.buf.drain(..overflow);
        self.buf.extend(raw);
    }

    /// Returns the content as text with surrounding whitespace trimmed.
    ///
    /// Eviction may cut a multi-byte character; such bytes are replaced.
    pub fn snapshot(&self) -> String {
        let (front, back) = self.buf.as_slices();
        let mut bytes = Vec::with_capacity(self.buf.len());
        bytes.extend_from_slice(front);
        bytes.extend_from_slice(back);
        String::from_utf8_lossy(&bytes).trim().to_string()
    }

    /// Number of bytes currently stored.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been retained.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Maximum number of bytes the tail can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
