//! Reassembles complete lines from an arbitrarily chunked output stream.
//!
//! Accepted terminators are `\n`, `\r\n` and a bare `\r`. A `\r` that ends the
//! buffered text is held back until the next chunk shows whether a `\n`
//! follows it, so splitting the same text differently never changes the
//! resulting lines.

/// Replacement used for byte sequences that are not valid UTF-8.
const REPLACEMENT: &str = "\u{FFFD}";

#[derive(Debug, Default)]
pub struct LineAssembler {
    /// Text received but not yet emitted as a line.
    buffer: String,
    /// Offset in `buffer` up to which no terminator exists.
    scanned: usize,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending_bytes: Vec<u8>,
    lossy_utf8: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every line completed by it, terminators
    /// stripped.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        self.drain_complete_lines()
    }

    /// Byte variant of [`LineAssembler::feed`]. A multi-byte character split
    /// across two chunks is decoded once both halves have arrived.
    pub fn feed_bytes(&mut self, data: &[u8]) -> Vec<String> {
        self.pending_bytes.extend_from_slice(data);
        let mut bytes = std::mem::take(&mut self.pending_bytes);
        let mut start = 0;
        loop {
            match std::str::from_utf8(&bytes[start..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    break;
                }
                Err(err) => {
                    let valid_end = start + err.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&bytes[start..valid_end]) {
                        self.buffer.push_str(text);
                    }
                    match err.error_len() {
                        Some(invalid) => {
                            self.lossy_utf8 = true;
                            self.buffer.push_str(REPLACEMENT);
                            start = valid_end + invalid;
                        }
                        None => {
                            // Incomplete sequence at the end: keep it for the next chunk.
                            bytes.drain(..valid_end);
                            self.pending_bytes = bytes;
                            break;
                        }
                    }
                }
            }
        }
        self.drain_complete_lines()
    }

    /// Ends the stream, returning the unterminated trailing fragment if any.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending_bytes.is_empty() {
            self.lossy_utf8 = true;
            self.pending_bytes.clear();
            self.buffer.push_str(REPLACEMENT);
        }
        self.scanned = 0;
        let mut rest = std::mem::take(&mut self.buffer);
        if rest.ends_with('\r') {
            rest.pop();
            return Some(rest);
        }
        if rest.is_empty() { None } else { Some(rest) }
    }

    /// The buffered fragment that has not been terminated yet.
    pub fn partial(&self) -> &str {
        &self.buffer
    }

    pub fn has_lossy_utf8(&self) -> bool {
        self.lossy_utf8
    }

    fn drain_complete_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        let bytes = self.buffer.as_bytes();
        let mut line_start = 0;
        let mut idx = self.scanned;
        while idx < bytes.len() {
            match bytes[idx] {
                b'\n' => {
                    lines.push(self.buffer[line_start..idx].to_string());
                    idx += 1;
                    line_start = idx;
                }
                b'\r' => {
                    let Some(&next) = bytes.get(idx + 1) else {
                        break;
                    };
                    lines.push(self.buffer[line_start..idx].to_string());
                    idx += if next == b'\n' { 2 } else { 1 };
                    line_start = idx;
                }
                _ => idx += 1,
            }
        }
        self.buffer.drain(..line_start);
        self.scanned = idx - line_start;
        lines
    }
}
