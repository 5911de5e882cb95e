//! Verbose hex rendering of byte payloads for trace logs.

use std::fmt;

const BYTES_PER_LINE: usize = 16;

/// Bytes rendered past this point are summarized instead of dumped.
pub const DEFAULT_LIMIT: usize = 4096;

/// Lazily formatted hex dump: offset, hex pairs and printable ASCII per 16-byte line.
///
/// Formatting only happens when the value is displayed, so passing one to a disabled
/// `tracing` event costs nothing.
#[derive(Clone, Copy, Debug)]
pub struct HexDump<'a> {
    bytes: &'a [u8],
    limit: usize,
}

impl<'a> HexDump<'a> {
    /// Dump up to [`DEFAULT_LIMIT`] bytes.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_limit(bytes, DEFAULT_LIMIT)
    }

    /// Dump up to `limit` bytes.
    pub fn with_limit(bytes: &'a [u8], limit: usize) -> Self {
        Self { bytes, limit }
    }
}

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.bytes[..self.bytes.len().min(self.limit)];
        for (index, line) in shown.chunks(BYTES_PER_LINE).enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{:08x} ", index * BYTES_PER_LINE)?;

            let encoded = hex::encode(line);
            for i in 0..line.len() {
                write!(f, " {}", &encoded[2 * i..2 * i + 2])?;
            }
            for _ in line.len()..BYTES_PER_LINE {
                f.write_str("   ")?;
            }

            f.write_str("  |")?;
            for &byte in line {
                let c = if byte.is_ascii_graphic() || byte == b' ' {
                    byte as char
                } else {
                    '.'
                };
                write!(f, "{c}")?;
            }
            f.write_str("|")?;
        }
        let hidden = self.bytes.len() - shown.len();
        if hidden > 0 {
            write!(f, "\n... ({hidden} more bytes)")?;
        }
        Ok(())
    }
}
