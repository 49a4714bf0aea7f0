//! Binary content detection.

use std::fmt;

/// Number of leading bytes inspected by [`NulByteDetector`].
pub const DEFAULT_BINARY_SAMPLE_SIZE: usize = 8000;

/// Decides whether a byte buffer should be treated as binary data.
pub trait BinaryDetector: fmt::Debug + Send + Sync {
    /// True if `content` looks like binary data.
    fn is_binary(&self, content: &[u8]) -> bool;
}

/// Treats content as binary when its leading sample contains a NUL byte,
/// unless the sample starts with a UTF-16 or UTF-32 byte-order mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NulByteDetector {
    sample_size: usize,
}

impl NulByteDetector {
    /// Detector that inspects the first `sample_size` bytes.
    #[must_use]
    pub fn new(sample_size: usize) -> Self {
        Self { sample_size }
    }

    /// Number of bytes inspected.
    #[must_use]
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }
}

impl Default for NulByteDetector {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY_SAMPLE_SIZE)
    }
}

impl BinaryDetector for NulByteDetector {
    fn is_binary(&self, content: &[u8]) -> bool {
        let sample = &content[..content.len().min(self.sample_size)];
        if sample.is_empty() || has_wide_bom(sample) {
            return false;
        }
        sample.contains(&0)
    }
}

/// UTF-32 marks are checked first since the UTF-32 LE mark begins with the
/// UTF-16 LE one.
fn has_wide_bom(sample: &[u8]) -> bool {
    const UTF32_LE: &[u8] = &[0xFF, 0xFE, 0x00, 0x00];
    const UTF32_BE: &[u8] = &[0x00, 0x00, 0xFE, 0xFF];
    const UTF16_LE: &[u8] = &[0xFF, 0xFE];
    const UTF16_BE: &[u8] = &[0xFE, 0xFF];

    [UTF32_LE, UTF32_BE, UTF16_LE, UTF16_BE]
        .iter()
        .any(|bom| sample.starts_with(bom))
}
