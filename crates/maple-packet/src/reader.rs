//! Bounds-checked cursor over received frame bytes.

use maple_errors::CodecError;

/// Borrowing cursor that reads bytes and big-endian words from a frame.
///
/// Running past the end yields [`CodecError::Framing`] naming the length the
/// read would have needed.
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> FrameReader<'a> {
    /// Start reading at the first byte of `buffer`.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Current offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Read `N` bytes.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let end = self.position.saturating_add(N);
        let bytes = self
            .buffer
            .get(self.position..end)
            .ok_or(CodecError::Framing {
                expected: end,
                actual: self.buffer.len(),
            })?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.position = end;
        Ok(out)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        let [b] = self.read_array::<1>()?;
        Ok(b)
    }

    /// Read a big-endian 32-bit word.
    pub fn read_u32_be(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.read_array::<4>()?))
    }

    /// Borrow the next `count` bytes.
    pub fn read_slice(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        let end = self.position.saturating_add(count);
        let bytes = self
            .buffer
            .get(self.position..end)
            .ok_or(CodecError::Framing {
                expected: end,
                actual: self.buffer.len(),
            })?;
        self.position = end;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_in_order() {
        let data = [0x08, 0x12, 0x34, 0x56, 0x78, 0xAA];
        let mut reader = FrameReader::new(&data);
        assert_eq!(reader.read_u8(), Ok(0x08));
        assert_eq!(reader.read_u32_be(), Ok(0x1234_5678));
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.position(), 5);
    }

    #[test]
    fn test_overrun_reports_required_length() {
        let data = [0x01, 0x02];
        let mut reader = FrameReader::new(&data);
        assert_eq!(
            reader.read_u32_be(),
            Err(CodecError::Framing {
                expected: 4,
                actual: 2
            })
        );
        // a failed read does not advance
        assert_eq!(reader.read_slice(2), Ok(&data[..]));
    }
}
