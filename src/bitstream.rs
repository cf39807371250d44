//! Bit-granular cursors over caller-owned byte buffers.
//!
//! Bits are written and read most-significant first. Both cursors start at a byte
//! offset so callers can reserve room for a transport header in front of the EXI
//! payload; [`BitWriter::len`] and [`BitReader::len`] count from that offset.

use crate::codec::CodecError;

/// Bit position of byte `data_offset`, saturating so an absurd offset simply
/// lies past every buffer.
fn start_bit(data_offset: usize) -> usize {
    data_offset.checked_mul(8).unwrap_or(usize::MAX)
}

/// Whether `width` more bits fit after `bit_pos` in a buffer of `len` bytes.
fn fits(len: usize, bit_pos: usize, width: u32) -> bool {
    let capacity = len.saturating_mul(8);
    bit_pos <= capacity && width as usize <= capacity - bit_pos
}

/// Write cursor. Every bit it passes over is written explicitly, so a dirty buffer
/// still yields the exact stream and the padding of the last byte is zero.
#[derive(Debug)]
pub struct BitWriter<'a> {
    buf: &'a mut [u8],
    start_bit: usize,
    bit_pos: usize,
}

impl<'a> BitWriter<'a> {
    /// Start writing at byte `data_offset` of `buf`. An offset past the buffer
    /// yields a cursor on which every write fails.
    pub fn new(buf: &'a mut [u8], data_offset: usize) -> Self {
        let start_bit = start_bit(data_offset);
        BitWriter {
            buf,
            start_bit,
            bit_pos: start_bit,
        }
    }

    /// Write the low `width` bits of `value`. Fails without moving the cursor if
    /// the bits do not fit in the buffer.
    pub fn write_bits(&mut self, width: u32, value: u64) -> Result<(), CodecError> {
        debug_assert!(width <= 64);
        if width == 0 {
            return Ok(());
        }
        if !fits(self.buf.len(), self.bit_pos, width) {
            return Err(CodecError::BufferOverflow);
        }
        for shift in (0..width).rev() {
            let bit = (value >> shift) & 1;
            let byte = self.bit_pos / 8;
            let mask = 0x80u8 >> (self.bit_pos % 8);
            if bit == 1 {
                self.buf[byte] |= mask;
            } else {
                self.buf[byte] &= !mask;
            }
            self.bit_pos += 1;
        }
        // Bits following the cursor in the current byte are padding until written.
        if self.bit_pos % 8 != 0 {
            let byte = self.bit_pos / 8;
            self.buf[byte] &= !(0xFFu8 >> (self.bit_pos % 8));
        }
        Ok(())
    }

    pub fn write_bit(&mut self, bit: bool) -> Result<(), CodecError> {
        self.write_bits(1, bit as u64)
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), CodecError> {
        self.write_bits(8, byte as u64)
    }

    /// Absolute bit position in the buffer.
    pub fn position(&self) -> usize {
        self.bit_pos
    }

    /// Bytes written since the data offset, counting a partial byte as whole.
    pub fn len(&self) -> usize {
        (self.bit_pos - self.start_bit).div_ceil(8)
    }

    pub fn is_empty(&self) -> bool {
        self.bit_pos == self.start_bit
    }
}

/// Read cursor, the mirror of [`BitWriter`].
#[derive(Debug)]
pub struct BitReader<'a> {
    buf: &'a [u8],
    start_bit: usize,
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(buf: &'a [u8], data_offset: usize) -> Self {
        let start_bit = start_bit(data_offset);
        BitReader {
            buf,
            start_bit,
            bit_pos: start_bit,
        }
    }

    pub fn read_bits(&mut self, width: u32) -> Result<u64, CodecError> {
        debug_assert!(width <= 64);
        if !fits(self.buf.len(), self.bit_pos, width) {
            return Err(CodecError::BufferOverflow);
        }
        let mut value = 0u64;
        for _ in 0..width {
            let byte = self.buf[self.bit_pos / 8];
            let bit = (byte >> (7 - self.bit_pos % 8)) & 1;
            value = (value << 1) | bit as u64;
            self.bit_pos += 1;
        }
        Ok(value)
    }

    pub fn read_bit(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_bits(1)? == 1)
    }

    pub fn read_byte(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_bits(8)? as u8)
    }

    pub fn position(&self) -> usize {
        self.bit_pos
    }

    pub fn len(&self) -> usize {
        (self.bit_pos - self.start_bit).div_ceil(8)
    }

    pub fn is_empty(&self) -> bool {
        self.bit_pos == self.start_bit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_msb_first() {
        let mut buf = [0u8; 2];
        let mut w = BitWriter::new(&mut buf, 0);
        w.write_bits(2, 0b10).unwrap();
        w.write_bits(6, 0b100011).unwrap();
        w.write_bits(3, 0b101).unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(buf, [0b1010_0011, 0b1010_0000]);
    }

    #[test]
    fn clears_dirty_buffer() {
        let mut buf = [0xFFu8; 1];
        let mut w = BitWriter::new(&mut buf, 0);
        w.write_bits(3, 0b010).unwrap();
        assert_eq!(buf[0], 0b0100_0000);
    }

    #[test]
    fn offset_is_excluded_from_len() {
        let mut buf = [0xAAu8; 10];
        let mut w = BitWriter::new(&mut buf, 8);
        assert!(w.is_empty());
        w.write_bit(true).unwrap();
        assert_eq!(w.len(), 1);
        assert_eq!(w.position(), 65);
        assert_eq!(buf[..8], [0xAA; 8]);
        assert_eq!(buf[8], 0x80);
    }

    #[test]
    fn overflow_leaves_cursor() {
        let mut buf = [0u8; 1];
        let mut w = BitWriter::new(&mut buf, 0);
        w.write_bits(5, 0).unwrap();
        assert!(matches!(w.write_bits(4, 0), Err(CodecError::BufferOverflow)));
        assert_eq!(w.position(), 5);

        let data = [0x12u8];
        let mut r = BitReader::new(&data, 0);
        r.read_bits(4).unwrap();
        assert!(matches!(r.read_bits(5), Err(CodecError::BufferOverflow)));
        assert_eq!(r.read_bits(4).unwrap(), 0x2);
    }

    #[test]
    fn huge_offset_fails_every_access() {
        let mut buf = [0u8; 4];
        let mut w = BitWriter::new(&mut buf, usize::MAX / 8);
        assert!(w.is_empty());
        assert!(matches!(w.write_bit(true), Err(CodecError::BufferOverflow)));
        assert_eq!(w.len(), 0);

        let data = [0xFFu8; 4];
        let mut r = BitReader::new(&data, usize::MAX);
        assert!(matches!(r.read_bits(1), Err(CodecError::BufferOverflow)));
        assert!(matches!(r.read_bits(0), Err(CodecError::BufferOverflow)));
    }

    #[test]
    fn reads_across_bytes() {
        let data = [0x00, 0xEB, 0xAB];
        let mut r = BitReader::new(&data, 0);
        assert_eq!(r.read_bits(2).unwrap(), 0);
        assert_eq!(r.read_bits(3).unwrap(), 0);
        assert_eq!(r.read_bits(8).unwrap(), 0x1D);
        assert_eq!(r.len(), 2);
        assert!(r.read_bits(64).is_err());
    }
}
