// Copyright (c) the Camraw Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt::Debug;

use crate::error::Error;
use byteorder::{BigEndian, ByteOrder};

/// Reads bits from a sequence of bytes, most significant bit first.
///
/// The cached bits live in the top of `bit_buf`; bits below the valid
/// region duplicate bytes that `data` still points at, so refilling may
/// re-or the same values without corrupting the stream.
#[derive(Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_buf: u64,
    bits_in_buf: usize,
    total_bits_read: usize,
}

impl Debug for BitReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let visible = if self.bits_in_buf == 0 {
            0
        } else {
            self.bit_buf >> (64 - self.bits_in_buf)
        };
        write!(
            f,
            "BitReader{{ data: [{} bytes], bit_buf: {:0width$b}, total_bits_read: {} }}",
            self.data.len(),
            visible,
            self.total_bits_read,
            width = self.bits_in_buf
        )
    }
}

pub const MAX_BITS_PER_CALL: usize = 56;

impl<'a> BitReader<'a> {
    /// Constructs a BitReader for a given range of data.
    pub fn new(data: &[u8]) -> BitReader {
        BitReader {
            data,
            bit_buf: 0,
            bits_in_buf: 0,
            total_bits_read: 0,
        }
    }

    /// Reads `num` bits from the buffer without consuming them.
    pub fn peek(&mut self, num: usize) -> Result<u64, Error> {
        debug_assert!(num <= MAX_BITS_PER_CALL);
        if num == 0 {
            return Ok(0);
        }
        self.refill();
        if self.bits_in_buf < num {
            return Err(Error::TruncatedStream(num, self.bits_in_buf));
        }
        Ok(self.bit_buf >> (64 - num))
    }

    /// Advances by `num` bits. Similar to `skip_bits`, but bits must be in the buffer.
    pub fn consume(&mut self, num: usize) -> Result<(), Error> {
        if self.bits_in_buf < num {
            return Err(Error::TruncatedStream(num, self.bits_in_buf));
        }
        self.bit_buf <<= num;
        self.bits_in_buf -= num;
        self.total_bits_read += num;
        Ok(())
    }

    /// Reads `num` bits from the buffer.
    /// ```
    /// # use camraw::bit_reader::BitReader;
    /// let mut br = BitReader::new(&[0b1011_0001, 1]);
    /// assert_eq!(br.read(1)?, 1);
    /// assert_eq!(br.read(3)?, 0b011);
    /// assert_eq!(br.read(4)?, 1);
    /// assert_eq!(br.read(8)?, 1);
    /// assert_eq!(br.total_bits_read(), 16);
    /// assert!(br.read(1).is_err());
    /// # Ok::<(), camraw::error::Error>(())
    /// ```
    pub fn read(&mut self, num: usize) -> Result<u64, Error> {
        let ret = self.peek(num)?;
        self.consume(num)?;
        Ok(ret)
    }

    /// Returns the total number of bits that have been read or skipped.
    pub fn total_bits_read(&self) -> usize {
        self.total_bits_read
    }

    /// Returns the total number of bits that can still be read or skipped.
    pub fn total_bits_available(&self) -> usize {
        self.data.len() * 8 + self.bits_in_buf
    }

    /// Skips `num` bits.
    /// ```
    /// # use camraw::bit_reader::BitReader;
    /// let mut br = BitReader::new(&[0, 1]);
    /// assert_eq!(br.read(8)?, 0);
    /// br.skip_bits(4)?;
    /// assert_eq!(br.total_bits_read(), 12);
    /// assert_eq!(br.read(4)?, 1);
    /// # Ok::<(), camraw::error::Error>(())
    /// ```
    #[inline(never)]
    pub fn skip_bits(&mut self, mut num: usize) -> Result<(), Error> {
        if let Some(next_remaining_bits) = self.bits_in_buf.checked_sub(num) {
            self.total_bits_read += num;
            self.bits_in_buf = next_remaining_bits;
            self.bit_buf <<= num;
            return Ok(());
        }

        num -= self.bits_in_buf;
        self.total_bits_read += self.bits_in_buf;
        self.bit_buf = 0;
        self.bits_in_buf = 0;

        if num > self.data.len() * 8 {
            let available = self.data.len() * 8;
            self.total_bits_read += available;
            self.data = &[];
            return Err(Error::TruncatedStream(num, available));
        }

        self.total_bits_read += num;
        self.data = &self.data[num / 8..];
        num %= 8;

        self.refill();
        self.bits_in_buf = self
            .bits_in_buf
            .checked_sub(num)
            .ok_or(Error::TruncatedStream(num, 0))?;
        self.bit_buf <<= num;
        Ok(())
    }

    /// Skips `num` full bytes.
    /// ```
    /// # use camraw::bit_reader::BitReader;
    /// let mut br = BitReader::new(&[0xff, 0xff, 0b0100_0000]);
    /// br.skip_bytes(2)?;
    /// assert_eq!(br.read(2)?, 1);
    /// # Ok::<(), camraw::error::Error>(())
    /// ```
    pub fn skip_bytes(&mut self, num: usize) -> Result<(), Error> {
        self.skip_bits(num.checked_mul(8).ok_or(Error::ArithmeticOverflow)?)
    }

    fn refill(&mut self) {
        if self.data.len() >= 8 {
            let bits = BigEndian::read_u64(self.data);
            self.bit_buf |= bits >> self.bits_in_buf;
            let read_bytes = (63 - self.bits_in_buf) >> 3;
            self.bits_in_buf |= 56;
            self.data = &self.data[read_bytes..];
            debug_assert!(56 <= self.bits_in_buf && self.bits_in_buf < 64);
        } else {
            self.refill_slow()
        }
    }

    #[inline(never)]
    fn refill_slow(&mut self) {
        while self.bits_in_buf < 56 {
            if self.data.is_empty() {
                return;
            }
            self.bit_buf |= (self.data[0] as u64) << (56 - self.bits_in_buf);
            self.bits_in_buf += 8;
            self.data = &self.data[1..];
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn msb_first_order() {
        let mut br = BitReader::new(&[0b1101_0010, 0b0011_0000]);
        assert_eq!(br.read(1).unwrap(), 1);
        assert_eq!(br.read(2).unwrap(), 0b10);
        assert_eq!(br.read(5).unwrap(), 0b10010);
        assert_eq!(br.read(4).unwrap(), 0b0011);
        assert_eq!(br.total_bits_read(), 12);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut br = BitReader::new(&[0b1010_1010]);
        assert_eq!(br.peek(3).unwrap(), 0b101);
        assert_eq!(br.peek(3).unwrap(), 0b101);
        br.consume(3).unwrap();
        assert_eq!(br.peek(3).unwrap(), 0b010);
    }

    #[test]
    fn peek_zero_bits() {
        let mut br = BitReader::new(&[]);
        assert_eq!(br.peek(0).unwrap(), 0);
        assert_eq!(br.read(0).unwrap(), 0);
    }

    #[test]
    fn reads_past_the_end_fail() {
        let mut br = BitReader::new(&[0xab]);
        assert_eq!(br.read(8).unwrap(), 0xab);
        assert!(matches!(br.read(1), Err(Error::TruncatedStream(1, 0))));
    }

    #[test]
    fn long_reads_cross_refills() {
        let data: Vec<u8> = (0u8..=31).collect();
        let mut br = BitReader::new(&data);
        for byte in &data {
            assert_eq!(br.read(8).unwrap(), *byte as u64);
        }
        assert_eq!(br.total_bits_available(), 0);
    }

    #[test]
    fn wide_reads_match_narrow_reads() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0, 0x11];
        let mut wide = BitReader::new(&data);
        let mut narrow = BitReader::new(&data);
        let got = wide.read(56).unwrap();
        let mut expected = 0u64;
        for _ in 0..14 {
            expected = (expected << 4) | narrow.read(4).unwrap();
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn skip_bits_across_buffers() {
        let mut data = vec![0u8; 40];
        data[33] = 0b0000_0100;
        let mut br = BitReader::new(&data);
        br.read(3).unwrap();
        br.skip_bits(33 * 8 + 2).unwrap();
        assert_eq!(br.total_bits_read(), 33 * 8 + 5);
        assert_eq!(br.read(1).unwrap(), 1);
    }

    #[test]
    fn skip_past_the_end_fails() {
        let mut br = BitReader::new(&[0, 0]);
        assert!(br.skip_bits(17).is_err());
        let mut br = BitReader::new(&[0, 0]);
        br.skip_bits(16).unwrap();
        assert_eq!(br.total_bits_available(), 0);
    }

    #[test]
    fn skip_bytes_then_read() {
        let data = [0xff, 0x00, 0b1000_0001];
        let mut br = BitReader::new(&data);
        br.skip_bytes(2).unwrap();
        assert_eq!(br.read(8).unwrap(), 0b1000_0001);
        assert!(br.skip_bytes(1).is_err());
    }
}
