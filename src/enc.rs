// Copyright (c) the Camraw Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Encode-side counterparts of the decoder: bit assembly and canonical
//! Huffman difference coding. Mainly used to build test fixtures, but the
//! streams they produce are exactly what the decompressor accepts.

use crate::entropy_coding::huffman::{HuffmanSpec, MAX_DIFF_LENGTH};
use crate::error::{Error, Result};

/// Assembles a bitstream most significant bit first.
#[derive(Clone, Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_buf: u64,
    bits_in_buf: usize,
}

impl BitWriter {
    pub fn new() -> BitWriter {
        BitWriter::default()
    }

    /// Appends the low `num` bits of `bits`, most significant first.
    pub fn write(&mut self, num: usize, bits: u64) {
        debug_assert!(num <= 56);
        debug_assert!(bits >> num == 0);
        self.bit_buf = (self.bit_buf << num) | bits;
        self.bits_in_buf += num;
        while self.bits_in_buf >= 8 {
            self.bytes.push((self.bit_buf >> (self.bits_in_buf - 8)) as u8);
            self.bits_in_buf -= 8;
        }
    }

    pub fn bits_written(&self) -> usize {
        self.bytes.len() * 8 + self.bits_in_buf
    }

    /// Zero-pads any partial byte and returns the stream. Every returned
    /// byte carries at least one payload bit.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bits_in_buf > 0 {
            self.bytes
                .push((self.bit_buf << (8 - self.bits_in_buf)) as u8);
        }
        self.bytes
    }
}

/// Symbol-to-code table for producing streams a [`HuffmanTable`] built from
/// the same spec will decode.
///
/// [`HuffmanTable`]: crate::entropy_coding::huffman::HuffmanTable
#[derive(Clone, Debug)]
pub struct HuffmanEncoder {
    codes: [Option<(u16, u8)>; MAX_DIFF_LENGTH as usize + 1],
}

impl HuffmanEncoder {
    pub fn new(spec: &HuffmanSpec) -> Result<HuffmanEncoder> {
        let mut codes = [None; MAX_DIFF_LENGTH as usize + 1];
        for c in spec.canonical_codes()? {
            codes[c.symbol as usize] = Some((c.code, c.len));
        }
        Ok(HuffmanEncoder { codes })
    }

    /// Emits one difference in [-32768, 32767]: the bit-length symbol, then
    /// the literal bits. Fails if the spec assigns no code to the needed
    /// bit-length.
    pub fn encode_difference(&self, bw: &mut BitWriter, diff: i32) -> Result<()> {
        debug_assert!((-32768..=32767).contains(&diff));
        let len = if diff == 0 {
            0
        } else {
            (32 - diff.unsigned_abs().leading_zeros()) as usize
        };
        let (code, code_len) = self.codes[len]
            .ok_or(Error::MalformedTable("difference length has no code"))?;
        bw.write(code_len as usize, code as u64);
        if len > 0 && len < MAX_DIFF_LENGTH as usize {
            let raw = if diff < 0 { diff + (1 << len) - 1 } else { diff };
            bw.write(len, raw as u64);
        }
        Ok(())
    }
}
