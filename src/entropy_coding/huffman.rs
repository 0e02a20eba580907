// Copyright (c) the Camraw Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};

/// Longest admissible code, in bits.
pub const MAX_CODE_LENGTH: usize = 16;

/// Largest difference bit-length a symbol may encode.
pub const MAX_DIFF_LENGTH: u32 = 16;

/// Canonical code-length specification: `counts[i]` codes of length `i + 1`,
/// symbols listed in canonical order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HuffmanSpec {
    pub counts: [u8; MAX_CODE_LENGTH],
    pub values: Vec<u8>,
}

/// One assigned code: `len` bits of `code`, mapping to `symbol`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanonicalCode {
    pub symbol: u8,
    pub code: u16,
    pub len: u8,
}

impl HuffmanSpec {
    /// Total number of symbols described by `counts`.
    pub fn num_symbols(&self) -> usize {
        self.counts.iter().map(|c| *c as usize).sum()
    }

    /// Assigns codes canonically: shorter codes first, ties in value-list
    /// order, each code being the numerically smallest one that keeps the
    /// set prefix-free.
    pub fn canonical_codes(&self) -> Result<Vec<CanonicalCode>> {
        let total = self.num_symbols();
        if total == 0 {
            return Err(Error::MalformedTable("no symbols"));
        }
        if total != self.values.len() {
            return Err(Error::MalformedTable(
                "length counts do not match the value list",
            ));
        }
        if total > MAX_DIFF_LENGTH as usize + 1 {
            return Err(Error::MalformedTable("more symbols than difference lengths"));
        }
        if self.values.iter().any(|v| *v as u32 > MAX_DIFF_LENGTH) {
            return Err(Error::MalformedTable("difference length exceeds 16"));
        }
        let mut codes = Vec::with_capacity(total);
        let mut next_code = 0u32;
        let mut value_idx = 0;
        for len in 1..=MAX_CODE_LENGTH {
            next_code <<= 1;
            let count = self.counts[len - 1] as u32;
            if next_code + count > 1u32 << len {
                return Err(Error::MalformedTable("code lengths overflow the code space"));
            }
            for _ in 0..count {
                codes.push(CanonicalCode {
                    symbol: self.values[value_idx],
                    code: next_code as u16,
                    len: len as u8,
                });
                next_code += 1;
                value_idx += 1;
            }
        }
        Ok(codes)
    }
}

/// Immutable decode table for one canonical code set.
///
/// Symbols are difference bit-lengths; decoding a sample is
/// [`decode_symbol`](Self::decode_symbol) followed by
/// [`decode_literal`](Self::decode_literal).
#[derive(Debug)]
pub struct HuffmanTable {
    first_code: [u32; MAX_CODE_LENGTH + 1],
    num_codes: [u16; MAX_CODE_LENGTH + 1],
    value_index: [u16; MAX_CODE_LENGTH + 1],
    values: Vec<u8>,
}

impl HuffmanTable {
    pub fn new(spec: &HuffmanSpec) -> Result<HuffmanTable> {
        let codes = spec.canonical_codes()?;
        let mut first_code = [0u32; MAX_CODE_LENGTH + 1];
        let mut num_codes = [0u16; MAX_CODE_LENGTH + 1];
        let mut value_index = [0u16; MAX_CODE_LENGTH + 1];
        let mut values = Vec::with_capacity(codes.len());
        for c in &codes {
            let len = c.len as usize;
            if num_codes[len] == 0 {
                first_code[len] = c.code as u32;
                value_index[len] = values.len() as u16;
            }
            num_codes[len] += 1;
            values.push(c.symbol);
        }
        Ok(HuffmanTable {
            first_code,
            num_codes,
            value_index,
            values,
        })
    }

    /// Decodes one symbol by extending a candidate code bit by bit until it
    /// falls inside some length's canonical run. No match within
    /// [`MAX_CODE_LENGTH`] bits is corruption; running out of input is
    /// truncation.
    pub fn decode_symbol(&self, br: &mut BitReader) -> Result<u32> {
        let mut code = 0u32;
        for len in 1..=MAX_CODE_LENGTH {
            code = (code << 1) | br.read(1)? as u32;
            let count = self.num_codes[len] as u32;
            let first = self.first_code[len];
            if count != 0 && code >= first && code - first < count {
                let idx = self.value_index[len] as usize + (code - first) as usize;
                return Ok(self.values[idx] as u32);
            }
        }
        Err(Error::CorruptBitstream)
    }

    /// Reads the `len` literal bits that follow a symbol and sign-extends
    /// them: a leading 0 bit selects the negative half of the range.
    /// `len == 0` encodes a zero difference and `len == 16` encodes -32768,
    /// neither consuming any literal bits.
    pub fn decode_literal(br: &mut BitReader, len: u32) -> Result<i32> {
        if len == 0 {
            return Ok(0);
        }
        if len == MAX_DIFF_LENGTH {
            return Ok(-32768);
        }
        if len > MAX_DIFF_LENGTH {
            return Err(Error::CorruptBitstream);
        }
        let raw = br.read(len as usize)? as i32;
        if raw >> (len - 1) == 0 {
            Ok(raw - (1 << len) + 1)
        } else {
            Ok(raw)
        }
    }

    /// Decodes one full difference: symbol, then literal.
    pub fn decode_difference(&self, br: &mut BitReader) -> Result<i32> {
        let len = self.decode_symbol(br)?;
        Self::decode_literal(br, len)
    }
}
