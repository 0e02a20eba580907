// Copyright (c) the Camraw Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Container-backed frame decoding: resolves the tag tree into engine
//! parameters once, then hands the compressed span to the decompressor.

use crate::bit_reader::BitReader;
use crate::container::{Directory, Entry, TagTree};
use crate::decompress::{Decompressor, SampleFormat, Slicing};
use crate::entropy_coding::huffman::{HuffmanSpec, HuffmanTable, MAX_CODE_LENGTH};
use crate::error::{Error, Result};
use crate::util::tracing_wrappers::*;

/// Child directory describing the raw frame.
pub const TAG_RAW_IMAGE: u16 = 0x014a;
/// Coded frame width in samples (LONG or SHORT).
pub const TAG_FRAME_WIDTH: u16 = 0x0100;
/// Coded frame height in rows (LONG or SHORT).
pub const TAG_FRAME_HEIGHT: u16 = 0x0101;
/// Component count (SHORT).
pub const TAG_COMPONENTS: u16 = 0x0115;
/// Sampling factors of component 0 as \[h, v\] (SHORT). Optional, 1x1 when
/// absent.
pub const TAG_SAMP_FACTORS: u16 = 0x0212;
/// Absolute offset of the compressed bitstream (LONG).
pub const TAG_DATA_OFFSET: u16 = 0x0111;
/// Byte length of the compressed bitstream (LONG).
pub const TAG_DATA_LENGTH: u16 = 0x0117;
/// Slice table as \[count, width, last width\] (SHORT). Optional, a single
/// full-width slice when absent.
pub const TAG_SLICES: u16 = 0xc640;
/// Concatenated canonical code specs, 16 count bytes then the values, one
/// spec per component (BYTE).
pub const TAG_HUFF_TABLES: u16 = 0xc641;
/// Initial predictor per component (SHORT).
pub const TAG_INIT_PREDICTORS: u16 = 0xc642;

/// Uniform access to the parsed container, whatever the concrete decoder.
pub trait ContainerDecoder {
    fn root(&self) -> &Directory;
}

/// Enough frame parameters for the caller to size an output buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    pub size: (usize, usize),
    pub format: SampleFormat,
}

/// Decoder for a whole container: tag tree in front, decompression engine
/// behind. The engine never reaches back into the tree once decoding runs.
pub struct RawDecoder<'a> {
    data: &'a [u8],
    tree: TagTree,
}

struct RawFrame<'d> {
    info: FrameInfo,
    slicing: Slicing,
    specs: Vec<HuffmanSpec>,
    init_pred: Vec<u16>,
    data: &'d [u8],
}

impl<'a> RawDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Result<RawDecoder<'a>> {
        Ok(RawDecoder {
            data,
            tree: TagTree::parse(data)?,
        })
    }

    pub fn frame_info(&self) -> Result<FrameInfo> {
        Ok(self.locate()?.info)
    }

    /// Decodes the frame into `out`, which must hold exactly
    /// width * height samples as reported by [`frame_info`](Self::frame_info).
    pub fn decode_into(&self, out: &mut [u16]) -> Result<()> {
        let frame = self.locate()?;
        let tables = frame
            .specs
            .iter()
            .map(HuffmanTable::new)
            .collect::<Result<Vec<_>>>()?;
        let table_refs: Vec<&HuffmanTable> = tables.iter().collect();
        Decompressor::new(
            frame.info.format,
            frame.info.size,
            frame.slicing,
            table_refs,
            frame.init_pred,
            BitReader::new(frame.data),
        )?
        .decompress(out)
    }

    fn container_err(&self, reason: &'static str, tag: u16, offset: usize) -> Error {
        Error::ContainerFormat {
            reason,
            tag,
            offset,
            buffer_len: self.data.len(),
        }
    }

    fn require<'d>(&self, dir: &'d Directory, tag: u16) -> Result<&'d Entry> {
        dir.lookup(tag)
            .ok_or_else(|| self.container_err("missing mandatory tag", tag, dir.offset()))
    }

    fn require_u32(&self, dir: &Directory, tag: u16) -> Result<u32> {
        self.require(dir, tag)?
            .get_u32(0)
            .ok_or_else(|| self.container_err("tag has no integer payload", tag, dir.offset()))
    }

    fn require_shorts<'d>(&self, dir: &'d Directory, tag: u16, count: usize) -> Result<&'d [u16]> {
        let shorts = self
            .require(dir, tag)?
            .shorts()
            .ok_or_else(|| self.container_err("tag payload must be shorts", tag, dir.offset()))?;
        if shorts.len() != count {
            return Err(self.container_err("tag has the wrong element count", tag, dir.offset()));
        }
        Ok(shorts)
    }

    /// Resolves every decode parameter from the tree. All container-level
    /// validation happens here, before any bit of the stream is touched.
    fn locate(&self) -> Result<RawFrame<'a>> {
        let root = self.tree.root();
        let raw_dir = self
            .require(root, TAG_RAW_IMAGE)?
            .directories()
            .and_then(|dirs| dirs.first())
            .ok_or_else(|| {
                self.container_err("raw image tag is not a directory", TAG_RAW_IMAGE, root.offset())
            })?;

        let width = self.require_u32(raw_dir, TAG_FRAME_WIDTH)? as usize;
        let height = self.require_u32(raw_dir, TAG_FRAME_HEIGHT)? as usize;
        let components = self.require_u32(raw_dir, TAG_COMPONENTS)?;
        let components = u8::try_from(components).map_err(|_| {
            self.container_err("component count out of range", TAG_COMPONENTS, raw_dir.offset())
        })?;
        let (h_samp_factor, v_samp_factor) = match raw_dir.lookup(TAG_SAMP_FACTORS) {
            None => (1, 1),
            Some(_) => {
                let factors = self.require_shorts(raw_dir, TAG_SAMP_FACTORS, 2)?;
                let h = u8::try_from(factors[0]);
                let v = u8::try_from(factors[1]);
                match (h, v) {
                    (Ok(h), Ok(v)) => (h, v),
                    _ => {
                        return Err(self.container_err(
                            "sampling factor out of range",
                            TAG_SAMP_FACTORS,
                            raw_dir.offset(),
                        ));
                    }
                }
            }
        };
        let format = SampleFormat {
            components,
            h_samp_factor,
            v_samp_factor,
        };

        let slicing = match raw_dir.lookup(TAG_SLICES) {
            None => {
                warn!("no slice table, assuming a single full-width slice");
                let full = u16::try_from(width).map_err(|_| {
                    self.container_err(
                        "frame too wide for an implicit single slice",
                        TAG_FRAME_WIDTH,
                        raw_dir.offset(),
                    )
                })?;
                Slicing::new(1, full, full)?
            }
            Some(_) => {
                let s = self.require_shorts(raw_dir, TAG_SLICES, 3)?;
                Slicing::new(s[0], s[1], s[2])?
            }
        };

        let offset = self.require_u32(raw_dir, TAG_DATA_OFFSET)? as usize;
        let length = self.require_u32(raw_dir, TAG_DATA_LENGTH)? as usize;
        let data = offset
            .checked_add(length)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| {
                self.container_err("image data escapes the buffer", TAG_DATA_OFFSET, offset)
            })?;

        let specs = self.parse_table_specs(raw_dir, components as usize)?;
        let init_pred = self
            .require(raw_dir, TAG_INIT_PREDICTORS)?
            .shorts()
            .ok_or_else(|| {
                self.container_err(
                    "tag payload must be shorts",
                    TAG_INIT_PREDICTORS,
                    raw_dir.offset(),
                )
            })?
            .to_vec();

        debug!(
            "frame {}x{}, {} components, {} slices, {} stream bytes",
            width,
            height,
            components,
            slicing.num_slices(),
            data.len()
        );
        Ok(RawFrame {
            info: FrameInfo {
                size: (width, height),
                format,
            },
            slicing,
            specs,
            init_pred,
            data,
        })
    }

    /// Splits the concatenated table blob into one spec per component:
    /// 16 per-length counts, then as many values as the counts announce.
    fn parse_table_specs(&self, dir: &Directory, components: usize) -> Result<Vec<HuffmanSpec>> {
        let blob = self
            .require(dir, TAG_HUFF_TABLES)?
            .bytes()
            .ok_or_else(|| {
                self.container_err(
                    "code tables must be a byte payload",
                    TAG_HUFF_TABLES,
                    dir.offset(),
                )
            })?;
        let mut specs = Vec::with_capacity(components);
        let mut rest = blob;
        for _ in 0..components {
            if rest.len() < MAX_CODE_LENGTH {
                return Err(Error::MalformedTable("spec shorter than its length counts"));
            }
            let (count_bytes, tail) = rest.split_at(MAX_CODE_LENGTH);
            let mut counts = [0u8; MAX_CODE_LENGTH];
            counts.copy_from_slice(count_bytes);
            let num_values: usize = counts.iter().map(|c| *c as usize).sum();
            if tail.len() < num_values {
                return Err(Error::MalformedTable("spec shorter than its value list"));
            }
            let (values, tail) = tail.split_at(num_values);
            specs.push(HuffmanSpec {
                counts,
                values: values.to_vec(),
            });
            rest = tail;
        }
        if !rest.is_empty() {
            return Err(Error::MalformedTable("trailing bytes after the last spec"));
        }
        Ok(specs)
    }
}

impl ContainerDecoder for RawDecoder<'_> {
    fn root(&self) -> &Directory {
        self.tree.root()
    }
}
