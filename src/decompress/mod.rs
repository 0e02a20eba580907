// Copyright (c) the Camraw Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Slice-aware, multi-component predictive decompression.
//!
//! The frame is decoded in coded-domain order: rows outermost, the row's
//! vertical slices left to right, sample groups within the slice, components
//! within the group. Every (row, slice) segment restarts the per-component
//! running predictors from the initial predictors, so no state ever crosses
//! a slice boundary.

mod slicing;

use crate::bit_reader::BitReader;
use crate::entropy_coding::huffman::HuffmanTable;
use crate::error::{Error, Result};
use crate::util::tracing_wrappers::*;
use array_init::array_init;

pub use slicing::Slicing;

/// Component count and the sampling factors of the first component.
///
/// One sample group carries `h_samp_factor * v_samp_factor` samples of
/// component 0 followed by one sample of each remaining component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleFormat {
    pub components: u8,
    pub h_samp_factor: u8,
    pub v_samp_factor: u8,
}

impl SampleFormat {
    /// Samples one group occupies in the output row.
    pub fn group_span(&self) -> usize {
        self.h_samp_factor as usize * self.v_samp_factor as usize + self.components as usize - 1
    }

    fn is_supported(&self) -> bool {
        matches!(
            (self.components, self.h_samp_factor, self.v_samp_factor),
            (2, 1, 1) | (4, 1, 1) | (3, 2, 1) | (3, 2, 2)
        )
    }
}

/// One-shot decoder for a single frame's compressed bitstream.
///
/// Construction validates the format against the slice geometry; a
/// successfully built decompressor either fills the whole output buffer or
/// fails, leaving the buffer contents unspecified.
pub struct Decompressor<'a> {
    format: SampleFormat,
    frame_width: usize,
    frame_height: usize,
    slicing: Slicing,
    tables: Vec<&'a HuffmanTable>,
    init_pred: Vec<u16>,
    input: BitReader<'a>,
}

impl<'a> Decompressor<'a> {
    pub fn new(
        format: SampleFormat,
        frame_size: (usize, usize),
        slicing: Slicing,
        tables: Vec<&'a HuffmanTable>,
        init_pred: Vec<u16>,
        input: BitReader<'a>,
    ) -> Result<Decompressor<'a>> {
        if !format.is_supported() {
            return Err(Error::UnsupportedFormat(
                format.components,
                format.h_samp_factor,
                format.v_samp_factor,
            ));
        }
        let components = format.components as usize;
        if tables.len() != components {
            return Err(Error::BadDescriptor("code tables", components, tables.len()));
        }
        if init_pred.len() != components {
            return Err(Error::BadDescriptor(
                "initial predictors",
                components,
                init_pred.len(),
            ));
        }
        if slicing.is_empty() {
            return Err(slicing.geometry_error("cannot decode with empty slicing"));
        }
        let group_span = format.group_span();
        for slice_id in 0..slicing.num_slices() {
            let width = slicing.width_of_slice(slice_id);
            if width == 0 || width % group_span != 0 {
                return Err(
                    slicing.geometry_error("slice width is not a positive multiple of the group")
                );
            }
        }
        if slicing.total_width() != frame_size.0 {
            return Err(Error::GeometryMismatch(slicing.total_width(), frame_size.0));
        }
        Ok(Decompressor {
            format,
            frame_width: frame_size.0,
            frame_height: frame_size.1,
            slicing,
            tables,
            init_pred,
            input,
        })
    }

    /// Decodes the whole frame into `out`, all or nothing.
    pub fn decompress(self, out: &mut [u16]) -> Result<()> {
        let expected = self
            .frame_width
            .checked_mul(self.frame_height)
            .ok_or(Error::ArithmeticOverflow)?;
        if out.len() != expected {
            return Err(Error::OutputSizeMismatch(expected, out.len()));
        }
        let format = self.format;
        match (format.components, format.h_samp_factor, format.v_samp_factor) {
            (2, 1, 1) => self.run::<2, 1, 1>(out),
            (4, 1, 1) => self.run::<4, 1, 1>(out),
            (3, 2, 1) => self.run::<3, 2, 1>(out),
            (3, 2, 2) => self.run::<3, 2, 2>(out),
            _ => Err(Error::UnsupportedFormat(
                format.components,
                format.h_samp_factor,
                format.v_samp_factor,
            )),
        }
    }

    fn run<const N: usize, const X: usize, const Y: usize>(
        mut self,
        out: &mut [u16],
    ) -> Result<()> {
        let group_span = X * Y + N - 1;
        let tables: [&HuffmanTable; N] = array_init(|c| self.tables[c]);
        let init_pred: [u16; N] = array_init(|c| self.init_pred[c]);
        for row in 0..self.frame_height {
            let row_base = row * self.frame_width;
            let mut slice_start = 0;
            for slice_id in 0..self.slicing.num_slices() {
                let slice_width = self.slicing.width_of_slice(slice_id);
                let mut pred = init_pred;
                for group in (0..slice_width).step_by(group_span) {
                    let base = row_base + slice_start + group;
                    for s in 0..X * Y {
                        let diff = tables[0].decode_difference(&mut self.input)?;
                        pred[0] = pred[0].wrapping_add(diff as u16);
                        out[base + s] = pred[0];
                    }
                    for c in 1..N {
                        let diff = tables[c].decode_difference(&mut self.input)?;
                        pred[c] = pred[c].wrapping_add(diff as u16);
                        out[base + X * Y + c - 1] = pred[c];
                    }
                }
                slice_start += slice_width;
            }
        }
        trace!(
            "frame decoded, {} bits consumed, {} left over",
            self.input.total_bits_read(),
            self.input.total_bits_available()
        );
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::enc::HuffmanEncoder;
    use crate::util::test::{all_lengths_spec, encode_frame, seeded_samples, spec_from};
    use test_log::test;

    fn pairs() -> SampleFormat {
        SampleFormat {
            components: 2,
            h_samp_factor: 1,
            v_samp_factor: 1,
        }
    }

    #[test]
    fn group_spans() {
        let cases = [(2, 1, 1, 2), (4, 1, 1, 4), (3, 2, 1, 4), (3, 2, 2, 6)];
        for (components, h, v, span) in cases {
            let format = SampleFormat {
                components,
                h_samp_factor: h,
                v_samp_factor: v,
            };
            assert_eq!(format.group_span(), span);
        }
    }

    #[test]
    fn two_component_worked_example() {
        // Code 0 -> length 0, code 10 -> length 3. The third difference is
        // the literal 011, sign-extended to -4, wrapping the predictor to
        // 0xfffc. Everything else stays 0.
        let table = HuffmanTable::new(&spec_from(&[1, 1], &[0, 3])).unwrap();
        let data = [0b0010_0110, 0b0000_0000];
        let dec = Decompressor::new(
            pairs(),
            (4, 2),
            Slicing::new(1, 4, 4).unwrap(),
            vec![&table, &table],
            vec![0, 0],
            BitReader::new(&data),
        )
        .unwrap();
        let mut out = vec![0u16; 8];
        dec.decompress(&mut out).unwrap();
        assert_eq!(out, [0, 0, 0xfffc, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn trailing_padding_is_ignored() {
        let table = HuffmanTable::new(&spec_from(&[1, 1], &[0, 3])).unwrap();
        let data = [0b0010_0110, 0b0000_0000, 0xff, 0xff];
        let dec = Decompressor::new(
            pairs(),
            (4, 2),
            Slicing::new(1, 4, 4).unwrap(),
            vec![&table, &table],
            vec![0, 0],
            BitReader::new(&data),
        )
        .unwrap();
        let mut out = vec![0u16; 8];
        dec.decompress(&mut out).unwrap();
        assert_eq!(out[2], 0xfffc);
    }

    #[test]
    fn predictors_reset_at_rows_and_slices() {
        // One code: 0 -> length 1, so every difference is +1 or -1. The
        // stream applies +1 to each component of each group; if any state
        // leaked across segments the later segments would keep climbing.
        let table = HuffmanTable::new(&spec_from(&[1], &[1])).unwrap();
        let data = [0b0101_0101, 0b0101_0101];
        let dec = Decompressor::new(
            pairs(),
            (4, 2),
            Slicing::new(2, 2, 2).unwrap(),
            vec![&table, &table],
            vec![100, 200],
            BitReader::new(&data),
        )
        .unwrap();
        let mut out = vec![0u16; 8];
        dec.decompress(&mut out).unwrap();
        assert_eq!(out, [101, 201, 101, 201, 101, 201, 101, 201]);
    }

    #[test]
    fn subsampled_groups_interleave_components() {
        // (3, 2, 1): a group is two component-0 samples, then one each of
        // components 1 and 2. Every difference decodes as +1.
        let table = HuffmanTable::new(&spec_from(&[1], &[1])).unwrap();
        let data = [0b0101_0101];
        let dec = Decompressor::new(
            SampleFormat {
                components: 3,
                h_samp_factor: 2,
                v_samp_factor: 1,
            },
            (4, 1),
            Slicing::new(1, 4, 4).unwrap(),
            vec![&table, &table, &table],
            vec![10, 20, 28],
            BitReader::new(&data),
        )
        .unwrap();
        let mut out = vec![0u16; 4];
        dec.decompress(&mut out).unwrap();
        assert_eq!(out, [11, 12, 21, 29]);
    }

    #[test]
    fn wider_last_slice_resets_like_any_other() {
        // Slices of width 2 and 4. Each segment restarts from (0, 100), so
        // only the second group of the wide slice reaches (2, 102).
        let table = HuffmanTable::new(&spec_from(&[1], &[1])).unwrap();
        let data = [0x55, 0x55, 0x55];
        let dec = Decompressor::new(
            pairs(),
            (6, 2),
            Slicing::new(2, 2, 4).unwrap(),
            vec![&table, &table],
            vec![0, 100],
            BitReader::new(&data),
        )
        .unwrap();
        let mut out = vec![0u16; 12];
        dec.decompress(&mut out).unwrap();
        assert_eq!(out, [1, 101, 1, 101, 2, 102, 1, 101, 1, 101, 2, 102]);
    }

    fn roundtrip(format: SampleFormat, slicing: Slicing, height: usize, seed: u64) {
        let width = slicing.total_width();
        let spec = all_lengths_spec();
        let components = format.components as usize;
        let encoder = HuffmanEncoder::new(&spec).unwrap();
        let encoders: Vec<HuffmanEncoder> =
            (0..components).map(|_| encoder.clone()).collect();
        let init_pred: Vec<u16> = (0..components as u16).map(|c| c * 1000).collect();
        let samples = seeded_samples(width * height, seed);
        let data = encode_frame(
            format,
            (width, height),
            &slicing,
            &encoders,
            &init_pred,
            &samples,
        );
        let table = HuffmanTable::new(&spec).unwrap();
        let tables: Vec<&HuffmanTable> = (0..components).map(|_| &table).collect();
        let dec = Decompressor::new(
            format,
            (width, height),
            slicing,
            tables,
            init_pred,
            BitReader::new(&data),
        )
        .unwrap();
        let mut out = vec![0u16; width * height];
        dec.decompress(&mut out).unwrap();
        assert_eq!(out, samples);
    }

    macro_rules! roundtrip_test {
        ($name:ident, $components:expr, $h:expr, $v:expr, $slicing:expr, $height:expr) => {
            paste::paste! {
                #[test]
                fn [<roundtrip_ $name>]() {
                    let format = SampleFormat {
                        components: $components,
                        h_samp_factor: $h,
                        v_samp_factor: $v,
                    };
                    for seed in 0..4 {
                        roundtrip(format, $slicing, $height, seed);
                    }
                }
            }
        };
    }

    roundtrip_test!(pairs, 2, 1, 1, Slicing::new(3, 4, 6).unwrap(), 5);
    roundtrip_test!(quads, 4, 1, 1, Slicing::new(2, 8, 4).unwrap(), 3);
    roundtrip_test!(two_to_one, 3, 2, 1, Slicing::new(3, 8, 4).unwrap(), 4);
    roundtrip_test!(two_to_two, 3, 2, 2, Slicing::new(2, 12, 6).unwrap(), 3);

    #[test]
    fn truncation_at_every_byte_fails() {
        let format = pairs();
        let slicing = Slicing::new(2, 4, 2).unwrap();
        let spec = all_lengths_spec();
        let encoders = vec![
            HuffmanEncoder::new(&spec).unwrap(),
            HuffmanEncoder::new(&spec).unwrap(),
        ];
        let samples = seeded_samples(12, 7);
        let data = encode_frame(format, (6, 2), &slicing, &encoders, &[0, 0], &samples);
        let table = HuffmanTable::new(&spec).unwrap();
        for cut in 0..data.len() {
            let dec = Decompressor::new(
                format,
                (6, 2),
                slicing,
                vec![&table, &table],
                vec![0, 0],
                BitReader::new(&data[..cut]),
            )
            .unwrap();
            let mut out = vec![0u16; 12];
            assert!(matches!(
                dec.decompress(&mut out),
                Err(Error::TruncatedStream(..))
            ));
        }
    }

    #[test]
    fn rejects_unsupported_formats() {
        let table = HuffmanTable::new(&all_lengths_spec()).unwrap();
        for (components, h, v) in [(1, 1, 1), (3, 1, 1), (2, 2, 1), (5, 1, 1), (3, 2, 3)] {
            let format = SampleFormat {
                components,
                h_samp_factor: h,
                v_samp_factor: v,
            };
            let tables = vec![&table; components as usize];
            let init_pred = vec![0u16; components as usize];
            assert!(matches!(
                Decompressor::new(
                    format,
                    (8, 2),
                    Slicing::new(1, 8, 8).unwrap(),
                    tables,
                    init_pred,
                    BitReader::new(&[]),
                ),
                Err(Error::UnsupportedFormat(..))
            ));
        }
    }

    #[test]
    fn rejects_bad_geometry() {
        let table = HuffmanTable::new(&all_lengths_spec()).unwrap();
        let build = |slicing, frame_size| {
            Decompressor::new(
                pairs(),
                frame_size,
                slicing,
                vec![&table, &table],
                vec![0, 0],
                BitReader::new(&[]),
            )
        };
        assert!(matches!(
            build(Slicing::empty(), (4, 2)),
            Err(Error::InvalidGeometry { .. })
        ));
        assert!(matches!(
            build(Slicing::new(1, 3, 3).unwrap(), (3, 2)),
            Err(Error::InvalidGeometry { .. })
        ));
        assert!(matches!(
            build(Slicing::new(2, 4, 0).unwrap(), (4, 2)),
            Err(Error::InvalidGeometry { .. })
        ));
        assert!(matches!(
            build(Slicing::new(1, 4, 4).unwrap(), (6, 2)),
            Err(Error::GeometryMismatch(4, 6))
        ));
    }

    #[test]
    fn rejects_mismatched_descriptors() {
        let table = HuffmanTable::new(&all_lengths_spec()).unwrap();
        assert!(matches!(
            Decompressor::new(
                pairs(),
                (4, 2),
                Slicing::new(1, 4, 4).unwrap(),
                vec![&table],
                vec![0, 0],
                BitReader::new(&[]),
            ),
            Err(Error::BadDescriptor("code tables", 2, 1))
        ));
        assert!(matches!(
            Decompressor::new(
                pairs(),
                (4, 2),
                Slicing::new(1, 4, 4).unwrap(),
                vec![&table, &table],
                vec![0, 0, 0],
                BitReader::new(&[]),
            ),
            Err(Error::BadDescriptor("initial predictors", 2, 3))
        ));
    }

    #[test]
    fn rejects_wrong_output_size() {
        let table = HuffmanTable::new(&all_lengths_spec()).unwrap();
        let dec = Decompressor::new(
            pairs(),
            (4, 2),
            Slicing::new(1, 4, 4).unwrap(),
            vec![&table, &table],
            vec![0, 0],
            BitReader::new(&[]),
        )
        .unwrap();
        let mut out = vec![0u16; 7];
        assert!(matches!(
            dec.decompress(&mut out),
            Err(Error::OutputSizeMismatch(8, 7))
        ));
    }

    #[test]
    fn components_may_share_one_table() {
        // Same instance for both components, distinct initial predictors.
        let table = HuffmanTable::new(&spec_from(&[1], &[1])).unwrap();
        let data = [0b0101_0101];
        let dec = Decompressor::new(
            pairs(),
            (2, 1),
            Slicing::new(1, 2, 2).unwrap(),
            vec![&table, &table],
            vec![10, 20],
            BitReader::new(&data),
        )
        .unwrap();
        let mut out = vec![0u16; 2];
        dec.decompress(&mut out).unwrap();
        assert_eq!(out, [11, 21]);
    }
}
