// Copyright (c) the Camraw Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::decompress::{SampleFormat, Slicing};
use crate::enc::{BitWriter, HuffmanEncoder};
use crate::entropy_coding::huffman::{HuffmanSpec, MAX_CODE_LENGTH};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

pub fn spec_from(counts: &[u8], values: &[u8]) -> HuffmanSpec {
    let mut c = [0u8; MAX_CODE_LENGTH];
    c[..counts.len()].copy_from_slice(counts);
    HuffmanSpec {
        counts: c,
        values: values.to_vec(),
    }
}

/// A spec with one code per difference length 0..=16, so any 16-bit
/// difference is encodable.
pub fn all_lengths_spec() -> HuffmanSpec {
    let mut counts = [0u8; MAX_CODE_LENGTH];
    counts[1] = 1;
    counts[2] = 5;
    for count in counts.iter_mut().take(14).skip(3) {
        *count = 1;
    }
    HuffmanSpec {
        counts,
        values: (0..=16).collect(),
    }
}

pub fn seeded_samples(len: usize, seed: u64) -> Vec<u16> {
    let mut rng = XorShiftRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random()).collect()
}

/// Encodes `samples` in exactly the order the decompressor reads them:
/// rows, then slices, then groups, with predictors restarting at every
/// (row, slice) segment.
pub fn encode_frame(
    format: SampleFormat,
    frame_size: (usize, usize),
    slicing: &Slicing,
    encoders: &[HuffmanEncoder],
    init_pred: &[u16],
    samples: &[u16],
) -> Vec<u8> {
    let (width, height) = frame_size;
    assert_eq!(samples.len(), width * height);
    let oversampled = format.h_samp_factor as usize * format.v_samp_factor as usize;
    let components = format.components as usize;
    let group_span = format.group_span();
    let mut bw = BitWriter::new();
    for row in 0..height {
        let row_base = row * width;
        let mut slice_start = 0;
        for slice_id in 0..slicing.num_slices() {
            let slice_width = slicing.width_of_slice(slice_id);
            let mut pred = init_pred.to_vec();
            for group in (0..slice_width).step_by(group_span) {
                let base = row_base + slice_start + group;
                for s in 0..oversampled {
                    let sample = samples[base + s];
                    let diff = sample.wrapping_sub(pred[0]) as i16 as i32;
                    encoders[0].encode_difference(&mut bw, diff).unwrap();
                    pred[0] = sample;
                }
                for c in 1..components {
                    let sample = samples[base + oversampled + c - 1];
                    let diff = sample.wrapping_sub(pred[c]) as i16 as i32;
                    encoders[c].encode_difference(&mut bw, diff).unwrap();
                    pred[c] = sample;
                }
            }
            slice_start += slice_width;
        }
    }
    bw.finish()
}
