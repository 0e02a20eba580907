// Copyright (c) the Camraw Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use thiserror::Error;

use crate::entropy_coding::huffman::MAX_CODE_LENGTH;

#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "Malformed container: {reason} (tag {tag:#06x}, offset {offset}, buffer len {buffer_len})"
    )]
    ContainerFormat {
        reason: &'static str,
        tag: u16,
        offset: usize,
        buffer_len: usize,
    },
    #[error("Invalid slice geometry ({num_slices}, {slice_width}, {last_slice_width}): {reason}")]
    InvalidGeometry {
        reason: &'static str,
        num_slices: u16,
        slice_width: u16,
        last_slice_width: u16,
    },
    #[error("Slices cover {0} columns but the frame is {1} columns wide")]
    GeometryMismatch(usize, usize),
    #[error("No code of length <= {MAX_CODE_LENGTH} matches the bitstream")]
    CorruptBitstream,
    #[error("Bitstream truncated: {0} bits requested, {1} available")]
    TruncatedStream(usize, usize),
    #[error("Output buffer holds {1} samples, frame needs {0}")]
    OutputSizeMismatch(usize, usize),
    #[error("Unsupported sample format: {0} components with {1}x{2} sampling")]
    UnsupportedFormat(u8, u8, u8),
    #[error("{0}: expected {1} entries, found {2}")]
    BadDescriptor(&'static str, usize, usize),
    #[error("Malformed code table: {0}")]
    MalformedTable(&'static str),
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
}

pub type Result<T> = std::result::Result<T, Error>;
