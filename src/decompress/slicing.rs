// Copyright (c) the Camraw Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::{Error, Result};

/// Vertical-strip decomposition of a frame: `num_slices - 1` strips of
/// `slice_width` columns followed by one of `last_slice_width` columns,
/// which may be narrower or wider than the rest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Slicing {
    num_slices: u16,
    slice_width: u16,
    last_slice_width: u16,
}

impl Slicing {
    /// The all-zero sentinel for "no slicing information". The decompressor
    /// rejects it; callers without a slice table substitute a single
    /// full-width slice instead.
    pub fn empty() -> Slicing {
        Slicing::default()
    }

    pub fn new(num_slices: u16, slice_width: u16, last_slice_width: u16) -> Result<Slicing> {
        if num_slices < 1 {
            return Err(Error::InvalidGeometry {
                reason: "at least one slice is required",
                num_slices,
                slice_width,
                last_slice_width,
            });
        }
        Ok(Slicing {
            num_slices,
            slice_width,
            last_slice_width,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.num_slices == 0
    }

    pub fn num_slices(&self) -> usize {
        self.num_slices as usize
    }

    /// Width in samples of slice `slice_id`, which must be in range.
    pub fn width_of_slice(&self, slice_id: usize) -> usize {
        debug_assert!(slice_id < self.num_slices as usize);
        if slice_id + 1 == self.num_slices as usize {
            self.last_slice_width as usize
        } else {
            self.slice_width as usize
        }
    }

    /// Total width covered by all slices. Purely descriptive; whether it
    /// matches the frame is checked at decompressor construction.
    pub fn total_width(&self) -> usize {
        match self.num_slices {
            0 => 0,
            n => (n as usize - 1) * self.slice_width as usize + self.last_slice_width as usize,
        }
    }

    pub(crate) fn geometry_error(&self, reason: &'static str) -> Error {
        Error::InvalidGeometry {
            reason,
            num_slices: self.num_slices,
            slice_width: self.slice_width,
            last_slice_width: self.last_slice_width,
        }
    }
}
