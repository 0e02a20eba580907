// Copyright (c) the Camraw Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![deny(unsafe_code)]
pub mod bit_reader;
pub mod container;
pub mod decode;
pub mod decompress;
pub mod enc;
pub mod entropy_coding;
pub mod error;
pub mod util;
