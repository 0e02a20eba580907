// Copyright (c) the Camraw Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Endian-aware tag-tree metadata container.
//!
//! The layout is TIFF-shaped: a byte-order mark and magic, a root directory
//! of 12-byte entries, and payloads that are either inline (when they fit in
//! 4 bytes) or stored out of line at an absolute offset within the same
//! buffer. Directories nest through [`TagType::Directory`] entries; there is
//! no sibling chain, every node is reachable from the single root.

use crate::error::{Error, Result};
use crate::util::tracing_wrappers::*;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

pub const CONTAINER_MAGIC: u16 = 42;
pub const MAX_DIRECTORY_DEPTH: usize = 16;

const ENTRY_SIZE: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            Endianness::Little => LittleEndian::read_u16(bytes),
            Endianness::Big => BigEndian::read_u16(bytes),
        }
    }

    fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            Endianness::Little => LittleEndian::read_u32(bytes),
            Endianness::Big => BigEndian::read_u32(bytes),
        }
    }
}

/// Payload type of a directory entry.
#[repr(u16)]
#[derive(Debug, FromPrimitive, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    Undefined = 7,
    Directory = 13,
}

impl TagType {
    pub fn unit_size(self) -> usize {
        match self {
            TagType::Byte | TagType::Ascii | TagType::Undefined => 1,
            TagType::Short => 2,
            TagType::Long | TagType::Directory => 4,
            TagType::Rational => 8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

/// Decoded payload of one entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bytes(Vec<u8>),
    Ascii(String),
    Shorts(Vec<u16>),
    Longs(Vec<u32>),
    Rationals(Vec<Rational>),
    Directories(Vec<Directory>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    tag: u16,
    value: Value,
}

impl Entry {
    pub fn tag(&self) -> u16 {
        self.tag
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn count(&self) -> usize {
        match &self.value {
            Value::Bytes(v) => v.len(),
            Value::Ascii(s) => s.len(),
            Value::Shorts(v) => v.len(),
            Value::Longs(v) => v.len(),
            Value::Rationals(v) => v.len(),
            Value::Directories(v) => v.len(),
        }
    }

    /// Integer payload element widened to u32, for tags that may be stored
    /// as bytes, shorts or longs.
    pub fn get_u32(&self, index: usize) -> Option<u32> {
        match &self.value {
            Value::Bytes(v) => v.get(index).map(|b| *b as u32),
            Value::Shorts(v) => v.get(index).map(|s| *s as u32),
            Value::Longs(v) => v.get(index).copied(),
            _ => None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.value {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn ascii(&self) -> Option<&str> {
        match &self.value {
            Value::Ascii(s) => Some(s),
            _ => None,
        }
    }

    pub fn shorts(&self) -> Option<&[u16]> {
        match &self.value {
            Value::Shorts(v) => Some(v),
            _ => None,
        }
    }

    pub fn rationals(&self) -> Option<&[Rational]> {
        match &self.value {
            Value::Rationals(v) => Some(v),
            _ => None,
        }
    }

    pub fn directories(&self) -> Option<&[Directory]> {
        match &self.value {
            Value::Directories(v) => Some(v),
            _ => None,
        }
    }
}

/// One parsed directory node.
#[derive(Clone, Debug, PartialEq)]
pub struct Directory {
    offset: usize,
    entries: Vec<Entry>,
}

impl Directory {
    /// Absolute offset this directory was parsed from.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Finds a direct child entry. Never recurses into nested directories;
    /// the same tag id may mean different things at different levels.
    pub fn lookup(&self, tag: u16) -> Option<&Entry> {
        self.entries.iter().find(|e| e.tag == tag)
    }
}

/// A fully parsed, immutable container.
#[derive(Debug)]
pub struct TagTree {
    root: Directory,
}

impl TagTree {
    pub fn parse(data: &[u8]) -> Result<TagTree> {
        let endian = match data.get(..2) {
            Some(b"II") => Endianness::Little,
            Some(b"MM") => Endianness::Big,
            _ => {
                return Err(Error::ContainerFormat {
                    reason: "bad byte-order mark",
                    tag: 0,
                    offset: 0,
                    buffer_len: data.len(),
                });
            }
        };
        let mut parser = Parser {
            data,
            endian,
            visited: Vec::new(),
        };
        let magic = parser.read_u16_at(2, 0)?;
        if magic != CONTAINER_MAGIC {
            return Err(parser.err("bad magic", 0, 2));
        }
        let root_offset = parser.read_u32_at(4, 0)? as usize;
        let root = parser.parse_directory(root_offset, 0)?;
        debug!(
            "parsed container: {} root entries, {} directories total",
            root.entries().len(),
            parser.visited.len()
        );
        Ok(TagTree { root })
    }

    /// The single designated root directory.
    pub fn root(&self) -> &Directory {
        &self.root
    }
}

struct Parser<'a> {
    data: &'a [u8],
    endian: Endianness,
    visited: Vec<usize>,
}

impl<'a> Parser<'a> {
    fn err(&self, reason: &'static str, tag: u16, offset: usize) -> Error {
        Error::ContainerFormat {
            reason,
            tag,
            offset,
            buffer_len: self.data.len(),
        }
    }

    fn bytes_at(
        &self,
        offset: usize,
        size: usize,
        tag: u16,
        reason: &'static str,
    ) -> Result<&'a [u8]> {
        offset
            .checked_add(size)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| self.err(reason, tag, offset))
    }

    fn read_u16_at(&self, offset: usize, tag: u16) -> Result<u16> {
        Ok(self
            .endian
            .read_u16(self.bytes_at(offset, 2, tag, "read past end of buffer")?))
    }

    fn read_u32_at(&self, offset: usize, tag: u16) -> Result<u32> {
        Ok(self
            .endian
            .read_u32(self.bytes_at(offset, 4, tag, "read past end of buffer")?))
    }

    fn parse_directory(&mut self, offset: usize, depth: usize) -> Result<Directory> {
        if depth > MAX_DIRECTORY_DEPTH {
            return Err(self.err("directory nesting too deep", 0, offset));
        }
        if self.visited.contains(&offset) {
            return Err(self.err("directory reference cycle", 0, offset));
        }
        self.visited.push(offset);
        let count = self
            .bytes_at(offset, 2, 0, "directory out of bounds")
            .map(|b| self.endian.read_u16(b))? as usize;
        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            entries.push(self.parse_entry(offset + 2 + i * ENTRY_SIZE, depth)?);
        }
        Ok(Directory { offset, entries })
    }

    fn parse_entry(&mut self, offset: usize, depth: usize) -> Result<Entry> {
        let raw = self.bytes_at(offset, ENTRY_SIZE, 0, "entry out of bounds")?;
        let tag = self.endian.read_u16(&raw[0..2]);
        let type_raw = self.endian.read_u16(&raw[2..4]);
        let count = self.endian.read_u32(&raw[4..8]) as usize;
        let tag_type = TagType::from_u16(type_raw)
            .ok_or_else(|| self.err("unknown payload type", tag, offset))?;
        let size = (count as u64)
            .checked_mul(tag_type.unit_size() as u64)
            .ok_or(Error::ArithmeticOverflow)?;
        let payload: &[u8] = if size <= 4 {
            &raw[8..8 + size as usize]
        } else {
            let value_offset = self.endian.read_u32(&raw[8..12]) as usize;
            if size > self.data.len() as u64 {
                return Err(self.err("payload out of bounds", tag, value_offset));
            }
            self.bytes_at(value_offset, size as usize, tag, "payload out of bounds")?
        };
        let value = self.decode_value(tag, tag_type, payload, depth)?;
        Ok(Entry { tag, value })
    }

    fn decode_value(
        &mut self,
        tag: u16,
        tag_type: TagType,
        payload: &[u8],
        depth: usize,
    ) -> Result<Value> {
        Ok(match tag_type {
            TagType::Byte | TagType::Undefined => Value::Bytes(payload.to_vec()),
            TagType::Ascii => {
                let end = payload
                    .iter()
                    .rposition(|b| *b != 0)
                    .map_or(0, |pos| pos + 1);
                let text = std::str::from_utf8(&payload[..end])
                    .map_err(|_| self.err("ascii payload is not valid UTF-8", tag, 0))?;
                Value::Ascii(text.to_owned())
            }
            TagType::Short => Value::Shorts(
                payload
                    .chunks_exact(2)
                    .map(|c| self.endian.read_u16(c))
                    .collect(),
            ),
            TagType::Long => Value::Longs(
                payload
                    .chunks_exact(4)
                    .map(|c| self.endian.read_u32(c))
                    .collect(),
            ),
            TagType::Rational => Value::Rationals(
                payload
                    .chunks_exact(8)
                    .map(|c| Rational {
                        num: self.endian.read_u32(&c[0..4]),
                        den: self.endian.read_u32(&c[4..8]),
                    })
                    .collect(),
            ),
            TagType::Directory => {
                let offsets: Vec<usize> = payload
                    .chunks_exact(4)
                    .map(|c| self.endian.read_u32(c) as usize)
                    .collect();
                let mut children = Vec::with_capacity(offsets.len());
                for child_offset in offsets {
                    children.push(self.parse_directory(child_offset, depth + 1)?);
                }
                Value::Directories(children)
            }
        })
    }
}
