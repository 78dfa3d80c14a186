// Copyright (c) 2023 Huawei Device Co., Ltd.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Name/value header blocks.
//!
//! A block is an ordered list of name/value pairs. On the wire it is a
//! 16-bit pair count followed by length-prefixed names and values, and is
//! always carried in compressed form inside `SYN_STREAM`/`SYN_REPLY`
//! payloads.

use crate::error::{ErrorKind, SpdyError};

/// An ordered name/value header block.
///
/// # Examples
///
/// ```
/// use ylong_spdy::headers::NvBlock;
///
/// let mut block = NvBlock::new();
/// block.insert("url", "/index.html");
/// assert_eq!(block.get("url"), Some("/index.html"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NvBlock {
    pairs: Vec<(String, String)>,
}

impl NvBlock {
    /// Creates an empty block.
    pub fn new() -> Self {
        Self { pairs: vec![] }
    }

    /// Appends a pair. Order is preserved on the wire.
    pub fn insert(&mut self, name: &str, value: &str) {
        self.pairs.push((name.to_string(), value.to_string()));
    }

    /// Returns the value of the first pair with the given name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the block has no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterates over the pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Serializes the block to its uncompressed wire form.
    pub fn serialize(&self) -> Result<Vec<u8>, SpdyError> {
        if self.pairs.len() > u16::MAX as usize {
            return Err(SpdyError::ConnectionError(ErrorKind::OversizedPayload));
        }
        let mut out = Vec::new();
        out.extend_from_slice(&(self.pairs.len() as u16).to_be_bytes());
        for (name, value) in self.pairs.iter() {
            write_string(&mut out, name)?;
            write_string(&mut out, value)?;
        }
        Ok(out)
    }

    /// Parses a block from its uncompressed wire form.
    ///
    /// Empty names, empty values, duplicate names and trailing bytes are all
    /// rejected as connection-scoped violations, since a malformed block
    /// indicates corrupted shared compression state.
    pub fn parse(buf: &[u8]) -> Result<Self, SpdyError> {
        let mut cursor = Cursor { buf, pos: 0 };
        let count = cursor.read_u16()? as usize;
        let mut pairs = Vec::with_capacity(count.min(128));
        for _ in 0..count {
            let name = cursor.read_string()?;
            if name.is_empty() {
                return Err(SpdyError::ConnectionError(ErrorKind::InvalidControlFrame));
            }
            if pairs.iter().any(|(n, _): &(String, String)| *n == name) {
                return Err(SpdyError::ConnectionError(ErrorKind::InvalidControlFrame));
            }
            let value = cursor.read_string()?;
            if value.is_empty() {
                return Err(SpdyError::ConnectionError(ErrorKind::InvalidControlFrame));
            }
            pairs.push((name, value));
        }
        if cursor.pos != buf.len() {
            return Err(SpdyError::ConnectionError(ErrorKind::InvalidControlFrame));
        }
        Ok(Self { pairs })
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) -> Result<(), SpdyError> {
    if s.len() > u16::MAX as usize {
        return Err(SpdyError::ConnectionError(ErrorKind::OversizedPayload));
    }
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn read_u16(&mut self) -> Result<u16, SpdyError> {
        if self.pos + 2 > self.buf.len() {
            return Err(SpdyError::ConnectionError(ErrorKind::InvalidControlFrame));
        }
        let value = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    fn read_string(&mut self) -> Result<String, SpdyError> {
        let len = self.read_u16()? as usize;
        if self.pos + len > self.buf.len() {
            return Err(SpdyError::ConnectionError(ErrorKind::InvalidControlFrame));
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| SpdyError::ConnectionError(ErrorKind::InvalidControlFrame))
    }
}
