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

//! Shared-context header-block compression.
//!
//! Header blocks are deflate-compressed against a preset dictionary with one
//! compressor and one decompressor per session lifetime, so the compression
//! context accumulates across frames. Blocks must therefore be compressed in
//! transmission order and decompressed in reception order; each block ends
//! with a sync flush so the receiver can decode it without waiting for the
//! next one.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::error::{ErrorKind, SpdyError};

const COMPRESSOR_LEVEL: u32 = 9;
const COMPRESSOR_WINDOW_BITS: u8 = 11;

/// The preset dictionary shared by both directions. The trailing NUL is part
/// of the dictionary.
pub const HEADER_DICTIONARY: &[u8] =
    b"optionsgetheadpostputdeletetraceacceptaccept-charsetaccept-encodingaccept-\
    languageauthorizationexpectfromhostif-modified-sinceif-matchif-none-matchi\
    f-rangeif-unmodifiedsincemax-forwardsproxy-authorizationrangerefererteuser\
    -agent10010120020120220320420520630030130230330430530630740040140240340440\
    5406407408409410411412413414415416417500501502503504505accept-rangesageeta\
    glocationproxy-authenticatepublicretry-afterservervarywarningwww-authentic\
    ateallowcontent-basecontent-encodingcache-controlconnectiondatetrailertran\
    sfer-encodingupgradeviawarningcontent-languagecontent-lengthcontent-locati\
    oncontent-md5content-rangecontent-typeetagexpireslast-modifiedset-cookieMo\
    ndayTuesdayWednesdayThursdayFridaySaturdaySundayJanFebMarAprMayJunJulAugSe\
    pOctNovDecchunkedtext/htmlimage/pngimage/jpgimage/gifapplication/xmlapplic\
    ation/xhtmltext/plainpublicmax-agecharset=iso-8859-1utf-8gzipdeflateHTTP/1\
    .1statusversionurl\0";

/// Session-lifetime header-block compressor. Initialized lazily on first
/// use, so construction never fails.
pub struct HeaderCompressor {
    ctx: Option<Compress>,
}

/// Session-lifetime header-block decompressor.
pub struct HeaderDecompressor {
    ctx: Decompress,
}

impl HeaderCompressor {
    /// Creates a `HeaderCompressor`.
    pub fn new() -> Self {
        Self { ctx: None }
    }

    fn context(&mut self) -> Result<&mut Compress, SpdyError> {
        if self.ctx.is_none() {
            let mut ctx = Compress::new_with_window_bits(
                Compression::new(COMPRESSOR_LEVEL),
                true,
                COMPRESSOR_WINDOW_BITS,
            );
            ctx.set_dictionary(HEADER_DICTIONARY)
                .map_err(|_| SpdyError::ConnectionError(ErrorKind::CompressFailure))?;
            self.ctx = Some(ctx);
        }
        // The option was just filled above.
        match self.ctx.as_mut() {
            Some(ctx) => Ok(ctx),
            None => Err(SpdyError::ConnectionError(ErrorKind::CompressFailure)),
        }
    }

    /// Compresses one header block and flushes it, returning the complete
    /// compressed block.
    pub fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>, SpdyError> {
        let ctx = self.context()?;
        let mut out = Vec::with_capacity(input.len() / 2 + 32);
        let mut buf = [0u8; 4096];
        let mut consumed = 0usize;
        loop {
            let before_in = ctx.total_in();
            let before_out = ctx.total_out();
            let status = ctx
                .compress(&input[consumed..], &mut buf, FlushCompress::Sync)
                .map_err(|_| SpdyError::ConnectionError(ErrorKind::CompressFailure))?;
            consumed += (ctx.total_in() - before_in) as usize;
            let produced = (ctx.total_out() - before_out) as usize;
            out.extend_from_slice(&buf[..produced]);
            if let Status::StreamEnd = status {
                break;
            }
            // The sync flush is complete once all input is consumed and the
            // output buffer was not filled to the brim.
            if consumed == input.len() && produced < buf.len() {
                break;
            }
        }
        Ok(out)
    }
}

impl Default for HeaderCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderDecompressor {
    /// Creates a `HeaderDecompressor`.
    pub fn new() -> Self {
        Self {
            ctx: Decompress::new_with_window_bits(true, COMPRESSOR_WINDOW_BITS),
        }
    }

    /// Decompresses one header block.
    ///
    /// The first block triggers the needs-dictionary signal once the stream
    /// header names the preset dictionary; the dictionary checksum is
    /// verified when it is applied. Any inflate failure, including one caused
    /// by blocks applied out of order, is a decompress failure that poisons
    /// the connection.
    pub fn decompress(&mut self, input: &[u8]) -> Result<Vec<u8>, SpdyError> {
        let mut out = Vec::with_capacity(input.len() * 4);
        let mut buf = [0u8; 4096];
        let mut consumed = 0usize;
        loop {
            let before_in = self.ctx.total_in();
            let before_out = self.ctx.total_out();
            let result = self
                .ctx
                .decompress(&input[consumed..], &mut buf, FlushDecompress::Sync);
            consumed += (self.ctx.total_in() - before_in) as usize;
            let produced = (self.ctx.total_out() - before_out) as usize;
            out.extend_from_slice(&buf[..produced]);
            match result {
                Ok(Status::StreamEnd) => break,
                Ok(_) => {
                    if consumed == input.len() && produced < buf.len() {
                        break;
                    }
                }
                Err(err) => {
                    if err.needs_dictionary().is_none() {
                        return Err(SpdyError::ConnectionError(ErrorKind::DecompressFailure));
                    }
                    // Applying the dictionary verifies its checksum against
                    // the id the stream asked for.
                    self.ctx
                        .set_dictionary(HEADER_DICTIONARY)
                        .map_err(|_| {
                            SpdyError::ConnectionError(ErrorKind::DecompressFailure)
                        })?;
                }
            }
        }
        Ok(out)
    }
}

impl Default for HeaderDecompressor {
    fn default() -> Self {
        Self::new()
    }
}
