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

//! Incremental frame deserialization.
//!
//! [`FrameDecoder`] consumes wire bytes in arbitrarily sized pieces and
//! yields complete frames. Control frames are buffered until their payload is
//! whole; data frames are never buffered, each call yields whatever payload
//! bytes are available as a chunk and the FIN flag is reported only with the
//! final chunk of the frame.

use crate::compress::HeaderDecompressor;
use crate::error::{ErrorKind, ResetStatus, SpdyError};
use crate::frame::{
    Data, Frame, FrameFlags, Goaway, Payload, Priority, RstStream, SettingEntry, SettingId,
    Settings, StreamId, SynReply, SynStream, WindowUpdate, GOAWAY_TYPE, HEADERS_TYPE,
    MAX_STREAM_ID, NOOP_TYPE, PING_TYPE, RST_STREAM_TYPE, SETTINGS_TYPE, SPDY_VERSION,
    SYN_REPLY_TYPE, SYN_STREAM_TYPE, WINDOW_UPDATE_TYPE,
};
use crate::headers::NvBlock;

const FRAME_HEADER_SIZE: usize = 8;

// Control payloads are buffered whole, so their size is capped.
const MAX_CONTROL_PAYLOAD: usize = 64 * 1024;

/// The frames produced by one [`FrameDecoder::decode`] call.
#[derive(Debug)]
pub struct Frames {
    list: Vec<FrameKind>,
}

/// One decode result: a complete frame, or a marker that the input ended
/// inside a frame and more bytes are needed.
#[derive(Debug)]
pub enum FrameKind {
    /// A complete frame, or one data chunk of a data frame.
    Complete(Frame),

    /// The input ended partway through a frame.
    Partial,
}

impl Frames {
    fn new() -> Self {
        Self { list: Vec::new() }
    }

    fn push(&mut self, kind: FrameKind) {
        self.list.push(kind);
    }

    /// Returns the number of results.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the call produced no results.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Returns an iterator over the results.
    pub fn iter(&self) -> core::slice::Iter<'_, FrameKind> {
        self.list.iter()
    }
}

impl IntoIterator for Frames {
    type Item = FrameKind;
    type IntoIter = FramesIntoIter;

    fn into_iter(self) -> Self::IntoIter {
        FramesIntoIter {
            into_iter: self.list.into_iter(),
        }
    }
}

/// A consuming iterator over the results of one decode call.
pub struct FramesIntoIter {
    into_iter: std::vec::IntoIter<FrameKind>,
}

impl Iterator for FramesIntoIter {
    type Item = FrameKind;

    fn next(&mut self) -> Option<Self::Item> {
        self.into_iter.next()
    }
}

#[derive(Default)]
struct FrameHeader {
    control: bool,
    frame_type: u16,
    stream_id: StreamId,
    flags: u8,
    payload_length: usize,
    payload_consumed: usize,
}

enum Stage {
    Header,
    Payload,
}

/// An incremental frame deserializer holding the session-lifetime header
/// decompressor. Header blocks decode correctly only when frames are fed in
/// reception order.
pub struct FrameDecoder {
    buffer: Vec<u8>,
    stage: Stage,
    header: FrameHeader,
    decompressor: HeaderDecompressor,
}

impl FrameDecoder {
    /// Creates a `FrameDecoder`.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            stage: Stage::Header,
            header: FrameHeader::default(),
            decompressor: HeaderDecompressor::new(),
        }
    }

    /// Consumes one piece of input and returns every frame it completes.
    ///
    /// An error poisons the connection; the decoder must not be fed again
    /// after returning one.
    pub fn decode(&mut self, data: &[u8]) -> Result<Frames, SpdyError> {
        let mut frames = Frames::new();
        let mut input = data;
        loop {
            match self.stage {
                Stage::Header => {
                    if input.is_empty() {
                        if !self.buffer.is_empty() {
                            frames.push(FrameKind::Partial);
                        }
                        return Ok(frames);
                    }
                    let needed = FRAME_HEADER_SIZE - self.buffer.len();
                    if input.len() < needed {
                        self.buffer.extend_from_slice(input);
                        frames.push(FrameKind::Partial);
                        return Ok(frames);
                    }
                    self.buffer.extend_from_slice(&input[..needed]);
                    input = &input[needed..];
                    self.parse_header()?;
                }
                Stage::Payload if self.header.control => {
                    let needed = self.header.payload_length - self.buffer.len();
                    if input.len() < needed {
                        self.buffer.extend_from_slice(input);
                        frames.push(FrameKind::Partial);
                        return Ok(frames);
                    }
                    self.buffer.extend_from_slice(&input[..needed]);
                    input = &input[needed..];
                    if let Some(frame) = self.parse_control_payload()? {
                        frames.push(FrameKind::Complete(frame));
                    }
                    self.buffer.clear();
                    self.stage = Stage::Header;
                }
                Stage::Payload => {
                    let remaining = self.header.payload_length - self.header.payload_consumed;
                    if remaining == 0 {
                        frames.push(FrameKind::Complete(self.data_chunk(Vec::new(), true)));
                        self.stage = Stage::Header;
                        continue;
                    }
                    if input.is_empty() {
                        frames.push(FrameKind::Partial);
                        return Ok(frames);
                    }
                    let taken = input.len().min(remaining);
                    let chunk = input[..taken].to_vec();
                    input = &input[taken..];
                    self.header.payload_consumed += taken;
                    let last = self.header.payload_consumed == self.header.payload_length;
                    frames.push(FrameKind::Complete(self.data_chunk(chunk, last)));
                    if last {
                        self.stage = Stage::Header;
                    }
                }
            }
        }
    }

    fn data_chunk(&self, chunk: Vec<u8>, last: bool) -> Frame {
        let flags = if last {
            FrameFlags::new(self.header.flags)
        } else {
            FrameFlags::empty()
        };
        Frame::new(self.header.stream_id, flags, Payload::Data(Data::new(chunk)))
    }

    fn parse_header(&mut self) -> Result<(), SpdyError> {
        let first = read_u16(&self.buffer[0..2]);
        let control = first & 0x8000 != 0;
        let flags = self.buffer[4];
        let payload_length = read_u24(&self.buffer[5..8]) as usize;
        self.header = if control {
            // The version is checked before anything else about the frame.
            let version = first & 0x7FFF;
            if version != SPDY_VERSION {
                return Err(SpdyError::ConnectionError(ErrorKind::UnsupportedVersion));
            }
            if payload_length > MAX_CONTROL_PAYLOAD {
                return Err(SpdyError::ConnectionError(
                    ErrorKind::ControlPayloadTooLarge,
                ));
            }
            let frame_type = read_u16(&self.buffer[2..4]);
            check_control_length(frame_type, payload_length)?;
            FrameHeader {
                control,
                frame_type,
                stream_id: 0,
                flags,
                payload_length,
                payload_consumed: 0,
            }
        } else {
            FrameHeader {
                control,
                frame_type: 0,
                stream_id: read_u32(&self.buffer[0..4]) & MAX_STREAM_ID,
                flags,
                payload_length,
                payload_consumed: 0,
            }
        };
        self.buffer.clear();
        self.stage = Stage::Payload;
        Ok(())
    }

    fn parse_control_payload(&mut self) -> Result<Option<Frame>, SpdyError> {
        let flags = FrameFlags::new(self.header.flags);
        match self.header.frame_type {
            SYN_STREAM_TYPE => {
                let id = read_u32(&self.buffer[0..4]) & MAX_STREAM_ID;
                let associated_id = read_u32(&self.buffer[4..8]) & MAX_STREAM_ID;
                let priority = Priority::from_bits(self.buffer[8] >> 6);
                let headers = self.decode_headers(10)?;
                Ok(Some(Frame::new(
                    id,
                    flags,
                    Payload::SynStream(SynStream::new(associated_id, priority, headers)),
                )))
            }
            SYN_REPLY_TYPE => {
                let id = read_u32(&self.buffer[0..4]) & MAX_STREAM_ID;
                let headers = self.decode_headers(6)?;
                Ok(Some(Frame::new(
                    id,
                    flags,
                    Payload::SynReply(SynReply::new(headers)),
                )))
            }
            RST_STREAM_TYPE => {
                let id = read_u32(&self.buffer[0..4]) & MAX_STREAM_ID;
                let status = ResetStatus::from_wire(read_u32(&self.buffer[4..8])).ok_or(
                    SpdyError::ConnectionError(ErrorKind::InvalidControlFrame),
                )?;
                Ok(Some(Frame::new(
                    id,
                    flags,
                    Payload::RstStream(RstStream::new(status)),
                )))
            }
            SETTINGS_TYPE => {
                let settings = self.parse_settings()?;
                Ok(Some(Frame::new(0, flags, Payload::Settings(settings))))
            }
            GOAWAY_TYPE => {
                let last = read_u32(&self.buffer[0..4]) & MAX_STREAM_ID;
                Ok(Some(Frame::new(0, flags, Payload::Goaway(Goaway::new(last)))))
            }
            WINDOW_UPDATE_TYPE => {
                let id = read_u32(&self.buffer[0..4]) & MAX_STREAM_ID;
                let delta = read_u32(&self.buffer[4..8]);
                Ok(Some(Frame::new(
                    id,
                    flags,
                    Payload::WindowUpdate(WindowUpdate::new(delta)),
                )))
            }
            HEADERS_TYPE => {
                // The frame is dropped, but its block must still pass
                // through the decompressor to keep the shared context in
                // sync for the frames after it.
                self.decompressor.decompress(&self.buffer[6..])?;
                Ok(None)
            }
            // NOOP carries nothing. PING is recognized so its payload can
            // be discarded, but it produces no frame.
            NOOP_TYPE | PING_TYPE => Ok(None),
            _ => Err(SpdyError::ConnectionError(ErrorKind::InvalidControlFrame)),
        }
    }

    fn decode_headers(&mut self, offset: usize) -> Result<NvBlock, SpdyError> {
        let plain = self.decompressor.decompress(&self.buffer[offset..])?;
        NvBlock::parse(&plain)
    }

    fn parse_settings(&self) -> Result<Settings, SpdyError> {
        let count = read_u32(&self.buffer[0..4]) as usize;
        if self.buffer.len() != 4 + count * 8 {
            return Err(SpdyError::ConnectionError(ErrorKind::InvalidControlFrame));
        }
        let mut entries = Vec::with_capacity(count);
        for chunk in self.buffer[4..].chunks_exact(8) {
            let word = read_u32(&chunk[0..4]);
            let value = read_u32(&chunk[4..8]);
            // Entries with identifiers this client does not know are skipped.
            if let Some(id) = SettingId::from_wire(word & 0x00FF_FFFF) {
                entries.push(SettingEntry::with_flags(id, (word >> 24) as u8, value));
            }
        }
        Ok(Settings::new(entries))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn check_control_length(frame_type: u16, length: usize) -> Result<(), SpdyError> {
    let valid = match frame_type {
        SYN_STREAM_TYPE => length >= 10,
        SYN_REPLY_TYPE => length >= 6,
        RST_STREAM_TYPE | WINDOW_UPDATE_TYPE => length == 8,
        SETTINGS_TYPE => length >= 4,
        GOAWAY_TYPE => length == 4,
        HEADERS_TYPE => length >= 6,
        NOOP_TYPE | PING_TYPE => true,
        _ => return Err(SpdyError::ConnectionError(ErrorKind::InvalidControlFrame)),
    };
    if valid {
        Ok(())
    } else {
        Err(SpdyError::ConnectionError(ErrorKind::InvalidControlFrame))
    }
}

fn read_u16(buf: &[u8]) -> u16 {
    u16::from_be_bytes([buf[0], buf[1]])
}

fn read_u24(buf: &[u8]) -> u32 {
    u32::from_be_bytes([0, buf[0], buf[1], buf[2]])
}

fn read_u32(buf: &[u8]) -> u32 {
    u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

#[cfg(test)]
mod ut_decoder {
    use super::{FrameDecoder, FrameKind, Frames};
    use crate::encoder::FrameEncoder;
    use crate::error::{ErrorKind, ResetStatus, SpdyError};
    use crate::frame::{
        Frame, FrameFlags, Payload, Priority, SettingId, SynReply, SynStream,
    };
    use crate::headers::NvBlock;

    fn complete(frames: Frames) -> Vec<Frame> {
        frames
            .into_iter()
            .filter_map(|kind| match kind {
                FrameKind::Complete(frame) => Some(frame),
                FrameKind::Partial => None,
            })
            .collect()
    }

    /// UT test case for decoding a whole `RST_STREAM`.
    ///
    /// # Brief
    /// 1. Feeds a complete reset frame in one call.
    /// 2. Checks the stream id and the status.
    #[test]
    fn ut_decode_rst_stream() {
        let mut decoder = FrameDecoder::new();
        let bytes = [
            0x80, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00, 0x08, 0, 0, 0, 5, 0, 0, 0, 3,
        ];
        let frames = complete(decoder.decode(&bytes).unwrap());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].stream_id(), 5);
        match frames[0].payload() {
            Payload::RstStream(rst) => assert_eq!(rst.status(), ResetStatus::RefusedStream),
            _ => panic!("wrong payload"),
        }
    }

    /// UT test case for byte-at-a-time delivery.
    ///
    /// # Brief
    /// 1. Feeds a reset frame one byte per call.
    /// 2. Checks that every call but the last yields only a partial marker.
    /// 3. Checks that the last byte completes the frame.
    #[test]
    fn ut_decode_split_delivery() {
        let mut decoder = FrameDecoder::new();
        let bytes = [
            0x80, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00, 0x08, 0, 0, 0, 9, 0, 0, 0, 5,
        ];
        for byte in &bytes[..bytes.len() - 1] {
            let frames = decoder.decode(core::slice::from_ref(byte)).unwrap();
            assert_eq!(frames.len(), 1);
            assert!(matches!(frames.iter().next(), Some(FrameKind::Partial)));
        }
        let frames = complete(decoder.decode(&bytes[bytes.len() - 1..]).unwrap());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].stream_id(), 9);
    }

    /// UT test case for incremental data chunks.
    ///
    /// # Brief
    /// 1. Feeds a FIN-flagged 6-byte data frame in two 3-byte pieces after
    ///    the header.
    /// 2. Checks that each piece is delivered immediately.
    /// 3. Checks that only the final chunk carries FIN.
    #[test]
    fn ut_decode_data_chunks() {
        let mut decoder = FrameDecoder::new();
        let header = [0, 0, 0, 7, 0x01, 0x00, 0x00, 0x06];
        assert!(matches!(
            decoder.decode(&header).unwrap().iter().next(),
            Some(FrameKind::Partial)
        ));
        let first = complete(decoder.decode(&[1, 2, 3]).unwrap());
        assert_eq!(first.len(), 1);
        assert!(!first[0].flags().is_fin());
        match first[0].payload() {
            Payload::Data(data) => assert_eq!(data.data(), [1, 2, 3]),
            _ => panic!("wrong payload"),
        }
        let second = complete(decoder.decode(&[4, 5, 6]).unwrap());
        assert_eq!(second.len(), 1);
        assert!(second[0].flags().is_fin());
        assert_eq!(second[0].stream_id(), 7);
    }

    /// UT test case for a zero-length FIN-only data frame.
    ///
    /// # Brief
    /// 1. Feeds a data frame header with length 0 and the FIN flag.
    /// 2. Checks that an empty FIN chunk is still delivered.
    #[test]
    fn ut_decode_empty_fin_data() {
        let mut decoder = FrameDecoder::new();
        let frames = complete(decoder.decode(&[0, 0, 0, 3, 0x01, 0, 0, 0]).unwrap());
        assert_eq!(frames.len(), 1);
        assert!(frames[0].flags().is_fin());
        match frames[0].payload() {
            Payload::Data(data) => assert_eq!(data.size(), 0),
            _ => panic!("wrong payload"),
        }
    }

    /// UT test case for `NOOP` elision.
    ///
    /// # Brief
    /// 1. Feeds a reset, a `NOOP` and another reset back to back.
    /// 2. Checks that exactly the two resets come out.
    #[test]
    fn ut_decode_noop_skipped() {
        let mut decoder = FrameDecoder::new();
        let mut bytes = vec![
            0x80, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00, 0x08, 0, 0, 0, 1, 0, 0, 0, 5,
        ];
        bytes.extend_from_slice(&[0x80, 0x02, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(&[
            0x80, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00, 0x08, 0, 0, 0, 3, 0, 0, 0, 5,
        ]);
        let frames = complete(decoder.decode(&bytes).unwrap());
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].stream_id(), 1);
        assert_eq!(frames[1].stream_id(), 3);
    }

    /// UT test case for the version check.
    ///
    /// # Brief
    /// 1. Feeds a control frame with version 3 and a nonsense type.
    /// 2. Checks that the version error wins over the type error.
    #[test]
    fn ut_decode_unsupported_version() {
        let mut decoder = FrameDecoder::new();
        let err = decoder
            .decode(&[0x80, 0x03, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x00])
            .unwrap_err();
        assert_eq!(
            err,
            SpdyError::ConnectionError(ErrorKind::UnsupportedVersion)
        );
    }

    /// UT test case for unknown control types.
    ///
    /// # Brief
    /// 1. Feeds control frames with type 0 and type 10.
    /// 2. Checks that both are invalid.
    #[test]
    fn ut_decode_unknown_type() {
        for frame_type in [0u8, 10] {
            let mut decoder = FrameDecoder::new();
            let err = decoder
                .decode(&[0x80, 0x02, 0x00, frame_type, 0x00, 0x00, 0x00, 0x00])
                .unwrap_err();
            assert_eq!(
                err,
                SpdyError::ConnectionError(ErrorKind::InvalidControlFrame)
            );
        }
    }

    /// UT test case for the control payload cap.
    ///
    /// # Brief
    /// 1. Feeds a `SYN_STREAM` header announcing a payload just over 64 KiB.
    /// 2. Checks that the frame is rejected before any payload arrives.
    #[test]
    fn ut_decode_control_payload_too_large() {
        let mut decoder = FrameDecoder::new();
        let err = decoder
            .decode(&[0x80, 0x02, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01])
            .unwrap_err();
        assert_eq!(
            err,
            SpdyError::ConnectionError(ErrorKind::ControlPayloadTooLarge)
        );
    }

    /// UT test case for fixed-length violations.
    ///
    /// # Brief
    /// 1. Feeds a reset whose length field is 7 instead of 8.
    /// 2. Feeds a goaway whose length field is 8 instead of 4.
    /// 3. Checks that both are invalid.
    #[test]
    fn ut_decode_bad_fixed_lengths() {
        let mut decoder = FrameDecoder::new();
        let err = decoder
            .decode(&[0x80, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00, 0x07])
            .unwrap_err();
        assert_eq!(
            err,
            SpdyError::ConnectionError(ErrorKind::InvalidControlFrame)
        );
        let mut decoder = FrameDecoder::new();
        let err = decoder
            .decode(&[0x80, 0x02, 0x00, 0x07, 0x00, 0x00, 0x00, 0x08])
            .unwrap_err();
        assert_eq!(
            err,
            SpdyError::ConnectionError(ErrorKind::InvalidControlFrame)
        );
    }

    /// UT test case for reset status validation.
    ///
    /// # Brief
    /// 1. Feeds a reset whose status code is 0.
    /// 2. Checks that the frame is invalid.
    #[test]
    fn ut_decode_bad_rst_status() {
        let mut decoder = FrameDecoder::new();
        let err = decoder
            .decode(&[
                0x80, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00, 0x08, 0, 0, 0, 1, 0, 0, 0, 0,
            ])
            .unwrap_err();
        assert_eq!(
            err,
            SpdyError::ConnectionError(ErrorKind::InvalidControlFrame)
        );
    }

    /// UT test case for `SETTINGS` parsing.
    ///
    /// # Brief
    /// 1. Feeds a settings frame with a known and an unknown identifier.
    /// 2. Checks that only the known entry survives with its flags intact.
    /// 3. Feeds a settings frame whose count disagrees with its length and
    ///    checks that it is invalid.
    #[test]
    fn ut_decode_settings() {
        let mut decoder = FrameDecoder::new();
        let bytes = [
            0x80, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x14, // length 20
            0, 0, 0, 2, // two entries
            0x02, 0x00, 0x00, 0x04, 0, 0, 0, 50, // max concurrent, persisted
            0x00, 0x00, 0x00, 0x63, 0, 0, 0, 1, // unknown id 99
        ];
        let frames = complete(decoder.decode(&bytes).unwrap());
        assert_eq!(frames.len(), 1);
        match frames[0].payload() {
            Payload::Settings(settings) => {
                assert_eq!(settings.entries().len(), 1);
                let entry = &settings.entries()[0];
                assert_eq!(entry.id(), SettingId::MaxConcurrentStreams);
                assert_eq!(entry.value(), 50);
                assert!(entry.persisted());
            }
            _ => panic!("wrong payload"),
        }

        let mut decoder = FrameDecoder::new();
        let err = decoder
            .decode(&[
                0x80, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x0C, // length 12
                0, 0, 0, 2, // claims two entries
                0x00, 0x00, 0x00, 0x04, 0, 0, 0, 50,
            ])
            .unwrap_err();
        assert_eq!(
            err,
            SpdyError::ConnectionError(ErrorKind::InvalidControlFrame)
        );
    }

    /// UT test case for `HEADERS` elision.
    ///
    /// # Brief
    /// 1. Builds a `HEADERS` frame and a `SYN_REPLY` whose blocks share one
    ///    compression context.
    /// 2. Decodes both in order.
    /// 3. Checks that only the reply comes out and that its block decodes,
    ///    proving the dropped frame still advanced the shared context.
    #[test]
    fn ut_decode_headers_frame_keeps_context() {
        let mut compressor = crate::compress::HeaderCompressor::new();
        let mut decoder = FrameDecoder::new();

        let mut trailer = NvBlock::new();
        trailer.insert("x-extra", "yes");
        let block = compressor.compress(&trailer.serialize().unwrap()).unwrap();
        let mut bytes = vec![0x80, 0x02, 0x00, 0x08, 0x00];
        bytes.extend_from_slice(&(6 + block.len() as u32).to_be_bytes()[1..]);
        bytes.extend_from_slice(&[0, 0, 0, 1, 0, 0]);
        bytes.extend_from_slice(&block);

        let mut response = NvBlock::new();
        response.insert("status", "200");
        let block = compressor.compress(&response.serialize().unwrap()).unwrap();
        bytes.extend_from_slice(&[0x80, 0x02, 0x00, 0x02, 0x00]);
        bytes.extend_from_slice(&(6 + block.len() as u32).to_be_bytes()[1..]);
        bytes.extend_from_slice(&[0, 0, 0, 1, 0, 0]);
        bytes.extend_from_slice(&block);

        let frames = complete(decoder.decode(&bytes).unwrap());
        assert_eq!(frames.len(), 1);
        match frames[0].payload() {
            Payload::SynReply(decoded) => assert_eq!(decoded.headers(), &response),
            _ => panic!("wrong payload"),
        }
    }

    /// UT test case for header-carrying frames through the shared context.
    ///
    /// # Brief
    /// 1. Encodes a `SYN_STREAM` and a `SYN_REPLY` with one encoder.
    /// 2. Decodes both in order with one decoder.
    /// 3. Checks ids, priority and every header pair.
    #[test]
    fn ut_decode_compressed_headers_in_order() {
        let mut encoder = FrameEncoder::new();
        let mut decoder = FrameDecoder::new();

        let mut request = NvBlock::new();
        request.insert("method", "get");
        request.insert("url", "/index.html");
        let syn = Frame::new(
            1,
            FrameFlags::empty(),
            Payload::SynStream(SynStream::new(0, Priority::Highest, request.clone())),
        );

        let mut response = NvBlock::new();
        response.insert("status", "200");
        response.insert("version", "HTTP/1.1");
        let reply = Frame::new(
            1,
            FrameFlags::empty(),
            Payload::SynReply(SynReply::new(response.clone())),
        );

        let mut bytes = encoder.encode(&syn).unwrap();
        bytes.extend_from_slice(&encoder.encode(&reply).unwrap());

        let frames = complete(decoder.decode(&bytes).unwrap());
        assert_eq!(frames.len(), 2);
        match frames[0].payload() {
            Payload::SynStream(decoded) => {
                assert_eq!(frames[0].stream_id(), 1);
                assert_eq!(decoded.priority(), Priority::Highest);
                assert_eq!(decoded.headers(), &request);
            }
            _ => panic!("wrong payload"),
        }
        match frames[1].payload() {
            Payload::SynReply(decoded) => assert_eq!(decoded.headers(), &response),
            _ => panic!("wrong payload"),
        }
    }
}
