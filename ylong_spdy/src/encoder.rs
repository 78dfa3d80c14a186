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

//! Frame serialization.
//!
//! [`FrameEncoder`] turns a [`Frame`] into complete wire bytes, header block
//! compression included. Because header blocks share one compression context
//! per session, frames carrying them must be encoded in exactly the order
//! they go out on the wire.

use crate::compress::HeaderCompressor;
use crate::error::{ErrorKind, SpdyError};
use crate::frame::{
    Frame, Payload, Settings, MAX_STREAM_ID, GOAWAY_TYPE, RST_STREAM_TYPE, SETTINGS_TYPE,
    SPDY_VERSION, SYN_REPLY_TYPE, SYN_STREAM_TYPE, WINDOW_UPDATE_TYPE,
};

const CONTROL_BIT: u16 = 0x8000;

// The length field of the common header is 24 bits wide.
const MAX_PAYLOAD_SIZE: usize = (1 << 24) - 1;

/// A frame serializer holding the session-lifetime header compressor.
///
/// # Examples
///
/// ```
/// use ylong_spdy::encoder::FrameEncoder;
/// use ylong_spdy::error::ResetStatus;
/// use ylong_spdy::frame::{Frame, FrameFlags, Payload, RstStream};
///
/// let mut encoder = FrameEncoder::new();
/// let frame = Frame::new(
///     1,
///     FrameFlags::empty(),
///     Payload::RstStream(RstStream::new(ResetStatus::Cancel)),
/// );
/// let bytes = encoder.encode(&frame).unwrap();
/// assert_eq!(bytes.len(), 16);
/// ```
pub struct FrameEncoder {
    compressor: HeaderCompressor,
}

impl FrameEncoder {
    /// Creates a `FrameEncoder`.
    pub fn new() -> Self {
        Self {
            compressor: HeaderCompressor::new(),
        }
    }

    /// Serializes one frame into complete wire bytes.
    pub fn encode(&mut self, frame: &Frame) -> Result<Vec<u8>, SpdyError> {
        match frame.payload() {
            Payload::SynStream(syn) => {
                let serialized = syn.headers().serialize()?;
                let block = self.compressor.compress(&serialized)?;
                let mut payload = Vec::with_capacity(10 + block.len());
                put_u32(&mut payload, frame.stream_id() & MAX_STREAM_ID);
                put_u32(&mut payload, syn.associated_id() & MAX_STREAM_ID);
                put_u16(&mut payload, u16::from(syn.priority().bits()) << 14);
                payload.extend_from_slice(&block);
                control_frame(SYN_STREAM_TYPE, frame.flags().bits(), payload)
            }
            Payload::SynReply(reply) => {
                let serialized = reply.headers().serialize()?;
                let block = self.compressor.compress(&serialized)?;
                let mut payload = Vec::with_capacity(6 + block.len());
                put_u32(&mut payload, frame.stream_id() & MAX_STREAM_ID);
                put_u16(&mut payload, 0);
                payload.extend_from_slice(&block);
                control_frame(SYN_REPLY_TYPE, frame.flags().bits(), payload)
            }
            Payload::RstStream(rst) => {
                let mut payload = Vec::with_capacity(8);
                put_u32(&mut payload, frame.stream_id() & MAX_STREAM_ID);
                put_u32(&mut payload, rst.status().into_wire());
                control_frame(RST_STREAM_TYPE, frame.flags().bits(), payload)
            }
            Payload::Settings(settings) => {
                let payload = settings_payload(settings);
                control_frame(SETTINGS_TYPE, frame.flags().bits(), payload)
            }
            Payload::Goaway(goaway) => {
                let mut payload = Vec::with_capacity(4);
                put_u32(&mut payload, goaway.last_accepted_id() & MAX_STREAM_ID);
                control_frame(GOAWAY_TYPE, frame.flags().bits(), payload)
            }
            Payload::WindowUpdate(update) => {
                let mut payload = Vec::with_capacity(8);
                put_u32(&mut payload, frame.stream_id() & MAX_STREAM_ID);
                put_u32(&mut payload, update.delta());
                control_frame(WINDOW_UPDATE_TYPE, frame.flags().bits(), payload)
            }
            Payload::Data(data) => {
                if data.size() > MAX_PAYLOAD_SIZE {
                    return Err(SpdyError::ConnectionError(ErrorKind::OversizedPayload));
                }
                let mut out = Vec::with_capacity(8 + data.size());
                put_u32(&mut out, frame.stream_id() & MAX_STREAM_ID);
                out.push(frame.flags().bits());
                put_u24(&mut out, data.size() as u32);
                out.extend_from_slice(data.data());
                Ok(out)
            }
        }
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn control_frame(frame_type: u16, flags: u8, payload: Vec<u8>) -> Result<Vec<u8>, SpdyError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(SpdyError::ConnectionError(ErrorKind::OversizedPayload));
    }
    let mut out = Vec::with_capacity(8 + payload.len());
    put_u16(&mut out, CONTROL_BIT | SPDY_VERSION);
    put_u16(&mut out, frame_type);
    out.push(flags);
    put_u24(&mut out, payload.len() as u32);
    out.extend_from_slice(&payload);
    Ok(out)
}

fn settings_payload(settings: &Settings) -> Vec<u8> {
    let entries = settings.entries();
    let mut payload = Vec::with_capacity(4 + entries.len() * 8);
    put_u32(&mut payload, entries.len() as u32);
    for entry in entries {
        put_u32(
            &mut payload,
            (u32::from(entry.flags()) << 24) | entry.id().into_wire(),
        );
        put_u32(&mut payload, entry.value());
    }
    payload
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn put_u24(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes()[1..]);
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod ut_encoder {
    use super::FrameEncoder;
    use crate::error::{ErrorKind, ResetStatus, SpdyError};
    use crate::frame::{
        Data, Frame, FrameFlags, Goaway, Payload, Priority, RstStream, SettingEntry, SettingId,
        Settings, SynStream, WindowUpdate, SETTING_FLAG_PLEASE_PERSIST,
    };
    use crate::headers::NvBlock;

    /// UT test case for `RST_STREAM` serialization.
    ///
    /// # Brief
    /// 1. Encodes a reset of stream 5 with status CANCEL.
    /// 2. Checks every byte of the result.
    #[test]
    fn ut_encode_rst_stream() {
        let mut encoder = FrameEncoder::new();
        let frame = Frame::new(
            5,
            FrameFlags::empty(),
            Payload::RstStream(RstStream::new(ResetStatus::Cancel)),
        );
        assert_eq!(
            encoder.encode(&frame).unwrap(),
            [0x80, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00, 0x08, 0, 0, 0, 5, 0, 0, 0, 5]
        );
    }

    /// UT test case for `GOAWAY` serialization.
    ///
    /// # Brief
    /// 1. Encodes a goaway naming stream 7 as the last processed id.
    /// 2. Checks every byte of the result.
    #[test]
    fn ut_encode_goaway() {
        let mut encoder = FrameEncoder::new();
        let frame = Frame::new(0, FrameFlags::empty(), Payload::Goaway(Goaway::new(7)));
        assert_eq!(
            encoder.encode(&frame).unwrap(),
            [0x80, 0x02, 0x00, 0x07, 0x00, 0x00, 0x00, 0x04, 0, 0, 0, 7]
        );
    }

    /// UT test case for `WINDOW_UPDATE` serialization.
    ///
    /// # Brief
    /// 1. Encodes a credit of 0x1000 on stream 3.
    /// 2. Checks every byte of the result.
    #[test]
    fn ut_encode_window_update() {
        let mut encoder = FrameEncoder::new();
        let frame = Frame::new(
            3,
            FrameFlags::empty(),
            Payload::WindowUpdate(WindowUpdate::new(0x1000)),
        );
        assert_eq!(
            encoder.encode(&frame).unwrap(),
            [0x80, 0x02, 0x00, 0x09, 0x00, 0x00, 0x00, 0x08, 0, 0, 0, 3, 0, 0, 0x10, 0]
        );
    }

    /// UT test case for `SETTINGS` serialization.
    ///
    /// # Brief
    /// 1. Encodes two entries, one carrying the persist-request flag.
    /// 2. Checks the count, the flags/id words and the values.
    #[test]
    fn ut_encode_settings() {
        let mut encoder = FrameEncoder::new();
        let settings = Settings::new(vec![
            SettingEntry::new(SettingId::MaxConcurrentStreams, 100),
            SettingEntry::with_flags(
                SettingId::CurrentCwnd,
                SETTING_FLAG_PLEASE_PERSIST,
                10,
            ),
        ]);
        let frame = Frame::new(0, FrameFlags::empty(), Payload::Settings(settings));
        assert_eq!(
            encoder.encode(&frame).unwrap(),
            [
                0x80, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x14, // header, length 20
                0, 0, 0, 2, // two entries
                0x00, 0x00, 0x00, 0x04, 0, 0, 0, 100, // max concurrent streams
                0x01, 0x00, 0x00, 0x05, 0, 0, 0, 10, // cwnd, please-persist
            ]
        );
    }

    /// UT test case for data frame serialization.
    ///
    /// # Brief
    /// 1. Encodes a FIN-flagged data frame on stream 9.
    /// 2. Checks the header bytes and the raw payload.
    #[test]
    fn ut_encode_data() {
        let mut encoder = FrameEncoder::new();
        let mut flags = FrameFlags::empty();
        flags.set_fin(true);
        let frame = Frame::new(9, flags, Payload::Data(Data::new(vec![0xAA, 0xBB])));
        assert_eq!(
            encoder.encode(&frame).unwrap(),
            [0, 0, 0, 9, 0x01, 0x00, 0x00, 0x02, 0xAA, 0xBB]
        );
    }

    /// UT test case for the `SYN_STREAM` fixed fields.
    ///
    /// # Brief
    /// 1. Encodes a lowest-priority stream open with an associated stream.
    /// 2. Checks the common header and the fixed 10 payload bytes that
    ///    precede the compressed block.
    #[test]
    fn ut_encode_syn_stream_fixed_fields() {
        let mut encoder = FrameEncoder::new();
        let mut headers = NvBlock::new();
        headers.insert("url", "/");
        let frame = Frame::new(
            11,
            FrameFlags::empty(),
            Payload::SynStream(SynStream::new(4, Priority::Lowest, headers)),
        );
        let bytes = encoder.encode(&frame).unwrap();
        assert_eq!(&bytes[..4], [0x80, 0x02, 0x00, 0x01]);
        assert_eq!(bytes[4], 0x00);
        let length = u32::from_be_bytes([0, bytes[5], bytes[6], bytes[7]]) as usize;
        assert_eq!(bytes.len(), 8 + length);
        assert!(length > 10);
        assert_eq!(&bytes[8..12], [0, 0, 0, 11]);
        assert_eq!(&bytes[12..16], [0, 0, 0, 4]);
        // Priority lives in the top 2 bits of the next 16.
        assert_eq!(&bytes[16..18], [0xC0, 0x00]);
    }

    /// UT test case for oversized data payloads.
    ///
    /// # Brief
    /// 1. Encodes a data frame one byte larger than the 24-bit length field
    ///    can describe.
    /// 2. Checks that the error is connection-scoped.
    #[test]
    fn ut_encode_oversized_data() {
        let mut encoder = FrameEncoder::new();
        let frame = Frame::new(
            1,
            FrameFlags::empty(),
            Payload::Data(Data::new(vec![0; 1 << 24])),
        );
        assert_eq!(
            encoder.encode(&frame).unwrap_err(),
            SpdyError::ConnectionError(ErrorKind::OversizedPayload)
        );
    }
}
