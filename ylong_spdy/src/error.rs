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

//! Errors that may occur in the SPDY frame layer.
//!
//! [`SpdyError`] distinguishes stream-scoped violations, which only require
//! resetting a single stream, from connection-scoped violations, which poison
//! the shared codec state and must terminate the whole session.

use core::fmt::{Debug, Display, Formatter};
use std::error::Error;

/// Errors that may occur while encoding or decoding frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpdyError {
    /// An error scoped to a single stream. Carries the stream id and the
    /// reset status to send (or that was received) for it.
    StreamError(u32, ResetStatus),

    /// An error that poisons the whole connection, for example a malformed
    /// frame or a header-block decompression failure.
    ConnectionError(ErrorKind),
}

/// Status codes carried by `RST_STREAM` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStatus {
    /// A generic protocol violation on the stream.
    ProtocolError = 1,

    /// A frame referenced a stream that is not active.
    InvalidStream = 2,

    /// The receiver refused to create the stream.
    RefusedStream = 3,

    /// The protocol version is not supported.
    UnsupportedVersion = 4,

    /// The stream was cancelled by its creator.
    Cancel = 5,

    /// An internal error on the stream.
    InternalError = 6,

    /// A flow-control rule was violated on the stream.
    FlowControlError = 7,
}

impl ResetStatus {
    /// Parses a wire status value. Status `0` and values above `7` are not
    /// assigned and yield `None`.
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::ProtocolError),
            2 => Some(Self::InvalidStream),
            3 => Some(Self::RefusedStream),
            4 => Some(Self::UnsupportedVersion),
            5 => Some(Self::Cancel),
            6 => Some(Self::InternalError),
            7 => Some(Self::FlowControlError),
            _ => None,
        }
    }

    /// Returns the wire value of the status.
    pub fn into_wire(self) -> u32 {
        self as u32
    }
}

/// Connection-scoped error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A control frame whose layout or type is invalid.
    InvalidControlFrame,

    /// A control frame larger than the decoder is willing to buffer.
    ControlPayloadTooLarge,

    /// A frame carrying an unsupported protocol version.
    UnsupportedVersion,

    /// A payload that cannot be represented in the 24-bit length field.
    OversizedPayload,

    /// Header-block compression failed.
    CompressFailure,

    /// Header-block decompression failed, including out-of-order application
    /// of the shared compression context.
    DecompressFailure,
}

impl Display for SpdyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::StreamError(id, status) => {
                write!(f, "stream {id} error: {status:?}")
            }
            Self::ConnectionError(kind) => write!(f, "connection error: {kind:?}"),
        }
    }
}

impl Error for SpdyError {}
