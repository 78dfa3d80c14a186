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

//! Multiplexed session plumbing.
//!
//! A [`SpdySession`] owns one connection and runs three coroutines on it:
//!
//! - `SendData` serializes queued frames onto the write half, highest
//!   priority first, one frame in flight at a time.
//! - `RecvData` reads the socket, decodes frames and forwards each one to
//!   the manager before the next read.
//! - `ConnManager` holds the stream table and turns decoded frames and user
//!   commands into stream events and outgoing frames.
//!
//! User-facing handles ([`SpdySession`], [`SpdyStream`]) talk to the manager
//! over channels only, so they stay `Send` and never touch the socket.

mod input;
mod manager;
mod output;
mod pool;
mod session;
mod stream;
mod streams;
mod window;

use ylong_spdy::error::{ResetStatus, SpdyError};
use ylong_spdy::frame::{Frame, Priority, StreamId};
use ylong_spdy::headers::NvBlock;

pub(crate) use pool::{SessionKey, SpdySessionPool};
pub use session::SpdySession;
pub(crate) use session::SessionDetail;
pub use stream::{BodyReader, SpdyStream, StreamResponse};

use crate::error::{ErrorKind, NetError, SpdyClientError};
use crate::runtime::{oneshot, UnboundedReceiver};

/// Why a session coroutine stopped.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub(crate) enum DispatchErrorKind {
    /// A protocol violation, either detected locally or reported by a peer
    /// reset.
    Spdy(SpdyError),

    /// The transport failed.
    Io(std::io::ErrorKind),

    /// A coroutine channel closed underneath the session.
    ChannelClosed,

    /// The peer closed the connection.
    Disconnect,
}

impl From<std::io::Error> for DispatchErrorKind {
    fn from(value: std::io::Error) -> Self {
        DispatchErrorKind::Io(value.kind())
    }
}

impl From<SpdyError> for DispatchErrorKind {
    fn from(value: SpdyError) -> Self {
        DispatchErrorKind::Spdy(value)
    }
}

/// A frame waiting to be written, tagged with the priority the writer
/// schedules it under.
pub(crate) struct QueuedFrame {
    pub(crate) priority: Priority,
    pub(crate) frame: Frame,
}

/// Messages from the reader (and the writer, on failure) to the manager.
pub(crate) enum OutputMessage {
    /// One decoded frame.
    Output(Frame),

    /// The io side is done, successfully or not.
    OutputExit(DispatchErrorKind),
}

/// Commands from session and stream handles to the manager.
pub(crate) enum SessionCmd {
    /// Open a new stream. Answered once the stream is admitted.
    Open(OpenRequest),

    /// Claim a server-pushed stream by its request path.
    ClaimPush(PushClaim),

    /// Send one piece of request body on an open stream.
    SendData(DataMessage),

    /// Return consumed bytes to a stream's receive window.
    ReleaseWindow { id: StreamId, size: u32 },

    /// Reset a stream locally.
    Cancel { id: StreamId, status: ResetStatus },

    /// Shut the whole session down.
    Close,
}

pub(crate) struct OpenRequest {
    pub(crate) headers: NvBlock,
    pub(crate) priority: Priority,
    pub(crate) fin: bool,
    pub(crate) sender: oneshot::Sender<Result<OpenedStream, DispatchErrorKind>>,
}

pub(crate) struct PushClaim {
    pub(crate) path: String,
    pub(crate) sender: oneshot::Sender<Result<Option<OpenedStream>, DispatchErrorKind>>,
}

pub(crate) struct DataMessage {
    pub(crate) id: StreamId,
    pub(crate) data: Vec<u8>,
    pub(crate) fin: bool,
    pub(crate) sender: oneshot::Sender<Result<(), DispatchErrorKind>>,
}

/// The manager's answer to `Open` and `ClaimPush`.
pub(crate) struct OpenedStream {
    pub(crate) id: StreamId,
    pub(crate) events: UnboundedReceiver<StreamEvent>,
    pub(crate) pushed: bool,
    /// Whether the local half is already closed, either because the request
    /// was opened with FIN or because the stream is a unidirectional push.
    pub(crate) local_fin: bool,
}

/// Events the manager delivers to one stream handle, in order.
pub(crate) enum StreamEvent {
    /// The reply headers. Always the first event of a stream.
    Reply { headers: NvBlock, fin: bool },

    /// One chunk of response body.
    Data { chunk: Vec<u8>, fin: bool },

    /// The stream was reset, by the peer or by a local protocol check.
    Reset(ResetStatus),

    /// The session ended while the stream was live.
    Exit(DispatchErrorKind),
}

pub(crate) fn dispatch_client_error(kind: DispatchErrorKind) -> SpdyClientError {
    match kind {
        DispatchErrorKind::Spdy(e) => SpdyClientError::from_error(ErrorKind::Request, e),
        DispatchErrorKind::Io(kind) => {
            SpdyClientError::from_io_error(ErrorKind::Request, std::io::Error::from(kind))
        }
        DispatchErrorKind::ChannelClosed | DispatchErrorKind::Disconnect => {
            SpdyClientError::from_net_error(ErrorKind::Request, NetError::ConnectionClosed)
        }
    }
}
