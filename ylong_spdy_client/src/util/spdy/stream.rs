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

//! User-facing stream handles.
//!
//! A [`SpdyStream`] receives its events from the session manager over a
//! channel and sends commands back through a weak session reference, so a
//! handle never outlives the session's io coroutines in a way that could
//! block.

use std::io;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use ylong_spdy::error::{ResetStatus, SpdyError};
use ylong_spdy::frame::StreamId;
use ylong_spdy::headers::NvBlock;

use crate::error::{ErrorKind, NetError, SpdyClientError};
use crate::runtime::{oneshot, AsyncRead, ReadBuf, UnboundedReceiver};
use crate::util::spdy::session::SessionShared;
use crate::util::spdy::{
    dispatch_client_error, DataMessage, DispatchErrorKind, OpenedStream, SessionCmd, StreamEvent,
};

/// One stream multiplexed over a shared session.
///
/// Dropping the handle before the stream has finished resets the stream with
/// `CANCEL`, so an abandoned request stops consuming the peer's resources.
#[derive(Debug)]
pub struct SpdyStream {
    id: StreamId,
    pushed: bool,
    local_fin: bool,
    remote_fin: bool,
    closed: bool,
    session: Weak<SessionShared>,
    events: UnboundedReceiver<StreamEvent>,
    reply: Option<StreamResponse>,
}

/// The reply headers of a stream.
#[derive(Debug, Clone)]
pub struct StreamResponse {
    headers: NvBlock,
    fin: bool,
}

impl StreamResponse {
    /// Returns the reply's name-value block.
    pub fn headers(&self) -> &NvBlock {
        &self.headers
    }

    /// Whether the reply carried FIN, meaning the stream has no body.
    pub fn is_fin(&self) -> bool {
        self.fin
    }

    /// Consumes the response and returns the name-value block.
    pub fn into_headers(self) -> NvBlock {
        self.headers
    }
}

impl SpdyStream {
    pub(crate) fn new(opened: OpenedStream, session: Weak<SessionShared>) -> Self {
        Self {
            id: opened.id,
            pushed: opened.pushed,
            local_fin: opened.local_fin,
            remote_fin: false,
            closed: false,
            session,
            events: opened.events,
            reply: None,
        }
    }

    /// Returns the stream id the session assigned to this stream.
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Whether this stream was initiated by the server as a push.
    pub fn is_pushed(&self) -> bool {
        self.pushed
    }

    /// Waits for the reply headers.
    ///
    /// The reply is kept, so calling this after [`Self::data`] has already
    /// consumed body chunks still returns it.
    pub async fn response(&mut self) -> Result<StreamResponse, SpdyClientError> {
        if let Some(reply) = &self.reply {
            return Ok(reply.clone());
        }
        match self.events.recv().await {
            Some(StreamEvent::Reply { headers, fin }) => {
                self.remote_fin = fin;
                let reply = StreamResponse { headers, fin };
                self.reply = Some(reply.clone());
                Ok(reply)
            }
            Some(StreamEvent::Data { .. }) => {
                // The manager replies before it forwards body chunks, so a
                // chunk here means the event order broke down.
                self.closed = true;
                Err(closed_error())
            }
            Some(StreamEvent::Reset(status)) => {
                self.closed = true;
                Err(SpdyClientError::from_error(
                    ErrorKind::Request,
                    SpdyError::StreamError(self.id, status),
                ))
            }
            Some(StreamEvent::Exit(kind)) => {
                self.closed = true;
                Err(dispatch_client_error(kind))
            }
            None => {
                self.closed = true;
                Err(closed_error())
            }
        }
    }

    /// Waits for the next chunk of response body.
    ///
    /// Returns `Ok(None)` once the peer has sent FIN. Each delivered chunk is
    /// reported back to the session so the peer's send window reopens.
    pub async fn data(&mut self) -> Result<Option<Vec<u8>>, SpdyClientError> {
        loop {
            if self.remote_fin {
                return Ok(None);
            }
            match self.events.recv().await {
                Some(StreamEvent::Reply { headers, fin }) => {
                    self.remote_fin = fin;
                    self.reply = Some(StreamResponse { headers, fin });
                }
                Some(StreamEvent::Data { chunk, fin }) => {
                    self.remote_fin = fin;
                    if !chunk.is_empty() {
                        self.release_window(chunk.len() as u32);
                        return Ok(Some(chunk));
                    }
                }
                Some(StreamEvent::Reset(status)) => {
                    self.closed = true;
                    return Err(SpdyClientError::from_error(
                        ErrorKind::Request,
                        SpdyError::StreamError(self.id, status),
                    ));
                }
                Some(StreamEvent::Exit(kind)) => {
                    self.closed = true;
                    return Err(dispatch_client_error(kind));
                }
                None => {
                    self.closed = true;
                    return Err(closed_error());
                }
            }
        }
    }

    /// Sends one piece of request body, optionally closing the local half.
    ///
    /// Resolves once every chunk of `data` has been handed to the session
    /// writer, which is when the next piece may be sent.
    pub async fn send_data(&mut self, data: Vec<u8>, fin: bool) -> Result<(), SpdyClientError> {
        let shared = match self.session.upgrade() {
            Some(shared) => shared,
            None => return Err(closed_error()),
        };
        let (tx, rx) = oneshot::channel();
        let message = DataMessage {
            id: self.id,
            data,
            fin,
            sender: tx,
        };
        if shared.cmd_tx.send(SessionCmd::SendData(message)).is_err() {
            return Err(closed_error());
        }
        match rx.await {
            Ok(Ok(())) => {
                if fin {
                    self.local_fin = true;
                }
                Ok(())
            }
            Ok(Err(kind)) => Err(dispatch_client_error(kind)),
            Err(_) => Err(closed_error()),
        }
    }

    /// Resets the stream with `CANCEL` if it is still live.
    pub fn cancel(&mut self) {
        if self.finished() {
            return;
        }
        self.closed = true;
        if let Some(shared) = self.session.upgrade() {
            let _ = shared.cmd_tx.send(SessionCmd::Cancel {
                id: self.id,
                status: ResetStatus::Cancel,
            });
        }
    }

    fn finished(&self) -> bool {
        self.closed || (self.local_fin && self.remote_fin)
    }

    fn release_window(&self, size: u32) {
        if size == 0 {
            return;
        }
        if let Some(shared) = self.session.upgrade() {
            let _ = shared
                .cmd_tx
                .send(SessionCmd::ReleaseWindow { id: self.id, size });
        }
    }
}

impl Drop for SpdyStream {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn closed_error() -> SpdyClientError {
    SpdyClientError::from_net_error(ErrorKind::Request, NetError::ConnectionClosed)
}

/// Adapts a [`SpdyStream`] body to [`AsyncRead`].
pub struct BodyReader {
    stream: SpdyStream,
    buf: Vec<u8>,
    offset: usize,
}

impl BodyReader {
    pub fn new(stream: SpdyStream) -> Self {
        Self {
            stream,
            buf: Vec::new(),
            offset: 0,
        }
    }

    /// Returns the stream, abandoning any chunk the reader has buffered.
    pub fn into_inner(self) -> SpdyStream {
        self.stream
    }
}

impl AsyncRead for BodyReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if this.offset < this.buf.len() {
                let n = buf.remaining().min(this.buf.len() - this.offset);
                buf.put_slice(&this.buf[this.offset..this.offset + n]);
                this.offset += n;
                if this.offset == this.buf.len() {
                    this.buf.clear();
                    this.offset = 0;
                }
                return Poll::Ready(Ok(()));
            }
            if this.stream.remote_fin {
                return Poll::Ready(Ok(()));
            }
            match this.stream.events.poll_recv(cx) {
                Poll::Ready(Some(StreamEvent::Reply { headers, fin })) => {
                    this.stream.remote_fin = fin;
                    this.stream.reply = Some(StreamResponse { headers, fin });
                }
                Poll::Ready(Some(StreamEvent::Data { chunk, fin })) => {
                    this.stream.remote_fin = fin;
                    if !chunk.is_empty() {
                        this.stream.release_window(chunk.len() as u32);
                        this.buf = chunk;
                        this.offset = 0;
                    }
                }
                Poll::Ready(Some(StreamEvent::Reset(status))) => {
                    this.stream.closed = true;
                    let err = SpdyClientError::from_error(
                        ErrorKind::Request,
                        SpdyError::StreamError(this.stream.id, status),
                    );
                    return Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, err)));
                }
                Poll::Ready(Some(StreamEvent::Exit(kind))) => {
                    this.stream.closed = true;
                    let err = match kind {
                        DispatchErrorKind::Io(k) => io::Error::from(k),
                        other => {
                            io::Error::new(io::ErrorKind::Other, dispatch_client_error(other))
                        }
                    };
                    return Poll::Ready(Err(err));
                }
                Poll::Ready(None) => {
                    this.stream.closed = true;
                    return Poll::Ready(Err(io::Error::from(io::ErrorKind::UnexpectedEof)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
