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

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use ylong_spdy::decoder::{FrameDecoder, FrameKind, FramesIntoIter};

use crate::runtime::{
    AsyncRead, AsyncWrite, BoundedSender, ReadBuf, ReadHalf, SendError,
};
use crate::util::spdy::{DispatchErrorKind, OutputMessage};

type OutputSendFut = Pin<Box<dyn Future<Output = Result<(), SendError<OutputMessage>>> + Send>>;

/// Reader coroutine of a session.
///
/// Reads the socket in bounded chunks, decodes and hands every complete
/// frame to the manager before the next read. The manager channel is
/// bounded, so a slow manager backpressures the socket instead of piling
/// frames up here.
pub(crate) struct RecvData<S> {
    decoder: FrameDecoder,
    state: DecodeState,
    next_state: DecodeState,
    reader: ReadHalf<S>,
    resp_tx: BoundedSender<OutputMessage>,
    buf: Vec<u8>,
    curr_message: Option<OutputSendFut>,
    pending_iter: Option<FramesIntoIter>,
}

#[derive(Clone, Copy)]
enum DecodeState {
    /// Read more bytes from the socket.
    Read,
    /// Finish a blocked send to the manager, then any frames left from the
    /// last decode, then move to `next_state`.
    Send,
    Exit(DispatchErrorKind),
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send + 'static> RecvData<S> {
    pub(crate) fn new(
        decoder: FrameDecoder,
        reader: ReadHalf<S>,
        resp_tx: BoundedSender<OutputMessage>,
        read_buffer_size: usize,
    ) -> Self {
        Self {
            decoder,
            state: DecodeState::Read,
            next_state: DecodeState::Read,
            reader,
            resp_tx,
            buf: vec![0; read_buffer_size],
            curr_message: None,
            pending_iter: None,
        }
    }

    fn poll_read_frame(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), DispatchErrorKind>> {
        let mut read_buf = ReadBuf::new(&mut self.buf);
        match Pin::new(&mut self.reader).poll_read(cx, &mut read_buf) {
            Poll::Ready(Ok(())) => {}
            Poll::Ready(Err(e)) => {
                let kind = e.into();
                return self.transmit_error(cx, kind);
            }
            Poll::Pending => return Poll::Pending,
        }
        let data = read_buf.filled();
        if data.is_empty() {
            // Orderly close from the peer.
            return self.transmit_error(cx, DispatchErrorKind::Disconnect);
        }
        let frames = match self.decoder.decode(data) {
            Ok(frames) => frames,
            Err(e) => {
                let kind = e.into();
                return self.transmit_error(cx, kind);
            }
        };
        let mut iter = frames.into_iter();
        while let Some(kind) = iter.next() {
            if let FrameKind::Complete(frame) = kind {
                match self.transmit_message(cx, OutputMessage::Output(frame)) {
                    Poll::Ready(Ok(())) => {}
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => {
                        self.pending_iter = Some(iter);
                        self.state = DecodeState::Send;
                        self.next_state = DecodeState::Read;
                        return Poll::Ready(Ok(()));
                    }
                }
            }
        }
        Poll::Ready(Ok(()))
    }

    fn poll_blocked_task(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), DispatchErrorKind>> {
        if let Some(mut fut) = self.curr_message.take() {
            match fut.as_mut().poll(cx) {
                Poll::Ready(Ok(())) => {}
                Poll::Ready(Err(_)) => return Poll::Ready(Err(DispatchErrorKind::ChannelClosed)),
                Poll::Pending => {
                    self.curr_message = Some(fut);
                    return Poll::Pending;
                }
            }
        }
        if let Some(mut iter) = self.pending_iter.take() {
            while let Some(kind) = iter.next() {
                if let FrameKind::Complete(frame) = kind {
                    match self.transmit_message(cx, OutputMessage::Output(frame)) {
                        Poll::Ready(Ok(())) => {}
                        Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                        Poll::Pending => {
                            self.pending_iter = Some(iter);
                            return Poll::Pending;
                        }
                    }
                }
            }
        }
        self.state = self.next_state;
        Poll::Ready(Ok(()))
    }

    fn transmit_message(
        &mut self,
        cx: &mut Context<'_>,
        message: OutputMessage,
    ) -> Poll<Result<(), DispatchErrorKind>> {
        let sender = self.resp_tx.clone();
        let mut fut: OutputSendFut = Box::pin(async move { sender.send(message).await });
        match fut.as_mut().poll(cx) {
            Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
            Poll::Ready(Err(_)) => Poll::Ready(Err(DispatchErrorKind::ChannelClosed)),
            Poll::Pending => {
                self.curr_message = Some(fut);
                Poll::Pending
            }
        }
    }

    /// Reports a terminal io or decode condition to the manager, then
    /// finishes with it. The decoder stays poisoned after an error, so no
    /// more reads happen either way.
    fn transmit_error(
        &mut self,
        cx: &mut Context<'_>,
        exit_err: DispatchErrorKind,
    ) -> Poll<Result<(), DispatchErrorKind>> {
        match self.transmit_message(cx, OutputMessage::OutputExit(exit_err)) {
            Poll::Ready(Ok(())) => Poll::Ready(Err(exit_err)),
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => {
                self.state = DecodeState::Send;
                self.next_state = DecodeState::Exit(exit_err);
                Poll::Ready(Ok(()))
            }
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send + 'static> Future for RecvData<S> {
    type Output = Result<(), DispatchErrorKind>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let receiver = self.get_mut();
        loop {
            let poll = match receiver.state {
                DecodeState::Read => receiver.poll_read_frame(cx),
                DecodeState::Send => receiver.poll_blocked_task(cx),
                DecodeState::Exit(e) => return Poll::Ready(Err(e)),
            };
            match poll {
                Poll::Ready(Ok(())) => {}
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
