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

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use ylong_spdy::encoder::FrameEncoder;
use ylong_spdy::frame::{Frame, Priority};

use crate::runtime::{AsyncRead, AsyncWrite, BoundedSender, UnboundedReceiver, WriteHalf};
use crate::util::spdy::{DispatchErrorKind, OutputMessage, QueuedFrame};

type ExitSendFut = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Writer coroutine of a session.
///
/// Queued frames collect in a priority heap and leave highest level first,
/// ties broken by arrival. Exactly one frame is in flight: it is encoded
/// (compressing its header block at that moment, so compression contexts
/// see blocks in wire order) and written out completely before the next
/// one is picked, so a high-priority frame queued during a long write goes
/// out right after it.
pub(crate) struct SendData<S> {
    state: InputState,
    encoder: FrameEncoder,
    pending: BinaryHeap<PendingFrame>,
    next_seq: u64,
    channel_closed: bool,
    buf: Vec<u8>,
    written: usize,
    writer: WriteHalf<S>,
    frame_rx: UnboundedReceiver<QueuedFrame>,
    resp_tx: BoundedSender<OutputMessage>,
    exit_fut: Option<ExitSendFut>,
}

#[derive(Clone, Copy)]
enum InputState {
    RecvFrame,
    WriteFrame,
    ReportExit(DispatchErrorKind),
}

/// A frame waiting in the writer. The heap is a max-heap, so the ordering
/// ranks the frame to send next as the greatest: the highest priority
/// level, then the earliest arrival.
struct PendingFrame {
    priority: Priority,
    seq: u64,
    frame: Frame,
}

impl PartialEq for PendingFrame {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for PendingFrame {}

impl PartialOrd for PendingFrame {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingFrame {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send + 'static> SendData<S> {
    pub(crate) fn new(
        encoder: FrameEncoder,
        writer: WriteHalf<S>,
        frame_rx: UnboundedReceiver<QueuedFrame>,
        resp_tx: BoundedSender<OutputMessage>,
    ) -> Self {
        Self {
            state: InputState::RecvFrame,
            encoder,
            pending: BinaryHeap::new(),
            next_seq: 0,
            channel_closed: false,
            buf: Vec::new(),
            written: 0,
            writer,
            frame_rx,
            resp_tx,
            exit_fut: None,
        }
    }

    fn poll_recv_frame(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), DispatchErrorKind>> {
        // Pull in everything already queued before choosing, so priority
        // beats arrival order.
        while !self.channel_closed {
            match self.frame_rx.poll_recv(cx) {
                Poll::Ready(Some(queued)) => {
                    let seq = self.next_seq;
                    self.next_seq += 1;
                    self.pending.push(PendingFrame {
                        priority: queued.priority,
                        seq,
                        frame: queued.frame,
                    });
                }
                Poll::Ready(None) => self.channel_closed = true,
                Poll::Pending => break,
            }
        }
        match self.pending.pop() {
            Some(pending) => {
                match self.encoder.encode(&pending.frame) {
                    Ok(bytes) => {
                        self.buf = bytes;
                        self.written = 0;
                        self.state = InputState::WriteFrame;
                    }
                    Err(e) => self.state = InputState::ReportExit(e.into()),
                }
                Poll::Ready(Ok(()))
            }
            None if self.channel_closed => Poll::Ready(Err(DispatchErrorKind::ChannelClosed)),
            None => Poll::Pending,
        }
    }

    fn poll_write_frame(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), DispatchErrorKind>> {
        while self.written < self.buf.len() {
            match Pin::new(&mut self.writer).poll_write(cx, &self.buf[self.written..]) {
                Poll::Ready(Ok(0)) => {
                    self.state =
                        InputState::ReportExit(DispatchErrorKind::Io(std::io::ErrorKind::WriteZero));
                    return Poll::Ready(Ok(()));
                }
                Poll::Ready(Ok(size)) => self.written += size,
                Poll::Ready(Err(e)) => {
                    self.state = InputState::ReportExit(e.into());
                    return Poll::Ready(Ok(()));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
        self.state = InputState::RecvFrame;
        Poll::Ready(Ok(()))
    }

    /// Tells the manager the io side failed, then finishes. The manager
    /// may already be gone, in which case the send result is irrelevant.
    fn poll_report_exit(
        &mut self,
        cx: &mut Context<'_>,
        kind: DispatchErrorKind,
    ) -> Poll<Result<(), DispatchErrorKind>> {
        let fut = self.exit_fut.get_or_insert_with(|| {
            let sender = self.resp_tx.clone();
            Box::pin(async move {
                let _ = sender.send(OutputMessage::OutputExit(kind)).await;
            })
        });
        match fut.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(Err(kind)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send + 'static> Future for SendData<S> {
    type Output = Result<(), DispatchErrorKind>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let sender = self.get_mut();
        loop {
            let poll = match sender.state {
                InputState::RecvFrame => sender.poll_recv_frame(cx),
                InputState::WriteFrame => sender.poll_write_frame(cx),
                InputState::ReportExit(kind) => return sender.poll_report_exit(cx, kind),
            };
            match poll {
                Poll::Ready(Ok(())) => {}
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
