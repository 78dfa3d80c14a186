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

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use ylong_spdy::error::{ResetStatus, SpdyError};
use ylong_spdy::frame::{
    Frame, FrameFlags, Payload, Priority, RstStream, SettingId, StreamId, SynStream,
};
use ylong_spdy::headers::NvBlock;

use crate::runtime::{
    oneshot, unbounded_channel, BoundedReceiver, UnboundedReceiver, UnboundedSender,
};
use crate::util::settings::SpdySettingsStorage;
use crate::util::spdy::streams::{FrameRecvState, StreamEndState, Streams};
use crate::util::spdy::{
    DispatchErrorKind, OpenRequest, OpenedStream, OutputMessage, PushClaim, QueuedFrame,
    SessionCmd, StreamEvent,
};

/// The claim state of a pushed path that has not arrived yet.
enum PushSlot {
    /// Announced in `x-associated-content`.
    Advertised,

    /// A claimer is parked until the push arrives.
    Claimed(oneshot::Sender<Result<Option<OpenedStream>, DispatchErrorKind>>),
}

/// A pushed stream that arrived before anyone asked for it. Its reply and
/// body sit buffered in the event channel until claimed, even if the
/// stream itself has already finished.
struct UnclaimedPush {
    id: StreamId,
    events: UnboundedReceiver<StreamEvent>,
}

pub(crate) struct SessionController {
    io_shutdown: Arc<AtomicBool>,
    io_goaway: Arc<AtomicBool>,
    senders: HashMap<StreamId, UnboundedSender<StreamEvent>>,
    streams: Streams,
    advertised: HashMap<String, PushSlot>,
    unclaimed: HashMap<String, UnclaimedPush>,
    goaway_received: bool,
    closing: bool,
}

impl SessionController {
    pub(crate) fn new(
        streams: Streams,
        io_shutdown: Arc<AtomicBool>,
        io_goaway: Arc<AtomicBool>,
    ) -> Self {
        Self {
            io_shutdown,
            io_goaway,
            senders: HashMap::new(),
            streams,
            advertised: HashMap::new(),
            unclaimed: HashMap::new(),
            goaway_received: false,
            closing: false,
        }
    }
}

/// Manager coroutine of a session.
///
/// Single owner of the stream table. Decoded frames come in over the
/// bounded reader channel, handle commands over the unbounded command
/// channel, and everything it wants on the wire leaves through the writer
/// queue. Io frames take precedence, commands are drained whenever the io
/// side has nothing ready.
pub(crate) struct ConnManager {
    controller: SessionController,
    storage: SpdySettingsStorage,
    authority: String,
    max_data_chunk: usize,
    input_tx: UnboundedSender<QueuedFrame>,
    resp_rx: BoundedReceiver<OutputMessage>,
    cmd_rx: UnboundedReceiver<SessionCmd>,
}

impl Future for ConnManager {
    type Output = Result<(), DispatchErrorKind>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let manager = self.get_mut();
        loop {
            match manager.resp_rx.poll_recv(cx) {
                Poll::Ready(Some(OutputMessage::Output(frame))) => {
                    if let Err(kind) = manager.recv_frame(frame) {
                        return manager.exit_with_error(kind);
                    }
                    if let Some(poll) = manager.check_goaway_drained() {
                        return poll;
                    }
                }
                Poll::Ready(Some(OutputMessage::OutputExit(kind))) => {
                    return manager.exit_with_error(kind);
                }
                Poll::Ready(None) => {
                    return manager.exit_with_error(DispatchErrorKind::ChannelClosed);
                }
                Poll::Pending => {
                    loop {
                        match manager.cmd_rx.poll_recv(cx) {
                            Poll::Ready(Some(cmd)) => {
                                if let Err(kind) = manager.handle_cmd(cmd) {
                                    return manager.exit_with_error(kind);
                                }
                                if manager.controller.closing {
                                    manager.shutdown_streams(DispatchErrorKind::Disconnect);
                                    return Poll::Ready(Ok(()));
                                }
                            }
                            Poll::Ready(None) => {
                                return manager
                                    .exit_with_error(DispatchErrorKind::ChannelClosed);
                            }
                            Poll::Pending => break,
                        }
                    }
                    if let Some(poll) = manager.check_goaway_drained() {
                        return poll;
                    }
                    return Poll::Pending;
                }
            }
        }
    }
}

impl ConnManager {
    pub(crate) fn new(
        controller: SessionController,
        storage: SpdySettingsStorage,
        authority: String,
        max_data_chunk: usize,
        input_tx: UnboundedSender<QueuedFrame>,
        resp_rx: BoundedReceiver<OutputMessage>,
        cmd_rx: UnboundedReceiver<SessionCmd>,
    ) -> Self {
        Self {
            controller,
            storage,
            authority,
            max_data_chunk,
            input_tx,
            resp_rx,
            cmd_rx,
        }
    }

    fn recv_frame(&mut self, frame: Frame) -> Result<(), DispatchErrorKind> {
        match frame.payload() {
            Payload::SynReply(_) => self.recv_syn_reply(frame),
            Payload::Data(_) => self.recv_data(frame),
            Payload::SynStream(_) => self.recv_syn_stream(frame),
            Payload::RstStream(_) => self.recv_rst_stream(frame),
            Payload::Settings(_) => self.recv_settings(frame),
            Payload::Goaway(_) => self.recv_goaway(frame),
            Payload::WindowUpdate(_) => self.recv_window_update(frame),
        }
    }

    fn recv_syn_reply(&mut self, frame: Frame) -> Result<(), DispatchErrorKind> {
        let fin = frame.flags().is_fin();
        let (id, _, payload) = frame.into_parts();
        let Payload::SynReply(reply) = payload else {
            return Ok(());
        };
        match self.controller.streams.recv_reply(id, fin) {
            FrameRecvState::OK => {
                let headers = reply.into_headers();
                self.register_advertised(&headers);
                self.send_stream_event(id, StreamEvent::Reply { headers, fin });
                self.finish_stream_if_closed(id)
            }
            FrameRecvState::Ignore => Ok(()),
            FrameRecvState::Err(SpdyError::StreamError(sid, status)) => {
                self.stream_error(sid, status)
            }
            FrameRecvState::Err(e) => Err(e.into()),
        }
    }

    fn recv_data(&mut self, frame: Frame) -> Result<(), DispatchErrorKind> {
        let fin = frame.flags().is_fin();
        let (id, _, payload) = frame.into_parts();
        let Payload::Data(data) = payload else {
            return Ok(());
        };
        let chunk = data.into_vec();
        match self.controller.streams.recv_data(id, chunk.len() as u32, fin) {
            FrameRecvState::OK => {
                self.send_stream_event(id, StreamEvent::Data { chunk, fin });
                self.finish_stream_if_closed(id)
            }
            FrameRecvState::Ignore => Ok(()),
            FrameRecvState::Err(SpdyError::StreamError(sid, status)) => {
                self.stream_error(sid, status)
            }
            FrameRecvState::Err(e) => Err(e.into()),
        }
    }

    fn recv_syn_stream(&mut self, frame: Frame) -> Result<(), DispatchErrorKind> {
        let fin = frame.flags().is_fin();
        let (id, _, payload) = frame.into_parts();
        let Payload::SynStream(syn) = payload else {
            return Ok(());
        };
        // Pushes use the server parity. Anything else, or an id already in
        // use, is dropped on the floor.
        if id == 0 || id % 2 == 1 || self.controller.streams.contains(id) {
            return Ok(());
        }
        let priority = syn.priority();
        let headers = syn.into_headers();
        let path = match headers.get("path") {
            Some(path) if !path.is_empty() => path.to_string(),
            _ => return Ok(()),
        };
        if self.controller.unclaimed.contains_key(&path) {
            // One claimable push per path.
            return self.send_rst(id, ResetStatus::RefusedStream);
        }

        // The push's SYN_STREAM doubles as its reply.
        let (tx, rx) = unbounded_channel();
        let _ = tx.send(StreamEvent::Reply { headers, fin });
        if !fin {
            self.controller.streams.insert_pushed(id, priority);
            self.controller.senders.insert(id, tx);
        }

        match self.controller.advertised.remove(&path) {
            Some(PushSlot::Claimed(waiter)) => {
                let opened = OpenedStream {
                    id,
                    events: rx,
                    pushed: true,
                    local_fin: true,
                };
                if let Err(Ok(Some(opened))) = waiter.send(Ok(Some(opened))) {
                    // The claimer gave up, keep the push claimable.
                    self.controller.unclaimed.insert(
                        path,
                        UnclaimedPush {
                            id: opened.id,
                            events: opened.events,
                        },
                    );
                }
            }
            Some(PushSlot::Advertised) | None => {
                self.controller
                    .unclaimed
                    .insert(path, UnclaimedPush { id, events: rx });
            }
        }
        Ok(())
    }

    fn recv_rst_stream(&mut self, frame: Frame) -> Result<(), DispatchErrorKind> {
        let (id, _, payload) = frame.into_parts();
        let Payload::RstStream(rst) = payload else {
            return Ok(());
        };
        match self.controller.streams.recv_remote_reset(id) {
            StreamEndState::OK => {
                self.send_stream_event(id, StreamEvent::Reset(rst.status()));
                self.controller.senders.remove(&id);
                self.try_admit_pending()
            }
            StreamEndState::Ignore => Ok(()),
        }
    }

    fn recv_settings(&mut self, frame: Frame) -> Result<(), DispatchErrorKind> {
        let Payload::Settings(settings) = frame.payload() else {
            return Ok(());
        };
        // The stored set swaps wholesale for the persist-flagged subset, so
        // the clear-settings flag needs no separate handling.
        self.storage.set(&self.authority, settings);

        let mut resize = None;
        for entry in settings.entries() {
            match entry.id() {
                SettingId::MaxConcurrentStreams => {
                    self.controller
                        .streams
                        .apply_max_concurrent(entry.value() as usize);
                }
                SettingId::InitialWindowSize => resize = Some(entry.value()),
                _ => {}
            }
        }
        if let Some(value) = resize {
            let size = value.min(i32::MAX as u32) as i32;
            for id in self.controller.streams.apply_initial_send_window(size) {
                self.stream_error(id, ResetStatus::FlowControlError)?;
            }
            for id in self.controller.streams.pending_data_ids() {
                self.pump_stream(id)?;
            }
        }
        self.try_admit_pending()
    }

    fn recv_goaway(&mut self, frame: Frame) -> Result<(), DispatchErrorKind> {
        let (_, _, payload) = frame.into_parts();
        let Payload::Goaway(_) = payload else {
            return Ok(());
        };
        self.controller.goaway_received = true;
        self.controller.io_goaway.store(true, Ordering::Release);
        // In-flight streams keep running. Queued creations and parked push
        // claims can never be served now, so they fail here.
        self.controller
            .streams
            .fail_pending_opens(DispatchErrorKind::Disconnect);
        for (_, slot) in self.controller.advertised.drain() {
            if let PushSlot::Claimed(sender) = slot {
                let _ = sender.send(Err(DispatchErrorKind::Disconnect));
            }
        }
        Ok(())
    }

    fn recv_window_update(&mut self, frame: Frame) -> Result<(), DispatchErrorKind> {
        let (id, _, payload) = frame.into_parts();
        let Payload::WindowUpdate(update) = payload else {
            return Ok(());
        };
        if !self.controller.streams.contains(id) {
            return Ok(());
        }
        let delta = update.signed_delta();
        if delta <= 0 {
            return self.stream_error(id, ResetStatus::FlowControlError);
        }
        match self.controller.streams.recv_window_update(id, delta as u32) {
            FrameRecvState::OK => self.pump_stream(id),
            FrameRecvState::Ignore => Ok(()),
            FrameRecvState::Err(SpdyError::StreamError(sid, status)) => {
                self.stream_error(sid, status)
            }
            FrameRecvState::Err(e) => Err(e.into()),
        }
    }

    fn handle_cmd(&mut self, cmd: SessionCmd) -> Result<(), DispatchErrorKind> {
        match cmd {
            SessionCmd::Open(request) => self.handle_open(request),
            SessionCmd::ClaimPush(claim) => self.handle_claim(claim),
            SessionCmd::SendData(message) => {
                let id = message.id;
                self.controller.streams.queue_data(message);
                self.pump_stream(id)
            }
            SessionCmd::ReleaseWindow { id, size } => self
                .controller
                .streams
                .release_recv_window(id, size, &self.input_tx),
            SessionCmd::Cancel { id, status } => self.handle_cancel(id, status),
            SessionCmd::Close => {
                self.controller.closing = true;
                Ok(())
            }
        }
    }

    fn handle_open(&mut self, request: OpenRequest) -> Result<(), DispatchErrorKind> {
        if self.controller.goaway_received || self.controller.closing {
            let _ = request.sender.send(Err(DispatchErrorKind::Disconnect));
            return Ok(());
        }
        if self.controller.streams.can_admit() {
            self.admit_open(request)
        } else {
            self.controller.streams.queue_open(request);
            Ok(())
        }
    }

    fn handle_claim(&mut self, claim: PushClaim) -> Result<(), DispatchErrorKind> {
        if self.controller.goaway_received || self.controller.closing {
            let _ = claim.sender.send(Err(DispatchErrorKind::Disconnect));
            return Ok(());
        }
        if let Some(push) = self.controller.unclaimed.remove(&claim.path) {
            let opened = OpenedStream {
                id: push.id,
                events: push.events,
                pushed: true,
                local_fin: true,
            };
            if let Err(Ok(Some(opened))) = claim.sender.send(Ok(Some(opened))) {
                self.controller.unclaimed.insert(
                    claim.path,
                    UnclaimedPush {
                        id: opened.id,
                        events: opened.events,
                    },
                );
            }
            return Ok(());
        }
        match self.controller.advertised.get_mut(&claim.path) {
            Some(slot) => match slot {
                PushSlot::Advertised => *slot = PushSlot::Claimed(claim.sender),
                PushSlot::Claimed(_) => {
                    let _ = claim.sender.send(Ok(None));
                }
            },
            None => {
                let _ = claim.sender.send(Ok(None));
            }
        }
        Ok(())
    }

    fn handle_cancel(
        &mut self,
        id: StreamId,
        status: ResetStatus,
    ) -> Result<(), DispatchErrorKind> {
        match self.controller.streams.send_local_reset(id) {
            StreamEndState::OK => {
                self.controller.senders.remove(&id);
                self.send_rst(id, status)?;
                self.try_admit_pending()
            }
            StreamEndState::Ignore => Ok(()),
        }
    }

    fn admit_open(&mut self, request: OpenRequest) -> Result<(), DispatchErrorKind> {
        let id = self.controller.streams.generate_id();
        let mut flags = FrameFlags::empty();
        flags.set_fin(request.fin);
        let frame = Frame::new(
            id,
            flags,
            Payload::SynStream(SynStream::new(0, request.priority, request.headers)),
        );
        self.controller
            .streams
            .insert_local(id, request.priority, request.fin);
        self.queue_frame(request.priority, frame)?;

        let (tx, rx) = unbounded_channel();
        let opened = OpenedStream {
            id,
            events: rx,
            pushed: false,
            local_fin: request.fin,
        };
        if request.sender.send(Ok(opened)).is_err() {
            // The opener vanished before learning the id, retract.
            let _ = self.controller.streams.send_local_reset(id);
            self.send_rst(id, ResetStatus::Cancel)?;
        } else {
            self.controller.senders.insert(id, tx);
        }
        Ok(())
    }

    fn try_admit_pending(&mut self) -> Result<(), DispatchErrorKind> {
        while self.controller.streams.can_admit() {
            match self.controller.streams.next_pending_open() {
                Some(request) => self.admit_open(request)?,
                None => break,
            }
        }
        Ok(())
    }

    /// Resets a stream for a local rule violation: the entry goes away, the
    /// handle hears a reset, the peer gets the `RST_STREAM`. Sent even when
    /// the stream is not in the table, for frames referencing streams this
    /// side never had.
    fn stream_error(&mut self, id: StreamId, status: ResetStatus) -> Result<(), DispatchErrorKind> {
        if let StreamEndState::OK = self.controller.streams.send_local_reset(id) {
            self.send_stream_event(id, StreamEvent::Reset(status));
            self.controller.senders.remove(&id);
        }
        self.send_rst(id, status)?;
        self.try_admit_pending()
    }

    fn pump_stream(&mut self, id: StreamId) -> Result<(), DispatchErrorKind> {
        self.controller
            .streams
            .pump_pending_data(id, self.max_data_chunk, &self.input_tx)?;
        self.finish_stream_if_closed(id)
    }

    fn finish_stream_if_closed(&mut self, id: StreamId) -> Result<(), DispatchErrorKind> {
        if !self.controller.streams.contains(id) {
            self.controller.senders.remove(&id);
            self.try_admit_pending()?;
        }
        Ok(())
    }

    fn send_stream_event(&mut self, id: StreamId, event: StreamEvent) {
        if let Some(sender) = self.controller.senders.get(&id) {
            let _ = sender.send(event);
        }
    }

    fn send_rst(&mut self, id: StreamId, status: ResetStatus) -> Result<(), DispatchErrorKind> {
        let frame = Frame::new(
            id,
            FrameFlags::empty(),
            Payload::RstStream(RstStream::new(status)),
        );
        self.queue_frame(Priority::Highest, frame)
    }

    fn queue_frame(&mut self, priority: Priority, frame: Frame) -> Result<(), DispatchErrorKind> {
        self.input_tx
            .send(QueuedFrame { priority, frame })
            .map_err(|_| DispatchErrorKind::ChannelClosed)
    }

    fn register_advertised(&mut self, headers: &NvBlock) {
        let Some(value) = headers.get("x-associated-content") else {
            return;
        };
        for piece in value.split("||") {
            let Some(pos) = piece.find("??") else {
                break;
            };
            match associated_request_path(&piece[pos + 2..]) {
                Some(path) => {
                    self.controller
                        .advertised
                        .entry(path)
                        .or_insert(PushSlot::Advertised);
                }
                None => continue,
            }
        }
    }

    /// After a goaway the session lingers only until its last stream
    /// finishes, then shuts down cleanly.
    fn check_goaway_drained(&mut self) -> Option<Poll<Result<(), DispatchErrorKind>>> {
        if self.controller.goaway_received && self.controller.streams.is_drained() {
            self.controller.io_shutdown.store(true, Ordering::Release);
            Some(Poll::Ready(Ok(())))
        } else {
            None
        }
    }

    fn exit_with_error(&mut self, kind: DispatchErrorKind) -> Poll<Result<(), DispatchErrorKind>> {
        self.shutdown_streams(kind);
        Poll::Ready(Err(kind))
    }

    /// Terminal fan-out: every live stream, queued creation and parked
    /// claim hears the same exit, then the session is marked dead.
    fn shutdown_streams(&mut self, kind: DispatchErrorKind) {
        self.controller.io_shutdown.store(true, Ordering::Release);
        for (_, sender) in self.controller.senders.drain() {
            let _ = sender.send(StreamEvent::Exit(kind));
        }
        self.controller.streams.fail_all(kind);
        for (_, slot) in self.controller.advertised.drain() {
            if let PushSlot::Claimed(sender) = slot {
                let _ = sender.send(Err(kind));
            }
        }
        self.controller.unclaimed.clear();
    }
}

/// Path plus query of an absolute url, fragment dropped. The pieces of
/// `x-associated-content` carry full urls, matching happens on this form.
fn associated_request_path(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("://")?;
    let rest = match rest.split_once('#') {
        Some((head, _)) => head,
        None => rest,
    };
    match rest.find('/') {
        Some(pos) => Some(rest[pos..].to_string()),
        None => Some(String::from("/")),
    }
}
