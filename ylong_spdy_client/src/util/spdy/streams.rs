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

//! Stream bookkeeping for one session.

use std::collections::{HashMap, VecDeque};

use ylong_spdy::error::{ResetStatus, SpdyError};
use ylong_spdy::frame::{
    Data, Frame, FrameFlags, Payload, Priority, StreamId, WindowUpdate, MAX_STREAM_ID,
};

use crate::runtime::UnboundedSender;
use crate::util::spdy::window::{RecvWindow, SendWindow};
use crate::util::spdy::{DataMessage, DispatchErrorKind, OpenRequest, QueuedFrame};

// Stream states as the client sees them. Fully closed entries are removed
// from the table at once, so "closed" has no stored state.
//
//               send SYN_STREAM               recv SYN_STREAM (push)
//                     |                                |
//                     v                                |
//              +---------------+                       |
//              | AwaitingReply |                       |
//              +---------------+                       |
//       reply     |         |  reply + FIN,            |
//                 v         |  local FIN already sent  |
//             +------+      |                          |
//             | Open | <----+--------------------------+
//             +------+      |
//      recv FIN   |         |
//                 v         v
//           +------------+  |
//           | RemoteDone |  |
//           +------------+  |
//   local FIN     |         |
//   flushed       v         v
//               (removed from table)
#[derive(Clone, Copy)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub(crate) enum SpdyStreamState {
    /// `SYN_STREAM` sent, no `SYN_REPLY` yet.
    AwaitingReply,

    /// Replied and open in both directions.
    Open,

    /// The peer sent its FIN, the local side may still be sending.
    RemoteDone,
}

/// The result of feeding one received frame to the table.
#[cfg_attr(test, derive(Debug, PartialEq))]
pub(crate) enum FrameRecvState {
    OK,
    Ignore,
    Err(SpdyError),
}

/// The result of ending a stream, locally or from the peer.
#[cfg_attr(test, derive(Debug, PartialEq))]
pub(crate) enum StreamEndState {
    OK,
    Ignore,
}

/// One piece of request body waiting for send-window room.
struct PendingData {
    data: Vec<u8>,
    offset: usize,
    fin: bool,
    sender: Option<crate::runtime::oneshot::Sender<Result<(), DispatchErrorKind>>>,
}

pub(crate) struct StreamEntry {
    pub(crate) state: SpdyStreamState,
    pub(crate) priority: Priority,
    pub(crate) send_window: SendWindow,
    pub(crate) recv_window: RecvWindow,
    /// The local FIN has been queued for the wire.
    pub(crate) local_fin: bool,
    pub(crate) pushed: bool,
    pending_data: VecDeque<PendingData>,
}

pub(crate) struct Streams {
    next_stream_id: StreamId,
    /// Upper bound on locally created live streams. 0 means unlimited.
    max_concurrent: usize,
    current_concurrency: usize,
    initial_send_window: i32,
    initial_recv_window: i32,
    stream_map: HashMap<StreamId, StreamEntry>,
    /// Creations waiting for a concurrency slot, one queue per priority
    /// level, drained highest level first.
    pending_opens: [VecDeque<OpenRequest>; Priority::LEVELS],
}

impl Streams {
    pub(crate) fn new(
        max_concurrent: usize,
        initial_send_window: i32,
        initial_recv_window: i32,
    ) -> Self {
        Self {
            next_stream_id: 1,
            max_concurrent,
            current_concurrency: 0,
            initial_send_window,
            initial_recv_window,
            stream_map: HashMap::new(),
            pending_opens: std::array::from_fn(|_| VecDeque::new()),
        }
    }

    pub(crate) fn contains(&self, id: StreamId) -> bool {
        self.stream_map.contains_key(&id)
    }

    pub(crate) fn is_drained(&self) -> bool {
        self.stream_map.is_empty() && self.pending_opens.iter().all(VecDeque::is_empty)
    }

    /// Returns the next client stream id. Ids are odd and wrap back to 1
    /// before they would leave the 31-bit space, skipping ids still live.
    pub(crate) fn generate_id(&mut self) -> StreamId {
        loop {
            let id = self.next_stream_id;
            self.next_stream_id = if id + 2 > MAX_STREAM_ID { 1 } else { id + 2 };
            if !self.stream_map.contains_key(&id) {
                return id;
            }
        }
    }

    pub(crate) fn can_admit(&self) -> bool {
        self.max_concurrent == 0 || self.current_concurrency < self.max_concurrent
    }

    pub(crate) fn insert_local(&mut self, id: StreamId, priority: Priority, fin: bool) {
        self.stream_map.insert(
            id,
            StreamEntry {
                state: SpdyStreamState::AwaitingReply,
                priority,
                send_window: SendWindow::new(self.initial_send_window),
                recv_window: RecvWindow::new(self.initial_recv_window),
                local_fin: fin,
                pushed: false,
                pending_data: VecDeque::new(),
            },
        );
        self.current_concurrency += 1;
    }

    /// Inserts a server-pushed stream. Its `SYN_STREAM` doubles as the
    /// reply and pushes are unidirectional, so it starts `Open` with the
    /// local FIN already implied. Pushes do not consume a concurrency slot.
    pub(crate) fn insert_pushed(&mut self, id: StreamId, priority: Priority) {
        self.stream_map.insert(
            id,
            StreamEntry {
                state: SpdyStreamState::Open,
                priority,
                send_window: SendWindow::new(self.initial_send_window),
                recv_window: RecvWindow::new(self.initial_recv_window),
                local_fin: true,
                pushed: true,
                pending_data: VecDeque::new(),
            },
        );
    }

    pub(crate) fn recv_reply(&mut self, id: StreamId, fin: bool) -> FrameRecvState {
        let Some(entry) = self.stream_map.get_mut(&id) else {
            return FrameRecvState::Err(SpdyError::StreamError(id, ResetStatus::InvalidStream));
        };
        match entry.state {
            SpdyStreamState::AwaitingReply => {
                if fin {
                    if entry.local_fin {
                        self.close_entry(id);
                    } else {
                        entry.state = SpdyStreamState::RemoteDone;
                    }
                } else {
                    entry.state = SpdyStreamState::Open;
                }
                FrameRecvState::OK
            }
            SpdyStreamState::Open | SpdyStreamState::RemoteDone => {
                FrameRecvState::Err(SpdyError::StreamError(id, ResetStatus::ProtocolError))
            }
        }
    }

    pub(crate) fn recv_data(&mut self, id: StreamId, size: u32, fin: bool) -> FrameRecvState {
        let Some(entry) = self.stream_map.get_mut(&id) else {
            return FrameRecvState::Ignore;
        };
        match entry.state {
            SpdyStreamState::AwaitingReply | SpdyStreamState::RemoteDone => {
                FrameRecvState::Err(SpdyError::StreamError(id, ResetStatus::ProtocolError))
            }
            SpdyStreamState::Open => {
                entry.recv_window.recv_data(size);
                if fin {
                    if entry.local_fin {
                        self.close_entry(id);
                    } else {
                        entry.state = SpdyStreamState::RemoteDone;
                    }
                }
                FrameRecvState::OK
            }
        }
    }

    pub(crate) fn recv_remote_reset(&mut self, id: StreamId) -> StreamEndState {
        if self.stream_map.contains_key(&id) {
            self.close_entry(id);
            StreamEndState::OK
        } else {
            StreamEndState::Ignore
        }
    }

    pub(crate) fn send_local_reset(&mut self, id: StreamId) -> StreamEndState {
        self.recv_remote_reset(id)
    }

    pub(crate) fn apply_max_concurrent(&mut self, max: usize) {
        self.max_concurrent = max;
    }

    /// Applies a new initial send-window size to the table and every live
    /// stream. Returns the streams whose window overflowed and must be
    /// reset.
    pub(crate) fn apply_initial_send_window(&mut self, size: i32) -> Vec<StreamId> {
        let delta = size - self.initial_send_window;
        self.initial_send_window = size;
        let mut overflowed = Vec::new();
        if delta > 0 {
            for (id, entry) in self.stream_map.iter_mut() {
                if entry.send_window.increase_size(delta as u32).is_err() {
                    overflowed.push(*id);
                }
            }
        } else if delta < 0 {
            for entry in self.stream_map.values_mut() {
                entry.send_window.reduce_size(delta.unsigned_abs());
            }
        }
        overflowed
    }

    /// Grows a stream's send window from a `WINDOW_UPDATE`. `Ignore` when
    /// the stream is gone, `Err` when the window would overflow.
    pub(crate) fn recv_window_update(&mut self, id: StreamId, delta: u32) -> FrameRecvState {
        let Some(entry) = self.stream_map.get_mut(&id) else {
            return FrameRecvState::Ignore;
        };
        if entry.send_window.increase_size(delta).is_err() {
            FrameRecvState::Err(SpdyError::StreamError(id, ResetStatus::FlowControlError))
        } else {
            FrameRecvState::OK
        }
    }

    pub(crate) fn queue_open(&mut self, request: OpenRequest) {
        self.pending_opens[request.priority.index()].push_back(request);
    }

    pub(crate) fn next_pending_open(&mut self) -> Option<OpenRequest> {
        self.pending_opens
            .iter_mut()
            .find_map(VecDeque::pop_front)
    }

    pub(crate) fn queue_data(&mut self, message: DataMessage) {
        let id = message.id;
        let Some(entry) = self.stream_map.get_mut(&id) else {
            let _ = message
                .sender
                .send(Err(SpdyError::StreamError(id, ResetStatus::Cancel).into()));
            return;
        };
        if entry.local_fin || entry.pending_data.iter().any(|m| m.fin) {
            // The FIN is out or queued, more body is a caller bug.
            let _ = message
                .sender
                .send(Err(SpdyError::StreamError(id, ResetStatus::InternalError).into()));
            return;
        }
        entry.pending_data.push_back(PendingData {
            data: message.data,
            offset: 0,
            fin: message.fin,
            sender: Some(message.sender),
        });
    }

    /// Moves as much queued body as the send window allows onto the wire,
    /// in chunks of at most `max_chunk`. A message's sender fires once all
    /// of it is queued to the writer. Stops silently when the window is
    /// exhausted.
    pub(crate) fn pump_pending_data(
        &mut self,
        id: StreamId,
        max_chunk: usize,
        input_tx: &UnboundedSender<QueuedFrame>,
    ) -> Result<(), DispatchErrorKind> {
        loop {
            let (frame, priority, done_sender, stream_done) = {
                let Some(entry) = self.stream_map.get_mut(&id) else {
                    return Ok(());
                };
                let Some(front) = entry.pending_data.front_mut() else {
                    return Ok(());
                };
                let remaining = front.data.len() - front.offset;
                let window = entry.send_window.size_available() as usize;
                if remaining > 0 && window == 0 {
                    return Ok(());
                }
                let len = remaining.min(window).min(max_chunk);
                let last = front.offset + len == front.data.len();
                let fin = front.fin && last;
                let chunk = front.data[front.offset..front.offset + len].to_vec();
                front.offset += len;
                entry.send_window.send_data(len as u32);

                // A zero-length FIN frame still goes out, an empty write
                // without FIN does not.
                let frame = if len > 0 || fin {
                    let mut flags = FrameFlags::empty();
                    flags.set_fin(fin);
                    Some(Frame::new(id, flags, Payload::Data(Data::new(chunk))))
                } else {
                    None
                };

                let mut done_sender = None;
                let mut stream_done = false;
                if last {
                    if let Some(mut message) = entry.pending_data.pop_front() {
                        done_sender = message.sender.take();
                    }
                    if fin {
                        entry.local_fin = true;
                        stream_done = matches!(entry.state, SpdyStreamState::RemoteDone);
                    }
                }
                (frame, entry.priority, done_sender, stream_done)
            };

            if let Some(frame) = frame {
                input_tx
                    .send(QueuedFrame { priority, frame })
                    .map_err(|_| DispatchErrorKind::ChannelClosed)?;
            }
            if let Some(sender) = done_sender {
                let _ = sender.send(Ok(()));
            }
            if stream_done {
                self.close_entry(id);
                return Ok(());
            }
        }
    }

    /// Records `size` consumed bytes on a stream and sends the batched
    /// `WINDOW_UPDATE` when enough credit has built up.
    pub(crate) fn release_recv_window(
        &mut self,
        id: StreamId,
        size: u32,
        input_tx: &UnboundedSender<QueuedFrame>,
    ) -> Result<(), DispatchErrorKind> {
        let Some(entry) = self.stream_map.get_mut(&id) else {
            return Ok(());
        };
        if let Some(credit) = entry.recv_window.release_data(size) {
            let frame = Frame::new(
                id,
                FrameFlags::empty(),
                Payload::WindowUpdate(WindowUpdate::new(credit)),
            );
            input_tx
                .send(QueuedFrame {
                    priority: Priority::Highest,
                    frame,
                })
                .map_err(|_| DispatchErrorKind::ChannelClosed)?;
        }
        Ok(())
    }

    pub(crate) fn pending_data_ids(&self) -> Vec<StreamId> {
        self.stream_map
            .iter()
            .filter(|(_, entry)| !entry.pending_data.is_empty())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Fails every queued creation, for goaway and session teardown.
    pub(crate) fn fail_pending_opens(&mut self, kind: DispatchErrorKind) {
        for queue in self.pending_opens.iter_mut() {
            while let Some(request) = queue.pop_front() {
                let _ = request.sender.send(Err(kind));
            }
        }
    }

    /// Drops every entry and fails whatever body was still queued.
    pub(crate) fn fail_all(&mut self, kind: DispatchErrorKind) {
        for (_, mut entry) in self.stream_map.drain() {
            while let Some(message) = entry.pending_data.pop_front() {
                if let Some(sender) = message.sender {
                    let _ = sender.send(Err(kind));
                }
            }
        }
        self.current_concurrency = 0;
        self.fail_pending_opens(kind);
    }

    fn close_entry(&mut self, id: StreamId) {
        if let Some(mut entry) = self.stream_map.remove(&id) {
            if !entry.pushed {
                self.current_concurrency = self.current_concurrency.saturating_sub(1);
            }
            while let Some(message) = entry.pending_data.pop_front() {
                if let Some(sender) = message.sender {
                    let _ = sender
                        .send(Err(SpdyError::StreamError(id, ResetStatus::Cancel).into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod ut_streams {
    use ylong_spdy::error::{ResetStatus, SpdyError};
    use ylong_spdy::frame::{Payload, Priority, MAX_STREAM_ID};
    use ylong_spdy::headers::NvBlock;

    use crate::runtime::{oneshot, unbounded_channel};
    use crate::util::spdy::streams::{FrameRecvState, SpdyStreamState, StreamEndState, Streams};
    use crate::util::spdy::{DataMessage, OpenRequest};

    fn open_request(priority: Priority) -> OpenRequest {
        let (sender, _) = oneshot::channel();
        OpenRequest {
            headers: NvBlock::new(),
            priority,
            fin: false,
            sender,
        }
    }

    /// UT test cases for `Streams::generate_id`.
    ///
    /// # Brief
    /// 1. Checks ids start at 1 and step by 2.
    /// 2. Moves the counter to the top of the 31-bit space and checks it
    ///    wraps back to 1.
    /// 3. Occupies an id and checks generation skips it after the wrap.
    #[test]
    fn ut_streams_generate_id_wraps() {
        let mut streams = Streams::new(0, 65536, 65536);
        assert_eq!(streams.generate_id(), 1);
        assert_eq!(streams.generate_id(), 3);

        streams.next_stream_id = MAX_STREAM_ID;
        assert_eq!(streams.generate_id(), MAX_STREAM_ID);
        assert_eq!(streams.generate_id(), 1);

        streams.next_stream_id = MAX_STREAM_ID;
        streams.insert_local(1, Priority::Medium, false);
        assert_eq!(streams.generate_id(), MAX_STREAM_ID);
        assert_eq!(streams.generate_id(), 3);
    }

    /// UT test cases for stream admission accounting.
    ///
    /// # Brief
    /// 1. Fills the table to the concurrency limit and checks admission
    ///    stops.
    /// 2. Closes a stream and checks a slot frees up.
    /// 3. Checks pushed streams do not consume slots.
    /// 4. Checks limit 0 means unlimited.
    #[test]
    fn ut_streams_admission() {
        let mut streams = Streams::new(2, 65536, 65536);
        streams.insert_local(1, Priority::Medium, false);
        assert!(streams.can_admit());
        streams.insert_local(3, Priority::Medium, false);
        assert!(!streams.can_admit());

        assert_eq!(streams.recv_remote_reset(1), StreamEndState::OK);
        assert!(streams.can_admit());

        streams.insert_pushed(2, Priority::Lowest);
        assert!(streams.can_admit());

        let mut unlimited = Streams::new(0, 65536, 65536);
        unlimited.insert_local(1, Priority::Medium, false);
        assert!(unlimited.can_admit());
    }

    /// UT test cases for queued creations.
    ///
    /// # Brief
    /// 1. Queues creations at three priorities out of order.
    /// 2. Checks they drain highest priority first.
    #[test]
    fn ut_streams_pending_opens_priority_order() {
        let mut streams = Streams::new(1, 65536, 65536);
        streams.queue_open(open_request(Priority::Lowest));
        streams.queue_open(open_request(Priority::Highest));
        streams.queue_open(open_request(Priority::Medium));

        let order: Vec<Priority> = std::iter::from_fn(|| streams.next_pending_open())
            .map(|request| request.priority)
            .collect();
        assert_eq!(
            order,
            vec![Priority::Highest, Priority::Medium, Priority::Lowest]
        );
        assert!(streams.is_drained());
    }

    /// UT test cases for `Streams::recv_reply`.
    ///
    /// # Brief
    /// 1. Checks an awaited reply opens the stream.
    /// 2. Checks a second reply is a stream protocol error.
    /// 3. Checks a reply for an unknown stream asks for an invalid-stream
    ///    reset.
    /// 4. Checks a FIN reply on a stream that already sent its own FIN
    ///    removes the entry.
    #[test]
    fn ut_streams_recv_reply() {
        let mut streams = Streams::new(0, 65536, 65536);
        streams.insert_local(1, Priority::Medium, false);
        assert_eq!(streams.recv_reply(1, false), FrameRecvState::OK);
        assert_eq!(streams.stream_map.get(&1).unwrap().state, SpdyStreamState::Open);

        assert_eq!(
            streams.recv_reply(1, false),
            FrameRecvState::Err(SpdyError::StreamError(1, ResetStatus::ProtocolError))
        );

        assert_eq!(
            streams.recv_reply(5, false),
            FrameRecvState::Err(SpdyError::StreamError(5, ResetStatus::InvalidStream))
        );

        streams.insert_local(3, Priority::Medium, true);
        assert_eq!(streams.recv_reply(3, true), FrameRecvState::OK);
        assert!(!streams.contains(3));
    }

    /// UT test cases for `Streams::recv_data`.
    ///
    /// # Brief
    /// 1. Checks data before the reply is a stream protocol error.
    /// 2. Checks data for an unknown stream is ignored.
    /// 3. Checks a data FIN moves the stream to `RemoteDone` and more data
    ///    after it is an error.
    #[test]
    fn ut_streams_recv_data() {
        let mut streams = Streams::new(0, 65536, 65536);
        streams.insert_local(1, Priority::Medium, false);
        assert_eq!(
            streams.recv_data(1, 4, false),
            FrameRecvState::Err(SpdyError::StreamError(1, ResetStatus::ProtocolError))
        );

        assert_eq!(streams.recv_data(9, 4, false), FrameRecvState::Ignore);

        streams.insert_local(3, Priority::Medium, false);
        assert_eq!(streams.recv_reply(3, false), FrameRecvState::OK);
        assert_eq!(streams.recv_data(3, 4, true), FrameRecvState::OK);
        assert_eq!(
            streams.stream_map.get(&3).unwrap().state,
            SpdyStreamState::RemoteDone
        );
        assert_eq!(
            streams.recv_data(3, 4, false),
            FrameRecvState::Err(SpdyError::StreamError(3, ResetStatus::ProtocolError))
        );
    }

    /// UT test cases for `Streams::pump_pending_data`.
    ///
    /// # Brief
    /// 1. Queues a 10-byte body with FIN on a stream whose window is 10 and
    ///    pumps with 4-byte chunks.
    /// 2. Checks three data frames leave, sized 4, 4 and 2, FIN on the last.
    /// 3. Checks the message's sender fires after the last chunk.
    #[test]
    fn ut_streams_pump_chunks_and_fin() {
        let mut streams = Streams::new(0, 10, 65536);
        streams.insert_local(1, Priority::Medium, false);
        assert_eq!(streams.recv_reply(1, false), FrameRecvState::OK);

        let (input_tx, mut input_rx) = unbounded_channel();
        let (sender, mut done) = oneshot::channel();
        streams.queue_data(DataMessage {
            id: 1,
            data: vec![7u8; 10],
            fin: true,
            sender,
        });
        assert!(streams.pump_pending_data(1, 4, &input_tx).is_ok());

        let mut sizes = Vec::new();
        let mut fins = Vec::new();
        while let Ok(queued) = input_rx.try_recv() {
            fins.push(queued.frame.flags().is_fin());
            match queued.frame.payload() {
                Payload::Data(data) => sizes.push(data.size()),
                other => panic!("unexpected payload: {other:?}"),
            }
        }
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(fins, vec![false, false, true]);
        assert_eq!(done.try_recv().unwrap(), Ok(()));
        assert!(streams.stream_map.get(&1).unwrap().local_fin);
    }

    /// UT test cases for send-window stalls.
    ///
    /// # Brief
    /// 1. Queues 5 bytes on a stream whose window is 3 and pumps.
    /// 2. Checks only 3 bytes leave and the sender has not fired.
    /// 3. Grows the window with a window update and pumps again.
    /// 4. Checks the rest leaves and the sender fires.
    #[test]
    fn ut_streams_pump_stalls_on_window() {
        let mut streams = Streams::new(0, 3, 65536);
        streams.insert_local(1, Priority::Medium, false);
        assert_eq!(streams.recv_reply(1, false), FrameRecvState::OK);

        let (input_tx, mut input_rx) = unbounded_channel();
        let (sender, mut done) = oneshot::channel();
        streams.queue_data(DataMessage {
            id: 1,
            data: vec![1u8; 5],
            fin: false,
            sender,
        });
        assert!(streams.pump_pending_data(1, 1024, &input_tx).is_ok());

        let first = input_rx.try_recv().unwrap();
        match first.frame.payload() {
            Payload::Data(data) => assert_eq!(data.size(), 3),
            other => panic!("unexpected payload: {other:?}"),
        }
        assert!(input_rx.try_recv().is_err());
        assert!(done.try_recv().is_err());

        assert_eq!(streams.recv_window_update(1, 10), FrameRecvState::OK);
        assert!(streams.pump_pending_data(1, 1024, &input_tx).is_ok());
        let second = input_rx.try_recv().unwrap();
        match second.frame.payload() {
            Payload::Data(data) => assert_eq!(data.size(), 2),
            other => panic!("unexpected payload: {other:?}"),
        }
        assert_eq!(done.try_recv().unwrap(), Ok(()));
    }

    /// UT test cases for `Streams::release_recv_window`.
    ///
    /// # Brief
    /// 1. Releases less than half the receive window and checks no frame
    ///    leaves.
    /// 2. Releases past the half mark and checks one `WINDOW_UPDATE` with
    ///    the whole credit leaves at the highest priority.
    #[test]
    fn ut_streams_release_recv_window() {
        let mut streams = Streams::new(0, 65536, 100);
        streams.insert_local(1, Priority::Lowest, false);
        assert_eq!(streams.recv_reply(1, false), FrameRecvState::OK);
        assert_eq!(streams.recv_data(1, 80, false), FrameRecvState::OK);

        let (input_tx, mut input_rx) = unbounded_channel();
        assert!(streams.release_recv_window(1, 40, &input_tx).is_ok());
        assert!(input_rx.try_recv().is_err());

        assert!(streams.release_recv_window(1, 40, &input_tx).is_ok());
        let queued = input_rx.try_recv().unwrap();
        assert_eq!(queued.priority, Priority::Highest);
        match queued.frame.payload() {
            Payload::WindowUpdate(update) => assert_eq!(update.delta(), 80),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    /// UT test cases for initial window resizing.
    ///
    /// # Brief
    /// 1. Applies a larger initial window and checks live streams grow.
    /// 2. Applies a smaller one and checks live streams shrink.
    /// 3. Fills a stream's window near the 31-bit limit with updates, grows
    ///    the initial size and checks the overflowing stream is reported.
    #[test]
    fn ut_streams_apply_initial_send_window() {
        let mut streams = Streams::new(0, 100, 65536);
        streams.insert_local(1, Priority::Medium, false);

        assert!(streams.apply_initial_send_window(150).is_empty());
        assert_eq!(
            streams.stream_map.get(&1).unwrap().send_window.size_available(),
            150
        );

        assert!(streams.apply_initial_send_window(50).is_empty());
        assert_eq!(
            streams.stream_map.get(&1).unwrap().send_window.size_available(),
            50
        );

        assert_eq!(
            streams.recv_window_update(1, (i32::MAX - 50) as u32),
            FrameRecvState::OK
        );
        assert_eq!(streams.apply_initial_send_window(150), vec![1]);
    }
}
