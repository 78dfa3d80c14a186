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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ylong_spdy::decoder::FrameDecoder;
use ylong_spdy::encoder::FrameEncoder;
use ylong_spdy::frame::{
    Frame, FrameFlags, Payload, Priority, SettingId, Settings,
};
use ylong_spdy::headers::NvBlock;

use crate::error::{ErrorKind, NetError, SpdyClientError};
use crate::runtime::{
    bounded_channel, oneshot, spawn, split, unbounded_channel, AsyncRead, AsyncWrite, JoinHandle,
    UnboundedSender,
};
use crate::util::address::Endpoint;
use crate::util::config::SessionConfig;
use crate::util::settings::SpdySettingsStorage;
use crate::util::spdy::input::SendData;
use crate::util::spdy::manager::{ConnManager, SessionController};
use crate::util::spdy::output::RecvData;
use crate::util::spdy::stream::SpdyStream;
use crate::util::spdy::streams::Streams;
use crate::util::spdy::{
    dispatch_client_error, OpenRequest, PushClaim, QueuedFrame, SessionCmd,
};
use crate::util::tls::CertStatus;

/// Identity of the session's remote side.
pub(crate) struct SessionDetail {
    /// `host:port` the connection actually terminates at, the key for
    /// persisted settings.
    pub(crate) authority: String,

    /// Whether the connection runs over TLS.
    pub(crate) secure: bool,

    /// A certificate problem that was ignored during the handshake. While
    /// set, the session refuses secure requests but keeps serving plain
    /// ones, covering the protocol-upgrade case where a plain request rides
    /// a TLS connection.
    pub(crate) cert_error: Option<CertStatus>,
}

pub(crate) struct SessionShared {
    pub(crate) cmd_tx: UnboundedSender<SessionCmd>,
    io_shutdown: Arc<AtomicBool>,
    io_goaway: Arc<AtomicBool>,
    secure: bool,
    cert_error: Option<CertStatus>,
    handles: Vec<JoinHandle<()>>,
}

impl Drop for SessionShared {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// One multiplexed session over one connection.
///
/// Cloning shares the session. Streams created from it hold only weak
/// references back, so dropping the last `SpdySession` tears the io
/// coroutines down even while streams are outstanding.
#[derive(Clone)]
pub struct SpdySession {
    inner: Arc<SessionShared>,
}

impl SpdySession {
    /// Starts a session on `io`: replays persisted settings as the first
    /// frame, then launches the writer, reader and manager coroutines.
    pub(crate) fn with_io<S>(
        io: S,
        detail: SessionDetail,
        config: SessionConfig,
        storage: SpdySettingsStorage,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let io_shutdown = Arc::new(AtomicBool::new(false));
        let io_goaway = Arc::new(AtomicBool::new(false));

        let mut streams = Streams::new(
            config.max_concurrent_streams,
            config.initial_window_size,
            config.initial_window_size,
        );
        let replay = storage.get(&detail.authority);
        for entry in replay.iter() {
            match entry.id() {
                SettingId::MaxConcurrentStreams => {
                    streams.apply_max_concurrent(entry.value() as usize);
                }
                SettingId::InitialWindowSize => {
                    let _ = streams
                        .apply_initial_send_window(entry.value().min(i32::MAX as u32) as i32);
                }
                _ => {}
            }
        }

        let (input_tx, input_rx) = unbounded_channel();
        let (resp_tx, resp_rx) = bounded_channel(config.frame_channel_depth);
        let (cmd_tx, cmd_rx) = unbounded_channel();

        // The replayed settings are the first thing on the wire.
        if !replay.is_empty() {
            let frame = Frame::new(0, FrameFlags::empty(), Payload::Settings(Settings::new(replay)));
            let _ = input_tx.send(QueuedFrame {
                priority: Priority::Highest,
                frame,
            });
        }

        let controller = SessionController::new(streams, io_shutdown.clone(), io_goaway.clone());
        let manager = ConnManager::new(
            controller,
            storage,
            detail.authority,
            config.max_data_chunk,
            input_tx,
            resp_rx,
            cmd_rx,
        );

        let (reader, writer) = split(io);
        let mut handles = Vec::with_capacity(3);
        let send_task = SendData::new(FrameEncoder::new(), writer, input_rx, resp_tx.clone());
        handles.push(spawn(async move {
            let _ = send_task.await;
        }));
        let recv_task = RecvData::new(
            FrameDecoder::new(),
            reader,
            resp_tx,
            config.read_buffer_size,
        );
        handles.push(spawn(async move {
            let _ = recv_task.await;
        }));
        handles.push(spawn(async move {
            let _ = manager.await;
        }));

        Self {
            inner: Arc::new(SessionShared {
                cmd_tx,
                io_shutdown,
                io_goaway,
                secure: detail.secure,
                cert_error: detail.cert_error,
                handles,
            }),
        }
    }

    /// Opens a stream towards `endpoint` with the given header block. The
    /// call resolves once the stream is admitted, which may wait on a
    /// concurrency slot. `fin` marks a request without body.
    pub async fn create_stream(
        &self,
        endpoint: &Endpoint,
        headers: NvBlock,
        priority: Priority,
        fin: bool,
    ) -> Result<SpdyStream, SpdyClientError> {
        self.check_certificate(endpoint)?;
        let (sender, receiver) = oneshot::channel();
        self.inner
            .cmd_tx
            .send(SessionCmd::Open(OpenRequest {
                headers,
                priority,
                fin,
                sender,
            }))
            .map_err(|_| closed_error())?;
        match receiver.await {
            Ok(Ok(opened)) => Ok(SpdyStream::new(opened, Arc::downgrade(&self.inner))),
            Ok(Err(kind)) => Err(dispatch_client_error(kind)),
            Err(_) => Err(closed_error()),
        }
    }

    /// Claims a pushed stream for a request path. `Ok(None)` means the
    /// session knows nothing about that path and the caller should open a
    /// normal stream. When the push was announced but has not arrived, the
    /// call parks until it does.
    pub async fn claim_pushed(
        &self,
        endpoint: &Endpoint,
        path: &str,
    ) -> Result<Option<SpdyStream>, SpdyClientError> {
        self.check_certificate(endpoint)?;
        let (sender, receiver) = oneshot::channel();
        self.inner
            .cmd_tx
            .send(SessionCmd::ClaimPush(PushClaim {
                path: path.to_string(),
                sender,
            }))
            .map_err(|_| closed_error())?;
        match receiver.await {
            Ok(Ok(Some(opened))) => Ok(Some(SpdyStream::new(opened, Arc::downgrade(&self.inner)))),
            Ok(Ok(None)) => Ok(None),
            Ok(Err(kind)) => Err(dispatch_client_error(kind)),
            Err(_) => Err(closed_error()),
        }
    }

    /// Shuts the session down. Every live stream sees a terminal event.
    pub fn close(&self) {
        let _ = self.inner.cmd_tx.send(SessionCmd::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.io_shutdown.load(Ordering::Relaxed)
    }

    /// Whether the server announced it will accept no more streams here.
    pub fn is_going_away(&self) -> bool {
        self.inner.io_goaway.load(Ordering::Relaxed)
    }

    fn check_certificate(&self, endpoint: &Endpoint) -> Result<(), SpdyClientError> {
        if self.inner.secure && endpoint.is_secure() {
            if let Some(status) = self.inner.cert_error {
                return Err(SpdyClientError::from_net_error(
                    ErrorKind::Request,
                    NetError::CertError(status),
                ));
            }
        }
        Ok(())
    }
}

fn closed_error() -> SpdyClientError {
    SpdyClientError::from_net_error(ErrorKind::Request, NetError::ConnectionClosed)
}
