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

//! Shared pieces for the integration tests: a handshake provider that
//! negotiates the multiplexed protocol without any cryptography, and a
//! scripted server end speaking the framed protocol over a real socket.

#![allow(dead_code)]

use std::collections::VecDeque;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use ylong_spdy::decoder::{FrameDecoder, FrameKind};
use ylong_spdy::encoder::FrameEncoder;
use ylong_spdy::error::ResetStatus;
use ylong_spdy::frame::{
    Data, Frame, FrameFlags, Goaway, Payload, Priority, RstStream, SynReply, SynStream,
};
use ylong_spdy::headers::NvBlock;
use ylong_spdy_client::async_impl::{BoxedIo, NetworkContext};
use ylong_spdy_client::{SslConfig, SslInfo, TlsHandshakeFuture, TlsProvider, TlsSession};

/// A handshake provider that passes the transport through untouched and
/// reports the configured protocol as negotiated.
pub struct PassThroughTls {
    protocol: Option<&'static str>,
}

impl PassThroughTls {
    pub fn negotiating(protocol: &'static str) -> Self {
        Self {
            protocol: Some(protocol),
        }
    }

    pub fn plain() -> Self {
        Self { protocol: None }
    }
}

impl TlsProvider for PassThroughTls {
    fn handshake(&self, io: BoxedIo, _host: &str, _config: &SslConfig) -> TlsHandshakeFuture {
        let protocol = self.protocol.map(String::from);
        Box::pin(async move {
            Ok(TlsSession {
                io,
                negotiated_protocol: protocol,
                info: SslInfo::default(),
            })
        })
    }
}

/// A context whose secure connections all negotiate the multiplexed
/// protocol.
pub fn multiplexed_context() -> NetworkContext {
    NetworkContext::builder()
        .tls_provider(PassThroughTls::negotiating("spdy/2"))
        .build()
}

/// A reply header block with a success status.
pub fn ok_headers() -> NvBlock {
    let mut headers = NvBlock::new();
    headers.insert("status", "200 OK");
    headers.insert("version", "HTTP/1.1");
    headers
}

/// The server end of one framed session. Sending and receiving go through
/// the server's own encoder and decoder, so header blocks stay coherent
/// with the session compression context.
pub struct SpdyServer {
    socket: TcpStream,
    encoder: FrameEncoder,
    decoder: FrameDecoder,
    frames: VecDeque<Frame>,
}

impl SpdyServer {
    /// Waits for one connection and wraps it.
    pub async fn accept(listener: &TcpListener) -> Self {
        let (socket, _) = listener.accept().await.expect("server accept failed");
        Self {
            socket,
            encoder: FrameEncoder::new(),
            decoder: FrameDecoder::new(),
            frames: VecDeque::new(),
        }
    }

    /// Reads from the socket until one complete frame is available.
    pub async fn recv_frame(&mut self) -> Frame {
        loop {
            if let Some(frame) = self.frames.pop_front() {
                return frame;
            }
            let mut buf = [0u8; 4096];
            let read = self.socket.read(&mut buf).await.expect("server read failed");
            assert_ne!(read, 0, "peer closed while a frame was expected");
            let frames = self
                .decoder
                .decode(&buf[..read])
                .expect("server decode failed");
            for kind in frames {
                if let FrameKind::Complete(frame) = kind {
                    self.frames.push_back(frame);
                }
            }
        }
    }

    /// Receives frames until a stream-open arrives, skipping session
    /// housekeeping on the way.
    pub async fn recv_syn_stream(&mut self) -> (u32, bool, NvBlock) {
        loop {
            let frame = self.recv_frame().await;
            let (id, flags, payload) = frame.into_parts();
            if let Payload::SynStream(syn) = payload {
                return (id, flags.is_fin(), syn.into_headers());
            }
        }
    }

    /// Receives frames until a data chunk arrives on `id`.
    pub async fn recv_data(&mut self, id: u32) -> (Vec<u8>, bool) {
        loop {
            let frame = self.recv_frame().await;
            if frame.stream_id() != id {
                continue;
            }
            let (_, flags, payload) = frame.into_parts();
            if let Payload::Data(data) = payload {
                return (data.into_vec(), flags.is_fin());
            }
        }
    }

    pub async fn send_frame(&mut self, frame: Frame) {
        let bytes = self.encoder.encode(&frame).expect("server encode failed");
        self.socket
            .write_all(&bytes)
            .await
            .expect("server write failed");
    }

    /// Sends the header reply for a stream.
    pub async fn send_reply(&mut self, id: u32, headers: NvBlock, fin: bool) {
        let mut flags = FrameFlags::empty();
        flags.set_fin(fin);
        self.send_frame(Frame::new(
            id,
            flags,
            Payload::SynReply(SynReply::new(headers)),
        ))
        .await;
    }

    /// Sends one data chunk on a stream.
    pub async fn send_data(&mut self, id: u32, data: &[u8], fin: bool) {
        let mut flags = FrameFlags::empty();
        flags.set_fin(fin);
        self.send_frame(Frame::new(id, flags, Payload::Data(Data::new(data.to_vec()))))
            .await;
    }

    /// Opens a pushed stream for a request path. The open doubles as the
    /// push's reply; data frames follow unless `fin` is set.
    pub async fn send_push(&mut self, id: u32, associated: u32, path: &str, fin: bool) {
        let mut headers = NvBlock::new();
        headers.insert("path", path);
        headers.insert("status", "200 OK");
        let mut flags = FrameFlags::empty();
        flags.set_fin(fin);
        flags.set_unidirectional(true);
        self.send_frame(Frame::new(
            id,
            flags,
            Payload::SynStream(SynStream::new(associated, Priority::Medium, headers)),
        ))
        .await;
    }

    pub async fn send_rst(&mut self, id: u32, status: ResetStatus) {
        self.send_frame(Frame::new(
            id,
            FrameFlags::empty(),
            Payload::RstStream(RstStream::new(status)),
        ))
        .await;
    }

    pub async fn send_goaway(&mut self, last_accepted: u32) {
        self.send_frame(Frame::new(
            0,
            FrameFlags::empty(),
            Payload::Goaway(Goaway::new(last_accepted)),
        ))
        .await;
    }
}
