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

//! # ylong_spdy_client
//!
//! An asynchronous client for multiplexed stream sessions over the `SPDY/2`
//! wire protocol, built on the [`ylong_spdy`] codec crate.
//!
//! The crate provides:
//!
//! - A [`NetworkContext`] that owns the connection machinery shared between
//!   requests: DNS resolution, proxy selection, layered socket pools with
//!   idle reuse, TLS negotiation through a pluggable provider and a pool of
//!   live multiplexed sessions.
//! - A [`StreamRequest`] state machine that turns a destination into a ready
//!   stream, falling back across proxies, alternate protocols and TLS
//!   configurations on the way.
//! - [`SpdySession`] and [`SpdyStream`] for driving individual streams over a
//!   shared framed connection with flow control and server push support.
//!
//! [`NetworkContext`]: async_impl::NetworkContext
//! [`StreamRequest`]: async_impl::StreamRequest

// Re-exports the frame-level types callers need to build headers and inspect
// reset codes.
pub use ylong_spdy::error::{ResetStatus, SpdyError};
pub use ylong_spdy::frame::{
    Priority, SettingEntry, SettingId, Settings, SettingsBuilder, StreamId,
};
pub use ylong_spdy::headers::NvBlock;

mod error;

pub mod async_impl;
pub(crate) mod util;

pub use error::{ErrorKind, NetError, SpdyClientError};
pub use util::config::{ClientConfig, ConnectConfig, PoolConfig, SessionConfig, Timeout};
pub use util::proxy::{
    FixedProxyResolver, ProxyCredentials, ProxyFuture, ProxyList, ProxyResolver, ProxyScheme,
    ProxyServer,
};
pub use util::spdy::{BodyReader, SpdySession, SpdyStream, StreamResponse};
pub use util::tls::{
    AllowedBadCert, CertStatus, SslConfig, SslInfo, TlsError, TlsHandshakeFuture, TlsProvider,
    TlsSession,
};

pub(crate) mod runtime {
    pub(crate) use tokio::io::{
        split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf, ReadHalf, WriteHalf,
    };
    pub(crate) use tokio::net::TcpStream;
    pub(crate) use tokio::spawn;
    pub(crate) use tokio::sync::mpsc::{
        channel as bounded_channel, error::SendError, unbounded_channel,
        Receiver as BoundedReceiver, Sender as BoundedSender, UnboundedReceiver, UnboundedSender,
    };
    pub(crate) use tokio::sync::oneshot;
    pub(crate) use tokio::task::{spawn_blocking, JoinHandle};
    pub(crate) use tokio::time::{sleep, timeout};
}
