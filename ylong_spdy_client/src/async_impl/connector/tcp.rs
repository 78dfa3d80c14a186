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

//! Direct TCP establishment.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::async_impl::connector::{
    BoxedIo, ConnIo, ConnectFailure, ConnectFuture, ConnectParams, PoolConnector,
};
use crate::async_impl::dns::Resolver;
use crate::error::NetError;
use crate::runtime::{AsyncRead, AsyncWrite, ReadBuf, TcpStream};

// A plain TCP transport. Liveness is tracked from observed reads and
// writes: once an EOF or an error came through, the pool stops reusing it.
pub(crate) struct PlainConn {
    stream: TcpStream,
    closed: AtomicBool,
}

impl PlainConn {
    pub(crate) fn new(stream: TcpStream) -> Self {
        // Session frames are small and latency bound.
        let _ = stream.set_nodelay(true);
        Self {
            stream,
            closed: AtomicBool::new(false),
        }
    }
}

impl AsyncRead for PlainConn {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        match Pin::new(&mut self.stream).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                if buf.filled().len() == before {
                    self.closed.store(true, Ordering::SeqCst);
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(err)) => {
                self.closed.store(true, Ordering::SeqCst);
                Poll::Ready(Err(err))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl AsyncWrite for PlainConn {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match Pin::new(&mut self.stream).poll_write(cx, buf) {
            Poll::Ready(Err(err)) => {
                self.closed.store(true, Ordering::SeqCst);
                Poll::Ready(Err(err))
            }
            other => other,
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.closed.store(true, Ordering::SeqCst);
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

impl ConnIo for PlainConn {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

pub(crate) struct TcpConnector {
    resolver: Arc<dyn Resolver>,
}

impl TcpConnector {
    pub(crate) fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }
}

impl PoolConnector for TcpConnector {
    fn connect(&self, params: ConnectParams) -> ConnectFuture {
        let resolver = Arc::clone(&self.resolver);
        Box::pin(async move {
            let ConnectParams::Tcp(params) = params else {
                return Err(ConnectFailure::new(NetError::ConnectionFailed));
            };
            let conn = connect_to_host(resolver.as_ref(), &params.host, params.port).await?;
            Ok(Box::new(conn) as BoxedIo)
        })
    }
}

// Resolves and tries each address in order. The most recent failure wins
// when every address fails.
pub(crate) async fn connect_to_host(
    resolver: &dyn Resolver,
    host: &str,
    port: u16,
) -> Result<PlainConn, ConnectFailure> {
    let authority = format!("{host}:{port}");
    let addrs = resolver
        .resolve(&authority)
        .await
        .map_err(|_| ConnectFailure::new(NetError::NameNotResolved))?;
    if addrs.is_empty() {
        return Err(ConnectFailure::new(NetError::NameNotResolved));
    }
    let mut last = NetError::ConnectionFailed;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(PlainConn::new(stream)),
            Err(err) => last = NetError::from_io_kind(err.kind()),
        }
    }
    Err(ConnectFailure::new(last))
}
