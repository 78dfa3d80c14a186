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

//! HTTP CONNECT tunnels.

use std::sync::Arc;

use crate::async_impl::connector::{
    BoxedIo, ConnectFailure, ConnectFuture, ConnectParams, PoolConnector, TcpParams,
    TunnelParams, TunnelResponse,
};
use crate::error::NetError;
use crate::runtime::{AsyncReadExt, AsyncWriteExt};
use crate::util::pool::SocketPool;
use crate::util::proxy::ProxyScheme;
use crate::util::tls::{SslConfig, TlsProvider};

const MAX_RESPONSE_BYTES: usize = 16 * 1024;

// Asks an HTTP proxy for a raw tunnel to the destination. For an HTTPS
// proxy the exchange itself runs over TLS to the proxy.
pub(crate) struct TunnelConnector {
    tcp_pool: SocketPool,
    tls: Option<Arc<dyn TlsProvider>>,
}

impl TunnelConnector {
    pub(crate) fn new(tcp_pool: SocketPool, tls: Option<Arc<dyn TlsProvider>>) -> Self {
        Self { tcp_pool, tls }
    }
}

impl PoolConnector for TunnelConnector {
    fn connect(&self, params: ConnectParams) -> ConnectFuture {
        let pool = self.tcp_pool.clone();
        let tls = self.tls.clone();
        Box::pin(async move {
            let ConnectParams::Tunnel(params) = params else {
                return Err(ConnectFailure::new(NetError::ConnectionFailed));
            };
            let carrier = ConnectParams::Tcp(TcpParams {
                host: params.proxy.host().to_string(),
                port: params.proxy.port(),
                priority: params.priority,
            });
            let socket = pool
                .acquire(&params.proxy.authority(), carrier, params.priority)
                .await
                .map_err(|_| ConnectFailure::new(NetError::ProxyConnectionFailed))?;
            let Some(mut io) = socket.into_io() else {
                return Err(ConnectFailure::new(NetError::ProxyConnectionFailed));
            };
            if params.proxy.scheme() == ProxyScheme::Https {
                let Some(provider) = tls.as_deref() else {
                    return Err(ConnectFailure::new(NetError::ProxyConnectionFailed));
                };
                let session = provider
                    .handshake(io, params.proxy.host(), &SslConfig::default())
                    .await
                    .map_err(|_| ConnectFailure::new(NetError::ProxyConnectionFailed))?;
                io = session.io;
            }
            establish_tunnel(&mut io, &params).await?;
            Ok(io)
        })
    }
}

async fn establish_tunnel(
    io: &mut BoxedIo,
    params: &TunnelParams,
) -> Result<(), ConnectFailure> {
    let authority = format!("{}:{}", params.host, params.port);
    let mut request = format!(
        "CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\nProxy-Connection: keep-alive\r\n"
    );
    if let Some(auth) = &params.auth {
        request.push_str("Proxy-Authorization: ");
        request.push_str(&auth.basic_header_value());
        request.push_str("\r\n");
    }
    request.push_str("\r\n");
    io.write_all(request.as_bytes())
        .await
        .map_err(|_| ConnectFailure::new(NetError::TunnelConnectionFailed))?;

    let response = read_tunnel_response(io).await?;
    match response.status {
        200 => {
            // A tunnel grant carries no body. A proxy that announces one is
            // not actually tunneling.
            let has_body = response
                .header("content-length")
                .map(|value| value.trim() != "0")
                .unwrap_or(false)
                || response.header("transfer-encoding").is_some();
            if has_body {
                return Err(ConnectFailure::new(NetError::TunnelConnectionFailed));
            }
            Ok(())
        }
        407 => Err(
            ConnectFailure::new(NetError::ProxyAuthRequested).with_tunnel_response(response)
        ),
        _ => Err(ConnectFailure::new(NetError::TunnelConnectionFailed)),
    }
}

// Reads one byte at a time so no tunneled bytes past the header block get
// consumed.
async fn read_tunnel_response(io: &mut BoxedIo) -> Result<TunnelResponse, ConnectFailure> {
    let mut raw = Vec::new();
    let mut byte = [0u8; 1];
    while !raw.ends_with(b"\r\n\r\n") {
        if raw.len() >= MAX_RESPONSE_BYTES {
            return Err(ConnectFailure::new(NetError::TunnelConnectionFailed));
        }
        io.read_exact(&mut byte)
            .await
            .map_err(|_| ConnectFailure::new(NetError::TunnelConnectionFailed))?;
        raw.push(byte[0]);
    }
    parse_tunnel_response(&raw)
        .ok_or_else(|| ConnectFailure::new(NetError::TunnelConnectionFailed))
}

fn parse_tunnel_response(raw: &[u8]) -> Option<TunnelResponse> {
    let text = std::str::from_utf8(raw).ok()?;
    let mut lines = text.split("\r\n");
    let status_line = lines.next()?;
    let mut pieces = status_line.splitn(3, ' ');
    let version = pieces.next()?;
    if !version.starts_with("HTTP/1.") {
        return None;
    }
    let status = pieces.next()?.parse::<u16>().ok()?;
    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let (field, value) = line.split_once(':')?;
        headers.push((field.trim().to_string(), value.trim().to_string()));
    }
    Some(TunnelResponse { status, headers })
}
