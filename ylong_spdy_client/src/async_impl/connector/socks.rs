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

//! SOCKS proxy handshakes.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::async_impl::connector::{
    BoxedIo, ConnectFailure, ConnectFuture, ConnectParams, PoolConnector, TcpParams,
};
use crate::async_impl::dns::Resolver;
use crate::error::NetError;
use crate::runtime::{AsyncReadExt, AsyncWriteExt};
use crate::util::pool::SocketPool;
use crate::util::proxy::ProxyScheme;

// Runs a SOCKS handshake over a carrier transport acquired from the plain
// TCP pool, then hands the finished transport to the owning pool.
pub(crate) struct SocksConnector {
    tcp_pool: SocketPool,
    resolver: Arc<dyn Resolver>,
}

impl SocksConnector {
    pub(crate) fn new(tcp_pool: SocketPool, resolver: Arc<dyn Resolver>) -> Self {
        Self { tcp_pool, resolver }
    }
}

impl PoolConnector for SocksConnector {
    fn connect(&self, params: ConnectParams) -> ConnectFuture {
        let pool = self.tcp_pool.clone();
        let resolver = Arc::clone(&self.resolver);
        Box::pin(async move {
            let ConnectParams::Socks(params) = params else {
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
            match params.proxy.scheme() {
                ProxyScheme::Socks4 => {
                    socks4_handshake(&mut io, resolver.as_ref(), &params.host, params.port)
                        .await?;
                }
                ProxyScheme::Socks5 => {
                    socks5_handshake(&mut io, &params.host, params.port).await?;
                }
                _ => return Err(ConnectFailure::new(NetError::ConnectionFailed)),
            }
            Ok(io)
        })
    }
}

// SOCKS4 carries a raw IPv4 address, so the destination is resolved here
// instead of by the proxy.
async fn socks4_handshake(
    io: &mut BoxedIo,
    resolver: &dyn Resolver,
    host: &str,
    port: u16,
) -> Result<(), ConnectFailure> {
    let authority = format!("{host}:{port}");
    let addrs = resolver
        .resolve(&authority)
        .await
        .map_err(|_| ConnectFailure::new(NetError::NameNotResolved))?;
    let mut target = None;
    for addr in addrs {
        if let SocketAddr::V4(v4) = addr {
            target = Some(v4);
            break;
        }
    }
    let Some(target) = target else {
        return Err(ConnectFailure::new(NetError::SocksConnectionFailed));
    };

    let mut request = Vec::with_capacity(9);
    request.push(0x04);
    request.push(0x01);
    request.extend_from_slice(&port.to_be_bytes());
    request.extend_from_slice(&target.ip().octets());
    // Empty user id.
    request.push(0x00);
    write_handshake(io, &request).await?;

    let mut reply = [0u8; 8];
    read_handshake(io, &mut reply).await?;
    if reply[1] != 0x5A {
        return Err(ConnectFailure::new(NetError::SocksConnectionFailed));
    }
    Ok(())
}

// SOCKS5 with the no-authentication method, sending the destination as a
// domain name so the proxy resolves it.
async fn socks5_handshake(io: &mut BoxedIo, host: &str, port: u16) -> Result<(), ConnectFailure> {
    if host.len() > 255 {
        return Err(ConnectFailure::new(NetError::SocksConnectionFailed));
    }
    write_handshake(io, &[0x05, 0x01, 0x00]).await?;
    let mut method = [0u8; 2];
    read_handshake(io, &mut method).await?;
    if method != [0x05, 0x00] {
        return Err(ConnectFailure::new(NetError::SocksConnectionFailed));
    }

    let mut request = Vec::with_capacity(7 + host.len());
    request.extend_from_slice(&[0x05, 0x01, 0x00, 0x03, host.len() as u8]);
    request.extend_from_slice(host.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    write_handshake(io, &request).await?;

    let mut head = [0u8; 4];
    read_handshake(io, &mut head).await?;
    if head[0] != 0x05 {
        return Err(ConnectFailure::new(NetError::SocksConnectionFailed));
    }
    match head[1] {
        0x00 => {}
        0x04 => return Err(ConnectFailure::new(NetError::AddressUnreachable)),
        _ => return Err(ConnectFailure::new(NetError::SocksConnectionFailed)),
    }
    // The bound address closes the reply, its length depends on the type.
    let remaining = match head[3] {
        0x01 => 4 + 2,
        0x04 => 16 + 2,
        0x03 => {
            let mut len = [0u8; 1];
            read_handshake(io, &mut len).await?;
            len[0] as usize + 2
        }
        _ => return Err(ConnectFailure::new(NetError::SocksConnectionFailed)),
    };
    let mut bound = vec![0u8; remaining];
    read_handshake(io, &mut bound).await?;
    Ok(())
}

async fn write_handshake(io: &mut BoxedIo, bytes: &[u8]) -> Result<(), ConnectFailure> {
    io.write_all(bytes)
        .await
        .map_err(|_| ConnectFailure::new(NetError::SocksConnectionFailed))
}

async fn read_handshake(io: &mut BoxedIo, buf: &mut [u8]) -> Result<(), ConnectFailure> {
    io.read_exact(buf)
        .await
        .map(|_| ())
        .map_err(|_| ConnectFailure::new(NetError::SocksConnectionFailed))
}
