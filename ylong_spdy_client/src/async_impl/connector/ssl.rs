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

//! TLS layering over pooled transports.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::async_impl::connector::{
    group_name, BoxedIo, ConnIo, ConnectFailure, ConnectFuture, ConnectParams, PoolConnector,
};
use crate::error::NetError;
use crate::runtime::{timeout, AsyncRead, AsyncWrite, ReadBuf};
use crate::util::pool::SocketPool;
use crate::util::tls::{SslInfo, TlsProvider};

// Acquires a carrier from the pool matching the inner connect layer and
// runs the TLS handshake over it. Failures of the carrier acquire pass
// through untouched so tunnel authentication challenges reach the caller.
pub(crate) struct SslConnector {
    tcp_pool: SocketPool,
    socks_pool: SocketPool,
    tunnel_pool: SocketPool,
    tls: Option<Arc<dyn TlsProvider>>,
    handshake_timeout: Duration,
}

impl SslConnector {
    pub(crate) fn new(
        tcp_pool: SocketPool,
        socks_pool: SocketPool,
        tunnel_pool: SocketPool,
        tls: Option<Arc<dyn TlsProvider>>,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            tcp_pool,
            socks_pool,
            tunnel_pool,
            tls,
            handshake_timeout,
        }
    }
}

impl PoolConnector for SslConnector {
    fn connect(&self, params: ConnectParams) -> ConnectFuture {
        let tcp = self.tcp_pool.clone();
        let socks = self.socks_pool.clone();
        let tunnel = self.tunnel_pool.clone();
        let tls = self.tls.clone();
        let handshake_timeout = self.handshake_timeout;
        Box::pin(async move {
            let ConnectParams::Ssl(params) = params else {
                return Err(ConnectFailure::new(NetError::ConnectionFailed));
            };
            let inner = *params.inner;
            let pool = match &inner {
                ConnectParams::Tcp(_) => &tcp,
                ConnectParams::Socks(_) => &socks,
                ConnectParams::Tunnel(_) => &tunnel,
                ConnectParams::Ssl(_) => {
                    return Err(ConnectFailure::new(NetError::ConnectionFailed));
                }
            };
            let group = group_name(&inner);
            let priority = inner.priority();
            let socket = pool.acquire(&group, inner, priority).await?;
            let Some(io) = socket.into_io() else {
                return Err(ConnectFailure::new(NetError::ConnectionFailed));
            };
            let Some(provider) = tls else {
                return Err(ConnectFailure::new(NetError::ConnectionFailed));
            };

            let handshake = provider.handshake(io, &params.host, &params.config);
            let session = match timeout(handshake_timeout, handshake).await {
                Ok(Ok(session)) => session,
                Ok(Err(tls_error)) => {
                    let failure = ConnectFailure::new(tls_error.error);
                    return Err(match tls_error.info {
                        Some(info) => failure.with_ssl_info(info),
                        None => failure,
                    });
                }
                Err(_) => return Err(ConnectFailure::new(NetError::TimedOut)),
            };
            Ok(Box::new(SslStream {
                io: session.io,
                protocol: session.negotiated_protocol,
                info: session.info,
            }) as BoxedIo)
        })
    }
}

// Keeps the negotiation results attached to the transport so they survive
// pool round trips.
pub(crate) struct SslStream {
    io: BoxedIo,
    protocol: Option<String>,
    info: SslInfo,
}

impl AsyncRead for SslStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for SslStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }
}

impl ConnIo for SslStream {
    fn is_open(&self) -> bool {
        self.io.is_open()
    }

    fn negotiated_protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    fn ssl_info(&self) -> Option<&SslInfo> {
        Some(&self.info)
    }
}

#[cfg(test)]
mod ut_ssl_connector {
    use std::sync::Arc;
    use std::time::Duration;

    use ylong_spdy::frame::Priority;

    use crate::async_impl::connector::ssl::SslConnector;
    use crate::async_impl::connector::{ConnectParams, PoolConnector, SslParams, TcpParams};
    use crate::error::NetError;
    use crate::util::config::PoolConfig;
    use crate::util::pool::SocketPool;
    use crate::util::test_utils::{
        TestConnect, TestConnector, TestHandshake, TestTlsProvider, TEST_CERT,
    };
    use crate::util::tls::{AllowedBadCert, CertStatus, SslConfig};

    fn ssl_connector(
        tcp: TestConnector,
        provider: TestTlsProvider,
        handshake_timeout: Duration,
    ) -> SslConnector {
        let tcp_pool = SocketPool::new(Arc::new(tcp), PoolConfig::default());
        let socks_pool = SocketPool::new(Arc::new(TestConnector::new()), PoolConfig::default());
        let tunnel_pool = SocketPool::new(Arc::new(TestConnector::new()), PoolConfig::default());
        SslConnector::new(
            tcp_pool,
            socks_pool,
            tunnel_pool,
            Some(Arc::new(provider)),
            handshake_timeout,
        )
    }

    fn ssl_params(config: SslConfig) -> ConnectParams {
        ConnectParams::Ssl(SslParams {
            inner: Box::new(ConnectParams::Tcp(TcpParams {
                host: String::from("example.com"),
                port: 443,
                priority: Priority::Medium,
            })),
            host: String::from("example.com"),
            config,
            priority: Priority::Medium,
        })
    }

    /// UT test cases for a successful handshake.
    ///
    /// # Brief
    /// 1. Connects with a provider that negotiates a protocol.
    /// 2. Checks the negotiation results stay on the transport.
    #[tokio::test]
    async fn ut_ssl_connector_negotiates() {
        let provider = TestTlsProvider::new();
        provider.script(TestHandshake::Ok {
            protocol: Some("spdy/2"),
        });
        let connector = ssl_connector(TestConnector::new(), provider, Duration::from_secs(5));
        let io = connector
            .connect(ssl_params(SslConfig::default()))
            .await
            .unwrap();
        assert_eq!(io.negotiated_protocol(), Some("spdy/2"));
        assert!(io.ssl_info().is_some());
        assert!(io.is_open());
    }

    /// UT test cases for certificate failures.
    ///
    /// # Brief
    /// 1. Connects with a provider whose certificate fails verification.
    /// 2. Checks the failure keeps the certificate details.
    /// 3. Retries with the certificate allowed and checks it succeeds.
    #[tokio::test]
    async fn ut_ssl_connector_cert_error() {
        let status = CertStatus::AUTHORITY_INVALID;
        let provider = TestTlsProvider::new();
        provider.script(TestHandshake::CertProblem(status));
        provider.script(TestHandshake::CertProblem(status));
        let connector = ssl_connector(TestConnector::new(), provider, Duration::from_secs(5));

        let failure = connector
            .connect(ssl_params(SslConfig::default()))
            .await
            .unwrap_err();
        assert_eq!(failure.error, NetError::CertError(status));
        let info = failure.ssl_info.unwrap();
        assert_eq!(info.cert, TEST_CERT);
        assert_eq!(info.cert_status, status);

        let mut config = SslConfig::default();
        config.allowed_bad_certs.push(AllowedBadCert {
            cert: TEST_CERT.to_vec(),
            cert_status: status,
        });
        assert!(connector.connect(ssl_params(config)).await.is_ok());
    }

    /// UT test cases for the handshake deadline.
    ///
    /// # Brief
    /// 1. Connects with a provider that never finishes.
    /// 2. Checks the failure is classified as a timeout.
    #[tokio::test]
    async fn ut_ssl_handshake_timeout() {
        let provider = TestTlsProvider::new();
        provider.script(TestHandshake::Hang);
        let connector = ssl_connector(
            TestConnector::new(),
            provider,
            Duration::from_millis(20),
        );
        let failure = connector
            .connect(ssl_params(SslConfig::default()))
            .await
            .unwrap_err();
        assert_eq!(failure.error, NetError::TimedOut);
    }

    /// UT test cases for carrier failures.
    ///
    /// # Brief
    /// 1. Connects while the carrier pool cannot connect.
    /// 2. Checks the inner classification passes through untouched.
    #[tokio::test]
    async fn ut_ssl_inner_failure_passthrough() {
        let tcp = TestConnector::new();
        tcp.script(TestConnect::Fail(NetError::ConnectionRefused));
        let connector = ssl_connector(tcp, TestTlsProvider::new(), Duration::from_secs(5));
        let failure = connector
            .connect(ssl_params(SslConfig::default()))
            .await
            .unwrap_err();
        assert_eq!(failure.error, NetError::ConnectionRefused);
    }
}
