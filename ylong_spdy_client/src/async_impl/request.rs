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

//! The request state machine.
//!
//! A [`StreamRequest`] walks one logical request from a destination to a
//! usable stream: it resolves the proxy list, reuses a live session or
//! acquires a pooled transport, promotes connections that negotiated the
//! multiplexed protocol and retries over the fallbacks the connect layers
//! report. Recoverable problems that need a user decision, proxy
//! authentication, certificate errors and client certificate requests, pause
//! the machine instead of failing it.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use ylong_spdy::frame::Priority;
use ylong_spdy::headers::NvBlock;

use crate::async_impl::connector::{
    group_name, ConnectFailure, ConnectParams, SocksParams, SslParams, TcpParams, TunnelParams,
    TunnelResponse,
};
use crate::async_impl::context::NetworkContext;
use crate::error::{ErrorKind, NetError, SpdyClientError};
use crate::runtime::{AsyncRead, AsyncWrite, ReadBuf};
use crate::util::address::{Endpoint, Scheme};
use crate::util::alt_svc::AlternateProtocol;
use crate::util::pool::{PooledSocket, SocketPool};
use crate::util::proxy::{ProxyCredentials, ProxyInfo, ProxyScheme, ProxyServer};
use crate::util::spdy::{SessionDetail, SessionKey, SpdySession, SpdyStream};
use crate::util::tls::{is_tls_intolerance_error, AllowedBadCert, SslConfig, SslInfo};

// The token the TLS negotiation must produce for a connection to carry a
// multiplexed session.
const MULTIPLEXED_PROTOCOL: &str = "spdy/2";

/// What [`StreamRequest::proceed`] resolved to.
pub enum StreamRequestEvent {
    /// A stream is ready for use. The request is finished.
    Ready(StreamKind),

    /// The request failed for good. The request is finished.
    Failed(SpdyClientError),

    /// The server certificate failed validation. The request is paused;
    /// call [`StreamRequest::restart_ignoring_last_error`] to proceed past
    /// the problem or drop the request to give up.
    CertificateError {
        /// The classified certificate failure.
        error: NetError,
        /// The certificate and its verification verdict.
        info: SslInfo,
    },

    /// The proxy requires authentication for the tunnel. The request is
    /// paused; call [`StreamRequest::restart_tunnel_with_proxy_auth`] with
    /// credentials to retry.
    NeedsProxyAuth {
        /// The proxy that issued the challenge.
        proxy: ProxyServer,
        /// The proxy's response, holding the authentication headers.
        response: TunnelResponse,
    },

    /// The server asked for a client certificate. The request is paused;
    /// call [`StreamRequest::restart_with_certificate`] to answer.
    NeedsClientAuth,
}

/// The stream a finished request produced.
pub enum StreamKind {
    /// A dedicated pooled transport. The caller speaks its protocol
    /// directly on the connection.
    Basic(BasicStream),

    /// One stream of a multiplexed session.
    Multiplexed(SpdyStream),
}

// What the connect step produced, consumed by the stream step.
enum Established {
    Session(SpdySession),
    Socket(PooledSocket),
}

enum RequestState {
    ResolveProxy,
    ResolveProxyComplete,
    InitConnection,
    CreateStream,
    WaitingUserAction,
    Done,
}

/// One logical request being turned into a stream.
///
/// Created with [`NetworkContext::request`]. Driving it is a conversation:
/// [`proceed`] runs until the request finishes or needs a decision, the
/// caller answers with one of the `restart_` methods and calls [`proceed`]
/// again.
///
/// [`proceed`]: Self::proceed
///
/// # Examples
///
/// ```no_run
/// use ylong_spdy_client::async_impl::{
///     Endpoint, NetworkContext, Scheme, StreamKind, StreamRequestEvent,
/// };
/// use ylong_spdy_client::Priority;
///
/// async fn open() {
///     let context = NetworkContext::new();
///     let destination = Endpoint::new(Scheme::Http, "example.com", 80);
///     let mut request = context.request(destination, "/index.html", Priority::Medium);
///     match request.proceed().await {
///         StreamRequestEvent::Ready(StreamKind::Basic(stream)) => { /* use it */ }
///         StreamRequestEvent::Ready(StreamKind::Multiplexed(stream)) => { /* use it */ }
///         other => { /* failed or needs a decision */ }
///     }
/// }
/// ```
pub struct StreamRequest {
    context: NetworkContext,

    // What the caller asked for. `destination` never changes; `endpoint` is
    // where the connection actually goes once alternates are applied.
    destination: Endpoint,
    path: String,
    priority: Priority,
    headers: Option<NvBlock>,
    has_body: bool,
    ssl_config: SslConfig,

    state: RequestState,
    proxies: Option<ProxyInfo>,
    endpoint: Endpoint,

    // Alternate protocol bookkeeping. The upgrade is applied once per
    // request; when it fails the request falls back to `destination` and
    // the advertisement is marked broken.
    alternate: bool,
    alternate_decided: bool,

    // TLS retry bookkeeping for the attempt in flight.
    ssl_fallback_active: bool,
    tls_authority: Option<String>,

    pending_auth: Option<ProxyCredentials>,
    last_cert_error: Option<SslInfo>,
    connection: Option<Established>,
}

impl StreamRequest {
    pub(crate) fn new(
        context: NetworkContext,
        destination: Endpoint,
        path: &str,
        priority: Priority,
    ) -> Self {
        let endpoint = destination.clone();
        Self {
            context,
            destination,
            path: path.to_string(),
            priority,
            headers: None,
            has_body: false,
            ssl_config: SslConfig::default(),
            state: RequestState::ResolveProxy,
            proxies: None,
            endpoint,
            alternate: false,
            alternate_decided: false,
            ssl_fallback_active: false,
            tls_authority: None,
            pending_auth: None,
            last_cert_error: None,
            connection: None,
        }
    }

    /// Replaces the synthesized request header block sent on a multiplexed
    /// stream.
    pub fn headers(mut self, headers: NvBlock) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Marks the request as carrying a body. A multiplexed stream is then
    /// opened with its local half still writable.
    pub fn has_body(mut self, has_body: bool) -> Self {
        self.has_body = has_body;
        self
    }

    /// Replaces the TLS options used for this request's handshakes.
    pub fn ssl_config(mut self, config: SslConfig) -> Self {
        self.ssl_config = config;
        self
    }

    /// Drives the request until it finishes or needs a decision.
    ///
    /// Terminal events leave the request done; calling `proceed` again
    /// after one reports a failure.
    pub async fn proceed(&mut self) -> StreamRequestEvent {
        loop {
            let step = match self.state {
                RequestState::ResolveProxy => self.resolve_proxy().await,
                RequestState::ResolveProxyComplete => self.resolve_proxy_complete(),
                RequestState::InitConnection => self.init_connection().await,
                RequestState::CreateStream => self.create_stream().await,
                RequestState::WaitingUserAction | RequestState::Done => {
                    Some(failed_connect(NetError::Aborted))
                }
            };
            if let Some(event) = step {
                return self.deliver(event);
            }
        }
    }

    /// Supplies credentials after [`StreamRequestEvent::NeedsProxyAuth`].
    /// The next [`proceed`](Self::proceed) retries the tunnel with a
    /// `Proxy-Authorization` header.
    pub fn restart_tunnel_with_proxy_auth(&mut self, credentials: ProxyCredentials) {
        if !matches!(self.state, RequestState::WaitingUserAction) {
            return;
        }
        self.pending_auth = Some(credentials);
        self.state = RequestState::InitConnection;
    }

    /// Accepts the certificate reported by the last
    /// [`StreamRequestEvent::CertificateError`]. The next
    /// [`proceed`](Self::proceed) retries with that certificate allowed.
    pub fn restart_ignoring_last_error(&mut self) {
        if !matches!(self.state, RequestState::WaitingUserAction) {
            return;
        }
        if let Some(info) = self.last_cert_error.take() {
            self.ssl_config.allowed_bad_certs.push(AllowedBadCert {
                cert: info.cert,
                cert_status: info.cert_status,
            });
        }
        self.state = RequestState::InitConnection;
    }

    /// Answers [`StreamRequestEvent::NeedsClientAuth`]. `None` continues
    /// the handshake without presenting a certificate.
    pub fn restart_with_certificate(&mut self, cert: Option<Vec<u8>>) {
        if !matches!(self.state, RequestState::WaitingUserAction) {
            return;
        }
        self.ssl_config.client_cert = cert;
        self.ssl_config.send_client_cert = true;
        self.state = RequestState::InitConnection;
    }

    fn deliver(&mut self, event: StreamRequestEvent) -> StreamRequestEvent {
        self.state = match event {
            StreamRequestEvent::Ready(_) | StreamRequestEvent::Failed(_) => RequestState::Done,
            _ => RequestState::WaitingUserAction,
        };
        event
    }

    async fn resolve_proxy(&mut self) -> Option<StreamRequestEvent> {
        let future = self.context.inner.proxy_resolver.resolve(&self.destination);
        let list = match future.await {
            Ok(list) => list,
            Err(_) => return Some(failed_connect(NetError::ProxyConnectionFailed)),
        };
        let info = ProxyInfo::from_list(list, self.context.inner.tls.is_some());
        if info.current().is_none() {
            return Some(failed_connect(NetError::NoSupportedProxies));
        }
        self.proxies = Some(info);
        self.state = RequestState::ResolveProxyComplete;
        None
    }

    // Applies the alternate protocol advertisement once, then routes the
    // request to a live session or to the connect step.
    fn resolve_proxy_complete(&mut self) -> Option<StreamRequestEvent> {
        if !self.alternate_decided {
            self.alternate_decided = true;
            self.endpoint = self.destination.clone();
            if !self.destination.is_secure() && self.context.inner.tls.is_some() {
                if let Some(AlternateProtocol::Upgrade { port }) = self
                    .context
                    .inner
                    .alternates
                    .get(&self.destination.authority())
                {
                    self.endpoint = Endpoint::new(Scheme::Https, self.destination.host(), port);
                    self.alternate = true;
                }
            }
        }
        if let Some(session) = self.context.inner.sessions.get(&self.session_key()) {
            self.connection = Some(Established::Session(session));
            self.state = RequestState::CreateStream;
        } else {
            self.state = RequestState::InitConnection;
        }
        None
    }

    async fn init_connection(&mut self) -> Option<StreamRequestEvent> {
        let (params, pool) = match self.connect_params() {
            Ok(pair) => pair,
            Err(error) => return Some(failed_connect(error)),
        };
        let group = group_name(&params);
        match pool.acquire(&group, params, self.priority).await {
            Ok(socket) => self.connection_established(socket),
            Err(failure) => self.connection_failed(failure),
        }
    }

    // Builds the connect job for the current endpoint and proxy choice and
    // picks the pool it runs in.
    fn connect_params(&mut self) -> Result<(ConnectParams, SocketPool), NetError> {
        self.ssl_fallback_active = false;
        self.tls_authority = None;
        let proxy = match self.current_proxy() {
            Some(proxy) => proxy.clone(),
            None => return Err(NetError::NoSupportedProxies),
        };
        let host = self.endpoint.host().to_string();
        let port = self.endpoint.port();
        let authority = self.endpoint.authority();
        let secure = self.endpoint.is_secure();
        let priority = self.priority;
        let inner = Arc::clone(&self.context.inner);

        let pair = match proxy.scheme() {
            ProxyScheme::Direct => {
                let tcp = ConnectParams::Tcp(TcpParams {
                    host: host.clone(),
                    port,
                    priority,
                });
                if secure {
                    let config = self.ssl_config_for(&authority);
                    (
                        ConnectParams::Ssl(SslParams {
                            inner: Box::new(tcp),
                            host,
                            config,
                            priority,
                        }),
                        inner.ssl_pool.clone(),
                    )
                } else {
                    (tcp, inner.tcp_pool.clone())
                }
            }
            ProxyScheme::Socks4 | ProxyScheme::Socks5 => {
                let socks = ConnectParams::Socks(SocksParams {
                    proxy,
                    host: host.clone(),
                    port,
                    priority,
                });
                if secure {
                    let config = self.ssl_config_for(&authority);
                    (
                        ConnectParams::Ssl(SslParams {
                            inner: Box::new(socks),
                            host,
                            config,
                            priority,
                        }),
                        inner.ssl_pool.clone(),
                    )
                } else {
                    (socks, inner.socks_pool.clone())
                }
            }
            ProxyScheme::Http | ProxyScheme::Https => {
                if secure {
                    let tunnel = ConnectParams::Tunnel(TunnelParams {
                        proxy,
                        host: host.clone(),
                        port,
                        auth: self.pending_auth.clone(),
                        priority,
                    });
                    let config = self.ssl_config_for(&authority);
                    (
                        ConnectParams::Ssl(SslParams {
                            inner: Box::new(tunnel),
                            host,
                            config,
                            priority,
                        }),
                        inner.ssl_pool.clone(),
                    )
                } else if proxy.scheme() == ProxyScheme::Https {
                    // A plain request through a TLS proxy. The TLS leg
                    // terminates at the proxy and the request multiplexes
                    // on the proxy connection.
                    let tcp = ConnectParams::Tcp(TcpParams {
                        host: proxy.host().to_string(),
                        port: proxy.port(),
                        priority,
                    });
                    let config = self.ssl_config_for(&proxy.authority());
                    (
                        ConnectParams::Ssl(SslParams {
                            inner: Box::new(tcp),
                            host: proxy.host().to_string(),
                            config,
                            priority,
                        }),
                        inner.ssl_pool.clone(),
                    )
                } else {
                    (
                        ConnectParams::Tcp(TcpParams {
                            host: proxy.host().to_string(),
                            port: proxy.port(),
                            priority,
                        }),
                        inner.tcp_pool.clone(),
                    )
                }
            }
        };
        Ok(pair)
    }

    // Records where the TLS leg terminates and picks the handshake config,
    // downgrading when the host is already known to be intolerant.
    fn ssl_config_for(&mut self, authority: &str) -> SslConfig {
        self.tls_authority = Some(authority.to_string());
        if self.context.inner.intolerant.contains(authority) {
            self.ssl_fallback_active = true;
            self.ssl_config.intolerant_fallback()
        } else {
            self.ssl_config.clone()
        }
    }

    fn connection_established(&mut self, socket: PooledSocket) -> Option<StreamRequestEvent> {
        if socket.negotiated_protocol() == Some(MULTIPLEXED_PROTOCOL) {
            let io = match socket.into_io() {
                Some(io) => io,
                None => return Some(failed_connect(NetError::ConnectionFailed)),
            };
            // An ignored certificate problem travels onto the session,
            // where it blocks secure requests but not plain ones.
            let cert_error = io
                .ssl_info()
                .filter(|info| info.cert_status.is_error())
                .map(|info| info.cert_status);
            let key = self.session_key();
            let detail = SessionDetail {
                authority: format!("{}:{}", key.host, key.port),
                secure: true,
                cert_error,
            };
            let session = SpdySession::with_io(
                io,
                detail,
                self.context.inner.config.session,
                self.context.inner.settings.clone(),
            );
            self.context.inner.sessions.insert(key, session.clone());
            self.connection = Some(Established::Session(session));
            self.state = RequestState::CreateStream;
            None
        } else if self.alternate {
            // The advertised port connected but did not negotiate the
            // protocol, so the advertisement is useless.
            self.alternate_broken()
        } else {
            self.connection = Some(Established::Socket(socket));
            self.state = RequestState::CreateStream;
            None
        }
    }

    fn alternate_broken(&mut self) -> Option<StreamRequestEvent> {
        self.context
            .inner
            .alternates
            .mark_broken(&self.destination.authority());
        self.alternate = false;
        self.endpoint = self.destination.clone();
        self.state = RequestState::ResolveProxyComplete;
        None
    }

    fn connection_failed(&mut self, failure: ConnectFailure) -> Option<StreamRequestEvent> {
        let error = failure.error;
        if error == NetError::ProxyAuthRequested {
            let proxy = match self.current_proxy() {
                Some(proxy) => proxy.clone(),
                None => return Some(failed_connect(error)),
            };
            let response = failure.tunnel_response.unwrap_or(TunnelResponse {
                status: 407,
                headers: Vec::new(),
            });
            return Some(StreamRequestEvent::NeedsProxyAuth { proxy, response });
        }
        if error == NetError::SslClientAuthCertNeeded {
            return Some(StreamRequestEvent::NeedsClientAuth);
        }
        if let NetError::CertError(_) = error {
            let info = failure.ssl_info.unwrap_or_default();
            if self.alternate && !self.destination.is_secure() {
                // The caller asked for a plain request and the TLS leg only
                // exists because of the upgrade. Accept the certificate and
                // let the session record the problem instead of asking.
                if !self.ssl_config.allows_bad_cert(&info) {
                    self.ssl_config.allowed_bad_certs.push(AllowedBadCert {
                        cert: info.cert,
                        cert_status: info.cert_status,
                    });
                    return None;
                }
                return Some(failed_connect(error));
            }
            self.last_cert_error = Some(info.clone());
            return Some(StreamRequestEvent::CertificateError { error, info });
        }
        if is_tls_intolerance_error(error) && !self.ssl_fallback_active {
            if let Some(authority) = self.tls_authority.take() {
                self.context.inner.intolerant.mark(&authority);
                return None;
            }
        }
        if is_transport_error(error) {
            if self.alternate {
                return self.alternate_broken();
            }
            if let Some(info) = self.proxies.as_mut() {
                if info.fallback() {
                    // Credentials were for the proxy that just failed.
                    self.pending_auth = None;
                    self.state = RequestState::ResolveProxyComplete;
                    return None;
                }
            }
        }
        Some(failed_connect(error))
    }

    async fn create_stream(&mut self) -> Option<StreamRequestEvent> {
        match self.connection.take() {
            Some(Established::Session(session)) => {
                match session.claim_pushed(&self.destination, &self.path).await {
                    Ok(Some(stream)) => {
                        return Some(StreamRequestEvent::Ready(StreamKind::Multiplexed(stream)));
                    }
                    Ok(None) => {}
                    Err(error) => return Some(StreamRequestEvent::Failed(error)),
                }
                let headers = self.request_headers();
                match session
                    .create_stream(&self.destination, headers, self.priority, !self.has_body)
                    .await
                {
                    Ok(stream) => Some(StreamRequestEvent::Ready(StreamKind::Multiplexed(stream))),
                    Err(error) => Some(StreamRequestEvent::Failed(error)),
                }
            }
            Some(Established::Socket(socket)) => Some(StreamRequestEvent::Ready(
                StreamKind::Basic(BasicStream { socket }),
            )),
            None => Some(failed_connect(NetError::ConnectionFailed)),
        }
    }

    fn request_headers(&self) -> NvBlock {
        if let Some(headers) = self.headers.clone() {
            return headers;
        }
        let mut block = NvBlock::new();
        block.insert("method", "GET");
        block.insert("path", self.path.as_str());
        block.insert("version", "HTTP/1.1");
        block.insert("host", &self.destination.authority());
        let scheme = if self.destination.is_secure() {
            "https"
        } else {
            "http"
        };
        block.insert("scheme", scheme);
        block
    }

    // Plain requests riding a TLS proxy multiplex on the proxy connection,
    // so their session is keyed by the proxy instead of the endpoint.
    fn session_key(&self) -> SessionKey {
        if let Some(proxy) = self.current_proxy() {
            if proxy.scheme() == ProxyScheme::Https && !self.endpoint.is_secure() {
                return SessionKey::new(proxy.host(), proxy.port());
            }
        }
        SessionKey::new(self.endpoint.host(), self.endpoint.port())
    }

    fn current_proxy(&self) -> Option<&ProxyServer> {
        self.proxies.as_ref().and_then(|info| info.current())
    }
}

/// A dedicated pooled transport handed out by a finished request.
///
/// The caller reads and writes its protocol directly. Dropping the stream
/// returns the transport to its pool; it is reused for later requests while
/// it stays open.
pub struct BasicStream {
    socket: PooledSocket,
}

impl BasicStream {
    /// Whether the transport already served an earlier request.
    pub fn is_reused(&self) -> bool {
        self.socket.is_reused()
    }

    /// The application protocol negotiated during TLS, if any.
    pub fn negotiated_protocol(&self) -> Option<&str> {
        self.socket.negotiated_protocol()
    }
}

impl AsyncRead for BasicStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.socket).poll_read(cx, buf)
    }
}

impl AsyncWrite for BasicStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.socket).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.socket).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.socket).poll_shutdown(cx)
    }
}

fn failed_connect(error: NetError) -> StreamRequestEvent {
    StreamRequestEvent::Failed(SpdyClientError::from_net_error(ErrorKind::Connect, error))
}

// Failures that condemn the route rather than the request, eligible for
// proxy fallback.
fn is_transport_error(error: NetError) -> bool {
    matches!(
        error,
        NetError::ProxyConnectionFailed
            | NetError::NameNotResolved
            | NetError::InternetDisconnected
            | NetError::AddressUnreachable
            | NetError::ConnectionClosed
            | NetError::ConnectionReset
            | NetError::ConnectionRefused
            | NetError::ConnectionAborted
            | NetError::TimedOut
            | NetError::TunnelConnectionFailed
            | NetError::SocksConnectionFailed
    )
}
