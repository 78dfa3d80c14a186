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

use std::sync::Arc;

use ylong_spdy::frame::Priority;

use crate::async_impl::connector::socks::SocksConnector;
use crate::async_impl::connector::ssl::SslConnector;
use crate::async_impl::connector::tcp::TcpConnector;
use crate::async_impl::connector::tunnel::TunnelConnector;
use crate::async_impl::dns::{DefaultDnsResolver, Resolver};
use crate::async_impl::request::StreamRequest;
use crate::util::address::Endpoint;
use crate::util::alt_svc::AlternateProtocolMap;
use crate::util::config::{ClientConfig, ConnectConfig, PoolConfig, SessionConfig};
use crate::util::pool::SocketPool;
use crate::util::proxy::{FixedProxyResolver, ProxyResolver};
use crate::util::settings::SpdySettingsStorage;
use crate::util::spdy::SpdySessionPool;
use crate::util::tls::{TlsIntolerantHosts, TlsProvider};

/// The connection machinery shared between requests.
///
/// A context owns the four layered socket pools, the pool of live
/// multiplexed sessions and the per-host caches the request state machine
/// consults: persisted settings, alternate-protocol advertisements and
/// TLS-intolerant hosts. Cloning the context shares all of them.
///
/// # Examples
///
/// ```
/// use ylong_spdy_client::async_impl::NetworkContext;
///
/// let context = NetworkContext::new();
/// ```
#[derive(Clone)]
pub struct NetworkContext {
    pub(crate) inner: Arc<ContextInner>,
}

pub(crate) struct ContextInner {
    pub(crate) config: ClientConfig,
    pub(crate) resolver: Arc<dyn Resolver>,
    pub(crate) proxy_resolver: Arc<dyn ProxyResolver>,
    pub(crate) tls: Option<Arc<dyn TlsProvider>>,
    pub(crate) tcp_pool: SocketPool,
    pub(crate) socks_pool: SocketPool,
    pub(crate) tunnel_pool: SocketPool,
    pub(crate) ssl_pool: SocketPool,
    pub(crate) sessions: SpdySessionPool,
    pub(crate) settings: SpdySettingsStorage,
    pub(crate) alternates: AlternateProtocolMap,
    pub(crate) intolerant: TlsIntolerantHosts,
}

impl NetworkContext {
    /// Creates a context with default options, no proxies and no TLS
    /// provider.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a [`NetworkContextBuilder`].
    ///
    /// # Examples
    ///
    /// ```
    /// use ylong_spdy_client::async_impl::NetworkContext;
    ///
    /// let builder = NetworkContext::builder();
    /// ```
    pub fn builder() -> NetworkContextBuilder {
        NetworkContextBuilder::new()
    }

    /// Starts a request for a stream towards `destination`.
    ///
    /// The returned [`StreamRequest`] resolves proxies, reuses or
    /// establishes a connection and yields a stream or a negotiation event.
    pub fn request(&self, destination: Endpoint, path: &str, priority: Priority) -> StreamRequest {
        StreamRequest::new(self.clone(), destination, path, priority)
    }

    /// Drops every idle pooled socket. Sockets in use and live sessions are
    /// unaffected.
    pub fn close_idle_sockets(&self) {
        self.inner.tcp_pool.close_idle_sockets();
        self.inner.socks_pool.close_idle_sockets();
        self.inner.tunnel_pool.close_idle_sockets();
        self.inner.ssl_pool.close_idle_sockets();
    }

    /// Tears down every connection the context holds: pooled sockets are
    /// invalidated and every live session is closed.
    pub fn close_all(&self) {
        self.inner.tcp_pool.flush();
        self.inner.socks_pool.flush();
        self.inner.tunnel_pool.flush();
        self.inner.ssl_pool.flush();
        self.inner.sessions.close_all();
    }
}

impl Default for NetworkContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A builder which assembles a [`NetworkContext`].
///
/// # Examples
///
/// ```
/// use ylong_spdy_client::async_impl::NetworkContextBuilder;
///
/// let context = NetworkContextBuilder::new().build();
/// ```
pub struct NetworkContextBuilder {
    config: ClientConfig,
    resolver: Arc<dyn Resolver>,
    proxy_resolver: Arc<dyn ProxyResolver>,
    tls: Option<Arc<dyn TlsProvider>>,
}

impl NetworkContextBuilder {
    /// Creates a new, default `NetworkContextBuilder`.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            resolver: Arc::new(DefaultDnsResolver::default()),
            proxy_resolver: Arc::new(FixedProxyResolver::default()),
            tls: None,
        }
    }

    /// Replaces the socket pool options.
    ///
    /// # Examples
    ///
    /// ```
    /// use ylong_spdy_client::async_impl::NetworkContextBuilder;
    /// use ylong_spdy_client::PoolConfig;
    ///
    /// let builder = NetworkContextBuilder::new()
    ///     .pool(PoolConfig::default().max_sockets_per_group(8));
    /// ```
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.config = self.config.pool(pool);
        self
    }

    /// Replaces the connection establishment options.
    pub fn connect(mut self, connect: ConnectConfig) -> Self {
        self.config = self.config.connect(connect);
        self
    }

    /// Replaces the session options.
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.config = self.config.session(session);
        self
    }

    /// Replaces the DNS resolver.
    pub fn resolver<R: Resolver>(mut self, resolver: R) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Replaces the proxy resolver.
    pub fn proxy_resolver<P: ProxyResolver + 'static>(mut self, resolver: P) -> Self {
        self.proxy_resolver = Arc::new(resolver);
        self
    }

    /// Installs the TLS provider.
    ///
    /// Without one, secure destinations and HTTPS proxies are not reachable
    /// and resolve-time filtering removes them from proxy lists.
    pub fn tls_provider<T: TlsProvider + 'static>(mut self, provider: T) -> Self {
        self.tls = Some(Arc::new(provider));
        self
    }

    /// Constructs a `NetworkContext` based on the given settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use ylong_spdy_client::async_impl::NetworkContextBuilder;
    ///
    /// let context = NetworkContextBuilder::new().build();
    /// ```
    pub fn build(self) -> NetworkContext {
        let pool_config = self.config.pool;

        let tcp_pool = SocketPool::new(
            Arc::new(TcpConnector::new(Arc::clone(&self.resolver))),
            pool_config,
        );
        let socks_pool = SocketPool::new(
            Arc::new(SocksConnector::new(
                tcp_pool.clone(),
                Arc::clone(&self.resolver),
            )),
            pool_config,
        );
        let tunnel_pool = SocketPool::new(
            Arc::new(TunnelConnector::new(tcp_pool.clone(), self.tls.clone())),
            pool_config,
        );
        let ssl_pool = SocketPool::new(
            Arc::new(SslConnector::new(
                tcp_pool.clone(),
                socks_pool.clone(),
                tunnel_pool.clone(),
                self.tls.clone(),
                self.config.connect.tls_handshake_timeout,
            )),
            pool_config,
        );

        NetworkContext {
            inner: Arc::new(ContextInner {
                config: self.config,
                resolver: self.resolver,
                proxy_resolver: self.proxy_resolver,
                tls: self.tls,
                tcp_pool,
                socks_pool,
                tunnel_pool,
                ssl_pool,
                sessions: SpdySessionPool::new(),
                settings: SpdySettingsStorage::default(),
                alternates: AlternateProtocolMap::default(),
                intolerant: TlsIntolerantHosts::default(),
            }),
        }
    }
}

impl Default for NetworkContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
