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

//! Transport establishment.
//!
//! Each socket pool owns one [`PoolConnector`]. The connectors are layered:
//! SOCKS, tunnel and TLS connectors acquire their carrier transport from a
//! lower pool, run their handshake and hand the finished transport up.

pub(crate) mod socks;
pub(crate) mod ssl;
pub(crate) mod tcp;
pub(crate) mod tunnel;

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;

use ylong_spdy::frame::Priority;

use crate::error::NetError;
use crate::runtime::{AsyncRead, AsyncWrite};
use crate::util::proxy::{ProxyCredentials, ProxyServer};
use crate::util::tls::{SslConfig, SslInfo};

/// A pooled transport connection.
///
/// Beyond reading and writing, the pool asks a transport whether it is still
/// usable before reusing it, and the request machinery inspects the TLS
/// negotiation results after a handshake.
pub trait ConnIo: AsyncRead + AsyncWrite + Unpin + Send {
    /// Whether the transport is still believed usable.
    fn is_open(&self) -> bool;

    /// The application protocol negotiated during TLS, if any.
    fn negotiated_protocol(&self) -> Option<&str> {
        None
    }

    /// Certificate details when the transport is TLS protected.
    fn ssl_info(&self) -> Option<&SslInfo> {
        None
    }
}

impl fmt::Debug for dyn ConnIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnIo").finish_non_exhaustive()
    }
}

/// An owned dynamic transport.
pub type BoxedIo = Box<dyn ConnIo>;

// What a connect job needs to know, one variant per pool layer.
#[derive(Clone, Debug)]
pub(crate) enum ConnectParams {
    Tcp(TcpParams),
    Socks(SocksParams),
    Tunnel(TunnelParams),
    Ssl(SslParams),
}

impl ConnectParams {
    pub(crate) fn priority(&self) -> Priority {
        match self {
            Self::Tcp(params) => params.priority,
            Self::Socks(params) => params.priority,
            Self::Tunnel(params) => params.priority,
            Self::Ssl(params) => params.priority,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct TcpParams {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) priority: Priority,
}

#[derive(Clone, Debug)]
pub(crate) struct SocksParams {
    pub(crate) proxy: ProxyServer,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) priority: Priority,
}

#[derive(Clone, Debug)]
pub(crate) struct TunnelParams {
    pub(crate) proxy: ProxyServer,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) auth: Option<ProxyCredentials>,
    pub(crate) priority: Priority,
}

#[derive(Clone, Debug)]
pub(crate) struct SslParams {
    pub(crate) inner: Box<ConnectParams>,
    pub(crate) host: String,
    pub(crate) config: SslConfig,
    pub(crate) priority: Priority,
}

/// The HTTP response a proxy answered a tunnel request with, kept so that
/// callers can drive an authentication exchange.
#[derive(Clone, Debug)]
pub struct TunnelResponse {
    /// The response status code.
    pub status: u16,

    /// The response header fields in order of appearance.
    pub headers: Vec<(String, String)>,
}

impl TunnelResponse {
    /// Returns the first value of a header field, compared case
    /// insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

// A failed connect, classified plus whatever details the failing layer kept.
#[derive(Debug)]
pub(crate) struct ConnectFailure {
    pub(crate) error: NetError,
    pub(crate) ssl_info: Option<SslInfo>,
    pub(crate) tunnel_response: Option<TunnelResponse>,
}

impl ConnectFailure {
    pub(crate) fn new(error: NetError) -> Self {
        Self {
            error,
            ssl_info: None,
            tunnel_response: None,
        }
    }

    pub(crate) fn with_ssl_info(mut self, info: SslInfo) -> Self {
        self.ssl_info = Some(info);
        self
    }

    pub(crate) fn with_tunnel_response(mut self, response: TunnelResponse) -> Self {
        self.tunnel_response = Some(response);
        self
    }
}

impl From<io::Error> for ConnectFailure {
    fn from(err: io::Error) -> Self {
        Self::new(NetError::from_io_kind(err.kind()))
    }
}

// The pool group a connect belongs to. Sockets are only interchangeable
// when every connect layer matches, so proxies and TLS are part of the name.
pub(crate) fn group_name(params: &ConnectParams) -> String {
    match params {
        ConnectParams::Tcp(params) => format!("{}:{}", params.host, params.port),
        ConnectParams::Socks(params) => {
            let scheme = match params.proxy.scheme() {
                crate::util::proxy::ProxyScheme::Socks4 => "socks4",
                _ => "socks5",
            };
            format!(
                "{}/{}/{}:{}",
                scheme,
                params.proxy.authority(),
                params.host,
                params.port
            )
        }
        ConnectParams::Tunnel(params) => format!(
            "tunnel/{}/{}:{}",
            params.proxy.authority(),
            params.host,
            params.port
        ),
        ConnectParams::Ssl(params) => format!("ssl/{}", group_name(&params.inner)),
    }
}

/// The future type [`PoolConnector::connect`] returns.
pub(crate) type ConnectFuture =
    Pin<Box<dyn Future<Output = Result<BoxedIo, ConnectFailure>> + Send>>;

// The per-pool connect seam. Implementations clone their handles into the
// returned future so jobs can outlive the caller.
pub(crate) trait PoolConnector: Send + Sync {
    fn connect(&self, params: ConnectParams) -> ConnectFuture;
}

#[cfg(test)]
mod ut_connector {
    use std::io;

    use ylong_spdy::frame::Priority;

    use crate::async_impl::connector::{
        group_name, ConnectFailure, ConnectParams, SocksParams, SslParams, TcpParams,
        TunnelResponse,
    };
    use crate::error::NetError;
    use crate::util::proxy::{ProxyScheme, ProxyServer};
    use crate::util::tls::SslConfig;

    /// UT test cases for `ConnectParams::priority`.
    ///
    /// # Brief
    /// 1. Builds TCP params with a priority.
    /// 2. Checks the accessor on the enum.
    #[test]
    fn ut_connect_params_priority() {
        let params = ConnectParams::Tcp(TcpParams {
            host: String::from("example.com"),
            port: 80,
            priority: Priority::Low,
        });
        assert_eq!(params.priority(), Priority::Low);
    }

    /// UT test cases for `ConnectFailure` conversions.
    ///
    /// # Brief
    /// 1. Converts io errors into failures.
    /// 2. Checks the classified codes.
    #[test]
    fn ut_connect_failure_from_io() {
        let failure: ConnectFailure =
            io::Error::from(io::ErrorKind::ConnectionRefused).into();
        assert_eq!(failure.error, NetError::ConnectionRefused);
        assert!(failure.ssl_info.is_none());
        assert!(failure.tunnel_response.is_none());

        let failure: ConnectFailure = io::Error::from(io::ErrorKind::TimedOut).into();
        assert_eq!(failure.error, NetError::TimedOut);
    }

    /// UT test cases for `group_name`.
    ///
    /// # Brief
    /// 1. Names groups for plain, proxied and layered connects.
    /// 2. Checks every connect layer shows up in the name.
    #[test]
    fn ut_group_name_layers() {
        let tcp = ConnectParams::Tcp(TcpParams {
            host: String::from("example.com"),
            port: 80,
            priority: Priority::Medium,
        });
        assert_eq!(group_name(&tcp), "example.com:80");

        let socks = ConnectParams::Socks(SocksParams {
            proxy: ProxyServer::new(ProxyScheme::Socks5, "proxy", 1080),
            host: String::from("example.com"),
            port: 80,
            priority: Priority::Medium,
        });
        assert_eq!(group_name(&socks), "socks5/proxy:1080/example.com:80");

        let ssl = ConnectParams::Ssl(SslParams {
            inner: Box::new(ConnectParams::Tcp(TcpParams {
                host: String::from("example.com"),
                port: 443,
                priority: Priority::Medium,
            })),
            host: String::from("example.com"),
            config: SslConfig::default(),
            priority: Priority::Medium,
        });
        assert_eq!(group_name(&ssl), "ssl/example.com:443");
    }

    /// UT test cases for `TunnelResponse::header`.
    ///
    /// # Brief
    /// 1. Builds a response with mixed-case header names.
    /// 2. Checks case insensitive lookup.
    #[test]
    fn ut_tunnel_response_header() {
        let response = TunnelResponse {
            status: 407,
            headers: vec![
                (String::from("Proxy-Authenticate"), String::from("Basic realm=\"proxy\"")),
                (String::from("Connection"), String::from("keep-alive")),
            ],
        };
        assert_eq!(
            response.header("proxy-authenticate"),
            Some("Basic realm=\"proxy\"")
        );
        assert_eq!(response.header("content-length"), None);
    }
}
