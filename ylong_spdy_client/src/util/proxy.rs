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

//! Proxy selection.
//!
//! A [`ProxyResolver`] maps a destination to an ordered [`ProxyList`]. The
//! request machinery walks the list entry by entry when a proxy turns out
//! to be unreachable.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::util::address::Endpoint;
use crate::util::base64;

/// The scheme used to talk to a proxy server.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ProxyScheme {
    /// No proxy, connect straight to the destination.
    Direct,

    /// HTTP proxy over a plain transport.
    Http,

    /// HTTP proxy reached over TLS.
    Https,

    /// SOCKS v4 proxy.
    Socks4,

    /// SOCKS v5 proxy.
    Socks5,
}

/// One proxy server choice.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ProxyServer {
    scheme: ProxyScheme,
    host: String,
    port: u16,
}

impl ProxyServer {
    /// Creates a proxy server entry.
    pub fn new(scheme: ProxyScheme, host: &str, port: u16) -> Self {
        Self {
            scheme,
            host: host.to_string(),
            port,
        }
    }

    /// Creates the direct, proxy-less entry.
    pub fn direct() -> Self {
        Self {
            scheme: ProxyScheme::Direct,
            host: String::new(),
            port: 0,
        }
    }

    /// The scheme of this proxy.
    pub fn scheme(&self) -> ProxyScheme {
        self.scheme
    }

    /// The proxy host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The proxy port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns `true` for the direct entry.
    pub fn is_direct(&self) -> bool {
        self.scheme == ProxyScheme::Direct
    }

    /// The `host:port` form of this proxy.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    // Stable identifier used in session keys and pool group names.
    pub(crate) fn id(&self) -> String {
        match self.scheme {
            ProxyScheme::Direct => String::from("direct://"),
            ProxyScheme::Http => format!("http://{}:{}", self.host, self.port),
            ProxyScheme::Https => format!("https://{}:{}", self.host, self.port),
            ProxyScheme::Socks4 => format!("socks4://{}:{}", self.host, self.port),
            ProxyScheme::Socks5 => format!("socks5://{}:{}", self.host, self.port),
        }
    }
}

impl Display for ProxyServer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id().as_str())
    }
}

/// Credentials sent to an HTTP proxy when establishing a tunnel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProxyCredentials {
    username: String,
    password: String,
}

impl ProxyCredentials {
    /// Creates a credential pair for basic authentication.
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub(crate) fn basic_header_value(&self) -> String {
        let pair = format!("{}:{}", self.username, self.password);
        format!("Basic {}", base64::encode_string(pair.as_bytes()))
    }
}

/// An ordered list of proxy choices for one destination.
///
/// The first entry is tried first. An empty list is treated as direct.
#[derive(Clone, Debug, Default)]
pub struct ProxyList {
    servers: Vec<ProxyServer>,
}

impl ProxyList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a list containing only the direct entry.
    pub fn direct() -> Self {
        Self {
            servers: vec![ProxyServer::direct()],
        }
    }

    /// Appends a proxy choice.
    pub fn push(&mut self, server: ProxyServer) {
        self.servers.push(server);
    }

    /// Returns `true` if the list holds no entries.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub(crate) fn servers(&self) -> &[ProxyServer] {
        &self.servers
    }
}

// The resolved list plus the cursor that `fallback` advances.
#[derive(Clone, Debug)]
pub(crate) struct ProxyInfo {
    servers: Vec<ProxyServer>,
    index: usize,
}

impl ProxyInfo {
    // TLS-reached proxies need a provider, everything else is always usable.
    pub(crate) fn from_list(list: ProxyList, tls_available: bool) -> Self {
        let mut servers = if list.is_empty() {
            vec![ProxyServer::direct()]
        } else {
            list.servers
        };
        servers.retain(|server| tls_available || server.scheme() != ProxyScheme::Https);
        Self { servers, index: 0 }
    }

    // `None` once every usable entry was filtered out.
    pub(crate) fn current(&self) -> Option<&ProxyServer> {
        self.servers.get(self.index)
    }

    // Advances to the next choice. Returns `false` when exhausted.
    pub(crate) fn fallback(&mut self) -> bool {
        if self.index + 1 < self.servers.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }
}

/// The future type [`ProxyResolver::resolve`] returns.
pub type ProxyFuture =
    Pin<Box<dyn Future<Output = Result<ProxyList, Box<dyn Error + Send + Sync>>> + Send>>;

/// Maps destinations to proxy lists.
///
/// Implementations may consult system settings or auto-config scripts. The
/// built-in [`FixedProxyResolver`] returns the same list for every
/// destination.
pub trait ProxyResolver: Send + Sync {
    /// Resolves the proxy list for `endpoint`.
    fn resolve(&self, endpoint: &Endpoint) -> ProxyFuture;
}

/// A resolver configured with one fixed proxy list.
#[derive(Clone, Default)]
pub struct FixedProxyResolver {
    list: ProxyList,
}

impl FixedProxyResolver {
    /// Creates a resolver that always answers with `list`.
    pub fn new(list: ProxyList) -> Self {
        Self { list }
    }
}

impl ProxyResolver for FixedProxyResolver {
    fn resolve(&self, _endpoint: &Endpoint) -> ProxyFuture {
        let list = self.list.clone();
        Box::pin(async move { Ok(list) })
    }
}
