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

//! Request destinations.

use std::fmt::{Display, Formatter};

/// The scheme a destination is reached with.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Scheme {
    /// Plain transport.
    Http,

    /// TLS protected transport.
    Https,
}

impl Scheme {
    /// The default port of this scheme.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// A destination the client connects to, before proxy resolution.
///
/// # Examples
///
/// ```
/// use ylong_spdy_client::async_impl::Endpoint;
/// use ylong_spdy_client::async_impl::Scheme;
///
/// let endpoint = Endpoint::new(Scheme::Https, "example.com", 443);
/// assert!(endpoint.is_secure());
/// assert_eq!(endpoint.authority(), "example.com:443");
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl Endpoint {
    /// Creates an `Endpoint` from its parts.
    pub fn new(scheme: Scheme, host: &str, port: u16) -> Self {
        Self {
            scheme,
            host: host.to_string(),
            port,
        }
    }

    /// The scheme of this destination.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// The host name of this destination.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port of this destination.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns `true` if this destination requires TLS.
    pub fn is_secure(&self) -> bool {
        self.scheme == Scheme::Https
    }

    /// The `host:port` form used for pool groups and per-host state.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub(crate) fn with_port(&self, port: u16) -> Self {
        Self {
            scheme: self.scheme,
            host: self.host.clone(),
            port,
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let scheme = match self.scheme {
            Scheme::Http => "http",
            Scheme::Https => "https",
        };
        write!(f, "{}://{}:{}", scheme, self.host, self.port)
    }
}
