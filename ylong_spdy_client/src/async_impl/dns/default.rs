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

use std::io;
use std::net::ToSocketAddrs;

use crate::async_impl::dns::{Addrs, Resolver, SocketFuture};

/// Default dns resolver used by the client.
///
/// Resolution happens on a blocking worker through the system resolver.
///
/// # Examples
///
/// ```
/// use ylong_spdy_client::async_impl::DefaultDnsResolver;
///
/// let resolver = DefaultDnsResolver::new();
/// ```
#[derive(Clone, Default)]
pub struct DefaultDnsResolver;

impl DefaultDnsResolver {
    /// Creates a new `DefaultDnsResolver`.
    pub fn new() -> Self {
        Self
    }
}

impl Resolver for DefaultDnsResolver {
    fn resolve(&self, authority: &str) -> SocketFuture {
        let authority = authority.to_string();
        let handle = crate::runtime::spawn_blocking(move || {
            authority
                .to_socket_addrs()
                .map(|addrs| Addrs::new(addrs.collect()))
        });
        Box::pin(async move {
            match handle.await {
                Ok(Ok(addrs)) => Ok(addrs),
                Ok(Err(err)) => Err(err.into()),
                Err(join) => Err(io::Error::new(io::ErrorKind::Other, join).into()),
            }
        })
    }
}
