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

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

/// A boxed dynamic error returned by resolvers.
pub type StdError = Box<dyn std::error::Error + Send + Sync>;

/// The future type [`Resolver::resolve`] returns.
pub type SocketFuture = Pin<Box<dyn Future<Output = Result<Addrs, StdError>> + Send>>;

/// The dns resolver trait.
///
/// Connectors resolve every `host:port` authority through this seam, so a
/// custom implementation can add caching or alternative transports.
pub trait Resolver: Send + Sync + 'static {
    /// Resolves `authority` (a `host:port` pair) to socket addresses.
    fn resolve(&self, authority: &str) -> SocketFuture;
}

/// Resolved socket addresses, iterated in preference order.
pub struct Addrs {
    iter: std::vec::IntoIter<SocketAddr>,
}

impl Addrs {
    /// Creates an `Addrs` from a list of addresses.
    pub fn new(addrs: Vec<SocketAddr>) -> Self {
        Self {
            iter: addrs.into_iter(),
        }
    }

    /// Whether no address was resolved.
    pub fn is_empty(&self) -> bool {
        self.iter.as_slice().is_empty()
    }
}

impl Iterator for Addrs {
    type Item = SocketAddr;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}
