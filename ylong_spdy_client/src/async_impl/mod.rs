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

//! Asynchronous client interfaces.
//!
//! - [`NetworkContext`] owns the shared connection machinery.
//! - [`StreamRequest`] turns a destination into a ready stream.
//! - [`Resolver`] and [`connector`] are the pluggable seams for DNS and
//!   transports.

pub mod connector;
pub mod dns;

mod context;
mod request;

pub use connector::{BoxedIo, ConnIo, TunnelResponse};
pub use context::{NetworkContext, NetworkContextBuilder};
pub use dns::{Addrs, DefaultDnsResolver, Resolver, SocketFuture, StdError};
pub use request::{BasicStream, StreamKind, StreamRequest, StreamRequestEvent};

pub use crate::util::address::{Endpoint, Scheme};
