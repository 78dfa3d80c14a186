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

//! Client utility module.
//!
//! Building blocks shared by the request machinery:
//!
//! - [`config`] holds the tunables for pools, connects and sessions.
//! - [`pool`] is the layered socket pool with grouped idle reuse.
//! - [`spdy`] drives multiplexed sessions over a framed connection.
//! - [`proxy`], [`tls`], [`alt_svc`] and [`settings`] keep the per-host
//!   state the request state machine consults.

pub(crate) mod address;
pub(crate) mod alt_svc;
pub(crate) mod base64;
pub(crate) mod config;
pub(crate) mod pool;
pub(crate) mod proxy;
pub(crate) mod settings;
pub(crate) mod spdy;
pub(crate) mod tls;

#[cfg(test)]
pub(crate) mod test_utils;
