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

//! Alternate protocol bookkeeping.
//!
//! Servers can advertise that a plain destination is also reachable as a
//! multiplexed session on another port. The map remembers those
//! advertisements per `host:port` and permanently marks an alternative as
//! broken after it fails, so it is attempted at most once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// What is known about the alternative of one destination.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum AlternateProtocol {
    // A multiplexed session is offered on this port.
    Upgrade { port: u16 },
    // The advertised alternative failed, do not try it again.
    Broken,
}

#[derive(Clone, Default)]
pub(crate) struct AlternateProtocolMap {
    inner: Arc<Mutex<HashMap<String, AlternateProtocol>>>,
}

impl AlternateProtocolMap {
    pub(crate) fn set(&self, authority: &str, port: u16) {
        let mut lock = self.inner.lock().unwrap();
        // A broken verdict outlives later advertisements.
        if let Some(AlternateProtocol::Broken) = lock.get(authority) {
            return;
        }
        lock.insert(authority.to_string(), AlternateProtocol::Upgrade { port });
    }

    pub(crate) fn mark_broken(&self, authority: &str) {
        self.inner
            .lock()
            .unwrap()
            .insert(authority.to_string(), AlternateProtocol::Broken);
    }

    pub(crate) fn get(&self, authority: &str) -> Option<AlternateProtocol> {
        self.inner.lock().unwrap().get(authority).copied()
    }
}
