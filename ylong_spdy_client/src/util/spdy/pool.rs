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

//! The pool of live multiplexed sessions, one per host and port pair.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::util::spdy::SpdySession;

/// Identifies the connection a session runs over. Requests to the same
/// authority share one session, whether they reach it directly or through
/// the same tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SessionKey {
    pub(crate) host: String,
    pub(crate) port: u16,
}

impl SessionKey {
    pub(crate) fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }
}

/// Shared map of reusable sessions.
///
/// The pool holds the strong reference that keeps a session's io coroutines
/// alive. A session the server told to go away is taken out of rotation but
/// kept until its streams finish; a dead one is dropped on sight.
#[derive(Clone)]
pub(crate) struct SpdySessionPool {
    inner: Arc<Mutex<PoolInner>>,
}

struct PoolInner {
    active: HashMap<SessionKey, SpdySession>,
    draining: Vec<SpdySession>,
}

impl SpdySessionPool {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolInner {
                active: HashMap::new(),
                draining: Vec::new(),
            })),
        }
    }

    /// Returns a session that can still accept streams for `key`, if the
    /// pool has one.
    pub(crate) fn get(&self, key: &SessionKey) -> Option<SpdySession> {
        let mut inner = self.inner.lock().unwrap();
        inner.draining.retain(|session| !session.is_closed());

        match inner.active.get(key) {
            Some(session) if !session.is_closed() && !session.is_going_away() => {
                return Some(session.clone());
            }
            Some(_) => {}
            None => return None,
        }
        // Closed or going away, either way out of rotation. A going-away
        // session stays referenced until its last stream finishes.
        if let Some(session) = inner.active.remove(key) {
            if !session.is_closed() {
                inner.draining.push(session);
            }
        }
        None
    }

    pub(crate) fn insert(&self, key: SessionKey, session: SpdySession) {
        let mut inner = self.inner.lock().unwrap();
        inner.draining.retain(|session| !session.is_closed());
        if let Some(old) = inner.active.insert(key, session) {
            if !old.is_closed() {
                inner.draining.push(old);
            }
        }
    }

    /// Closes every pooled session. Streams that are still running see a
    /// terminal event.
    pub(crate) fn close_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        for (_, session) in inner.active.drain() {
            session.close();
        }
        for session in inner.draining.drain(..) {
            session.close();
        }
    }
}

#[cfg(test)]
mod ut_session_pool {
    use std::time::Duration;

    use crate::util::config::SessionConfig;
    use crate::util::settings::SpdySettingsStorage;
    use crate::util::spdy::pool::{SessionKey, SpdySessionPool};
    use crate::util::spdy::session::{SessionDetail, SpdySession};

    fn session_over_duplex() -> SpdySession {
        let (io, peer) = tokio::io::duplex(64 * 1024);
        std::mem::forget(peer);
        SpdySession::with_io(
            io,
            SessionDetail {
                authority: String::from("example.com:443"),
                secure: false,
                cert_error: None,
            },
            SessionConfig::default(),
            SpdySettingsStorage::default(),
        )
    }

    async fn wait_closed(session: &SpdySession) {
        for _ in 0..100 {
            if session.is_closed() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session did not close");
    }

    /// UT test cases for `SpdySessionPool` reuse.
    ///
    /// # Brief
    /// 1. Inserts a live session under a key.
    /// 2. Checks that lookups under that key return a session and lookups
    ///    under another key return `None`.
    #[tokio::test]
    async fn ut_session_pool_reuses_live_session() {
        let pool = SpdySessionPool::new();
        let key = SessionKey::new("example.com", 443);
        pool.insert(key.clone(), session_over_duplex());

        assert!(pool.get(&key).is_some());
        assert!(pool.get(&key).is_some());
        assert!(pool.get(&SessionKey::new("example.com", 80)).is_none());
    }

    /// UT test cases for pruning closed sessions.
    ///
    /// # Brief
    /// 1. Inserts a session, closes it and waits for the shutdown to land.
    /// 2. Checks that the pool stops returning it.
    #[tokio::test]
    async fn ut_session_pool_drops_closed_session() {
        let pool = SpdySessionPool::new();
        let key = SessionKey::new("example.com", 443);
        let session = session_over_duplex();
        pool.insert(key.clone(), session.clone());

        session.close();
        wait_closed(&session).await;
        assert!(pool.get(&key).is_none());
        assert!(pool.get(&key).is_none());
    }

    /// UT test cases for replacing a pooled session.
    ///
    /// # Brief
    /// 1. Inserts a session, then inserts another one under the same key.
    /// 2. Checks that the key still resolves and that `close_all` empties
    ///    the pool.
    #[tokio::test]
    async fn ut_session_pool_replace_and_close_all() {
        let pool = SpdySessionPool::new();
        let key = SessionKey::new("example.com", 443);
        pool.insert(key.clone(), session_over_duplex());
        pool.insert(key.clone(), session_over_duplex());
        assert!(pool.get(&key).is_some());

        pool.close_all();
        assert!(pool.get(&key).is_none());
    }
}
