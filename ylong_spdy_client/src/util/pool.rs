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

//! Grouped socket pool.
//!
//! Sockets are pooled per group, where a group is one connect target (for
//! example `example.com:80` or `ssl/socks5/proxy:1080/example.com:443`).
//! Within a group, idle sockets are reused newest first. When none is idle,
//! a connect job runs in its own task and delivers to the most urgent
//! waiting request. Groups are capped individually and the pool is capped as
//! a whole; requests above the caps queue in priority order until a slot
//! frees up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use ylong_spdy::frame::Priority;

use crate::async_impl::connector::{
    BoxedIo, ConnectFailure, ConnectParams, PoolConnector,
};
use crate::error::NetError;
use crate::runtime::{oneshot, sleep, spawn, timeout, AsyncRead, AsyncWrite, ReadBuf};
use crate::util::config::PoolConfig;

pub(crate) struct SocketPool {
    shared: Arc<PoolShared>,
}

impl Clone for SocketPool {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl SocketPool {
    pub(crate) fn new(connector: Arc<dyn PoolConnector>, config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                connector,
                config,
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    /// Hands out a socket for `group`, connecting with `params` when no idle
    /// socket is available. Queues when the group or pool is at capacity.
    pub(crate) async fn acquire(
        &self,
        group: &str,
        params: ConnectParams,
        priority: Priority,
    ) -> Result<PooledSocket, ConnectFailure> {
        let receiver = {
            let mut guard = self.shared.state.lock().unwrap();
            let state = &mut *guard;
            let entry = state.groups.entry(group.to_string()).or_default();

            // Newest idle socket first, dead ones are discarded on the way.
            let mut reused = None;
            while let Some(idle) = entry.idle.pop() {
                state.idle_count -= 1;
                if idle.io.is_open() {
                    reused = Some(idle.io);
                    break;
                }
                state.total -= 1;
            }
            if let Some(io) = reused {
                entry.active += 1;
                let generation = state.generation;
                return Ok(PooledSocket {
                    io: Some(io),
                    group: group.to_string(),
                    pool: self.clone(),
                    reused: true,
                    generation,
                });
            }

            let (tx, rx) = oneshot::channel();
            let position = entry
                .pending
                .iter()
                .position(|queued| priority < queued.priority)
                .unwrap_or(entry.pending.len());
            entry.pending.insert(
                position,
                PendingRequest {
                    priority,
                    params,
                    tx,
                },
            );
            PoolShared::maybe_start_job(&self.shared, state, group);
            rx
        };

        match receiver.await {
            Ok(done) => done.map(|delivered| PooledSocket {
                io: Some(delivered.io),
                group: group.to_string(),
                pool: self.clone(),
                reused: delivered.reused,
                generation: delivered.generation,
            }),
            Err(_) => Err(ConnectFailure::new(NetError::Aborted)),
        }
    }

    /// Drops every idle socket. Handed out sockets are unaffected and may
    /// still be returned to the pool.
    pub(crate) fn close_idle_sockets(&self) {
        let mut guard = self.shared.state.lock().unwrap();
        Self::drop_idle(&mut *guard);
    }

    /// Invalidates every pooled socket. Idle sockets are closed now, handed
    /// out sockets are discarded instead of idled when they come back.
    pub(crate) fn flush(&self) {
        let mut guard = self.shared.state.lock().unwrap();
        guard.generation += 1;
        Self::drop_idle(&mut *guard);
    }

    fn drop_idle(state: &mut PoolState) {
        let mut removed = 0;
        for entry in state.groups.values_mut() {
            removed += entry.idle.len();
            entry.idle.clear();
        }
        state.idle_count -= removed;
        state.total -= removed;
    }

    fn release(&self, group: &str, io: Option<BoxedIo>, generation: u64) {
        let shared = &self.shared;
        let mut guard = shared.state.lock().unwrap();
        let state = &mut *guard;
        let Some(entry) = state.groups.get_mut(group) else {
            return;
        };
        entry.active -= 1;
        match io {
            Some(io) if generation == state.generation && io.is_open() => {
                if let Some(io) = PoolShared::hand_to_pending(entry, io, true, generation) {
                    entry.idle.push(IdleSocket {
                        io,
                        since: Instant::now(),
                        used: true,
                    });
                    state.idle_count += 1;
                    PoolShared::ensure_cleanup_task(shared, state);
                }
            }
            _ => {
                // Taken, stale or closed: the pool stops counting it.
                state.total -= 1;
            }
        }
        PoolShared::promote_stalled_groups(shared, state);
    }

    #[cfg(test)]
    pub(crate) fn idle_sockets(&self, group: &str) -> usize {
        let guard = self.shared.state.lock().unwrap();
        guard.groups.get(group).map(|e| e.idle.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn total_sockets(&self) -> usize {
        self.shared.state.lock().unwrap().total
    }
}

struct PoolShared {
    connector: Arc<dyn PoolConnector>,
    config: PoolConfig,
    state: Mutex<PoolState>,
}

#[derive(Default)]
struct PoolState {
    groups: HashMap<String, Group>,
    // Handed out plus idle plus connecting, across all groups.
    total: usize,
    generation: u64,
    idle_count: usize,
    cleanup_running: bool,
}

#[derive(Default)]
struct Group {
    // Waiting requests, most urgent first, FIFO within a priority.
    pending: Vec<PendingRequest>,
    jobs: usize,
    active: usize,
    idle: Vec<IdleSocket>,
    backup_scheduled: bool,
}

impl Group {
    fn socket_count(&self) -> usize {
        self.active + self.jobs + self.idle.len()
    }
}

struct PendingRequest {
    priority: Priority,
    params: ConnectParams,
    tx: oneshot::Sender<Result<Delivered, ConnectFailure>>,
}

struct IdleSocket {
    io: BoxedIo,
    since: Instant,
    used: bool,
}

struct Delivered {
    io: BoxedIo,
    reused: bool,
    generation: u64,
}

impl PoolShared {
    // Starts a connect job for `group` when it has unserved demand and the
    // caps leave room. An idle socket elsewhere may be closed to make room
    // under the pool-wide cap.
    fn maybe_start_job(shared: &Arc<Self>, state: &mut PoolState, group: &str) {
        let config = shared.config;
        let (needs_job, group_full) = match state.groups.get(group) {
            Some(entry) => (
                entry.jobs < entry.pending.len(),
                entry.socket_count() >= config.max_sockets_per_group,
            ),
            None => return,
        };
        if !needs_job || group_full {
            return;
        }
        if state.total >= config.max_sockets && !Self::close_one_idle_socket(state) {
            return;
        }
        let generation = state.generation;
        let Some(entry) = state.groups.get_mut(group) else {
            return;
        };
        let Some(request) = entry.pending.first() else {
            return;
        };
        let params = request.params.clone();
        entry.jobs += 1;
        state.total += 1;
        Self::spawn_connect_job(shared, group, params, generation);
        if config.backup_jobs_enabled && !entry.backup_scheduled {
            entry.backup_scheduled = true;
            Self::spawn_backup_watchdog(shared, group);
        }
    }

    fn spawn_connect_job(shared: &Arc<Self>, group: &str, params: ConnectParams, generation: u64) {
        let shared = Arc::clone(shared);
        let group = group.to_string();
        spawn(async move {
            let budget = shared.config.connect_job_timeout;
            let result = match timeout(budget, shared.connector.connect(params)).await {
                Ok(done) => done,
                Err(_) => Err(ConnectFailure::new(NetError::TimedOut)),
            };
            Self::finish_job(&shared, &group, result, generation);
        });
    }

    // Runs once the first job of a group has been outstanding for the backup
    // delay. A stuck connect then no longer serializes the whole group.
    fn spawn_backup_watchdog(shared: &Arc<Self>, group: &str) {
        let shared = Arc::clone(shared);
        let group = group.to_string();
        spawn(async move {
            sleep(shared.config.backup_job_delay).await;
            let mut guard = shared.state.lock().unwrap();
            let state = &mut *guard;
            let generation = state.generation;
            let total = state.total;
            let Some(entry) = state.groups.get_mut(&group) else {
                return;
            };
            entry.backup_scheduled = false;
            if entry.pending.is_empty() || entry.jobs == 0 {
                return;
            }
            if entry.socket_count() >= shared.config.max_sockets_per_group
                || total >= shared.config.max_sockets
            {
                return;
            }
            let Some(request) = entry.pending.first() else {
                return;
            };
            let params = request.params.clone();
            entry.jobs += 1;
            state.total += 1;
            Self::spawn_connect_job(&shared, &group, params, generation);
        });
    }

    fn finish_job(
        shared: &Arc<Self>,
        group: &str,
        result: Result<BoxedIo, ConnectFailure>,
        job_generation: u64,
    ) {
        let mut guard = shared.state.lock().unwrap();
        let state = &mut *guard;
        let generation = state.generation;
        let Some(entry) = state.groups.get_mut(group) else {
            return;
        };
        entry.jobs -= 1;
        match result {
            Ok(io) if job_generation == generation => {
                if let Some(io) = Self::hand_to_pending(entry, io, false, job_generation) {
                    entry.idle.push(IdleSocket {
                        io,
                        since: Instant::now(),
                        used: false,
                    });
                    state.idle_count += 1;
                    Self::ensure_cleanup_task(shared, state);
                }
            }
            Ok(_) => {
                state.total -= 1;
            }
            Err(failure) => {
                state.total -= 1;
                while let Some(request) = entry.pending.first() {
                    if !request.tx.is_closed() {
                        break;
                    }
                    entry.pending.remove(0);
                }
                if !entry.pending.is_empty() {
                    let request = entry.pending.remove(0);
                    let _ = request.tx.send(Err(failure));
                }
            }
        }
        Self::promote_stalled_groups(shared, state);
    }

    // Offers `io` to the most urgent waiting request. Requests whose callers
    // went away are skipped; the socket comes back if nobody took it.
    fn hand_to_pending(
        entry: &mut Group,
        io: BoxedIo,
        reused: bool,
        generation: u64,
    ) -> Option<BoxedIo> {
        let mut io = Some(io);
        while !entry.pending.is_empty() {
            let Some(socket) = io.take() else {
                break;
            };
            let request = entry.pending.remove(0);
            match request.tx.send(Ok(Delivered {
                io: socket,
                reused,
                generation,
            })) {
                Ok(()) => {
                    entry.active += 1;
                    return None;
                }
                Err(returned) => {
                    if let Ok(delivered) = returned {
                        io = Some(delivered.io);
                    }
                }
            }
        }
        io
    }

    fn close_one_idle_socket(state: &mut PoolState) -> bool {
        let mut closed = false;
        for entry in state.groups.values_mut() {
            if !entry.idle.is_empty() {
                entry.idle.remove(0);
                closed = true;
                break;
            }
        }
        if closed {
            state.idle_count -= 1;
            state.total -= 1;
        }
        closed
    }

    // After capacity frees up, lets the group with the most urgent unserved
    // request start a job. Repeats until nothing more can start.
    fn promote_stalled_groups(shared: &Arc<Self>, state: &mut PoolState) {
        loop {
            let candidate = state
                .groups
                .iter()
                .filter(|(_, entry)| entry.pending.len() > entry.jobs)
                .filter(|(_, entry)| entry.socket_count() < shared.config.max_sockets_per_group)
                .min_by_key(|(_, entry)| {
                    entry
                        .pending
                        .first()
                        .map(|request| request.priority)
                        .unwrap_or(Priority::Lowest)
                })
                .map(|(name, _)| name.clone());
            let Some(name) = candidate else {
                return;
            };
            let before = state.total;
            Self::maybe_start_job(shared, state, &name);
            if state.total == before {
                return;
            }
        }
    }

    // The cleanup task exists only while idle sockets do. It prunes timed
    // out and dead idle sockets on an interval and exits once none is left.
    fn ensure_cleanup_task(shared: &Arc<Self>, state: &mut PoolState) {
        if state.cleanup_running || state.idle_count == 0 {
            return;
        }
        state.cleanup_running = true;
        let shared = Arc::clone(shared);
        spawn(async move {
            loop {
                sleep(shared.config.cleanup_interval).await;
                if !Self::cleanup_idle_sockets(&shared) {
                    return;
                }
            }
        });
    }

    fn cleanup_idle_sockets(shared: &Arc<Self>) -> bool {
        let config = shared.config;
        let mut guard = shared.state.lock().unwrap();
        let state = &mut *guard;
        let now = Instant::now();
        let mut removed = 0;
        for entry in state.groups.values_mut() {
            entry.idle.retain(|idle| {
                let limit = if idle.used {
                    config.used_idle_timeout
                } else {
                    config.unused_idle_timeout
                };
                let keep = now.duration_since(idle.since) < limit && idle.io.is_open();
                if !keep {
                    removed += 1;
                }
                keep
            });
        }
        state.idle_count -= removed;
        state.total -= removed;
        state.groups.retain(|_, entry| {
            entry.socket_count() + entry.pending.len() > 0 || entry.backup_scheduled
        });
        if state.idle_count == 0 {
            state.cleanup_running = false;
            false
        } else {
            true
        }
    }
}

/// A socket handed out by a [`SocketPool`].
///
/// Dropping the handle returns the socket to its group for reuse; taking the
/// transport out removes it from pool accounting for good.
pub(crate) struct PooledSocket {
    io: Option<BoxedIo>,
    group: String,
    pool: SocketPool,
    reused: bool,
    generation: u64,
}

impl PooledSocket {
    /// Whether the socket had been used before this hand-out.
    pub(crate) fn is_reused(&self) -> bool {
        self.reused
    }

    /// The application protocol negotiated on the transport, if any.
    pub(crate) fn negotiated_protocol(&self) -> Option<&str> {
        self.io.as_deref().and_then(|io| io.negotiated_protocol())
    }

    /// Removes the transport from the pool permanently, for promotion into
    /// a long lived session.
    pub(crate) fn into_io(mut self) -> Option<BoxedIo> {
        self.io.take()
    }
}

impl std::fmt::Debug for PooledSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSocket")
            .field("group", &self.group)
            .field("reused", &self.reused)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl Drop for PooledSocket {
    fn drop(&mut self) {
        let io = self.io.take();
        let group = std::mem::take(&mut self.group);
        self.pool.release(&group, io, self.generation);
    }
}

impl AsyncRead for PooledSocket {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.io.as_deref_mut() {
            Some(io) => std::pin::Pin::new(io).poll_read(cx, buf),
            None => std::task::Poll::Ready(Err(std::io::ErrorKind::NotConnected.into())),
        }
    }
}

impl AsyncWrite for PooledSocket {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        match self.io.as_deref_mut() {
            Some(io) => std::pin::Pin::new(io).poll_write(cx, buf),
            None => std::task::Poll::Ready(Err(std::io::ErrorKind::NotConnected.into())),
        }
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.io.as_deref_mut() {
            Some(io) => std::pin::Pin::new(io).poll_flush(cx),
            None => std::task::Poll::Ready(Err(std::io::ErrorKind::NotConnected.into())),
        }
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.io.as_deref_mut() {
            Some(io) => std::pin::Pin::new(io).poll_shutdown(cx),
            None => std::task::Poll::Ready(Err(std::io::ErrorKind::NotConnected.into())),
        }
    }
}
