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

//! Tunable options for pools, connection establishment and sessions.

use core::time::Duration;

/// An optional timeout duration.
///
/// # Examples
///
/// ```
/// use ylong_spdy_client::Timeout;
///
/// let no_timeout = Timeout::none();
/// let timeout = Timeout::from_secs(30);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timeout(Option<Duration>);

impl Timeout {
    /// Creates a `Timeout` without timeout.
    pub fn none() -> Self {
        Self(None)
    }

    /// Creates a `Timeout` from the given number of seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(Some(Duration::from_secs(secs)))
    }

    pub(crate) fn inner(&self) -> Option<Duration> {
        self.0
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self::none()
    }
}

/// Options controlling the socket pools.
///
/// Every pool layer (TCP, SOCKS, tunnel, TLS) uses the same set of limits.
#[derive(Clone, Copy, Debug)]
pub struct PoolConfig {
    pub(crate) max_sockets_per_group: usize,
    pub(crate) max_sockets: usize,
    pub(crate) unused_idle_timeout: Duration,
    pub(crate) used_idle_timeout: Duration,
    pub(crate) cleanup_interval: Duration,
    pub(crate) connect_job_timeout: Duration,
    pub(crate) backup_job_delay: Duration,
    pub(crate) backup_jobs_enabled: bool,
}

impl PoolConfig {
    /// Sets the maximum number of sockets per group.
    pub fn max_sockets_per_group(mut self, max: usize) -> Self {
        self.max_sockets_per_group = max;
        self
    }

    /// Sets the maximum number of sockets across all groups of a pool.
    pub fn max_sockets(mut self, max: usize) -> Self {
        self.max_sockets = max;
        self
    }

    /// Sets how long a never-used idle socket may linger before cleanup.
    pub fn unused_idle_timeout(mut self, timeout: Duration) -> Self {
        self.unused_idle_timeout = timeout;
        self
    }

    /// Sets how long a previously used idle socket may linger before cleanup.
    pub fn used_idle_timeout(mut self, timeout: Duration) -> Self {
        self.used_idle_timeout = timeout;
        self
    }

    /// Sets the overall deadline for a single connect job.
    pub fn connect_job_timeout(mut self, timeout: Duration) -> Self {
        self.connect_job_timeout = timeout;
        self
    }

    /// Enables or disables the delayed backup connect job.
    pub fn backup_jobs_enabled(mut self, enabled: bool) -> Self {
        self.backup_jobs_enabled = enabled;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sockets_per_group: 6,
            max_sockets: 256,
            unused_idle_timeout: Duration::from_secs(10),
            used_idle_timeout: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(10),
            connect_job_timeout: Duration::from_secs(240),
            backup_job_delay: Duration::from_millis(250),
            backup_jobs_enabled: true,
        }
    }
}

/// Options controlling single connection establishment steps.
#[derive(Clone, Copy, Debug)]
pub struct ConnectConfig {
    pub(crate) tls_handshake_timeout: Duration,
}

impl ConnectConfig {
    /// Sets the budget for one TLS handshake over a fresh transport.
    pub fn tls_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.tls_handshake_timeout = timeout;
        self
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            tls_handshake_timeout: Duration::from_secs(30),
        }
    }
}

/// Options controlling a multiplexed session.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    pub(crate) read_buffer_size: usize,
    pub(crate) max_data_chunk: usize,
    pub(crate) max_concurrent_streams: usize,
    pub(crate) initial_window_size: i32,
    pub(crate) frame_channel_depth: usize,
}

impl SessionConfig {
    /// Caps how many streams may be concurrently open on one session before
    /// creations start queueing. A received `SETTINGS` value replaces it.
    pub fn max_concurrent_streams(mut self, max: usize) -> Self {
        self.max_concurrent_streams = max;
        self
    }

    /// Sets the initial per-stream flow control window in bytes.
    pub fn initial_window_size(mut self, size: i32) -> Self {
        self.initial_window_size = size;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        // Data frames are cut so that header plus payload fills two TCP
        // segments of a common 1430-byte MSS.
        const MSS: usize = 1430;

        Self {
            read_buffer_size: 8 * 1024,
            max_data_chunk: 2 * MSS - 8,
            max_concurrent_streams: 100,
            initial_window_size: 64 * 1024,
            frame_channel_depth: 10,
        }
    }
}

/// The complete set of client options.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientConfig {
    pub(crate) pool: PoolConfig,
    pub(crate) connect: ConnectConfig,
    pub(crate) session: SessionConfig,
}

impl ClientConfig {
    /// Creates a `ClientConfig` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the pool options.
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Replaces the connect options.
    pub fn connect(mut self, connect: ConnectConfig) -> Self {
        self.connect = connect;
        self
    }

    /// Replaces the session options.
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}
