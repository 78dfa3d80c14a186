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

//! Test doubles for the pool and request machinery.

use std::collections::VecDeque;
use std::future::pending;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use crate::async_impl::connector::{
    BoxedIo, ConnIo, ConnectFailure, ConnectFuture, ConnectParams, PoolConnector,
};
use crate::error::NetError;
use crate::runtime::{AsyncRead, AsyncWrite, ReadBuf};
use crate::util::tls::{
    CertStatus, SslConfig, SslInfo, TlsError, TlsHandshakeFuture, TlsProvider, TlsSession,
};

// The certificate every scripted handshake presents.
pub(crate) const TEST_CERT: &[u8] = b"test certificate";

// An in-memory transport that never produces data. Tests flip `open` to
// simulate the peer closing a socket while it sits idle in a pool.
pub(crate) struct TestIo {
    open: Arc<AtomicBool>,
}

impl TestIo {
    pub(crate) fn new() -> (Self, Arc<AtomicBool>) {
        let open = Arc::new(AtomicBool::new(true));
        (
            Self {
                open: Arc::clone(&open),
            },
            open,
        )
    }
}

impl AsyncRead for TestIo {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Pending
    }
}

impl AsyncWrite for TestIo {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl ConnIo for TestIo {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

// One scripted outcome for a connect call.
pub(crate) enum TestConnect {
    Ok,
    Fail(NetError),
    Hang,
}

// A connector whose outcomes are scripted per call. Unscripted calls
// succeed with a fresh `TestIo`.
pub(crate) struct TestConnector {
    script: Mutex<VecDeque<TestConnect>>,
    connects: AtomicUsize,
    handles: Mutex<Vec<Arc<AtomicBool>>>,
}

impl TestConnector {
    pub(crate) fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            connects: AtomicUsize::new(0),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn script(&self, step: TestConnect) {
        self.script.lock().unwrap().push_back(step);
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    // Marks every transport handed out so far as closed.
    pub(crate) fn close_all(&self) {
        for handle in self.handles.lock().unwrap().iter() {
            handle.store(false, Ordering::SeqCst);
        }
    }
}

impl PoolConnector for TestConnector {
    fn connect(&self, _params: ConnectParams) -> ConnectFuture {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TestConnect::Ok);
        match step {
            TestConnect::Ok => {
                let (io, handle) = TestIo::new();
                self.handles.lock().unwrap().push(handle);
                Box::pin(async move { Ok(Box::new(io) as BoxedIo) })
            }
            TestConnect::Fail(error) => {
                Box::pin(async move { Err(ConnectFailure::new(error)) })
            }
            TestConnect::Hang => Box::pin(pending()),
        }
    }
}

// One scripted outcome for a handshake call.
pub(crate) enum TestHandshake {
    Ok { protocol: Option<&'static str> },
    CertProblem(CertStatus),
    Fail(NetError),
    FailUnlessDowngraded { protocol: Option<&'static str> },
    Hang,
}

// A handshake provider whose outcomes are scripted per call. Unscripted
// calls succeed without negotiating a protocol. The transport passes
// through untouched. Clones share the script and the counter, so a test
// can keep a handle after handing the provider to a builder.
#[derive(Clone)]
pub(crate) struct TestTlsProvider {
    inner: Arc<TestTlsState>,
}

struct TestTlsState {
    script: Mutex<VecDeque<TestHandshake>>,
    handshakes: AtomicUsize,
}

impl TestTlsProvider {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(TestTlsState {
                script: Mutex::new(VecDeque::new()),
                handshakes: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn script(&self, step: TestHandshake) {
        self.inner.script.lock().unwrap().push_back(step);
    }

    pub(crate) fn handshake_count(&self) -> usize {
        self.inner.handshakes.load(Ordering::SeqCst)
    }
}

impl TlsProvider for TestTlsProvider {
    fn handshake(&self, io: BoxedIo, _host: &str, config: &SslConfig) -> TlsHandshakeFuture {
        self.inner.handshakes.fetch_add(1, Ordering::SeqCst);
        let step = self
            .inner
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TestHandshake::Ok { protocol: None });
        let tls1_enabled = config.tls1_enabled;
        let allowed = match &step {
            TestHandshake::CertProblem(status) => config.allows_bad_cert(&SslInfo {
                cert: TEST_CERT.to_vec(),
                cert_status: *status,
            }),
            _ => false,
        };
        Box::pin(async move {
            match step {
                TestHandshake::Ok { protocol } => Ok(TlsSession {
                    io,
                    negotiated_protocol: protocol.map(String::from),
                    info: SslInfo::default(),
                }),
                TestHandshake::CertProblem(status) => {
                    let info = SslInfo {
                        cert: TEST_CERT.to_vec(),
                        cert_status: status,
                    };
                    if allowed {
                        Ok(TlsSession {
                            io,
                            negotiated_protocol: None,
                            info,
                        })
                    } else {
                        Err(TlsError {
                            error: NetError::CertError(status),
                            info: Some(info),
                        })
                    }
                }
                TestHandshake::Fail(error) => Err(TlsError { error, info: None }),
                TestHandshake::FailUnlessDowngraded { protocol } => {
                    if tls1_enabled {
                        Err(TlsError {
                            error: NetError::SslProtocolError,
                            info: None,
                        })
                    } else {
                        Ok(TlsSession {
                            io,
                            negotiated_protocol: protocol.map(String::from),
                            info: SslInfo::default(),
                        })
                    }
                }
                TestHandshake::Hang => pending().await,
            }
        })
    }
}
