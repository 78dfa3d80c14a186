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

mod common;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use ylong_spdy_client::async_impl::{Endpoint, Scheme, StreamKind, StreamRequestEvent};
use ylong_spdy_client::{ErrorKind, NetError, Priority, ResetStatus};

use crate::common::{multiplexed_context, ok_headers, SpdyServer};

/// SDV test cases for GOAWAY handling.
///
/// # Brief
/// 1. The server replies to the first request, sends GOAWAY accepting it,
///    then finishes the stream's body.
/// 2. The client drains the first stream, proving the GOAWAY did not kill
///    an accepted in-flight stream.
/// 3. A second request opens a fresh connection instead of reusing the
///    going-away session.
#[test]
fn sdv_spdy_goaway_starts_new_connection() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("build runtime failed");

    rt.block_on(async move {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
        let port = listener.local_addr().expect("local addr failed").port();

        let server = tokio::spawn(async move {
            let mut server = SpdyServer::accept(&listener).await;
            let (id, _, headers) = server.recv_syn_stream().await;
            assert_eq!(headers.get("path"), Some("/first"));

            server.send_reply(id, ok_headers(), false).await;
            server.send_goaway(id).await;
            // Frames are handled in order, so the client seeing this body
            // chunk proves the GOAWAY has already been processed.
            server.send_data(id, b"late", true).await;

            let mut server = SpdyServer::accept(&listener).await;
            let (id, _, headers) = server.recv_syn_stream().await;
            assert_eq!(id, 1);
            assert_eq!(headers.get("path"), Some("/second"));
            server.send_reply(id, ok_headers(), false).await;
            server.send_data(id, b"fresh", true).await;
        });

        let context = multiplexed_context();
        let destination = Endpoint::new(Scheme::Https, "127.0.0.1", port);

        let mut request = context.request(destination.clone(), "/first", Priority::Medium);
        let mut first = match request.proceed().await {
            StreamRequestEvent::Ready(StreamKind::Multiplexed(stream)) => stream,
            _ => panic!("expected a multiplexed stream"),
        };
        assert_eq!(first.data().await.expect("data failed"), Some(b"late".to_vec()));
        assert_eq!(first.data().await.expect("data failed"), None);

        let mut request = context.request(destination, "/second", Priority::Medium);
        let mut second = match request.proceed().await {
            StreamRequestEvent::Ready(StreamKind::Multiplexed(stream)) => stream,
            _ => panic!("expected a multiplexed stream"),
        };
        assert_eq!(second.id(), 1);
        assert_eq!(second.data().await.expect("data failed"), Some(b"fresh".to_vec()));

        server.await.expect("server failed");
    })
}

/// SDV test cases for RST_STREAM handling.
///
/// # Brief
/// 1. The server replies and then resets the stream.
/// 2. Verifies the body read fails with a request error.
#[test]
fn sdv_spdy_reset_stream_fails_read() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("build runtime failed");

    rt.block_on(async move {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
        let port = listener.local_addr().expect("local addr failed").port();
        let (done_tx, done_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            let mut server = SpdyServer::accept(&listener).await;
            let (id, _, _) = server.recv_syn_stream().await;
            server.send_reply(id, ok_headers(), false).await;
            server.send_rst(id, ResetStatus::ProtocolError).await;
            done_rx.await.expect("client dropped early");
        });

        let context = multiplexed_context();
        let destination = Endpoint::new(Scheme::Https, "127.0.0.1", port);

        let mut request = context.request(destination, "/reset", Priority::Medium);
        let mut stream = match request.proceed().await {
            StreamRequestEvent::Ready(StreamKind::Multiplexed(stream)) => stream,
            _ => panic!("expected a multiplexed stream"),
        };
        stream.response().await.expect("response failed");

        let error = stream.data().await.expect_err("reset stream must fail");
        assert_eq!(error.error_kind(), ErrorKind::Request);

        done_tx.send(()).expect("server gone");
        server.await.expect("server failed");
    })
}

/// SDV test cases for closing every session.
///
/// # Brief
/// 1. A stream is mid-body when the client tears all sessions down.
/// 2. Verifies the pending read fails with a connection-closed error.
#[test]
fn sdv_spdy_close_all_fans_out() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("build runtime failed");

    rt.block_on(async move {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
        let port = listener.local_addr().expect("local addr failed").port();
        let (done_tx, done_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            let mut server = SpdyServer::accept(&listener).await;
            let (id, _, _) = server.recv_syn_stream().await;
            server.send_reply(id, ok_headers(), false).await;
            done_rx.await.expect("client dropped early");
        });

        let context = multiplexed_context();
        let destination = Endpoint::new(Scheme::Https, "127.0.0.1", port);

        let mut request = context.request(destination, "/open", Priority::Medium);
        let mut stream = match request.proceed().await {
            StreamRequestEvent::Ready(StreamKind::Multiplexed(stream)) => stream,
            _ => panic!("expected a multiplexed stream"),
        };
        stream.response().await.expect("response failed");

        context.close_all();

        let error = stream.data().await.expect_err("closed session must fail");
        assert_eq!(error.error_kind(), ErrorKind::Request);
        assert_eq!(error.net_error(), Some(NetError::ConnectionClosed));

        done_tx.send(()).expect("server gone");
        server.await.expect("server failed");
    })
}
