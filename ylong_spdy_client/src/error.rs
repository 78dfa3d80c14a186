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

//! Errors that may occur in this crate.

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::io;

use crate::util::tls::CertStatus;

/// The structure encapsulates errors that can be encountered when working with
/// the client.
///
/// # Examples
///
/// ```
/// use ylong_spdy_client::SpdyClientError;
///
/// let error = SpdyClientError::user_aborted();
/// assert_eq!(format!("{error}"), "User Aborted Error: No reason");
/// ```
pub struct SpdyClientError {
    kind: ErrorKind,
    cause: Cause,
}

impl SpdyClientError {
    /// Creates a `UserAborted` error.
    ///
    /// # Examples
    ///
    /// ```
    /// use ylong_spdy_client::SpdyClientError;
    ///
    /// let error = SpdyClientError::user_aborted();
    /// ```
    pub fn user_aborted() -> Self {
        Self {
            kind: ErrorKind::UserAborted,
            cause: Cause::NoReason,
        }
    }

    /// Creates an `Other` error.
    ///
    /// # Examples
    ///
    /// ```
    /// use ylong_spdy_client::SpdyClientError;
    ///
    /// let error = SpdyClientError::other("Other error");
    /// ```
    pub fn other<T>(cause: T) -> Self
    where
        T: Into<Box<dyn Error + Send + Sync>>,
    {
        Self {
            kind: ErrorKind::Other,
            cause: Cause::Other(cause.into()),
        }
    }

    /// Gets the `ErrorKind` of this `SpdyClientError`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ylong_spdy_client::{ErrorKind, SpdyClientError};
    ///
    /// let error = SpdyClientError::user_aborted();
    /// assert_eq!(error.error_kind(), ErrorKind::UserAborted);
    /// ```
    pub fn error_kind(&self) -> ErrorKind {
        self.kind
    }

    /// Gets the underlying `io::Error` if there is one.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self.cause {
            Cause::Io(ref io) => Some(io),
            _ => None,
        }
    }

    /// Gets the network-level error code if this error carries one.
    ///
    /// Connection establishment failures keep the precise code so that
    /// callers can distinguish, for example, a refused connection from a
    /// certificate problem.
    pub fn net_error(&self) -> Option<NetError> {
        match self.cause {
            Cause::Net(net) => Some(net),
            _ => None,
        }
    }

    pub(crate) fn from_error<T>(kind: ErrorKind, err: T) -> Self
    where
        T: Into<Box<dyn Error + Send + Sync>>,
    {
        Self {
            kind,
            cause: Cause::Other(err.into()),
        }
    }

    pub(crate) fn from_str(kind: ErrorKind, msg: &'static str) -> Self {
        Self {
            kind,
            cause: Cause::Msg(msg),
        }
    }

    pub(crate) fn from_io_error(kind: ErrorKind, err: io::Error) -> Self {
        Self {
            kind,
            cause: Cause::Io(err),
        }
    }

    pub(crate) fn from_net_error(kind: ErrorKind, err: NetError) -> Self {
        Self {
            kind,
            cause: Cause::Net(err),
        }
    }
}

impl Debug for SpdyClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpdyClientError")
            .field("ErrorKind", &self.kind)
            .field("Cause", &self.cause)
            .finish()
    }
}

impl Display for SpdyClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.cause)
    }
}

impl Error for SpdyClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self.cause {
            Cause::Io(ref io) => Some(io),
            Cause::Other(ref other) => Some(other.as_ref()),
            _ => None,
        }
    }
}

/// Error kinds which can indicate the type of a `SpdyClientError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Errors for creating a client or its components.
    Build,

    /// Errors for connecting to a server.
    Connect,

    /// Errors for sending a request or operating a stream.
    Request,

    /// Errors for transferring stream data.
    BodyTransfer,

    /// Errors for a timeout that ran out.
    Timeout,

    /// User raised errors.
    UserAborted,

    /// Other errors.
    Other,
}

impl ErrorKind {
    /// Gets the string info of this `ErrorKind`.
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "Build Error",
            Self::Connect => "Connect Error",
            Self::Request => "Request Error",
            Self::BodyTransfer => "Body Transfer Error",
            Self::Timeout => "Timeout Error",
            Self::UserAborted => "User Aborted Error",
            Self::Other => "Other Error",
        }
    }
}

enum Cause {
    NoReason,
    Net(NetError),
    Io(io::Error),
    Msg(&'static str),
    Other(Box<dyn Error + Send + Sync>),
}

impl Debug for Cause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoReason => f.write_str("No reason"),
            Self::Net(net) => Debug::fmt(net, f),
            Self::Io(io) => Debug::fmt(io, f),
            Self::Msg(msg) => f.write_str(msg),
            Self::Other(other) => Debug::fmt(other, f),
        }
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoReason => f.write_str("No reason"),
            Self::Net(net) => Display::fmt(net, f),
            Self::Io(io) => Display::fmt(io, f),
            Self::Msg(msg) => f.write_str(msg),
            Self::Other(other) => Display::fmt(other, f),
        }
    }
}

/// Network-level error codes produced while establishing connections and
/// driving sessions.
///
/// Several parts of the client change behavior based on the exact code, for
/// example proxy fallback and the TLS version downgrade retry, so the codes
/// are kept instead of being flattened into a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    /// An operation timed out.
    TimedOut,
    /// A connection attempt failed for an unspecified reason.
    ConnectionFailed,
    /// The connection was closed (TCP FIN).
    ConnectionClosed,
    /// The connection was reset (TCP RST).
    ConnectionReset,
    /// The connection attempt was refused.
    ConnectionRefused,
    /// The connection was aborted locally.
    ConnectionAborted,
    /// The remote address is unreachable.
    AddressUnreachable,
    /// The host name could not be resolved.
    NameNotResolved,
    /// The network is down.
    InternetDisconnected,
    /// Connecting to the proxy server failed.
    ProxyConnectionFailed,
    /// Establishing a tunnel through an HTTP proxy failed.
    TunnelConnectionFailed,
    /// The SOCKS handshake with the proxy failed.
    SocksConnectionFailed,
    /// The proxy requested authentication for the tunnel.
    ProxyAuthRequested,
    /// No remaining proxy in the list uses a supported scheme.
    NoSupportedProxies,
    /// A TLS protocol error occurred during the handshake.
    SslProtocolError,
    /// The server does not support any enabled TLS version or cipher.
    SslVersionOrCipherMismatch,
    /// The server sent a TLS decompression failure alert.
    SslDecompressionFailureAlert,
    /// The server sent a TLS bad record MAC alert.
    SslBadRecordMacAlert,
    /// The server certificate failed validation.
    CertError(CertStatus),
    /// The server requested a client certificate.
    SslClientAuthCertNeeded,
    /// Protocol negotiation did not produce a usable protocol.
    NpnNegotiationFailed,
    /// A session protocol violation occurred.
    SpdyProtocolError,
    /// The operation was aborted.
    Aborted,
    /// An unclassified I/O failure.
    Io(io::ErrorKind),
}

impl NetError {
    /// Returns `true` if this code reports a server certificate problem.
    pub fn is_certificate_error(&self) -> bool {
        matches!(self, Self::CertError(_))
    }

    pub(crate) fn from_io_kind(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::TimedOut => Self::TimedOut,
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::ConnectionReset => Self::ConnectionReset,
            io::ErrorKind::ConnectionAborted => Self::ConnectionAborted,
            io::ErrorKind::NotConnected => Self::ConnectionClosed,
            other => Self::Io(other),
        }
    }
}

impl Display for NetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimedOut => f.write_str("operation timed out"),
            Self::ConnectionFailed => f.write_str("connection failed"),
            Self::ConnectionClosed => f.write_str("connection closed"),
            Self::ConnectionReset => f.write_str("connection reset"),
            Self::ConnectionRefused => f.write_str("connection refused"),
            Self::ConnectionAborted => f.write_str("connection aborted"),
            Self::AddressUnreachable => f.write_str("address unreachable"),
            Self::NameNotResolved => f.write_str("name not resolved"),
            Self::InternetDisconnected => f.write_str("internet disconnected"),
            Self::ProxyConnectionFailed => f.write_str("proxy connection failed"),
            Self::TunnelConnectionFailed => f.write_str("tunnel connection failed"),
            Self::SocksConnectionFailed => f.write_str("socks connection failed"),
            Self::ProxyAuthRequested => f.write_str("proxy authentication requested"),
            Self::NoSupportedProxies => f.write_str("no supported proxies"),
            Self::SslProtocolError => f.write_str("ssl protocol error"),
            Self::SslVersionOrCipherMismatch => f.write_str("ssl version or cipher mismatch"),
            Self::SslDecompressionFailureAlert => {
                f.write_str("ssl decompression failure alert")
            }
            Self::SslBadRecordMacAlert => f.write_str("ssl bad record mac alert"),
            Self::CertError(status) => write!(f, "certificate error: {status}"),
            Self::SslClientAuthCertNeeded => f.write_str("ssl client auth cert needed"),
            Self::NpnNegotiationFailed => f.write_str("npn negotiation failed"),
            Self::SpdyProtocolError => f.write_str("spdy protocol error"),
            Self::Aborted => f.write_str("aborted"),
            Self::Io(kind) => write!(f, "io error: {kind:?}"),
        }
    }
}

impl Error for NetError {}
