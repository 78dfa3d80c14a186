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

//! TLS integration.
//!
//! The client does not ship a TLS stack. A [`TlsProvider`] supplied by the
//! caller wraps an established transport and reports the negotiated protocol
//! and certificate verdict, which the request machinery uses for session
//! promotion and the certificate recovery flow.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::ops::{BitOr, BitOrAssign};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use crate::async_impl::connector::BoxedIo;
use crate::error::NetError;

/// Certificate verification results, a set of problem flags.
///
/// An empty status means the certificate verified cleanly.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct CertStatus(u32);

impl CertStatus {
    /// The certificate name does not match the host.
    pub const COMMON_NAME_INVALID: Self = Self(1 << 0);

    /// The certificate is expired or not yet valid.
    pub const DATE_INVALID: Self = Self(1 << 1);

    /// The issuing authority is not trusted.
    pub const AUTHORITY_INVALID: Self = Self(1 << 2);

    /// The certificate has been revoked.
    pub const REVOKED: Self = Self(1 << 6);

    /// The certificate is malformed or otherwise invalid.
    pub const INVALID: Self = Self(1 << 7);

    /// Creates an empty status.
    pub fn empty() -> Self {
        Self(0)
    }

    /// The raw flag bits.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Returns `true` if every flag in `other` is set in `self`.
    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any problem flag is set.
    pub fn is_error(&self) -> bool {
        self.0 != 0
    }
}

impl BitOr for CertStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CertStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Display for CertStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if !self.is_error() {
            return f.write_str("ok");
        }
        let mut first = true;
        let mut put = |f: &mut Formatter<'_>, name: &str| -> std::fmt::Result {
            if !first {
                f.write_str("|")?;
            }
            first = false;
            f.write_str(name)
        };
        if self.contains(Self::COMMON_NAME_INVALID) {
            put(f, "common-name-invalid")?;
        }
        if self.contains(Self::DATE_INVALID) {
            put(f, "date-invalid")?;
        }
        if self.contains(Self::AUTHORITY_INVALID) {
            put(f, "authority-invalid")?;
        }
        if self.contains(Self::REVOKED) {
            put(f, "revoked")?;
        }
        if self.contains(Self::INVALID) {
            put(f, "invalid")?;
        }
        Ok(())
    }
}

/// Details of a completed certificate check.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SslInfo {
    /// The DER bytes of the server certificate.
    pub cert: Vec<u8>,

    /// The verification verdict for `cert`.
    pub cert_status: CertStatus,
}

/// A certificate the user chose to proceed past, with the problems that were
/// accepted at that time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AllowedBadCert {
    /// The DER bytes of the accepted certificate.
    pub cert: Vec<u8>,

    /// The problems present when the certificate was accepted.
    pub cert_status: CertStatus,
}

/// Options for one TLS handshake.
#[derive(Clone, Debug)]
pub struct SslConfig {
    /// Whether SSL 3.0 may be negotiated.
    pub ssl3_enabled: bool,

    /// Whether TLS 1.0 may be negotiated.
    pub tls1_enabled: bool,

    /// Whether TLS compression may be negotiated.
    pub compression_enabled: bool,

    /// Certificates the user accepted despite verification problems.
    pub allowed_bad_certs: Vec<AllowedBadCert>,

    /// The client certificate to present, DER encoded.
    pub client_cert: Option<Vec<u8>>,

    /// Whether `client_cert` should be sent when the server asks for one.
    pub send_client_cert: bool,

    /// Application protocols offered during negotiation, preferred first.
    pub protocols: Vec<String>,
}

impl SslConfig {
    // The downgrade used after a handshake failure that looks like TLS
    // intolerance: SSL 3.0 only, no TLS extensions on the wire.
    pub(crate) fn intolerant_fallback(&self) -> Self {
        let mut config = self.clone();
        config.tls1_enabled = false;
        config.compression_enabled = false;
        config
    }

    pub(crate) fn allows_bad_cert(&self, info: &SslInfo) -> bool {
        self.allowed_bad_certs
            .iter()
            .any(|allowed| allowed.cert == info.cert && allowed.cert_status == info.cert_status)
    }
}

impl Default for SslConfig {
    fn default() -> Self {
        Self {
            ssl3_enabled: true,
            tls1_enabled: true,
            compression_enabled: false,
            allowed_bad_certs: Vec::new(),
            client_cert: None,
            send_client_cert: false,
            protocols: vec![String::from("spdy/2"), String::from("http/1.1")],
        }
    }
}

/// The transport plus negotiation results a successful handshake yields.
pub struct TlsSession {
    /// The protected transport.
    pub io: BoxedIo,

    /// The protocol selected during negotiation, if any.
    pub negotiated_protocol: Option<String>,

    /// The certificate check results.
    pub info: SslInfo,
}

/// A failed handshake, with the certificate details when the failure was a
/// verification problem.
pub struct TlsError {
    /// The classified failure.
    pub error: NetError,

    /// Certificate details for `CertError` failures.
    pub info: Option<SslInfo>,
}

/// The future type [`TlsProvider::handshake`] returns.
pub type TlsHandshakeFuture = Pin<Box<dyn Future<Output = Result<TlsSession, TlsError>> + Send>>;

/// Performs TLS handshakes over already-established transports.
pub trait TlsProvider: Send + Sync {
    /// Runs a client handshake with `host` over `io` using `config`.
    ///
    /// A certificate that fails verification but matches an entry of
    /// `config.allowed_bad_certs` must be treated as accepted.
    fn handshake(&self, io: BoxedIo, host: &str, config: &SslConfig) -> TlsHandshakeFuture;
}

// Hosts that failed a TLS 1.0 handshake with an intolerance-looking error.
// Later connects go straight to the downgraded configuration.
#[derive(Clone, Default)]
pub(crate) struct TlsIntolerantHosts {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl TlsIntolerantHosts {
    pub(crate) fn mark(&self, authority: &str) {
        self.inner
            .lock()
            .unwrap()
            .insert(authority.to_string());
    }

    pub(crate) fn contains(&self, authority: &str) -> bool {
        self.inner.lock().unwrap().contains(authority)
    }
}

// Handshake failures that historically meant the server chokes on TLS 1.0
// extensions rather than rejecting the client outright.
pub(crate) fn is_tls_intolerance_error(error: NetError) -> bool {
    matches!(
        error,
        NetError::SslProtocolError
            | NetError::SslVersionOrCipherMismatch
            | NetError::SslDecompressionFailureAlert
            | NetError::SslBadRecordMacAlert
    )
}

#[cfg(test)]
mod ut_tls {
    use crate::util::tls::{
        is_tls_intolerance_error, AllowedBadCert, CertStatus, SslConfig, SslInfo,
        TlsIntolerantHosts,
    };
    use crate::NetError;

    /// UT test cases for `CertStatus`.
    ///
    /// # Brief
    /// 1. Combines status flags.
    /// 2. Checks `contains`, `is_error` and the display form.
    #[test]
    fn ut_cert_status_flags() {
        let empty = CertStatus::empty();
        assert!(!empty.is_error());
        assert_eq!(format!("{empty}"), "ok");

        let status = CertStatus::DATE_INVALID | CertStatus::AUTHORITY_INVALID;
        assert!(status.is_error());
        assert!(status.contains(CertStatus::DATE_INVALID));
        assert!(!status.contains(CertStatus::REVOKED));
        assert_eq!(format!("{status}"), "date-invalid|authority-invalid");
    }

    /// UT test cases for `SslConfig` defaults and the downgrade copy.
    ///
    /// # Brief
    /// 1. Builds the default config.
    /// 2. Derives the intolerant fallback.
    /// 3. Checks the TLS 1.0 and compression switches moved.
    #[test]
    fn ut_ssl_config_fallback() {
        let config = SslConfig::default();
        assert!(config.ssl3_enabled);
        assert!(config.tls1_enabled);
        assert_eq!(config.protocols, ["spdy/2", "http/1.1"]);

        let fallback = config.intolerant_fallback();
        assert!(fallback.ssl3_enabled);
        assert!(!fallback.tls1_enabled);
        assert!(!fallback.compression_enabled);
    }

    /// UT test cases for `SslConfig::allows_bad_cert`.
    ///
    /// # Brief
    /// 1. Accepts one specific certificate and status pair.
    /// 2. Checks matching and non-matching lookups.
    #[test]
    fn ut_ssl_config_allows_bad_cert() {
        let mut config = SslConfig::default();
        config.allowed_bad_certs.push(AllowedBadCert {
            cert: vec![1, 2, 3],
            cert_status: CertStatus::AUTHORITY_INVALID,
        });

        let matching = SslInfo {
            cert: vec![1, 2, 3],
            cert_status: CertStatus::AUTHORITY_INVALID,
        };
        assert!(config.allows_bad_cert(&matching));

        let worse = SslInfo {
            cert: vec![1, 2, 3],
            cert_status: CertStatus::AUTHORITY_INVALID | CertStatus::REVOKED,
        };
        assert!(!config.allows_bad_cert(&worse));

        let different = SslInfo {
            cert: vec![9, 9, 9],
            cert_status: CertStatus::AUTHORITY_INVALID,
        };
        assert!(!config.allows_bad_cert(&different));
    }

    /// UT test cases for `TlsIntolerantHosts`.
    ///
    /// # Brief
    /// 1. Marks a host as intolerant.
    /// 2. Checks membership for marked and unmarked hosts.
    #[test]
    fn ut_tls_intolerant_hosts() {
        let hosts = TlsIntolerantHosts::default();
        assert!(!hosts.contains("example.com:443"));
        hosts.mark("example.com:443");
        assert!(hosts.contains("example.com:443"));
        assert!(!hosts.contains("other.com:443"));
    }

    /// UT test cases for `is_tls_intolerance_error`.
    ///
    /// # Brief
    /// 1. Checks the errors that trigger the downgrade retry.
    /// 2. Checks that unrelated errors do not.
    #[test]
    fn ut_tls_intolerance_errors() {
        assert!(is_tls_intolerance_error(NetError::SslProtocolError));
        assert!(is_tls_intolerance_error(NetError::SslBadRecordMacAlert));
        assert!(!is_tls_intolerance_error(NetError::ConnectionRefused));
        assert!(!is_tls_intolerance_error(NetError::CertError(
            CertStatus::REVOKED
        )));
    }
}
