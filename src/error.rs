//! Error types for probing and reporting.
//!
//! Connection-level variants are recovered at the query boundary by the
//! session controller. Verification failures never surface here as errors;
//! they are recorded on the report item instead.

use std::fmt;
use std::io;

/// Error type for a failed query.
#[derive(Debug)]
pub enum TlsChkError {
    /// DNS resolution failed for the given hostname
    DnsResolution {
        /// The hostname that failed to resolve
        hostname: String,
        /// The underlying I/O error
        source: io::Error,
    },

    /// TCP connection failed to the target address
    ConnectionFailed {
        /// The address (host:port) that connection failed to
        address: String,
        /// The underlying I/O error
        source: io::Error,
    },

    /// TLS handshake failed
    HandshakeFailed {
        /// Details about why the handshake failed
        details: String,
    },

    /// Network operation timeout
    Timeout {
        /// Description of which operation timed out
        operation: String,
    },

    /// Certificate could not be read
    CertificateError {
        /// Description of what went wrong
        reason: String,
    },

    /// Chain of trust could not be established
    VerificationFailed {
        /// Reason reported by the verifier
        reason: String,
    },

    /// Malformed target or setting
    InvalidInput {
        /// Which field/parameter was invalid
        field: String,
        /// Why it was invalid
        reason: String,
    },

    /// OpenSSL error occurred
    OpenSSLError {
        /// The underlying OpenSSL error
        details: String,
    },

    /// Generic I/O error
    IoError {
        /// The underlying I/O error
        source: io::Error,
    },
}

impl fmt::Display for TlsChkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DnsResolution { hostname, source } => {
                write!(f, "failed to resolve {}: {}", hostname, source)
            }
            Self::ConnectionFailed { address, source } => {
                write!(f, "connection to {} failed: {}", address, source)
            }
            Self::HandshakeFailed { details } => {
                write!(f, "TLS handshake failed: {}", details)
            }
            Self::Timeout { operation } => {
                write!(f, "timed out: {}", operation)
            }
            Self::CertificateError { reason } => {
                write!(f, "certificate error: {}", reason)
            }
            Self::VerificationFailed { reason } => write!(f, "{}", reason),
            Self::InvalidInput { field, reason } => {
                write!(f, "invalid {}: {}", field, reason)
            }
            Self::OpenSSLError { details } => {
                write!(f, "OpenSSL error: {}", details)
            }
            Self::IoError { source } => {
                write!(f, "I/O error: {}", source)
            }
        }
    }
}

impl std::error::Error for TlsChkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DnsResolution { source, .. } => Some(source),
            Self::ConnectionFailed { source, .. } => Some(source),
            Self::IoError { source } => Some(source),
            _ => None,
        }
    }
}

impl TlsChkError {
    /// True for failures that happened before a certificate was in hand.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::DnsResolution { .. }
                | Self::ConnectionFailed { .. }
                | Self::HandshakeFailed { .. }
                | Self::Timeout { .. }
        )
    }
}

impl From<io::Error> for TlsChkError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout {
                operation: e.to_string(),
            },
            _ => Self::IoError { source: e },
        }
    }
}

impl From<openssl::error::ErrorStack> for TlsChkError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::OpenSSLError {
            details: e.to_string(),
        }
    }
}

impl<S: fmt::Debug> From<openssl::ssl::HandshakeError<S>> for TlsChkError {
    fn from(e: openssl::ssl::HandshakeError<S>) -> Self {
        Self::HandshakeFailed {
            details: format!("{}", e),
        }
    }
}
