//! TLS certificate chain and expiry checker.
//!
//! A [`Session`] takes one line of input at a time. Lines starting with `-`
//! toggle session flags (`details`, `fullchain`, `verify`); any other line is
//! a `host:port` target. Targets are probed with certificate validation
//! disabled so that broken chains can still be inspected, then each reported
//! certificate is classified against the session's reference time and,
//! optionally, verified against the host's trust roots.
//!
//! ```no_run
//! use chrono::Utc;
//! use tlschk::{Session, Settings, TlsProbe, WriterSink};
//!
//! let mut session = Session::new(Settings::new(Utc::now()), TlsProbe::default());
//! let mut sink = WriterSink::new(std::io::stdout(), false);
//! let mut diag = std::io::stderr();
//!
//! for line in ["-verify", "example.com:443"] {
//!     session.process_line(line, &mut sink, &mut diag)?;
//! }
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! Revocation (CRL/OCSP) is not checked.

pub mod config;
pub mod error;
pub mod probe;
pub mod render;
pub mod report;
pub mod session;
pub mod ttl;

#[cfg(test)]
mod test_support;

pub use error::TlsChkError;
pub use probe::{Probe, TlsProbe};
pub use render::{ReportSink, WriterSink};
pub use report::{report, ReportItem};
pub use session::{Flag, Session, Settings};
pub use ttl::{classify, TtlState};
