//! TLS dial and peer chain retrieval.
//!
//! Peer verification is switched off at the transport so that expired,
//! self-signed or otherwise untrusted chains can still be fetched. Judging
//! the chain is left to [`crate::report`].

use std::io;
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use log::debug;
use openssl::ssl::{SslConnector, SslMethod, SslRef, SslVerifyMode};
use openssl::x509::X509;

use crate::error::TlsChkError;

/// Connect timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Port used when a target omits one.
pub const DEFAULT_PORT: u16 = 443;

/// Source of peer certificate chains.
pub trait Probe {
    /// Returns the chain presented by `target`, leaf first.
    fn probe(&self, target: &str) -> Result<Vec<X509>, TlsChkError>;
}

/// Probe backed by a real TCP connection and OpenSSL handshake.
#[derive(Debug, Clone)]
pub struct TlsProbe {
    timeout: Duration,
}

impl TlsProbe {
    pub fn new(timeout: Duration) -> Self {
        TlsProbe { timeout }
    }

    /// Tries each address in turn; `timeout` bounds the whole dial, not each attempt.
    fn dial(&self, target: &str, addrs: &[SocketAddr]) -> Result<TcpStream, TlsChkError> {
        let deadline = Instant::now() + self.timeout;
        let mut last_err = None;
        for addr in addrs {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            debug!("{}: connecting to {} ({:?} left)", target, addr, remaining);
            match TcpStream::connect_timeout(addr, remaining) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }

        match last_err {
            Some(source) if source.kind() != io::ErrorKind::TimedOut => {
                Err(TlsChkError::ConnectionFailed {
                    address: target.to_string(),
                    source,
                })
            }
            _ => Err(TlsChkError::Timeout {
                operation: format!("connect to {} after {:?}", target, self.timeout),
            }),
        }
    }
}

impl Default for TlsProbe {
    fn default() -> Self {
        TlsProbe::new(DEFAULT_TIMEOUT)
    }
}

impl Probe for TlsProbe {
    fn probe(&self, target: &str) -> Result<Vec<X509>, TlsChkError> {
        let (host, port) = split_target(target)?;

        let addrs: Vec<SocketAddr> = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|source| TlsChkError::DnsResolution {
                hostname: host.clone(),
                source,
            })?
            .collect();
        if addrs.is_empty() {
            return Err(TlsChkError::DnsResolution {
                hostname: host,
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses returned"),
            });
        }

        let tcp = self.dial(target, &addrs)?;
        tcp.set_read_timeout(Some(self.timeout))?;
        tcp.set_write_timeout(Some(self.timeout))?;

        let mut builder = SslConnector::builder(SslMethod::tls())?;
        builder.set_verify(SslVerifyMode::NONE);
        let connector = builder.build();

        let mut config = connector.configure()?;
        config.set_verify_hostname(false);
        // SNI is only meaningful for DNS names
        config.set_use_server_name_indication(host.parse::<IpAddr>().is_err());

        let mut stream = config.connect(&host, tcp)?;
        debug!(
            "{}: negotiated {} ({})",
            target,
            stream.ssl().version_str(),
            stream
                .ssl()
                .current_cipher()
                .map(|c| c.name())
                .unwrap_or("unknown cipher")
        );

        let chain = peer_chain(stream.ssl());
        if let Err(e) = stream.shutdown() {
            debug!("{}: shutdown: {}", target, e);
        }
        chain
    }
}

fn peer_chain(ssl: &SslRef) -> Result<Vec<X509>, TlsChkError> {
    if let Some(stack) = ssl.peer_cert_chain() {
        let chain: Vec<X509> = stack.iter().map(|cert| cert.to_owned()).collect();
        if !chain.is_empty() {
            return Ok(chain);
        }
    }

    ssl.peer_certificate()
        .map(|cert| vec![cert])
        .ok_or_else(|| TlsChkError::CertificateError {
            reason: "server presented no certificate".to_string(),
        })
}

/// Splits `host:port`, `[v6]:port`, or a bare host into host and port.
pub fn split_target(target: &str) -> Result<(String, u16), TlsChkError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(TlsChkError::InvalidInput {
            field: "target".to_string(),
            reason: "empty".to_string(),
        });
    }

    let (host, port) = if let Some(rest) = target.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| TlsChkError::InvalidInput {
            field: "target".to_string(),
            reason: format!("unterminated '[' in {}", target),
        })?;
        match tail.strip_prefix(':') {
            Some(port) => (host, Some(port)),
            None if tail.is_empty() => (host, None),
            None => {
                return Err(TlsChkError::InvalidInput {
                    field: "target".to_string(),
                    reason: format!("unexpected {:?} after address", tail),
                })
            }
        }
    } else {
        match target.rsplit_once(':') {
            // a bare IPv6 literal has more than one colon
            Some((host, port)) if !host.contains(':') => (host, Some(port)),
            _ => (target, None),
        }
    };

    if host.is_empty() {
        return Err(TlsChkError::InvalidInput {
            field: "target".to_string(),
            reason: format!("missing host in {}", target),
        });
    }

    let port = match port {
        Some(port) => port.parse::<u16>().map_err(|_| TlsChkError::InvalidInput {
            field: "port".to_string(),
            reason: format!("{:?} is not a valid port", port),
        })?,
        None => DEFAULT_PORT,
    };

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_host_port() {
        assert_eq!(
            split_target("example.com:8443").unwrap(),
            ("example.com".to_string(), 8443)
        );
    }

    #[test]
    fn test_split_defaults_port() {
        assert_eq!(
            split_target("  example.com ").unwrap(),
            ("example.com".to_string(), 443)
        );
    }

    #[test]
    fn test_split_ipv6() {
        assert_eq!(split_target("[::1]:4433").unwrap(), ("::1".to_string(), 4433));
        assert_eq!(split_target("[::1]").unwrap(), ("::1".to_string(), 443));
        assert_eq!(split_target("::1").unwrap(), ("::1".to_string(), 443));
    }

    #[test]
    fn test_split_rejects_garbage() {
        assert!(split_target("").is_err());
        assert!(split_target(":443").is_err());
        assert!(split_target("example.com:https").is_err());
        assert!(split_target("example.com:70000").is_err());
        assert!(split_target("[::1").is_err());
        assert!(split_target("[::1]x").is_err());
    }

    #[test]
    fn test_dial_deadline_covers_all_addresses() {
        // unroutable TEST-NET-1 addresses never answer
        let addrs: Vec<SocketAddr> = (1..=4)
            .map(|i| SocketAddr::from(([192, 0, 2, i], 443)))
            .collect();
        let probe = TlsProbe::new(Duration::from_millis(300));

        let started = Instant::now();
        let err = probe.dial("blackhole.test:443", &addrs).unwrap_err();

        assert!(started.elapsed() < Duration::from_millis(900));
        assert!(err.is_connection_error(), "unexpected error: {}", err);
    }

    #[test]
    fn test_refused_connection_is_connection_error() {
        // bind then drop to get a local port with nothing listening
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let probe = TlsProbe::new(Duration::from_secs(2));
        let err = probe.probe(&format!("127.0.0.1:{}", port)).unwrap_err();
        assert!(err.is_connection_error(), "unexpected error: {}", err);
    }
}
