//! Loopback TLS server for integration tests; certificate fixtures are
//! shared with the unit tests.

#![allow(dead_code)]

use std::io::Read;
use std::net::TcpListener;
use std::thread;

use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslAcceptor, SslMethod};
use openssl::x509::X509;

#[path = "../../src/test_support.rs"]
mod fixtures;

pub use fixtures::{issue, unix};

/// Serves one TLS connection on 127.0.0.1 presenting `leaf` followed by
/// `extra`, and returns the `host:port` to probe.
pub fn serve_once(leaf: X509, key: PKey<Private>, extra: Vec<X509>) -> String {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_private_key(&key).unwrap();
    acceptor.set_certificate(&leaf).unwrap();
    for cert in extra {
        acceptor.add_extra_chain_cert(cert).unwrap();
    }
    acceptor.check_private_key().unwrap();
    let acceptor = acceptor.build();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let target = listener.local_addr().unwrap().to_string();

    thread::spawn(move || {
        if let Ok((tcp, _)) = listener.accept() {
            if let Ok(mut stream) = acceptor.accept(tcp) {
                // hold the connection until the client goes away
                let mut buf = [0u8; 64];
                let _ = stream.read(&mut buf);
            }
        }
    });

    target
}
