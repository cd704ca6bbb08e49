//! Per-certificate report assembly.

use chrono::{DateTime, TimeZone, Utc};
use openssl::asn1::{Asn1Object, Asn1Time, Asn1TimeRef};
use openssl::nid::Nid;
use openssl::sha::sha256;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509NameRef, X509Ref, X509StoreContext, X509};
use serde::{Serialize, Serializer};

use crate::error::TlsChkError;
use crate::session::Settings;
use crate::ttl::{classify, TtlState};

/// What was learned about one certificate of one query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportItem {
    pub query: String,
    pub chain_index: usize,
    pub common_name: String,
    pub issuer: String,
    /// Only meaningful when verification was requested.
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_error: Option<String>,
    #[serde(serialize_with = "to_hex")]
    pub pubkey_fingerprint: [u8; 32],
    #[serde(serialize_with = "to_hex")]
    pub cert_fingerprint: [u8; 32],
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub ttl_days: f64,
    pub ttl_state: TtlState,
}

/// Builds the report item for `cert` at `chain_index` of the chain fetched for `query`.
pub fn report(
    query: &str,
    chain_index: usize,
    cert: &X509Ref,
    settings: &Settings,
) -> Result<ReportItem, TlsChkError> {
    let spki = cert
        .public_key()
        .and_then(|key| key.public_key_to_der())
        .map_err(|e| TlsChkError::CertificateError {
            reason: format!("unreadable public key: {}", e),
        })?;
    let der = cert.to_der()?;

    let not_before = to_utc(cert.not_before())?;
    let not_after = to_utc(cert.not_after())?;
    let (ttl_days, ttl_state) = classify(not_before, not_after, settings.reference_time);

    let mut item = ReportItem {
        query: query.to_string(),
        chain_index,
        common_name: display_name(cert.subject_name()),
        issuer: display_name(cert.issuer_name()),
        verified: false,
        verify_error: None,
        pubkey_fingerprint: sha256(&spki),
        cert_fingerprint: sha256(&der),
        not_before,
        not_after,
        ttl_days,
        ttl_state,
    };

    if settings.verify_chain {
        match verify_chain(cert) {
            Ok(()) => item.verified = true,
            Err(e) => item.verify_error = Some(e.to_string()),
        }
    }

    Ok(item)
}

/// Verifies `cert` on its own against the default trust roots of this host.
///
/// No intermediates are supplied, so a leaf whose issuer is not itself a
/// trusted root fails with "unable to get local issuer certificate".
pub fn verify_chain(cert: &X509Ref) -> Result<(), TlsChkError> {
    let mut builder = X509StoreBuilder::new()?;
    builder.set_default_paths()?;
    let store = builder.build();
    let untrusted: Stack<X509> = Stack::new()?;

    let mut context = X509StoreContext::new()?;
    let failure = context.init(&store, cert, &untrusted, |ctx| {
        if ctx.verify_cert()? {
            Ok(None)
        } else {
            Ok(Some(ctx.error().error_string().to_string()))
        }
    })?;

    match failure {
        None => Ok(()),
        Some(reason) => Err(TlsChkError::VerificationFailed { reason }),
    }
}

/// Renders a distinguished name in RFC 2253 order, most specific attribute
/// first, e.g. `CN=example.com,O=Example,C=US`.
///
/// Attributes without a conventional short name are keyed by dotted OID.
pub fn display_name(name: &X509NameRef) -> String {
    let parts: Vec<String> = name
        .entries()
        .map(|entry| {
            let key = match attribute_key(entry.object().nid()) {
                Some(key) => key.to_string(),
                None => match Asn1Object::from_str(&entry.object().to_string()) {
                    Ok(object) => dotted_oid(object.as_slice()),
                    Err(_) => entry.object().to_string(),
                },
            };
            let value = entry
                .data()
                .to_string()
                .unwrap_or_else(|_| String::from_utf8_lossy(entry.data().as_slice()).into_owned());
            format!("{}={}", key, escape_value(&value))
        })
        .collect();
    parts.into_iter().rev().collect::<Vec<_>>().join(",")
}

fn attribute_key(nid: Nid) -> Option<&'static str> {
    let key = match nid {
        Nid::COUNTRYNAME => "C",
        Nid::ORGANIZATIONNAME => "O",
        Nid::ORGANIZATIONALUNITNAME => "OU",
        Nid::COMMONNAME => "CN",
        Nid::SERIALNUMBER => "SERIALNUMBER",
        Nid::LOCALITYNAME => "L",
        Nid::STATEORPROVINCENAME => "ST",
        Nid::STREETADDRESS => "STREET",
        Nid::POSTALCODE => "POSTALCODE",
        _ => return None,
    };
    Some(key)
}

/// Decodes DER object identifier content octets to `1.2.840...` form.
fn dotted_oid(der: &[u8]) -> String {
    let mut arcs: Vec<u64> = Vec::new();
    let mut value: u64 = 0;
    for byte in der {
        value = (value << 7) | u64::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            if arcs.is_empty() {
                let first = (value / 40).min(2);
                arcs.push(first);
                arcs.push(value - first * 40);
            } else {
                arcs.push(value);
            }
            value = 0;
        }
    }
    arcs.iter().map(|arc| arc.to_string()).collect::<Vec<_>>().join(".")
}

fn escape_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        let special = match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' => true,
            ' ' => i == 0 || i == last,
            '#' => i == 0,
            _ => false,
        };
        if special {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn to_utc(time: &Asn1TimeRef) -> Result<DateTime<Utc>, TlsChkError> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    let secs = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| TlsChkError::CertificateError {
            reason: format!("timestamp out of range: {}", time),
        })
}

fn to_hex<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    serializer.serialize_str(&hex)
}
