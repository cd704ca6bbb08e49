//! Report output: one tab-separated line per certificate, or a JSON record.

use std::io::{self, Write};

use chrono::Local;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::report::ReportItem;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Consumer of finished report items.
pub trait ReportSink {
    /// Emits `item`, as a structured record when `detail` is set.
    fn emit(&mut self, item: &ReportItem, detail: bool) -> io::Result<()>;
}

/// Sink writing to any byte stream.
#[derive(Debug)]
pub struct WriterSink<W> {
    out: W,
    pretty: bool,
}

impl<W: Write> WriterSink<W> {
    /// `pretty` indents JSON records; it has no effect on compact lines.
    pub fn new(out: W, pretty: bool) -> Self {
        WriterSink { out, pretty }
    }
}

impl<W: Write> ReportSink for WriterSink<W> {
    fn emit(&mut self, item: &ReportItem, detail: bool) -> io::Result<()> {
        if !detail {
            writeln!(self.out, "{}", compact_line(item))?;
        } else if self.pretty {
            let mut ser = Serializer::with_formatter(&mut self.out, PrettyFormatter::with_indent(b"\t"));
            item.serialize(&mut ser)?;
            writeln!(self.out)?;
        } else {
            serde_json::to_writer(&mut self.out, item)?;
            writeln!(self.out)?;
        }
        self.out.flush()
    }
}

/// Formats `name[index]`, both window ends in local time, days left and state code.
pub fn compact_line(item: &ReportItem) -> String {
    format!(
        "{}[{}]\t{}\t{}\t{:7.2}\t{}",
        item.common_name,
        item.chain_index,
        item.not_before.with_timezone(&Local).format(TIMESTAMP_FORMAT),
        item.not_after.with_timezone(&Local).format(TIMESTAMP_FORMAT),
        item.ttl_days,
        item.ttl_state,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ttl::TtlState;
    use chrono::{TimeZone, Utc};

    fn item(verify_error: Option<&str>) -> ReportItem {
        ReportItem {
            query: "example.com:443".to_string(),
            chain_index: 0,
            common_name: "CN=example.com".to_string(),
            issuer: "CN=Example CA".to_string(),
            verified: false,
            verify_error: verify_error.map(String::from),
            pubkey_fingerprint: [0xab; 32],
            cert_fingerprint: [0x01; 32],
            not_before: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            not_after: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            ttl_days: -31.0,
            ttl_state: TtlState::Expired,
        }
    }

    fn render(item: &ReportItem, detail: bool, pretty: bool) -> String {
        let mut out = Vec::new();
        WriterSink::new(&mut out, pretty).emit(item, detail).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_compact_line() {
        let line = render(&item(None), false, true);
        let fields: Vec<&str> = line.trim_end_matches('\n').split('\t').collect();

        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0], "CN=example.com[0]");
        assert_eq!(fields[1].len(), "2024-01-01 00:00:00".len());
        assert_eq!(fields[3], " -31.00");
        assert_eq!(fields[4], "EX");
    }

    #[test]
    fn test_json_line_omits_missing_verify_error() {
        let out = render(&item(None), true, false);
        assert_eq!(out.lines().count(), 1);

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert!(value.get("verifyError").is_none());
        assert_eq!(value["pubkeyFingerprint"], "ab".repeat(32));
        assert_eq!(value["ttlDays"], -31.0);
    }

    #[test]
    fn test_pretty_json_keeps_verify_error() {
        let out = render(&item(Some("unable to get local issuer certificate")), true, true);
        assert!(out.lines().count() > 1);
        assert!(out.contains("\n\t\"query\""));

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["verifyError"], "unable to get local issuer certificate");
    }
}
