//! Line-driven session controller.
//!
//! Every input line is either a flag directive (`-verify`, `- fullchain`,
//! ...) that toggles a setting, or a target to probe. Acknowledgements and
//! per-target failures go to the diagnostic writer, reports go to the sink.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use strum_macros::{Display, EnumString};

use crate::probe::Probe;
use crate::render::ReportSink;
use crate::report::report;

/// Leading character that marks a flag directive.
pub const DIRECTIVE_PREFIX: char = '-';

/// Session flags that can be toggled between queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Flag {
    Details,
    FullChain,
    Verify,
}

/// Mutable state of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub show_full_chain: bool,
    pub verify_chain: bool,
    pub show_detail: bool,
    /// Sampled once when the session starts; every query is judged against it.
    pub reference_time: DateTime<Utc>,
}

impl Settings {
    pub fn new(reference_time: DateTime<Utc>) -> Self {
        Settings {
            show_full_chain: false,
            verify_chain: false,
            show_detail: false,
            reference_time,
        }
    }

    /// Inverts `flag` and returns its new value.
    pub fn toggle(&mut self, flag: Flag) -> bool {
        let value = match flag {
            Flag::Details => &mut self.show_detail,
            Flag::FullChain => &mut self.show_full_chain,
            Flag::Verify => &mut self.verify_chain,
        };
        *value = !*value;
        *value
    }
}

/// Classification of a raw input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    /// Flag name following the prefix, trimmed but not yet validated.
    Directive(&'a str),
    Query(&'a str),
}

impl<'a> Line<'a> {
    /// The prefix must be the first character of the raw line.
    pub fn parse(raw: &'a str) -> Self {
        if let Some(name) = raw.strip_prefix(DIRECTIVE_PREFIX) {
            return Line::Directive(name.trim());
        }
        match raw.trim() {
            "" => Line::Blank,
            line => Line::Query(line),
        }
    }
}

/// Processes input lines one at a time against a probe.
#[derive(Debug)]
pub struct Session<P> {
    settings: Settings,
    probe: P,
}

impl<P: Probe> Session<P> {
    pub fn new(settings: Settings, probe: P) -> Self {
        Session { settings, probe }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Handles one line of input.
    ///
    /// Only failures to write to `sink` or `diag` are returned; probe and
    /// certificate errors are reported on `diag` and the session carries on.
    pub fn process_line(
        &mut self,
        line: &str,
        sink: &mut dyn ReportSink,
        diag: &mut dyn Write,
    ) -> io::Result<()> {
        match Line::parse(line) {
            Line::Blank => Ok(()),
            Line::Directive(name) => self.apply_directive(name, diag),
            Line::Query(target) => self.query(target, sink, diag),
        }
    }

    fn apply_directive(&mut self, name: &str, diag: &mut dyn Write) -> io::Result<()> {
        match name.parse::<Flag>() {
            Ok(flag) => {
                let value = self.settings.toggle(flag);
                writeln!(diag, "{} | {}", flag, value)
            }
            Err(_) => writeln!(diag, "{} | INVALID FLAG", name.to_lowercase()),
        }
    }

    fn query(
        &self,
        target: &str,
        sink: &mut dyn ReportSink,
        diag: &mut dyn Write,
    ) -> io::Result<()> {
        let chain = match self.probe.probe(target) {
            Ok(chain) => chain,
            Err(e) => {
                if !e.is_connection_error() {
                    warn!("{}: connected but no usable chain", target);
                }
                return writeln!(diag, "{} | {}", target, e);
            }
        };
        debug!("{}: peer presented {} certificate(s)", target, chain.len());

        let wanted = if self.settings.show_full_chain {
            chain.len()
        } else {
            1
        };

        for (index, cert) in chain.iter().enumerate().take(wanted) {
            match report(target, index, cert, &self.settings) {
                Ok(item) => sink.emit(&item, self.settings.show_detail)?,
                Err(e) => writeln!(diag, "{} | [{}] {}", target, index, e)?,
            }
        }
        Ok(())
    }
}
