use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Parser;
use log::{info, warn};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tlschk::config::{Config, DEFAULT_CONFIG_FILE};
use tlschk::{Probe, ReportSink, Session, TlsProbe, WriterSink};

const PROMPT: &str = "> ";

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Start with full certificate details in JSON format
    #[arg(long)]
    detail: bool,
    /// Start reporting every certificate in the chain
    #[arg(long)]
    fullchain: bool,
    /// Start verifying certificates against the system trust roots
    #[arg(long)]
    verify: bool,
    /// Connect and handshake timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Configuration file [default: ./tlschk.toml if present]
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Print an example configuration file and exit
    #[arg(long)]
    example_config: bool,
    /// Targets (host:port) or flag directives (-verify) processed in order;
    /// reads from an interactive prompt when none are given
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    targets: Vec<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    if cli.example_config {
        print!("{}", Config::example_toml());
        return Ok(());
    }

    let config = Config::builtin()
        .merge_with(load_config(cli.config.as_deref())?)
        .merge_with(Config::from_cli_args(
            cli.targets,
            cli.detail,
            cli.fullchain,
            cli.verify,
            cli.timeout,
        ));
    config.validate()?;

    let settings = config.settings(Utc::now());
    info!(
        "reference time {}, fullchain={} verify={} details={}",
        settings.reference_time, settings.show_full_chain, settings.verify_chain, settings.show_detail
    );

    let mut session = Session::new(settings, TlsProbe::new(config.timeout()));
    let mut sink = WriterSink::new(io::stdout(), atty::is(atty::Stream::Stdout));
    let mut diag = io::stderr();

    match config.targets {
        Some(targets) => {
            for line in &targets {
                session.process_line(line, &mut sink, &mut diag)?;
            }
            Ok(())
        }
        None => repl(&mut session, &mut sink, &mut diag),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn Error>> {
    if let Some(path) = path {
        return Ok(Config::from_file(path)?);
    }

    let default = Path::new(DEFAULT_CONFIG_FILE);
    if !default.exists() {
        return Ok(Config::default());
    }
    match Config::from_file(default) {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!("ignoring {}: {}", DEFAULT_CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}

fn repl<P: Probe>(
    session: &mut Session<P>,
    sink: &mut dyn ReportSink,
    diag: &mut dyn io::Write,
) -> Result<(), Box<dyn Error>> {
    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    editor.add_history_entry(line.as_str())?;
                }
                session.process_line(&line, sink, diag)?;
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                info!("input closed");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}
