// Tratamento de erros ergonômico
use anyhow::{Context, Result};

use clap::Parser;
use log::debug;
use std::process::ExitCode;

use pingrs::args::PingArgs;
use pingrs::report::ConsoleReporter;
use pingrs::status::ExitStatus;
use pingrs::{CancelToken, IcmpSocket, ProbeError, Session};

/// Envia Echo Requests e aguarda os Echo Replies.
/// Sem root, usa o socket ICMP DGRAM quando o SO permite.
fn main() -> ExitCode {
    let args = PingArgs::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(status) => status.into(),
        Err(err) => {
            debug!("fatal: {err:?}");
            eprintln!("pingrs: {err:#}");
            err.downcast_ref::<ProbeError>()
                .map_or(ExitStatus::Fatal, ExitStatus::from_error)
                .into()
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(args: PingArgs) -> Result<ExitStatus> {
    let config = args.probe_config()?;

    // Configura handler para Ctrl+C
    let cancel = CancelToken::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || handler.cancel()).context("failed to install Ctrl+C handler")?;

    // Identificador: usa o PID do processo (comum em pings)
    let requested_id = std::process::id() as u16;
    let socket = IcmpSocket::open(&args.target, requested_id)?;
    let identifier = socket.identifier();

    let reporter_target = socket.target().clone();
    let mut reporter = ConsoleReporter::new(reporter_target, args.quiet, args.live);
    reporter.started(config.payload_size);

    let mut session = Session::new(socket, identifier, config);
    let outcome = session.run(&cancel, &mut reporter);
    let snapshot = session.statistics().summarize();
    // Fecha o socket antes de imprimir o resumo
    drop(session);
    debug!("socket released");

    if cancel.is_cancelled() {
        reporter.interrupted();
    }
    reporter.summary(&snapshot);

    outcome?;
    Ok(ExitStatus::from_snapshot(&snapshot))
}
