use std::time::Duration;

use chrono::{DateTime, Local};

use crate::probe::Outcome;
use crate::stats::{Record, Snapshot, Statistics};
use crate::transport::Target;

/// Recebe cada resultado assim que é registrado.
pub trait Reporter {
    fn on_probe(&mut self, record: &Record, stats: &Statistics);
}

/// Saída em texto puro no stdout: uma linha por sonda e o resumo no fim.
pub struct ConsoleReporter {
    target: Target,
    quiet: bool,
    live: bool,
}

impl ConsoleReporter {
    pub fn new(target: Target, quiet: bool, live: bool) -> Self {
        Self {
            target,
            quiet,
            live,
        }
    }

    pub fn started(&self, payload_size: usize) {
        if !self.quiet {
            println!(
                "PING {} ({}): {} data bytes",
                self.target.host, self.target.addr, payload_size
            );
        }
    }

    pub fn interrupted(&self) {
        println!("\nPing interrupted.");
    }

    pub fn summary(&self, snapshot: &Snapshot) {
        println!("\n{}", format_summary(&self.target.host, snapshot));
    }
}

impl Reporter for ConsoleReporter {
    fn on_probe(&mut self, record: &Record, stats: &Statistics) {
        if self.quiet {
            return;
        }
        println!("{}", format_record(&self.target, record, Local::now()));
        if self.live {
            println!("    {}", format_live(&stats.summarize()));
        }
    }
}

fn millis(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64() * 1000.0)
}

pub fn format_record(target: &Target, record: &Record, now: DateTime<Local>) -> String {
    let stamp = now.format("%H:%M:%S");
    let seq = record.sequence;
    match &record.outcome {
        Outcome::Success { rtt, bytes } => format!(
            "{stamp} - Reply from {} ({}): icmp_seq={seq} bytes={bytes} time={} ms",
            target.host,
            target.addr,
            millis(*rtt)
        ),
        Outcome::Timeout => format!("{stamp} - Request timed out: icmp_seq={seq}"),
        Outcome::Unreachable(reason) => {
            format!("{stamp} - Destination {reason} unreachable: icmp_seq={seq}")
        }
        Outcome::TransportError(cause) => {
            format!("{stamp} - Transport error: {cause}: icmp_seq={seq}")
        }
    }
}

fn format_rtt_line(snapshot: &Snapshot) -> String {
    match (snapshot.min, snapshot.avg, snapshot.max, snapshot.jitter) {
        (Some(min), Some(avg), Some(max), Some(jitter)) => format!(
            "rtt min/avg/max/jitter = {}/{}/{}/{} ms",
            millis(min),
            millis(avg),
            millis(max),
            millis(jitter)
        ),
        _ => "rtt min/avg/max/jitter = N/A".to_string(),
    }
}

/// Linha curta com as estatísticas correntes (modo `--live`).
pub fn format_live(snapshot: &Snapshot) -> String {
    let avg = snapshot
        .avg
        .map(|avg| format!("{} ms", millis(avg)))
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "sent={} received={} loss={:.2}% avg={avg}",
        snapshot.sent,
        snapshot.received,
        snapshot.loss_percent()
    )
}

pub fn format_summary(host: &str, snapshot: &Snapshot) -> String {
    format!(
        "--- {host} ping statistics ---\n\
         {} packets transmitted, {} received, {} lost, {:.2}% packet loss\n\
         {} timed out, {} unreachable, {} transport errors\n\
         {}",
        snapshot.sent,
        snapshot.received,
        snapshot.lost(),
        snapshot.loss_percent(),
        snapshot.timeouts,
        snapshot.unreachable,
        snapshot.transport_errors,
        format_rtt_line(snapshot)
    )
}
