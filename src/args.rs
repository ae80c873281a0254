use std::time::Duration;

use clap::Parser;

use crate::error::ProbeError;
use crate::icmp::MAX_PAYLOAD;
use crate::probe::ProbeConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send ICMP echo requests and report latency statistics")]
pub struct PingArgs {
    /// Host name or IPv4 address to probe
    pub target: String,

    /// Number of echo requests to send
    #[arg(
        short,
        long,
        default_value_t = 4,
        conflicts_with = "infinite",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub count: u64,

    /// Seconds between the start of consecutive probes
    #[arg(short, long, default_value_t = 1.0)]
    pub interval: f64,

    /// Seconds to wait for each reply
    #[arg(short, long, default_value_t = 1.0)]
    pub timeout: f64,

    /// Payload size in bytes
    #[arg(short, long, default_value_t = 56)]
    pub size: usize,

    /// Probe until interrupted with Ctrl+C
    #[arg(long)]
    pub infinite: bool,

    /// Only print the final summary
    #[arg(short, long)]
    pub quiet: bool,

    /// Print running statistics after every probe
    #[arg(long, conflicts_with = "quiet")]
    pub live: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Teto para --interval e --timeout: um dia.
pub const MAX_SECONDS: f64 = 86_400.0;

fn seconds(flag: &str, value: f64) -> Result<Duration, ProbeError> {
    if value > MAX_SECONDS {
        return Err(ProbeError::InvalidConfig(format!(
            "{flag} must be at most {MAX_SECONDS} seconds"
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|_| ProbeError::InvalidConfig(format!("{flag} must be a finite, non-negative number of seconds")))
}

impl PingArgs {
    /// Valida os valores e converte para a configuração do laço.
    pub fn probe_config(&self) -> Result<ProbeConfig, ProbeError> {
        let interval = seconds("--interval", self.interval)?;
        let timeout = seconds("--timeout", self.timeout)?;
        if timeout.is_zero() {
            return Err(ProbeError::InvalidConfig("--timeout must be greater than zero".to_string()));
        }
        if self.size > MAX_PAYLOAD {
            return Err(ProbeError::InvalidConfig(format!(
                "--size must be at most {MAX_PAYLOAD} bytes"
            )));
        }

        Ok(ProbeConfig {
            count: if self.infinite { None } else { Some(self.count) },
            interval,
            timeout,
            payload_size: self.size,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Result<PingArgs, clap::Error> {
        PingArgs::try_parse_from(std::iter::once("pingrs").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let args = parse(&["example.com"]).unwrap();
        assert_eq!(args.probe_config().unwrap(), ProbeConfig::default());
        assert_eq!(args.target, "example.com");
    }

    #[test]
    fn all_flags() {
        let args = parse(&["-c", "10", "-i", "0.5", "-t", "2", "-s", "100", "192.0.2.1"]).unwrap();
        let config = args.probe_config().unwrap();
        assert_eq!(config.count, Some(10));
        assert_eq!(config.interval, Duration::from_millis(500));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.payload_size, 100);
    }

    #[test]
    fn infinite_has_no_count() {
        let args = parse(&["--infinite", "example.com"]).unwrap();
        assert_eq!(args.probe_config().unwrap().count, None);
    }

    #[test]
    fn count_conflicts_with_infinite() {
        assert!(parse(&["-c", "3", "--infinite", "example.com"]).is_err());
    }

    #[test]
    fn count_must_be_positive() {
        assert!(parse(&["-c", "0", "example.com"]).is_err());
    }

    #[test]
    fn target_is_required() {
        assert!(parse(&["-c", "3"]).is_err());
    }

    #[test]
    fn invalid_durations_are_rejected() {
        let args = parse(&["-t", "0", "example.com"]).unwrap();
        assert!(matches!(args.probe_config(), Err(ProbeError::InvalidConfig(_))));

        let args = parse(&["--interval=-1", "example.com"]).unwrap();
        assert!(matches!(args.probe_config(), Err(ProbeError::InvalidConfig(_))));

        let args = parse(&["-i", "0", "example.com"]).unwrap();
        assert_eq!(args.probe_config().unwrap().interval, Duration::ZERO);
    }

    #[test]
    fn huge_durations_are_rejected() {
        let args = parse(&["-c", "1", "-t", "10000000000000000000", "192.0.2.1"]).unwrap();
        assert!(matches!(args.probe_config(), Err(ProbeError::InvalidConfig(_))));

        let args = parse(&["-i", "86401", "192.0.2.1"]).unwrap();
        assert!(matches!(args.probe_config(), Err(ProbeError::InvalidConfig(_))));

        let args = parse(&["-t", "86400", "192.0.2.1"]).unwrap();
        assert_eq!(args.probe_config().unwrap().timeout, Duration::from_secs(86_400));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let args = parse(&["-s", "65508", "example.com"]).unwrap();
        assert!(matches!(args.probe_config(), Err(ProbeError::InvalidConfig(_))));

        let args = parse(&["-s", "65507", "example.com"]).unwrap();
        assert!(args.probe_config().is_ok());
    }
}
