use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, trace};

use crate::error::{ProbeError, TransportError, Unreachable};
use crate::icmp::{self, FrameKind};
use crate::report::Reporter;
use crate::sequence::SequenceTracker;
use crate::stats::{Record, Statistics};
use crate::transport::Transport;

/// Uma sonda em voo. Criada imediatamente antes do envio.
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub sequence: u16,
    pub identifier: u16,
    pub sent_at: Instant,
}

/// Resultado de uma sonda, consumido uma única vez pelas estatísticas.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { rtt: Duration, bytes: usize },
    Timeout,
    Unreachable(Unreachable),
    TransportError(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    /// `None` = infinito, só o cancelamento encerra.
    pub count: Option<u64>,
    pub interval: Duration,
    pub timeout: Duration,
    pub payload_size: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            count: Some(4),
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(1),
            payload_size: 56,
        }
    }
}

/// Pedido de cancelamento (Ctrl+C). Verificado no topo de cada iteração.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sessão de sondagem: envia, espera a resposta casada ou o prazo, registra
/// e dorme o resto do intervalo. Uma sonda pendente por vez.
pub struct Session<T: Transport> {
    transport: T,
    config: ProbeConfig,
    tracker: SequenceTracker,
    stats: Statistics,
    payload: Vec<u8>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, identifier: u16, config: ProbeConfig) -> Self {
        let payload = icmp::fill_payload(config.payload_size);
        Self {
            transport,
            config,
            tracker: SequenceTracker::new(identifier),
            stats: Statistics::new(),
            payload,
        }
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    fn count_reached(&self) -> bool {
        self.config
            .count
            .is_some_and(|count| self.stats.sent() >= count)
    }

    /// Roda até atingir `count` ou até o cancelamento. Um erro fatal de
    /// transporte é registrado, encerra o laço e é devolvido ao chamador.
    pub fn run(&mut self, cancel: &CancelToken, reporter: &mut dyn Reporter) -> Result<(), ProbeError> {
        info!(
            "probing with identifier {}, count {:?}, interval {:?}, timeout {:?}",
            self.tracker.identifier(),
            self.config.count,
            self.config.interval,
            self.config.timeout
        );

        loop {
            if cancel.is_cancelled() {
                debug!("cancelled after {} probes", self.stats.sent());
                break;
            }
            if self.count_reached() {
                break;
            }

            let started = Instant::now();
            let (sequence, result) = self.probe_once();

            let (outcome, fatal) = match result {
                Ok(outcome) => (outcome, None),
                Err(e) => (Outcome::TransportError(e.to_string()), Some(e)),
            };
            trace!("icmp_seq={sequence} -> {outcome:?}");
            self.stats.record(sequence, outcome.clone());
            reporter.on_probe(&Record { sequence, outcome }, &self.stats);

            if let Some(e) = fatal {
                return Err(ProbeError::Transport(e));
            }

            if cancel.is_cancelled() || self.count_reached() {
                continue;
            }

            // Dorme o que sobrar do intervalo, nunca negativo
            let remaining = self.config.interval.saturating_sub(started.elapsed());
            if !remaining.is_zero() {
                thread::sleep(remaining);
            }
        }

        Ok(())
    }

    /// Sending -> AwaitingReply -> resultado. A sonda é aposentada em
    /// qualquer caso.
    fn probe_once(&mut self) -> (u16, io::Result<Outcome>) {
        let sequence = self.tracker.next();
        let frame = icmp::encode(self.tracker.identifier(), sequence, &self.payload);

        // Marca o instante do envio para calcular o RTT depois
        let probe = Probe {
            sequence,
            identifier: self.tracker.identifier(),
            sent_at: Instant::now(),
        };

        let result = match self.transport.send(&frame) {
            Ok(()) => self.await_reply(&probe),
            Err(e) => settle(e),
        };
        self.tracker.retire(sequence);

        (sequence, result)
    }

    fn await_reply(&mut self, probe: &Probe) -> io::Result<Outcome> {
        let deadline = deadline_for(probe.sent_at, self.config.timeout);

        loop {
            let datagram = match self.transport.receive(deadline) {
                Ok(datagram) => datagram,
                Err(e) => return settle(e),
            };
            let received_at = Instant::now();

            let frame = match icmp::decode(icmp::strip_ipv4_header(&datagram)) {
                Ok(frame) => frame,
                Err(e) => {
                    debug!("discarding inbound frame: {e}");
                    continue;
                }
            };

            match frame.kind() {
                FrameKind::EchoReply if self.tracker.matches(frame.identifier, frame.sequence) => {
                    return Ok(Outcome::Success {
                        rtt: received_at.saturating_duration_since(probe.sent_at),
                        bytes: frame.wire_len(),
                    });
                }
                FrameKind::DestinationUnreachable => match icmp::quoted_echo(&frame.payload) {
                    Some((id, seq)) if self.tracker.matches(id, seq) => {
                        return Ok(Outcome::Unreachable(Unreachable::from_code(frame.code)));
                    }
                    _ => trace!("ignoring unreachable for another probe"),
                },
                kind => trace!(
                    "ignoring {kind:?} id={} seq={}",
                    frame.identifier,
                    frame.sequence
                ),
            }
        }
    }
}

/// Prazo máximo de espera quando `sent_at + timeout` não cabe num `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 86_400);

fn deadline_for(sent_at: Instant, timeout: Duration) -> Instant {
    sent_at
        .checked_add(timeout)
        .or_else(|| sent_at.checked_add(FAR_FUTURE))
        .unwrap_or(sent_at)
}

/// Falhas não fatais viram resultado; `Io` sobe como erro.
fn settle(err: TransportError) -> io::Result<Outcome> {
    match err {
        TransportError::Timeout => Ok(Outcome::Timeout),
        TransportError::Unreachable(reason) => Ok(Outcome::Unreachable(reason)),
        TransportError::Io(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let handler = token.clone();
        assert!(!token.is_cancelled());
        handler.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn transport_failures_settle_into_outcomes() {
        assert_eq!(settle(TransportError::Timeout).unwrap(), Outcome::Timeout);
        assert_eq!(
            settle(TransportError::Unreachable(Unreachable::Host)).unwrap(),
            Outcome::Unreachable(Unreachable::Host)
        );
        assert!(settle(TransportError::Io(io::Error::from(io::ErrorKind::BrokenPipe))).is_err());
    }

    #[test]
    fn deadline_never_overflows() {
        let now = Instant::now();
        assert_eq!(deadline_for(now, Duration::from_secs(2)), now + Duration::from_secs(2));
        assert!(deadline_for(now, Duration::MAX) > now);
    }

    #[test]
    fn default_config_matches_cli_defaults() {
        let config = ProbeConfig::default();
        assert_eq!(config.count, Some(4));
        assert_eq!(config.payload_size, 56);
    }
}
