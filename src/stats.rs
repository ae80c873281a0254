use std::collections::VecDeque;
use std::time::Duration;

use crate::probe::Outcome;

/// Quantos resultados recentes ficam guardados para exibição.
pub const HISTORY_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub sequence: u16,
    pub outcome: Outcome,
}

/// Estado incremental das estatísticas de RTT. Memória fixa: média e
/// variância pelo método de Welford, histórico limitado a `HISTORY_LEN`.
#[derive(Debug, Default)]
pub struct Statistics {
    sent: u64,
    received: u64,
    timeouts: u64,
    unreachable: u64,
    transport_errors: u64,
    min: Option<Duration>,
    max: Option<Duration>,
    sum: Duration,
    // Welford, em segundos
    mean: f64,
    m2: f64,
    history: VecDeque<Record>,
}

/// Leitura imutável das estatísticas num instante qualquer.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub sent: u64,
    pub received: u64,
    pub timeouts: u64,
    pub unreachable: u64,
    pub transport_errors: u64,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
    pub sum: Duration,
    pub avg: Option<Duration>,
    pub jitter: Option<Duration>,
    pub recent: Vec<Record>,
}

impl Snapshot {
    pub fn lost(&self) -> u64 {
        self.sent - self.received
    }

    /// (sent - received) / sent * 100, zero quando nada foi enviado.
    pub fn loss_percent(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        self.lost() as f64 / self.sent as f64 * 100.0
    }
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sequence: u16, outcome: Outcome) {
        self.sent += 1;
        match &outcome {
            Outcome::Success { rtt, .. } => self.update_rtt(*rtt),
            Outcome::Timeout => self.timeouts += 1,
            Outcome::Unreachable(_) => self.unreachable += 1,
            Outcome::TransportError(_) => self.transport_errors += 1,
        }

        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(Record { sequence, outcome });
    }

    fn update_rtt(&mut self, rtt: Duration) {
        self.received += 1;
        self.sum += rtt;
        self.min = Some(self.min.map_or(rtt, |min| min.min(rtt)));
        self.max = Some(self.max.map_or(rtt, |max| max.max(rtt)));

        let value = rtt.as_secs_f64();
        let old_mean = self.mean;
        self.mean = old_mean + (value - old_mean) / self.received as f64;
        self.m2 += (value - old_mean) * (value - self.mean);
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn summarize(&self) -> Snapshot {
        let (avg, jitter) = if self.received == 0 {
            (None, None)
        } else {
            let avg = Duration::from_nanos((self.sum.as_nanos() / self.received as u128) as u64);
            let variance = (self.m2 / self.received as f64).max(0.0);
            (Some(avg), Some(Duration::from_secs_f64(variance.sqrt())))
        };

        Snapshot {
            sent: self.sent,
            received: self.received,
            timeouts: self.timeouts,
            unreachable: self.unreachable,
            transport_errors: self.transport_errors,
            min: self.min,
            max: self.max,
            sum: self.sum,
            avg,
            jitter,
            recent: self.history.iter().cloned().collect(),
        }
    }
}
