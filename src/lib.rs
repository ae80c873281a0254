//! Sonda de alcançabilidade ICMP: envia Echo Requests, casa as respostas
//! pelo identifier/sequence e acumula estatísticas de RTT e perda.

pub mod args;
pub mod error;
pub mod icmp;
pub mod probe;
pub mod report;
pub mod sequence;
pub mod stats;
pub mod status;
pub mod transport;

pub use error::{ProbeError, TransportError, Unreachable};
pub use probe::{CancelToken, Outcome, Probe, ProbeConfig, Session};
pub use stats::{Snapshot, Statistics};
pub use transport::{IcmpSocket, Target, Transport};
