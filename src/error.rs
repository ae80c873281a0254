use std::fmt;
use std::io;

use thiserror::Error;

/// Erros fatais da sessão: interrompem o programa e definem o exit code.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("cannot resolve {host}: {reason}")]
    Resolution { host: String, reason: String },

    #[error(
        "permission denied creating ICMP socket ({source}); run as root, grant CAP_NET_RAW \
         (setcap cap_net_raw+ep) or allow unprivileged ping via net.ipv4.ping_group_range"
    )]
    Permission {
        #[source]
        source: io::Error,
    },

    #[error("transport failure: {0}")]
    Transport(#[source] io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Falhas de envio/recepção reportadas pelo transporte. Apenas `Io` é fatal.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("receive deadline elapsed")]
    Timeout,

    #[error("destination {0} unreachable")]
    Unreachable(Unreachable),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Classifica um erro de I/O do SO: rotas inexistentes viram
    /// `Unreachable`, timeouts do SO viram `Timeout`, o resto é fatal.
    pub fn from_os(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::ENETUNREACH) => TransportError::Unreachable(Unreachable::Network),
            Some(libc::EHOSTUNREACH) => TransportError::Unreachable(Unreachable::Host),
            _ => match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::Timeout,
                _ => TransportError::Io(err),
            },
        }
    }
}

/// Motivo de um Destination Unreachable (ICMP type 3), pelo campo code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unreachable {
    Network,
    Host,
    Protocol,
    Port,
    FragmentationNeeded,
    AdministrativelyProhibited,
    Other(u8),
}

impl Unreachable {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 | 6 | 9 | 11 => Unreachable::Network,
            1 | 7 | 10 | 12 => Unreachable::Host,
            2 => Unreachable::Protocol,
            3 => Unreachable::Port,
            4 => Unreachable::FragmentationNeeded,
            13 => Unreachable::AdministrativelyProhibited,
            other => Unreachable::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Unreachable::Network => 0,
            Unreachable::Host => 1,
            Unreachable::Protocol => 2,
            Unreachable::Port => 3,
            Unreachable::FragmentationNeeded => 4,
            Unreachable::AdministrativelyProhibited => 13,
            Unreachable::Other(code) => *code,
        }
    }
}

impl fmt::Display for Unreachable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unreachable::Network => write!(f, "net"),
            Unreachable::Host => write!(f, "host"),
            Unreachable::Protocol => write!(f, "protocol"),
            Unreachable::Port => write!(f, "port"),
            Unreachable::FragmentationNeeded => write!(f, "fragmentation needed"),
            Unreachable::AdministrativelyProhibited => write!(f, "administratively prohibited"),
            Unreachable::Other(code) => write!(f, "code {code}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn os_errors_are_classified() {
        let err = io::Error::from_raw_os_error(libc::EHOSTUNREACH);
        assert!(matches!(
            TransportError::from_os(err),
            TransportError::Unreachable(Unreachable::Host)
        ));

        let err = io::Error::from_raw_os_error(libc::ENETUNREACH);
        assert!(matches!(
            TransportError::from_os(err),
            TransportError::Unreachable(Unreachable::Network)
        ));

        let err = io::Error::from(io::ErrorKind::WouldBlock);
        assert!(matches!(TransportError::from_os(err), TransportError::Timeout));

        let err = io::Error::from_raw_os_error(libc::EBADF);
        assert!(matches!(TransportError::from_os(err), TransportError::Io(_)));
    }

    #[test]
    fn unreachable_codes_round_trip() {
        for code in [0u8, 1, 2, 3, 4, 13, 5] {
            assert_eq!(Unreachable::from_code(code).code(), code);
        }
        assert_eq!(Unreachable::from_code(7), Unreachable::Host);
        assert_eq!(Unreachable::Port.to_string(), "port");
    }
}
