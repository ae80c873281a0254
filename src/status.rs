use std::process::ExitCode;

use crate::error::ProbeError;
use crate::stats::Snapshot;

/// Exit codes do processo. 2 fica com o clap para erros de uso.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    NoReply = 1,
    Usage = 2,
    Resolution = 3,
    Permission = 4,
    Unreachable = 5,
    Fatal = 6,
}

impl ExitStatus {
    /// Sucesso com pelo menos uma resposta, ou encerramento limpo antes de
    /// qualquer envio.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        if snapshot.received > 0 || snapshot.sent == 0 {
            ExitStatus::Success
        } else if snapshot.unreachable > 0 {
            ExitStatus::Unreachable
        } else {
            ExitStatus::NoReply
        }
    }

    pub fn from_error(err: &ProbeError) -> Self {
        match err {
            ProbeError::Resolution { .. } => ExitStatus::Resolution,
            ProbeError::Permission { .. } => ExitStatus::Permission,
            ProbeError::InvalidConfig(_) => ExitStatus::Usage,
            ProbeError::Transport(_) => ExitStatus::Fatal,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status as u8)
    }
}
