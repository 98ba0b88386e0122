//! Error types for the RISC-V external debug core.

use thiserror::Error;

/// Status mapped from a hart's `abstractcs.cmderr` field.
///
/// Stored on [`crate::hart::Hart`] rather than raised as a [`RiscvError`]
/// in the common case: the core never retries hart-level errors on the
/// caller's behalf, it only records them for `check_error`-style queries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum HartStatus {
    #[default]
    NoError,
    Busy,
    Unsupported,
    Exception,
    WrongState,
    BusError,
    Other,
}

impl HartStatus {
    /// Map a 3-bit `cmderr` field to a status.
    pub fn from_cmderr(cmderr: u8) -> Self {
        match cmderr {
            0 => HartStatus::NoError,
            1 => HartStatus::Busy,
            2 => HartStatus::Unsupported,
            3 => HartStatus::Exception,
            4 => HartStatus::WrongState,
            5 => HartStatus::BusError,
            _ => HartStatus::Other,
        }
    }
}

/// The result of a single DMI-level shift, before busy-retry is applied.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DmiOperationStatus {
    Success,
    /// Reserved encoding; treated as a failure.
    Reserved,
    Failure,
    Busy,
}

impl DmiOperationStatus {
    pub fn parse(op: u8) -> Self {
        match op {
            0 => DmiOperationStatus::Success,
            1 => DmiOperationStatus::Reserved,
            2 => DmiOperationStatus::Failure,
            3 => DmiOperationStatus::Busy,
            _ => unreachable!("op field is 2 bits wide"),
        }
    }
}

/// Top-level error type for this crate.
#[derive(Debug, Error)]
pub enum RiscvError {
    #[error("physical transport produced no response")]
    DmiNoResponse,

    #[error("DMI transaction failed and could not be recovered")]
    DmiFailure,

    #[error("DMI busy retry exhausted idle_cycles cap of 8")]
    DmiBusyExhausted,

    #[error("no RISC-V target detected behind this transport")]
    NoRiscvTarget,

    #[error("unsupported debug transport module version: {0}")]
    UnsupportedVersion(u8),

    #[error("operation timed out")]
    Timeout,

    #[error("hart reported error status: {0:?}")]
    HartStatus(HartStatus),

    #[error("RVSWD reply code indicated failure: {0}")]
    RvswdStatusError(u8),

    #[error("DM chain revisited base {0:#x}, aborting enumeration")]
    DmChainCycle(u64),

    #[error("hart_index {0} exceeds 2^20 - 1")]
    HartIndexOutOfRange(u32),

    #[error(transparent)]
    Probe(#[from] crate::transport::ProbeError),
}

pub type Result<T> = std::result::Result<T, RiscvError>;
