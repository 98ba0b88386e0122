//! Debug Transport Module (DTM) / DMI transport.
//!
//! Version-agnostic `read`/`write` against a DM register address space,
//! with busy-retry, idle-cycle auto-tuning and bus reset folded in. The
//! JTAG and RVSWD physical encodings live in [`jtag`] and [`rvswd`]; this
//! module only knows about the version-agnostic contract and the
//! busy-handling algorithm, dispatched through the [`DmiBackend`] tagged
//! enum, a tagged-enum dispatch rather than a function-pointer variant
//! abstraction.

pub mod jtag;
pub mod rvswd;

use crate::error::{DmiOperationStatus, RiscvError};
use crate::transport::{JtagAccess, RvswdAccess};

/// DMI protocol version, detected from `dtmcs.version` (JTAG) or assumed
/// for RVSWD (which has no equivalent negotiation field).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DebugModuleVersion {
    Unknown,
    /// Recognized but not implemented (v0.11).
    Unimplemented,
    V0_13,
    V1_0,
}

/// Last DMI transaction outcome, kept on [`Dmi`] for collaborator queries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DmiFault {
    Success,
    Failure,
    Busy,
}

/// Idle cycles are capped here; one more busy result after reaching the
/// cap is escalated to failure.
pub const MAX_IDLE_CYCLES: u8 = 8;

/// Which physical transport backs this DMI bus.
///
/// Tagged-enum dispatch replacing the source's function-pointer variant
/// abstraction.
pub enum DmiBackend {
    Jtag(jtag::JtagDmi<Box<dyn JtagAccess>>),
    Rvswd(rvswd::RvswdDmi<Box<dyn RvswdAccess>>),
}

/// A single DMI bus, as addressed by [`crate::dm::DebugModule`]s that
/// share it.
pub struct Dmi {
    backend: DmiBackend,
    version: DebugModuleVersion,
    idle_cycles: u8,
    address_width: u32,
    fault: DmiFault,
    designer_code: Option<jep106::JEP106Code>,
}

impl Dmi {
    /// Probe the transport and bring up a DMI bus. Once `dtmcs.version`
    /// comes back unknown or unimplemented, the DMI is discarded and no
    /// DM is ever created on top of it.
    pub fn new_jtag(probe: Box<dyn JtagAccess>) -> crate::error::Result<Self> {
        let mut jtag = jtag::JtagDmi::new(probe)?;
        let (version, idle_cycles, address_width) = jtag.read_dtmcs()?;

        match version {
            DebugModuleVersion::Unknown => {
                tracing::warn!("v0.11 not presently supported");
                return Err(RiscvError::NoRiscvTarget);
            }
            DebugModuleVersion::Unimplemented => return Err(RiscvError::NoRiscvTarget),
            _ => {}
        }

        Ok(Self {
            backend: DmiBackend::Jtag(jtag),
            version,
            idle_cycles,
            address_width,
            fault: DmiFault::Success,
            designer_code: None,
        })
    }

    pub fn new_rvswd(probe: Box<dyn RvswdAccess>) -> crate::error::Result<Self> {
        let rvswd = rvswd::RvswdDmi::new(probe);
        Ok(Self {
            backend: DmiBackend::Rvswd(rvswd),
            // RVSWD has no dtmcs-equivalent negotiation; assume v0.13.
            version: DebugModuleVersion::V0_13,
            idle_cycles: 0,
            address_width: 8,
            fault: DmiFault::Success,
            designer_code: None,
        })
    }

    pub fn version(&self) -> DebugModuleVersion {
        self.version
    }

    pub fn fault(&self) -> DmiFault {
        self.fault
    }

    pub fn idle_cycles(&self) -> u8 {
        self.idle_cycles
    }

    pub fn address_width(&self) -> u32 {
        self.address_width
    }

    pub fn designer_code(&self) -> Option<jep106::JEP106Code> {
        self.designer_code
    }

    pub fn set_designer_code(&mut self, code: jep106::JEP106Code) {
        self.designer_code = code.into();
    }

    /// Re-select the DMI IR / put the bus in a known-good state after a
    /// prior detach or bypass period.
    pub fn prepare(&mut self) -> crate::error::Result<()> {
        match &mut self.backend {
            DmiBackend::Jtag(jtag) => jtag.select_dmi()?,
            DmiBackend::Rvswd(_) => {}
        }
        Ok(())
    }

    /// Put the bus into a quiescent state before detaching.
    pub fn quiesce(&mut self) -> crate::error::Result<()> {
        match &mut self.backend {
            DmiBackend::Jtag(jtag) => jtag.select_bypass()?,
            DmiBackend::Rvswd(_) => {}
        }
        Ok(())
    }

    /// Issue a read against the DMI address space, applying the
    /// busy-retry algorithm.
    pub fn read(&mut self, address: u64) -> crate::error::Result<u32> {
        self.transact(address, 0, DmiOp::Read)
    }

    /// Issue a write against the DMI address space.
    pub fn write(&mut self, address: u64, value: u32) -> crate::error::Result<()> {
        self.transact(address, value, DmiOp::Write)?;
        Ok(())
    }

    fn transact(&mut self, address: u64, value: u32, op: DmiOp) -> crate::error::Result<u32> {
        loop {
            let status = match &mut self.backend {
                DmiBackend::Jtag(jtag) => jtag.shift(address, value, op, self.idle_cycles)?,
                DmiBackend::Rvswd(rvswd) => rvswd.shift(address, value, op)?,
            };

            match status {
                Ok(value) => {
                    self.fault = DmiFault::Success;
                    return Ok(value);
                }
                Err(DmiOperationStatus::Busy) => {
                    self.fault = DmiFault::Busy;
                    if self.idle_cycles >= MAX_IDLE_CYCLES {
                        // idle_cycles already at cap, busy recurring is
                        // escalated to failure.
                        self.fault = DmiFault::Failure;
                        self.dmi_reset()?;
                        return Err(RiscvError::DmiBusyExhausted);
                    }
                    self.idle_cycles += 1;
                    tracing::warn!(idle_cycles = self.idle_cycles, "DMI busy, retrying");
                    self.dmi_reset()?;
                }
                Err(DmiOperationStatus::Failure) | Err(DmiOperationStatus::Reserved) => {
                    self.fault = DmiFault::Failure;
                    self.dmi_reset()?;
                    return Err(RiscvError::DmiFailure);
                }
                Err(DmiOperationStatus::Success) => {
                    unreachable!("raw_shift never returns Err(Success)")
                }
            }
        }
    }

    fn dmi_reset(&mut self) -> crate::error::Result<()> {
        match &mut self.backend {
            DmiBackend::Jtag(jtag) => jtag.dmi_reset(),
            DmiBackend::Rvswd(rvswd) => rvswd.dmi_reset(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DmiOp {
    NoOp = 0,
    Read = 1,
    Write = 2,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::fake::FakeJtag;

    fn dtmcs_reply(version: u32, abits: u32, idle: u32) -> Vec<u8> {
        let raw = (idle << 12) | (abits << 4) | version;
        raw.to_le_bytes().to_vec()
    }

    #[test]
    fn new_jtag_rejects_v0_11() {
        let mut probe = FakeJtag::default();
        probe.replies.push_back(dtmcs_reply(0, 7, 5));
        let result = Dmi::new_jtag(Box::new(probe));
        assert!(matches!(result, Err(RiscvError::NoRiscvTarget)));
    }

    #[test]
    fn new_jtag_accepts_v0_13() {
        let mut probe = FakeJtag::default();
        probe.replies.push_back(dtmcs_reply(1, 7, 5));
        let dmi = Dmi::new_jtag(Box::new(probe)).expect("should recognize v0.13");
        assert_eq!(dmi.version(), DebugModuleVersion::V0_13);
        assert_eq!(dmi.idle_cycles(), 5);
        assert_eq!(dmi.address_width(), 7);
    }
}
