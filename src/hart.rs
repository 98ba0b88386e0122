//! Per-hart probe, CSR/memory access, and execution control.

use crate::csr::{self, Extensions, Xlen};
use crate::dm::DmWindow;
use crate::error::{HartStatus, Result, RiscvError};
use crate::registers::{
    data_register, AccessMemoryCommand, AccessRegisterCommand, Abstractcs, Dcsr, Dmcontrol,
    Dmstatus,
};

/// Coarse hart lifecycle state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HartState {
    Unknown,
    Halted,
    Running,
}

/// An explicit `(width, register)` pair, replacing the source's
/// OR-magic-bits-into-regno trick.
#[derive(Copy, Clone, Debug)]
pub struct ForcedWidth(pub Option<u8>);

impl ForcedWidth {
    pub const NATIVE: ForcedWidth = ForcedWidth(None);

    pub fn bits(&self, native: u8) -> u8 {
        self.0.unwrap_or(native)
    }
}

pub struct Hart {
    pub hart_index: u32,
    /// Pre-computed `dmcontrol` value selecting this hart with
    /// `dmactive` set.
    hartsel_control: u32,
    pub access_width: u8,
    pub address_width: u8,
    pub status: HartStatus,
    pub extensions: Extensions,
    pub vendor_id: u32,
    /// `mvendorid` if nonzero, else the transport-IDCODE-derived JEP-106
    /// code.
    pub designer_code: u32,
    pub arch_id: u32,
    pub impl_id: u32,
    pub hart_id: u32,
    pub triggers: u8,
    pub trigger_uses: [crate::trigger::TriggerUse; 8],
    pub state: HartState,
}

const CMDERR_CLEAR: u32 = 0x7;

impl Hart {
    /// Create and discover a hart at `hart_index` on the DM addressed by
    /// `window`. Returns `Ok(None)` if the hart exists but
    /// fails discovery persistently at every width (not a hard error, a
    /// hart the caller should simply not register).
    pub fn probe(window: &mut DmWindow, hart_index: u32) -> Result<Option<Hart>> {
        if hart_index >= 1 << 20 {
            return Err(RiscvError::HartIndexOutOfRange(hart_index));
        }

        let mut hartsel = Dmcontrol(0);
        hartsel.set_dmactive(true);
        hartsel.set_hartsel(hart_index);
        let hartsel_control = hartsel.0;

        let mut hart = Hart {
            hart_index,
            hartsel_control,
            access_width: 0,
            address_width: 0,
            status: HartStatus::NoError,
            extensions: Extensions(0),
            vendor_id: 0,
            designer_code: 0,
            arch_id: 0,
            impl_id: 0,
            hart_id: 0,
            triggers: 0,
            trigger_uses: Default::default(),
            state: HartState::Unknown,
        };

        hart.halt(window)?;

        // Step 1: abstractcs.datacount tells us the assumed native width.
        let abstractcs = Abstractcs(window.read(Abstractcs::ADDRESS)?);
        let mut width = match abstractcs.datacount() {
            1 => 32,
            2 => 64,
            4 => 128,
            _ => 32,
        };

        // Step 2: read misa at the assumed width, downgrading on failure.
        let misa = loop {
            match hart.abstract_read_register(window, csr::MISA, ForcedWidth(Some(width))) {
                Ok(value) => break Some(value),
                Err(RiscvError::HartStatus(HartStatus::Exception))
                | Err(RiscvError::HartStatus(HartStatus::BusError)) => {
                    width = match width {
                        128 => 64,
                        64 => 32,
                        _ => break None,
                    };
                }
                Err(other) => return Err(other),
            }
        };

        let Some(misa) = misa else {
            tracing::warn!(hart_index, "misa read failed at all widths, dropping hart");
            return Ok(None);
        };

        hart.access_width = width;

        // Step 3: XLEN + extensions.
        match Xlen::from_misa(misa, width) {
            Some(Xlen::Rv128) => {
                // Unsupported access width: mark inactive rather than
                // error out, so other harts on the same DM stay usable.
                tracing::warn!(hart_index, "rv128 unsupported, marking hart inactive");
                hart.access_width = 0;
                return Ok(Some(hart));
            }
            Some(xlen) => hart.address_width = xlen.bits(),
            None => hart.address_width = width,
        }
        hart.extensions = Extensions::from_misa(misa);

        // Step 4: vendor/arch/impl/hart id, all forced 32-bit.
        hart.vendor_id =
            hart.abstract_read_register(window, csr::MVENDORID, ForcedWidth(Some(32)))? as u32;
        hart.arch_id =
            hart.abstract_read_register(window, csr::MARCHID, ForcedWidth(Some(32)))? as u32;
        hart.impl_id =
            hart.abstract_read_register(window, csr::MIMPLID, ForcedWidth(Some(32)))? as u32;
        hart.hart_id =
            hart.abstract_read_register(window, csr::MHARTID, ForcedWidth(Some(32)))? as u32;

        hart.designer_code = if hart.vendor_id != 0 {
            hart.vendor_id
        } else {
            window
                .dmi()
                .designer_code()
                .map(|code| csr::mvendorid_from_jep106(code.cc as u32, code.id as u32))
                .unwrap_or(0)
        };

        // Step 7: vendor hook, step 8: resume, are driven by the caller
        // (crate::vendor / top-level discovery) once all harts in a DM
        // are known, matching the discovery-then-activate ordering.

        Ok(Some(hart))
    }

    fn select(&self, window: &mut DmWindow) -> Result<()> {
        window.write(Dmcontrol::ADDRESS, self.hartsel_control)
    }

    /// Abstract Command register access read.
    pub fn abstract_read_register(
        &mut self,
        window: &mut DmWindow,
        regno: u16,
        width: ForcedWidth,
    ) -> Result<u64> {
        self.select(window)?;
        self.issue_register_command(window, regno, width, false)?;
        self.read_data_words(window, width.bits(self.access_width))
    }

    /// Abstract Command register access write.
    pub fn abstract_write_register(
        &mut self,
        window: &mut DmWindow,
        regno: u16,
        value: u64,
        width: ForcedWidth,
    ) -> Result<()> {
        self.select(window)?;
        self.write_data_words(window, width.bits(self.access_width), value)?;
        self.issue_register_command(window, regno, width, true)
    }

    fn aarsize(width: u8) -> u32 {
        match width {
            32 => 2,
            64 => 3,
            128 => 4,
            _ => 2,
        }
    }

    fn issue_register_command(
        &mut self,
        window: &mut DmWindow,
        regno: u16,
        width: ForcedWidth,
        write: bool,
    ) -> Result<()> {
        let mut command = AccessRegisterCommand(0);
        command.set_cmdtype(0);
        command.set_aarsize(Self::aarsize(width.bits(self.access_width)));
        command.set_transfer(true);
        command.set_write(write);
        command.set_regno(regno as u32);

        window.write(AccessRegisterCommand::ADDRESS, command.0)?;
        self.poll_busy_and_check_error(window)
    }

    fn poll_busy_and_check_error(&mut self, window: &mut DmWindow) -> Result<()> {
        loop {
            let abstractcs = Abstractcs(window.read(Abstractcs::ADDRESS)?);
            if abstractcs.busy() {
                continue;
            }

            let cmderr = abstractcs.cmderr() as u8;
            if cmderr == 0 {
                self.status = HartStatus::NoError;
                return Ok(());
            }

            self.status = HartStatus::from_cmderr(cmderr);

            let mut clear = Abstractcs(0);
            clear.set_cmderr(CMDERR_CLEAR);
            window.write(Abstractcs::ADDRESS, clear.0)?;

            return Err(RiscvError::HartStatus(self.status));
        }
    }

    fn read_data_words(&self, window: &mut DmWindow, width: u8) -> Result<u64> {
        let words = (width / 32).max(1);
        let mut value: u64 = 0;
        for i in 0..words {
            let word = window.read(data_register(i))?;
            value |= (word as u64) << (32 * i);
        }
        Ok(value)
    }

    fn write_data_words(&self, window: &mut DmWindow, width: u8, value: u64) -> Result<()> {
        let words = (width / 32).max(1);
        for i in 0..words {
            let word = (value >> (32 * i)) as u32;
            window.write(data_register(i), word)?;
        }
        Ok(())
    }

    /// Pick the transfer width (in bytes) for a memory access, from the
    /// alignment of `address` and `length`.
    pub fn select_memory_width(native_width_log2: u8, address: u64, length: u32) -> u8 {
        for log2 in (0..=native_width_log2).rev() {
            let align_mask = (1u64 << log2) - 1;
            if (address | length as u64) & align_mask == 0 {
                return log2;
            }
        }
        0
    }

    /// The hart's native memory access width, as the `log2(byte width)`
    /// `select_memory_width` and `aamsize` both expect.
    fn native_memory_width_log2(&self) -> u8 {
        match self.access_width {
            64 => 3,
            128 => 4,
            _ => 2,
        }
    }

    /// Abstract Access Memory read of a word at `address`, using `data0`
    /// for the value and `data1` for the address. The transfer width is
    /// the widest one `address` and a 4-byte access are aligned to.
    pub fn read_memory_word(&mut self, window: &mut DmWindow, address: u32) -> Result<u32> {
        self.select(window)?;
        window.write(data_register(1), address)?;

        let width_log2 = Self::select_memory_width(self.native_memory_width_log2(), address as u64, 4);

        let mut command = AccessMemoryCommand(0);
        command.set_cmdtype(2);
        command.set_aamsize(width_log2 as u32);
        command.set_write(false);
        window.write(AccessMemoryCommand::ADDRESS, command.0)?;
        self.poll_busy_and_check_error(window)?;

        window.read(data_register(0))
    }

    pub fn write_memory_word(&mut self, window: &mut DmWindow, address: u32, value: u32) -> Result<()> {
        self.select(window)?;
        window.write(data_register(0), value)?;
        window.write(data_register(1), address)?;

        let width_log2 = Self::select_memory_width(self.native_memory_width_log2(), address as u64, 4);

        let mut command = AccessMemoryCommand(0);
        command.set_cmdtype(2);
        command.set_aamsize(width_log2 as u32);
        command.set_write(true);
        window.write(AccessMemoryCommand::ADDRESS, command.0)?;
        self.poll_busy_and_check_error(window)
    }

    /// Halt request.
    pub fn halt(&mut self, window: &mut DmWindow) -> Result<()> {
        let mut dmcontrol = Dmcontrol(self.hartsel_control);
        dmcontrol.set_haltreq(true);
        window.write(Dmcontrol::ADDRESS, dmcontrol.0)?;

        loop {
            let status = Dmstatus(window.read(Dmstatus::ADDRESS)?);
            if status.allhalted() {
                break;
            }
        }

        self.select(window)?;
        self.state = HartState::Halted;
        Ok(())
    }

    /// Resume, optionally configuring single-step via `dcsr` first.
    pub fn resume(&mut self, window: &mut DmWindow, step: bool) -> Result<()> {
        let mut dcsr = Dcsr(self.abstract_read_register(window, csr::DCSR, ForcedWidth(Some(32)))? as u32);
        dcsr.set_step(step);
        dcsr.set_stepie(step);
        self.abstract_write_register(window, csr::DCSR, dcsr.0 as u64, ForcedWidth(Some(32)))?;

        let mut dmcontrol = Dmcontrol(self.hartsel_control);
        dmcontrol.set_resumereq(true);
        window.write(Dmcontrol::ADDRESS, dmcontrol.0)?;

        loop {
            let status = Dmstatus(window.read(Dmstatus::ADDRESS)?);
            if status.allresumeack() {
                break;
            }
        }

        self.select(window)?;
        self.state = HartState::Running;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn memory_width_respects_alignment() {
        // address and length both 4-byte aligned, native width up to 4
        // bytes (log2 = 2): picks the full native width.
        assert_eq!(Hart::select_memory_width(2, 0x1000, 4), 2);
        // address is only 2-byte aligned: width drops to 2 bytes.
        assert_eq!(Hart::select_memory_width(2, 0x1002, 4), 1);
        // length is odd: width drops to 1 byte regardless of address.
        assert_eq!(Hart::select_memory_width(2, 0x1000, 1), 0);
    }

    #[test]
    fn forced_width_overrides_native() {
        let forced = ForcedWidth(Some(32));
        assert_eq!(forced.bits(64), 32);
        assert_eq!(ForcedWidth::NATIVE.bits(64), 64);
    }
}
