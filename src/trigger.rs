//! Trigger Module mediator: allocate, configure and release hardware
//! breakpoint/watchpoint slots.

use crate::csr;
use crate::dm::DmWindow;
use crate::error::Result;
use crate::hart::{ForcedWidth, Hart};
use crate::registers::Mcontrol;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum TriggerUse {
    #[default]
    Unused,
    Breakpoint,
    Watchpoint,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TriggerKind {
    Breakpoint,
    Watchpoint { size: u8 },
}

/// Match-control trigger types (`tdata1.type`) this mediator knows how to
/// allocate: address/data match (type 2) and its newer revision (type 6).
const MCONTROL_TYPE: u32 = 2;

/// `tdata1` size-bits encoding.
fn size_bits(size: u8) -> u32 {
    match size {
        8 => 0x0001_0000,
        16 => 0x0002_0000,
        32 => 0x0003_0000,
        64 => 0x0021_0000,
        128 => 0x0041_0000,
        _ => 0,
    }
}

/// Read `tinfo` (CSR 0x7a4) for the currently-selected trigger to check
/// whether it supports the requested kind.
fn supports_kind(window: &mut DmWindow, hart: &mut Hart, kind: TriggerKind) -> Result<bool> {
    let tinfo = hart.abstract_read_register(window, csr::TINFO, ForcedWidth::NATIVE)?;
    let type2_or_6 = ((tinfo >> 2) & 1 != 0) || ((tinfo >> 6) & 1 != 0);

    Ok(match kind {
        TriggerKind::Breakpoint => type2_or_6,
        TriggerKind::Watchpoint { .. } => type2_or_6,
    })
}

/// Scan `hart.trigger_uses` for the first unused slot whose `tinfo`
/// advertises support for `kind`, mark it allocated, and return its
/// index.
pub fn allocate(window: &mut DmWindow, hart: &mut Hart, kind: TriggerKind) -> Result<Option<usize>> {
    for index in 0..hart.triggers as usize {
        if hart.trigger_uses[index] != TriggerUse::Unused {
            continue;
        }

        hart.abstract_write_register(window, csr::TSELECT, index as u64, ForcedWidth::NATIVE)?;

        if supports_kind(window, hart, kind)? {
            hart.trigger_uses[index] = match kind {
                TriggerKind::Breakpoint => TriggerUse::Breakpoint,
                TriggerKind::Watchpoint { .. } => TriggerUse::Watchpoint,
            };
            return Ok(Some(index));
        }
    }

    Ok(None)
}

/// Write `tselect`/`tdata1`/`tdata2` to arm a previously allocated
/// trigger at `address`.
pub fn configure(
    window: &mut DmWindow,
    hart: &mut Hart,
    index: usize,
    address: u64,
    size: u8,
    kind: TriggerKind,
) -> Result<()> {
    hart.abstract_write_register(window, csr::TSELECT, index as u64, ForcedWidth::NATIVE)?;

    let mut mcontrol = Mcontrol(0);
    mcontrol.set_type(MCONTROL_TYPE);
    mcontrol.set_dmode(true);
    mcontrol.set_m(true);
    mcontrol.set_s(true);
    mcontrol.set_u(true);
    mcontrol.set_action(1);
    match kind {
        TriggerKind::Breakpoint => mcontrol.set_execute(true),
        TriggerKind::Watchpoint { .. } => {
            mcontrol.set_load(true);
            mcontrol.set_store(true);
        }
    }

    let tdata1 = mcontrol.0 | size_bits(size);
    hart.abstract_write_register(window, csr::TDATA1, tdata1 as u64, ForcedWidth::NATIVE)?;
    hart.abstract_write_register(window, csr::TDATA2, address, ForcedWidth::NATIVE)?;

    Ok(())
}

/// Disarm and free a trigger slot.
pub fn release(window: &mut DmWindow, hart: &mut Hart, index: usize) -> Result<()> {
    hart.abstract_write_register(window, csr::TSELECT, index as u64, ForcedWidth::NATIVE)?;
    hart.abstract_write_register(window, csr::TDATA1, 0, ForcedWidth::NATIVE)?;
    hart.trigger_uses[index] = TriggerUse::Unused;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn size_bits_cover_standard_widths() {
        assert_eq!(size_bits(8), 0x0001_0000);
        assert_eq!(size_bits(16), 0x0002_0000);
        assert_eq!(size_bits(32), 0x0003_0000);
        assert_eq!(size_bits(64), 0x0021_0000);
        assert_eq!(size_bits(128), 0x0041_0000);
    }
}
