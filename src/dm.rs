//! Debug Module (DM) registry: `nextdm` chain walk, activation,
//! `hartsel` width discovery, hart enumeration.

use std::collections::HashSet;

use crate::dtm::{DebugModuleVersion, Dmi};
use crate::error::{Result, RiscvError};
use crate::hart::Hart;
use crate::registers::{Dmcontrol, Dmstatus, NEXTDM};

/// A windowed view of a [`Dmi`] bus at a fixed DM base address. All
/// register offsets in [`crate::registers`] are relative to this base.
pub struct DmWindow<'a> {
    dmi: &'a mut Dmi,
    pub base: u64,
}

impl<'a> DmWindow<'a> {
    pub fn new(dmi: &'a mut Dmi, base: u64) -> Self {
        Self { dmi, base }
    }

    pub fn read(&mut self, offset: u64) -> Result<u32> {
        self.dmi.read(self.base + offset)
    }

    pub fn write(&mut self, offset: u64, value: u32) -> Result<()> {
        self.dmi.write(self.base + offset, value)
    }

    pub fn dmi(&mut self) -> &mut Dmi {
        self.dmi
    }
}

/// A discovered Debug Module, owning the harts found beneath it. No
/// back-pointers: the tree owns everything.
pub struct DebugModule {
    pub base: u64,
    pub version: DebugModuleVersion,
    pub harts: Vec<Hart>,
}

/// Walk the `nextdm` chain starting at DMI address 0, activating and
/// scanning each present DM.
pub fn discover_debug_modules(dmi: &mut Dmi) -> Result<Vec<DebugModule>> {
    let mut modules = Vec::new();
    let mut visited = HashSet::new();
    let mut base = 0u64;

    loop {
        if !visited.insert(base) {
            // Defensive termination on a revisited base, in case a
            // misbehaving target wires nextdm into a loop.
            return Err(RiscvError::DmChainCycle(base));
        }

        let mut window = DmWindow::new(dmi, base);
        let dmstatus_raw = window.read(Dmstatus::ADDRESS)?;
        let dmstatus = Dmstatus(dmstatus_raw);
        let raw_version = dmstatus.version();

        let nextdm = match raw_version {
            0 => {
                tracing::debug!(base, "no debug module present, skipping");
                window.read(NEXTDM)?
            }
            1 => {
                tracing::debug!(base, "debug module version unimplemented (v0.11), skipping");
                window.read(NEXTDM)?
            }
            2 => {
                let harts = activate_and_scan(&mut window)?;
                modules.push(DebugModule {
                    base,
                    version: DebugModuleVersion::V0_13,
                    harts,
                });
                window.read(NEXTDM)?
            }
            other => {
                tracing::warn!(base, version = other, "unknown debug module version, skipping");
                window.read(NEXTDM)?
            }
        };

        if nextdm == 0 {
            break;
        }

        base = nextdm as u64;
    }

    Ok(modules)
}

/// Activate a present DM and enumerate its harts.
fn activate_and_scan(window: &mut DmWindow) -> Result<Vec<Hart>> {
    let mut dmcontrol = Dmcontrol(0);
    dmcontrol.set_dmactive(true);
    window.write(Dmcontrol::ADDRESS, dmcontrol.0)?;

    // Discover hartsel width: write all-ones into the hartsel fields,
    // read back what stuck.
    let mut probe = Dmcontrol(0);
    probe.set_dmactive(true);
    probe.set_hartselhi(0x3ff);
    probe.set_hartsello(0x3ff);
    window.write(Dmcontrol::ADDRESS, probe.0)?;

    let readback = Dmcontrol(window.read(Dmcontrol::ADDRESS)?);
    let hart_max = readback.hartsel();

    let mut harts = Vec::new();

    for hart_index in 0..=hart_max {
        let mut select = Dmcontrol(0);
        select.set_dmactive(true);
        select.set_hartsel(hart_index);
        window.write(Dmcontrol::ADDRESS, select.0)?;

        let status = Dmstatus(window.read(Dmstatus::ADDRESS)?);
        if status.allnonexistent() {
            break;
        }

        match Hart::probe(window, hart_index)? {
            Some(hart) => harts.push(hart),
            None => {
                tracing::warn!(hart_index, "hart probe failed persistently, dropping");
            }
        }
    }

    Ok(harts)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::fake::FakeJtag;
    use pretty_assertions::assert_eq;

    fn dtmcs_reply(version: u32, abits: u32, idle: u32) -> Vec<u8> {
        let raw = (idle << 12) | (abits << 4) | version;
        raw.to_le_bytes().to_vec()
    }

    fn op_reply(status: u8, value: u32) -> Vec<u8> {
        let raw: u128 = ((value as u128) << 2) | status as u128;
        raw.to_le_bytes()[..5].to_vec()
    }

    #[test]
    fn degenerate_single_dm_chain_terminates() {
        let mut probe = FakeJtag::default();
        probe.replies.push_back(dtmcs_reply(1, 7, 5));

        // Each DMI read/write is a {op shift, noop shift} pair; only the
        // second shift's result is meaningful. Push (ignored,
        // used) pairs for each transaction below.
        let mut push_pair = |probe: &mut FakeJtag, used_value: u32| {
            probe.replies.push_back(op_reply(0, 0));
            probe.replies.push_back(op_reply(0, used_value));
        };

        push_pair(&mut probe, 2); // dmstatus: version=2, present
        push_pair(&mut probe, 0); // dmcontrol activate write ack
        push_pair(&mut probe, 0); // dmcontrol hartsel-width probe write ack
        push_pair(&mut probe, 0); // dmcontrol readback: hart_max = 0
        push_pair(&mut probe, 0); // dmcontrol select hart 0 write ack
        push_pair(&mut probe, 1 << 14); // dmstatus: allnonexistent set
        push_pair(&mut probe, 0); // nextdm: 0, chain terminates

        let mut dmi = Dmi::new_jtag(Box::new(probe)).unwrap();
        let modules = discover_debug_modules(&mut dmi).unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].base, 0);
        assert!(modules[0].harts.is_empty());
    }
}
