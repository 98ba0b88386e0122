//! JTAG encoding of the DMI transport.

use bitfield::bitfield;

use super::{DebugModuleVersion, DmiOp};
use crate::error::DmiOperationStatus;
use crate::transport::{jtag_ir, JtagAccess};

bitfield! {
    /// `dtmcs` register, JTAG IR 0x10.
    struct Dtmcs(u32);
    impl Debug;
    u32;
    pub dmihardreset, set_dmihardreset: 17;
    pub dmireset, set_dmireset: 16;
    pub idle, _: 14, 12;
    pub dmistat, _: 11, 10;
    pub abits, _: 9, 4;
    pub version, _: 3, 0;
}

const DTMCS_WIDTH: u32 = 32;
/// Offset of the `address` field in the `dmi` scan-chain layout.
const DMI_ADDRESS_BIT_OFFSET: u32 = 34;
/// Offset of the `value` field in the `dmi` scan-chain layout.
const DMI_VALUE_BIT_OFFSET: u32 = 2;
const DMI_OP_MASK: u128 = 0x3;

/// JTAG-specific DMI state: the abits width discovered from `dtmcs`, and
/// the device index this TAP occupies in the scan chain.
pub struct JtagDmi<P> {
    probe: P,
    device_index: usize,
    abits: u32,
}

impl<P: JtagAccess> JtagDmi<P> {
    pub fn new(probe: P) -> crate::error::Result<Self> {
        Ok(Self {
            probe,
            device_index: 0,
            abits: 0,
        })
    }

    /// Select the `dtmcs` IR and shift out its current value, returning
    /// the decoded version/idle/abits triple.
    pub fn read_dtmcs(&mut self) -> crate::error::Result<(DebugModuleVersion, u8, u32)> {
        self.probe.write_ir(self.device_index, jtag_ir::DTMCS)?;

        let mut tdo = [0u8; 4];
        self.probe
            .shift_dr(self.device_index, &[0u8; 4], &mut tdo, DTMCS_WIDTH)?;

        let raw = u32::from_le_bytes(tdo);
        let dtmcs = Dtmcs(raw);

        tracing::debug!(raw, abits = dtmcs.abits(), idle = dtmcs.idle(), "read dtmcs");

        let version = match dtmcs.version() {
            0 => DebugModuleVersion::Unknown,
            1 => DebugModuleVersion::V0_13,
            _ => DebugModuleVersion::Unimplemented,
        };

        self.abits = dtmcs.abits();

        self.select_dmi()?;

        Ok((version, dtmcs.idle() as u8, dtmcs.abits()))
    }

    pub fn select_dmi(&mut self) -> crate::error::Result<()> {
        self.probe.write_ir(self.device_index, jtag_ir::DMI)?;
        Ok(())
    }

    pub fn select_bypass(&mut self) -> crate::error::Result<()> {
        self.probe.write_ir(self.device_index, jtag_ir::BYPASS)?;
        Ok(())
    }

    pub fn dmi_reset(&mut self) -> crate::error::Result<()> {
        let mut dtmcs = Dtmcs(0);
        dtmcs.set_dmireset(true);

        self.probe.write_ir(self.device_index, jtag_ir::DTMCS)?;
        let mut tdo = [0u8; 4];
        self.probe.shift_dr(
            self.device_index,
            &dtmcs.0.to_le_bytes(),
            &mut tdo,
            DTMCS_WIDTH,
        )?;

        self.select_dmi()
    }

    fn dmi_command(&self, address: u64, value: u32, op: DmiOp) -> Vec<u8> {
        let register_value: u128 = ((address as u128) << DMI_ADDRESS_BIT_OFFSET)
            | ((value as u128) << DMI_VALUE_BIT_OFFSET)
            | (op as u128);

        let bit_size = self.abits + DMI_ADDRESS_BIT_OFFSET;
        let byte_size = (bit_size as usize + 7) / 8;
        register_value.to_le_bytes()[..byte_size].to_vec()
    }

    fn bit_size(&self) -> u32 {
        self.abits + DMI_ADDRESS_BIT_OFFSET
    }

    fn raw_shift(
        &mut self,
        address: u64,
        value: u32,
        op: DmiOp,
    ) -> crate::error::Result<Result<u32, DmiOperationStatus>> {
        let tdi = self.dmi_command(address, value, op);
        let mut tdo = vec![0u8; tdi.len()];
        self.probe
            .shift_dr(self.device_index, &tdi, &mut tdo, self.bit_size())?;

        let response_value: u128 = tdo.iter().enumerate().fold(0u128, |acc, (i, byte)| {
            acc | ((*byte as u128) << (8 * i))
        });

        let status_bits = (response_value & DMI_OP_MASK) as u8;
        let status = DmiOperationStatus::parse(status_bits);

        Ok(match status {
            DmiOperationStatus::Success => Ok((response_value >> DMI_VALUE_BIT_OFFSET) as u32),
            other => Err(other),
        })
    }

    /// Perform the atomic `{op shift, idle wait, noop shift}` DMI
    /// transaction, returning the result of the *previous* operation
    /// latched by the noop shift.
    pub fn shift(
        &mut self,
        address: u64,
        value: u32,
        op: DmiOp,
        idle_cycles: u8,
    ) -> crate::error::Result<Result<u32, DmiOperationStatus>> {
        self.raw_shift(address, value, op)?;
        self.probe.return_to_idle(idle_cycles)?;
        self.raw_shift(address, 0, DmiOp::NoOp)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::fake::FakeJtag;
    use pretty_assertions::assert_eq;

    fn op_reply(status: u8, value: u32) -> Vec<u8> {
        let raw: u128 = ((value as u128) << DMI_VALUE_BIT_OFFSET) | status as u128;
        raw.to_le_bytes()[..5].to_vec()
    }

    #[test]
    fn shift_returns_noop_result() {
        let mut probe = FakeJtag::default();
        // first shift (the actual op) returns garbage from a prior cycle
        probe.replies.push_back(op_reply(0, 0xdead_beef));
        // second shift (noop) returns the result of our op
        probe.replies.push_back(op_reply(0, 0x1234_5678));

        let mut jtag = JtagDmi {
            probe,
            device_index: 0,
            abits: 7,
        };

        let result = jtag.shift(0x04, 0, DmiOp::Read, 5).unwrap();
        assert_eq!(result, Ok(0x1234_5678));
    }

    #[test]
    fn shift_surfaces_busy() {
        let mut probe = FakeJtag::default();
        probe.replies.push_back(op_reply(0, 0));
        probe.replies.push_back(op_reply(3, 0));

        let mut jtag = JtagDmi {
            probe,
            device_index: 0,
            abits: 7,
        };

        let result = jtag.shift(0x04, 0, DmiOp::Read, 0).unwrap();
        assert_eq!(result, Err(DmiOperationStatus::Busy));
    }
}
