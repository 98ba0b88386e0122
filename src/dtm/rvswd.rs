//! RVSWD encoding of the DMI transport.
//!
//! Single-wire variant used by some WCH devices. A frame is
//! `{start=0, address[8], rw[1], parity[1]x3, data[32], data-parity[1]x3,
//! reply[4], stop}`. Bits are driven on the falling edge of CLK and
//! sampled on the rising edge.

use super::DmiOp;
use crate::error::DmiOperationStatus;
use crate::transport::RvswdAccess;

/// Reply codes that indicate a successful frame.
const REPLY_OK: [u8; 2] = [3, 7];

pub struct RvswdDmi<P> {
    probe: P,
}

impl<P: RvswdAccess> RvswdDmi<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }

    fn parity(bits: u64, width: u32) -> u64 {
        let mut parity = 0u64;
        for i in 0..width {
            parity ^= (bits >> i) & 1;
        }
        parity
    }

    pub fn shift(
        &mut self,
        address: u64,
        value: u32,
        op: DmiOp,
    ) -> crate::error::Result<Result<u32, DmiOperationStatus>> {
        let is_read = matches!(op, DmiOp::Read | DmiOp::NoOp);

        self.probe.start()?;

        self.probe.seq_out(address & 0xff, 8)?;
        self.probe.seq_out(if is_read { 1 } else { 0 }, 1)?;

        let header = (address & 0xff) | ((!is_read as u64) << 8);
        let header_parity = Self::parity(header, 9);
        for _ in 0..3 {
            self.probe.seq_out(header_parity, 1)?;
        }

        let data_value = if is_read {
            self.probe.seq_in(32)?
        } else {
            self.probe.seq_out(value as u64, 32)?;
            value as u64
        };

        let data_parity = Self::parity(data_value, 32);
        if is_read {
            for _ in 0..3 {
                self.probe.seq_in(1)?;
            }
        } else {
            for _ in 0..3 {
                self.probe.seq_out(data_parity, 1)?;
            }
        }

        let reply = self.probe.seq_in(4)? as u8;
        self.probe.stop()?;

        if REPLY_OK.contains(&reply) {
            Ok(Ok(data_value as u32))
        } else {
            tracing::warn!(reply, "RVSWD reply code indicated failure");
            Ok(Err(DmiOperationStatus::Failure))
        }
    }

    /// Simulated DMI reset: clock 100 ones with DIO held high.
    pub fn dmi_reset(&mut self) -> crate::error::Result<()> {
        self.probe.seq_out(u64::MAX, 50)?;
        self.probe.seq_out(u64::MAX, 50)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::fake::FakeRvswd;

    #[test]
    fn read_success_reply() {
        let mut probe = FakeRvswd::default();
        probe.in_replies.push_back(0x1234_5678);
        // three parity-of-data bits, then reply code
        probe.in_replies.push_back(0);
        probe.in_replies.push_back(0);
        probe.in_replies.push_back(0);
        probe.in_replies.push_back(3);

        let mut rvswd = RvswdDmi::new(probe);
        let result = rvswd.shift(0x11, 0, DmiOp::Read).unwrap();
        assert_eq!(result, Ok(0x1234_5678));
    }

    #[test]
    fn bad_reply_code_is_failure() {
        let mut probe = FakeRvswd::default();
        probe.in_replies.push_back(0xaaaa_aaaa);
        probe.in_replies.push_back(0);
        probe.in_replies.push_back(0);
        probe.in_replies.push_back(0);
        probe.in_replies.push_back(1);

        let mut rvswd = RvswdDmi::new(probe);
        let result = rvswd.shift(0x11, 0, DmiOp::Read).unwrap();
        assert_eq!(result, Err(DmiOperationStatus::Failure));
    }
}
