//! Physical transport primitives.
//!
//! Bit shifting on the wire is someone else's problem. Everything in
//! this crate above this module only ever calls through [`JtagAccess`] or
//! [`RvswdAccess`].

use thiserror::Error;

/// Error surfaced by a collaborator-supplied transport implementation.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("transport produced no acknowledgement")]
    NoAck,
    #[error("transport error: {0}")]
    Other(String),
}

/// Process-wide clock divider policy.
///
/// `u32::MAX` signals "no delay". Both the CLK-low and CLK-high phases of
/// a bit-bang edge apply the same hold. Kept as a value owned by the
/// transport object rather than true global mutable state, per the
/// global mutable state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockDivider(pub u32);

impl Default for ClockDivider {
    fn default() -> Self {
        ClockDivider(u32::MAX)
    }
}

impl ClockDivider {
    pub fn no_delay() -> Self {
        ClockDivider(u32::MAX)
    }

    pub fn is_no_delay(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// JTAG IR values used by this core.
pub mod jtag_ir {
    pub const DTMCS: u32 = 0x10;
    pub const DMI: u32 = 0x11;
    pub const BYPASS: u32 = 0x1f;
}

/// JTAG physical-layer primitives.
///
/// `device_index` addresses a specific TAP in a multi-device scan chain;
/// implementations that only ever see a single device may ignore it.
pub trait JtagAccess {
    /// Select an instruction register value on the given TAP.
    fn write_ir(&mut self, device_index: usize, ir_value: u32) -> Result<(), ProbeError>;

    /// Shift `bit_count` bits of `tdi_bits` into the DR while capturing
    /// the same number of bits into `tdo_bits`. Both slices are
    /// little-endian bit order within each byte, LSB first overall.
    fn shift_dr(
        &mut self,
        device_index: usize,
        tdi_bits: &[u8],
        tdo_bits: &mut [u8],
        bit_count: u32,
    ) -> Result<(), ProbeError>;

    /// Return the TAP to run-test/idle and hold there for `idle_cycles`.
    fn return_to_idle(&mut self, idle_cycles: u8) -> Result<(), ProbeError>;

    fn clock_divider(&self) -> ClockDivider;
    fn set_clock_divider(&mut self, divider: ClockDivider);
}

impl<T: JtagAccess + ?Sized> JtagAccess for Box<T> {
    fn write_ir(&mut self, device_index: usize, ir_value: u32) -> Result<(), ProbeError> {
        (**self).write_ir(device_index, ir_value)
    }

    fn shift_dr(
        &mut self,
        device_index: usize,
        tdi_bits: &[u8],
        tdo_bits: &mut [u8],
        bit_count: u32,
    ) -> Result<(), ProbeError> {
        (**self).shift_dr(device_index, tdi_bits, tdo_bits, bit_count)
    }

    fn return_to_idle(&mut self, idle_cycles: u8) -> Result<(), ProbeError> {
        (**self).return_to_idle(idle_cycles)
    }

    fn clock_divider(&self) -> ClockDivider {
        (**self).clock_divider()
    }

    fn set_clock_divider(&mut self, divider: ClockDivider) {
        (**self).set_clock_divider(divider)
    }
}

/// RVSWD (single-wire) physical-layer primitives.
pub trait RvswdAccess {
    fn start(&mut self) -> Result<(), ProbeError>;
    fn stop(&mut self) -> Result<(), ProbeError>;

    /// Shift `n_bits` in, driven on the falling edge of CLK and sampled
    /// on the rising edge by the target.
    fn seq_out(&mut self, value: u64, n_bits: u32) -> Result<(), ProbeError>;

    /// Shift `n_bits` out of the target, sampled on the rising edge.
    fn seq_in(&mut self, n_bits: u32) -> Result<u64, ProbeError>;

    fn clock_divider(&self) -> ClockDivider;
    fn set_clock_divider(&mut self, divider: ClockDivider);
}

impl<T: RvswdAccess + ?Sized> RvswdAccess for Box<T> {
    fn start(&mut self) -> Result<(), ProbeError> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<(), ProbeError> {
        (**self).stop()
    }

    fn seq_out(&mut self, value: u64, n_bits: u32) -> Result<(), ProbeError> {
        (**self).seq_out(value, n_bits)
    }

    fn seq_in(&mut self, n_bits: u32) -> Result<u64, ProbeError> {
        (**self).seq_in(n_bits)
    }

    fn clock_divider(&self) -> ClockDivider {
        (**self).clock_divider()
    }

    fn set_clock_divider(&mut self, divider: ClockDivider) {
        (**self).set_clock_divider(divider)
    }
}

#[cfg(any(test, feature = "test"))]
pub mod fake {
    //! Minimal scriptable fake transports for tests.

    use super::*;
    use std::collections::VecDeque;

    /// A scriptable JTAG fake: queue up the raw `tdo` reply bytes to
    /// return from consecutive `shift_dr` calls.
    #[derive(Default)]
    pub struct FakeJtag {
        pub replies: VecDeque<Vec<u8>>,
        pub last_tdi: Vec<Vec<u8>>,
        pub idle_cycles_seen: Vec<u8>,
        divider: ClockDivider,
    }

    impl JtagAccess for FakeJtag {
        fn write_ir(&mut self, _device_index: usize, _ir_value: u32) -> Result<(), ProbeError> {
            Ok(())
        }

        fn shift_dr(
            &mut self,
            _device_index: usize,
            tdi_bits: &[u8],
            tdo_bits: &mut [u8],
            _bit_count: u32,
        ) -> Result<(), ProbeError> {
            self.last_tdi.push(tdi_bits.to_vec());
            let reply = self.replies.pop_front().ok_or(ProbeError::NoAck)?;
            tdo_bits[..reply.len()].copy_from_slice(&reply);
            Ok(())
        }

        fn return_to_idle(&mut self, idle_cycles: u8) -> Result<(), ProbeError> {
            self.idle_cycles_seen.push(idle_cycles);
            Ok(())
        }

        fn clock_divider(&self) -> ClockDivider {
            self.divider
        }

        fn set_clock_divider(&mut self, divider: ClockDivider) {
            self.divider = divider;
        }
    }

    #[derive(Default)]
    pub struct FakeRvswd {
        pub in_replies: VecDeque<u64>,
        divider: ClockDivider,
    }

    impl RvswdAccess for FakeRvswd {
        fn start(&mut self) -> Result<(), ProbeError> {
            Ok(())
        }

        fn stop(&mut self) -> Result<(), ProbeError> {
            Ok(())
        }

        fn seq_out(&mut self, _value: u64, _n_bits: u32) -> Result<(), ProbeError> {
            Ok(())
        }

        fn seq_in(&mut self, _n_bits: u32) -> Result<u64, ProbeError> {
            self.in_replies.pop_front().ok_or(ProbeError::NoAck)
        }

        fn clock_divider(&self) -> ClockDivider {
            self.divider
        }

        fn set_clock_divider(&mut self, divider: ClockDivider) {
            self.divider = divider;
        }
    }
}
