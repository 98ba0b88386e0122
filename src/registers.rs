//! DM register bitfield layouts.
//!
//! `dmcontrol`'s `hartsello`/`hartselhi` placement and `dmstatus`'s
//! `allnonexistent`/`anynonexistent` placement are both deliberately
//! swapped relative to the upstream RISC-V debug spec (see DESIGN.md);
//! this register map is the bit-exact authority for this crate.

use bitfield::bitfield;

bitfield! {
    /// `dmcontrol`, DM offset 0x10.
    #[derive(Copy, Clone)]
    pub struct Dmcontrol(u32);
    impl Debug;
    pub haltreq, set_haltreq: 31;
    pub resumereq, set_resumereq: 30;
    pub hartreset, set_hartreset: 29;
    pub ackhavereset, set_ackhavereset: 28;
    pub hasel, set_hasel: 26;
    pub hartselhi, set_hartselhi: 25, 16;
    pub hartsello, set_hartsello: 15, 6;
    pub resethaltreq, set_resethaltreq: 3;
    pub clrresethaltreq, set_clrresethaltreq: 2;
    pub ndmreset, set_ndmreset: 1;
    pub dmactive, set_dmactive: 0;
}

impl Dmcontrol {
    pub const ADDRESS: u64 = 0x10;

    pub fn hartsel(&self) -> u32 {
        (self.hartselhi() << 10) | self.hartsello()
    }

    pub fn set_hartsel(&mut self, hart_index: u32) {
        self.set_hartselhi(hart_index >> 10);
        self.set_hartsello(hart_index & 0x3ff);
    }
}

bitfield! {
    /// `dmstatus`, DM offset 0x11. Read-only.
    pub struct Dmstatus(u32);
    impl Debug;
    pub impebreak, _: 22;
    pub allhavereset, _: 19;
    pub anyhavereset, _: 18;
    pub allresumeack, _: 17;
    pub anyresumeack, _: 16;
    pub anynonexistent, _: 15;
    pub allnonexistent, _: 14;
    pub allunavail, _: 13;
    pub anyunavail, _: 12;
    pub allrunning, _: 11;
    pub anyrunning, _: 10;
    pub allhalted, _: 9;
    pub anyhalted, _: 8;
    pub authenticated, _: 7;
    pub authbusy, _: 6;
    pub hasresethaltreq, _: 5;
    pub confstrptrvalid, _: 4;
    pub version, _: 3, 0;
}

impl Dmstatus {
    pub const ADDRESS: u64 = 0x11;
}

bitfield! {
    /// `abstractcs`, DM offset 0x16.
    pub struct Abstractcs(u32);
    impl Debug;
    pub progbufsize, _: 28, 24;
    pub busy, _: 12;
    pub cmderr, set_cmderr: 10, 8;
    pub datacount, _: 3, 0;
}

impl Abstractcs {
    pub const ADDRESS: u64 = 0x16;
}

bitfield! {
    /// `command`, DM offset 0x17. Abstract Access Register variant
    /// (`cmdtype == 0`).
    pub struct AccessRegisterCommand(u32);
    impl Debug;
    pub cmdtype, set_cmdtype: 31, 24;
    pub aarsize, set_aarsize: 22, 20;
    pub aarpostincrement, set_aarpostincrement: 19;
    pub postexec, set_postexec: 18;
    pub transfer, set_transfer: 17;
    pub write, set_write: 16;
    pub regno, set_regno: 15, 0;
}

impl AccessRegisterCommand {
    pub const ADDRESS: u64 = 0x17;
}

bitfield! {
    /// `command`, DM offset 0x17. Abstract Access Memory variant
    /// (`cmdtype == 2`).
    pub struct AccessMemoryCommand(u32);
    impl Debug;
    pub cmdtype, set_cmdtype: 31, 24;
    pub aamvirtual, set_aamvirtual: 23;
    pub aamsize, set_aamsize: 22, 20;
    pub aampostincrement, set_aampostincrement: 19;
    pub write, set_write: 16;
}

impl AccessMemoryCommand {
    pub const ADDRESS: u64 = 0x17;
}

/// `data0`..`data3`, DM offsets 0x04..0x07. 32-bit each, assembled
/// little-endian for wider reads.
pub const DATA0: u64 = 0x04;
pub const DATA1: u64 = 0x05;
pub const DATA2: u64 = 0x06;
pub const DATA3: u64 = 0x07;

pub fn data_register(index: u8) -> u64 {
    DATA0 + index as u64
}

/// `nextdm`, DM offset 0x1d.
pub const NEXTDM: u64 = 0x1d;

/// `dtmcs` JTAG IR, see [`crate::dtm::jtag`].
pub const DTMCS: u32 = 0x10;

bitfield! {
    /// `tdata1` match-control encoding for type-2/6 triggers.
    pub struct Mcontrol(u32);
    impl Debug;
    pub type_, set_type: 31, 28;
    pub dmode, set_dmode: 27;
    pub maskmax, _: 26, 21;
    pub hit, set_hit: 20;
    pub select, set_select: 19;
    pub timing, set_timing: 18;
    pub sizelo, set_sizelo: 17, 16;
    pub action, set_action: 15, 12;
    pub chain, set_chain: 11;
    pub match_, set_match: 10, 7;
    pub m, set_m: 6;
    pub s, set_s: 4;
    pub u, set_u: 3;
    pub execute, set_execute: 2;
    pub store, set_store: 1;
    pub load, set_load: 0;
}

bitfield! {
    /// `dcsr`, CSR 0x7b0.
    pub struct Dcsr(u32);
    impl Debug;
    pub xdebugver, _: 31, 28;
    pub ebreakm, set_ebreakm: 15;
    pub ebreaks, set_ebreaks: 13;
    pub ebreaku, set_ebreaku: 12;
    pub stepie, set_stepie: 11;
    pub stopcount, set_stopcount: 10;
    pub stoptime, set_stoptime: 9;
    pub cause, _: 8, 6;
    pub mprven, set_mprven: 4;
    pub nmip, _: 3;
    pub step, set_step: 2;
    pub prv, set_prv: 1, 0;
}
