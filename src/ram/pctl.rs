//! uPCTL protocol controller register map.

use arbitrary_int::{u2, u3, u4, u13};

pub const SCFG: usize = 0x0000;
pub const SCTL: usize = 0x0004;
pub const STAT: usize = 0x0008;
pub const MCMD: usize = 0x0040;
pub const POWCTL: usize = 0x0044;
pub const POWSTAT: usize = 0x0048;
pub const CMDTSTATEN: usize = 0x0050;
pub const MCFG1: usize = 0x007c;
pub const MCFG: usize = 0x0080;
pub const PPCFG: usize = 0x0084;

/// First of the 35 consecutive timing registers (TOGCNT1U .. TREFI_MEM_DDR3).
pub const TOGCNT1U: usize = 0x00c0;
pub const TREFI: usize = 0x00d0;
pub const TDPD: usize = 0x0144;
pub const TIMING_WORDS: usize = 35;

pub const DFITCTRLDELAY: usize = 0x0240;
pub const DFIODTCFG: usize = 0x0244;
pub const DFIODTCFG1: usize = 0x0248;
pub const DFIODTRANKMAP: usize = 0x024c;
pub const DFITPHYWRDATA: usize = 0x0250;
pub const DFITPHYWRLAT: usize = 0x0254;
pub const DFITPHYWRDATALAT: usize = 0x0258;
pub const DFITRDDATAEN: usize = 0x0260;
pub const DFITPHYRDLAT: usize = 0x0264;
pub const DFITPHYUPDTYPE0: usize = 0x0270;
pub const DFITPHYUPDTYPE1: usize = 0x0274;
pub const DFITPHYUPDTYPE2: usize = 0x0278;
pub const DFITPHYUPDTYPE3: usize = 0x027c;
pub const DFITCTRLUPDMIN: usize = 0x0280;
pub const DFITCTRLUPDMAX: usize = 0x0284;
pub const DFITCTRLUPDDLY: usize = 0x0288;
pub const DFIUPDCFG: usize = 0x0290;
pub const DFITREFMSKI: usize = 0x0294;
pub const DFITCTRLUPDI: usize = 0x0298;
pub const DFISTCFG0: usize = 0x02c4;
pub const DFISTCFG1: usize = 0x02c8;
pub const DFITDRAMCLKEN: usize = 0x02d0;
pub const DFITDRAMCLKDIS: usize = 0x02d4;
pub const DFISTCFG2: usize = 0x02d8;
pub const DFILPCFG0: usize = 0x02f0;

/// DFILPCFG0 for DDR3: power-down and self-refresh clock stop off, the DRAM
/// keeps its clock.
pub const DFILPCFG0_DDR3: u32 = 0x0005_1100;
/// DFILPCFG0 for LPDDR2/3: clock may stop in power-down and self-refresh.
pub const DFILPCFG0_LPDDR: u32 = 0x0005_1111;

pub const POWER_UP_START: u32 = 1 << 0;
pub const POWER_UP_DONE: u32 = 1 << 0;

pub const TREFI_UPDATE: u32 = 1 << 31;

/// Commands written to SCTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CtlCommand {
    Init = 0,
    Cfg = 1,
    Go = 2,
    Sleep = 3,
    Wakeup = 4,
}

/// Operational state reported in STAT[2:0].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtlState {
    InitMem,
    Config,
    ConfigReq,
    Access,
    AccessReq,
    LowPower,
    LowPowerEntryReq,
    LowPowerExitReq,
}

impl CtlState {
    #[inline(always)]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0x7 {
            0 => CtlState::InitMem,
            1 => CtlState::Config,
            2 => CtlState::ConfigReq,
            3 => CtlState::Access,
            4 => CtlState::AccessReq,
            5 => CtlState::LowPower,
            6 => CtlState::LowPowerEntryReq,
            _ => CtlState::LowPowerExitReq,
        }
    }

    #[inline(always)]
    pub const fn bits(self) -> u32 {
        match self {
            CtlState::InitMem => 0,
            CtlState::Config => 1,
            CtlState::ConfigReq => 2,
            CtlState::Access => 3,
            CtlState::AccessReq => 4,
            CtlState::LowPower => 5,
            CtlState::LowPowerEntryReq => 6,
            CtlState::LowPowerExitReq => 7,
        }
    }
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct Stat {
    /// What caused the last low-power entry: 1 means the controller went
    /// there by itself after `sr_idle` cycles.
    #[bits(4..=6, rw)]
    lp_trig: u3,
    #[bits(0..=2, rw)]
    ctl_stat: u3,
}

impl Stat {
    #[inline(always)]
    pub fn state(&self) -> CtlState {
        CtlState::from_bits(self.ctl_stat().value() as u32)
    }

    #[inline(always)]
    pub fn entered_low_power_by_itself(&self) -> bool {
        self.lp_trig().value() == 1
    }
}

/// Command opcodes placed in MCMD[3:0].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DramCommand {
    Deselect = 0,
    PrechargeAll = 1,
    Refresh = 2,
    ModeRegister = 3,
    ZqCalShort = 4,
    ZqCalLong = 5,
    PowerDownExit = 6,
    PowerDownEnter = 7,
    SelfRefreshExit = 8,
    SelfRefreshEnter = 9,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct Mcmd {
    #[bit(31, rw)]
    start: bool,
    #[bits(20..=23, rw)]
    rank: u4,
    #[bits(17..=19, rw)]
    bank: u3,
    #[bits(4..=16, rw)]
    addr: u13,
    #[bits(0..=3, rw)]
    cmd: u4,
}

/// Every rank at once.
pub const ALL_RANKS: u8 = 3;

impl Mcmd {
    #[inline(always)]
    pub fn command(rank: u8, cmd: DramCommand, bank: u8, addr: u32) -> Self {
        Mcmd::new_with_raw_value(0)
            .with_start(true)
            .with_rank(u4::new(rank & 0xf))
            .with_bank(u3::new(bank & 0x7))
            .with_addr(u13::new((addr & 0x1fff) as u16))
            .with_cmd(u4::new(cmd as u8))
    }

    /// LPDDR2/3 MRW: mode register address and operand share the address
    /// and bank fields.
    #[inline(always)]
    pub fn mode_register_write(rank: u8, ma: u8, op: u8) -> Self {
        let raw = (1u32 << 31)
            | (((rank & 0xf) as u32) << 20)
            | ((op as u32) << 12)
            | ((ma as u32) << 4)
            | DramCommand::ModeRegister as u32;
        Mcmd::new_with_raw_value(raw)
    }
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct Mcfg {
    #[bits(22..=23, rw)]
    lpddr23_en: u2,
    #[bits(20..=21, rw)]
    lpddr23_bl: u2,
    #[bits(18..=19, rw)]
    tfaw_cfg: u2,
    #[bit(17, rw)]
    pd_exit_mode: bool,
    #[bit(16, rw)]
    pd_type: bool,
    #[bits(8..=15, rw)]
    pd_idle: u8,
    #[bit(0, rw)]
    mem_bl8: bool,
}

/// `tfaw_cfg` encoding for tFAW = n * tRRD.
#[inline(always)]
pub const fn tfaw_cfg(n: u32) -> u2 {
    u2::new(((n.wrapping_sub(4)) & 0x3) as u8)
}

/// LPDDR2/3 burst length 8.
pub const LPDDR23_BL8: u8 = 2;

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct Mcfg1 {
    #[bit(31, rw)]
    hw_exit_idle_en: bool,
    #[bits(0..=7, rw)]
    sr_idle: u8,
}
