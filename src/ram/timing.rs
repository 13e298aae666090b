//! DRAM timing derivation.
//!
//! Everything here is pure: given a frequency and the DRAM description it
//! produces the uPCTL timing image, the mode register values and the memory
//! scheduler timing. Nothing touches hardware, so a failure leaves the
//! controller exactly as it was.

use super::geometry::DramType;
use super::mode_register::{ddr3, lpddr};
use super::msch::{NocActivate, NocTiming, DEVTODEV_DEFAULT};
use super::pctl::TREFI_UPDATE;
use crate::config::TimingConfig;
use crate::error::{DramError, Result};
use arbitrary_int::{u3, u4, u5, u6};

/// JEDEC DDR3 speed grade, indexing the latency tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpeedBin(u32);

impl SpeedBin {
    pub const DDR3_800D: SpeedBin = SpeedBin(0);
    pub const DDR3_800E: SpeedBin = SpeedBin(1);
    pub const DDR3_1066E: SpeedBin = SpeedBin(2);
    pub const DDR3_1066F: SpeedBin = SpeedBin(3);
    pub const DDR3_1066G: SpeedBin = SpeedBin(4);
    pub const DDR3_1333F: SpeedBin = SpeedBin(5);
    pub const DDR3_1333G: SpeedBin = SpeedBin(6);
    pub const DDR3_1333H: SpeedBin = SpeedBin(7);
    pub const DDR3_1333J: SpeedBin = SpeedBin(8);
    pub const DDR3_1600G: SpeedBin = SpeedBin(9);
    pub const DDR3_1600H: SpeedBin = SpeedBin(10);
    pub const DDR3_1600J: SpeedBin = SpeedBin(11);
    pub const DDR3_1600K: SpeedBin = SpeedBin(12);
    pub const DDR3_1866J: SpeedBin = SpeedBin(13);
    pub const DDR3_1866K: SpeedBin = SpeedBin(14);
    pub const DDR3_1866L: SpeedBin = SpeedBin(15);
    pub const DDR3_1866M: SpeedBin = SpeedBin(16);
    pub const DDR3_2133K: SpeedBin = SpeedBin(17);
    pub const DDR3_2133L: SpeedBin = SpeedBin(18);
    pub const DDR3_2133M: SpeedBin = SpeedBin(19);
    pub const DDR3_2133N: SpeedBin = SpeedBin(20);
    /// Worst case of every grade; used when the part is unknown.
    pub const DEFAULT: SpeedBin = SpeedBin(21);

    pub fn from_index(index: u32) -> Result<Self> {
        if index > Self::DEFAULT.0 {
            return Err(DramError::UnsupportedSpeedBin(index));
        }
        Ok(SpeedBin(index))
    }

    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Upper edge (MHz) of each DDR3 frequency bracket. The last table column
/// (up to 1066 MHz) lies past `DDR3_MAX_MHZ` and is kept for reference.
const DDR3_BRACKETS: [u32; 6] = [330, 400, 533, 666, 800, 933];

/// tXP = max(3 tCK, 7.5ns) stops fitting its three bits above this.
pub const DDR3_MAX_MHZ: u32 = 933;

/// CAS write latency per bracket, identical for every bin.
const DDR3_CWL: [u8; 7] = [5, 5, 6, 7, 8, 9, 10];

/// CAS latency per bin and bracket. Zero marks a bracket the bin cannot run.
#[rustfmt::skip]
const DDR3_CL: [[u8; 7]; 22] = [
    [5, 5, 0, 0, 0, 0, 0],      // 800D
    [5, 6, 0, 0, 0, 0, 0],      // 800E
    [5, 5, 6, 0, 0, 0, 0],      // 1066E
    [5, 6, 7, 0, 0, 0, 0],      // 1066F
    [5, 6, 8, 0, 0, 0, 0],      // 1066G
    [5, 5, 6, 7, 0, 0, 0],      // 1333F
    [5, 5, 7, 8, 0, 0, 0],      // 1333G
    [5, 6, 8, 9, 0, 0, 0],      // 1333H
    [5, 6, 8, 10, 0, 0, 0],     // 1333J
    [5, 5, 6, 7, 8, 0, 0],      // 1600G
    [5, 5, 6, 8, 9, 0, 0],      // 1600H
    [5, 5, 7, 9, 10, 0, 0],     // 1600J
    [5, 6, 8, 10, 11, 0, 0],    // 1600K
    [5, 5, 6, 8, 9, 11, 0],     // 1866J
    [5, 5, 7, 8, 10, 11, 0],    // 1866K
    [6, 6, 7, 9, 11, 12, 0],    // 1866L
    [6, 6, 8, 10, 11, 13, 0],   // 1866M
    [5, 5, 6, 7, 9, 10, 11],    // 2133K
    [5, 5, 6, 8, 9, 11, 12],    // 2133L
    [5, 5, 7, 9, 10, 12, 13],   // 2133M
    [6, 6, 7, 9, 11, 13, 14],   // 2133N
    [6, 6, 8, 10, 11, 13, 14],  // default
];

/// (tRC, tFAW) in ns per bin.
#[rustfmt::skip]
const DDR3_TRC_TFAW: [(u8, u8); 22] = [
    (50, 50), (53, 50), (49, 50), (51, 50), (53, 50),
    (47, 45), (48, 45), (50, 45), (51, 45),
    (45, 40), (47, 40), (48, 40), (49, 40),
    (45, 35), (46, 35), (47, 35), (48, 35),
    (44, 35), (45, 35), (46, 35), (47, 35),
    (53, 50),
];

/// (max MHz, RL, WL)
const LPDDR2_RL_WL: [(u32, u32, u32); 6] = [
    (200, 3, 1),
    (266, 4, 2),
    (333, 5, 2),
    (400, 6, 3),
    (466, 7, 4),
    (533, 8, 4),
];

const LPDDR3_RL_WL: [(u32, u32, u32); 7] = [
    (166, 3, 1),
    (400, 6, 3),
    (533, 8, 4),
    (600, 9, 5),
    (667, 10, 6),
    (733, 11, 6),
    (800, 12, 6),
];

/// Burst length used by every supported type.
const BL: u32 = 8;

/// TRP bits 17:16, one extra precharge-all clock.
const TRP_PREA_EXTRA: u32 = 1 << 16;

/// Clock cycles covering `ps` picoseconds at `mhz`, rounded up.
pub const fn ps_to_cycles(ps: u32, mhz: u32) -> u32 {
    ((ps as u64 * mhz as u64 + 999_999) / 1_000_000) as u32
}

/// `raw` if it fits a register field of `bits` bits. A truncated value
/// would program the wrong timing.
fn field(name: &'static str, raw: u32, bits: u32) -> Result<u32> {
    let mask = if bits >= 32 { u32::MAX } else { (1 << bits) - 1 };
    if raw & !mask != 0 {
        return Err(DramError::TimingOverflow { field: name, value: raw });
    }
    Ok(raw)
}

fn fit_u3(name: &'static str, raw: u32) -> Result<u3> {
    Ok(u3::new(field(name, raw, 3)? as u8))
}

fn fit_u4(name: &'static str, raw: u32) -> Result<u4> {
    Ok(u4::new(field(name, raw, 4)? as u8))
}

fn fit_u5(name: &'static str, raw: u32) -> Result<u5> {
    Ok(u5::new(field(name, raw, 5)? as u8))
}

fn fit_u6(name: &'static str, raw: u32) -> Result<u6> {
    Ok(u6::new(field(name, raw, 6)? as u8))
}

/// Image of the 35 consecutive uPCTL timing registers starting at TOGCNT1U,
/// preceded by the DRAM clock they were computed for. The field order is the
/// register order and part of the resume layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct PctlTiming {
    pub ddr_freq: u32,
    pub togcnt1u: u32,
    pub tinit: u32,
    pub trsth: u32,
    pub togcnt100n: u32,
    pub trefi: u32,
    pub tmrd: u32,
    pub trfc: u32,
    pub trp: u32,
    pub trtw: u32,
    pub tal: u32,
    pub tcl: u32,
    pub tcwl: u32,
    pub tras: u32,
    pub trc: u32,
    pub trcd: u32,
    pub trrd: u32,
    pub trtp: u32,
    pub twr: u32,
    pub twtr: u32,
    pub texsr: u32,
    pub txp: u32,
    pub txpdll: u32,
    pub tzqcs: u32,
    pub tzqcsi: u32,
    pub tdqs: u32,
    pub tcksre: u32,
    pub tcksrx: u32,
    pub tcke: u32,
    pub tmod: u32,
    pub trstl: u32,
    pub tzqcl: u32,
    pub tmrr: u32,
    pub tckesr: u32,
    pub tdpd: u32,
    pub trefi_mem_ddr3: u32,
}

impl PctlTiming {
    /// The register image in place, TOGCNT1U first.
    #[inline(always)]
    pub fn registers(&self) -> &[u32; 35] {
        // SAFETY: repr(C) with 36 u32 fields and no padding; the 35 after
        // `ddr_freq` are the register words in address order.
        unsafe { &*((self as *const Self as *const u32).add(1) as *const [u32; 35]) }
    }

    /// Register values in address order, TOGCNT1U first.
    pub fn register_words(&self) -> [u32; 35] {
        [
            self.togcnt1u,
            self.tinit,
            self.trsth,
            self.togcnt100n,
            self.trefi,
            self.tmrd,
            self.trfc,
            self.trp,
            self.trtw,
            self.tal,
            self.tcl,
            self.tcwl,
            self.tras,
            self.trc,
            self.trcd,
            self.trrd,
            self.trtp,
            self.twr,
            self.twtr,
            self.texsr,
            self.txp,
            self.txpdll,
            self.tzqcs,
            self.tzqcsi,
            self.tdqs,
            self.tcksre,
            self.tcksrx,
            self.tcke,
            self.tmod,
            self.trstl,
            self.tzqcl,
            self.tmrr,
            self.tckesr,
            self.tdpd,
            self.trefi_mem_ddr3,
        ]
    }

    pub fn from_register_words(ddr_freq: u32, w: &[u32; 35]) -> Self {
        PctlTiming {
            ddr_freq,
            togcnt1u: w[0],
            tinit: w[1],
            trsth: w[2],
            togcnt100n: w[3],
            trefi: w[4],
            tmrd: w[5],
            trfc: w[6],
            trp: w[7],
            trtw: w[8],
            tal: w[9],
            tcl: w[10],
            tcwl: w[11],
            tras: w[12],
            trc: w[13],
            trcd: w[14],
            trrd: w[15],
            trtp: w[16],
            twr: w[17],
            twtr: w[18],
            texsr: w[19],
            txp: w[20],
            txpdll: w[21],
            tzqcs: w[22],
            tzqcsi: w[23],
            tdqs: w[24],
            tcksre: w[25],
            tcksrx: w[26],
            tcke: w[27],
            tmod: w[28],
            trstl: w[29],
            tzqcl: w[30],
            tmrr: w[31],
            tckesr: w[32],
            tdpd: w[33],
            trefi_mem_ddr3: w[34],
        }
    }
}

/// Memory scheduler registers that track the DRAM timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFabricTiming {
    pub ddr_timing: NocTiming,
    pub activate: NocActivate,
    pub read_latency: u32,
    pub dev_to_dev: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingProfile {
    pub pctl: PctlTiming,
    /// MR0..MR3 payloads. Unused registers hold zero.
    pub mr: [u32; 4],
    /// LPDDR3 on-die termination.
    pub mr11: u32,
    /// DDR3 runs with its DLL off at this frequency.
    pub dll_off: bool,
    pub fabric: BusFabricTiming,
}

impl TimingProfile {
    pub fn cl(&self) -> u32 {
        self.pctl.tcl
    }

    pub fn cwl(&self) -> u32 {
        self.pctl.tcwl
    }

    pub fn al(&self) -> u32 {
        self.pctl.tal
    }
}

/// Everything the calculator depends on.
#[derive(Debug, Clone, Copy)]
pub struct TimingInputs<'a> {
    pub freq_mhz: u32,
    pub dram_type: DramType,
    pub speed_bin: SpeedBin,
    /// Bytes per die, selects the refresh cycle time.
    pub capacity_per_die: u64,
    pub config: &'a TimingConfig,
    /// Current TDPD register, carried over unchanged.
    pub tdpd: u32,
}

pub fn calculate(inputs: &TimingInputs<'_>) -> Result<TimingProfile> {
    if inputs.freq_mhz == 0 {
        return Err(DramError::UnsupportedFrequency { mhz: 0 });
    }
    match inputs.dram_type {
        DramType::Ddr3 => ddr3_profile(inputs),
        DramType::Lpddr2 | DramType::Lpddr3 => lpddr_profile(inputs),
        other => Err(DramError::UnsupportedDramType(other.code())),
    }
}

fn ddr3_bracket(mhz: u32) -> usize {
    DDR3_BRACKETS
        .iter()
        .position(|&top| mhz <= top)
        .unwrap_or(DDR3_BRACKETS.len())
}

fn ddr3_trfc_ns(capacity_per_die: u64) -> u32 {
    match capacity_per_die {
        0..=0x0400_0000 => 90,
        0x0400_0001..=0x0800_0000 => 110,
        0x0800_0001..=0x1000_0000 => 160,
        0x1000_0001..=0x2000_0000 => 260,
        _ => 350,
    }
}

fn ddr3_profile(inp: &TimingInputs<'_>) -> Result<TimingProfile> {
    let f = inp.freq_mhz;
    let cfg = inp.config;
    let bin = inp.speed_bin.index() as usize;
    let (trc_ns, tfaw_ns) = DDR3_TRC_TFAW[bin];

    if f > DDR3_MAX_MHZ {
        return Err(DramError::UnsupportedFrequency { mhz: f });
    }

    let dll_off = f <= cfg.dram_dll_dis_freq;
    let (cl, cwl) = if dll_off {
        (6, 6)
    } else {
        let b = ddr3_bracket(f);
        (DDR3_CL[bin][b] as u32, DDR3_CWL[b] as u32)
    };
    if cl == 0 {
        return Err(DramError::UnsupportedFrequency { mhz: f });
    }

    let mut t = PctlTiming {
        ddr_freq: f,
        togcnt1u: f / 2,
        togcnt100n: f / 20,
        tinit: 200,
        trsth: 500,
        ..Default::default()
    };

    // 7.8us average refresh interval, in 100ns units
    t.trefi = TREFI_UPDATE | 78;
    t.trefi_mem_ddr3 = 78 * t.togcnt100n;
    t.tmrd = 4;
    t.trfc = field("trfc", ps_to_cycles(ddr3_trfc_ns(inp.capacity_per_die) * 1000, f), 9)?;
    t.texsr = 512;
    t.trp = cl;
    t.trcd = cl;
    t.tras = field("tras", ps_to_cycles(37_500, f), 6)?;
    t.trc = field("trc", t.tras + t.trp, 6)?;
    t.trtw = (cl + 2).saturating_sub(cwl);
    t.tal = 0;
    t.tcl = cl;
    t.tcwl = cwl;

    let trrd = ps_to_cycles(7_500, f).max(4);
    t.trrd = field("trrd", trrd, 4)?;
    let trtp = ps_to_cycles(7_500, f).max(4);
    t.trtp = field("trtp", trtp, 4)?;
    let twr = ps_to_cycles(15_000, f);
    t.twr = field("twr", twr, 5)?;
    let twtr = ps_to_cycles(7_500, f).max(4);
    t.twtr = field("twtr", twtr, 4)?;
    t.txp = field("txp", ps_to_cycles(7_500, f).max(3), 3)?;
    t.txpdll = field("txpdll", ps_to_cycles(24_000, f).max(10), 6)?;
    t.tzqcs = field("tzqcs", ps_to_cycles(80_000, f).max(64), 7)?;
    t.tzqcsi = 0;
    t.tdqs = 1;
    let tcksre = ps_to_cycles(10_000, f).max(5);
    t.tcksre = field("tcksre", tcksre, 5)?;
    t.tcksrx = t.tcksre;
    let tcke_ps = if f >= 533 { 6_000 } else { 7_500 };
    let tcke = ps_to_cycles(tcke_ps, f).max(3);
    t.tcke = field("tcke", tcke, 3)?;
    t.tckesr = field("tckesr", tcke + 1, 4)?;
    t.tmod = field("tmod", ps_to_cycles(15_000, f).max(12), 5)?;
    t.trstl = field("trstl", ps_to_cycles(100_000, f), 7)?;
    t.tzqcl = field("tzqcl", ps_to_cycles(320_000, f).max(256), 10)?;
    t.tmrr = 0;
    t.tdpd = inp.tdpd;

    let rtt_nom = if f <= cfg.dram_odt_dis_freq {
        ddr3::RTT_NOM_DIS
    } else {
        cfg.ddr3_odt
    };
    let mr = [
        ddr3::mr0(cl, twr),
        cfg.ddr3_drv | rtt_nom,
        ddr3::mr2(cwl),
        0,
    ];

    let ddr_timing = NocTiming::new_with_raw_value(0)
        .with_act_to_act(fit_u6("act_to_act", ps_to_cycles(trc_ns as u32 * 1000, f) / 2)?)
        .with_rd_to_miss(fit_u6("rd_to_miss", (trtp + cl + cl - BL / 2) / 2)?)
        .with_wr_to_miss(fit_u6("wr_to_miss", (cwl + twr + cl + cl) / 2)?)
        .with_burst_len(fit_u3("burst_len", BL / 2 / 2)?)
        .with_rd_to_wr(fit_u5("rd_to_wr", t.trtw / 2)?)
        .with_wr_to_rd(fit_u5("wr_to_rd", (twtr + cwl) / 2)?);
    let activate = NocActivate::new_with_raw_value(0)
        .with_rrd(fit_u4("rrd", trrd / 2)?)
        .with_faw(fit_u6("faw", ps_to_cycles(tfaw_ns as u32 * 1000, f) / 2)?)
        .with_faw_bank(true);

    Ok(TimingProfile {
        pctl: t,
        mr,
        mr11: 0,
        dll_off,
        fabric: BusFabricTiming {
            ddr_timing,
            activate,
            read_latency: (cl + cl + cl + BL / 2 + 26) / 2,
            dev_to_dev: DEVTODEV_DEFAULT,
        },
    })
}

fn lpddr_profile(inp: &TimingInputs<'_>) -> Result<TimingProfile> {
    let f = inp.freq_mhz;
    let cfg = inp.config;
    let lp3 = inp.dram_type == DramType::Lpddr3;
    let table: &[(u32, u32, u32)] = if lp3 { &LPDDR3_RL_WL } else { &LPDDR2_RL_WL };
    let (rl, wl) = table
        .iter()
        .find(|(top, _, _)| f <= *top)
        .map(|&(_, rl, wl)| (rl, wl))
        .ok_or(DramError::UnsupportedFrequency { mhz: f })?;

    let mut t = PctlTiming {
        ddr_freq: f,
        togcnt1u: f / 2,
        togcnt100n: f / 20,
        tinit: 200,
        trsth: 0,
        ..Default::default()
    };

    // 3.9us average refresh interval
    t.trefi = TREFI_UPDATE | 39;
    t.trefi_mem_ddr3 = 0;
    t.tmrd = 5;
    let trfc_ns = if inp.capacity_per_die <= 0x2000_0000 { 130 } else { 210 };
    t.trfc = field("trfc", ps_to_cycles(trfc_ns * 1000, f), 9)?;
    t.texsr = field("texsr", ps_to_cycles((trfc_ns + 10) * 1000, f).max(2), 10)?;
    // per-bank tRP; TRP.prea_extra adds the all-bank margin
    let trp = ps_to_cycles(18_000, f).max(3);
    t.trp = field("trp", trp, 4)? | TRP_PREA_EXTRA;
    let trcd = ps_to_cycles(18_000, f).max(3);
    t.trcd = field("trcd", trcd, 4)?;
    t.tras = field("tras", ps_to_cycles(42_000, f).max(3), 6)?;
    t.trc = field("trc", t.tras + trp, 6)?;
    let dqsck = ps_to_cycles(5_500, f);
    t.trtw = field("trtw", (rl + dqsck + BL / 2).saturating_sub(wl), 4)?;
    t.tal = 0;
    t.tcl = rl;
    t.tcwl = wl;

    let trrd = ps_to_cycles(10_000, f).max(2);
    t.trrd = field("trrd", trrd, 4)?;
    let short_min = if lp3 { 4 } else { 2 };
    let trtp = ps_to_cycles(7_500, f).max(short_min);
    t.trtp = field("trtp", trtp, 4)?;
    let twr = ps_to_cycles(15_000, f).max(3);
    t.twr = field("twr", twr, 5)?;
    let twtr = ps_to_cycles(7_500, f).max(short_min);
    t.twtr = field("twtr", twtr, 4)?;
    t.txp = field("txp", ps_to_cycles(7_500, f).max(if lp3 { 3 } else { 2 }), 3)?;
    t.txpdll = 0;
    t.tzqcs = field("tzqcs", ps_to_cycles(90_000, f).max(6), 7)?;
    t.tzqcsi = 0;
    t.tdqs = 1;
    t.tcksre = 2;
    t.tcksrx = 2;
    t.tcke = 3;
    t.tckesr = field("tckesr", ps_to_cycles(15_000, f).max(3), 4)?;
    t.tmod = 0;
    t.trstl = 0;
    t.tzqcl = field("tzqcl", ps_to_cycles(360_000, f).max(6), 10)?;
    t.tmrr = if lp3 { 4 } else { 2 };
    t.tdpd = inp.tdpd;

    let nwr = if lp3 { twr.max(6) } else { twr };
    let drive = if lp3 { cfg.lpddr3_drv } else { cfg.lpddr2_drv };
    let mr11 = if lp3 && f > cfg.dram_odt_dis_freq {
        cfg.lpddr3_odt
    } else {
        lpddr::ODT_DIS
    };
    let mr = [0, lpddr::mr1(nwr), lpddr::mr2(rl, nwr), drive];

    let ddr_timing = NocTiming::new_with_raw_value(0)
        .with_act_to_act(fit_u6("act_to_act", t.trc / 2)?)
        .with_rd_to_miss(fit_u6("rd_to_miss", (trtp + trp + trcd).saturating_sub(BL / 2) / 2)?)
        .with_wr_to_miss(fit_u6("wr_to_miss", (wl + twr + trp + trcd) / 2)?)
        .with_burst_len(fit_u3("burst_len", BL / 2 / 2)?)
        .with_rd_to_wr(fit_u5("rd_to_wr", t.trtw / 2)?)
        .with_wr_to_rd(fit_u5("wr_to_rd", (twtr + wl) / 2)?);
    let activate = NocActivate::new_with_raw_value(0)
        .with_rrd(fit_u4("rrd", trrd / 2)?)
        .with_faw(fit_u6("faw", ps_to_cycles(50_000, f) / 2)?)
        .with_faw_bank(true);

    Ok(TimingProfile {
        pctl: t,
        mr,
        mr11,
        dll_off: false,
        fabric: BusFabricTiming {
            ddr_timing,
            activate,
            read_latency: (trp + trcd + rl + BL / 2 + 26) / 2,
            dev_to_dev: DEVTODEV_DEFAULT,
        },
    })
}
