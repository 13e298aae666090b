//! Resume snapshot.
//!
//! `ControllerSnapshot` is read by the resume code with the MMU off, long
//! before this crate runs again, so its layout is fixed: `#[repr(C)]`, all
//! `u32`, block addresses are bus addresses. The first half is the live
//! state the frequency sequencer works from; the second half is filled by
//! `capture` right before suspend.

use super::cru::{
    pll_con, PllId, DDR_CLKSEL, DDR_CLKSEL_MASK, PCTL_DERESET, PCTL_RESET,
    PCTL_SOFTRST, PHY_DERESET, PHY_RESET, PHY_SOFTRST, PLL_LOCK_STATUS, PLL_MODE_DERST,
    PLL_MODE_NORM, PLL_MODE_RST, PLL_MODE_SLOW,
};
use super::grf::{GRF_SOC_CON0, GRF_SOC_CON1, PMU_DDR_IO_RET, SOC_CON0_RESTORE_MASK, SOC_CON1_RESTORE_MASK};
use super::msch;
use super::pctl::{self, TIMING_WORDS, TOGCNT1U, TREFI_UPDATE};
use super::phy::{self, REG02, REG2C, REG3C, REG4C, REG5C, REGFB, REGFC, REGFD, REGFE};
use super::registers::{Block, BlockMap, RegisterIo, Registers, REG_MASK};
use super::timing::{PctlTiming, TimingProfile};
use crate::config::TimingConfig;

/// "V101"
pub const SNAPSHOT_TAG: u32 = 0x5631_3031;
pub const SNAPSHOT_END_TAG: u32 = 0xFFFF_FFFF;
/// Address value telling the resume code to skip a step.
pub const SKIP_ADDR: u32 = 0xFFFF_FFFF;

sram_rodata! {
    /// DFI registers saved after the timing block, in layout order.
    pub static PCTL_DFI_REGS: [usize; 25] = [
        pctl::DFITCTRLDELAY,
        pctl::DFIODTCFG,
        pctl::DFIODTCFG1,
        pctl::DFIODTRANKMAP,
        pctl::DFITPHYWRDATA,
        pctl::DFITPHYWRLAT,
        pctl::DFITPHYWRDATALAT,
        pctl::DFITRDDATAEN,
        pctl::DFITPHYRDLAT,
        pctl::DFITPHYUPDTYPE0,
        pctl::DFITPHYUPDTYPE1,
        pctl::DFITPHYUPDTYPE2,
        pctl::DFITPHYUPDTYPE3,
        pctl::DFITCTRLUPDMIN,
        pctl::DFITCTRLUPDMAX,
        pctl::DFITCTRLUPDDLY,
        pctl::DFIUPDCFG,
        pctl::DFITREFMSKI,
        pctl::DFITCTRLUPDI,
        pctl::DFISTCFG0,
        pctl::DFISTCFG1,
        pctl::DFITDRAMCLKEN,
        pctl::DFITDRAMCLKDIS,
        pctl::DFISTCFG2,
        pctl::DFILPCFG0,
    ];
}

/// PHY registers in layout order. The last four slots hold the per-lane
/// gate training results, not REGFB..REGFE themselves.
pub const PHY_SAVED_REGS: [usize; 47] = [
    phy::REG00, phy::REG01, phy::REG0B, phy::REG0C, phy::REG11, phy::REG12, phy::REG13,
    phy::REG14, phy::REG16, phy::REG18, phy::REG20, phy::REG21, phy::REG26, phy::REG27,
    phy::REG28, phy::REG2E, phy::REG2F, phy::REG30, phy::REG31, phy::REG36, phy::REG37,
    phy::REG38, phy::REG3E, phy::REG3F, phy::REG40, phy::REG41, phy::REG46, phy::REG47,
    phy::REG48, phy::REG4E, phy::REG4F, phy::REG50, phy::REG51, phy::REG56, phy::REG57,
    phy::REG58, phy::REG5E, phy::REG5F, phy::REGDLL, phy::REGEC, phy::REGED, phy::REGEE,
    phy::REGEF, REGFB, REGFC, REGFD, REGFE,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct PctlSaved {
    pub scfg: u32,
    pub cmdtstaten: u32,
    pub mcfg1: u32,
    pub mcfg: u32,
    pub ppcfg: u32,
    pub timing: PctlTiming,
    pub dfi: [u32; 25],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct PhySaved {
    pub regs: [u32; 47],
}

impl PhySaved {
    /// Saved value of PHY register `offset`.
    pub fn get(&self, offset: usize) -> u32 {
        PHY_SAVED_REGS
            .iter()
            .position(|&r| r == offset)
            .map_or(0, |i| self.regs[i])
    }

    fn set(&mut self, offset: usize, value: u32) {
        if let Some(i) = PHY_SAVED_REGS.iter().position(|&r| r == offset) {
            self.regs[i] = value;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct MschSaved {
    pub ddrconf: u32,
    pub ddrtiming: u32,
    pub ddrmode: u32,
    pub readlatency: u32,
    pub activate: u32,
    pub devtodev: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct ControllerSnapshot {
    pub tag: u32,

    pub pctl_timing: PctlTiming,
    pub noc_timing: u32,
    pub mr: [u32; 4],
    pub mr11: u32,
    pub mem_type: u32,
    pub speed_bin: u32,
    pub capacity_per_die: u32,
    pub dll_status: u32,
    pub sr_idle: u32,
    pub timing_config: TimingConfig,
    pub read_latency: u32,
    pub noc_activate: u32,
    pub dev_to_dev: u32,

    pub pctl_addr: u32,
    pub pctl: PctlSaved,
    pub phy_addr: u32,
    pub phy: PhySaved,
    pub noc_addr: u32,
    pub noc: MschSaved,

    pub pll_select: u32,
    pub dpll_mode_addr: u32,
    pub dpll_slow_mode: u32,
    pub dpll_normal_mode: u32,
    pub dpll_reset_addr: u32,
    pub dpll_reset: u32,
    pub dpll_dereset: u32,
    pub dpll_con_addr: u32,
    pub dpll_con: [u32; 6],
    pub dpll_lock_addr: u32,
    pub dpll_lock_mask: u32,
    pub dpll_lock_val: u32,
    pub ddr_pll_src_div_addr: u32,
    pub ddr_pll_src_div: u32,

    pub grf_con0_addr: u32,
    pub grf_con0: u32,
    pub grf_con1_addr: u32,
    pub grf_con1: u32,

    pub cru_phy_softrst_addr: u32,
    pub cru_phy_reset: u32,
    pub cru_phy_dereset: u32,
    pub cru_pctl_softrst_addr: u32,
    pub cru_pctl_reset: u32,
    pub cru_pctl_dereset: u32,
    pub phy_softrst_addr: u32,

    pub pmu_io_ret_addr: u32,
    pub end_tag: u32,
}

pub const SNAPSHOT_WORDS: usize = core::mem::size_of::<ControllerSnapshot>() / 4;

impl ControllerSnapshot {
    pub fn zeroed() -> Self {
        // SAFETY: every field is a u32 or an array/struct of u32, for which
        // all-zero is a valid value.
        unsafe { core::mem::zeroed() }
    }

    /// Publishes a computed profile as the one the next change will apply.
    pub fn stage_profile(&mut self, profile: &TimingProfile) {
        self.pctl_timing = profile.pctl;
        self.noc_timing = profile.fabric.ddr_timing.raw_value();
        self.mr = profile.mr;
        self.mr11 = profile.mr11;
        self.read_latency = profile.fabric.read_latency;
        self.noc_activate = profile.fabric.activate.raw_value();
        self.dev_to_dev = profile.fabric.dev_to_dev;
    }

    /// Raw bytes of the snapshot as consumed by the resume stage.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: repr(C) made only of u32 fields, so no padding and every
        // byte is initialised.
        unsafe {
            core::slice::from_raw_parts(
                self as *const Self as *const u8,
                core::mem::size_of::<Self>(),
            )
        }
    }

    /// Saves everything the resume stage replays. `phys` supplies the bus
    /// addresses recorded for it.
    pub fn capture<M: RegisterIo>(&mut self, regs: &Registers<'_, M>, phys: &BlockMap) {
        let bus = |block: Block, offset: usize| phys.addr(block, offset) as u32;

        self.tag = SNAPSHOT_TAG;
        self.pctl_addr = phys.pctl as u32;
        self.phy_addr = phys.phy as u32;
        self.noc_addr = phys.msch as u32;

        let mut words = [0u32; TIMING_WORDS];
        regs.read_words(Block::Pctl, TOGCNT1U, &mut words);
        let ddr_freq = words[0] * 2;
        self.pctl.timing = PctlTiming::from_register_words(ddr_freq, &words);
        self.pctl.timing.trefi |= TREFI_UPDATE;
        self.pctl.scfg = regs.read32(Block::Pctl, pctl::SCFG);
        self.pctl.cmdtstaten = regs.read32(Block::Pctl, pctl::CMDTSTATEN);
        self.pctl.mcfg1 = regs.read32(Block::Pctl, pctl::MCFG1);
        self.pctl.mcfg = regs.read32(Block::Pctl, pctl::MCFG);
        self.pctl.ppcfg = regs.read32(Block::Pctl, pctl::PPCFG);
        for (slot, &reg) in self.pctl.dfi.iter_mut().zip(PCTL_DFI_REGS.iter()) {
            *slot = regs.read32(Block::Pctl, reg);
        }

        for (slot, &reg) in self.phy.regs.iter_mut().zip(PHY_SAVED_REGS.iter()).take(42) {
            *slot = regs.read32(Block::Phy, reg);
        }
        self.phy.set(phy::REGEF, 0);
        let gate_source = if regs.read32(Block::Phy, REG02) & 0x2 != 0 {
            [REG2C, REG3C, REG4C, REG5C]
        } else {
            [REGFB, REGFC, REGFD, REGFE]
        };
        for (dst, src) in [REGFB, REGFC, REGFD, REGFE].into_iter().zip(gate_source) {
            let v = regs.read32(Block::Phy, src);
            self.phy.set(dst, v);
        }

        self.noc = MschSaved {
            ddrconf: regs.read32(Block::Msch, msch::DDRCONF),
            ddrtiming: regs.read32(Block::Msch, msch::DDRTIMING),
            ddrmode: regs.read32(Block::Msch, msch::DDRMODE),
            readlatency: regs.read32(Block::Msch, msch::READLATENCY),
            activate: regs.read32(Block::Msch, msch::ACTIVATE),
            devtodev: regs.read32(Block::Msch, msch::DEVTODEV),
        };
        self.pll_select = regs.read32(Block::Phy, phy::REGEF) & 0x1;

        let dpll = |i| pll_con(PllId::Dpll, i);
        self.dpll_mode_addr = bus(Block::Cru, dpll(3));
        self.dpll_slow_mode = PLL_MODE_SLOW;
        self.dpll_normal_mode = PLL_MODE_NORM;
        self.dpll_reset_addr = bus(Block::Cru, dpll(4));
        self.dpll_reset = PLL_MODE_RST;
        self.dpll_dereset = PLL_MODE_DERST;
        self.dpll_con_addr = bus(Block::Cru, dpll(0));
        self.dpll_con = [
            regs.read32(Block::Cru, dpll(0)) | REG_MASK,
            regs.read32(Block::Cru, dpll(1)) | REG_MASK,
            regs.read32(Block::Cru, dpll(2)),
            (regs.read32(Block::Cru, dpll(3)) | REG_MASK) & !(1 << 8),
            regs.read32(Block::Cru, dpll(4)) | REG_MASK,
            regs.read32(Block::Cru, dpll(5)) | REG_MASK,
        ];
        self.dpll_lock_addr = bus(Block::Cru, dpll(2));
        self.dpll_lock_mask = PLL_LOCK_STATUS;
        self.dpll_lock_val = PLL_LOCK_STATUS;

        self.ddr_pll_src_div_addr = bus(Block::Cru, DDR_CLKSEL);
        self.ddr_pll_src_div =
            (regs.read32(Block::Cru, DDR_CLKSEL) & DDR_CLKSEL_MASK) | (DDR_CLKSEL_MASK << 16);

        self.grf_con0_addr = bus(Block::Grf, GRF_SOC_CON0);
        self.grf_con0 = (regs.read32(Block::Grf, GRF_SOC_CON0) & SOC_CON0_RESTORE_MASK)
            | (SOC_CON0_RESTORE_MASK << 16);
        self.grf_con1_addr = bus(Block::Grf, GRF_SOC_CON1);
        self.grf_con1 = regs.read32(Block::Grf, GRF_SOC_CON1) | (SOC_CON1_RESTORE_MASK << 16);

        self.cru_phy_softrst_addr = bus(Block::Cru, PHY_SOFTRST);
        self.cru_phy_reset = PHY_RESET;
        self.cru_phy_dereset = PHY_DERESET;
        self.cru_pctl_softrst_addr = bus(Block::Cru, PCTL_SOFTRST);
        self.cru_pctl_reset = PCTL_RESET;
        self.cru_pctl_dereset = PCTL_DERESET;
        self.phy_softrst_addr = phys.phy as u32;

        self.pmu_io_ret_addr = bus(Block::Pmu, PMU_DDR_IO_RET);
        self.end_tag = SNAPSHOT_END_TAG;
    }
}
