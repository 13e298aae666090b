//! DPLL rate selection and reprogramming.

use super::cru::{
    dividers_write, fbdiv_write, pll_con, PllCon0, PllCon1, PllCon2, PllCon3, PllId, OSC_MHZ,
    PLL_MODE_NORM, PLL_MODE_SLOW,
};
use super::registers::{Block, RegisterIo, Registers};

pub const REFDIV: u32 = 1;
/// Feedback divider range the DPLL accepts. CON0 holds 12 bits.
pub const FBDIV_MIN: u32 = 16;
pub const FBDIV_MAX: u32 = 0xfff;

/// DPLL dividers. The DRAM clock is half the PLL output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct PllSetting {
    pub refdiv: u32,
    pub fbdiv: u32,
    pub postdiv1: u32,
    pub postdiv2: u32,
}

impl PllSetting {
    /// Closest setting at or below `mhz` of DRAM clock, or `None` when the
    /// feedback divider would leave `FBDIV_MIN..=FBDIV_MAX`.
    pub fn for_ddr_mhz(mhz: u32) -> Option<Self> {
        // POSTDIV1 is three bits wide, divide by 8 goes through both
        let (postdiv1, postdiv2) = match mhz {
            0..=150 => (4, 2),
            151..=200 => (6, 1),
            201..=300 => (4, 1),
            _ => (1, 1),
        };
        let fbdiv = mhz.checked_mul(2 * REFDIV * postdiv1 * postdiv2)? / OSC_MHZ;
        if !(FBDIV_MIN..=FBDIV_MAX).contains(&fbdiv) {
            return None;
        }
        Some(PllSetting {
            refdiv: REFDIV,
            fbdiv,
            postdiv1,
            postdiv2,
        })
    }

    pub fn ddr_mhz(&self) -> u32 {
        let div = 2 * self.refdiv * self.postdiv1 * self.postdiv2;
        if div == 0 {
            return 0;
        }
        OSC_MHZ * self.fbdiv / div
    }
}

/// DRAM frequency the DPLL can actually produce for a request of `mhz`, 0
/// if it cannot get there.
pub fn round_rate(mhz: u32) -> u32 {
    PllSetting::for_ddr_mhz(mhz).map_or(0, |s| s.ddr_mhz())
}

/// Output of `pll` in MHz, or the oscillator while it sits in slow mode.
pub fn read_pll_mhz<M: RegisterIo>(regs: &Registers<'_, M>, pll: PllId) -> u32 {
    let con0 = PllCon0::new_with_raw_value(regs.read32(Block::Cru, pll_con(pll, 0)));
    let con1 = PllCon1::new_with_raw_value(regs.read32(Block::Cru, pll_con(pll, 1)));
    let con3 = PllCon3::new_with_raw_value(regs.read32(Block::Cru, pll_con(pll, 3)));
    if !con3.normal_mode() {
        return OSC_MHZ;
    }
    let div = con1.refdiv().value() as u32 * con1.postdiv1().value() as u32 * con1.postdiv2().value() as u32;
    if div == 0 {
        return 0;
    }
    OSC_MHZ * con0.fbdiv().value() as u32 / div
}

pub fn ddr_frequency<M: RegisterIo>(regs: &Registers<'_, M>) -> u32 {
    read_pll_mhz(regs, PllId::Dpll) / 2
}

sram_text! {
    /// Relocks the DPLL on `setting`. Polls the lock bit for at most
    /// `lock_budget` microseconds and switches back to normal mode either
    /// way; the return value says whether lock was seen.
    pub fn program<M: RegisterIo>(regs: &Registers<'_, M>, setting: &PllSetting, lock_budget: u32) -> bool {
        regs.write32(Block::Cru, pll_con(PllId::Dpll, 3), PLL_MODE_SLOW);
        regs.write32(Block::Cru, pll_con(PllId::Dpll, 0), fbdiv_write(setting.fbdiv));
        regs.write32(
            Block::Cru,
            pll_con(PllId::Dpll, 1),
            dividers_write(setting.refdiv, setting.postdiv1, setting.postdiv2),
        );
        regs.delay_us(1);

        let mut locked = false;
        for _ in 0..lock_budget {
            if PllCon2::new_with_raw_value(regs.read32(Block::Cru, pll_con(PllId::Dpll, 2))).locked() {
                locked = true;
                break;
            }
            regs.delay_us(1);
        }

        regs.write32(Block::Cru, pll_con(PllId::Dpll, 3), PLL_MODE_NORM);
        locked
    }
}
