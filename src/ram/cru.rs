//! Clock and reset unit: DPLL, clock gates, soft resets.

use super::registers::{hiword, REG_MASK};
use arbitrary_int::{u3, u6, u12};

/// Reference clock feeding every PLL.
pub const OSC_MHZ: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum PllId {
    Apll = 0,
    Dpll = 1,
    Cpll = 2,
    Gpll = 3,
}

#[inline(always)]
pub const fn pll_con(pll: PllId, i: usize) -> usize {
    (pll as usize) * 0x20 + i * 4
}

#[inline(always)]
pub const fn clksel_con(i: usize) -> usize {
    0x60 + i * 4
}

pub const CLKGATE_CON: usize = 0x120;
pub const CLKGATE_COUNT: usize = 20;

#[inline(always)]
pub const fn clkgate_con(i: usize) -> usize {
    CLKGATE_CON + i * 4
}

#[inline(always)]
pub const fn softrst_con(i: usize) -> usize {
    0x1c0 + i * 4
}

/// CLKSEL holding the DDR clock source and divider.
pub const DDR_CLKSEL: usize = clksel_con(4);
pub const DDR_CLKSEL_MASK: u32 = 0x307;

/// Writing this to every gate register un-gates every clock.
pub const UNGATE_ALL: u32 = REG_MASK;

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct PllCon0 {
    #[bits(0..=11, rw)]
    fbdiv: u12,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct PllCon1 {
    #[bits(12..=14, rw)]
    postdiv2: u3,
    #[bits(8..=10, rw)]
    postdiv1: u3,
    #[bits(0..=5, rw)]
    refdiv: u6,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct PllCon2 {
    #[bit(31, r)]
    locked: bool,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct PllCon3 {
    #[bit(8, rw)]
    normal_mode: bool,
}

pub const PLL_LOCK_STATUS: u32 = 1 << 31;
pub const PLL_MODE_SLOW: u32 = hiword(1 << 8, 0);
pub const PLL_MODE_NORM: u32 = hiword(1 << 8, 1 << 8);
pub const PLL_MODE_RST: u32 = hiword(1 << 2, 1 << 2);
pub const PLL_MODE_DERST: u32 = hiword(1 << 2, 0);

/// Masked CON0 write carrying a new feedback divider.
#[inline(always)]
pub fn fbdiv_write(fbdiv: u32) -> u32 {
    hiword(0xfff, PllCon0::new_with_raw_value(0).with_fbdiv(u12::new((fbdiv & 0xfff) as u16)).raw_value())
}

/// Masked CON1 write carrying reference and post dividers.
#[inline(always)]
pub fn dividers_write(refdiv: u32, postdiv1: u32, postdiv2: u32) -> u32 {
    let con1 = PllCon1::new_with_raw_value(0)
        .with_refdiv(u6::new((refdiv & 0x3f) as u8))
        .with_postdiv1(u3::new((postdiv1 & 0x7) as u8))
        .with_postdiv2(u3::new((postdiv2 & 0x7) as u8));
    hiword(0x773f, con1.raw_value())
}

/// uPCTL soft reset lives in SOFTRST_CON2, PHY in SOFTRST_CON1.
pub const PCTL_SOFTRST: usize = softrst_con(2);
pub const PHY_SOFTRST: usize = softrst_con(1);
pub const PCTL_RESET: u32 = hiword(0x03, 0x03);
pub const PCTL_DERESET: u32 = hiword(0x03, 0);
pub const PHY_RESET: u32 = hiword(0x06, 0x06);
pub const PHY_DERESET: u32 = hiword(0x06, 0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dpll_registers_are_second_bank() {
        assert_eq!(pll_con(PllId::Dpll, 0), 0x20);
        assert_eq!(pll_con(PllId::Dpll, 3), 0x2c);
    }

    #[test]
    fn divider_writes_match_masked_layout() {
        assert_eq!(fbdiv_write(55), (0xfff << 16) | 55);
        assert_eq!(dividers_write(1, 4, 1), (0x7 << 28) | (0x7 << 24) | (0x3f << 16) | (1 << 12) | (4 << 8) | 1);
        assert_eq!(PLL_MODE_NORM, (1 << 24) | (1 << 8));
        assert_eq!(PLL_MODE_SLOW, 1 << 24);
    }
}
