//! DDR PHY register map. Register `n` lives at byte offset `n * 4`.

use arbitrary_int::u4;

pub const fn reg(n: usize) -> usize {
    n * 4
}

pub const REG00: usize = reg(0x00);
pub const REG01: usize = reg(0x01);
pub const REG02: usize = reg(0x02);
pub const REG0B: usize = reg(0x0b);
pub const REG0C: usize = reg(0x0c);
pub const REG11: usize = reg(0x11);
pub const REG12: usize = reg(0x12);
pub const REG13: usize = reg(0x13);
pub const REG14: usize = reg(0x14);
pub const REG16: usize = reg(0x16);
pub const REG18: usize = reg(0x18);
pub const REG20: usize = reg(0x20);
pub const REG21: usize = reg(0x21);
pub const REG26: usize = reg(0x26);
pub const REG27: usize = reg(0x27);
pub const REG28: usize = reg(0x28);
pub const REG2C: usize = reg(0x2c);
pub const REG2E: usize = reg(0x2e);
pub const REG2F: usize = reg(0x2f);
pub const REG30: usize = reg(0x30);
pub const REG31: usize = reg(0x31);
pub const REG36: usize = reg(0x36);
pub const REG37: usize = reg(0x37);
pub const REG38: usize = reg(0x38);
pub const REG3C: usize = reg(0x3c);
pub const REG3E: usize = reg(0x3e);
pub const REG3F: usize = reg(0x3f);
pub const REG40: usize = reg(0x40);
pub const REG41: usize = reg(0x41);
pub const REG46: usize = reg(0x46);
pub const REG47: usize = reg(0x47);
pub const REG48: usize = reg(0x48);
pub const REG4C: usize = reg(0x4c);
pub const REG4E: usize = reg(0x4e);
pub const REG4F: usize = reg(0x4f);
pub const REG50: usize = reg(0x50);
pub const REG51: usize = reg(0x51);
pub const REG56: usize = reg(0x56);
pub const REG57: usize = reg(0x57);
pub const REG58: usize = reg(0x58);
pub const REG5C: usize = reg(0x5c);
pub const REG5E: usize = reg(0x5e);
pub const REG5F: usize = reg(0x5f);
pub const REGDLL: usize = reg(0xa4);
pub const REGEC: usize = reg(0xec);
pub const REGED: usize = reg(0xed);
pub const REGEE: usize = reg(0xee);
pub const REGEF: usize = reg(0xef);
pub const REGFB: usize = reg(0xfb);
pub const REGFC: usize = reg(0xfc);
pub const REGFD: usize = reg(0xfd);
pub const REGFE: usize = reg(0xfe);
pub const REGFF: usize = reg(0xff);

sram_rodata! {
    /// DQS drive strength, one register per byte lane and direction.
    pub static DQS_DRIVE_REGS: [usize; 8] = [REG20, REG2F, REG30, REG3F, REG40, REG4F, REG50, REG5F];
    /// DQS on-die termination, same lanes.
    pub static DQS_ODT_REGS: [usize; 8] = [REG21, REG2E, REG31, REG3E, REG41, REG4E, REG51, REG5E];

    /// Per-lane DQS gate results, written back in pairs on resume.
    pub static GATE_RESULT_PAIRS: [(usize, usize); 4] = [(0xb0, 0xb4), (0xf0, 0xf4), (0x130, 0x134), (0x170, 0x174)];
}

/// DLL bypass for every lane.
pub const DLL_BYPASS_MASK: u32 = 0x1f;

/// Above this frequency the DLL phase drops from 2 to 1.
pub const DLL_PHASE_SPLIT_MHZ: u32 = 680;

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct Reg00 {
    /// One bit per byte lane that is wired up.
    #[bits(4..=7, rw)]
    channel_select: u4,
    #[bit(3, rw)]
    soft_dereset_digital: bool,
    #[bit(2, rw)]
    soft_dereset_analog: bool,
}

pub const SOFT_DERESET_ANALOG: u32 = 1 << 2;
pub const SOFT_DERESET_DIGITAL: u32 = 1 << 3;

/// REG02: training control. Bits 2,3,6,7 are configuration that survives.
pub const REG02_KEEP_MASK: u32 = 0xcc;
pub const REG02_TRAINING_START: u32 = 0x21;
pub const REG02_TRAINING_STOP: u32 = 0x20;
pub const REG02_GATE_BYPASS: u32 = 0x02;

/// Drive strength / termination codes for DDR3 mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Ddr3RonRtt {
    Disable = 0,
    Ohm451 = 1,
    Ohm225 = 2,
    Ohm150 = 3,
    Ohm112 = 4,
    Ohm90 = 5,
    Ohm75 = 6,
    Ohm64 = 7,
    Ohm56 = 16,
    Ohm50 = 17,
    Ohm45 = 18,
    Ohm41 = 19,
    Ohm37 = 20,
    Ohm34 = 21,
    Ohm33 = 22,
    Ohm30 = 23,
    Ohm28 = 24,
}

/// Drive strength / termination codes for LPDDR2/LPDDR3 mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Lp23RonRtt {
    Disable = 0,
    Ohm480 = 1,
    Ohm240 = 2,
    Ohm160 = 3,
    Ohm120 = 4,
    Ohm96 = 5,
    Ohm80 = 6,
    Ohm68 = 7,
    Ohm60 = 16,
    Ohm53 = 17,
    Ohm48 = 18,
    Ohm43 = 19,
    Ohm40 = 20,
    Ohm37 = 21,
    Ohm34 = 22,
    Ohm32 = 23,
    Ohm30 = 24,
}

pub const RON_RTT_DISABLE: u32 = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_offsets_follow_index() {
        assert_eq!(REG0B, 0x2c);
        assert_eq!(REG2C, 0xb0);
        assert_eq!(REGFF, 0x3fc);
    }

    #[test]
    fn gate_pairs_shadow_lane_gate_registers() {
        assert_eq!(GATE_RESULT_PAIRS[0].0, REG2C);
        assert_eq!(GATE_RESULT_PAIRS[1].0, REG3C);
        assert_eq!(GATE_RESULT_PAIRS[2].0, REG4C);
        assert_eq!(GATE_RESULT_PAIRS[3].0, REG5C);
    }

    #[test]
    fn reg00_exposes_bus_width_and_resets() {
        let r = Reg00::new_with_raw_value(0x3c);
        assert_eq!(r.channel_select().value(), 0x3);
        assert!(r.soft_dereset_digital());
        assert!(r.soft_dereset_analog());
    }
}
