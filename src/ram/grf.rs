//! General register files and the PMU bits the DDR path needs.

use super::registers::hiword;
use arbitrary_int::{u2, u3};

pub const GRF_SOC_CON0: usize = 0x0400;
pub const GRF_SOC_CON1: usize = 0x0404;
pub const GRF_OS_REG2: usize = 0x0588;

/// Holds the controller's C_ACTIVE_IN so it refuses new requests.
pub const C_ACTIVE_IN_EN: u32 = hiword(1 << 3, 1 << 3);
pub const C_ACTIVE_IN_DISABLE: u32 = hiword(1 << 3, 0);

/// Every bus master stalls while DDR access is forbidden.
pub const MASTERS_STALL: u32 = 0x00ff_00ff;

/// Bits of SOC_CON0 / SOC_CON1 that are restored on resume.
pub const SOC_CON0_RESTORE_MASK: u32 = 0x7f;
pub const SOC_CON1_RESTORE_MASK: u32 = 0x1;

pub const PMU_GRF_SOC_CON0: usize = 0x0100;
/// PHY IO buffer isolation; clearing bit 2 enables the core-side buffer.
pub const PHY_BUFFER_ISOLATE: u32 = hiword(1 << 2, 0);
pub const PHY_BUFFER_RELEASE: u32 = hiword(1 << 2, 1 << 2);

pub const PMU_IDLE_REQ: usize = 0x003c;
pub const PMU_IDLE_ST: usize = 0x0040;
pub const IDLE_REQ_MSCH_EN: u32 = hiword(1 << 11, 1 << 11);
pub const IDLE_REQ_MSCH_DIS: u32 = hiword(1 << 11, 0);
pub const IDLE_MSCH_ST: u32 = 1 << 27;

/// Releases DDR IO retention after a power-off suspend.
pub const PMU_DDR_IO_RET: usize = 0x0018;
pub const DDR_IO_RET_RELEASE: u32 = 1 << 13;

/// Strap word the loader leaves in GRF_OS_REG2 describing the DRAM.
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct OsReg2 {
    #[bits(13..=15, r)]
    dram_type: u3,
    #[bit(11, r)]
    dual_rank: bool,
    #[bits(9..=10, r)]
    col_extra: u2,
    #[bit(8, r)]
    four_banks: bool,
    #[bits(6..=7, r)]
    cs0_row_extra: u2,
    #[bits(4..=5, r)]
    cs1_row_extra: u2,
    #[bits(2..=3, r)]
    bw_shift: u2,
    #[bits(0..=1, r)]
    die_bw_shift: u2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_active_in_toggles_bit_three() {
        assert_eq!(C_ACTIVE_IN_EN, (1 << 19) | (1 << 3));
        assert_eq!(C_ACTIVE_IN_DISABLE, 1 << 19);
    }

    #[test]
    fn pmu_masks_match_layout() {
        assert_eq!(IDLE_REQ_MSCH_EN, (1 << 27) | (1 << 11));
        assert_eq!(IDLE_REQ_MSCH_DIS, 1 << 27);
        assert_eq!(PHY_BUFFER_ISOLATE, 1 << 18);
        assert_eq!(PHY_BUFFER_RELEASE, (1 << 18) | (1 << 2));
    }
}
