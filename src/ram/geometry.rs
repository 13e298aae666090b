use super::grf::{OsReg2, GRF_OS_REG2};
use super::registers::{Block, RegisterIo, Registers};
use crate::error::{DramError, Result};

/// Type code as reported by the loader straps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DramType {
    Lpddr = 0,
    Ddr = 1,
    Ddr2 = 2,
    Ddr3 = 3,
    Lpddr2S2 = 4,
    Lpddr2 = 5,
    Lpddr3 = 6,
}

impl DramType {
    pub fn from_code(code: u32) -> Result<Self> {
        Ok(match code {
            0 => DramType::Lpddr,
            1 => DramType::Ddr,
            2 => DramType::Ddr2,
            3 => DramType::Ddr3,
            4 => DramType::Lpddr2S2,
            5 => DramType::Lpddr2,
            6 => DramType::Lpddr3,
            other => return Err(DramError::UnsupportedDramType(other)),
        })
    }

    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Only these three are scaled at runtime.
    pub fn ensure_supported(self) -> Result<Self> {
        match self {
            DramType::Ddr3 | DramType::Lpddr2 | DramType::Lpddr3 => Ok(self),
            other => Err(DramError::UnsupportedDramType(other.code())),
        }
    }

    pub const fn is_lpddr(self) -> bool {
        matches!(self, DramType::Lpddr2 | DramType::Lpddr3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DramGeometry {
    pub dram_type: DramType,
    pub ranks: u32,
    pub col_bits: u32,
    pub bank_bits: u32,
    pub cs0_row_bits: u32,
    pub cs1_row_bits: u32,
    /// log2 of the bus width in bytes.
    pub bus_width: u32,
    pub die_bus_width: u32,
}

impl DramGeometry {
    pub fn from_straps(raw: u32) -> Result<Self> {
        let s = OsReg2::new_with_raw_value(raw);
        Ok(DramGeometry {
            dram_type: DramType::from_code(s.dram_type().value() as u32)?,
            ranks: s.dual_rank() as u32 + 1,
            col_bits: 9 + s.col_extra().value() as u32,
            bank_bits: 3 - s.four_banks() as u32,
            cs0_row_bits: 13 + s.cs0_row_extra().value() as u32,
            cs1_row_bits: 13 + s.cs1_row_extra().value() as u32,
            bus_width: 2 >> s.bw_shift().value(),
            die_bus_width: 2 >> s.die_bw_shift().value(),
        })
    }

    pub fn read<M: RegisterIo>(regs: &Registers<'_, M>) -> Result<Self> {
        Self::from_straps(regs.read32(Block::Grf, GRF_OS_REG2))
    }

    /// Bytes behind chip select `rank`.
    pub fn rank_capacity(&self, rank: u32) -> u64 {
        let row = if rank == 0 { self.cs0_row_bits } else { self.cs1_row_bits };
        1u64 << (row + self.col_bits + self.bank_bits + self.bus_width)
    }

    pub fn capacity(&self) -> u64 {
        (0..self.ranks).map(|r| self.rank_capacity(r)).sum()
    }

    pub fn dies_per_rank(&self) -> u32 {
        1 << self.bus_width.saturating_sub(self.die_bus_width)
    }

    pub fn capacity_per_die(&self) -> u64 {
        self.rank_capacity(0) / self.dies_per_rank() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_rank_x16_ddr3() {
        // DDR3, 1 rank, 10 col, 8 banks, 15 row, 16-bit bus, x16 die
        let raw = (3 << 13) | (1 << 9) | (2 << 6) | (1 << 2) | 1;
        let g = DramGeometry::from_straps(raw).unwrap();
        assert_eq!(g.dram_type, DramType::Ddr3);
        assert_eq!(g.ranks, 1);
        assert_eq!(g.col_bits, 10);
        assert_eq!(g.bank_bits, 3);
        assert_eq!(g.cs0_row_bits, 15);
        assert_eq!(g.bus_width, 1);
        assert_eq!(g.die_bus_width, 1);
        assert_eq!(g.capacity(), 512 << 20);
        assert_eq!(g.capacity_per_die(), 512 << 20);
    }

    #[test]
    fn splits_capacity_across_narrow_dies() {
        // 32-bit bus built from two x16 dies
        let raw = (3 << 13) | (1 << 9) | (1 << 6) | 1;
        let g = DramGeometry::from_straps(raw).unwrap();
        assert_eq!(g.dies_per_rank(), 2);
        assert_eq!(g.capacity_per_die() * 2, g.rank_capacity(0));
    }

    #[test]
    fn rejects_unknown_type_code() {
        assert_eq!(
            DramGeometry::from_straps(7 << 13),
            Err(DramError::UnsupportedDramType(7))
        );
        assert!(DramType::Ddr2.ensure_supported().is_err());
        assert!(DramType::Lpddr3.ensure_supported().is_ok());
    }
}
