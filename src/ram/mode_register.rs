//! DRAM mode register encodings and the MCMD command path.

use super::geometry::DramType;
use super::pctl::{DramCommand, Mcmd, ALL_RANKS, MCMD};
use super::registers::{Block, RegisterIo, Registers};

/// DDR3 MR0..MR3 fields.
pub mod ddr3 {
    use arbitrary_int::{u2, u3};

    pub const BL8: u32 = 0;
    pub const DLL_RESET: u32 = 1 << 8;
    /// MR1 bit 0.
    pub const DLL_DISABLE: u32 = 1;

    pub const DS_40: u32 = 0;
    pub const DS_34: u32 = 1 << 1;
    pub const RTT_NOM_DIS: u32 = 0;
    pub const RTT_NOM_60: u32 = 1 << 2;
    pub const RTT_NOM_120: u32 = 1 << 6;
    pub const RTT_NOM_40: u32 = (1 << 2) | (1 << 6);

    pub const RTT_WR_DIS: u32 = 0;
    pub const RTT_WR_60: u32 = 1 << 9;
    pub const RTT_WR_120: u32 = 2 << 9;

    #[bitbybit::bitfield(u32, default = 0x0)]
    #[derive(Debug, PartialEq, Eq)]
    pub struct Mr0 {
        /// Precharge power-down with the DLL on (fast exit).
        #[bit(12, rw)]
        fast_exit: bool,
        #[bits(9..=11, rw)]
        write_recovery: u3,
        #[bit(8, rw)]
        dll_reset: bool,
        #[bits(4..=6, rw)]
        cas_latency: u3,
        #[bit(2, rw)]
        cas_latency_ext: bool,
        #[bits(0..=1, rw)]
        burst_length: u2,
    }

    #[bitbybit::bitfield(u32, default = 0x0)]
    #[derive(Debug, PartialEq, Eq)]
    pub struct Mr2 {
        #[bits(9..=10, rw)]
        rtt_wr: u2,
        #[bits(3..=5, rw)]
        cas_write_latency: u3,
    }

    /// MR0 write recovery code for `nwr` clocks. Codes 1..=7 mean 5, 6, 7,
    /// 8, 10, 12, 14; 0 means 16.
    pub fn wr_code(nwr: u32) -> u8 {
        let nwr = nwr.max(5);
        let code = if nwr < 9 { nwr - 4 } else { (nwr + 1) >> 1 };
        (code & 0x7) as u8
    }

    pub fn mr0(cl: u32, nwr: u32) -> u32 {
        let cl = cl.wrapping_sub(4);
        Mr0::new_with_raw_value(BL8)
            .with_cas_latency(u3::new((cl & 0x7) as u8))
            .with_cas_latency_ext(cl & 0x8 != 0)
            .with_write_recovery(u3::new(wr_code(nwr)))
            .with_fast_exit(true)
            .raw_value()
    }

    pub fn mr2(cwl: u32) -> u32 {
        Mr2::new_with_raw_value(0)
            .with_cas_write_latency(u3::new((cwl.wrapping_sub(5) & 0x7) as u8))
            .raw_value()
    }
}

/// LPDDR2/LPDDR3 MR1/MR2/MR3/MR11 fields.
pub mod lpddr {
    use arbitrary_int::{u3, u4};

    pub const MR1: u8 = 1;
    pub const MR2: u8 = 2;
    pub const MR3: u8 = 3;
    pub const MR11: u8 = 11;

    /// MR3 output drive.
    pub const DS_34: u32 = 1;
    pub const DS_40: u32 = 2;
    pub const DS_48: u32 = 3;
    pub const DS_60: u32 = 4;
    pub const DS_80: u32 = 6;

    /// MR11 termination, LPDDR3 only.
    pub const ODT_DIS: u32 = 0;
    pub const ODT_60: u32 = 1;
    pub const ODT_120: u32 = 2;
    pub const ODT_240: u32 = 3;

    #[bitbybit::bitfield(u32, default = 0x0)]
    #[derive(Debug, PartialEq, Eq)]
    pub struct Mr1 {
        #[bits(5..=7, rw)]
        nwr: u3,
        #[bits(0..=2, rw)]
        burst_length: u3,
    }

    #[bitbybit::bitfield(u32, default = 0x0)]
    #[derive(Debug, PartialEq, Eq)]
    pub struct Mr2 {
        /// nWR above 9 (LPDDR3).
        #[bit(4, rw)]
        wr_ext: bool,
        #[bits(0..=3, rw)]
        rl_wl: u4,
    }

    const BL8: u8 = 3;

    fn nwr_code(nwr: u32) -> u8 {
        let code = if nwr > 9 { nwr - 10 } else { nwr.saturating_sub(2) };
        (code & 0x7) as u8
    }

    pub fn mr1(nwr: u32) -> u32 {
        Mr1::new_with_raw_value(0)
            .with_burst_length(u3::new(BL8))
            .with_nwr(u3::new(nwr_code(nwr)))
            .raw_value()
    }

    pub fn mr2(rl: u32, nwr: u32) -> u32 {
        Mr2::new_with_raw_value(0)
            .with_rl_wl(u4::new((rl.saturating_sub(2) & 0xf) as u8))
            .with_wr_ext(nwr > 9)
            .raw_value()
    }
}

/// DRAM DLL state tracked across changes, as stored in the resume layout.
pub const DLL_ENABLED: u32 = 0;
pub const DLL_DISABLED: u32 = 1;

/// What the mode register step needs from the pending change.
#[derive(Debug, Clone, Copy)]
pub struct ModeRegisterUpdate<'a> {
    pub dram_type: DramType,
    pub freq_mhz: u32,
    pub dll_dis_freq: u32,
    pub mr: &'a [u32; 4],
    pub mr11: u32,
}

sram_text! {
    /// Queues one command once the previous one has left MCMD.
    pub fn send_command<M: RegisterIo>(regs: &Registers<'_, M>, cmd: Mcmd) {
        regs.wait_for(Block::Pctl, MCMD, 1 << 31, 0);
        regs.write32(Block::Pctl, MCMD, cmd.raw_value());
        regs.dsb();
    }

    /// DDR3 MRS to every rank.
    pub fn mode_register_set<M: RegisterIo>(regs: &Registers<'_, M>, mr: u8, value: u32) {
        send_command(regs, Mcmd::command(ALL_RANKS, DramCommand::ModeRegister, mr, value));
    }

    /// LPDDR2/3 MRW to every rank.
    pub fn mode_register_write<M: RegisterIo>(regs: &Registers<'_, M>, ma: u8, op: u32) {
        send_command(regs, Mcmd::mode_register_write(ALL_RANKS, ma, (op & 0xff) as u8));
    }

    /// Reprograms the mode registers for the new frequency. The controller must
    /// be in CONFIG. `dll_status` is updated when the DDR3 DLL switches.
    pub fn update_mode_registers<M: RegisterIo>(
        regs: &Registers<'_, M>,
        upd: &ModeRegisterUpdate<'_>,
        dll_status: &mut u32,
    ) {
        match upd.dram_type {
            DramType::Ddr3 => {
                let mr = upd.mr;
                if upd.freq_mhz > upd.dll_dis_freq {
                    mode_register_set(regs, 1, mr[1]);
                    if *dll_status == DLL_DISABLED {
                        mode_register_set(regs, 0, mr[0] | ddr3::DLL_RESET);
                        // tDLLK needs at least 200 clocks before MR0 lands again
                        let f = upd.freq_mhz.max(1);
                        regs.delay_us(((200 + f - 1) / f).max(2));
                        mode_register_set(regs, 0, mr[0]);
                        *dll_status = DLL_ENABLED;
                    } else {
                        mode_register_set(regs, 0, mr[0]);
                    }
                } else {
                    mode_register_set(regs, 1, mr[1] | ddr3::DLL_DISABLE);
                    mode_register_set(regs, 0, mr[0]);
                    *dll_status = DLL_DISABLED;
                }
                mode_register_set(regs, 2, mr[2]);
            }
            DramType::Lpddr2 | DramType::Lpddr3 => {
                mode_register_write(regs, lpddr::MR1, upd.mr[1]);
                mode_register_write(regs, lpddr::MR3, upd.mr[3]);
                if upd.dram_type == DramType::Lpddr3 {
                    mode_register_write(regs, lpddr::MR11, upd.mr11);
                }
                mode_register_write(regs, lpddr::MR2, upd.mr[2]);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddr3_cas_latency_encoding() {
        assert_eq!(ddr3::mr0(5, 5) & 0x74, 1 << 4);
        assert_eq!(ddr3::mr0(11, 5) & 0x74, 7 << 4);
        // CL12 sets the extension bit
        assert_eq!(ddr3::mr0(12, 5) & 0x74, 1 << 2);
    }

    #[test]
    fn ddr3_write_recovery_codes() {
        assert_eq!(ddr3::wr_code(4), 1);
        assert_eq!(ddr3::wr_code(8), 4);
        assert_eq!(ddr3::wr_code(9), 5);
        assert_eq!(ddr3::wr_code(12), 6);
        assert_eq!(ddr3::wr_code(16), 0);
    }

    #[test]
    fn ddr3_mr2_cwl_offset() {
        assert_eq!(ddr3::mr2(5), 0);
        assert_eq!(ddr3::mr2(8), 3 << 3);
    }

    #[test]
    fn lpddr_mr1_nwr() {
        assert_eq!(lpddr::mr1(6), 3 | (4 << 5));
        assert_eq!(lpddr::mr1(11), 3 | (1 << 5));
    }
}
