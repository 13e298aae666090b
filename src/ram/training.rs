//! PHY-side steps of a frequency change: DLL bypass, drive/ODT, data
//! training, and the controller's DFI low-power setup.

use super::geometry::DramType;
use super::mode_register::send_command;
use super::pctl::{
    DramCommand, Mcfg, Mcfg1, Mcmd, ALL_RANKS, DFILPCFG0, DFILPCFG0_DDR3, DFILPCFG0_LPDDR, MCFG,
    MCFG1, TREFI, TREFI_UPDATE,
};
use super::phy::{
    Reg00, DLL_BYPASS_MASK, DLL_PHASE_SPLIT_MHZ, DQS_DRIVE_REGS, DQS_ODT_REGS, REG00, REG02,
    REG02_KEEP_MASK, REG02_TRAINING_START, REG02_TRAINING_STOP, REG11, REG12, REG16, REG18, REG28,
    REG38, REGDLL, REGFF, RON_RTT_DISABLE,
};
use super::registers::{Block, RegisterIo, Registers};
use crate::config::TimingConfig;

/// Refreshes issued after training to make up for the ones it blocked.
const COMPENSATING_REFRESHES: usize = 4;

sram_text! {
    pub fn set_dll_bypass<M: RegisterIo>(regs: &Registers<'_, M>, freq_mhz: u32, phy_dll_dis_freq: u32) {
        let phase = if freq_mhz < DLL_PHASE_SPLIT_MHZ { 2 } else { 1 };
        regs.write32(Block::Phy, REG28, phase);
        regs.write32(Block::Phy, REG38, phase);

        if freq_mhz <= phy_dll_dis_freq {
            regs.set_bits(Block::Phy, REGDLL, DLL_BYPASS_MASK);
        } else {
            regs.clear_bits(Block::Phy, REGDLL, DLL_BYPASS_MASK);
        }
        regs.dsb();
    }
}

/// PHY drive and termination codes for one frequency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct PhyDrive {
    pub cmd: u32,
    pub clk: u32,
    pub dqs: u32,
    pub dqs_odt: u32,
}

impl PhyDrive {
    pub fn select(dram_type: DramType, freq_mhz: u32, cfg: &TimingConfig) -> Self {
        let odt_off = freq_mhz <= cfg.phy_odt_dis_freq;
        match dram_type {
            DramType::Ddr3 => PhyDrive {
                cmd: cfg.phy_ddr3_cmd_drv,
                clk: cfg.phy_ddr3_clk_drv,
                dqs: cfg.phy_ddr3_dqs_drv,
                dqs_odt: if odt_off { RON_RTT_DISABLE } else { cfg.phy_ddr3_odt },
            },
            _ => PhyDrive {
                cmd: cfg.phy_lp23_cmd_drv,
                clk: cfg.phy_lp23_clk_drv,
                dqs: cfg.phy_lp23_dqs_drv,
                dqs_odt: if odt_off || dram_type != DramType::Lpddr3 {
                    RON_RTT_DISABLE
                } else {
                    cfg.phy_lp3_odt
                },
            },
        }
    }
}

sram_text! {
    pub fn update_odt<M: RegisterIo>(regs: &Registers<'_, M>, drive: &PhyDrive) {
        regs.write32(Block::Phy, REG11, drive.cmd);
        regs.write32(Block::Phy, REG12, (drive.cmd << 3) | 0x2);
        regs.write32(Block::Phy, REG16, drive.clk);
        regs.write32(Block::Phy, REG18, drive.clk);
        for &reg in DQS_DRIVE_REGS.iter() {
            regs.write32(Block::Phy, reg, drive.dqs);
        }
        for &reg in DQS_ODT_REGS.iter() {
            regs.write32(Block::Phy, reg, drive.dqs_odt);
        }
    }

    /// Gate training with refresh held off, followed by a precharge-all and a
    /// few refreshes.
    pub fn data_training<M: RegisterIo>(regs: &Registers<'_, M>) {
        let trefi = regs.read32(Block::Pctl, TREFI);
        regs.write32(Block::Pctl, TREFI, TREFI_UPDATE);

        let lanes = Reg00::new_with_raw_value(regs.read32(Block::Phy, REG00))
            .channel_select()
            .value() as u32;
        let keep = regs.read32(Block::Phy, REG02) & REG02_KEEP_MASK;
        regs.write32(Block::Phy, REG02, REG02_TRAINING_START | keep);
        regs.delay_us(1);
        regs.wait_for(Block::Phy, REGFF, 0xf, lanes);
        regs.write32(Block::Phy, REG02, REG02_TRAINING_STOP | keep);

        send_command(regs, Mcmd::command(ALL_RANKS, DramCommand::PrechargeAll, 0, 0));
        for _ in 0..COMPENSATING_REFRESHES {
            send_command(regs, Mcmd::command(ALL_RANKS, DramCommand::Refresh, 0, 0));
        }

        regs.write32(Block::Pctl, TREFI, trefi | TREFI_UPDATE);
    }

    /// Self-refresh and power-down idle thresholds. DDR3 must keep its clock
    /// running in power-down, LPDDR2/3 may stop it.
    pub fn set_dfi_lp<M: RegisterIo>(regs: &Registers<'_, M>, dram_type: DramType, sr_idle: u32, pd_idle: u32) {
        let lpcfg = if dram_type == DramType::Ddr3 { DFILPCFG0_DDR3 } else { DFILPCFG0_LPDDR };
        regs.write32(Block::Pctl, DFILPCFG0, lpcfg);

        let mcfg1 = Mcfg1::new_with_raw_value(regs.read32(Block::Pctl, MCFG1))
            .with_sr_idle((sr_idle & 0xff) as u8)
            .with_hw_exit_idle_en(true);
        regs.write32(Block::Pctl, MCFG1, mcfg1.raw_value());

        let mcfg = Mcfg::new_with_raw_value(regs.read32(Block::Pctl, MCFG))
            .with_pd_idle((pd_idle & 0xff) as u8)
            .with_pd_type(true)
            .with_pd_exit_mode(true);
        regs.write32(Block::Pctl, MCFG, mcfg.raw_value());
    }
}
