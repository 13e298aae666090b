#[cfg(feature = "yaml")]
pub mod yaml;

use crate::error::{DramError, Result};
use crate::ram::mode_register::{ddr3, lpddr};
use crate::ram::phy::{Ddr3RonRtt, Lp23RonRtt};
use crate::ram::registers::BlockMap;
use crate::ram::timing::SpeedBin;

/// Board-level DRAM tuning. Stored verbatim inside the resume snapshot, so
/// the field order is part of the binary layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct TimingConfig {
    pub dram_spd_bin: u32,
    pub sr_idle: u32,
    pub pd_idle: u32,
    pub dram_dll_dis_freq: u32,
    pub phy_dll_dis_freq: u32,
    pub dram_odt_dis_freq: u32,
    pub phy_odt_dis_freq: u32,
    pub ddr3_drv: u32,
    pub ddr3_odt: u32,
    pub lpddr3_drv: u32,
    pub lpddr3_odt: u32,
    pub lpddr2_drv: u32,
    pub phy_ddr3_clk_drv: u32,
    pub phy_ddr3_cmd_drv: u32,
    pub phy_ddr3_dqs_drv: u32,
    pub phy_ddr3_odt: u32,
    pub phy_lp23_clk_drv: u32,
    pub phy_lp23_cmd_drv: u32,
    pub phy_lp23_dqs_drv: u32,
    pub phy_lp3_odt: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::default_rv1108()
    }
}

impl TimingConfig {
    pub const fn default_rv1108() -> Self {
        TimingConfig {
            dram_spd_bin: SpeedBin::DEFAULT.index(),
            sr_idle: 0x1,
            pd_idle: 0x40,
            dram_dll_dis_freq: 300,
            phy_dll_dis_freq: 400,
            dram_odt_dis_freq: 333,
            phy_odt_dis_freq: 333,
            ddr3_drv: ddr3::DS_40,
            ddr3_odt: ddr3::RTT_NOM_120,
            lpddr3_drv: lpddr::DS_40,
            lpddr3_odt: lpddr::ODT_240,
            lpddr2_drv: lpddr::DS_40,
            phy_ddr3_clk_drv: Ddr3RonRtt::Ohm45 as u32,
            phy_ddr3_cmd_drv: Ddr3RonRtt::Ohm34 as u32,
            phy_ddr3_dqs_drv: Ddr3RonRtt::Ohm34 as u32,
            phy_ddr3_odt: Ddr3RonRtt::Ohm225 as u32,
            phy_lp23_clk_drv: Lp23RonRtt::Ohm43 as u32,
            phy_lp23_cmd_drv: Lp23RonRtt::Ohm34 as u32,
            phy_lp23_dqs_drv: Lp23RonRtt::Ohm34 as u32,
            phy_lp3_odt: Lp23RonRtt::Ohm240 as u32,
        }
    }

    pub fn speed_bin(&self) -> Result<SpeedBin> {
        SpeedBin::from_index(self.dram_spd_bin)
    }
}

/// Arbitration windows and waits, all in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalingConfig {
    /// An event source counts as active this long after its last occurrence.
    pub guard_interval_us: u64,
    /// Worst-case duration of one frequency change.
    pub min_change_us: u64,
    /// Window claimed by a synchronous request.
    pub request_timeout_us: u64,
    /// How long a requester waits for the change to land.
    pub wait_timeout_us: u64,
    /// 1us polls of the DPLL lock bit before carrying on unlocked.
    pub pll_lock_budget: u32,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        ScalingConfig {
            guard_interval_us: 200_000,
            min_change_us: 300,
            request_timeout_us: 10_000,
            wait_timeout_us: 500_000,
            pll_lock_budget: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DramConfig {
    pub timing: TimingConfig,
    /// Addresses the CPU uses at runtime.
    pub virt: BlockMap,
    /// Bus addresses recorded for the resume path, which runs with the MMU off.
    pub phys: BlockMap,
    pub scaling: ScalingConfig,
}

impl Default for DramConfig {
    fn default() -> Self {
        Self::default_rv1108()
    }
}

impl DramConfig {
    pub fn default_rv1108() -> Self {
        DramConfig {
            timing: TimingConfig::default_rv1108(),
            virt: BlockMap::RV1108,
            phys: BlockMap::RV1108,
            scaling: ScalingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.timing.speed_bin()?;
        if self.scaling.min_change_us == 0 || self.scaling.wait_timeout_us == 0 {
            return Err(DramError::InvalidConfig);
        }
        Ok(())
    }
}
