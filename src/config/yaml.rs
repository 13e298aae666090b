//! Board overrides layered onto the built-in defaults.
//!
//! ```yaml
//! ddr:
//!   timing:
//!     dram_spd_bin: 12
//!     pd_idle: 0x20
//!   scaling:
//!     min_change_us: 400
//!   mmio:
//!     pctl: 0x202b0000
//! ```

use super::{DramConfig, TimingConfig};
use crate::error::{DramError, Result};
use serde_yaml::Value;

fn yaml_get<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.get(*key))
}

fn yaml_get_u64(root: &Value, path: &[&str]) -> Option<u64> {
    yaml_get(root, path).and_then(Value::as_u64)
}

fn yaml_get_u32(root: &Value, path: &[&str]) -> Option<u32> {
    yaml_get_u64(root, path).and_then(|v| u32::try_from(v).ok())
}

fn apply_timing_overrides(root: &Value, timing: &mut TimingConfig) {
    let fields: [(&str, &mut u32); 20] = [
        ("dram_spd_bin", &mut timing.dram_spd_bin),
        ("sr_idle", &mut timing.sr_idle),
        ("pd_idle", &mut timing.pd_idle),
        ("dram_dll_dis_freq", &mut timing.dram_dll_dis_freq),
        ("phy_dll_dis_freq", &mut timing.phy_dll_dis_freq),
        ("dram_odt_dis_freq", &mut timing.dram_odt_dis_freq),
        ("phy_odt_dis_freq", &mut timing.phy_odt_dis_freq),
        ("ddr3_drv", &mut timing.ddr3_drv),
        ("ddr3_odt", &mut timing.ddr3_odt),
        ("lpddr3_drv", &mut timing.lpddr3_drv),
        ("lpddr3_odt", &mut timing.lpddr3_odt),
        ("lpddr2_drv", &mut timing.lpddr2_drv),
        ("phy_ddr3_clk_drv", &mut timing.phy_ddr3_clk_drv),
        ("phy_ddr3_cmd_drv", &mut timing.phy_ddr3_cmd_drv),
        ("phy_ddr3_dqs_drv", &mut timing.phy_ddr3_dqs_drv),
        ("phy_ddr3_odt", &mut timing.phy_ddr3_odt),
        ("phy_lp23_clk_drv", &mut timing.phy_lp23_clk_drv),
        ("phy_lp23_cmd_drv", &mut timing.phy_lp23_cmd_drv),
        ("phy_lp23_dqs_drv", &mut timing.phy_lp23_dqs_drv),
        ("phy_lp3_odt", &mut timing.phy_lp3_odt),
    ];
    for (key, slot) in fields {
        if let Some(v) = yaml_get_u32(root, &["ddr", "timing", key]) {
            *slot = v;
        }
    }
}

fn apply_mmio_overrides(root: &Value, section: &str, map: &mut crate::ram::registers::BlockMap) {
    let fields: [(&str, &mut usize); 7] = [
        ("pctl", &mut map.pctl),
        ("phy", &mut map.phy),
        ("cru", &mut map.cru),
        ("grf", &mut map.grf),
        ("pmu_grf", &mut map.pmu_grf),
        ("pmu", &mut map.pmu),
        ("msch", &mut map.msch),
    ];
    for (key, slot) in fields {
        if let Some(v) = yaml_get_u64(root, &["ddr", section, key]) {
            *slot = v as usize;
        }
    }
}

impl DramConfig {
    /// Defaults with every key present in `text` replaced.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let mut cfg = DramConfig::default_rv1108();
        cfg.apply_yaml_overrides(text)?;
        Ok(cfg)
    }

    pub fn apply_yaml_overrides(&mut self, text: &str) -> Result<()> {
        let root: Value = serde_yaml::from_str(text).map_err(|e| {
            log::warn!("ddr config: {}", e);
            DramError::InvalidConfig
        })?;

        apply_timing_overrides(&root, &mut self.timing);
        apply_mmio_overrides(&root, "mmio", &mut self.virt);
        apply_mmio_overrides(&root, "mmio_phys", &mut self.phys);

        if let Some(v) = yaml_get_u64(&root, &["ddr", "scaling", "guard_interval_us"]) {
            self.scaling.guard_interval_us = v;
        }
        if let Some(v) = yaml_get_u64(&root, &["ddr", "scaling", "min_change_us"]) {
            self.scaling.min_change_us = v;
        }
        if let Some(v) = yaml_get_u64(&root, &["ddr", "scaling", "request_timeout_us"]) {
            self.scaling.request_timeout_us = v;
        }
        if let Some(v) = yaml_get_u64(&root, &["ddr", "scaling", "wait_timeout_us"]) {
            self.scaling.wait_timeout_us = v;
        }
        if let Some(v) = yaml_get_u32(&root, &["ddr", "scaling", "pll_lock_budget"]) {
            self.scaling.pll_lock_budget = v;
        }

        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_named_keys() {
        let cfg = DramConfig::from_yaml(
            "ddr:\n  timing:\n    dram_spd_bin: 12\n    pd_idle: 32\n  scaling:\n    min_change_us: 400\n  mmio:\n    pctl: 65536\n",
        )
        .unwrap();
        assert_eq!(cfg.timing.dram_spd_bin, 12);
        assert_eq!(cfg.timing.pd_idle, 32);
        assert_eq!(cfg.timing.sr_idle, 1);
        assert_eq!(cfg.scaling.min_change_us, 400);
        assert_eq!(cfg.virt.pctl, 0x10000);
        assert_eq!(cfg.phys.pctl, crate::ram::registers::BlockMap::RV1108.pctl);
    }

    #[test]
    fn rejects_out_of_range_bin() {
        assert_eq!(
            DramConfig::from_yaml("ddr:\n  timing:\n    dram_spd_bin: 40\n"),
            Err(DramError::UnsupportedSpeedBin(40))
        );
    }

    #[test]
    fn malformed_text_is_invalid_config() {
        assert_eq!(DramConfig::from_yaml("ddr: ["), Err(DramError::InvalidConfig));
    }
}
