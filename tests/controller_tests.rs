mod common;

use std::sync::Arc;

use common::{boot, region, SimSoc, BOOT_MHZ, DDR3_512M_STRAPS, TEST_CONFIG};
use rv1108_ddr::ram::DramType;
use rv1108_ddr::scaling::{ChangeNotice, FreqObserver};
use rv1108_ddr::sram::{SramImage, IMAGE_WORDS};
use rv1108_ddr::{DramConfig, DramController, DramError};

fn write_count(soc: &SimSoc) -> usize {
    soc.state.lock().unwrap().writes.len()
}

#[test]
fn init_reads_geometry_and_boot_rate() {
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, *TEST_CONFIG, 0);

    assert_eq!(ctrl.geometry().dram_type, DramType::Ddr3);
    assert_eq!(ctrl.geometry().capacity(), 512 << 20);
    assert_eq!(ctrl.current_frequency(), BOOT_MHZ);
    assert_eq!(ctrl.target_frequency(), BOOT_MHZ);

    let snap = ctrl.snapshot();
    assert_eq!(snap.mem_type, DramType::Ddr3.code());
    assert_eq!(snap.capacity_per_die, 512 << 20);
    assert_eq!(snap.sr_idle, TEST_CONFIG.timing.sr_idle);
    assert_eq!(snap.pctl_timing.ddr_freq, BOOT_MHZ);
}

#[test]
fn init_moves_to_default_rate() {
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, *TEST_CONFIG, 200);
    assert_eq!(ctrl.current_frequency(), 200);
}

#[test]
fn request_lands_on_pll_grid() {
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, *TEST_CONFIG, 0);

    assert_eq!(ctrl.round_rate(666), 660);
    assert_eq!(ctrl.request_frequency(666), Ok(660));
    assert_eq!(ctrl.current_frequency(), 660);
    assert_eq!(ctrl.target_frequency(), 660);
}

#[test]
fn repeated_request_touches_nothing() {
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, *TEST_CONFIG, 0);
    ctrl.request_frequency(528).unwrap();
    let writes = write_count(&soc);

    assert_eq!(ctrl.request_frequency(528), Ok(528));
    assert_eq!(ctrl.request_frequency(530), Ok(528));
    assert_eq!(write_count(&soc), writes);
}

#[test]
fn unsupported_rate_is_refused_before_hardware() {
    let mut cfg: DramConfig = *TEST_CONFIG;
    cfg.timing.dram_spd_bin = 0;
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, cfg, 0);
    let writes = write_count(&soc);

    assert_eq!(ctrl.request_frequency(528), Err(DramError::UnsupportedFrequency { mhz: 528 }));
    assert_eq!(write_count(&soc), writes);
    assert_eq!(ctrl.target_frequency(), BOOT_MHZ);
    assert_eq!(ctrl.current_frequency(), BOOT_MHZ);
}

#[test]
fn rates_outside_the_pll_and_dram_range_are_refused() {
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, *TEST_CONFIG, 0);
    let writes = write_count(&soc);

    for mhz in [0, 1, 23, u32::MAX] {
        assert_eq!(ctrl.request_frequency(mhz), Err(DramError::UnsupportedFrequency { mhz }));
    }
    for mhz in [1_000, 2_000] {
        assert!(matches!(ctrl.request_frequency(mhz), Err(DramError::UnsupportedFrequency { .. })));
    }
    assert_eq!(write_count(&soc), writes);
    assert_eq!(ctrl.target_frequency(), BOOT_MHZ);
    assert_eq!(ctrl.round_rate(0), 0);
}

#[test]
fn lpddr2_rate_beyond_table_is_refused() {
    let soc = SimSoc::new((5 << 13) | (1 << 9) | (2 << 6) | (1 << 2) | 1);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, *TEST_CONFIG, 0);
    assert_eq!(ctrl.geometry().dram_type, DramType::Lpddr2);
    assert_eq!(ctrl.request_frequency(600), Err(DramError::UnsupportedFrequency { mhz: 600 }));
    assert_eq!(ctrl.request_frequency(528), Ok(528));
}

#[test]
fn init_rejects_unsupported_dram() {
    let soc = SimSoc::new((2 << 13) | (1 << 9) | (2 << 6) | (1 << 2) | 1);
    let mut mem = region();
    let image = SramImage::build(&mut mem, &[]).unwrap();
    assert!(matches!(
        DramController::init(&soc, &soc, image, *TEST_CONFIG, 0),
        Err(DramError::UnsupportedDramType(2))
    ));
}

#[test]
fn init_rejects_bad_speed_bin() {
    let mut cfg: DramConfig = *TEST_CONFIG;
    cfg.timing.dram_spd_bin = 22;
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let image = SramImage::build(&mut mem, &[]).unwrap();
    assert!(matches!(
        DramController::init(&soc, &soc, image, cfg, 0),
        Err(DramError::UnsupportedSpeedBin(22))
    ));
    assert_eq!(write_count(&soc), 0);
}

#[test]
fn init_rejects_zero_wait() {
    let mut cfg: DramConfig = *TEST_CONFIG;
    cfg.scaling.wait_timeout_us = 0;
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let image = SramImage::build(&mut mem, &[]).unwrap();
    assert!(matches!(
        DramController::init(&soc, &soc, image, cfg, 0),
        Err(DramError::InvalidConfig)
    ));
}

#[test]
fn scratch_region_must_fit_image() {
    let mut short = vec![0u32; IMAGE_WORDS - 1];
    assert!(matches!(
        SramImage::build(&mut short, &[]),
        Err(DramError::SramTooSmall { need: IMAGE_WORDS, .. })
    ));
}

struct Quiet;

impl FreqObserver for Quiet {
    fn on_change(&self, _notice: &ChangeNotice) {}
}

#[test]
fn unregistering_unknown_observer_fails() {
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, *TEST_CONFIG, 0);

    let a: Arc<dyn FreqObserver> = Arc::new(Quiet);
    let b: Arc<dyn FreqObserver> = Arc::new(Quiet);
    ctrl.register_notifier(a.clone(), 0);

    assert_eq!(ctrl.unregister_notifier(&b), Err(DramError::ObserverNotRegistered));
    assert_eq!(ctrl.unregister_notifier(&a), Ok(()));
    assert_eq!(ctrl.unregister_notifier(&a), Err(DramError::ObserverNotRegistered));
}
