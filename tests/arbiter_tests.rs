mod common;

use std::sync::{Arc, Mutex};

use common::{boot, region, SimSoc, BOOT_MHZ, DDR3_512M_STRAPS, TEST_CONFIG};
use rv1108_ddr::scaling::{
    Admission, CameraFrameRateThrottle, ChangeNotice, ChangePhase, EventSource,
    FrameIntervalControl, FreqObserver, CAMERA_THROTTLE_PRIORITY,
};
use rv1108_ddr::DramConfig;

#[test]
fn vblank_window_defers_request_until_guard_expires() {
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, *TEST_CONFIG, 0);

    let t0 = soc.now();
    assert_eq!(ctrl.notify_event(EventSource::DisplayBlank, 200), Admission::Idle);
    soc.advance(10);

    assert_eq!(ctrl.request_frequency(660), Ok(660));
    assert!(soc.now() - t0 >= TEST_CONFIG.scaling.guard_interval_us);
}

#[test]
fn change_waits_out_guard_of_earlier_blank() {
    let mut cfg: DramConfig = *TEST_CONFIG;
    cfg.scaling.guard_interval_us = 1_000;
    cfg.scaling.wait_timeout_us = 50;
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, cfg, 0);

    let t0 = soc.now();
    assert_eq!(ctrl.notify_event(EventSource::DisplayBlank, 200), Admission::Idle);
    soc.advance(100);
    soc.clear_log();

    assert_eq!(ctrl.request_frequency(660), Ok(BOOT_MHZ));
    assert!(soc.commands().is_empty());

    let wait = t0 + 999 - soc.now();
    soc.advance(wait);
    assert_eq!(ctrl.service(), Admission::Deferred(EventSource::DisplayBlank));
    assert!(soc.commands().is_empty());

    soc.advance(1);
    assert_eq!(ctrl.service(), Admission::Run(EventSource::Request));
    assert_eq!(ctrl.current_frequency(), 660);
    let commands = soc.commands();
    assert!(!commands.is_empty());
    assert!(commands.iter().all(|(t, _)| *t >= t0 + 1_000), "{:?}", commands);
}

#[test]
fn timed_out_request_runs_on_next_long_vblank() {
    let mut cfg: DramConfig = *TEST_CONFIG;
    cfg.scaling.wait_timeout_us = 1_000;
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, cfg, 0);

    ctrl.notify_event(EventSource::DisplayBlank, 200);
    assert_eq!(ctrl.request_frequency(660), Ok(BOOT_MHZ));
    assert_eq!(ctrl.target_frequency(), 660);
    assert_eq!(ctrl.service(), Admission::Deferred(EventSource::DisplayBlank));

    soc.advance(16_000);
    assert_eq!(
        ctrl.notify_event(EventSource::DisplayBlank, 5_000),
        Admission::Run(EventSource::DisplayBlank)
    );
    assert_eq!(ctrl.current_frequency(), 660);
    assert_eq!(ctrl.service(), Admission::Idle);
}

#[test]
fn short_vblank_keeps_change_pending() {
    let mut cfg: DramConfig = *TEST_CONFIG;
    cfg.scaling.wait_timeout_us = 1_000;
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, cfg, 0);

    ctrl.notify_event(EventSource::DisplayBlank, 100);
    ctrl.request_frequency(528).unwrap();
    assert_eq!(
        ctrl.notify_event(EventSource::DisplayBlank, 100),
        Admission::Deferred(EventSource::DisplayBlank)
    );
    assert_eq!(ctrl.current_frequency(), BOOT_MHZ);
}

#[test]
fn camera_mid_frame_defers_until_frame_end() {
    let mut cfg: DramConfig = *TEST_CONFIG;
    cfg.scaling.wait_timeout_us = 1_000;
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, cfg, 0);

    ctrl.notify_event(EventSource::CameraFrameEnd, 0);
    soc.advance(100);
    ctrl.notify_event(EventSource::CameraFrameStart, 0);
    soc.advance(100);

    assert_eq!(ctrl.request_frequency(528), Ok(BOOT_MHZ));
    assert_eq!(
        ctrl.notify_event(EventSource::CameraFrameStart, 0),
        Admission::Idle
    );

    soc.advance(30_000);
    assert_eq!(
        ctrl.notify_event(EventSource::CameraFrameEnd, 3_000),
        Admission::Run(EventSource::CameraFrameEnd)
    );
    assert_eq!(ctrl.current_frequency(), 528);
}

#[test]
fn no_pending_change_means_nothing_queued() {
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, *TEST_CONFIG, 0);
    assert_eq!(ctrl.notify_event(EventSource::DisplayBlank, 5_000), Admission::Idle);
    assert_eq!(ctrl.notify_event(EventSource::CameraFrameEnd, 5_000), Admission::Idle);
    assert_eq!(ctrl.service(), Admission::Idle);
    assert_eq!(ctrl.current_frequency(), BOOT_MHZ);
}

struct FakeCamera {
    interval: Mutex<(u32, u32)>,
    calls: Mutex<Vec<(u32, u32)>>,
}

impl FakeCamera {
    fn at(num: u32, den: u32) -> Self {
        FakeCamera {
            interval: Mutex::new((num, den)),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FrameIntervalControl for FakeCamera {
    fn frame_interval(&self) -> (u32, u32) {
        *self.interval.lock().unwrap()
    }

    fn set_frame_interval(&self, numerator: u32, denominator: u32) {
        *self.interval.lock().unwrap() = (numerator, denominator);
        self.calls.lock().unwrap().push((numerator, denominator));
    }
}

#[test]
fn streaming_camera_is_throttled_around_change() {
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, *TEST_CONFIG, 0);
    let throttle = Arc::new(CameraFrameRateThrottle::new(FakeCamera::at(1, 30)));
    ctrl.register_notifier(throttle.clone(), CAMERA_THROTTLE_PRIORITY);

    ctrl.notify_event(EventSource::CameraFrameEnd, 0);
    soc.advance(50);
    assert_eq!(ctrl.request_frequency(528), Ok(528));

    assert_eq!(*throttle.camera().calls.lock().unwrap(), vec![(1, 15), (1, 30)]);
    assert_eq!(throttle.camera().frame_interval(), (1, 30));
}

#[test]
fn slow_or_idle_camera_is_left_alone() {
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, *TEST_CONFIG, 0);
    let slow = Arc::new(CameraFrameRateThrottle::new(FakeCamera::at(1, 10)));
    ctrl.register_notifier(slow.clone(), CAMERA_THROTTLE_PRIORITY);

    // no frame seen: camera not streaming
    ctrl.request_frequency(528).unwrap();
    ctrl.notify_event(EventSource::CameraFrameEnd, 0);
    ctrl.request_frequency(396).unwrap();

    assert!(slow.camera().calls.lock().unwrap().is_empty());
}

struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<(&'static str, ChangePhase, u32, u32)>>>,
}

impl FreqObserver for Recorder {
    fn on_change(&self, notice: &ChangeNotice) {
        self.log
            .lock()
            .unwrap()
            .push((self.name, notice.phase, notice.from_mhz, notice.to_mhz));
    }
}

#[test]
fn observers_hear_pre_then_post_by_priority() {
    let soc = SimSoc::new(DDR3_512M_STRAPS);
    let mut mem = region();
    let ctrl = boot(&soc, &mut mem, *TEST_CONFIG, 0);
    let log = Arc::new(Mutex::new(Vec::new()));
    ctrl.register_notifier(Arc::new(Recorder { name: "low", log: log.clone() }), 1);
    ctrl.register_notifier(Arc::new(Recorder { name: "high", log: log.clone() }), 10);

    ctrl.request_frequency(528).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            ("high", ChangePhase::Pre, BOOT_MHZ, 528),
            ("low", ChangePhase::Pre, BOOT_MHZ, 528),
            ("high", ChangePhase::Post, BOOT_MHZ, 528),
            ("low", ChangePhase::Post, BOOT_MHZ, 528),
        ]
    );
}
