//! Decides when a pending frequency change may run.
//!
//! Producers (the synchronous requester, display blanking, camera frame
//! boundaries) record occurrences here. A change is deferred while the
//! display or the camera pipeline holds a window in which DRAM must keep
//! streaming; deferred work stays queued until a later `service` pass
//! admits it.

use core::sync::atomic::{AtomicU32, Ordering};
use log::{trace, warn};

use crate::config::ScalingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// A `request_frequency` caller.
    Request,
    /// Display controller vertical blank.
    DisplayBlank,
    /// Camera ISP finished a frame.
    CameraFrameEnd,
    /// Camera ISP started a frame. Only timestamps are recorded.
    CameraFrameStart,
}

impl EventSource {
    pub const ALL: [EventSource; 4] = [
        EventSource::Request,
        EventSource::DisplayBlank,
        EventSource::CameraFrameEnd,
        EventSource::CameraFrameStart,
    ];

    const fn index(self) -> usize {
        match self {
            EventSource::Request => 0,
            EventSource::DisplayBlank => 1,
            EventSource::CameraFrameEnd => 2,
            EventSource::CameraFrameStart => 3,
        }
    }

    /// Higher runs first when several sources have work queued.
    pub const fn priority(self) -> u8 {
        match self {
            EventSource::DisplayBlank => 3,
            EventSource::CameraFrameEnd => 2,
            EventSource::CameraFrameStart => 1,
            EventSource::Request => 0,
        }
    }

    const fn queues_work(self) -> bool {
        !matches!(self, EventSource::CameraFrameStart)
    }
}

/// Per-source timestamps, all in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestSlot {
    /// Last occurrence, `None` until the source has fired once.
    pub start: Option<u64>,
    /// End of the window claimed by the last occurrence.
    pub end: u64,
    pub timeout: u64,
    /// Interval between the last two occurrences.
    pub frame_time: u64,
}

impl RequestSlot {
    pub fn is_active(&self, now: u64, guard: u64) -> bool {
        self.start.map_or(false, |s| now < s.saturating_add(guard))
    }
}

/// Set of sources, as handed to change observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveSources(u8);

impl ActiveSources {
    pub fn contains(&self, source: EventSource) -> bool {
        self.0 & (1 << source.index()) != 0
    }

    pub fn insert(&mut self, source: EventSource) {
        self.0 |= 1 << source.index();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Current and target DRAM frequency in MHz. Only the change path stores
/// `current`; waiters are released once the two agree.
#[derive(Debug)]
pub struct FrequencyState {
    current: AtomicU32,
    target: AtomicU32,
}

impl FrequencyState {
    pub const fn new(mhz: u32) -> Self {
        FrequencyState {
            current: AtomicU32::new(mhz),
            target: AtomicU32::new(mhz),
        }
    }

    pub fn current(&self) -> u32 {
        self.current.load(Ordering::Acquire)
    }

    pub fn target(&self) -> u32 {
        self.target.load(Ordering::Acquire)
    }

    pub fn set_target(&self, mhz: u32) {
        self.target.store(mhz, Ordering::Release);
    }

    pub(crate) fn set_current(&self, mhz: u32) {
        self.current.store(mhz, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.current() != self.target()
    }
}

/// What a service pass should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Nothing is queued.
    Idle,
    /// Run the change on behalf of this source.
    Run(EventSource),
    /// Work is queued but this source's window forbids a change now.
    Deferred(EventSource),
}

#[derive(Debug)]
pub struct ScaleArbiter {
    cfg: ScalingConfig,
    slots: [RequestSlot; 4],
    queued: [bool; 4],
}

impl ScaleArbiter {
    pub fn new(cfg: ScalingConfig) -> Self {
        ScaleArbiter {
            cfg,
            slots: [RequestSlot::default(); 4],
            queued: [false; 4],
        }
    }

    pub fn config(&self) -> &ScalingConfig {
        &self.cfg
    }

    pub fn slot(&self, source: EventSource) -> &RequestSlot {
        &self.slots[source.index()]
    }

    pub fn is_queued(&self, source: EventSource) -> bool {
        self.queued[source.index()]
    }

    pub fn has_queued(&self) -> bool {
        self.queued.iter().any(|q| *q)
    }

    pub fn is_active(&self, source: EventSource, now: u64) -> bool {
        self.slot(source).is_active(now, self.cfg.guard_interval_us)
    }

    pub fn active_sources(&self, now: u64) -> ActiveSources {
        let mut set = ActiveSources::default();
        for source in EventSource::ALL {
            if self.is_active(source, now) {
                set.insert(source);
            }
        }
        set
    }

    /// Records one occurrence of `source`. While a change is pending the
    /// occurrence also claims a window of `timeout_us` and queues work.
    /// Returns whether work was queued.
    pub fn record_event(&mut self, source: EventSource, now: u64, timeout_us: u64, change_pending: bool) -> bool {
        let slot = &mut self.slots[source.index()];
        slot.frame_time = slot.start.map_or(0, |s| now.saturating_sub(s));
        slot.start = Some(now);

        if !change_pending {
            return false;
        }

        slot.timeout = timeout_us;
        slot.end = now.saturating_add(timeout_us);

        if source == EventSource::DisplayBlank && timeout_us < self.cfg.min_change_us {
            warn!(
                "display blank of {}us is shorter than a frequency change, needs at least {}us",
                timeout_us,
                self.cfg.min_change_us * 10 / 8
            );
        }

        if source.queues_work() {
            self.queued[source.index()] = true;
            trace!("{:?} queued at {}us", source, now);
            true
        } else {
            false
        }
    }

    /// The source whose window currently forbids a change, if any.
    pub fn protector(&self, now: u64) -> Option<EventSource> {
        if self.is_active(EventSource::CameraFrameEnd, now) {
            let frame_end = self.slot(EventSource::CameraFrameEnd).start;
            let frame_start = self.slot(EventSource::CameraFrameStart).start;
            // a frame has started since the last one ended
            if let (Some(fs), Some(fe)) = (frame_start, frame_end) {
                if fs >= fe {
                    return Some(EventSource::CameraFrameEnd);
                }
            }
        }

        if self.is_active(EventSource::DisplayBlank, now) {
            let latest_finish = now.saturating_add(self.cfg.min_change_us);
            if self.slot(EventSource::DisplayBlank).end <= latest_finish {
                return Some(EventSource::DisplayBlank);
            }
        }

        None
    }

    pub fn admit(&self, now: u64) -> Admission {
        let Some(next) = EventSource::ALL
            .into_iter()
            .filter(|s| self.is_queued(*s))
            .max_by_key(|s| s.priority())
        else {
            return Admission::Idle;
        };

        match self.protector(now) {
            Some(protector) => Admission::Deferred(protector),
            None => Admission::Run(next),
        }
    }

    pub fn clear_queue(&mut self) {
        self.queued = [false; 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arbiter() -> ScaleArbiter {
        ScaleArbiter::new(ScalingConfig::default())
    }

    #[test]
    fn nothing_queued_without_pending_change() {
        let mut a = arbiter();
        assert!(!a.record_event(EventSource::DisplayBlank, 1_000, 5_000, false));
        assert_eq!(a.admit(1_000), Admission::Idle);
        assert_eq!(a.slot(EventSource::DisplayBlank).start, Some(1_000));
    }

    #[test]
    fn frame_time_tracks_interval() {
        let mut a = arbiter();
        a.record_event(EventSource::CameraFrameEnd, 100, 0, false);
        a.record_event(EventSource::CameraFrameEnd, 33_433, 0, false);
        assert_eq!(a.slot(EventSource::CameraFrameEnd).frame_time, 33_333);
    }

    #[test]
    fn frame_start_never_queues() {
        let mut a = arbiter();
        assert!(!a.record_event(EventSource::CameraFrameStart, 10, 1_000, true));
        assert!(!a.has_queued());
    }

    #[test]
    fn camera_mid_frame_defers_everything() {
        let mut a = arbiter();
        a.record_event(EventSource::CameraFrameEnd, 100, 0, false);
        a.record_event(EventSource::CameraFrameStart, 200, 0, false);
        a.record_event(EventSource::Request, 300, 10_000, true);
        assert_eq!(a.admit(300), Admission::Deferred(EventSource::CameraFrameEnd));
        // frame ended again, the gap before the next frame start is open
        a.record_event(EventSource::CameraFrameEnd, 400, 0, true);
        assert_eq!(a.admit(400), Admission::Run(EventSource::CameraFrameEnd));
    }

    #[test]
    fn short_blank_window_defers() {
        let mut a = arbiter();
        a.record_event(EventSource::DisplayBlank, 0, 200, true);
        assert_eq!(a.admit(100), Admission::Deferred(EventSource::DisplayBlank));
        a.record_event(EventSource::DisplayBlank, 1_000, 5_000, true);
        assert_eq!(a.admit(1_000), Admission::Run(EventSource::DisplayBlank));
    }

    #[test]
    fn guard_expiry_releases_window() {
        let mut a = arbiter();
        a.record_event(EventSource::DisplayBlank, 0, 200, true);
        let guard = a.config().guard_interval_us;
        assert_eq!(a.admit(guard - 1), Admission::Deferred(EventSource::DisplayBlank));
        assert_eq!(a.admit(guard), Admission::Run(EventSource::DisplayBlank));
    }

    #[test]
    fn blank_seen_before_request_guards_it() {
        let mut a = ScaleArbiter::new(ScalingConfig { guard_interval_us: 200, ..Default::default() });
        assert!(!a.record_event(EventSource::DisplayBlank, 0, 200, false));
        assert!(a.record_event(EventSource::Request, 100, 50, true));
        for now in [100, 150, 199] {
            assert_eq!(a.admit(now), Admission::Deferred(EventSource::DisplayBlank), "at {}us", now);
        }
        assert_eq!(a.admit(200), Admission::Run(EventSource::Request));
    }

    #[test]
    fn blank_window_must_outlast_the_change() {
        let mut a = arbiter();
        let min = a.config().min_change_us;
        a.record_event(EventSource::DisplayBlank, 0, 400, true);
        assert_eq!(a.admit(400 - min - 1), Admission::Run(EventSource::DisplayBlank));
        // window ends exactly when the change would
        assert_eq!(a.admit(400 - min), Admission::Deferred(EventSource::DisplayBlank));
        assert_eq!(a.admit(400), Admission::Deferred(EventSource::DisplayBlank));
    }
}
