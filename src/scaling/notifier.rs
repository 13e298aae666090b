//! Two-phase change notification.
//!
//! Observers hear `Pre` once a request has been accepted and before the
//! change runs, and `Post` after it has landed. They are called outside
//! every controller lock, highest priority first.

use alloc::sync::Arc;
use alloc::vec::Vec;
use log::debug;
use spin::Mutex;

use super::arbiter::{ActiveSources, EventSource};
use crate::error::{DramError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ChangePhase {
    Pre = 0,
    Post = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotice {
    pub phase: ChangePhase,
    pub from_mhz: u32,
    pub to_mhz: u32,
    pub now_us: u64,
    /// Sources whose guard window was open when the notice was sent.
    pub active: ActiveSources,
}

pub trait FreqObserver: Send + Sync {
    fn on_change(&self, notice: &ChangeNotice);
}

fn same_observer(a: &Arc<dyn FreqObserver>, b: &Arc<dyn FreqObserver>) -> bool {
    core::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[derive(Default)]
pub struct NotifierChain {
    observers: Mutex<Vec<(i32, Arc<dyn FreqObserver>)>>,
}

impl NotifierChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equal priorities keep registration order.
    pub fn register(&self, observer: Arc<dyn FreqObserver>, priority: i32) {
        let mut list = self.observers.lock();
        let at = list.iter().position(|(p, _)| *p < priority).unwrap_or(list.len());
        list.insert(at, (priority, observer));
    }

    pub fn unregister(&self, observer: &Arc<dyn FreqObserver>) -> Result<()> {
        let mut list = self.observers.lock();
        let at = list
            .iter()
            .position(|(_, o)| same_observer(o, observer))
            .ok_or(DramError::ObserverNotRegistered)?;
        list.remove(at);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&self, notice: &ChangeNotice) {
        let snapshot: Vec<Arc<dyn FreqObserver>> =
            self.observers.lock().iter().map(|(_, o)| Arc::clone(o)).collect();
        for observer in snapshot {
            observer.on_change(notice);
        }
    }
}

/// Camera frame interval as numerator/denominator seconds.
pub trait FrameIntervalControl: Send + Sync {
    fn frame_interval(&self) -> (u32, u32);
    fn set_frame_interval(&self, numerator: u32, denominator: u32);
}

/// Priority the camera throttle is normally registered with.
pub const CAMERA_THROTTLE_PRIORITY: i32 = 100;

/// Drops a streaming camera to 15 fps around a change so its frame gap is
/// long enough, then puts the previous rate back.
pub struct CameraFrameRateThrottle<C: FrameIntervalControl> {
    camera: C,
    saved: Mutex<(u32, u32)>,
}

impl<C: FrameIntervalControl> CameraFrameRateThrottle<C> {
    pub fn new(camera: C) -> Self {
        CameraFrameRateThrottle {
            camera,
            saved: Mutex::new((1, 30)),
        }
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    fn faster_than_15fps(numerator: u32, denominator: u32) -> bool {
        numerator.saturating_mul(15) < denominator
    }
}

impl<C: FrameIntervalControl> FreqObserver for CameraFrameRateThrottle<C> {
    fn on_change(&self, notice: &ChangeNotice) {
        if !notice.active.contains(EventSource::CameraFrameEnd) {
            return;
        }
        match notice.phase {
            ChangePhase::Pre => {
                let (num, den) = self.camera.frame_interval();
                *self.saved.lock() = (num, den);
                if Self::faster_than_15fps(num, den) {
                    debug!("camera throttled from {}/{} to 1/15", num, den);
                    self.camera.set_frame_interval(1, 15);
                }
            }
            ChangePhase::Post => {
                let (num, den) = *self.saved.lock();
                if Self::faster_than_15fps(num, den) {
                    self.camera.set_frame_interval(num, den);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    struct Counter(AtomicU32);

    impl FreqObserver for Counter {
        fn on_change(&self, _notice: &ChangeNotice) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn notice(phase: ChangePhase) -> ChangeNotice {
        ChangeNotice { phase, from_mhz: 396, to_mhz: 200, now_us: 0, active: ActiveSources::default() }
    }

    #[test]
    fn unregister_unknown_observer_fails() {
        let chain = NotifierChain::new();
        let a: Arc<dyn FreqObserver> = Arc::new(Counter(AtomicU32::new(0)));
        assert_eq!(chain.unregister(&a), Err(DramError::ObserverNotRegistered));
        chain.register(Arc::clone(&a), 0);
        assert_eq!(chain.len(), 1);
        assert!(chain.unregister(&a).is_ok());
        assert!(chain.is_empty());
    }

    #[test]
    fn every_observer_sees_each_phase() {
        let chain = NotifierChain::new();
        let c = Arc::new(Counter(AtomicU32::new(0)));
        chain.register(c.clone(), 5);
        chain.notify(&notice(ChangePhase::Pre));
        chain.notify(&notice(ChangePhase::Post));
        assert_eq!(c.0.load(Ordering::SeqCst), 2);
        assert_eq!(ChangePhase::Post as u32, 1);
    }
}
