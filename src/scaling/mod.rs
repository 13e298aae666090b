pub mod arbiter;
pub mod notifier;

pub use arbiter::{ActiveSources, Admission, EventSource, FrequencyState, RequestSlot, ScaleArbiter};
pub use notifier::{
    CameraFrameRateThrottle, ChangeNotice, ChangePhase, FrameIntervalControl, FreqObserver,
    NotifierChain, CAMERA_THROTTLE_PRIORITY,
};
