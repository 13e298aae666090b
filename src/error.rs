use thiserror::Error;

/// Configuration faults, reported before any register is touched.
///
/// Hardware timeouts are not represented: a controller state poll that never
/// completes hangs the caller, and an exhausted PLL lock budget is only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DramError {
    #[error("speed bin {0} is past the last DDR3 bin")]
    UnsupportedSpeedBin(u32),
    #[error("DRAM type code {0} is not driven by this controller")]
    UnsupportedDramType(u32),
    #[error("no latency entry for {mhz} MHz")]
    UnsupportedFrequency { mhz: u32 },
    #[error("timing field {field} = {value} does not fit its register")]
    TimingOverflow { field: &'static str, value: u32 },
    #[error("scratch region holds {have} words, {need} needed")]
    SramTooSmall { need: usize, have: usize },
    #[error("resume code is {len} bytes, region holds {max}")]
    ResumeCodeTooLarge { len: usize, max: usize },
    #[error("observer is not registered")]
    ObserverNotRegistered,
    #[error("invalid configuration")]
    InvalidConfig,
}

pub type Result<T> = core::result::Result<T, DramError>;
