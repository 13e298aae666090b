#![cfg_attr(not(any(test, feature = "yaml")), no_std)]

extern crate alloc;

#[macro_use]
mod macros;

pub mod config;
pub mod error;
pub mod platform;
pub mod ram;
pub mod scaling;
pub mod sram;

use alloc::sync::Arc;
use alloc::vec::Vec;
use log::{debug, info, warn};
use spin::Mutex;

pub use config::{DramConfig, ScalingConfig, TimingConfig};
pub use error::{DramError, Result};
pub use platform::{InterruptState, Platform};

use ram::mode_register::DLL_DISABLED;
use ram::pctl::TDPD;
use ram::pll::{self, PllSetting};
use ram::sequencer::{self, ChangeFn, ChangeOutcome, SequencerData};
use ram::snapshot::{ControllerSnapshot, SNAPSHOT_END_TAG, SNAPSHOT_TAG};
use ram::timing::{self, SpeedBin, TimingInputs, TimingProfile};
use ram::training::PhyDrive;
use ram::{Block, DramGeometry, RegisterIo, Registers};
use scaling::{Admission, ChangeNotice, ChangePhase, EventSource, FreqObserver, FrequencyState, NotifierChain, ScaleArbiter};
use sram::{SramImage, Symbol};

/// Poll period of a requester waiting for its change to land.
const WAIT_POLL_US: u32 = 100;

/// Owns the DRAM controller for the lifetime of the system.
///
/// Lock order is arbiter, then scratch image. The hardware change runs
/// with both held and interrupts masked; observers are called with
/// neither held.
pub struct DramController<'a, M: RegisterIo, P: Platform> {
    io: M,
    platform: P,
    config: DramConfig,
    geometry: DramGeometry,
    speed_bin: SpeedBin,
    image: Mutex<SramImage<'a>>,
    arbiter: Mutex<ScaleArbiter>,
    freq: FrequencyState,
    notifiers: NotifierChain,
    change: ChangeFn<M>,
}

impl<'a, M: RegisterIo + Copy, P: Platform> DramController<'a, M, P> {
    /// Reads the straps, fills the scratch image and moves DRAM to
    /// `default_mhz`, or keeps the boot frequency when that is 0.
    pub fn init(io: M, platform: P, mut sram: SramImage<'a>, config: DramConfig, default_mhz: u32) -> Result<Self> {
        config.validate()?;
        let blocks = config.virt.to_words().ok_or(DramError::InvalidConfig)?;

        let (geometry, boot_mhz, tdpd) = {
            let regs = Registers::new(&io, config.virt);
            let geometry = DramGeometry::read(&regs)?;
            (geometry, pll::ddr_frequency(&regs), regs.read32(Block::Pctl, TDPD))
        };
        geometry.dram_type.ensure_supported()?;
        let speed_bin = config.timing.speed_bin()?;

        {
            let data = sram.data_mut();
            let snap = &mut data.snapshot;
            snap.tag = SNAPSHOT_TAG;
            snap.end_tag = SNAPSHOT_END_TAG;
            snap.timing_config = config.timing;
            snap.mem_type = geometry.dram_type.code();
            snap.speed_bin = speed_bin.index();
            snap.capacity_per_die = u32::try_from(geometry.capacity_per_die()).unwrap_or(u32::MAX);
            snap.sr_idle = config.timing.sr_idle;
            snap.dll_status = DLL_DISABLED;
            data.blocks = blocks;
            data.lock_budget = config.scaling.pll_lock_budget;
            data.ddr_freq = boot_mhz;
            data.pending_freq = boot_mhz;
        }

        let ctrl = DramController {
            io,
            platform,
            config,
            geometry,
            speed_bin,
            image: Mutex::new(sram),
            arbiter: Mutex::new(ScaleArbiter::new(config.scaling)),
            freq: FrequencyState::new(boot_mhz),
            notifiers: NotifierChain::new(),
            change: sequencer::change_frequency::<M>,
        };

        match ctrl.profile_for(boot_mhz, tdpd) {
            Ok(profile) => ctrl.image.lock().snapshot_mut().stage_profile(&profile),
            Err(e) => warn!("no timing for boot frequency {} MHz: {}", boot_mhz, e),
        }

        info!(
            "{:?} {} rank(s), {} MiB, booted at {} MHz",
            geometry.dram_type,
            geometry.ranks,
            geometry.capacity() >> 20,
            boot_mhz
        );

        let first = if default_mhz == 0 { boot_mhz } else { default_mhz };
        if let Err(e) = ctrl.request_frequency(first) {
            warn!("initial change to {} MHz refused: {}", first, e);
        }
        Ok(ctrl)
    }

    fn regs(&self) -> Registers<'_, M> {
        Registers::new(&self.io, self.config.virt)
    }

    fn profile_for(&self, mhz: u32, tdpd: u32) -> Result<TimingProfile> {
        timing::calculate(&TimingInputs {
            freq_mhz: mhz,
            dram_type: self.geometry.dram_type,
            speed_bin: self.speed_bin,
            capacity_per_die: self.geometry.capacity_per_die(),
            config: &self.config.timing,
            tdpd,
        })
    }

    pub fn config(&self) -> &DramConfig {
        &self.config
    }

    pub fn geometry(&self) -> &DramGeometry {
        &self.geometry
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Frequency the DPLL would actually produce for `mhz`, 0 if it cannot.
    pub fn round_rate(&self, mhz: u32) -> u32 {
        pll::round_rate(mhz)
    }

    pub fn current_frequency(&self) -> u32 {
        self.freq.current()
    }

    pub fn target_frequency(&self) -> u32 {
        self.freq.target()
    }

    /// Moves DRAM to the closest frequency the DPLL can make and waits a
    /// bounded time for it. Returns the frequency DRAM runs at when the wait
    /// ends; if that is not the rounded request, the change is still
    /// pending and will run once the arbiter admits it. Rates the DPLL or
    /// the DRAM cannot run are refused before any register is written.
    pub fn request_frequency(&self, mhz: u32) -> Result<u32> {
        let setting = PllSetting::for_ddr_mhz(mhz).ok_or(DramError::UnsupportedFrequency { mhz })?;
        let rounded = setting.ddr_mhz();
        if rounded == self.freq.target() {
            return Ok(self.freq.current());
        }

        let tdpd = self.regs().read32(Block::Pctl, TDPD);
        let profile = self.profile_for(rounded, tdpd)?;
        let drive = PhyDrive::select(self.geometry.dram_type, rounded, &self.config.timing);
        {
            let mut image = self.image.lock();
            let data = image.data_mut();
            data.snapshot.stage_profile(&profile);
            data.pll = setting;
            data.drive = drive;
            data.pending_freq = rounded;
            self.freq.set_target(rounded);
        }
        info!("DRAM {} -> {} MHz requested", self.freq.current(), rounded);

        let start = self.platform.now_us();
        self.record(EventSource::Request, self.config.scaling.request_timeout_us);
        self.notify(ChangePhase::Pre, self.freq.current(), rounded);

        while self.freq.is_pending() {
            self.service();
            if !self.freq.is_pending() {
                break;
            }
            if self.platform.now_us().saturating_sub(start) >= self.config.scaling.wait_timeout_us {
                warn!("change to {} MHz still pending after {}us", rounded, self.config.scaling.wait_timeout_us);
                break;
            }
            self.platform.delay_us(WAIT_POLL_US);
        }
        Ok(self.freq.current())
    }

    fn record(&self, source: EventSource, timeout_us: u64) -> bool {
        let now = self.platform.now_us();
        self.arbiter.lock().record_event(source, now, timeout_us, self.freq.is_pending())
    }

    /// An event source fired. `timeout_us` is the window it opens, e.g. the
    /// length of a vertical blank.
    pub fn notify_event(&self, source: EventSource, timeout_us: u64) -> Admission {
        if self.record(source, timeout_us) {
            self.service()
        } else {
            Admission::Idle
        }
    }

    /// Runs queued work if no window forbids it.
    pub fn service(&self) -> Admission {
        let now = self.platform.now_us();
        let (source, from, to, outcome) = {
            let mut arbiter = self.arbiter.lock();
            let source = match arbiter.admit(now) {
                Admission::Run(source) => source,
                Admission::Deferred(protector) => {
                    debug!("change to {} MHz deferred by {:?}", self.freq.target(), protector);
                    return Admission::Deferred(protector);
                }
                Admission::Idle => return Admission::Idle,
            };
            if !self.freq.is_pending() {
                arbiter.clear_queue();
                return Admission::Idle;
            }

            let mut image = self.image.lock();
            let from = image.data().ddr_freq;
            let outcome = self.run_change(&mut image);
            let to = image.data().ddr_freq;
            self.freq.set_current(to);
            if outcome == ChangeOutcome::UnsupportedType {
                self.freq.set_target(to);
            }
            arbiter.clear_queue();
            (source, from, to, outcome)
        };

        match outcome {
            ChangeOutcome::Locked => {}
            ChangeOutcome::LockTimeout => {
                warn!("DPLL lock not seen within {} polls at {} MHz", self.config.scaling.pll_lock_budget, to)
            }
            ChangeOutcome::UnsupportedType => warn!("staged DRAM type is not scaled, change dropped at {} MHz", to),
        }
        info!("DRAM {} -> {} MHz ({:?})", from, to, source);
        self.notify(ChangePhase::Post, from, to);
        Admission::Run(source)
    }

    /// Quiesces the CPU side and runs the sequencer from scratch memory.
    fn run_change(&self, image: &mut SramImage<'a>) -> ChangeOutcome {
        let regs = self.regs();
        let change = self.change;
        let io = self.io;

        let irq = self.platform.mask_interrupts();
        self.platform.flush_caches();
        image.pretouch();
        for block in [Block::Pctl, Block::Phy, Block::Cru, Block::Grf, Block::Msch] {
            let _ = regs.read32(block, 0);
        }
        regs.dsb();

        let data: &mut SequencerData = image.data_mut();
        let mut outcome = ChangeOutcome::UnsupportedType;
        self.platform.run_on_scratch_stack(&mut || {
            outcome = change(io, &mut *data);
        });
        self.platform.restore_interrupts(irq);
        outcome
    }

    fn notify(&self, phase: ChangePhase, from_mhz: u32, to_mhz: u32) {
        let now_us = self.platform.now_us();
        let active = self.arbiter.lock().active_sources(now_us);
        self.notifiers.notify(&ChangeNotice { phase, from_mhz, to_mhz, now_us, active });
    }

    pub fn register_notifier(&self, observer: Arc<dyn FreqObserver>, priority: i32) {
        self.notifiers.register(observer, priority);
    }

    pub fn unregister_notifier(&self, observer: &Arc<dyn FreqObserver>) -> Result<()> {
        self.notifiers.unregister(observer)
    }

    /// Records everything the resume code needs. Call right before suspend.
    pub fn save_state(&self) {
        let regs = self.regs();
        self.image.lock().snapshot_mut().capture(&regs, &self.config.phys);
        debug!("DRAM state saved at {} MHz", self.freq.current());
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        *self.image.lock().snapshot()
    }

    pub fn resume_code_blob(&self) -> Vec<u8> {
        self.image.lock().resume_code_blob().to_vec()
    }

    pub fn resume_data_blob(&self) -> Vec<u8> {
        self.image.lock().resume_data_blob().to_vec()
    }

    /// Where a piece of the scratch image lives, and its size in bytes.
    pub fn resume_region(&self, symbol: Symbol) -> (usize, usize) {
        let image = self.image.lock();
        (image.symbol_addr(symbol), image.relocation(symbol).len)
    }
}
