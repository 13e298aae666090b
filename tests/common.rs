#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};
use rv1108_ddr::ram::cru::{pll_con, PllId, PCTL_SOFTRST, PLL_LOCK_STATUS};
use rv1108_ddr::ram::grf::{GRF_OS_REG2, IDLE_MSCH_ST, PMU_IDLE_REQ, PMU_IDLE_ST};
use rv1108_ddr::ram::pctl::{CtlCommand, CtlState, MCMD, POWCTL, POWSTAT, SCTL, STAT};
use rv1108_ddr::ram::phy::{REG00, REG02, REGFF};
use rv1108_ddr::ram::registers::COUNTER_MHZ;
use rv1108_ddr::ram::{Block, BlockMap, RegisterIo};
use rv1108_ddr::sram::{SramImage, IMAGE_WORDS};
use rv1108_ddr::{DramConfig, DramController, InterruptState, Platform};

/// DDR3, 1 rank, 10 col, 8 banks, 15 row, 16-bit bus, x16 die: 512 MiB.
pub const DDR3_512M_STRAPS: u32 = (3 << 13) | (1 << 9) | (2 << 6) | (1 << 2) | 1;
/// Same geometry reported as LPDDR3.
pub const LPDDR3_512M_STRAPS: u32 = (6 << 13) | (1 << 9) | (2 << 6) | (1 << 2) | 1;

pub const BOOT_MHZ: u32 = 396;

const BLOCKS: [Block; 7] = [
    Block::Pctl,
    Block::Phy,
    Block::Cru,
    Block::Grf,
    Block::PmuGrf,
    Block::Pmu,
    Block::Msch,
];

#[derive(Debug, Default)]
pub struct SocState {
    pub regs: HashMap<usize, u32>,
    pub now: u64,
    /// (time, raw) of every MCMD command issued.
    pub commands: Vec<(u64, u32)>,
    /// Every (address, value) written, in order.
    pub writes: Vec<(usize, u32)>,
    pub irq_masked: bool,
    pub irq_mask_count: u32,
    pub cache_flushes: u32,
    pub scratch_runs: u32,
    pub never_lock: bool,
}

/// Register-level stand-in for the RV1108 DDR path, good enough to walk
/// the controller state machine, the DPLL and gate training.
pub struct SimSoc {
    pub state: Mutex<SocState>,
    pub map: BlockMap,
}

fn hiword_merge(old: u32, value: u32) -> u32 {
    let mask = value >> 16;
    (old & !mask & 0xffff) | (value & mask)
}

impl SimSoc {
    pub fn new(straps: u32) -> Self {
        let soc = SimSoc {
            state: Mutex::new(SocState::default()),
            map: BlockMap::RV1108,
        };
        soc.preset(straps);
        soc
    }

    /// Hardware as the loader leaves it: DPLL at 2 x 396 MHz, controller
    /// serving, all four byte lanes wired.
    fn preset(&self, straps: u32) {
        let dpll = |i| pll_con(PllId::Dpll, i);
        self.poke(Block::Cru, dpll(0), 33);
        self.poke(Block::Cru, dpll(1), 0x1101);
        self.poke(Block::Cru, dpll(3), 1 << 8);
        self.poke(Block::Pctl, STAT, CtlState::Access.bits());
        self.poke(Block::Phy, REG00, 0xfc);
        self.poke(Block::Grf, GRF_OS_REG2, straps);
    }

    fn locate(&self, addr: usize) -> Option<(Block, usize)> {
        BLOCKS.into_iter().find_map(|b| {
            let base = self.map.base(b);
            (addr >= base && addr < base + 0x1000).then(|| (b, addr - base))
        })
    }

    pub fn poke(&self, block: Block, offset: usize, value: u32) {
        let addr = self.map.addr(block, offset);
        if let Ok(mut s) = self.state.lock() {
            s.regs.insert(addr, value);
        }
    }

    pub fn peek(&self, block: Block, offset: usize) -> u32 {
        self.read32(self.map.addr(block, offset))
    }

    pub fn now(&self) -> u64 {
        self.state.lock().map(|s| s.now).unwrap_or(0)
    }

    pub fn advance(&self, us: u64) {
        if let Ok(mut s) = self.state.lock() {
            s.now += us;
        }
    }

    pub fn set_never_lock(&self, never: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.never_lock = never;
        }
    }

    pub fn commands(&self) -> Vec<(u64, u32)> {
        self.state.lock().map(|s| s.commands.clone()).unwrap_or_default()
    }

    pub fn clear_log(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.commands.clear();
            s.writes.clear();
        }
    }

    pub fn writes_to(&self, block: Block, offset: usize) -> Vec<u32> {
        let addr = self.map.addr(block, offset);
        self.state
            .lock()
            .map(|s| s.writes.iter().filter(|(a, _)| *a == addr).map(|(_, v)| *v).collect())
            .unwrap_or_default()
    }

    /// Drops every register of `block` back to zero.
    pub fn wipe(&self, block: Block) {
        let base = self.map.base(block);
        if let Ok(mut s) = self.state.lock() {
            s.regs.retain(|a, _| *a < base || *a >= base + 0x1000);
        }
    }

    pub fn ctl_state(&self) -> CtlState {
        CtlState::from_bits(self.peek(Block::Pctl, STAT))
    }

    fn sctl(s: &mut SocState, stat_addr: usize, cmd: u32) {
        let state = CtlState::from_bits(s.regs.get(&stat_addr).copied().unwrap_or(0));
        let next = match (cmd, state) {
            (c, CtlState::InitMem | CtlState::Access) if c == CtlCommand::Cfg as u32 => CtlState::Config,
            (c, CtlState::Config) if c == CtlCommand::Go as u32 => CtlState::Access,
            (c, CtlState::Access) if c == CtlCommand::Sleep as u32 => CtlState::LowPower,
            (c, CtlState::LowPower) if c == CtlCommand::Wakeup as u32 => CtlState::Access,
            _ => state,
        };
        s.regs.insert(stat_addr, next.bits());
    }
}

impl RegisterIo for SimSoc {
    fn read32(&self, addr: usize) -> u32 {
        let Ok(s) = self.state.lock() else { return 0 };
        if addr == self.map.addr(Block::Cru, pll_con(PllId::Dpll, 2)) {
            return if s.never_lock { 0 } else { PLL_LOCK_STATUS };
        }
        s.regs.get(&addr).copied().unwrap_or(0)
    }

    fn write32(&self, addr: usize, value: u32) {
        let located = self.locate(addr);
        let Ok(mut s) = self.state.lock() else { return };
        s.writes.push((addr, value));
        let old = s.regs.get(&addr).copied().unwrap_or(0);
        let map = self.map;

        match located {
            Some((Block::Cru, off)) if off == pll_con(PllId::Dpll, 2) => {}
            Some((Block::Cru, off)) => {
                if off == PCTL_SOFTRST && (value >> 16) & value & 0x3 != 0 {
                    let base = map.pctl;
                    s.regs.retain(|a, _| *a < base || *a >= base + 0x1000);
                }
                s.regs.insert(addr, hiword_merge(old, value));
            }
            Some((Block::Grf, off)) if off == GRF_OS_REG2 => {
                s.regs.insert(addr, value);
            }
            Some((Block::Grf | Block::PmuGrf, _)) => {
                s.regs.insert(addr, hiword_merge(old, value));
            }
            Some((Block::Pmu, off)) if off == PMU_IDLE_REQ => {
                let req = hiword_merge(old, value);
                s.regs.insert(addr, req);
                let st = if req & (1 << 11) != 0 { IDLE_MSCH_ST } else { 0 };
                s.regs.insert(map.addr(Block::Pmu, PMU_IDLE_ST), st);
            }
            Some((Block::Pctl, off)) if off == SCTL => {
                s.regs.insert(addr, value);
                Self::sctl(&mut s, map.addr(Block::Pctl, STAT), value & 0x7);
            }
            Some((Block::Pctl, off)) if off == MCMD => {
                if value & (1 << 31) != 0 {
                    let now = s.now;
                    s.commands.push((now, value));
                }
                s.regs.insert(addr, value & !(1 << 31));
            }
            Some((Block::Pctl, off)) if off == POWCTL => {
                s.regs.insert(addr, value);
                let powstat = map.addr(Block::Pctl, POWSTAT);
                let done = s.regs.get(&powstat).copied().unwrap_or(0) | 1;
                s.regs.insert(powstat, done);
            }
            Some((Block::Phy, off)) if off == REG02 => {
                s.regs.insert(addr, value);
                if value & 1 != 0 {
                    let lanes = (s.regs.get(&map.addr(Block::Phy, REG00)).copied().unwrap_or(0) >> 4) & 0xf;
                    s.regs.insert(map.addr(Block::Phy, REGFF), lanes);
                }
            }
            _ => {
                s.regs.insert(addr, value);
            }
        }
    }

    fn barrier(&self) {}

    /// Each read moves simulated time on by a microsecond.
    fn counter(&self) -> u64 {
        let Ok(mut s) = self.state.lock() else { return 0 };
        let t = s.now;
        s.now += 1;
        t * u64::from(COUNTER_MHZ)
    }
}

impl Platform for SimSoc {
    fn now_us(&self) -> u64 {
        self.now()
    }

    fn delay_us(&self, us: u32) {
        self.advance(us as u64);
    }

    fn mask_interrupts(&self) -> InterruptState {
        let Ok(mut s) = self.state.lock() else { return InterruptState(0) };
        let was = s.irq_masked;
        s.irq_masked = true;
        s.irq_mask_count += 1;
        InterruptState(was as u32)
    }

    fn restore_interrupts(&self, state: InterruptState) {
        if let Ok(mut s) = self.state.lock() {
            s.irq_masked = state.0 != 0;
        }
    }

    fn flush_caches(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.cache_flushes += 1;
        }
    }

    fn run_on_scratch_stack(&self, f: &mut dyn FnMut()) {
        if let Ok(mut s) = self.state.lock() {
            s.scratch_runs += 1;
        }
        f()
    }
}

pub type SimController<'a> = DramController<'a, &'a SimSoc, &'a SimSoc>;

pub fn region() -> Vec<u32> {
    vec![0u32; IMAGE_WORDS]
}

pub fn boot<'a>(soc: &'a SimSoc, region: &'a mut [u32], config: DramConfig, default_mhz: u32) -> SimController<'a> {
    let image = SramImage::build(region, &[0xaa; 64]).unwrap();
    DramController::init(soc, soc, image, config, default_mhz).unwrap()
}

lazy_static::lazy_static! {
    pub static ref TEST_CONFIG: DramConfig = DramConfig::default_rv1108();
    static ref WARNINGS: Mutex<Vec<String>> = Mutex::new(Vec::new());
}

struct CaptureLogger;

static LOGGER: CaptureLogger = CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record<'_>) {
        if record.level() <= Level::Warn {
            if let Ok(mut w) = WARNINGS.lock() {
                w.push(record.args().to_string());
            }
        }
    }

    fn flush(&self) {}
}

/// Routes warnings into a buffer `warnings_containing` can search.
pub fn capture_warnings() {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(LevelFilter::Warn);
}

pub fn warnings_containing(needle: &str) -> Vec<String> {
    WARNINGS
        .lock()
        .map(|w| w.iter().filter(|m| m.contains(needle)).cloned().collect())
        .unwrap_or_default()
}
