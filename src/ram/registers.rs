use core::ptr::NonNull;
use core::sync::atomic::{compiler_fence, Ordering};
use volatile::VolatilePtr;

/// Rockchip "hiword mask" write: the upper half selects which of the lower
/// sixteen bits the write is allowed to change.
#[inline(always)]
pub const fn hiword(mask: u32, value: u32) -> u32 {
    ((mask & 0xffff) << 16) | (value & mask & 0xffff)
}

/// Full write mask for a hiword-masked register.
pub const REG_MASK: u32 = 0xffff_0000;

/// Architected counter rate on RV1108, fed from the 24 MHz oscillator.
pub const COUNTER_MHZ: u32 = 24;

/// Raw 32-bit register access.
///
/// Implementations must not reorder accesses to the same address; `barrier`
/// has to complete every access issued before it.
pub trait RegisterIo {
    fn read32(&self, addr: usize) -> u32;
    fn write32(&self, addr: usize, value: u32);

    /// Free-running count at `COUNTER_MHZ` ticks per microsecond. Keeps
    /// counting while DRAM is in self-refresh.
    fn counter(&self) -> u64;

    #[inline(always)]
    fn barrier(&self) {
        dsb();
    }
}

impl<T: RegisterIo + ?Sized> RegisterIo for &T {
    #[inline(always)]
    fn read32(&self, addr: usize) -> u32 {
        (**self).read32(addr)
    }

    #[inline(always)]
    fn write32(&self, addr: usize, value: u32) {
        (**self).write32(addr, value)
    }

    #[inline(always)]
    fn counter(&self) -> u64 {
        (**self).counter()
    }

    #[inline(always)]
    fn barrier(&self) {
        (**self).barrier()
    }
}

/// Spins on `io.counter()` for `us` microseconds.
#[inline(always)]
pub fn delay_us<M: RegisterIo + ?Sized>(io: &M, us: u32) {
    let start = io.counter();
    let ticks = us as u64 * COUNTER_MHZ as u64;
    while io.counter().wrapping_sub(start) < ticks {
        core::hint::spin_loop();
    }
}

/// CNTPCT, the ARM generic timer's physical count.
#[inline(always)]
pub fn read_counter() -> u64 {
    #[cfg(target_arch = "arm")]
    {
        let (lo, hi): (u32, u32);
        unsafe {
            core::arch::asm!("mrrc p15, 0, {}, {}, c14", out(reg) lo, out(reg) hi, options(nomem, nostack, preserves_flags));
        }
        ((hi as u64) << 32) | lo as u64
    }
    #[cfg(target_arch = "aarch64")]
    {
        let cnt: u64;
        unsafe {
            core::arch::asm!("mrs {}, cntpct_el0", out(reg) cnt, options(nomem, nostack, preserves_flags));
        }
        cnt
    }
    // no generic timer: one microsecond per read
    #[cfg(not(any(target_arch = "arm", target_arch = "aarch64")))]
    {
        use core::sync::atomic::AtomicU32;
        static TICKS: AtomicU32 = AtomicU32::new(0);
        TICKS.fetch_add(COUNTER_MHZ, Ordering::Relaxed) as u64
    }
}

#[inline(always)]
pub fn dsb() {
    compiler_fence(Ordering::SeqCst);
    #[cfg(target_arch = "arm")]
    unsafe {
        core::arch::asm!("dsb sy", options(nostack, preserves_flags));
    }
    #[cfg(target_arch = "aarch64")]
    unsafe {
        core::arch::asm!("dsb sy", options(nostack, preserves_flags));
    }
    compiler_fence(Ordering::SeqCst);
}

/// Memory-mapped register access through volatile pointers.
#[derive(Clone, Copy)]
pub struct VolatileIo {
    _private: (),
}

impl VolatileIo {
    /// # Safety
    ///
    /// Every address later handed to `read32`/`write32` must be a mapped,
    /// 4-byte aligned device register for the lifetime of this value.
    pub const unsafe fn new() -> Self {
        VolatileIo { _private: () }
    }

    #[inline(always)]
    fn ptr(addr: usize) -> VolatilePtr<'static, u32> {
        // SAFETY: guaranteed by the contract of `VolatileIo::new`.
        unsafe { VolatilePtr::new(NonNull::new_unchecked(addr as *mut u32)) }
    }
}

impl RegisterIo for VolatileIo {
    #[inline(always)]
    fn read32(&self, addr: usize) -> u32 {
        Self::ptr(addr).read()
    }

    #[inline(always)]
    fn write32(&self, addr: usize, value: u32) {
        Self::ptr(addr).write(value)
    }

    #[inline(always)]
    fn counter(&self) -> u64 {
        read_counter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Pctl,
    Phy,
    Cru,
    Grf,
    PmuGrf,
    Pmu,
    Msch,
}

/// Base address of every register block the controller touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMap {
    pub pctl: usize,
    pub phy: usize,
    pub cru: usize,
    pub grf: usize,
    pub pmu_grf: usize,
    pub pmu: usize,
    pub msch: usize,
}

impl BlockMap {
    pub const RV1108: BlockMap = BlockMap {
        pctl: 0x202b_0000,
        phy: 0x202b_1000,
        cru: 0x2020_0000,
        grf: 0x1030_0000,
        pmu_grf: 0x2006_0000,
        pmu: 0x2001_0000,
        msch: 0x1022_0000,
    };

    /// The map as 32-bit words, in field order, for code that cannot reach
    /// DRAM. `None` if a base does not fit.
    pub fn to_words(&self) -> Option<[u32; 7]> {
        Some([
            u32::try_from(self.pctl).ok()?,
            u32::try_from(self.phy).ok()?,
            u32::try_from(self.cru).ok()?,
            u32::try_from(self.grf).ok()?,
            u32::try_from(self.pmu_grf).ok()?,
            u32::try_from(self.pmu).ok()?,
            u32::try_from(self.msch).ok()?,
        ])
    }

    #[inline(always)]
    pub const fn from_words(w: &[u32; 7]) -> Self {
        BlockMap {
            pctl: w[0] as usize,
            phy: w[1] as usize,
            cru: w[2] as usize,
            grf: w[3] as usize,
            pmu_grf: w[4] as usize,
            pmu: w[5] as usize,
            msch: w[6] as usize,
        }
    }

    #[inline(always)]
    pub const fn base(&self, block: Block) -> usize {
        match block {
            Block::Pctl => self.pctl,
            Block::Phy => self.phy,
            Block::Cru => self.cru,
            Block::Grf => self.grf,
            Block::PmuGrf => self.pmu_grf,
            Block::Pmu => self.pmu,
            Block::Msch => self.msch,
        }
    }

    #[inline(always)]
    pub const fn addr(&self, block: Block, offset: usize) -> usize {
        self.base(block) + offset
    }
}

impl Default for BlockMap {
    fn default() -> Self {
        Self::RV1108
    }
}

/// Block-relative view over a `RegisterIo`.
pub struct Registers<'a, M: RegisterIo> {
    io: &'a M,
    map: BlockMap,
}

impl<'a, M: RegisterIo> Registers<'a, M> {
    #[inline(always)]
    pub fn new(io: &'a M, map: BlockMap) -> Self {
        Registers { io, map }
    }

    pub fn map(&self) -> &BlockMap {
        &self.map
    }

    #[inline(always)]
    pub fn read32(&self, block: Block, offset: usize) -> u32 {
        self.io.read32(self.map.addr(block, offset))
    }

    #[inline(always)]
    pub fn write32(&self, block: Block, offset: usize, value: u32) {
        self.io.write32(self.map.addr(block, offset), value)
    }

    #[inline(always)]
    pub fn set_bits(&self, block: Block, offset: usize, mask: u32) {
        let val = self.read32(block, offset);
        self.write32(block, offset, val | mask);
    }

    #[inline(always)]
    pub fn clear_bits(&self, block: Block, offset: usize, mask: u32) {
        let val = self.read32(block, offset);
        self.write32(block, offset, val & !mask);
    }

    #[inline(always)]
    pub fn modify(&self, block: Block, offset: usize, f: impl FnOnce(u32) -> u32) {
        let val = self.read32(block, offset);
        self.write32(block, offset, f(val));
    }

    /// Consecutive word writes starting at `offset`.
    #[inline(always)]
    pub fn write_words(&self, block: Block, offset: usize, words: &[u32]) {
        for (i, w) in words.iter().enumerate() {
            self.write32(block, offset + i * 4, *w);
        }
    }

    #[inline(always)]
    pub fn read_words(&self, block: Block, offset: usize, words: &mut [u32]) {
        for (i, w) in words.iter_mut().enumerate() {
            *w = self.read32(block, offset + i * 4);
        }
    }

    /// Busy-waits until `(reg & mask) == value`. Never gives up.
    #[inline(always)]
    pub fn wait_for(&self, block: Block, offset: usize, mask: u32, value: u32) {
        while self.read32(block, offset) & mask != value {
            core::hint::spin_loop();
        }
    }

    #[inline(always)]
    pub fn dsb(&self) {
        self.io.barrier();
    }

    #[inline(always)]
    pub fn delay_us(&self, us: u32) {
        delay_us(self.io, us);
    }
}
