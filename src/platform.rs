//! What the scaling core needs from the surrounding kernel or firmware.

/// Saved interrupt mask, handed back to `restore_interrupts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptState(pub u32);

pub trait Platform {
    /// Free-running microsecond clock for the arbiter's windows and the
    /// requester's wait. Not used while DRAM is unavailable.
    fn now_us(&self) -> u64;

    fn delay_us(&self, us: u32) {
        let start = self.now_us();
        while self.now_us().wrapping_sub(start) < us as u64 {
            core::hint::spin_loop();
        }
    }

    /// Masks IRQ and FIQ on the calling core.
    fn mask_interrupts(&self) -> InterruptState;

    fn restore_interrupts(&self, state: InterruptState);

    /// Writes back and invalidates every cache level and the TLB, so nothing
    /// in the sequence has to reach DRAM.
    fn flush_caches(&self) {}

    /// Runs `f` on a stack that lives in the scratch region. `f` reads its
    /// captures before DRAM leaves service and writes its result after.
    fn run_on_scratch_stack(&self, f: &mut dyn FnMut()) {
        f()
    }
}

impl<T: Platform + ?Sized> Platform for &T {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }

    fn delay_us(&self, us: u32) {
        (**self).delay_us(us)
    }

    fn mask_interrupts(&self) -> InterruptState {
        (**self).mask_interrupts()
    }

    fn restore_interrupts(&self, state: InterruptState) {
        (**self).restore_interrupts(state)
    }

    fn flush_caches(&self) {
        (**self).flush_caches()
    }

    fn run_on_scratch_stack(&self, f: &mut dyn FnMut()) {
        (**self).run_on_scratch_stack(f)
    }
}
