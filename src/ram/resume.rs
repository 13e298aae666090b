//! Replays a `ControllerSnapshot` after the DRAM controller lost power.
//!
//! Runs from the scratch region with the MMU off, before DRAM holds
//! anything. Every address comes from the snapshot itself.

use super::grf::{C_ACTIVE_IN_DISABLE, C_ACTIVE_IN_EN, DDR_IO_RET_RELEASE};
use super::msch;
use super::pctl::{self, POWCTL, POWER_UP_DONE, POWER_UP_START, POWSTAT, TOGCNT1U};
use super::phy::{self, GATE_RESULT_PAIRS, REG02, REG02_GATE_BYPASS, REGFB, REGFC, REGFD, REGFE};
use super::registers::{Block, BlockMap, RegisterIo, Registers, VolatileIo};
use super::snapshot::{ControllerSnapshot, PCTL_DFI_REGS, SKIP_ADDR};
use super::state::{resume_move_to_access, resume_move_to_low_power};

sram_rodata! {
    /// PHY registers in the order they go back. Lane delays and DLL first,
    /// drive strength and termination last.
    static PHY_RESTORE_ORDER: [usize; 41] = [
        phy::REG13, phy::REG14, phy::REG26, phy::REG27, phy::REG36, phy::REG37, phy::REG46,
        phy::REG47, phy::REG56, phy::REG57, phy::REGDLL, phy::REG28, phy::REG38, phy::REG48,
        phy::REG58, phy::REG00, phy::REG01, phy::REG0B, phy::REG0C, phy::REG11, phy::REG12,
        phy::REG16, phy::REG18, phy::REG20, phy::REG21, phy::REG30, phy::REG31, phy::REG40,
        phy::REG41, phy::REG50, phy::REG51, phy::REG5E, phy::REG5F, phy::REG4E, phy::REG4F,
        phy::REG3E, phy::REG3F, phy::REG2E, phy::REG2F, phy::REG12, phy::REG18,
    ];
}

#[inline(always)]
fn wait_masked<M: RegisterIo>(io: &M, addr: u32, mask: u32, value: u32) {
    while io.read32(addr as usize) & mask != value {
        core::hint::spin_loop();
    }
}

#[inline(always)]
fn write_unless_skipped<M: RegisterIo>(io: &M, addr: u32, value: u32) {
    if addr != SKIP_ADDR {
        io.write32(addr as usize, value);
    }
}

/// Register view over the blocks the snapshot records by base address.
#[inline(always)]
fn snapshot_blocks(snap: &ControllerSnapshot) -> BlockMap {
    BlockMap {
        pctl: snap.pctl_addr as usize,
        phy: snap.phy_addr as usize,
        msch: snap.noc_addr as usize,
        cru: 0,
        grf: 0,
        pmu_grf: 0,
        pmu: 0,
    }
}

sram_resume! {
    fn restore_dpll<M: RegisterIo>(io: &M, snap: &ControllerSnapshot) {
        write_unless_skipped(io, snap.dpll_mode_addr, snap.dpll_slow_mode);
        if snap.dpll_con_addr != SKIP_ADDR {
            for (i, con) in snap.dpll_con.iter().enumerate() {
                io.write32(snap.dpll_con_addr as usize + i * 4, *con);
            }
        }
        if snap.dpll_lock_addr != SKIP_ADDR {
            wait_masked(io, snap.dpll_lock_addr, snap.dpll_lock_mask, snap.dpll_lock_val);
        }
        write_unless_skipped(io, snap.ddr_pll_src_div_addr, snap.ddr_pll_src_div);
        write_unless_skipped(io, snap.dpll_mode_addr, snap.dpll_normal_mode);
        wait_masked(io, snap.dpll_lock_addr, snap.dpll_lock_mask, snap.dpll_lock_val);
    }

    /// Pulses the uPCTL reset and brings the PHY out of its soft reset in
    /// two steps, analog first.
    fn reset_pctl_and_phy<M: RegisterIo>(io: &M, regs: &Registers<'_, M>, snap: &ControllerSnapshot) {
        let analog = phy::SOFT_DERESET_ANALOG;
        let digital = phy::SOFT_DERESET_DIGITAL;

        regs.delay_us(10);
        io.write32(snap.cru_pctl_softrst_addr as usize, snap.cru_pctl_reset);
        regs.delay_us(10);
        io.write32(snap.cru_pctl_softrst_addr as usize, snap.cru_pctl_dereset);
        regs.delay_us(10);
        regs.clear_bits(Block::Phy, phy::REG00, analog | digital);
        regs.delay_us(10);
        regs.set_bits(Block::Phy, phy::REG00, analog);
        regs.delay_us(10);
        regs.set_bits(Block::Phy, phy::REG00, digital | analog);
        regs.delay_us(5);
    }

    /// Brings the controller back from `snap` and leaves it in ACCESS.
    pub fn replay<M: RegisterIo>(io: &M, snap: &ControllerSnapshot) {
        let regs = Registers::new(io, snapshot_blocks(snap));

        restore_dpll(io, snap);
        regs.write32(Block::Phy, phy::REGEF, snap.phy.get(phy::REGEF));

        if snap.cru_pctl_softrst_addr != 0 {
            reset_pctl_and_phy(io, &regs, snap);
        }

        for &reg in PHY_RESTORE_ORDER.iter() {
            regs.write32(Block::Phy, reg, snap.phy.get(reg));
        }

        regs.write32(Block::Phy, REG02, REG02_GATE_BYPASS);
        for (&(first, second), saved) in GATE_RESULT_PAIRS.iter().zip([REGFB, REGFC, REGFD, REGFE]) {
            let v = snap.phy.get(saved);
            regs.write32(Block::Phy, first, v);
            regs.write32(Block::Phy, second, v);
        }

        regs.write_words(Block::Pctl, TOGCNT1U, snap.pctl.timing.registers());
        regs.write32(Block::Pctl, pctl::SCFG, snap.pctl.scfg);
        regs.write32(Block::Pctl, pctl::CMDTSTATEN, snap.pctl.cmdtstaten);
        regs.write32(Block::Pctl, pctl::MCFG1, snap.pctl.mcfg1);
        regs.write32(Block::Pctl, pctl::MCFG, snap.pctl.mcfg);
        regs.write32(Block::Pctl, pctl::PPCFG, snap.pctl.ppcfg);
        for (reg, value) in PCTL_DFI_REGS.iter().zip(snap.pctl.dfi.iter()) {
            regs.write32(Block::Pctl, *reg, *value);
        }

        io.write32(snap.grf_con0_addr as usize, snap.grf_con0);
        io.write32(snap.grf_con1_addr as usize, snap.grf_con1);
        regs.delay_us(5);

        regs.write32(Block::Pctl, POWCTL, POWER_UP_START);
        regs.wait_for(Block::Pctl, POWSTAT, POWER_UP_DONE, POWER_UP_DONE);

        regs.write32(Block::Msch, msch::DDRCONF, snap.noc.ddrconf);
        regs.write32(Block::Msch, msch::DDRTIMING, snap.noc.ddrtiming);
        regs.write32(Block::Msch, msch::DDRMODE, snap.noc.ddrmode);
        regs.write32(Block::Msch, msch::READLATENCY, snap.noc.readlatency);
        regs.write32(Block::Msch, msch::ACTIVATE, snap.noc.activate);
        regs.write32(Block::Msch, msch::DEVTODEV, snap.noc.devtodev);

        io.write32(snap.grf_con0_addr as usize, C_ACTIVE_IN_EN);
        resume_move_to_low_power(&regs);
        io.write32(snap.pmu_io_ret_addr as usize, DDR_IO_RET_RELEASE);
        resume_move_to_access(&regs);
        io.write32(snap.grf_con0_addr as usize, C_ACTIVE_IN_DISABLE);
    }

    /// Where the suspend firmware jumps on wakeup, MMU off, stack in
    /// scratch memory, with the resume data blob as argument.
    ///
    /// # Safety
    ///
    /// `snap` must point at a snapshot taken by `save_state`, and every
    /// address it records must be a mapped device register.
    pub unsafe extern "C" fn resume_entry(snap: *const ControllerSnapshot) {
        // SAFETY: upheld by the caller.
        let (io, snap) = unsafe { (VolatileIo::new(), &*snap) };
        replay(&io, snap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_order_covers_every_plain_phy_register() {
        for reg in super::super::snapshot::PHY_SAVED_REGS {
            let special = matches!(reg, phy::REGEF | REGFB | REGFC | REGFD | REGFE)
                || reg == phy::REGEC
                || reg == phy::REGED
                || reg == phy::REGEE;
            assert_eq!(PHY_RESTORE_ORDER.contains(&reg), !special, "reg {:#x}", reg);
        }
    }
}
