//! The frequency change itself.
//!
//! Everything from `idle_port` to `deidle_port` runs with DRAM unavailable:
//! the code, its stack and `SequencerData` have to live in the scratch
//! region, and nothing here may allocate, log or take a lock. Every input
//! is read from `SequencerData`, and delays spin on the architected counter.

use super::cru::{clkgate_con, CLKGATE_COUNT, UNGATE_ALL};
use super::geometry::DramType;
use super::grf::{
    C_ACTIVE_IN_EN, GRF_SOC_CON0, GRF_SOC_CON1, IDLE_MSCH_ST, IDLE_REQ_MSCH_DIS,
    IDLE_REQ_MSCH_EN, MASTERS_STALL, PHY_BUFFER_ISOLATE, PHY_BUFFER_RELEASE, PMU_GRF_SOC_CON0,
    PMU_IDLE_REQ, PMU_IDLE_ST,
};
use super::mode_register::{update_mode_registers, ModeRegisterUpdate};
use super::msch;
use super::pctl::{tfaw_cfg, Mcfg, DFITPHYWRLAT, DFITRDDATAEN, LPDDR23_BL8, MCFG, TOGCNT1U};
use super::phy::{REG00, REG0B, REG0C, SOFT_DERESET_ANALOG, SOFT_DERESET_DIGITAL};
use super::pll::{self, PllSetting};
use super::registers::{Block, BlockMap, RegisterIo, Registers, REG_MASK};
use super::snapshot::ControllerSnapshot;
use super::state::{move_to_access, move_to_config, move_to_low_power};
use super::training::{data_training, set_dfi_lp, set_dll_bypass, update_odt, PhyDrive};
use arbitrary_int::u2;

const DDR3: u32 = DramType::Ddr3.code();
const LPDDR2: u32 = DramType::Lpddr2.code();
const LPDDR3: u32 = DramType::Lpddr3.code();

/// Working set of a frequency change, placed right after the resume code in
/// the scratch region.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct SequencerData {
    pub snapshot: ControllerSnapshot,
    /// DPLL dividers for `pending_freq`.
    pub pll: PllSetting,
    /// PHY drive and termination for `pending_freq`.
    pub drive: PhyDrive,
    pub clk_gates: [u32; CLKGATE_COUNT],
    /// Register block bases, see `BlockMap::to_words`.
    pub blocks: [u32; 7],
    /// DPLL lock polls before giving up, one per microsecond.
    pub lock_budget: u32,
    /// Frequency the hardware was last moved to.
    pub ddr_freq: u32,
    /// Frequency the staged profile was computed for.
    pub pending_freq: u32,
}

impl SequencerData {
    pub fn zeroed() -> Self {
        SequencerData {
            snapshot: ControllerSnapshot::zeroed(),
            pll: PllSetting::default(),
            drive: PhyDrive::default(),
            clk_gates: [0; CLKGATE_COUNT],
            blocks: [0; 7],
            lock_budget: 0,
            ddr_freq: 0,
            pending_freq: 0,
        }
    }

    /// The staged type, if it is one the sequencer drives.
    #[inline(always)]
    pub fn dram_type(&self) -> Option<DramType> {
        match self.snapshot.mem_type {
            DDR3 => Some(DramType::Ddr3),
            LPDDR2 => Some(DramType::Lpddr2),
            LPDDR3 => Some(DramType::Lpddr3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    Locked,
    /// The DPLL never reported lock; the change still ran to the end.
    LockTimeout,
    /// `mem_type` is not a type the sequencer drives. Nothing was touched.
    UnsupportedType,
}

/// Entry point signature, resolved once per `RegisterIo`.
pub type ChangeFn<M> = fn(M, &mut SequencerData) -> ChangeOutcome;

sram_text! {
    /// Saves and opens every clock gate, stalls the masters and waits for
    /// the scheduler to go idle.
    fn idle_port<M: RegisterIo>(regs: &Registers<'_, M>, gates: &mut [u32; CLKGATE_COUNT]) {
        for (i, g) in gates.iter_mut().enumerate() {
            *g = regs.read32(Block::Cru, clkgate_con(i));
        }
        for i in 0..CLKGATE_COUNT {
            regs.write32(Block::Cru, clkgate_con(i), UNGATE_ALL);
        }

        regs.write32(Block::Grf, GRF_SOC_CON1, MASTERS_STALL);

        regs.write32(Block::Pmu, PMU_IDLE_REQ, IDLE_REQ_MSCH_EN);
        regs.dsb();
        regs.wait_for(Block::Pmu, PMU_IDLE_ST, IDLE_MSCH_ST, IDLE_MSCH_ST);
    }

    fn deidle_port<M: RegisterIo>(regs: &Registers<'_, M>, gates: &[u32; CLKGATE_COUNT]) {
        regs.write32(Block::Pmu, PMU_IDLE_REQ, IDLE_REQ_MSCH_DIS);
        regs.dsb();
        regs.wait_for(Block::Pmu, PMU_IDLE_ST, IDLE_MSCH_ST, 0);

        for (i, g) in gates.iter().enumerate() {
            regs.write32(Block::Cru, clkgate_con(i), *g | REG_MASK);
        }
    }

    /// Loads the staged timing into the controller and PHY latency
    /// registers. The DFI read/write latencies follow CL/CWL on DDR3 only;
    /// LPDDR keeps what the loader derived from RL/WL.
    fn update_timing<M: RegisterIo>(regs: &Registers<'_, M>, snap: &ControllerSnapshot, dram_type: DramType) {
        let t = &snap.pctl_timing;
        regs.write_words(Block::Pctl, TOGCNT1U, t.registers());
        regs.write32(Block::Phy, REG0B, (t.tcl << 4) | t.tal);
        regs.write32(Block::Phy, REG0C, t.tcwl);

        let mcfg = Mcfg::new_with_raw_value(regs.read32(Block::Pctl, MCFG));
        if dram_type == DramType::Ddr3 {
            let mcfg = mcfg
                .with_tfaw_cfg(tfaw_cfg(5))
                .with_mem_bl8(true)
                .with_pd_exit_mode(false)
                .with_pd_type(true);
            regs.write32(Block::Pctl, MCFG, mcfg.raw_value());
            regs.write32(Block::Pctl, DFITRDDATAEN, (t.tcl.saturating_sub(1) / 2).saturating_sub(1));
            regs.write32(Block::Pctl, DFITPHYWRLAT, (t.tcwl.saturating_sub(1) / 2).saturating_sub(1));
        } else {
            regs.write32(Block::Pctl, MCFG, mcfg.with_lpddr23_bl(u2::new(LPDDR23_BL8)).raw_value());
        }
    }

    /// Moves DRAM to `data.pending_freq`: self-refresh, relock the DPLL,
    /// reload timing, retrain, back to access. `io` is taken by value so
    /// nothing on the caller's stack is read once DRAM is gone.
    pub fn change_frequency<M: RegisterIo>(io: M, data: &mut SequencerData) -> ChangeOutcome {
        let Some(dram_type) = data.dram_type() else {
            return ChangeOutcome::UnsupportedType;
        };
        let regs = Registers::new(&io, BlockMap::from_words(&data.blocks));
        let freq = data.pending_freq;
        let phy_dll_dis_freq = data.snapshot.timing_config.phy_dll_dis_freq;
        let dram_dll_dis_freq = data.snapshot.timing_config.dram_dll_dis_freq;
        let pd_idle = data.snapshot.timing_config.pd_idle;

        regs.write32(Block::Grf, GRF_SOC_CON0, C_ACTIVE_IN_EN);
        idle_port(&regs, &mut data.clk_gates);
        move_to_low_power(&regs);
        data.ddr_freq = freq;
        regs.write32(Block::PmuGrf, PMU_GRF_SOC_CON0, PHY_BUFFER_ISOLATE);

        regs.clear_bits(Block::Phy, REG00, SOFT_DERESET_DIGITAL | SOFT_DERESET_ANALOG);
        regs.dsb();

        let locked = pll::program(&regs, &data.pll, data.lock_budget);
        set_dll_bypass(&regs, freq, phy_dll_dis_freq);
        update_timing(&regs, &data.snapshot, dram_type);

        regs.set_bits(Block::Phy, REG00, SOFT_DERESET_ANALOG);
        regs.delay_us(5);
        update_odt(&regs, &data.drive);
        regs.set_bits(Block::Phy, REG00, SOFT_DERESET_DIGITAL);
        regs.write32(Block::PmuGrf, PMU_GRF_SOC_CON0, PHY_BUFFER_RELEASE);
        regs.dsb();

        move_to_config(&regs);
        let upd = ModeRegisterUpdate {
            dram_type,
            freq_mhz: freq,
            dll_dis_freq: dram_dll_dis_freq,
            mr: &data.snapshot.mr,
            mr11: data.snapshot.mr11,
        };
        let mut dll_status = data.snapshot.dll_status;
        update_mode_registers(&regs, &upd, &mut dll_status);
        data.snapshot.dll_status = dll_status;

        data_training(&regs);
        set_dfi_lp(&regs, dram_type, data.snapshot.sr_idle, pd_idle);
        move_to_access(&regs);
        deidle_port(&regs, &data.clk_gates);

        // The scheduler ignores register access while its port is idle.
        let ddrtiming = (regs.read32(Block::Msch, msch::DDRTIMING) & msch::BW_RATIO) | data.snapshot.noc_timing;
        regs.write32(Block::Msch, msch::DDRTIMING, ddrtiming);
        regs.write32(Block::Msch, msch::READLATENCY, data.snapshot.read_latency);
        regs.write32(Block::Msch, msch::ACTIVATE, data.snapshot.noc_activate);
        regs.write32(Block::Msch, msch::DEVTODEV, data.snapshot.dev_to_dev);

        if locked {
            ChangeOutcome::Locked
        } else {
            ChangeOutcome::LockTimeout
        }
    }
}
