//! uPCTL operational state transitions.
//!
//! Every wait here spins on STAT without a bound: a controller that never
//! reaches the requested state has taken DRAM with it.

use super::grf::{C_ACTIVE_IN_DISABLE, C_ACTIVE_IN_EN, GRF_SOC_CON0};
use super::pctl::{CtlCommand, CtlState, Stat, SCTL, STAT};
use super::registers::{Block, RegisterIo, Registers};

#[inline(always)]
pub fn stat<M: RegisterIo>(regs: &Registers<'_, M>) -> Stat {
    Stat::new_with_raw_value(regs.read32(Block::Pctl, STAT))
}

#[inline(always)]
pub fn ctl_state<M: RegisterIo>(regs: &Registers<'_, M>) -> CtlState {
    stat(regs).state()
}

#[inline(always)]
fn command<M: RegisterIo>(regs: &Registers<'_, M>, cmd: CtlCommand) {
    regs.write32(Block::Pctl, SCTL, cmd as u32);
    regs.dsb();
}

/// Access, or low power the controller entered on its own after `sr_idle`.
#[inline(always)]
fn serving<M: RegisterIo>(regs: &Registers<'_, M>) -> bool {
    let s = stat(regs);
    s.state() == CtlState::Access
        || (s.state() == CtlState::LowPower && s.entered_low_power_by_itself())
}

#[inline(always)]
fn request<M: RegisterIo>(regs: &Registers<'_, M>, cmd: CtlCommand, until: CtlState) {
    command(regs, cmd);
    while ctl_state(regs) != until {
        core::hint::spin_loop();
    }
}

/// INIT_MEM -> CONFIG -> ACCESS -> LOW_POWER, entering wherever the
/// controller currently is.
#[inline(always)]
fn walk_to_low_power<M: RegisterIo>(regs: &Registers<'_, M>) {
    loop {
        let mut state = ctl_state(regs);
        if state == CtlState::LowPower {
            break;
        }
        if state == CtlState::InitMem {
            request(regs, CtlCommand::Cfg, CtlState::Config);
            state = CtlState::Config;
        }
        if state == CtlState::Config {
            request(regs, CtlCommand::Go, CtlState::Access);
            state = CtlState::Access;
        }
        if state == CtlState::Access {
            request(regs, CtlCommand::Sleep, CtlState::LowPower);
        }
    }
}

sram_text! {
    /// Holds off new requests and puts the DRAM into self-refresh.
    pub fn move_to_low_power<M: RegisterIo>(regs: &Registers<'_, M>) {
        regs.write32(Block::Grf, GRF_SOC_CON0, C_ACTIVE_IN_EN);
        walk_to_low_power(regs);
    }

    /// Back to serving traffic, then lets requests through again.
    pub fn move_to_access<M: RegisterIo>(regs: &Registers<'_, M>) {
        loop {
            if serving(regs) {
                break;
            }
            match ctl_state(regs) {
                CtlState::LowPower => request(regs, CtlCommand::Wakeup, CtlState::Access),
                state @ (CtlState::InitMem | CtlState::Config) => {
                    if state == CtlState::InitMem {
                        request(regs, CtlCommand::Cfg, CtlState::Config);
                    }
                    command(regs, CtlCommand::Go);
                    while !serving(regs) {
                        core::hint::spin_loop();
                    }
                }
                _ => {}
            }
        }
        regs.write32(Block::Grf, GRF_SOC_CON0, C_ACTIVE_IN_DISABLE);
    }

    /// CONFIG state, required before mode registers or timing can change.
    pub fn move_to_config<M: RegisterIo>(regs: &Registers<'_, M>) {
        regs.write32(Block::Grf, GRF_SOC_CON0, C_ACTIVE_IN_EN);
        loop {
            match ctl_state(regs) {
                CtlState::Config => break,
                CtlState::LowPower => {
                    command(regs, CtlCommand::Wakeup);
                    command(regs, CtlCommand::Cfg);
                }
                CtlState::Access | CtlState::InitMem => command(regs, CtlCommand::Cfg),
                _ => {}
            }
        }
    }
}

sram_resume! {
    /// Resume-time variant of `move_to_low_power`. Leaves C_ACTIVE_IN alone.
    pub fn resume_move_to_low_power<M: RegisterIo>(regs: &Registers<'_, M>) {
        walk_to_low_power(regs);
    }

    /// Resume-time variant of `move_to_access`: only ACCESS counts as done.
    pub fn resume_move_to_access<M: RegisterIo>(regs: &Registers<'_, M>) {
        loop {
            match ctl_state(regs) {
                CtlState::Access => break,
                CtlState::LowPower => request(regs, CtlCommand::Wakeup, CtlState::Access),
                CtlState::Config => request(regs, CtlCommand::Go, CtlState::Access),
                _ => {}
            }
        }
    }
}
