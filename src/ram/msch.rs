//! Memory scheduler on the service bus.

use arbitrary_int::{u3, u4, u5, u6};

pub const DDRCONF: usize = 0x0008;
pub const DDRTIMING: usize = 0x000c;
pub const DDRMODE: usize = 0x0010;
pub const READLATENCY: usize = 0x0014;
pub const ACTIVATE: usize = 0x0038;
pub const DEVTODEV: usize = 0x003c;

/// DDRTIMING bit the scheduler owns; kept across timing updates.
pub const BW_RATIO: u32 = 1 << 31;

/// Bus-to-bus turnaround shared by every DRAM type.
pub const DEVTODEV_DEFAULT: u32 = (1 << 4) | (1 << 2) | 1;

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct NocTiming {
    #[bit(31, rw)]
    bw_ratio: bool,
    #[bits(26..=30, rw)]
    wr_to_rd: u5,
    #[bits(21..=25, rw)]
    rd_to_wr: u5,
    #[bits(18..=20, rw)]
    burst_len: u3,
    #[bits(12..=17, rw)]
    wr_to_miss: u6,
    #[bits(6..=11, rw)]
    rd_to_miss: u6,
    #[bits(0..=5, rw)]
    act_to_act: u6,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct NocActivate {
    #[bit(10, rw)]
    faw_bank: bool,
    #[bits(4..=9, rw)]
    faw: u6,
    #[bits(0..=3, rw)]
    rrd: u4,
}
