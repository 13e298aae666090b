pub mod cru;
pub mod geometry;
pub mod grf;
pub mod mode_register;
pub mod msch;
pub mod pctl;
pub mod phy;
pub mod pll;
pub mod registers;
pub mod resume;
pub mod sequencer;
pub mod snapshot;
pub mod state;
pub mod timing;
pub mod training;

pub use geometry::{DramGeometry, DramType};
pub use registers::{Block, BlockMap, RegisterIo, Registers, VolatileIo};
pub use snapshot::ControllerSnapshot;
pub use timing::{SpeedBin, TimingProfile};
