pub mod close;
pub mod cycles;
