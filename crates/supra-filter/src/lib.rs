#![doc = include_str!("../README.md")]

pub mod enhance;
pub mod filter;
pub mod pool;
pub mod queue;
pub mod upload;
pub mod vproc;

mod render;

pub use filter::{FilterCounters, SuperResFilter};
