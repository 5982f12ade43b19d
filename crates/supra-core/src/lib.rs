#![doc = include_str!("../README.md")]

pub mod error;
pub mod hw;
pub mod options;
pub mod policy;
pub mod types;
