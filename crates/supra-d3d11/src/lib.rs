#![doc = include_str!("../README.md")]

#[cfg(windows)]
pub mod session;
#[cfg(not(windows))]
#[path = "session_stub.rs"]
pub mod session;

pub mod mock;
